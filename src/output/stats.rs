//! Statistics display for the `--stats` mode

use crate::output::summary::CrawlSummary;
use crate::state::CountVerdict;
use crate::storage::SnapshotRecord;

/// Prints crawl statistics to stdout
///
/// # Arguments
///
/// * `summary` - Summary of the latest snapshot
/// * `history` - Stored snapshots, newest first
pub fn print_statistics(summary: &CrawlSummary, history: &[SnapshotRecord]) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  {}", summary.progress);
    println!("  Rounds run: {}", summary.rounds);
    println!("  Query tree nodes: {}", summary.tree_nodes);
    println!("  Longest search term: {}", summary.max_term_length);
    println!("  Queue order: {:?}", summary.queue_order);
    println!();

    println!("Result Count Verdicts:");
    for verdict in [
        CountVerdict::Complete,
        CountVerdict::Truncated,
        CountVerdict::Unknown,
    ] {
        println!("  {}: {}", verdict, summary.verdict_total(verdict));
    }
    let pending: Vec<String> = summary
        .verdicts
        .iter()
        .filter(|row| row.verdict == CountVerdict::Unknown && row.streak > 0)
        .map(|row| format!("{} ({})", row.count, row.streak))
        .collect();
    if !pending.is_empty() {
        println!("  Gathering evidence: {}", pending.join(", "));
    }
    println!();

    if !summary.records_by_type.is_empty() {
        println!("Records by Type:");
        let mut types: Vec<_> = summary.records_by_type.iter().collect();
        types.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in types {
            let percentage = if summary.progress.unique_records > 0 {
                (*count as f64 / summary.progress.unique_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", kind, count, percentage);
        }
        println!();
    }

    if !history.is_empty() {
        println!("Snapshots ({}):", history.len());
        for snapshot in history.iter().take(10) {
            println!(
                "  #{} {} round {}: {} queries, {} records{}",
                snapshot.id,
                snapshot.saved_at.format("%Y-%m-%d %H:%M:%S"),
                snapshot.rounds,
                snapshot.completed_queries,
                snapshot.unique_records,
                if snapshot.done { " (done)" } else { "" }
            );
        }
        if history.len() > 10 {
            println!("  ... and {} older", history.len() - 10);
        }
    }
}
