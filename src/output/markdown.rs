//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a crawl:
//! progress, the learned result-count verdicts and the collected records
//! broken down by type.

use crate::output::summary::{CrawlSummary, OutputResult};
use crate::state::CountVerdict;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown summary to `output_path`
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Sieve Crawl Summary\n\n");

    // Snapshot metadata
    md.push_str("## Snapshot Information\n\n");
    md.push_str(&format!("- **Saved**: {}\n", summary.saved_at.to_rfc3339()));
    md.push_str(&format!("- **Rounds**: {}\n", summary.rounds));
    md.push_str(&format!(
        "- **Status**: {}\n",
        if summary.progress.done {
            "completed"
        } else {
            "in progress"
        }
    ));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push_str(&format!(
        "- **Snapshots Stored**: {}\n\n",
        summary.snapshots_stored
    ));

    md.push_str("## Progress\n\n");
    md.push_str(&format!("{}\n\n", summary.progress));
    md.push_str(&format!(
        "- **Queries Completed**: {}\n",
        summary.progress.completed_queries
    ));
    md.push_str(&format!(
        "- **Queries Remaining**: {}\n",
        summary.progress.remaining_queries
    ));
    md.push_str(&format!(
        "- **Unique Records**: {}\n",
        summary.progress.unique_records
    ));
    md.push_str(&format!("- **Query Tree Nodes**: {}\n", summary.tree_nodes));
    md.push_str(&format!(
        "- **Longest Search Term**: {}\n",
        summary.max_term_length
    ));
    md.push_str(&format!("- **Queue Order**: {:?}\n\n", summary.queue_order));

    // Verdict table
    md.push_str("## Result Count Verdicts\n\n");
    md.push_str(&format!(
        "{} complete, {} truncated, {} unknown\n\n",
        summary.verdict_total(CountVerdict::Complete),
        summary.verdict_total(CountVerdict::Truncated),
        summary.verdict_total(CountVerdict::Unknown)
    ));
    md.push_str("| Count | Verdict | Evidence |\n");
    md.push_str("|-------|---------|----------|\n");
    for row in &summary.verdicts {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            row.count, row.verdict, row.streak
        ));
    }
    md.push('\n');

    if !summary.records_by_type.is_empty() {
        md.push_str("## Records by Type\n\n");
        md.push_str("| Type | Records |\n");
        md.push_str("|------|---------|\n");

        let mut types: Vec<_> = summary.records_by_type.iter().collect();
        types.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (kind, count) in types {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    md
}
