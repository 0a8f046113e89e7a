//! JSON export of the collected records

use crate::crawler::Record;
use crate::output::summary::OutputResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes records as a pretty-printed JSON array sorted by key
///
/// Returns the number of records written.
pub fn export_records<'a, I>(records: I, output_path: &Path) -> OutputResult<usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let sorted = sorted_by_key(records);
    let written = sorted.len();

    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, &sorted)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!("Exported {} records to {}", written, output_path.display());
    Ok(written)
}

/// Formats records as a JSON array sorted by key
pub fn format_records_json<'a, I>(records: I) -> OutputResult<String>
where
    I: IntoIterator<Item = &'a Record>,
{
    Ok(serde_json::to_string_pretty(&sorted_by_key(records))?)
}

fn sorted_by_key<'a, I>(records: I) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut sorted: Vec<&Record> = records.into_iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));
    sorted.dedup_by(|a, b| a.key == b.key);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sorts_by_key() {
        let records = vec![
            Record::new("MSFT").with_field("name", "Microsoft"),
            Record::new("AAPL").with_field("name", "Apple"),
        ];

        let json = format_records_json(&records).unwrap();
        let parsed: Vec<Record> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed[0].key, "AAPL");
        assert_eq!(parsed[1].field("name"), Some("Microsoft"));
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let records = vec![Record::new("B"), Record::new("A"), Record::new("A")];

        let written = export_records(&records, &path).unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Record> = serde_json::from_str(&content).unwrap();
        let keys: Vec<&str> = parsed.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_export_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        assert_eq!(export_records(&Vec::<Record>::new(), &path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
