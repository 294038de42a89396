use crate::model::{COLUMNS, EventRecord};
use crate::normalize::merge_tables;
use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn write_csv<W: Write>(writer: W, records: &[EventRecord]) -> Result<()> {
    let mut csv_writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .from_writer(writer);

    csv_writer
        .write_record(COLUMNS)
        .context("failed to write csv header")?;
    for record in records {
        csv_writer
            .serialize(record)
            .with_context(|| format!("failed to write csv row for {}", record.permalink))?;
    }
    csv_writer.flush().context("failed to flush csv output")?;
    Ok(())
}

pub fn to_csv_string(records: &[EventRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records)?;
    String::from_utf8(buffer).context("csv output was not valid utf-8")
}

pub fn load_table(path: &Path) -> Result<Vec<EventRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open table {}", path.display()))?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<EventRecord>().enumerate() {
        let record = row.with_context(|| {
            format!("failed to parse row {} of table {}", index + 1, path.display())
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn save_table(path: &Path, records: &[EventRecord]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    let temp_path = temp_path_for(path);
    if let Err(err) = replace_with_temp(&temp_path, path, records) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(err);
    }

    info!(path = %path.display(), rows = records.len(), "wrote table");
    Ok(())
}

fn replace_with_temp(temp_path: &Path, path: &Path, records: &[EventRecord]) -> Result<()> {
    let file = std::fs::File::create(temp_path)
        .with_context(|| format!("failed to create {}", temp_path.display()))?;
    write_csv(file, records)?;
    std::fs::rename(temp_path, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            temp_path.display(),
            path.display()
        )
    })
}

pub fn merge_into_file(path: &Path, fresh: Vec<EventRecord>) -> Result<Vec<EventRecord>> {
    let existing = load_table(path)?;
    let existing_rows = existing.len();
    let fresh_rows = fresh.len();
    let merged = merge_tables(existing, fresh);

    info!(
        path = %path.display(),
        existing = existing_rows,
        fresh = fresh_rows,
        merged = merged.len(),
        "merged into persisted table"
    );
    save_table(path, &merged)?;
    Ok(merged)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table.csv".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(name: &str, permalink: &str) -> EventRecord {
        let mut record = EventRecord::for_venue("hideout");
        record.set_name(name);
        record.permalink = permalink.to_string();
        record
    }

    #[test]
    fn every_field_is_quoted() {
        let csv = to_csv_string(&[record("Night, Moves", "https://venue.com/e/1")]).unwrap();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with(r#""Hold Level","Artist","Type","Venue","Event Name""#));
        assert!(header.ends_with(r#""Contacts","ID""#));

        let row = lines.next().unwrap();
        assert!(row.starts_with(r#""1","Night, Moves","Confirm","hideout","Night, Moves","","""#));
        assert!(row.ends_with(r#""","""#));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_table_still_has_header() {
        let csv = to_csv_string(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert_eq!(csv.matches('"').count(), COLUMNS.len() * 2);
    }

    #[test]
    fn missing_table_reads_empty() {
        let dir = tempdir().unwrap();
        assert!(load_table(&dir.path().join("absent.csv")).unwrap().is_empty());
    }

    #[test]
    fn save_then_load_preserves_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("hideout_events.csv");
        let rows = vec![
            record("Night Moves", "https://venue.com/e/1"),
            record("Say \"Hi\"", "https://venue.com/e/2"),
        ];

        save_table(&path, &rows).unwrap();
        assert!(!dir.path().join("nested").join(".hideout_events.csv.tmp").exists());
        assert_eq!(load_table(&path).unwrap(), rows);
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::create_dir(&path).unwrap();

        assert!(save_table(&path, &[record("Night Moves", "https://venue.com/e/1")]).is_err());
        assert!(!temp_path_for(&path).exists());
        assert!(path.is_dir());
    }

    #[test]
    fn missing_columns_read_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        std::fs::write(
            &path,
            "Event Name,Venue Permalink\nOld Show,https://venue.com/e/old\n",
        )
        .unwrap();

        let rows = load_table(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_name, "Old Show");
        assert_eq!(rows[0].permalink, "https://venue.com/e/old");
        assert_eq!(rows[0].hold_level, "");
        assert_eq!(rows[0].id, "");
    }

    #[test]
    fn merge_into_missing_file_creates_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.csv");

        let merged = merge_into_file(&path, vec![record("Night Moves", "https://venue.com/e/1")])
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(load_table(&path).unwrap(), merged);
    }
}
