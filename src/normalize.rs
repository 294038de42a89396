use crate::datetime::{derive_door_and_end, format_datetime, resolve_start_time_on};
use crate::model::EventRecord;
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn normalize(records: Vec<EventRecord>) -> Vec<EventRecord> {
    normalize_on(records, Local::now().date_naive())
}

pub fn normalize_on(records: Vec<EventRecord>, today: NaiveDate) -> Vec<EventRecord> {
    let total = records.len();
    let valid: Vec<EventRecord> = records
        .into_iter()
        .filter(EventRecord::has_permalink)
        .filter(EventRecord::has_name)
        .collect();
    if valid.len() < total {
        info!(
            filtered = total - valid.len(),
            "dropped events with empty permalink or name"
        );
    }

    let before_dedup = valid.len();
    let mut unique = dedup_last_wins(valid);
    if unique.len() < before_dedup {
        info!(
            duplicates = before_dedup - unique.len(),
            "dropped duplicate events sharing a permalink"
        );
    }

    for record in &mut unique {
        derive_times(record, today);
    }
    unique
}

pub fn merge_tables(existing: Vec<EventRecord>, fresh: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut combined = existing;
    combined.extend(fresh);
    normalize(combined)
}

fn dedup_last_wins(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        last_index.insert(permalink_key(record), index);
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(index, record)| last_index.get(&permalink_key(record)) == Some(index))
        .map(|(_, record)| record)
        .collect()
}

fn permalink_key(record: &EventRecord) -> String {
    record.permalink.trim().to_string()
}

fn derive_times(record: &mut EventRecord, today: NaiveDate) {
    let raw_start = record.start_time.trim().to_string();
    if raw_start.is_empty() {
        return;
    }

    let Some(start) = resolve_start_time_on(&raw_start, today) else {
        debug!(
            permalink = %record.permalink,
            start = %raw_start,
            "start time not understood; leaving as is"
        );
        return;
    };
    if start.date_inferred {
        warn!(
            permalink = %record.permalink,
            start = %raw_start,
            date = %today,
            "start text has no date; assuming today"
        );
    }

    let explicit_door = Some(record.door_time.trim()).filter(|door| !door.is_empty());
    let (door, end) = derive_door_and_end(start.at, explicit_door, &raw_start);

    record.start_time = format_datetime(start.at);
    record.door_time = format_datetime(door);
    record.end_time = format_datetime(end);
}
