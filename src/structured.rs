use crate::extract::ExtractionStrategy;
use crate::model::{EventRecord, ExtractionStage, RawPage};
use scraper::Selector;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static JSON_LD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#)
        .expect("json-ld selector must parse")
});

pub struct StructuredDataExtractor;

impl ExtractionStrategy for StructuredDataExtractor {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::StructuredData
    }

    fn extract(&self, page: &RawPage, venue: &str) -> Vec<EventRecord> {
        extract_structured_events(page, venue)
    }
}

pub fn extract_structured_events(page: &RawPage, venue: &str) -> Vec<EventRecord> {
    let mut records = Vec::new();

    for (index, script) in page.document.select(&JSON_LD_SELECTOR).enumerate() {
        let text = script.text().collect::<String>();
        let payload: Value = match serde_json::from_str(text.trim()) {
            Ok(value) => value,
            Err(err) => {
                debug!(block = index, error = %err, "skipping unparseable json-ld block");
                continue;
            }
        };

        for node in json_ld_nodes(&payload) {
            if !is_event_node(node) {
                let kind = node.get("@type").map(|kind| kind.to_string());
                debug!(
                    block = index,
                    kind = %kind.unwrap_or_default(),
                    "skipping non-event json-ld node"
                );
                continue;
            }
            records.push(event_from_node(page, node, venue));
        }
    }

    records
}

fn json_ld_nodes(payload: &Value) -> Vec<&Value> {
    let roots: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut nodes = Vec::new();
    for root in roots {
        if let Some(Value::Array(graph)) = root.get("@graph") {
            nodes.extend(graph.iter());
        } else {
            nodes.push(root);
        }
    }
    nodes
}

fn is_event_node(node: &Value) -> bool {
    let is_event_type = |name: &str| {
        let name = name.rsplit(|c: char| c == '/' || c == ':').next().unwrap_or(name);
        name.ends_with("Event")
    };

    match node.get("@type") {
        Some(Value::String(kind)) => is_event_type(kind),
        Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).any(is_event_type),
        _ => false,
    }
}

fn event_from_node(page: &RawPage, node: &Value, venue: &str) -> EventRecord {
    let mut record = EventRecord::for_venue(venue);

    if let Some(name) = string_field(node, "name") {
        record.set_name(&name);
    }

    if let Some(location) = node
        .get("location")
        .and_then(|loc| match loc {
            Value::Array(items) => items.first(),
            other => Some(other),
        })
        .and_then(|loc| string_field(loc, "name"))
    {
        record.venue = location;
    }

    if let Some(url) = string_field(node, "url").and_then(|url| page.permalink_url(&url)) {
        record.permalink = url;
    }

    if let Some(image) = image_field(node).and_then(|url| page.absolute_url(&url)) {
        record.set_image(&image);
    }

    if let Some(description) = string_field(node, "description") {
        record.description_text = description;
    }
    if let Some(start) = string_field(node, "startDate") {
        record.start_time = start;
    }
    if let Some(end) = string_field(node, "endDate") {
        record.end_time = end;
    }

    record
}

fn string_field(node: &Value, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn image_field(node: &Value) -> Option<String> {
    fn image_url(value: &Value) -> Option<String> {
        match value {
            Value::String(url) => Some(url.trim().to_string()).filter(|v| !v.is_empty()),
            Value::Object(_) => string_field(value, "url").or_else(|| string_field(value, "contentUrl")),
            Value::Array(items) => items.iter().find_map(image_url),
            _ => None,
        }
    }

    node.get("image").and_then(image_url)
}
