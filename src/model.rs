use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

pub const COLUMNS: [&str; 18] = [
    "Hold Level",
    "Artist",
    "Type",
    "Venue",
    "Event Name",
    "Buyer",
    "Promoter",
    "Event End Time",
    "Event Start Time",
    "Event Door Time",
    "Event Image URL",
    "Notes",
    "Venue Permalink",
    "Description Text",
    "Description Image",
    "Description Video",
    "Contacts",
    "ID",
];

/// Hold level stamped on every extracted record. Only level 1 is supported.
pub const DEFAULT_HOLD_LEVEL: &str = "1";

pub const DEFAULT_EVENT_TYPE: &str = "Confirm";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EventRecord {
    #[serde(rename = "Hold Level")]
    pub hold_level: String,
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Type")]
    pub event_type: String,
    #[serde(rename = "Venue")]
    pub venue: String,
    #[serde(rename = "Event Name")]
    pub event_name: String,
    #[serde(rename = "Buyer")]
    pub buyer: String,
    #[serde(rename = "Promoter")]
    pub promoter: String,
    #[serde(rename = "Event End Time")]
    pub end_time: String,
    #[serde(rename = "Event Start Time")]
    pub start_time: String,
    #[serde(rename = "Event Door Time")]
    pub door_time: String,
    #[serde(rename = "Event Image URL")]
    pub image_url: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    #[serde(rename = "Venue Permalink")]
    pub permalink: String,
    #[serde(rename = "Description Text")]
    pub description_text: String,
    #[serde(rename = "Description Image")]
    pub description_image: String,
    #[serde(rename = "Description Video")]
    pub description_video: String,
    #[serde(rename = "Contacts")]
    pub contacts: String,
    #[serde(rename = "ID")]
    pub id: String,
}

impl EventRecord {
    pub fn for_venue(venue: &str) -> Self {
        Self {
            hold_level: DEFAULT_HOLD_LEVEL.to_string(),
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            venue: venue.to_string(),
            ..Self::default()
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.event_name = name.to_string();
        self.artist = name.to_string();
    }

    pub fn set_image(&mut self, url: &str) {
        self.image_url = url.to_string();
        self.description_image = url.to_string();
    }

    pub fn has_permalink(&self) -> bool {
        !self.permalink.trim().is_empty()
    }

    pub fn has_name(&self) -> bool {
        !self.event_name.trim().is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.has_permalink() && self.has_name()
    }
}

#[derive(Debug)]
pub struct RawPage {
    pub base_url: Option<Url>,
    pub html: String,
    pub document: Html,
}

impl RawPage {
    pub fn parse(html: impl Into<String>, base_url: Option<Url>) -> Self {
        let html = html.into();
        let document = Html::parse_document(&html);
        Self {
            base_url,
            html,
            document,
        }
    }

    pub fn absolute_url(&self, value: &str) -> Option<String> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(parsed) = Url::parse(value)
            && matches!(parsed.scheme(), "http" | "https")
        {
            return Some(parsed.to_string());
        }

        let base = self.base_url.as_ref()?;
        let joined = base.join(value).ok()?;
        matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
    }

    pub fn permalink_url(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if self.base_url.is_none() && !href.is_empty() {
            return Some(self.absolute_url(href).unwrap_or_else(|| href.to_string()));
        }
        self.absolute_url(href)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    StructuredData,
    Heuristic,
    Oracle,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStage::StructuredData => "structured_data",
            ExtractionStage::Heuristic => "heuristic",
            ExtractionStage::Oracle => "oracle",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScrapeOutcome {
    Unreachable {
        url: String,
        reason: String,
    },
    NoEvents,
    Success {
        stage: ExtractionStage,
        extracted: usize,
        records: Vec<EventRecord>,
    },
}

impl ScrapeOutcome {
    pub fn event_count(&self) -> usize {
        match self {
            ScrapeOutcome::Success { records, .. } => records.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_requires_name_and_permalink() {
        let mut record = EventRecord::for_venue("hideout");
        assert!(!record.is_valid());

        record.set_name("Night Moves");
        assert!(!record.is_valid());

        record.permalink = "https://venue.com/e/1".to_string();
        assert!(record.is_valid());
        assert_eq!(record.artist, "Night Moves");
        assert_eq!(record.hold_level, "1");
        assert_eq!(record.event_type, "Confirm");
    }

    #[test]
    fn absolute_url_resolves_against_base() {
        let page = RawPage::parse(
            "<html></html>",
            Some(Url::parse("https://venue.com/events/").unwrap()),
        );
        assert_eq!(
            page.absolute_url("/img/x.jpg").as_deref(),
            Some("https://venue.com/img/x.jpg")
        );
        assert_eq!(
            page.absolute_url("poster.png").as_deref(),
            Some("https://venue.com/events/poster.png")
        );
        assert_eq!(
            page.absolute_url("https://cdn.example.com/a.jpg").as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
    }

    #[test]
    fn relative_url_without_base_is_dropped() {
        let page = RawPage::parse("<html></html>", None);
        assert_eq!(page.absolute_url("/img/x.jpg"), None);
        assert_eq!(page.absolute_url("   "), None);
    }

    #[test]
    fn permalink_without_base_keeps_href() {
        let page = RawPage::parse("<html></html>", None);
        assert_eq!(
            page.permalink_url(" /tickets/owls ").as_deref(),
            Some("/tickets/owls")
        );
        assert_eq!(page.permalink_url(""), None);

        let based = RawPage::parse(
            "<html></html>",
            Some(Url::parse("https://venue.com/events/").unwrap()),
        );
        assert_eq!(
            based.permalink_url("/tickets/owls").as_deref(),
            Some("https://venue.com/tickets/owls")
        );
    }
}
