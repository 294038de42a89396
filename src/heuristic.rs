use crate::datetime::has_time_markers;
use crate::extract::ExtractionStrategy;
use crate::model::{EventRecord, ExtractionStage, RawPage};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

const CONTAINER_TAGS: [&str; 4] = ["article", "div", "li", "section"];

const CONTAINER_KEYWORDS: [&str; 6] = ["event", "show", "concert", "listing", "post", "card"];

/// Max ancestors walked from a ticket link looking for its container.
const CTA_ANCESTOR_DEPTH: usize = 5;

/// Levels (container first) searched for an inline background image.
const BACKGROUND_DEPTH: usize = 3;

const NAME_TAGS: [&str; 6] = ["h1", "h2", "h3", "a", "span", "div"];

const NAME_DENYLIST: [&str; 11] = [
    "buy tickets",
    "get tickets",
    "buy",
    "tickets",
    "rsvp",
    "more info",
    "learn more",
    "read more",
    "view details",
    "details",
    "sold out",
];

const DATE_DENYLIST: [&str; 4] = ["buy tickets", "get tickets", "buy", "sold out"];

const PERMALINK_LABELS: [&str; 4] = ["get tickets", "buy tickets", "buy", "sold out"];

const IMAGE_SOURCE_ATTRS: [&str; 4] = ["src", "data-src", "data-lazy-src", "data-original"];

const MIN_NAME_CHARS: usize = 4;
const MIN_DESCRIPTION_CHARS: usize = 11;

static CONTAINER_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)event|show|concert|listing|post|card")
        .expect("container class regex must compile")
});
static ITEMTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Event").expect("itemtype regex must compile"));
static CTA_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)buy\s+tickets?|get\s+tickets?").expect("cta link regex must compile")
});
static NAME_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)title|name|event").expect("name class regex must compile"));
static DATE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)date|time|when").expect("date class regex must compile"));
static META_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)meta|info").expect("meta class regex must compile"));
static DESCRIPTION_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)description|summary|excerpt").expect("description class regex must compile")
});
static BACKGROUND_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)background-image:\s*url\(["']?([^"')]+)["']?\)"#)
        .expect("background image regex must compile")
});
static WEEKDAY_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w+day,?\s+\w+\s+\d{1,2},?\s+\d{4})")
        .expect("weekday date regex must compile")
});
static NUMERIC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").expect("numeric date regex must compile")
});
static MONTH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w+\s+\d{1,2},?\s+\d{4})").expect("month date regex must compile")
});
static CLOCK_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}:\d{2}\s*(?:am|pm))").expect("clock time regex must compile")
});

pub struct HeuristicHtmlExtractor;

impl ExtractionStrategy for HeuristicHtmlExtractor {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::Heuristic
    }

    fn extract(&self, page: &RawPage, venue: &str) -> Vec<EventRecord> {
        extract_heuristic_events(page, venue)
    }
}

pub fn extract_heuristic_events(page: &RawPage, venue: &str) -> Vec<EventRecord> {
    let containers = find_event_containers(&page.document);
    debug!(containers = containers.len(), "event containers discovered");

    containers
        .into_iter()
        .filter_map(|container| parse_container(page, container, venue))
        .collect()
}

pub fn find_event_containers(document: &Html) -> Vec<ElementRef<'_>> {
    let mut seen = HashSet::new();
    let mut containers = Vec::new();

    for element in document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
    {
        if is_marked_container(element) && seen.insert(element.id()) {
            containers.push(element);
        }
    }

    for link in document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a" && CTA_LINK_RE.is_match(&element_text(*el)))
    {
        if let Some(container) = cta_container(link)
            && seen.insert(container.id())
        {
            containers.push(container);
        }
    }

    containers
}

fn is_marked_container(element: ElementRef<'_>) -> bool {
    if !CONTAINER_TAGS.contains(&element.value().name()) {
        return false;
    }

    CONTAINER_CLASS_RE.is_match(class_attr(&element))
        || element
            .value()
            .attr("itemtype")
            .is_some_and(|kind| ITEMTYPE_RE.is_match(kind))
        || element.value().attr("data-event").is_some()
}

fn cta_container(link: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = link.parent();
    for _ in 0..CTA_ANCESTOR_DEPTH {
        let node = current?;
        if let Some(element) = ElementRef::wrap(node)
            && CONTAINER_TAGS.contains(&element.value().name())
        {
            let classes = class_attr(&element).to_lowercase();
            if CONTAINER_KEYWORDS.iter().any(|kw| classes.contains(kw)) {
                return Some(element);
            }
        }
        current = node.parent();
    }
    None
}

pub fn parse_container(
    page: &RawPage,
    container: ElementRef<'_>,
    venue: &str,
) -> Option<EventRecord> {
    let Some(name) = container_name(container) else {
        debug!(
            tag = container.value().name(),
            class = class_attr(&container),
            "container has no usable name; skipping"
        );
        return None;
    };

    let mut record = EventRecord::for_venue(venue);
    record.set_name(&name);

    if let Some(permalink) = container_permalink(page, container) {
        record.permalink = permalink;
    }

    record.start_time = container_start_time(container);

    if let Some(image) =
        container_image(page, container).or_else(|| background_image(page, container))
    {
        record.set_image(&image);
    }

    if let Some(description) = container_description(container) {
        record.description_text = description;
    }

    Some(record)
}

fn container_name(container: ElementRef<'_>) -> Option<String> {
    let classed = NAME_TAGS
        .iter()
        .map(|tag| find_first(container, tag, Some(&*NAME_CLASS_RE)));
    let bare = ["h1", "h2"]
        .into_iter()
        .map(|tag| find_first(container, tag, None));

    classed
        .chain(bare)
        .flatten()
        .map(element_text)
        .find(|name| is_acceptable_name(name))
}

fn is_acceptable_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    name.chars().count() >= MIN_NAME_CHARS && !NAME_DENYLIST.contains(&lowered.as_str())
}

fn container_permalink(page: &RawPage, container: ElementRef<'_>) -> Option<String> {
    ["a", "button"].into_iter().find_map(|tag| {
        descendants_named(container, tag).find_map(|el| {
            let label = element_text(el).to_lowercase();
            if !PERMALINK_LABELS.iter().any(|text| label.contains(text)) {
                return None;
            }
            el.value()
                .attr("href")
                .and_then(|href| page.permalink_url(href))
        })
    })
}

fn container_start_time(container: ElementRef<'_>) -> String {
    let mut start = String::new();

    if let Some(time) = find_first(container, "time", None) {
        start = time
            .value()
            .attr("datetime")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| element_text(time));
    }

    if start.is_empty() {
        let labelled: [(&str, Option<&Regex>); 5] = [
            ("time", None),
            ("span", Some(&*DATE_CLASS_RE)),
            ("div", Some(&*DATE_CLASS_RE)),
            ("p", Some(&*DATE_CLASS_RE)),
            ("div", Some(&*META_CLASS_RE)),
        ];
        for (tag, class) in labelled {
            let Some(element) = find_first(container, tag, class) else {
                continue;
            };
            let text = element_text(element);
            if !text.is_empty() && !DATE_DENYLIST.contains(&text.to_lowercase().as_str()) {
                start = text;
                break;
            }
        }
    }

    if start.is_empty() || has_time_markers(&start) {
        let text = full_text(container);
        // Undated scans only replace an empty start.
        if let Some(scanned) = scan_date_and_time(&text)
            && (start.is_empty() || scan_date(&text).is_some())
        {
            start = scanned;
        }
    }

    start
}

fn full_text(container: ElementRef<'_>) -> String {
    container
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn scan_date_and_time(text: &str) -> Option<String> {
    let time = CLOCK_TIME_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    match (scan_date(text), time) {
        (Some(date), Some(time)) => Some(format!("{date} {time}")),
        (Some(date), None) => Some(date),
        (None, time) => time,
    }
}

fn scan_date(text: &str) -> Option<String> {
    [&*WEEKDAY_DATE_RE, &*NUMERIC_DATE_RE, &*MONTH_DATE_RE]
        .into_iter()
        .find_map(|re| re.captures(text).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str().to_string())
}

fn container_image(page: &RawPage, container: ElementRef<'_>) -> Option<String> {
    descendants_named(container, "img").find_map(|img| {
        IMAGE_SOURCE_ATTRS
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .map(str::trim)
            .find(|src| {
                !src.is_empty()
                    && !is_inline_data(src)
                    && !src.to_lowercase().contains("placeholder")
            })
            .and_then(|src| page.absolute_url(src))
    })
}

fn background_image(page: &RawPage, container: ElementRef<'_>) -> Option<String> {
    let mut current = Some(container);
    for _ in 0..BACKGROUND_DEPTH {
        let element = current?;
        if let Some(style) = element.value().attr("style")
            && let Some(url) = BACKGROUND_IMAGE_RE
                .captures(style)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
            && !is_inline_data(url)
            && let Some(absolute) = page.absolute_url(url)
        {
            return Some(absolute);
        }
        current = element.parent().and_then(ElementRef::wrap);
    }
    None
}

fn container_description(container: ElementRef<'_>) -> Option<String> {
    [
        ("p", Some(&*DESCRIPTION_CLASS_RE)),
        ("div", Some(&*DESCRIPTION_CLASS_RE)),
        ("p", None),
    ]
    .into_iter()
    .filter_map(|(tag, class)| find_first(container, tag, class))
    .map(element_text)
    .find(|text| text.chars().count() >= MIN_DESCRIPTION_CHARS)
}

fn is_inline_data(src: &str) -> bool {
    src.trim_start().to_ascii_lowercase().starts_with("data:")
}

fn descendants_named<'a>(
    container: ElementRef<'a>,
    tag: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    container
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

fn find_first<'a>(
    container: ElementRef<'a>,
    tag: &str,
    class: Option<&Regex>,
) -> Option<ElementRef<'a>> {
    container
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().name() == tag && class.is_none_or(|re| re.is_match(class_attr(el)))
        })
}

fn class_attr<'a>(element: &ElementRef<'a>) -> &'a str {
    element.value().attr("class").unwrap_or("")
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
