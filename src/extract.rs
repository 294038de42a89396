use crate::heuristic::HeuristicHtmlExtractor;
use crate::model::{EventRecord, ExtractionStage, RawPage};
use crate::oracle::{EventOracle, OracleStrategy};
use crate::structured::StructuredDataExtractor;
use tracing::info;

pub trait ExtractionStrategy {
    fn stage(&self) -> ExtractionStage;
    fn extract(&self, page: &RawPage, venue: &str) -> Vec<EventRecord>;
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub stage: ExtractionStage,
    pub records: Vec<EventRecord>,
}

pub fn default_strategies(
    oracle: Box<dyn EventOracle>,
    max_html_chars: usize,
) -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(StructuredDataExtractor),
        Box::new(HeuristicHtmlExtractor),
        Box::new(OracleStrategy::new(oracle, max_html_chars)),
    ]
}

pub fn run_strategies(
    strategies: &[Box<dyn ExtractionStrategy>],
    page: &RawPage,
    venue: &str,
) -> Option<Extraction> {
    for strategy in strategies {
        let stage = strategy.stage();
        let records = strategy.extract(page, venue);
        if records.is_empty() {
            info!(venue = %venue, stage = stage.as_str(), "stage found no events; falling through");
            continue;
        }

        info!(
            venue = %venue,
            stage = stage.as_str(),
            events = records.len(),
            "stage extracted events"
        );
        return Some(Extraction { stage, records });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Fixed {
        stage: ExtractionStage,
        names: Vec<&'static str>,
        calls: Rc<Cell<usize>>,
    }

    impl ExtractionStrategy for Fixed {
        fn stage(&self) -> ExtractionStage {
            self.stage
        }

        fn extract(&self, _page: &RawPage, venue: &str) -> Vec<EventRecord> {
            self.calls.set(self.calls.get() + 1);
            self.names
                .iter()
                .map(|name| {
                    let mut record = EventRecord::for_venue(venue);
                    record.set_name(name);
                    record
                })
                .collect()
        }
    }

    #[test]
    fn first_non_empty_stage_wins() {
        let later_calls = Rc::new(Cell::new(0));
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(Fixed {
                stage: ExtractionStage::StructuredData,
                names: vec![],
                calls: Rc::new(Cell::new(0)),
            }),
            Box::new(Fixed {
                stage: ExtractionStage::Heuristic,
                names: vec!["Found It"],
                calls: Rc::new(Cell::new(0)),
            }),
            Box::new(Fixed {
                stage: ExtractionStage::Oracle,
                names: vec!["Never"],
                calls: later_calls.clone(),
            }),
        ];

        let page = RawPage::parse("<html></html>", None);
        let extraction = run_strategies(&strategies, &page, "v").unwrap();
        assert_eq!(extraction.stage, ExtractionStage::Heuristic);
        assert_eq!(extraction.records[0].event_name, "Found It");
        assert_eq!(later_calls.get(), 0);
    }

    #[test]
    fn all_empty_is_none() {
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![Box::new(Fixed {
            stage: ExtractionStage::Heuristic,
            names: vec![],
            calls: Rc::new(Cell::new(0)),
        })];
        let page = RawPage::parse("<html></html>", None);
        assert!(run_strategies(&strategies, &page, "v").is_none());
    }
}
