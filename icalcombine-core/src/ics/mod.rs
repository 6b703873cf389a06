//! ICS reading and writing.
//!
//! Events are carried through opaquely: every property keeps its name,
//! parameters and raw (still escaped) value, and nested components such as
//! VALARM come along unchanged.

mod generate;
mod parse;

pub use generate::fold_line;
pub use parse::{extract_events, normalize_bom, strip_bom};

/// Product identifier written into the combined calendar.
pub const PRODUCT_ID: &str = "-//icalcombine//ORG//EN";

pub const VERSION: &str = "2.0";

/// One content line, e.g. `DTSTART;TZID=Europe/Berlin:20250320T150000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub name: String,
    pub params: Vec<(String, Option<String>)>,
    pub value: String,
}

/// A component copied verbatim from a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComponent {
    pub name: String,
    pub properties: Vec<RawProperty>,
    pub components: Vec<RawComponent>,
}

impl RawComponent {
    pub fn property(&self, name: &str) -> Option<&RawProperty> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn summary(&self) -> Option<&str> {
        self.property("SUMMARY").map(|p| p.value.as_str())
    }
}

/// The single calendar every source's events are gathered into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedCalendar {
    pub product_id: String,
    pub version: String,
    pub events: Vec<RawComponent>,
}

impl CombinedCalendar {
    pub fn new() -> Self {
        CombinedCalendar {
            product_id: PRODUCT_ID.to_string(),
            version: VERSION.to_string(),
            events: Vec::new(),
        }
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = RawComponent>) {
        self.events.extend(events);
    }
}

impl Default for CombinedCalendar {
    fn default() -> Self {
        Self::new()
    }
}
