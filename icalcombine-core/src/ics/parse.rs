//! ICS parsing using the icalendar crate's parser.

use std::path::Path;

use icalendar::parser::{read_calendar, unfold};

use super::{RawComponent, RawProperty};
use crate::error::{CombineError, CombineResult};

const BOM: char = '\u{feff}';

/// `content` without a leading UTF-8 byte-order mark.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix(BOM).unwrap_or(content)
}

/// Read `path` as UTF-8 and, if it starts with a byte-order mark, rewrite
/// it without one. Some calendar consumers (Google Calendar among them)
/// silently show nothing for feeds that carry a BOM.
///
/// Running this on an already normalized file leaves it untouched.
pub fn normalize_bom(path: &Path) -> CombineResult<String> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8(bytes)
        .map_err(|e| CombineError::IcsParse(format!("not valid UTF-8: {e}")))?;

    match content.strip_prefix(BOM) {
        Some(stripped) => {
            std::fs::write(path, stripped)?;
            Ok(stripped.to_string())
        }
        None => Ok(content),
    }
}

/// Parse a calendar document and return every VEVENT in encounter order,
/// including events nested below other components.
///
/// The icalendar parser validates the document, but it unescapes TEXT
/// values, so the events themselves are lifted from the unfolded content
/// lines with every value and parameter kept exactly as written.
pub fn extract_events(content: &str) -> CombineResult<Vec<RawComponent>> {
    let content = strip_bom(content);
    check_envelope(content)?;

    let unfolded = unfold(content);
    read_calendar(&unfolded).map_err(|e| CombineError::IcsParse(e.to_string()))?;

    let mut events = Vec::new();
    for component in scan_components(&unfolded)? {
        collect_events(component, &mut events);
    }
    Ok(events)
}

/// The parser is lenient about truncated input, so insist on a complete
/// VCALENDAR before trusting it.
fn check_envelope(content: &str) -> CombineResult<()> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    match (lines.first(), lines.last()) {
        (Some(first), Some(last))
            if first.eq_ignore_ascii_case("BEGIN:VCALENDAR")
                && last.eq_ignore_ascii_case("END:VCALENDAR") =>
        {
            Ok(())
        }
        _ => Err(CombineError::IcsParse(
            "not a complete VCALENDAR document".into(),
        )),
    }
}

/// Build the component tree from unfolded content lines.
fn scan_components(unfolded: &str) -> CombineResult<Vec<RawComponent>> {
    let mut open: Vec<RawComponent> = Vec::new();
    let mut roots = Vec::new();

    for line in unfolded.lines().filter(|line| !line.trim().is_empty()) {
        let property = split_content_line(line)?;

        if property.name.eq_ignore_ascii_case("BEGIN") {
            open.push(RawComponent {
                name: property.value,
                properties: Vec::new(),
                components: Vec::new(),
            });
        } else if property.name.eq_ignore_ascii_case("END") {
            let done = open
                .pop()
                .filter(|c| c.name.eq_ignore_ascii_case(&property.value))
                .ok_or_else(|| {
                    CombineError::IcsParse(format!("unexpected END:{}", property.value))
                })?;
            match open.last_mut() {
                Some(parent) => parent.components.push(done),
                None => roots.push(done),
            }
        } else if let Some(current) = open.last_mut() {
            current.properties.push(property);
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(CombineError::IcsParse(format!(
            "component {} is never closed",
            unclosed.name
        )));
    }
    Ok(roots)
}

/// Split `NAME;PARAM=VALUE:value` on the first `;` and `:` outside quotes.
fn split_content_line(line: &str) -> CombineResult<RawProperty> {
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut value_start = None;
    let mut quoted = false;

    for (i, ch) in line.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                segments.push(&line[segment_start..i]);
                segment_start = i + 1;
            }
            ':' if !quoted => {
                segments.push(&line[segment_start..i]);
                value_start = Some(i + 1);
                break;
            }
            _ => {}
        }
    }

    let malformed = || CombineError::IcsParse(format!("malformed content line: {line}"));
    let value_start = value_start.ok_or_else(malformed)?;
    let mut segments = segments.into_iter();
    let name = segments.next().filter(|name| !name.is_empty()).ok_or_else(malformed)?;

    Ok(RawProperty {
        name: name.to_string(),
        params: segments
            .map(|param| match param.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (param.to_string(), None),
            })
            .collect(),
        value: line[value_start..].to_string(),
    })
}

fn collect_events(component: RawComponent, events: &mut Vec<RawComponent>) {
    if component.name.eq_ignore_ascii_case("VEVENT") {
        events.push(component);
        return;
    }
    for child in component.components {
        collect_events(child, events);
    }
}
