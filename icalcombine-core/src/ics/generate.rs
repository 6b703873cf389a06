//! ICS generation for the combined calendar.

use std::borrow::Cow;

use super::{CombinedCalendar, RawComponent, RawProperty};

/// RFC 5545 content lines are limited to 75 octets, excluding the CRLF.
const MAX_LINE_OCTETS: usize = 75;

impl CombinedCalendar {
    /// Serialize as an RFC 5545 document with CRLF line endings.
    pub fn to_ics(&self) -> String {
        let mut out = String::new();
        push_line(&mut out, "BEGIN:VCALENDAR");
        push_line(&mut out, &format!("PRODID:{}", self.product_id));
        push_line(&mut out, &format!("VERSION:{}", self.version));
        for event in &self.events {
            write_component(&mut out, event);
        }
        push_line(&mut out, "END:VCALENDAR");
        out
    }
}

fn write_component(out: &mut String, component: &RawComponent) {
    push_line(out, &format!("BEGIN:{}", component.name));
    for property in &component.properties {
        push_line(out, &content_line(property));
    }
    for child in &component.components {
        write_component(out, child);
    }
    push_line(out, &format!("END:{}", component.name));
}

fn content_line(property: &RawProperty) -> String {
    let mut line = property.name.clone();
    for (key, value) in &property.params {
        line.push(';');
        line.push_str(key);
        if let Some(value) = value {
            line.push('=');
            line.push_str(&quote_param(value));
        }
    }
    line.push(':');
    line.push_str(&property.value);
    line
}

/// Parameter values containing `:`, `;` or `,` must be DQUOTE-wrapped.
fn quote_param(value: &str) -> Cow<'_, str> {
    if !value.starts_with('"') && value.contains([':', ';', ',']) {
        Cow::Owned(format!("\"{value}\""))
    } else {
        Cow::Borrowed(value)
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(&fold_line(line));
    out.push_str("\r\n");
}

/// Fold a content line at 75 octets without splitting a UTF-8 character.
/// Continuation lines start with a single space.
pub fn fold_line(line: &str) -> String {
    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;

    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            folded.push_str("\r\n ");
            width = 1;
        }
        folded.push(ch);
        width += len;
    }

    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ics::{PRODUCT_ID, extract_events};

    fn event(summary: &str) -> RawComponent {
        let prop = |name: &str, value: &str| RawProperty {
            name: name.to_string(),
            params: vec![],
            value: value.to_string(),
        };
        RawComponent {
            name: "VEVENT".to_string(),
            properties: vec![
                prop("UID", &format!("{summary}@test")),
                prop("SUMMARY", summary),
                prop("DTSTART", "20250320T150000Z"),
            ],
            components: vec![],
        }
    }

    #[test]
    fn test_to_ics_envelope() {
        let ics = CombinedCalendar::new().to_ics();
        assert_eq!(
            ics,
            format!("BEGIN:VCALENDAR\r\nPRODID:{PRODUCT_ID}\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n")
        );
    }

    #[test]
    fn test_to_ics_reparses_to_same_events() {
        let mut combined = CombinedCalendar::new();
        combined.extend([event("Standup"), event("Retro"), event("Standup")]);

        let events = extract_events(&combined.to_ics()).expect("Should reparse");

        let summaries: Vec<_> = events.iter().filter_map(|e| e.summary()).collect();
        assert_eq!(summaries, vec!["Standup", "Retro", "Standup"], "duplicates kept");
    }

    #[test]
    fn test_long_values_fold_and_unfold() {
        let long = "Quarterly planning with the whole team, ".repeat(5);
        let mut combined = CombinedCalendar::new();
        combined.extend([event(long.trim_end())]);

        let ics = combined.to_ics();
        assert!(ics.split("\r\n").all(|line| line.len() <= MAX_LINE_OCTETS));

        let events = extract_events(&ics).unwrap();
        assert_eq!(events[0].summary(), Some(long.trim_end()));
    }

    #[test]
    fn test_fold_line_keeps_multibyte_chars_whole() {
        let line = format!("SUMMARY:{}", "ü".repeat(60));
        let folded = fold_line(&line);

        for segment in folded.split("\r\n") {
            assert!(segment.len() <= MAX_LINE_OCTETS);
        }
        assert_eq!(folded.replace("\r\n ", ""), line);
    }

    #[test]
    fn test_quote_param() {
        assert_eq!(quote_param("Europe/Berlin"), "Europe/Berlin");
        assert_eq!(quote_param("Doe, Jane"), "\"Doe, Jane\"");
        assert_eq!(quote_param("\"mailto:a@b\""), "\"mailto:a@b\"");
    }
}
