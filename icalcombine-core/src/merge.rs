//! Calendar Merger: folds every downloaded file into one `calendar.ics`.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::FailedFilePolicy;
use crate::directory::list_files;
use crate::error::CombineResult;
use crate::ics::{CombinedCalendar, RawComponent, extract_events, normalize_bom};

/// Name of the merged file in the export directory.
pub const OUTPUT_FILE_NAME: &str = "calendar.ics";

#[derive(Debug)]
pub enum MergeOutcome {
    Written {
        path: PathBuf,
        events: usize,
        skipped: Vec<SkippedFile>,
    },
    /// The download directory was empty; nothing was written.
    NoInput,
}

/// A file whose events could not be absorbed.
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct CalendarMerger {
    download_dir: PathBuf,
    export_dir: PathBuf,
    failed_files: FailedFilePolicy,
}

impl CalendarMerger {
    pub fn new(download_dir: PathBuf, export_dir: PathBuf, failed_files: FailedFilePolicy) -> Self {
        CalendarMerger {
            download_dir,
            export_dir,
            failed_files,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.export_dir.join(OUTPUT_FILE_NAME)
    }

    /// Merge every file in the download directory, in file-name order, and
    /// write the result. Consumed files are deleted; files that fail to
    /// parse follow the configured [`FailedFilePolicy`].
    ///
    /// Per-file problems are logged and skipped. Only an unreadable
    /// download directory or an unwritable output file is an error.
    pub fn merge(&self) -> CombineResult<MergeOutcome> {
        let mut combined = CombinedCalendar::new();
        debug!("Created combined calendar object");

        let files = list_files(&self.download_dir)?;
        if files.is_empty() {
            error!(
                "No ics files seem to be in the download directory {}. quitting...",
                self.download_dir.display()
            );
            return Ok(MergeOutcome::NoInput);
        }

        let mut skipped = Vec::new();
        for file in &files {
            debug!("Reading from ics file {}", file.display());

            match absorb(file) {
                Ok(events) => {
                    for event in &events {
                        debug!("Event added: {}", event.summary().unwrap_or("(No title)"));
                    }
                    combined.extend(events);
                    remove(file);
                }
                Err(e) => {
                    error!(
                        "Something went wrong reading from ics file {}: {e}",
                        file.display()
                    );
                    if self.failed_files == FailedFilePolicy::Delete {
                        remove(file);
                    } else {
                        info!("Keeping {} for inspection", file.display());
                    }
                    skipped.push(SkippedFile {
                        path: file.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let path = self.output_path();
        std::fs::write(&path, combined.to_ics())?;
        info!("Calendar export file at {}", path.display());

        Ok(MergeOutcome::Written {
            path,
            events: combined.events.len(),
            skipped,
        })
    }
}

fn absorb(file: &Path) -> CombineResult<Vec<RawComponent>> {
    let content = normalize_bom(file)?;
    extract_events(&content)
}

fn remove(file: &Path) {
    if let Err(e) = std::fs::remove_file(file) {
        warn!("Could not delete {}: {e}", file.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn calendar(uid: &str, summary: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//CryptPad//Calendar//EN\r\n\
BEGIN:VEVENT\r\n\
UID:{uid}\r\n\
SUMMARY:{summary}\r\n\
DTSTART:20250320T150000Z\r\n\
DTEND:20250320T160000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n"
        )
    }

    struct Dirs {
        download: TempDir,
        export: TempDir,
    }

    impl Dirs {
        fn new() -> Self {
            Dirs {
                download: tempfile::tempdir().unwrap(),
                export: tempfile::tempdir().unwrap(),
            }
        }

        fn add(&self, name: &str, content: impl AsRef<[u8]>) {
            std::fs::write(self.download.path().join(name), content).unwrap();
        }

        fn merger(&self, policy: FailedFilePolicy) -> CalendarMerger {
            CalendarMerger::new(
                self.download.path().to_path_buf(),
                self.export.path().to_path_buf(),
                policy,
            )
        }

        fn output_summaries(&self) -> Vec<String> {
            let content = std::fs::read_to_string(self.export.path().join(OUTPUT_FILE_NAME))
                .expect("Output file should exist");
            extract_events(&content)
                .expect("Output should parse")
                .iter()
                .filter_map(|e| e.summary().map(str::to_string))
                .collect()
        }

        fn remaining(&self) -> Vec<PathBuf> {
            list_files(self.download.path()).unwrap()
        }
    }

    #[test]
    fn test_merge_two_files() {
        let dirs = Dirs::new();
        dirs.add("a-team.ics", calendar("standup-1", "Standup"));
        dirs.add("b-team.ics", calendar("retro-1", "Retro"));

        let outcome = dirs.merger(FailedFilePolicy::Delete).merge().unwrap();

        match outcome {
            MergeOutcome::Written { events, skipped, .. } => {
                assert_eq!(events, 2);
                assert!(skipped.is_empty());
            }
            other => panic!("Expected Written, got {other:?}"),
        }
        assert_eq!(dirs.output_summaries(), vec!["Standup", "Retro"]);
        assert!(dirs.remaining().is_empty(), "download directory must be empty");
    }

    #[test]
    fn test_merge_empty_directory_writes_nothing() {
        let dirs = Dirs::new();

        let outcome = dirs.merger(FailedFilePolicy::Delete).merge().unwrap();

        assert!(matches!(outcome, MergeOutcome::NoInput));
        assert!(!dirs.export.path().join(OUTPUT_FILE_NAME).exists());
    }

    #[test]
    fn test_merge_skips_corrupted_file_and_deletes_both() {
        let dirs = Dirs::new();
        dirs.add("a-broken.ics", "<html>Service Unavailable</html>");
        dirs.add("b-good.ics", calendar("retro-1", "Retro"));

        let outcome = dirs.merger(FailedFilePolicy::Delete).merge().unwrap();

        match outcome {
            MergeOutcome::Written { events, skipped, .. } => {
                assert_eq!(events, 1);
                assert_eq!(skipped.len(), 1);
                assert!(skipped[0].path.ends_with("a-broken.ics"));
            }
            other => panic!("Expected Written, got {other:?}"),
        }
        assert_eq!(dirs.output_summaries(), vec!["Retro"]);
        assert!(dirs.remaining().is_empty());
    }

    #[test]
    fn test_merge_keep_policy_leaves_failed_file() {
        let dirs = Dirs::new();
        dirs.add("a-broken.ics", [0xffu8, 0xfe, 0x00]);
        dirs.add("b-good.ics", calendar("retro-1", "Retro"));

        dirs.merger(FailedFilePolicy::Keep).merge().unwrap();

        assert_eq!(dirs.output_summaries(), vec!["Retro"]);
        let remaining = dirs.remaining();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with("a-broken.ics"));
    }

    #[test]
    fn test_merge_strips_bom_and_keeps_duplicates() {
        let dirs = Dirs::new();
        dirs.add("a.ics", format!("\u{feff}{}", calendar("standup-1", "Standup")));
        dirs.add("b.ics", calendar("standup-1", "Standup"));

        dirs.merger(FailedFilePolicy::Delete).merge().unwrap();

        let output = std::fs::read(dirs.export.path().join(OUTPUT_FILE_NAME)).unwrap();
        assert!(!output.starts_with("\u{feff}".as_bytes()));
        assert_eq!(dirs.output_summaries(), vec!["Standup", "Standup"]);
    }

    #[test]
    fn test_merge_overwrites_previous_output() {
        let dirs = Dirs::new();
        std::fs::write(dirs.export.path().join(OUTPUT_FILE_NAME), "stale").unwrap();
        dirs.add("a.ics", calendar("retro-1", "Retro"));

        dirs.merger(FailedFilePolicy::Delete).merge().unwrap();

        assert_eq!(dirs.output_summaries(), vec!["Retro"]);
    }

    #[test]
    fn test_merge_output_header() {
        let dirs = Dirs::new();
        dirs.add("a.ics", calendar("retro-1", "Retro"));

        dirs.merger(FailedFilePolicy::Delete).merge().unwrap();

        let content = std::fs::read_to_string(dirs.export.path().join(OUTPUT_FILE_NAME)).unwrap();
        assert!(content.starts_with(
            "BEGIN:VCALENDAR\r\nPRODID:-//icalcombine//ORG//EN\r\nVERSION:2.0\r\n"
        ));
        assert!(content.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_merge_carries_escaped_text_and_quoted_params_unchanged() {
        let source = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//CryptPad//Calendar//EN\r\n\
BEGIN:VEVENT\r\n\
UID:planning-1\r\n\
SUMMARY:Planning\\, Q3\\; budget\r\n\
DESCRIPTION:Agenda:\\nitem one\\, two\\; three\\\\four\r\n\
ATTENDEE;CN=\"Doe, Jane\";ROLE=REQ-PARTICIPANT:mailto:jane@example.com\r\n\
DTSTART;TZID=Europe/Berlin:20250320T090000\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO,WE;UNTIL=20251231T000000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
        let expected = extract_events(source).expect("Source should parse");

        let dirs = Dirs::new();
        dirs.add("a.ics", source);
        dirs.merger(FailedFilePolicy::Delete).merge().unwrap();

        let content = std::fs::read_to_string(dirs.export.path().join(OUTPUT_FILE_NAME)).unwrap();
        assert!(content.contains(r"DESCRIPTION:Agenda:\nitem one\, two\; three\\four"));
        assert!(content.contains("ATTENDEE;CN=\"Doe, Jane\";ROLE=REQ-PARTICIPANT:mailto:"));
        let unfolded = content.replace("\r\n ", "");
        assert!(
            unfolded.split("\r\n").all(|line| line.is_empty() || line.contains(':')),
            "every content line has a value"
        );

        let events = extract_events(&content).expect("Output should parse");
        assert_eq!(events, expected);
    }

    #[test]
    fn test_merge_missing_download_directory_is_error() {
        let dirs = Dirs::new();
        let merger = CalendarMerger::new(
            dirs.download.path().join("missing"),
            dirs.export.path().to_path_buf(),
            FailedFilePolicy::Delete,
        );

        assert!(merger.merge().is_err());
    }
}
