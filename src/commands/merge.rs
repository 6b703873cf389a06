use anyhow::Result;
use icalcombine_core::{CalendarMerger, MergeOutcome};
use tracing::{info, warn};

use super::RunContext;

pub fn run(ctx: &RunContext) -> Result<()> {
    let merger = CalendarMerger::new(
        ctx.download_dir.clone(),
        ctx.export_dir.clone(),
        ctx.config.failed_files,
    );

    match merger.merge()? {
        MergeOutcome::Written { events, skipped, .. } => {
            info!("Merged {events} events");
            for file in &skipped {
                warn!("Skipped {}: {}", file.path.display(), file.reason);
            }
        }
        // Already reported by the merger; the run simply ends without output
        MergeOutcome::NoInput => {}
    }

    Ok(())
}
