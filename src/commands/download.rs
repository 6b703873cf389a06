use anyhow::Result;
use icalcombine_core::browser::chromium::ChromiumLauncher;
use icalcombine_core::{BatchDownloader, BatchReport, InterruptSignal, SourceAcquirer};
use tracing::info;

use super::RunContext;

pub async fn run(ctx: &RunContext) -> Result<BatchReport> {
    let settings = &ctx.config.browser;
    let launcher = ChromiumLauncher::new(settings.executable.clone(), settings.headless);

    let interrupt = InterruptSignal::new();
    let acquirer = SourceAcquirer::new(
        launcher,
        ctx.download_dir.clone(),
        ctx.config.export_sequence.clone(),
        settings,
    )
    .with_interrupt(interrupt.clone());

    info!(
        "Downloading {} calendar(s) into {}",
        ctx.config.sources.len(),
        ctx.download_dir.display()
    );

    // Ctrl+C skips the calendar being downloaded instead of killing the run
    let ctrl_c = interrupt.listen_for_ctrl_c();
    let report = BatchDownloader::new(acquirer)
        .run(&ctx.config.sources)
        .await;
    ctrl_c.abort();

    info!(
        "{} of {} downloads succeeded",
        report.succeeded().count(),
        report.sources.len()
    );

    Ok(report)
}
