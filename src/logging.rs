//! Log output.
//!
//! The subscriber is built here and handed to the pipeline as a
//! [`Dispatch`]; nothing is installed process-wide.
//!
//! Lines look like `[250320 09:15:02][INFO][src/commands/merge.rs:21] message`.

use std::fmt;

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Event, Level, Subscriber, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

/// `[yymmdd HH:MM:SS][LEVEL][file:line] message`, level colored when the
/// writer accepts ANSI escapes.
struct BracketFormat;

impl<S, N> FormatEvent<S, N> for BracketFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let level = meta.level();

        write!(writer, "[{}]", chrono::Local::now().format("%y%m%d %H:%M:%S"))?;
        if writer.has_ansi_escapes() {
            write!(writer, "[{}]", colored_level(level))?;
        } else {
            write!(writer, "[{level}]")?;
        }
        write!(
            writer,
            "[{}:{}] ",
            meta.file().unwrap_or("?"),
            meta.line().unwrap_or(0)
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn colored_level(level: &Level) -> String {
    let name = level.as_str();
    match *level {
        Level::ERROR => name.red().bold().to_string(),
        Level::WARN => name.yellow().bold().to_string(),
        Level::INFO => name.green().bold().to_string(),
        Level::DEBUG => name.blue().bold().to_string(),
        Level::TRACE => name.magenta().bold().to_string(),
    }
}

/// Accepts tracing's level names plus `WARNING` and `CRITICAL`.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_ascii_uppercase().as_str() {
        "CRITICAL" => Some(Level::ERROR),
        "WARNING" => Some(Level::WARN),
        other => other.parse().ok(),
    }
}

fn subscriber<W>(filter: EnvFilter, color: bool, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color)
        .with_writer(writer)
        .event_format(BracketFormat)
        .finish()
}

/// Build the log dispatcher for `--loglevel`. `RUST_LOG` still wins when set.
pub fn build(level_name: &str, color: bool) -> Result<Dispatch> {
    let level = parse_level(level_name);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level.unwrap_or(Level::DEBUG)).into())
        .from_env_lossy()
        .add_directive("chromiumoxide=warn".parse()?);

    let dispatch = Dispatch::new(subscriber(filter, color, std::io::stderr));

    if level.is_none() {
        tracing::dispatcher::with_default(&dispatch, || {
            warn!("Incorrect loglevel {level_name}. Setting loglevel to DEBUG");
        });
    }

    Ok(dispatch)
}
