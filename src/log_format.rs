//! Log line format with the aircraft in front.
//!
//! Default tracing format: `LEVEL aircraft{icao=A1B2C3}: target: message`
//! This format:            `LEVEL target: aircraft{icao=A1B2C3}: message`
//!
//! Colour is only emitted when the writer supports ANSI escapes, so the same
//! format serves the console and the `-l` log file (which adds timestamps).

use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::{FmtContext, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone, Copy, Default)]
pub struct AircraftLogFormat {
    timestamps: bool,
}

impl AircraftLogFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix each line with the local time
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }
}

impl<S, N> FormatEvent<S, N> for AircraftLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        if self.timestamps {
            write!(
                writer,
                "{} ",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
            )?;
        }

        match level_colour(metadata.level()) {
            Some(colour) if writer.has_ansi_escapes() => {
                write!(writer, "{}{:>5}\x1b[0m ", colour, metadata.level())?
            }
            _ => write!(writer, "{:>5} ", metadata.level())?,
        }

        write!(writer, "{}: ", metadata.target())?;

        if let Some(scope) = ctx.event_scope() {
            let spans: Vec<String> = scope
                .from_root()
                .map(|span| {
                    let extensions = span.extensions();
                    match extensions.get::<FormattedFields<N>>() {
                        Some(fields) if !fields.is_empty() => {
                            format!("{}{{{}}}", span.name(), fields)
                        }
                        _ => span.name().to_string(),
                    }
                })
                .collect();
            if !spans.is_empty() {
                write!(writer, "{}: ", spans.join(":"))?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn level_colour(level: &Level) -> Option<&'static str> {
    Some(match *level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[36m",
        Level::TRACE => return None,
    })
}
