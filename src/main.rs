use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use overhead::announcement::Detail;
use overhead::commands;
use overhead::config::Settings;
use overhead::log_format::AircraftLogFormat;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(
    name = "overhead",
    version,
    about = "Speak up when aircraft pass overhead, from an ADS-B SBS feed"
)]
struct Cli {
    /// TOML settings file; command-line values take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Observer latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Observer longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Observer altitude in feet
    #[arg(long, allow_hyphen_values = true)]
    alt: Option<f64>,

    /// Announce aircraft at or above this elevation angle (degrees)
    #[arg(long, allow_hyphen_values = true)]
    angle: Option<f64>,

    /// Announce predicted crossings, looking this many seconds ahead
    #[arg(long, value_name = "SECS", num_args = 0..=1, default_missing_value = "5")]
    wait: Option<f64>,

    /// Treat squawk 7600 (radio failure) as an emergency
    #[arg(long)]
    radio_failure: bool,

    /// How much to say about each aircraft
    #[arg(long, value_enum)]
    detail: Option<Detail>,

    /// Stay silent when an aircraft re-crosses within this many seconds
    #[arg(long, value_name = "SECS")]
    repeat_interval: Option<u64>,

    /// Forget aircraft not heard from for this many seconds
    #[arg(long, value_name = "SECS")]
    max_age: Option<u64>,

    /// Speech synthesizer; the utterance is its last argument
    #[arg(long, value_name = "PROGRAM")]
    speech_command: Option<String>,

    /// Extra argument for the speech synthesizer (repeatable)
    #[arg(long = "speech-arg", value_name = "ARG", allow_hyphen_values = true)]
    speech_args: Vec<String>,

    /// Print announcements instead of speaking them
    #[arg(long)]
    dry_run: bool,

    /// Take time from message timestamps (for replays)
    #[arg(long)]
    message_clock: bool,

    /// Append every received SBS line to FILE
    #[arg(short = 'r', long = "raw-log", value_name = "FILE")]
    raw_log: Option<PathBuf>,

    /// Write a timestamped debug log to FILE
    #[arg(short = 'l', long = "log-file", value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Show a live table of tracked aircraft (console logging is turned off)
    #[arg(long)]
    live: bool,

    /// More output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Less output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,

    /// Run a decoder and read SBS lines from its stdout
    #[arg(long, value_name = "PROGRAM", group = "source")]
    feed_command: Option<String>,

    /// Argument for the feed command (repeatable)
    #[arg(long = "feed-arg", value_name = "ARG", allow_hyphen_values = true)]
    feed_args: Vec<String>,

    /// Connect to a BaseStation server (default localhost:30003)
    #[arg(long, value_name = "HOST:PORT", group = "source")]
    connect: Option<String>,

    /// Read SBS lines from stdin
    #[arg(long, group = "source")]
    stdin: bool,

    /// Replay SBS lines from a file
    #[arg(long, value_name = "FILE", group = "source")]
    replay: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match self.config {
            Some(ref path) => Settings::load(path)?,
            None => Settings::default(),
        };

        let observer = &mut settings.observer;
        observer.latitude = self.lat.or(observer.latitude);
        observer.longitude = self.lon.or(observer.longitude);
        observer.altitude = self.alt.or(observer.altitude);

        let trigger = &mut settings.trigger;
        if let Some(angle) = self.angle {
            trigger.angle = angle;
        }
        if self.wait.is_some() {
            trigger.wait = self.wait;
        }
        trigger.radio_failure |= self.radio_failure;
        if let Some(detail) = self.detail {
            trigger.detail = detail;
        }
        if let Some(interval) = self.repeat_interval {
            trigger.repeat_interval = interval;
        }
        if let Some(max_age) = self.max_age {
            trigger.max_age = max_age;
        }

        let speech = &mut settings.speech;
        if let Some(ref command) = self.speech_command {
            speech.command = command.clone();
        }
        if !self.speech_args.is_empty() {
            speech.args = self.speech_args.clone();
        }
        speech.dry_run |= self.dry_run;

        // A source on the command line replaces whatever the file chose
        let feed = &mut settings.feed;
        if self.feed_command.is_some() || self.connect.is_some() || self.stdin || self.replay.is_some() {
            feed.command = self.feed_command.clone();
            feed.connect = self.connect.clone();
            feed.stdin = self.stdin;
            feed.replay = self.replay.clone();
        }
        if !self.feed_args.is_empty() {
            feed.args = self.feed_args.clone();
        }
        feed.message_clock |= self.message_clock;

        if self.raw_log.is_some() {
            settings.log.raw = self.raw_log.clone();
        }
        if self.log_file.is_some() {
            settings.log.file = self.log_file.clone();
        }
        settings.log.live |= self.live;

        Ok(settings)
    }

    /// Console level: WARN, raised by each -v and lowered by each -q
    fn console_level(&self) -> LevelFilter {
        const LEVELS: [LevelFilter; 6] = [
            LevelFilter::OFF,
            LevelFilter::ERROR,
            LevelFilter::WARN,
            LevelFilter::INFO,
            LevelFilter::DEBUG,
            LevelFilter::TRACE,
        ];
        let index = (2 + self.verbose as i32 - self.quiet as i32).clamp(0, 5);
        LEVELS[index as usize]
    }
}

fn init_tracing(console_level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .event_format(AircraftLogFormat::new())
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .event_format(AircraftLogFormat::new().with_timestamps())
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("overhead: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let console_level = if settings.log.live {
        LevelFilter::OFF
    } else {
        cli.console_level()
    };
    if let Err(e) = init_tracing(console_level, settings.log.file.as_deref()) {
        eprintln!("overhead: {:#}", e);
        return ExitCode::FAILURE;
    }

    match commands::handle_run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
