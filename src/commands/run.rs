use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::announcement::{Announcement, AnnouncementEngine, CrossingMode};
use crate::clock::FeedClock;
use crate::config::Settings;
use crate::dispatcher::{Announcer, LogAnnouncer, SpeechDispatcher};
use crate::live::{CLEAR_SCREEN, LiveTable};
use crate::sbs::{SbsFeed, parse_sbs_message};

const LIVE_REFRESH: Duration = Duration::from_millis(500);

/// Where announcements go for this run
enum Output {
    Speech(SpeechDispatcher),
    DryRun(LogAnnouncer),
}

impl Announcer for Output {
    fn announce(&self, announcement: Announcement) {
        match self {
            Output::Speech(dispatcher) => dispatcher.announce(announcement),
            Output::DryRun(log) => log.announce(announcement),
        }
    }
}

/// Run until the feed ends or Ctrl-C. Queued speech is spoken before this
/// returns; a failing feed makes the result an error.
pub async fn handle_run(settings: Settings) -> Result<()> {
    settings.validate()?;
    let decision = settings.decision_config()?;
    let source = settings.feed_source()?;

    info!(
        "Observer at {:.5},{:.5} {}ft, announcing above {} degrees",
        decision.observer.latitude,
        decision.observer.longitude,
        decision.observer.altitude_ft,
        decision.threshold_deg
    );
    if let CrossingMode::Predictive(window) = decision.mode {
        info!(
            "Predictive announcements, looking ahead {}ms",
            window.look_ahead.num_milliseconds()
        );
    }

    let output = if settings.speech.dry_run {
        info!("Dry run, utterances go to stdout");
        Output::DryRun(LogAnnouncer)
    } else {
        Output::Speech(SpeechDispatcher::spawn(settings.speech_config()))
    };
    let engine = AnnouncementEngine::new(decision, output);

    let mut raw_log = match settings.log.raw {
        Some(ref path) => {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("Failed to open raw log {:?}", path))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let mut clock = FeedClock::new(settings.feed.message_clock);
    let mut feed = SbsFeed::open(source).await?;

    let mut tick = tokio::time::interval(settings.tick_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sweep = tokio::time::interval(settings.sweep_interval());
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut live = tokio::time::interval(LIVE_REFRESH);
    live.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result: Result<()> = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received shutdown signal (Ctrl+C), stopping");
                break Ok(());
            }
            line = feed.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                };

                if let Some(ref mut writer) = raw_log {
                    let written = async {
                        writer.write_all(line.as_bytes()).await?;
                        writer.write_all(b"\n").await
                    }
                    .await;
                    if let Err(e) = written {
                        warn!("Failed writing raw log, disabling it: {}", e);
                        raw_log = None;
                    }
                }

                if clock.is_message_clock() {
                    match parse_sbs_message(&line) {
                        Ok(msg) => {
                            let now = clock.observe(msg.generated_at);
                            engine.process_message(&msg, now);
                            engine.tick(now);
                        }
                        Err(_) => {
                            engine.process_line(&line, clock.now());
                        }
                    }
                } else {
                    engine.process_line(&line, clock.now());
                }
            }
            _ = tick.tick() => {
                engine.tick(clock.now());
            }
            _ = sweep.tick() => {
                let evicted = engine.sweep(clock.now());
                debug!(
                    "Tracking {} aircraft after evicting {}",
                    engine.registry().len(),
                    evicted.len()
                );
            }
            _ = live.tick(), if settings.log.live => {
                let table = LiveTable::capture(
                    engine.registry(),
                    &engine.config().observer,
                    engine.config().radio_failure,
                    clock.now(),
                );
                print!("{CLEAR_SCREEN}{table}");
            }
        }
    };

    if let Some(mut writer) = raw_log
        && let Err(e) = writer.flush().await
    {
        warn!("Failed flushing raw log: {}", e);
    }

    info!("Processed {} lines from {}", feed.line_count(), feed.source());
    let closed = feed.close().await;

    if let Output::Speech(dispatcher) = engine.into_announcer() {
        if dispatcher.dropped() > 0 {
            warn!("{} announcements were dropped with the speech queue full", dispatcher.dropped());
        }
        dispatcher.finish().await?;
    }

    result.and(closed)
}
