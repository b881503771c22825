//! Delivery of announcements to the listener
//!
//! Speech runs on its own task behind a bounded queue so a slow synthesizer
//! never holds up feed processing. Utterances are spoken one at a time, in the
//! order they were produced.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::announcement::Announcement;

pub const DEFAULT_QUEUE_SIZE: usize = 16;

/// Fire-and-forget sink for announcements
pub trait Announcer: Send + Sync {
    fn announce(&self, announcement: Announcement);
}

impl<T: Announcer + ?Sized> Announcer for Arc<T> {
    fn announce(&self, announcement: Announcement) {
        (**self).announce(announcement)
    }
}

impl<T: Announcer + ?Sized> Announcer for Box<T> {
    fn announce(&self, announcement: Announcement) {
        (**self).announce(announcement)
    }
}

/// External speech synthesizer invocation
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Program to run; the utterance is passed as its last argument
    pub command: String,
    pub args: Vec<String>,
    pub queue_size: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            command: "espeak".to_string(),
            args: Vec::new(),
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

/// Speaks announcements through an external command
pub struct SpeechDispatcher {
    tx: flume::Sender<Announcement>,
    worker: JoinHandle<()>,
    dropped: AtomicU64,
}

impl SpeechDispatcher {
    /// Start the speech worker. Must be called inside a tokio runtime.
    pub fn spawn(config: SpeechConfig) -> Self {
        let (tx, rx) = flume::bounded::<Announcement>(config.queue_size.max(1));

        let worker = tokio::spawn(
            async move {
                info!("Speech worker started ({})", config.command);
                while let Ok(announcement) = rx.recv_async().await {
                    metrics::gauge!("overhead.speech.queue_depth").set(rx.len() as f64);
                    match speak(&config, &announcement).await {
                        Ok(()) => {
                            metrics::counter!("overhead.speech.spoken_total").increment(1);
                        }
                        Err(e) => {
                            error!("Failed to speak announcement for {}: {:#}", announcement.identifier, e);
                            metrics::counter!("overhead.speech.failed_total").increment(1);
                        }
                    }
                }
                info!("Speech worker stopped");
            }
            .instrument(tracing::info_span!("speech")),
        );

        Self {
            tx,
            worker,
            dropped: AtomicU64::new(0),
        }
    }

    /// Announcements discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue and wait for everything already queued to be spoken
    pub async fn finish(self) -> Result<()> {
        let pending = self.tx.len();
        if pending > 0 {
            info!("Waiting for {} queued announcements", pending);
        }
        drop(self.tx);
        self.worker.await.context("Speech worker panicked")
    }
}

impl Announcer for SpeechDispatcher {
    fn announce(&self, announcement: Announcement) {
        match self.tx.try_send(announcement) {
            Ok(()) => {}
            Err(flume::TrySendError::Full(announcement)) => {
                warn!(
                    "Speech queue full, dropping announcement for {}: {}",
                    announcement.identifier, announcement.utterance
                );
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("overhead.speech.dropped_total").increment(1);
            }
            Err(flume::TrySendError::Disconnected(announcement)) => {
                error!(
                    "Speech worker gone, dropping announcement for {}",
                    announcement.identifier
                );
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("overhead.speech.dropped_total").increment(1);
            }
        }
    }
}

async fn speak(config: &SpeechConfig, announcement: &Announcement) -> Result<()> {
    debug!("Speaking: {}", announcement.utterance);
    let status = Command::new(&config.command)
        .args(&config.args)
        .arg(&announcement.utterance)
        .stdin(Stdio::null())
        .status()
        .await
        .with_context(|| format!("Failed to run speech command '{}'", config.command))?;

    if !status.success() {
        bail!("Speech command '{}' exited with {}", config.command, status);
    }
    Ok(())
}

/// Dry-run output: prints each utterance instead of speaking it
#[derive(Debug, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, announcement: Announcement) {
        info!("Announce {}: {}", announcement.identifier, announcement.utterance);
        println!("{}", announcement.utterance);
    }
}
