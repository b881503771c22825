use anyhow::{Context, Result, anyhow, bail};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info, trace, warn};

/// Default BaseStation port of dump1090 and friends
pub const DEFAULT_SBS_ADDRESS: &str = "localhost:30003";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Where SBS lines come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// A decoder process whose stdout is the feed
    Command { program: String, args: Vec<String> },
    /// A BaseStation TCP server
    Tcp { address: String },
    Stdin,
    /// A recorded feed, read to the end
    File(PathBuf),
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedSource::Command { program, args } => {
                write!(f, "command '{}", program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, "'")
            }
            FeedSource::Tcp { address } => write!(f, "tcp {address}"),
            FeedSource::Stdin => write!(f, "stdin"),
            FeedSource::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

type LineReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

/// Line reader over one feed source
pub struct SbsFeed {
    source: FeedSource,
    reader: LineReader,
    child: Option<Child>,
    /// Give up on a TCP feed that stays silent this long
    idle_timeout: Option<Duration>,
    eof: bool,
    line_count: u64,
    buffer: Vec<u8>,
    last_stats_log: Instant,
}

impl SbsFeed {
    /// Open the source: spawn the command, connect, or open the file
    pub async fn open(source: FeedSource) -> Result<Self> {
        let mut child = None;
        let mut idle_timeout = None;

        let input: Box<dyn AsyncRead + Send + Unpin> = match &source {
            FeedSource::Command { program, args } => {
                info!("Starting feed command {}", source);
                let mut spawned = Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true)
                    .spawn()
                    .with_context(|| format!("Failed to start feed command '{}'", program))?;
                let stdout = spawned
                    .stdout
                    .take()
                    .ok_or_else(|| anyhow!("Feed command '{}' has no stdout", program))?;
                child = Some(spawned);
                Box::new(stdout)
            }
            FeedSource::Tcp { address } => {
                info!("Connecting to SBS server at {}", address);
                let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
                    .await
                    .map_err(|_| anyhow!("Timed out connecting to {}", address))?
                    .with_context(|| format!("Failed to connect to SBS server at {}", address))?;
                info!("Connected to SBS server at {}", address);
                metrics::gauge!("overhead.feed.connected").set(1.0);
                idle_timeout = Some(Duration::from_secs(300));
                Box::new(stream)
            }
            FeedSource::Stdin => {
                info!("Reading SBS lines from stdin");
                Box::new(tokio::io::stdin())
            }
            FeedSource::File(path) => {
                info!("Replaying SBS lines from {}", path.display());
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open replay file {}", path.display()))?;
                Box::new(file)
            }
        };

        Ok(Self {
            source,
            reader: BufReader::new(input),
            child,
            idle_timeout,
            eof: false,
            line_count: 0,
            buffer: Vec::with_capacity(256),
            last_stats_log: Instant::now(),
        })
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    /// Next line without its terminator, or `None` at end of feed.
    ///
    /// Cancel-safe: bytes of a line still arriving when the future is dropped
    /// stay buffered and the next call completes that line.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }

        let read = self.reader.read_until(b'\n', &mut self.buffer);
        let n = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| anyhow!("No data from {} for {}s", self.source, limit.as_secs()))?,
            None => read.await,
        }
        .with_context(|| format!("Failed reading from {}", self.source))?;

        if n == 0 {
            info!("End of feed from {} after {} lines", self.source, self.line_count);
            self.eof = true;
            if matches!(self.source, FeedSource::Tcp { .. }) {
                metrics::gauge!("overhead.feed.connected").set(0.0);
            }
            // Unterminated tail left over from an interrupted read
            if self.buffer.is_empty() {
                return Ok(None);
            }
        }

        // SBS is ASCII; a corrupted byte should cost one line, not the feed
        let line = String::from_utf8_lossy(&self.buffer)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.buffer.clear();
        trace!("Received SBS line: {}", line);
        self.line_count += 1;
        metrics::counter!("overhead.feed.lines_total").increment(1);

        if self.last_stats_log.elapsed() >= STATS_INTERVAL {
            let rate = self.line_count as f64 / self.last_stats_log.elapsed().as_secs_f64();
            debug!("Feed stats: {:.1} lines/s, {} total", rate, self.line_count);
            self.last_stats_log = Instant::now();
        }

        Ok(Some(line))
    }

    /// Release the source. A feed command that ended on its own must have
    /// exited successfully; one still running is killed.
    pub async fn close(mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if !self.eof && child.try_wait()?.is_none() {
            debug!("Stopping feed command {}", self.source);
            child
                .kill()
                .await
                .with_context(|| format!("Failed to stop feed command {}", self.source))?;
            return Ok(());
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed waiting for feed command {}", self.source))?;
        if !status.success() {
            warn!("Feed command {} exited with {}", self.source, status);
            bail!("Feed command {} exited with {}", self.source, status);
        }
        Ok(())
    }
}
