//! Opt-in decision log
//!
//! Traffic-control decisions and call outcomes are written as JSON lines by a background
//! thread. The hot path only does a non-blocking `try_send` on a bounded channel; when
//! the channel is full the event is dropped and counted. Files rotate on a fixed period,
//! old files are pruned on rotation, and writing pauses while the directory is over its
//! size budget.

use crate::config::models::DecisionLogConfig;
use crate::core::traffic_control::{Decision, Direction};
use crate::utils::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, RecvTimeoutError, Sender, TrySendError};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};

const FILE_PREFIX: &str = "traffic-control-";
const FILE_SUFFIX: &str = ".jsonl";
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// One line of the decision log
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEvent {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// Which identifier keyed an inbound request; the identifier itself is never logged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl DecisionEvent {
    /// A gate decision
    pub fn decision(direction: Direction, scope: &str, decision: &Decision) -> Self {
        Self {
            timestamp: Utc::now(),
            direction,
            scope: scope.to_string(),
            decision: Some(decision.as_str()),
            retry_after_ms: decision.retry_after().map(|d| d.as_millis() as u64),
            identifier_kind: None,
            success: None,
            latency_ms: None,
        }
    }

    /// The final outcome of an outbound call
    pub fn outcome(scope: &str, success: bool, latency: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            direction: Direction::Outbound,
            scope: scope.to_string(),
            decision: None,
            retry_after_ms: None,
            identifier_kind: None,
            success: Some(success),
            latency_ms: Some(latency.as_secs_f64() * 1000.0),
        }
    }

    /// Attach the inbound identifier kind
    pub fn with_identifier_kind(mut self, kind: &'static str) -> Self {
        self.identifier_kind = Some(kind);
        self
    }
}

/// Handle to the background log writer
#[derive(Debug)]
pub struct DecisionLogger {
    sender: Option<Sender<DecisionEvent>>,
    worker: Option<JoinHandle<()>>,
    dropped: AtomicU64,
}

impl DecisionLogger {
    /// Start the writer thread
    pub fn start(config: &DecisionLogConfig) -> Result<Self> {
        let dir = config.log_dir.clone().ok_or_else(|| {
            GatewayError::Config("Decision logging is enabled but no log directory is set".to_string())
        })?;
        fs::create_dir_all(&dir)?;

        let mut writer = DecisionLogWriter::new(
            dir.clone(),
            config.rotation(),
            config.retention(),
            config.max_total_bytes,
        )?;
        let (sender, receiver) = channel::bounded::<DecisionEvent>(config.channel_capacity.max(1));

        let worker = std::thread::Builder::new()
            .name("decision-log".to_string())
            .spawn(move || {
                loop {
                    match receiver.recv_timeout(FLUSH_INTERVAL) {
                        Ok(event) => writer.write(&event),
                        Err(RecvTimeoutError::Timeout) => writer.flush(),
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                writer.flush();
            })?;

        info!("Decision log enabled, writing to {:?}", dir);
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            dropped: AtomicU64::new(0),
        })
    }

    /// Queue an event without blocking
    pub fn log(&self, event: DecisionEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!("Decision log writer has stopped");
            }
        }
    }

    /// Events dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for DecisionLogger {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain, flush and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Decision log writer panicked");
            }
        }
    }
}

/// File side of the decision log, owned by the writer thread
#[derive(Debug)]
pub(crate) struct DecisionLogWriter {
    dir: PathBuf,
    rotation: Duration,
    retention: Duration,
    max_total_bytes: u64,
    current: Option<BufWriter<File>>,
    opened_at: Option<Instant>,
    total_bytes: u64,
    sequence: u64,
    paused: bool,
}

impl DecisionLogWriter {
    pub(crate) fn new(
        dir: PathBuf,
        rotation: Duration,
        retention: Duration,
        max_total_bytes: u64,
    ) -> Result<Self> {
        let total_bytes = directory_size(&dir)?;
        Ok(Self {
            dir,
            rotation,
            retention,
            max_total_bytes,
            current: None,
            opened_at: None,
            total_bytes,
            sequence: 0,
            paused: false,
        })
    }

    pub(crate) fn write(&mut self, event: &DecisionEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize decision event: {}", e);
                return;
            }
        };
        let bytes = line.len() as u64 + 1;

        if self.rotation_due() {
            self.rotate();
        }

        if self.total_bytes + bytes > self.max_total_bytes {
            if !self.paused {
                warn!(
                    max_total_bytes = self.max_total_bytes,
                    "Decision log directory over budget, pausing until next rotation"
                );
                self.paused = true;
            }
            return;
        }

        let Some(file) = self.current.as_mut() else {
            return;
        };
        match writeln!(file, "{}", line) {
            Ok(()) => self.total_bytes += bytes,
            Err(e) => error!("Failed to write decision log: {}", e),
        }
    }

    pub(crate) fn flush(&mut self) {
        if let Some(file) = self.current.as_mut() {
            if let Err(e) = file.flush() {
                error!("Failed to flush decision log: {}", e);
            }
        }
    }

    fn rotation_due(&self) -> bool {
        match self.opened_at {
            Some(opened) => opened.elapsed() >= self.rotation,
            None => true,
        }
    }

    fn rotate(&mut self) {
        self.flush();
        self.current = None;

        if let Err(e) = self.prune() {
            warn!("Failed to prune decision logs: {}", e);
        }
        match directory_size(&self.dir) {
            Ok(size) => self.total_bytes = size,
            Err(e) => warn!("Failed to measure decision log directory: {}", e),
        }

        self.sequence += 1;
        let path = self.dir.join(format!(
            "{}{}-{}{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%dT%H%M%S"),
            self.sequence,
            FILE_SUFFIX
        ));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                debug!("Opened decision log file {:?}", path);
                self.current = Some(BufWriter::new(file));
                self.paused = false;
            }
            Err(e) => error!("Failed to open decision log file {:?}: {}", path, e),
        }
        self.opened_at = Some(Instant::now());
    }

    /// Delete log files older than the retention period
    fn prune(&self) -> std::io::Result<()> {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !is_log_file(&entry.path()) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if modified < cutoff {
                debug!("Removing expired decision log {:?}", entry.path());
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
}

fn directory_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if is_log_file(&entry.path()) {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
