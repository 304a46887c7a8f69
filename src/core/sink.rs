//! Log sinks: where finished records go
//!
//! [`AppenderSink`] is the engine behind every configured logger. It runs in
//! one of two modes:
//! - synchronous: each record is written to every appender on the caller's thread
//! - asynchronous: records go through a bounded queue to a worker thread that
//!   writes them in batches
//!
//! Appenders are isolated from each other: an error or panic in one is
//! reported on stderr, counted, and does not stop the others.

use super::{
    appender::Appender,
    error::{ObservabilityError, Result},
    log_record::LogRecord,
    metrics::SinkMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy},
};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendError, SendTimeoutError, Sender, TrySendError,
};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default time to wait for the async worker when a sink is dropped
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const BATCH_SIZE: usize = 50;
const BATCH_TIMEOUT_MS: u64 = 10;

/// Destination for finished records
pub trait LogSink: Send + Sync {
    /// Accept a record. Never fails: write problems are the sink's to report.
    fn write(&self, record: LogRecord);

    /// Accept records that are delivered together and in order, or not at all.
    ///
    /// The chunks of one oversized record go through here.
    fn write_batch(&self, records: Vec<LogRecord>) {
        for record in records {
            self.write(record);
        }
    }

    /// Make sure accepted records reached their destination
    fn flush(&self, timeout: Duration) -> Result<()>;

    fn name(&self) -> &str;

    /// Flush and release resources
    fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.flush(timeout)
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write(&self, _record: LogRecord) {}

    fn write_batch(&self, _records: Vec<LogRecord>) {}

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

enum Command {
    Record(LogRecord),
    /// Queued and dropped as one unit
    Batch(Vec<LogRecord>),
    Flush(Sender<()>),
}

impl Command {
    fn records(&self) -> &[LogRecord] {
        match self {
            Command::Record(record) => std::slice::from_ref(record),
            Command::Batch(records) => records.as_slice(),
            Command::Flush(_) => &[],
        }
    }

    fn is_critical(&self) -> bool {
        self.records().iter().any(|r| r.level.is_critical())
    }
}

type Appenders = Arc<RwLock<Vec<Box<dyn Appender>>>>;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Sink engine writing to a set of [`Appender`]s
pub struct AppenderSink {
    appenders: Appenders,
    sender: RwLock<Option<Sender<Command>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    metrics: Arc<SinkMetrics>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
}

impl AppenderSink {
    /// Synchronous sink
    #[must_use]
    pub fn new() -> Self {
        Self {
            appenders: Arc::new(RwLock::new(Vec::new())),
            sender: RwLock::new(None),
            worker: Mutex::new(None),
            metrics: Arc::new(SinkMetrics::new()),
            overflow_policy: OverflowPolicy::AlertAndDrop,
            on_overflow: None,
        }
    }

    /// Asynchronous sink with a queue of `buffer_size` records
    #[must_use]
    pub fn with_async_config(
        buffer_size: usize,
        overflow_policy: OverflowPolicy,
        on_overflow: Option<OverflowCallback>,
    ) -> Self {
        let (sender, receiver) = bounded(buffer_size.max(1));
        let appenders: Appenders = Arc::new(RwLock::new(Vec::new()));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_appenders = Arc::clone(&appenders);
        let worker_metrics = Arc::clone(&metrics);
        let handle = thread::Builder::new()
            .name("log-sink-worker".to_string())
            .spawn(move || Self::worker_loop(receiver, worker_appenders, worker_metrics));

        let (sender, worker) = match handle {
            Ok(handle) => (Some(sender), Some(handle)),
            Err(e) => {
                eprintln!(
                    "[LOGGER ERROR] Failed to spawn sink worker, writing synchronously: {}",
                    e
                );
                (None, None)
            }
        };

        Self {
            appenders,
            sender: RwLock::new(sender),
            worker: Mutex::new(worker),
            metrics,
            overflow_policy,
            on_overflow,
        }
    }

    #[must_use]
    pub fn builder() -> AppenderSinkBuilder {
        AppenderSinkBuilder::new()
    }

    fn worker_loop(receiver: Receiver<Command>, appenders: Appenders, metrics: Arc<SinkMetrics>) {
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        loop {
            match receiver.recv() {
                Ok(Command::Record(record)) => batch.push(record),
                Ok(Command::Batch(records)) => batch.extend(records),
                Ok(Command::Flush(ack)) => {
                    let _ = ack.send(());
                    continue;
                }
                Err(_) => break,
            }

            let mut pending_flush = None;
            Self::collect(&receiver, &mut batch, &mut pending_flush);

            if batch.len() < BATCH_SIZE && pending_flush.is_none() {
                // Small batch: give producers a moment to fill it
                thread::sleep(Duration::from_millis(BATCH_TIMEOUT_MS));
                Self::collect(&receiver, &mut batch, &mut pending_flush);
            }

            Self::process_batch(&appenders, &batch, &metrics);
            batch.clear();

            if let Some(ack) = pending_flush {
                let _ = ack.send(());
            }
        }
    }

    /// Drain ready commands into `batch`, stopping at a flush request
    fn collect(
        receiver: &Receiver<Command>,
        batch: &mut Vec<LogRecord>,
        pending_flush: &mut Option<Sender<()>>,
    ) {
        while batch.len() < BATCH_SIZE && pending_flush.is_none() {
            match receiver.try_recv() {
                Ok(Command::Record(record)) => batch.push(record),
                Ok(Command::Batch(records)) => batch.extend(records),
                Ok(Command::Flush(ack)) => *pending_flush = Some(ack),
                Err(_) => break,
            }
        }
    }

    fn process_batch(appenders: &Appenders, batch: &[LogRecord], metrics: &SinkMetrics) {
        let mut guard = appenders.write();
        for record in batch {
            Self::write_all(&mut guard, record, metrics);
        }
        Self::flush_all(&mut guard, metrics);
    }

    /// Write one record to every appender. Returns true when all succeeded.
    fn write_all(appenders: &mut [Box<dyn Appender>], record: &LogRecord, metrics: &SinkMetrics) -> bool {
        let mut ok = true;

        for appender in appenders.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| appender.append(record))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Appender '{}' failed: {}", appender.name(), e);
                    metrics.record_appender_failure();
                    ok = false;
                }
                Err(payload) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Appender '{}' panicked: {}. \
                         Other appenders continue to function.",
                        appender.name(),
                        panic_message(payload.as_ref())
                    );
                    metrics.record_appender_failure();
                    ok = false;
                }
            }
        }

        if ok {
            metrics.record_logged();
        } else {
            metrics.record_dropped();
        }
        ok
    }

    /// Flush every appender, collecting failures
    fn flush_all(appenders: &mut [Box<dyn Appender>], metrics: &SinkMetrics) -> Vec<String> {
        let mut failures = Vec::new();

        for appender in appenders.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| appender.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Appender '{}' flush failed: {}", appender.name(), e);
                    metrics.record_appender_failure();
                    failures.push(format!("{}: {}", appender.name(), e));
                }
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    eprintln!(
                        "[LOGGER CRITICAL] Appender '{}' panicked during flush: {}",
                        appender.name(),
                        msg
                    );
                    metrics.record_appender_failure();
                    failures.push(format!("{}: panicked: {}", appender.name(), msg));
                }
            }
        }

        failures
    }

    pub fn add_appender(&self, appender: Box<dyn Appender>) {
        self.appenders.write().push(appender);
    }

    pub fn is_async(&self) -> bool {
        self.sender.read().is_some()
    }

    pub fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    pub fn dropped_count(&self) -> u64 {
        self.metrics.dropped_count()
    }

    fn write_sync(&self, records: &[LogRecord]) {
        let mut appenders = self.appenders.write();
        for record in records {
            Self::write_all(&mut appenders, record, &self.metrics);
        }
    }

    /// Count every record of `command` as dropped, returning the new total
    fn drop_records(&self, command: &Command) -> u64 {
        let mut total = self.metrics.dropped_count();
        for _ in command.records() {
            total = self.metrics.record_dropped() + 1;
        }
        total
    }

    fn send_or_overflow(&self, command: Command) {
        let sender = self.sender.read().clone();
        let Some(sender) = sender else {
            self.write_sync(command.records());
            return;
        };

        match sender.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => self.handle_overflow(&sender, command),
            Err(TrySendError::Disconnected(command)) => {
                // Shutting down
                self.drop_records(&command);
            }
        }
    }

    fn handle_overflow(&self, sender: &Sender<Command>, command: Command) {
        self.metrics.record_queue_full();

        if command.is_critical() {
            // Wait behind the queued records so call order holds
            self.metrics.record_critical_preserved();
            self.metrics.record_block();
            match sender.send_timeout(command, DEFAULT_SHUTDOWN_TIMEOUT) {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(command))
                | Err(SendTimeoutError::Disconnected(command)) => {
                    eprintln!(
                        "[LOGGER WARNING] Sink worker stalled, writing critical record directly"
                    );
                    self.write_sync(command.records());
                }
            }
            return;
        }

        match &self.overflow_policy {
            OverflowPolicy::DropNewest => {
                self.drop_records(&command);
            }
            OverflowPolicy::Block => {
                self.metrics.record_block();
                if let Err(SendError(command)) = sender.send(command) {
                    self.drop_records(&command);
                }
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match sender.send_timeout(command, *timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(command)) => self.alert_and_drop(&command),
                    Err(SendTimeoutError::Disconnected(command)) => {
                        self.drop_records(&command);
                    }
                }
            }
            OverflowPolicy::AlertAndDrop => self.alert_and_drop(&command),
        }
    }

    fn alert_and_drop(&self, command: &Command) {
        let before = self.metrics.dropped_count();
        let dropped = self.drop_records(command);

        // First drop, then every thousandth
        if before == 0 || before / 1000 != dropped / 1000 {
            eprintln!(
                "[LOGGER WARNING] Queue full, {} records dropped. \
                 Consider increasing buffer size or using a different overflow policy.",
                dropped
            );
            if let Some(callback) = &self.on_overflow {
                callback(dropped);
            }
        }
    }

    fn flush_sync(&self) -> Result<()> {
        let failures = {
            let mut appenders = self.appenders.write();
            Self::flush_all(&mut appenders, &self.metrics)
        };
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ObservabilityError::collaborator("log sink", failures.join("; ")))
        }
    }

    fn flush_async(&self, sender: &Sender<Command>, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let (ack_tx, ack_rx) = bounded(1);

        match sender.send_timeout(Command::Flush(ack_tx), timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                self.metrics.record_flush_timeout();
                return Err(ObservabilityError::flush_timeout("log sink", timeout));
            }
            Err(SendTimeoutError::Disconnected(_)) => return Err(ObservabilityError::SinkStopped),
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        match ack_rx.recv_timeout(remaining) {
            Ok(()) => self.flush_sync(),
            Err(RecvTimeoutError::Timeout) => {
                self.metrics.record_flush_timeout();
                Err(ObservabilityError::flush_timeout("log sink", timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ObservabilityError::SinkStopped),
        }
    }

    /// Stop the worker, waiting at most `timeout` for the queue to drain.
    ///
    /// Returns false when the worker did not finish in time or panicked.
    fn stop_worker(&self, timeout: Duration) -> bool {
        drop(self.sender.write().take());

        let Some(handle) = self.worker.lock().take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Sink worker panicked during shutdown: {:?}", e);
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Sink worker did not finish within {:?}. \
                     Some records may be lost.",
                    timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Default for AppenderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for AppenderSink {
    fn write(&self, record: LogRecord) {
        self.send_or_overflow(Command::Record(record));
    }

    fn write_batch(&self, records: Vec<LogRecord>) {
        if !records.is_empty() {
            self.send_or_overflow(Command::Batch(records));
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        let sender = self.sender.read().clone();
        match sender {
            Some(sender) => self.flush_async(&sender, timeout),
            None => self.flush_sync(),
        }
    }

    fn name(&self) -> &str {
        if self.is_async() {
            "async appender sink"
        } else {
            "appender sink"
        }
    }

    fn shutdown(&self, timeout: Duration) -> Result<()> {
        let drained = self.stop_worker(timeout);
        self.flush_sync()?;
        if drained {
            Ok(())
        } else {
            Err(ObservabilityError::flush_timeout("log sink", timeout))
        }
    }
}

impl Drop for AppenderSink {
    fn drop(&mut self) {
        self.stop_worker(DEFAULT_SHUTDOWN_TIMEOUT);

        if let Err(e) = self.flush_sync() {
            eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Sink shutting down with {} dropped records (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

/// Builder for [`AppenderSink`]
///
/// # Example
/// ```
/// use rust_correlated_logger::appenders::MemoryAppender;
/// use rust_correlated_logger::core::{AppenderSink, OverflowPolicy};
/// use std::sync::Arc;
///
/// let sink = AppenderSink::builder()
///     .appender(MemoryAppender::new())
///     .async_mode(1000)
///     .overflow_policy(OverflowPolicy::AlertAndDrop)
///     .on_overflow(Arc::new(|count| {
///         eprintln!("ALERT: {} records dropped", count);
///     }))
///     .build();
///
/// assert!(sink.is_async());
/// ```
pub struct AppenderSinkBuilder {
    appenders: Vec<Box<dyn Appender>>,
    async_buffer: Option<usize>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
}

impl AppenderSinkBuilder {
    pub fn new() -> Self {
        Self {
            appenders: Vec::new(),
            async_buffer: None,
            overflow_policy: OverflowPolicy::AlertAndDrop,
            on_overflow: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_appender(mut self, appender: Box<dyn Appender>) -> Self {
        self.appenders.push(appender);
        self
    }

    /// Write through a worker thread with a queue of `buffer_size` records.
    ///
    /// Without this the sink writes synchronously.
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, buffer_size: usize) -> Self {
        self.async_buffer = Some(buffer_size);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn maybe_async(mut self, buffer_size: Option<usize>) -> Self {
        self.async_buffer = buffer_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    pub fn build(self) -> AppenderSink {
        let sink = match self.async_buffer {
            Some(size) => AppenderSink::with_async_config(size, self.overflow_policy, self.on_overflow),
            None => AppenderSink::new(),
        };
        for appender in self.appenders {
            sink.add_appender(appender);
        }
        sink
    }
}

impl Default for AppenderSinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
