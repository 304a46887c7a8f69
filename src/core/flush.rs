//! Ordered flush of buffered telemetry at request and process boundaries
//!
//! Stages run in a fixed order: traces, metrics, error tracker, log sink. Each
//! stage is best-effort. A failure is logged at Warn, recorded in the
//! [`FlushReport`] and never stops the stages after it.

use super::error::{ObservabilityError, Result};
use super::field::Field;
use super::logger::Logger;
use super::scope::Scope;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Default budget for a request-boundary flush
pub const DEFAULT_REQUEST_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Default budget for a process-exit flush
pub const DEFAULT_EXIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// A point in time after which flushing gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Time left, or `None` once the deadline has passed
    pub fn remaining(&self) -> Option<Duration> {
        let left = self.0.saturating_duration_since(Instant::now());
        if left.is_zero() {
            None
        } else {
            Some(left)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushStage {
    Traces,
    Metrics,
    ErrorTracker,
    LogSink,
}

impl FlushStage {
    pub const ORDER: [FlushStage; 4] = [
        FlushStage::Traces,
        FlushStage::Metrics,
        FlushStage::ErrorTracker,
        FlushStage::LogSink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlushStage::Traces => "traces",
            FlushStage::Metrics => "metrics",
            FlushStage::ErrorTracker => "error tracker",
            FlushStage::LogSink => "log sink",
        }
    }
}

impl fmt::Display for FlushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    Flushed,
    /// No collaborator bound for this stage
    Absent,
    Failed(ObservabilityError),
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// Per-stage result of one flush, in execution order
#[derive(Debug, Default)]
pub struct FlushReport {
    stages: Vec<(FlushStage, StageOutcome)>,
}

impl FlushReport {
    fn record(&mut self, stage: FlushStage, outcome: StageOutcome) {
        self.stages.push((stage, outcome));
    }

    pub fn stages(&self) -> &[(FlushStage, StageOutcome)] {
        &self.stages
    }

    pub fn outcome(&self, stage: FlushStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> Vec<(FlushStage, &ObservabilityError)> {
        self.stages
            .iter()
            .filter_map(|(stage, outcome)| match outcome {
                StageOutcome::Failed(e) => Some((*stage, e)),
                _ => None,
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        !self.stages.iter().any(|(_, outcome)| outcome.is_failed())
    }
}

/// Run a blocking flush call on a helper thread and wait at most `timeout`.
///
/// For collaborators whose flush takes no deadline. A call that overruns keeps
/// running in the background; its result is discarded.
pub fn bounded_flush<F>(stage: &str, timeout: Duration, flush: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let (done_tx, done_rx) = bounded(1);
    thread::Builder::new()
        .name(format!("{}-flush", stage.replace(' ', "-")))
        .spawn(move || {
            let _ = done_tx.send(flush());
        })
        .map_err(|e| ObservabilityError::io_operation(format!("flushing {}", stage), "spawn failed", e))?;

    match done_rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ObservabilityError::flush_timeout(stage, timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(ObservabilityError::collaborator(
            stage,
            "flush panicked",
        )),
    }
}

fn attempt(
    stage: FlushStage,
    deadline: Deadline,
    cap: Option<Duration>,
    run: impl FnOnce(Duration) -> Result<()>,
) -> StageOutcome {
    let Some(remaining) = deadline.remaining() else {
        return StageOutcome::Failed(ObservabilityError::flush_timeout(stage.as_str(), Duration::ZERO));
    };
    let timeout = cap.map_or(remaining, |c| c.min(remaining));
    match run(timeout) {
        Ok(()) => StageOutcome::Flushed,
        Err(e) => StageOutcome::Failed(e),
    }
}

/// Run every stage against `scope` (and `logger` for the tracker and sink) until `deadline`
pub(crate) fn run(scope: &Scope, logger: Option<&Logger>, deadline: Deadline) -> FlushReport {
    let mut report = FlushReport::default();

    let traces = match scope.tracer() {
        Some(handle) => attempt(FlushStage::Traces, deadline, None, |t| {
            handle.provider().force_flush(t)
        }),
        None => StageOutcome::Absent,
    };
    report.record(FlushStage::Traces, traces);

    let metrics = match scope.meter() {
        Some(handle) => attempt(FlushStage::Metrics, deadline, None, |t| {
            handle.provider().force_flush(t)
        }),
        None => StageOutcome::Absent,
    };
    report.record(FlushStage::Metrics, metrics);

    let tracker = match logger {
        Some(l) if l.error_tracker().is_enabled() => attempt(
            FlushStage::ErrorTracker,
            deadline,
            l.error_tracker_flush_timeout(),
            |t| l.error_tracker().flush(t),
        ),
        _ => StageOutcome::Absent,
    };
    report.record(FlushStage::ErrorTracker, tracker);

    if let Some(l) = logger {
        for (stage, outcome) in report.stages() {
            if let StageOutcome::Failed(e) = outcome {
                l.warn(
                    "flush stage failed",
                    [
                        Field::string("flush_stage", stage.as_str()),
                        Field::string("error_message", e.to_string()),
                    ],
                );
            }
        }
    }

    let sink = match logger {
        Some(l) => attempt(FlushStage::LogSink, deadline, None, |t| l.sink().flush(t)),
        None => StageOutcome::Absent,
    };
    if let (Some(l), StageOutcome::Failed(e)) = (logger, &sink) {
        eprintln!("[LOGGER WARNING] Flush of {} failed: {}", l.sink().name(), e);
    }
    report.record(FlushStage::LogSink, sink);

    report
}

/// Flush under the scope's deadline, or the logger's request timeout when the
/// scope carries none
pub fn flush(scope: &Scope) -> FlushReport {
    let logger = scope.logger();
    let deadline = scope.deadline().unwrap_or_else(|| {
        let timeout = logger
            .as_ref()
            .map_or(DEFAULT_REQUEST_FLUSH_TIMEOUT, Logger::request_flush_timeout);
        Deadline::after(timeout)
    });
    run(scope, logger.as_ref(), deadline)
}

/// Flush within `timeout`, still honouring an earlier scope deadline
pub fn flush_with_timeout(scope: &Scope, timeout: Duration) -> FlushReport {
    let requested = Deadline::after(timeout);
    let deadline = scope.deadline().map_or(requested, |d| d.min(requested));
    run(scope, scope.logger().as_ref(), deadline)
}

/// Flush within a fresh `timeout`, ignoring any deadline on the scope.
///
/// For flushing from a request whose own deadline has already run out.
pub fn flush_with_replaced_timeout(scope: &Scope, timeout: Duration) -> FlushReport {
    run(scope, scope.logger().as_ref(), Deadline::after(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_flush_returns_result() {
        assert!(bounded_flush("traces", Duration::from_secs(1), || Ok(())).is_ok());

        let err = bounded_flush("traces", Duration::from_secs(1), || {
            Err(ObservabilityError::collaborator("traces", "exporter down"))
        })
        .unwrap_err();
        assert!(err.to_string().contains("exporter down"));
    }

    #[test]
    fn test_bounded_flush_gives_up_on_hung_call() {
        let started = Instant::now();
        let err = bounded_flush("traces", Duration::from_millis(50), || {
            thread::sleep(Duration::from_secs(2));
            Ok(())
        })
        .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_bounded_flush_reports_panic() {
        let err = bounded_flush("metrics", Duration::from_secs(1), || panic!("exporter bug")).unwrap_err();
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_deadline_expiry() {
        let past = Deadline::at(Instant::now() - Duration::from_millis(5));
        assert!(past.is_expired());
        assert!(past.remaining().is_none());

        let future = Deadline::after(Duration::from_secs(5));
        assert!(!future.is_expired());
        assert!(future.remaining().unwrap() <= Duration::from_secs(5));
    }

    #[test]
    fn test_empty_scope_flush_is_all_absent() {
        let report = flush(&Scope::new());
        assert!(report.is_success());
        let stages: Vec<_> = report.stages().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, FlushStage::ORDER.to_vec());
        assert!(report
            .stages()
            .iter()
            .all(|(_, o)| matches!(o, StageOutcome::Absent)));
    }

    #[test]
    fn test_expired_stage_recorded_as_timeout() {
        let outcome = attempt(
            FlushStage::Metrics,
            Deadline::at(Instant::now() - Duration::from_millis(1)),
            None,
            |_| panic!("must not run past the deadline"),
        );
        match outcome {
            StageOutcome::Failed(e) => assert!(e.is_timeout()),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_cap_limits_timeout() {
        let mut seen = Duration::ZERO;
        let _ = attempt(
            FlushStage::ErrorTracker,
            Deadline::after(Duration::from_secs(30)),
            Some(Duration::from_millis(250)),
            |t| {
                seen = t;
                Ok(())
            },
        );
        assert_eq!(seen, Duration::from_millis(250));
    }
}
