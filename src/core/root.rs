//! Process entry point: owns the root scope and shuts its handles down once

use super::field::Field;
use super::flush::{self, FlushReport};
use super::logger::Logger;
use super::scope::{ObservabilityHandles, Scope};
use crate::telemetry::meter::MeterHandle;
use crate::telemetry::trace::TracerHandle;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owner of the root handles.
///
/// Every scope derived from [`RootGuard::scope`] shares the same providers
/// and sink; only the guard shuts them down. Shutdown runs exactly once,
/// either through [`RootGuard::shutdown`] or on drop.
///
/// # Example
///
/// ```
/// use rust_correlated_logger::prelude::*;
///
/// let memory = MemoryAppender::new();
/// let logger = Logger::builder()
///     .sink(AppenderSink::builder().appender(memory.clone()).build())
///     .build();
///
/// let root = RootGuard::new(ObservabilityHandles::new(
///     logger,
///     TracerHandle::noop(),
///     MeterHandle::noop(),
/// ));
/// root.scope().logger().unwrap().info("request handled", []);
///
/// assert!(root.shutdown().is_some());
/// assert!(root.shutdown().is_none());
/// ```
pub struct RootGuard {
    scope: Scope,
    logger: Logger,
    tracer: TracerHandle,
    meter: MeterHandle,
    shut_down: AtomicBool,
}

impl RootGuard {
    pub fn new(handles: ObservabilityHandles) -> Self {
        Self::with_parent(&Scope::new(), handles)
    }

    /// Bind `handles` on top of `parent`
    pub fn with_parent(parent: &Scope, handles: ObservabilityHandles) -> Self {
        let scope = parent.bind(handles.clone());
        Self {
            scope,
            logger: handles.logger,
            tracer: handles.tracer,
            meter: handles.meter,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Flush everything under the exit timeout, then shut down the trace and
    /// metric providers and the sink.
    ///
    /// Returns the flush report, or `None` when already shut down.
    pub fn shutdown(&self) -> Option<FlushReport> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return None;
        }

        let timeout = self.logger.exit_flush_timeout();
        let report = flush::flush_with_replaced_timeout(&self.scope, timeout);

        let logger = self.logger.attach(self.scope.clone());
        let providers = [
            ("traces", self.tracer.provider().shutdown(timeout)),
            ("metrics", self.meter.provider().shutdown(timeout)),
        ];
        for (stage, result) in providers {
            if let Err(e) = result {
                logger.warn(
                    "provider shutdown failed",
                    [
                        Field::string("flush_stage", stage),
                        Field::string("error_message", e.to_string()),
                    ],
                );
            }
        }

        if let Err(e) = self.logger.sink().shutdown(timeout) {
            eprintln!("[LOGGER ERROR] Failed to shut down {}: {}", self.logger.sink().name(), e);
        }

        Some(report)
    }
}

impl Drop for RootGuard {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
