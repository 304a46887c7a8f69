//! Built-in tracer providers: an inert one and an in-memory recorder

use super::trace::{Span, SpanContext, SpanId, SpanStatus, TraceId, Tracer, TracerProvider};
use crate::core::error::{ObservabilityError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider whose spans carry no identity of their own.
///
/// A span started under a valid parent reports the parent's context, matching
/// how non-recording spans propagate in OpenTelemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracerProvider;

struct NoopTracer;

struct NoopSpan {
    context: SpanContext,
}

impl Span for NoopSpan {
    fn span_context(&self) -> SpanContext {
        self.context
    }

    fn set_status(&self, _status: SpanStatus) {}

    fn set_attributes(&self, _attributes: &[(String, String)]) {}

    fn end(&self) {}

    fn is_recording(&self) -> bool {
        false
    }
}

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str, parent: Option<SpanContext>) -> Arc<dyn Span> {
        Arc::new(NoopSpan {
            context: parent.unwrap_or(SpanContext::INVALID),
        })
    }
}

impl TracerProvider for NoopTracerProvider {
    fn tracer(&self, _name: &str) -> Arc<dyn Tracer> {
        Arc::new(NoopTracer)
    }

    fn force_flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Snapshot of a finished span
#[derive(Debug, Clone, PartialEq)]
pub struct SpanData {
    pub name: String,
    pub tracer_name: String,
    pub context: SpanContext,
    pub status: SpanStatus,
    pub attributes: Vec<(String, String)>,
    pub events: Vec<String>,
}

impl SpanData {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Exported {
    finished: Mutex<Vec<SpanData>>,
    flushes: AtomicU64,
    shutdown: AtomicBool,
    flush_failure: Mutex<Option<String>>,
}

/// Provider that keeps finished spans in memory, like an in-memory span exporter.
///
/// Cloning shares the same store.
#[derive(Clone, Default)]
pub struct InMemoryTracerProvider {
    exported: Arc<Exported>,
}

impl InMemoryTracerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.exported.finished.lock().clone()
    }

    pub fn finished_span(&self, name: &str) -> Option<SpanData> {
        self.exported
            .finished
            .lock()
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    pub fn flush_count(&self) -> u64 {
        self.exported.flushes.load(Ordering::Relaxed)
    }

    pub fn is_shutdown(&self) -> bool {
        self.exported.shutdown.load(Ordering::Relaxed)
    }

    /// Make every following flush fail with `message`
    pub fn fail_flushes_with(&self, message: impl Into<String>) {
        *self.exported.flush_failure.lock() = Some(message.into());
    }

    pub fn reset(&self) {
        self.exported.finished.lock().clear();
        self.exported.flushes.store(0, Ordering::Relaxed);
        *self.exported.flush_failure.lock() = None;
    }
}

fn random_trace_id() -> TraceId {
    loop {
        let id = TraceId::from_bytes(rand::random());
        if id.is_valid() {
            return id;
        }
    }
}

fn random_span_id() -> SpanId {
    loop {
        let id = SpanId::from_bytes(rand::random());
        if id.is_valid() {
            return id;
        }
    }
}

struct InMemoryTracer {
    name: String,
    exported: Arc<Exported>,
}

struct InMemorySpan {
    data: Mutex<SpanData>,
    ended: AtomicBool,
    exported: Arc<Exported>,
}

impl Span for InMemorySpan {
    fn span_context(&self) -> SpanContext {
        self.data.lock().context
    }

    fn set_status(&self, status: SpanStatus) {
        if !self.is_recording() {
            return;
        }
        let mut data = self.data.lock();
        // Ok is final; Error only replaces Unset or an earlier Error
        if data.status != SpanStatus::Ok {
            data.status = status;
        }
    }

    fn set_attributes(&self, attributes: &[(String, String)]) {
        if !self.is_recording() {
            return;
        }
        self.data.lock().attributes.extend_from_slice(attributes);
    }

    fn record_error(&self, message: &str) {
        if !self.is_recording() {
            return;
        }
        self.data.lock().events.push(format!("exception: {}", message));
    }

    fn end(&self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let data = self.data.lock().clone();
        self.exported.finished.lock().push(data);
    }

    fn is_recording(&self) -> bool {
        !self.ended.load(Ordering::Acquire)
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(&self, name: &str, parent: Option<SpanContext>) -> Arc<dyn Span> {
        let context = match parent.filter(SpanContext::is_valid) {
            Some(parent) => SpanContext::new(parent.trace_id, random_span_id(), Some(parent.span_id)),
            None => SpanContext::new(random_trace_id(), random_span_id(), None),
        };
        Arc::new(InMemorySpan {
            data: Mutex::new(SpanData {
                name: name.to_string(),
                tracer_name: self.name.clone(),
                context,
                status: SpanStatus::Unset,
                attributes: Vec::new(),
                events: Vec::new(),
            }),
            ended: AtomicBool::new(false),
            exported: Arc::clone(&self.exported),
        })
    }
}

impl TracerProvider for InMemoryTracerProvider {
    fn tracer(&self, name: &str) -> Arc<dyn Tracer> {
        Arc::new(InMemoryTracer {
            name: name.to_string(),
            exported: Arc::clone(&self.exported),
        })
    }

    fn force_flush(&self, _timeout: Duration) -> Result<()> {
        if let Some(message) = self.exported.flush_failure.lock().clone() {
            return Err(ObservabilityError::collaborator("trace exporter", message));
        }
        self.exported.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn shutdown(&self, timeout: Duration) -> Result<()> {
        let flushed = self.force_flush(timeout);
        self.exported.shutdown.store(true, Ordering::Relaxed);
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_and_child_ids() {
        let provider = InMemoryTracerProvider::new();
        let tracer = provider.tracer("test");

        let root = tracer.start_span("root", None);
        let root_ctx = root.span_context();
        assert!(root_ctx.is_valid());
        assert!(root_ctx.is_root());

        let child = tracer.start_span("child", Some(root_ctx));
        let child_ctx = child.span_context();
        assert_eq!(child_ctx.trace_id, root_ctx.trace_id);
        assert_ne!(child_ctx.span_id, root_ctx.span_id);
        assert_eq!(child_ctx.parent_span_id, Some(root_ctx.span_id));
    }

    #[test]
    fn test_finished_spans_recorded_once() {
        let provider = InMemoryTracerProvider::new();
        let span = provider.tracer("test").start_span("work", None);
        span.set_attributes(&[("k".to_string(), "v".to_string())]);
        span.set_status(SpanStatus::Error("boom".to_string()));
        span.end();
        span.end();

        let spans = provider.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].attribute("k"), Some("v"));
        assert!(spans[0].status.is_error());
    }

    #[test]
    fn test_ended_span_ignores_updates() {
        let provider = InMemoryTracerProvider::new();
        let span = provider.tracer("test").start_span("work", None);
        span.end();
        span.set_status(SpanStatus::Error("late".to_string()));
        assert!(!span.is_recording());
        assert_eq!(provider.finished_spans()[0].status, SpanStatus::Unset);
    }

    #[test]
    fn test_flush_failure() {
        let provider = InMemoryTracerProvider::new();
        assert!(provider.force_flush(Duration::from_millis(10)).is_ok());
        provider.fail_flushes_with("exporter down");
        assert!(provider.force_flush(Duration::from_millis(10)).is_err());
        assert_eq!(provider.flush_count(), 1);
    }

    #[test]
    fn test_noop_propagates_parent() {
        let tracer = NoopTracerProvider.tracer("noop");
        assert!(!tracer.start_span("orphan", None).span_context().is_valid());

        let parent = SpanContext::new(TraceId::from_bytes([1; 16]), SpanId::from_bytes([2; 8]), None);
        assert_eq!(tracer.start_span("child", Some(parent)).span_context(), parent);
    }
}
