//! OpenTelemetry adapter for the tracing seam
//!
//! Wraps an `opentelemetry_sdk` tracer provider so spans started through a
//! [`Scope`](crate::core::Scope) are real OpenTelemetry spans exported by
//! whatever pipeline the host configured.

use super::trace::{Span, SpanContext, SpanId, SpanStatus, TraceId, Tracer, TracerProvider};
use crate::core::error::{ObservabilityError, Result};
use crate::core::flush::bounded_flush;
use opentelemetry::trace::{
    self as otel_trace, Span as _, Status, TraceContextExt as _, Tracer as _,
    TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Tracer provider backed by `opentelemetry_sdk`
#[derive(Clone)]
pub struct OtelTracerProvider {
    provider: opentelemetry_sdk::trace::TracerProvider,
}

impl OtelTracerProvider {
    pub fn new(provider: opentelemetry_sdk::trace::TracerProvider) -> Self {
        Self { provider }
    }

    pub fn inner(&self) -> &opentelemetry_sdk::trace::TracerProvider {
        &self.provider
    }
}

fn to_otel_parent(parent: &SpanContext) -> Context {
    let span_context = otel_trace::SpanContext::new(
        otel_trace::TraceId::from_bytes(parent.trace_id.to_bytes()),
        otel_trace::SpanId::from_bytes(parent.span_id.to_bytes()),
        otel_trace::TraceFlags::SAMPLED,
        true,
        otel_trace::TraceState::default(),
    );
    Context::new().with_remote_span_context(span_context)
}

struct OtelTracer {
    tracer: opentelemetry_sdk::trace::Tracer,
}

struct OtelSpan {
    span: Mutex<opentelemetry_sdk::trace::Span>,
    context: SpanContext,
}

impl Span for OtelSpan {
    fn span_context(&self) -> SpanContext {
        self.context
    }

    fn set_status(&self, status: SpanStatus) {
        let status = match status {
            SpanStatus::Unset => Status::Unset,
            SpanStatus::Ok => Status::Ok,
            SpanStatus::Error(description) => Status::error(description),
        };
        self.span.lock().set_status(status);
    }

    fn set_attributes(&self, attributes: &[(String, String)]) {
        let mut span = self.span.lock();
        for (key, value) in attributes {
            span.set_attribute(KeyValue::new(key.clone(), value.clone()));
        }
    }

    fn record_error(&self, message: &str) {
        self.span.lock().add_event(
            "exception",
            vec![KeyValue::new("exception.message", message.to_string())],
        );
    }

    fn end(&self) {
        self.span.lock().end();
    }

    fn is_recording(&self) -> bool {
        self.span.lock().is_recording()
    }
}

impl Tracer for OtelTracer {
    fn start_span(&self, name: &str, parent: Option<SpanContext>) -> Arc<dyn Span> {
        let parent = parent.filter(SpanContext::is_valid);
        let cx = parent.as_ref().map(to_otel_parent).unwrap_or_default();

        let builder = self.tracer.span_builder(name.to_string());
        let span = self.tracer.build_with_context(builder, &cx);

        let otel_ctx = span.span_context();
        let context = SpanContext::new(
            TraceId::from_bytes(otel_ctx.trace_id().to_bytes()),
            SpanId::from_bytes(otel_ctx.span_id().to_bytes()),
            parent.map(|p| p.span_id),
        );

        Arc::new(OtelSpan {
            span: Mutex::new(span),
            context,
        })
    }
}

impl TracerProvider for OtelTracerProvider {
    fn tracer(&self, name: &str) -> Arc<dyn Tracer> {
        Arc::new(OtelTracer {
            tracer: self.provider.tracer(name.to_string()),
        })
    }

    /// The SDK flush takes no deadline, so it runs on a helper thread and is
    /// abandoned once `timeout` passes
    fn force_flush(&self, timeout: Duration) -> Result<()> {
        let provider = self.provider.clone();
        bounded_flush("trace exporter", timeout, move || {
            let failures: Vec<String> = provider
                .force_flush()
                .into_iter()
                .filter_map(|r| r.err())
                .map(|e| e.to_string())
                .collect();

            if failures.is_empty() {
                Ok(())
            } else {
                Err(ObservabilityError::collaborator(
                    "trace exporter",
                    failures.join("; "),
                ))
            }
        })
    }

    /// The 0.22 SDK provider shuts its processors down on drop, so this only
    /// flushes what is buffered.
    fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.force_flush(timeout)
    }
}
