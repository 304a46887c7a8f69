//! Collaborator seams: tracing, metrics and error tracking

pub mod error_tracker;
pub mod memory;
pub mod meter;
#[cfg(feature = "otel")]
pub mod otel;
pub mod trace;

pub use error_tracker::{
    ErrorReport, ErrorTracker, NoopErrorTracker, RecordingErrorTracker, LOGS_URL_TAG,
    PLATFORM_TAG,
};
pub use memory::{InMemoryTracerProvider, NoopTracerProvider, SpanData};
pub use meter::{Meter, MeterHandle, MeterProvider, NoopMeterProvider, RecorderMeterProvider};
#[cfg(feature = "otel")]
pub use otel::OtelTracerProvider;
pub use trace::{
    start_root_span, start_span, Span, SpanContext, SpanGuard, SpanId, SpanStatus, TraceId,
    Tracer, TracerHandle, TracerProvider,
};
