//! Tracing seam: span identity, status and the provider/tracer traits
//!
//! The correlation core never implements a tracing protocol. It only needs to
//! start spans, read their identifiers, mark their status and flush the
//! provider. Concrete backends implement [`TracerProvider`].

use crate::core::error::{ObservabilityError, Result};
use crate::core::scope::Scope;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

fn parse_hex<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out)
        .map_err(|e| ObservabilityError::other(format!("invalid {} '{}': {}", what, s, e)))?;
    Ok(out)
}

/// 16-byte trace identifier. All zeroes is invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TraceId([u8; 16]);

impl TraceId {
    pub const INVALID: TraceId = TraceId([0; 16]);

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex::<16>(s, "trace id").map(Self)
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self)
    }
}

/// 8-byte span identifier. All zeroes is invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpanId([u8; 8]);

impl SpanId {
    pub const INVALID: SpanId = SpanId([0; 8]);

    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 8] {
        self.0
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex::<8>(s, "span id").map(Self)
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self)
    }
}

/// Identity of a span and its parent link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    /// `None` for root spans
    pub parent_span_id: Option<SpanId>,
}

impl SpanContext {
    pub const INVALID: SpanContext = SpanContext {
        trace_id: TraceId::INVALID,
        span_id: SpanId::INVALID,
        parent_span_id: None,
    };

    pub fn new(trace_id: TraceId, span_id: SpanId, parent_span_id: Option<SpanId>) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id,
        }
    }

    /// Both identifiers are non-zero
    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }
}

/// A started span. Implementations use interior mutability so a span can be
/// shared between the scope that carries it and the guard that ends it.
pub trait Span: Send + Sync {
    fn span_context(&self) -> SpanContext;

    fn set_status(&self, status: SpanStatus);

    fn set_attributes(&self, attributes: &[(String, String)]);

    /// Record an error event on the span
    fn record_error(&self, _message: &str) {}

    /// Ending twice is a no-op
    fn end(&self);

    fn is_recording(&self) -> bool;
}

pub trait Tracer: Send + Sync {
    /// Start a span. `parent` is `None` for a new root.
    fn start_span(&self, name: &str, parent: Option<SpanContext>) -> Arc<dyn Span>;
}

pub trait TracerProvider: Send + Sync {
    fn tracer(&self, name: &str) -> Arc<dyn Tracer>;

    /// Export any buffered spans
    fn force_flush(&self, timeout: Duration) -> Result<()>;

    fn shutdown(&self, timeout: Duration) -> Result<()>;
}

/// A tracer together with the provider that flushes it
#[derive(Clone)]
pub struct TracerHandle {
    tracer: Arc<dyn Tracer>,
    provider: Arc<dyn TracerProvider>,
}

impl TracerHandle {
    pub fn new(provider: Arc<dyn TracerProvider>, tracer_name: &str) -> Self {
        Self {
            tracer: provider.tracer(tracer_name),
            provider,
        }
    }

    /// Handle whose spans carry no identity and whose flush does nothing
    pub fn noop() -> Self {
        Self::new(Arc::new(super::memory::NoopTracerProvider), "noop")
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    pub fn provider(&self) -> &Arc<dyn TracerProvider> {
        &self.provider
    }

    /// Whether both handles share the same provider instance
    pub fn same_provider(&self, other: &TracerHandle) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

impl fmt::Debug for TracerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerHandle").finish_non_exhaustive()
    }
}

/// Ends its span when dropped
#[must_use = "dropping the guard ends the span immediately"]
pub struct SpanGuard {
    span: Arc<dyn Span>,
}

impl SpanGuard {
    pub fn new(span: Arc<dyn Span>) -> Self {
        Self { span }
    }

    pub fn span(&self) -> &Arc<dyn Span> {
        &self.span
    }

    pub fn span_context(&self) -> SpanContext {
        self.span.span_context()
    }

    pub fn end(self) {}
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.span.end();
    }
}

fn start(scope: &Scope, name: &str, parent: Option<SpanContext>) -> (Scope, SpanGuard) {
    let handle = scope.tracer().unwrap_or_else(TracerHandle::noop);
    let span = handle.tracer().start_span(name, parent);
    let child = scope.with_span(Arc::clone(&span));
    (child, SpanGuard::new(span))
}

/// Start a child of the scope's active span, or a root span when none is active.
///
/// Uses the scope's tracer, or a no-op tracer when none is bound.
pub fn start_span(scope: &Scope, name: &str) -> (Scope, SpanGuard) {
    let parent = scope
        .active_span()
        .map(|s| s.span_context())
        .filter(SpanContext::is_valid);
    start(scope, name, parent)
}

/// Start a new root span regardless of the scope's active span
pub fn start_root_span(scope: &Scope, name: &str) -> (Scope, SpanGuard) {
    start(scope, name, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_hex_roundtrip() {
        let trace_id = TraceId::from_bytes([0xab; 16]);
        assert_eq!(trace_id.to_string(), "ab".repeat(16));
        assert_eq!(TraceId::from_hex(&trace_id.to_string()).unwrap(), trace_id);

        let span_id = SpanId::from_hex("00f067aa0ba902b7").unwrap();
        assert_eq!(span_id.to_string(), "00f067aa0ba902b7");
        assert!(span_id.is_valid());
        assert_eq!(SpanId::from_hex("00F067AA0BA902B7").unwrap(), span_id);
    }

    #[test]
    fn test_invalid_ids() {
        assert!(!TraceId::INVALID.is_valid());
        assert!(!SpanId::default().is_valid());
        assert!(!SpanContext::INVALID.is_valid());
        assert!(SpanId::from_hex("xyz").is_err());
        assert!(TraceId::from_hex("zz".repeat(16).as_str()).is_err());
        assert!(TraceId::from_hex(&"ab".repeat(15)).is_err());
    }

    #[test]
    fn test_span_context_validity_needs_both_ids() {
        let ctx = SpanContext::new(TraceId::from_bytes([1; 16]), SpanId::INVALID, None);
        assert!(!ctx.is_valid());
    }
}
