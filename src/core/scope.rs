//! Request scopes carrying observability handles
//!
//! A [`Scope`] is an immutable chain of bindings. Each `with_*` call returns a
//! new scope layered on top of the current one; lookups walk the chain from
//! the newest binding, so a child sees its parent's bindings unless it
//! overrides them. Cloning a scope is an `Arc` clone, and handles are shared
//! by reference, never duplicated.
//!
//! An absent binding is a normal outcome. Nothing here falls back to a global
//! logger: [`Scope::logger`] returns `None` when no logger was bound, which is
//! different from a bound [`Logger::noop`].

use super::field::Field;
use super::flush::Deadline;
use super::logger::Logger;
use super::metadata::{merge, MetadataRecord};
use crate::telemetry::meter::MeterHandle;
use crate::telemetry::trace::{Span, SpanContext, TracerHandle};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// The logger, tracer and meter bound at a request root
#[derive(Clone)]
pub struct ObservabilityHandles {
    pub logger: Logger,
    pub tracer: TracerHandle,
    pub meter: MeterHandle,
}

impl ObservabilityHandles {
    pub fn new(logger: Logger, tracer: TracerHandle, meter: MeterHandle) -> Self {
        Self {
            logger,
            tracer,
            meter,
        }
    }

    /// Handles that discard everything
    pub fn noop() -> Self {
        Self::new(Logger::noop(), TracerHandle::noop(), MeterHandle::noop())
    }
}

impl fmt::Debug for ObservabilityHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservabilityHandles").finish_non_exhaustive()
    }
}

#[derive(Clone)]
enum Binding {
    Logger(Logger),
    Tracer(TracerHandle),
    Meter(MeterHandle),
    Metadata(Arc<MetadataRecord>),
    Span(Arc<dyn Span>),
    Deadline(Deadline),
    Value(TypeId, Arc<dyn Any + Send + Sync>),
}

struct Node {
    binding: Binding,
    parent: Option<Arc<Node>>,
}

/// Immutable, cheaply cloned set of bindings for one unit of work
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Node>>,
}

impl Scope {
    /// Empty scope with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn push(&self, binding: Binding) -> Scope {
        Scope {
            head: Some(Arc::new(Node {
                binding,
                parent: self.head.clone(),
            })),
        }
    }

    fn find<T>(&self, pick: impl Fn(&Binding) -> Option<T>) -> Option<T> {
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if let Some(found) = pick(&current.binding) {
                return Some(found);
            }
            node = current.parent.as_deref();
        }
        None
    }

    /// Bind a request root's logger, tracer and meter
    pub fn bind(&self, handles: ObservabilityHandles) -> Scope {
        self.with_logger(handles.logger)
            .with_tracer(handles.tracer)
            .with_meter(handles.meter)
    }

    pub fn with_logger(&self, logger: Logger) -> Scope {
        self.push(Binding::Logger(logger.detached()))
    }

    pub fn with_tracer(&self, tracer: TracerHandle) -> Scope {
        self.push(Binding::Tracer(tracer))
    }

    pub fn with_meter(&self, meter: MeterHandle) -> Scope {
        self.push(Binding::Meter(meter))
    }

    /// Make `span` the active span for this scope and its descendants
    pub fn with_span(&self, span: Arc<dyn Span>) -> Scope {
        self.push(Binding::Span(span))
    }

    pub fn with_deadline(&self, deadline: Deadline) -> Scope {
        self.push(Binding::Deadline(deadline))
    }

    /// Merge `incoming` into the current metadata. The parent's record is left
    /// untouched; the merged copy is bound to the returned scope.
    pub fn with_metadata(&self, incoming: &MetadataRecord) -> Scope {
        let merged = match self.metadata() {
            Some(current) => merge(&current, incoming),
            None => incoming.clone(),
        };
        self.push(Binding::Metadata(Arc::new(merged)))
    }

    /// Bind an arbitrary value, resolved by its type
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Scope {
        self.push(Binding::Value(TypeId::of::<T>(), Arc::new(value)))
    }

    /// The bound logger as it was bound, not attached to any scope
    pub fn bound_logger(&self) -> Option<Logger> {
        self.find(|b| match b {
            Binding::Logger(l) => Some(l.clone()),
            _ => None,
        })
    }

    /// The bound logger, attached to this scope so it picks up the active
    /// span and metadata. `None` when no logger was bound.
    pub fn logger(&self) -> Option<Logger> {
        self.bound_logger().map(|l| l.attach(self.clone()))
    }

    /// The bound logger, or an inert one when none is bound
    pub fn logger_or_noop(&self) -> Logger {
        self.logger().unwrap_or_else(Logger::noop)
    }

    pub fn tracer(&self) -> Option<TracerHandle> {
        self.find(|b| match b {
            Binding::Tracer(t) => Some(t.clone()),
            _ => None,
        })
    }

    pub fn meter(&self) -> Option<MeterHandle> {
        self.find(|b| match b {
            Binding::Meter(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn metadata(&self) -> Option<Arc<MetadataRecord>> {
        self.find(|b| match b {
            Binding::Metadata(m) => Some(Arc::clone(m)),
            _ => None,
        })
    }

    pub fn active_span(&self) -> Option<Arc<dyn Span>> {
        self.find(|b| match b {
            Binding::Span(s) => Some(Arc::clone(s)),
            _ => None,
        })
    }

    /// Context of the active span, when there is one with valid ids
    pub fn span_context(&self) -> Option<SpanContext> {
        self.active_span()
            .map(|s| s.span_context())
            .filter(SpanContext::is_valid)
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.find(|b| match b {
            Binding::Deadline(d) => Some(*d),
            _ => None,
        })
    }

    pub fn value<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let wanted = TypeId::of::<T>();
        self.find(|b| match b {
            Binding::Value(id, v) if *id == wanted => Arc::clone(v).downcast::<T>().ok(),
            _ => None,
        })
    }

    /// Bind a child of the current logger carrying `fields` as extra defaults.
    ///
    /// Tracer, meter and metadata are unchanged. Without a bound logger the
    /// scope is returned as is.
    pub fn derive_child_logger(&self, fields: impl IntoIterator<Item = Field>) -> Scope {
        match self.bound_logger() {
            Some(logger) => self.with_logger(logger.new_child(fields)),
            None => self.clone(),
        }
    }

    /// Re-bind the logger, tracer, meter and metadata of `from` onto `to`.
    ///
    /// Handles are shared, not duplicated. The active span and deadline are
    /// not carried over: `to` keeps its own.
    pub fn copy(from: &Scope, to: &Scope) -> Scope {
        let mut out = to.clone();
        if let Some(logger) = from.bound_logger() {
            out = out.with_logger(logger);
        }
        if let Some(tracer) = from.tracer() {
            out = out.with_tracer(tracer);
        }
        if let Some(meter) = from.meter() {
            out = out.with_meter(meter);
        }
        if let Some(metadata) = from.metadata() {
            out = out.push(Binding::Metadata(metadata));
        }
        out
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            depth += 1;
            node = current.parent.as_deref();
        }
        f.debug_struct("Scope").field("bindings", &depth).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{Repository, Service};
    use crate::telemetry::memory::InMemoryTracerProvider;
    use crate::telemetry::trace::start_span;

    #[derive(Debug, PartialEq)]
    struct AwsRegion(&'static str);

    #[test]
    fn test_empty_scope_resolves_nothing() {
        let scope = Scope::new();
        assert!(scope.logger().is_none());
        assert!(scope.tracer().is_none());
        assert!(scope.meter().is_none());
        assert!(scope.metadata().is_none());
        assert!(scope.active_span().is_none());
        assert!(scope.value::<AwsRegion>().is_none());
    }

    #[test]
    fn test_absent_logger_differs_from_noop() {
        let scope = Scope::new();
        assert!(scope.bound_logger().is_none());

        let bound = scope.with_logger(Logger::noop());
        assert!(bound.bound_logger().is_some());
    }

    #[test]
    fn test_child_sees_parent_bindings_until_overridden() {
        let parent = Scope::new().with_value(AwsRegion("ap-southeast-2"));
        let child = parent.with_value(7u32);
        assert_eq!(*child.value::<AwsRegion>().unwrap(), AwsRegion("ap-southeast-2"));

        let overridden = child.with_value(AwsRegion("us-east-1"));
        assert_eq!(*overridden.value::<AwsRegion>().unwrap(), AwsRegion("us-east-1"));
        assert_eq!(*parent.value::<AwsRegion>().unwrap(), AwsRegion("ap-southeast-2"));
    }

    #[test]
    fn test_metadata_copy_on_write() {
        let root = Scope::new()
            .with_metadata(&MetadataRecord::default().with_repository(Repository::named("r")));
        let child = root.with_metadata(&MetadataRecord::default().with_service(Service::named("s")));

        let root_meta = root.metadata().unwrap();
        let child_meta = child.metadata().unwrap();
        assert!(root_meta.service.is_none());
        assert_eq!(child_meta.repository.as_ref().unwrap().name.as_deref(), Some("r"));
        assert_eq!(child_meta.service.as_ref().unwrap().name.as_deref(), Some("s"));
    }

    #[test]
    fn test_copy_shares_handles() {
        let provider = Arc::new(InMemoryTracerProvider::new());
        let from = Scope::new()
            .bind(ObservabilityHandles::new(
                Logger::noop(),
                TracerHandle::new(provider, "copy"),
                MeterHandle::noop(),
            ))
            .with_metadata(&MetadataRecord::default().with_repository(Repository::named("r")));

        let to = Scope::new().with_value(AwsRegion("eu-west-1"));
        let copied = Scope::copy(&from, &to);

        assert!(copied.bound_logger().is_some());
        assert!(copied.tracer().unwrap().same_provider(&from.tracer().unwrap()));
        assert!(copied.meter().unwrap().same_provider(&from.meter().unwrap()));
        assert!(Arc::ptr_eq(&copied.metadata().unwrap(), &from.metadata().unwrap()));
        assert!(copied.value::<AwsRegion>().is_some());
    }

    #[test]
    fn test_copy_leaves_span_behind() {
        let provider = Arc::new(InMemoryTracerProvider::new());
        let from = Scope::new().with_tracer(TracerHandle::new(provider, "copy"));
        let (from, _guard) = start_span(&from, "parent");

        let copied = Scope::copy(&from, &Scope::new());
        assert!(copied.tracer().is_some());
        assert!(copied.active_span().is_none());
    }

    #[test]
    fn test_derive_child_logger_without_logger() {
        let scope = Scope::new().with_value(1u8);
        let derived = scope.derive_child_logger([Field::string("k", "v")]);
        assert!(derived.bound_logger().is_none());
    }
}
