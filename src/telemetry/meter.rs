//! Metrics seam built on the `metrics` facade
//!
//! A [`Meter`] hands out `metrics` instruments registered against a specific
//! recorder rather than the process-global one, so each request scope resolves
//! the meter it was bound with. Without a recorder every instrument is a no-op.

use crate::core::error::Result;
use metrics::{Counter, Gauge, Histogram, Key, Level, Metadata, Recorder};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type SharedRecorder = Arc<dyn Recorder + Send + Sync>;

/// Named source of counters, histograms and gauges
#[derive(Clone)]
pub struct Meter {
    name: String,
    recorder: Option<SharedRecorder>,
}

impl Meter {
    pub fn new(name: impl Into<String>, recorder: SharedRecorder) -> Self {
        Self {
            name: name.into(),
            recorder: Some(recorder),
        }
    }

    pub fn noop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recorder: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> Metadata<'_> {
        Metadata::new(&self.name, Level::INFO, None)
    }

    pub fn counter(&self, name: &str) -> Counter {
        match &self.recorder {
            Some(recorder) => {
                recorder.register_counter(&Key::from_name(name.to_string()), &self.metadata())
            }
            None => Counter::noop(),
        }
    }

    pub fn histogram(&self, name: &str) -> Histogram {
        match &self.recorder {
            Some(recorder) => {
                recorder.register_histogram(&Key::from_name(name.to_string()), &self.metadata())
            }
            None => Histogram::noop(),
        }
    }

    pub fn gauge(&self, name: &str) -> Gauge {
        match &self.recorder {
            Some(recorder) => {
                recorder.register_gauge(&Key::from_name(name.to_string()), &self.metadata())
            }
            None => Gauge::noop(),
        }
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter")
            .field("name", &self.name)
            .field("recording", &self.recorder.is_some())
            .finish()
    }
}

pub trait MeterProvider: Send + Sync {
    fn meter(&self, name: &str) -> Meter;

    /// Collect and export any buffered readings
    fn force_flush(&self, timeout: Duration) -> Result<()>;

    fn shutdown(&self, timeout: Duration) -> Result<()>;
}

/// Provider over any `metrics` recorder. Recorders export on their own
/// schedule, so flushing is a no-op.
#[derive(Clone)]
pub struct RecorderMeterProvider {
    recorder: SharedRecorder,
}

impl RecorderMeterProvider {
    pub fn new<R>(recorder: R) -> Self
    where
        R: Recorder + Send + Sync + 'static,
    {
        Self {
            recorder: Arc::new(recorder),
        }
    }

    pub fn from_arc(recorder: SharedRecorder) -> Self {
        Self { recorder }
    }
}

impl MeterProvider for RecorderMeterProvider {
    fn meter(&self, name: &str) -> Meter {
        Meter::new(name, Arc::clone(&self.recorder))
    }

    fn force_flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMeterProvider;

impl MeterProvider for NoopMeterProvider {
    fn meter(&self, name: &str) -> Meter {
        Meter::noop(name)
    }

    fn force_flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// A meter together with the provider that flushes it
#[derive(Clone)]
pub struct MeterHandle {
    meter: Meter,
    provider: Arc<dyn MeterProvider>,
}

impl MeterHandle {
    pub fn new(provider: Arc<dyn MeterProvider>, meter_name: &str) -> Self {
        Self {
            meter: provider.meter(meter_name),
            provider,
        }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopMeterProvider), "noop")
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn provider(&self) -> &Arc<dyn MeterProvider> {
        &self.provider
    }

    pub fn same_provider(&self, other: &MeterHandle) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

impl fmt::Debug for MeterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterHandle")
            .field("meter", &self.meter)
            .finish_non_exhaustive()
    }
}
