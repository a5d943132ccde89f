//! Application state shared by all HTTP handlers.

use kasir_runtime::PosService;
use kasir_runtime::metrics::MetricsExporter;
use std::sync::Arc;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The point-of-sale service
    pub service: PosService,
    /// Installed Prometheus exporter, when metrics are enabled
    pub metrics: Option<Arc<MetricsExporter>>,
}

impl AppState {
    /// State without a metrics exporter.
    #[must_use]
    pub const fn new(service: PosService) -> Self {
        Self {
            service,
            metrics: None,
        }
    }

    /// Attach an installed exporter.
    #[must_use]
    pub fn with_metrics(mut self, exporter: MetricsExporter) -> Self {
        self.metrics = Some(Arc::new(exporter));
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
