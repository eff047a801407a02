use crate::images::MediaStore;
use crate::storage::Storage;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub media: MediaStore,
    pub page_size: usize,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, media: MediaStore, page_size: usize) -> Self {
        Self {
            storage,
            media,
            page_size,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}
