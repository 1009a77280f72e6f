//! Lumber - Admin API
//!
//! The HTTP admin surface over running pipelines:
//!
//! - `GET /pipelines/{name}` - status page with stream and pool dumps
//! - `GET /pipelines/{name}/{i}/info` - action `i` metric counters as
//!   JSON `[{status, count}, …]`
//! - `GET /pipelines/{name}/{i}/sample` - first before/after snapshot
//!   from any worker, bounded at five seconds
//! - `GET /pipelines/{name}/{i}/{endpoint}` - plugin-registered endpoint
//!
//! Indexes follow the configuration: 0 is the input plugin, `1..=k` the
//! actions, `k + 1` the output plugin. Errors render as `{"error": …}`.

mod error;
mod routes;

pub use error::ApiError;
pub use routes::router;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;

use lumber_pipeline::Pipeline;

/// Pipelines served by the admin surface, by name.
#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: RwLock<HashMap<String, Arc<Pipeline>>>,
}

impl PipelineRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, pipeline: Arc<Pipeline>) {
        self.pipelines
            .write()
            .insert(pipeline.name().to_string(), pipeline);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Pipeline>> {
        self.pipelines.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pipelines.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Serve the admin surface until the listener fails.
pub async fn serve(addr: SocketAddr, registry: Arc<PipelineRegistry>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "admin api listening");
    axum::serve(listener, router(registry)).await?;
    Ok(())
}
