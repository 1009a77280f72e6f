//! Admin route handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use lumber_pipeline::{Pipeline, Sample, StatusCount, SAMPLE_TIMEOUT};

use crate::error::ApiError;
use crate::PipelineRegistry;

pub fn router(registry: Arc<PipelineRegistry>) -> Router {
    Router::new()
        .route("/pipelines/{name}", get(pipeline_status))
        .route("/pipelines/{name}/{index}/info", get(action_info))
        .route("/pipelines/{name}/{index}/sample", get(action_sample))
        .route("/pipelines/{name}/{index}/{endpoint}", get(plugin_endpoint))
        .with_state(registry)
}

fn lookup(registry: &PipelineRegistry, name: &str) -> Result<Arc<Pipeline>, ApiError> {
    registry
        .get(name)
        .ok_or_else(|| ApiError::UnknownPipeline(name.to_string()))
}

/// Map an admin index onto an action position; only `1..=actions` are
/// actions (0 is the input, the last index the output).
fn action_position(pipeline: &Pipeline, index: usize) -> Result<usize, ApiError> {
    if index == 0 || index > pipeline.action_count() {
        return Err(ApiError::NotAnAction(index));
    }
    Ok(index - 1)
}

async fn pipeline_status(
    State(registry): State<Arc<PipelineRegistry>>,
    Path(name): Path<String>,
) -> Result<Html<String>, ApiError> {
    let pipeline = lookup(&registry, &name)?;
    Ok(Html(format!(
        "<html><body><pre>{}</pre></body></html>",
        pipeline.status_dump()
    )))
}

async fn action_info(
    State(registry): State<Arc<PipelineRegistry>>,
    Path((name, index)): Path<(String, usize)>,
) -> Result<Json<Vec<StatusCount>>, ApiError> {
    let pipeline = lookup(&registry, &name)?;
    let position = action_position(&pipeline, index)?;
    Ok(Json(pipeline.action_metric_values(position)?))
}

async fn action_sample(
    State(registry): State<Arc<PipelineRegistry>>,
    Path((name, index)): Path<(String, usize)>,
) -> Result<Json<Sample>, ApiError> {
    let pipeline = lookup(&registry, &name)?;
    let position = action_position(&pipeline, index)?;

    // the request parks for up to five seconds; keep it off the runtime
    let sample = tokio::task::spawn_blocking(move || {
        pipeline.action_sample(position, SAMPLE_TIMEOUT)
    })
    .await
    .map_err(|_| ApiError::Pipeline(lumber_pipeline::PipelineError::SampleTimeout))??;

    Ok(Json(sample))
}

async fn plugin_endpoint(
    State(registry): State<Arc<PipelineRegistry>>,
    Path((name, index, endpoint)): Path<(String, usize, String)>,
) -> Result<Json<Value>, ApiError> {
    let pipeline = lookup(&registry, &name)?;
    let handler = pipeline
        .endpoint(index, &endpoint)
        .ok_or(ApiError::UnknownEndpoint(endpoint))?;
    Ok(Json(handler()))
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
