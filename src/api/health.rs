use std::sync::Arc;

use axum::{Extension, response::Json};
use serde_json::{Value, json};

use crate::analytics::AnalyticsService;

pub async fn health(Extension(service): Extension<Arc<AnalyticsService>>) -> Json<Value> {
    let gateway = service.spotify().gateway().snapshot().await;

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway": gateway,
    }))
}
