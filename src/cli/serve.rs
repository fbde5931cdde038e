use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{analytics::AnalyticsService, config, error, info, server, success};

pub async fn serve(service: AnalyticsService, shutdown: CancellationToken) {
    let addr = config::server_addr();
    info!("Serving analytics on http://{}", addr);

    if let Err(e) = server::start_api_server(Arc::new(service), &addr, shutdown).await {
        error!("Server failed. Err: {}", e);
    }
    success!("Server stopped");
}
