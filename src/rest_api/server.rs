//! # HTTP Server
//!
//! Axum wiring for hosts that want a ready-made router. Every path not
//! matched by the view routes goes to the REST gateway.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::api::{ApiResponse, ApiResult};
use crate::db::DbClient;
use crate::request::HostRequest;

use super::handler::RestGateway;

/// Path of the role-filtered schema view
pub const SCHEMA_ROUTE: &str = "/_schema";
/// Path of the role-filtered permissions view
pub const PERMISSIONS_ROUTE: &str = "/_permissions";

/// Gateway plus the connection it runs requests on.
///
/// Requests share `client`; each one holds the client's session while it
/// runs, so a single-connection client serves them one at a time.
pub struct RestServer {
    gateway: Arc<RestGateway>,
    client: Arc<dyn DbClient>,
}

type ServerState = Arc<RestServer>;

impl RestServer {
    pub fn new(gateway: Arc<RestGateway>, client: Arc<dyn DbClient>) -> Self {
        Self { gateway, client }
    }

    /// Build the Axum router
    pub fn router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route(SCHEMA_ROUTE, get(schema_handler))
            .route(PERMISSIONS_ROUTE, get(permissions_handler))
            .fallback(rest_handler)
            .with_state(state)
    }
}

async fn rest_handler(State(server): State<ServerState>, req: Request<Body>) -> Response {
    let request = HostRequest::from(req);
    match server.gateway.handle(server.client.as_ref(), request).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn role_of(server: &RestServer, req: Request<Body>) -> ApiResult<String> {
    let request = HostRequest::from(req).normalize().await?;
    Ok(server.gateway.authenticate(&request)?.role)
}

async fn schema_handler(State(server): State<ServerState>, req: Request<Body>) -> Response {
    let result: ApiResult<ApiResponse> = async {
        let role = role_of(&server, req).await?;
        server.gateway.schema_response(&role)
    }
    .await;
    match result {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn permissions_handler(State(server): State<ServerState>, req: Request<Body>) -> Response {
    let result: ApiResult<ApiResponse> = async {
        let role = role_of(&server, req).await?;
        server.gateway.permissions_response(&role)
    }
    .await;
    match result {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::db::SqliteClient;

    #[test]
    fn test_server_creation() {
        let gateway = Arc::new(RestGateway::new(&GatewayConfig::default()));
        let client: Arc<dyn DbClient> = Arc::new(SqliteClient::open_in_memory().unwrap());
        let _router = RestServer::new(gateway, client).router();
    }
}
