use crate::api::api_error::APIError;
use crate::api::model::{AddProxyRequest, ProxyResult, RemoveProxyRequest};
use crate::api::server::AppState;
use crate::error::Error;
use crate::workflow::{AddOutcome, RemoveOutcome};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the API router. `/healthcheck` is open, every other route requires an
/// [ACL][crate::config::Config::acl] permitted caller.
pub fn new(state: AppState) -> Router {
    Router::new()
        .route("/add-proxy", post(add_proxy))
        .route("/remove-proxy", post(remove_proxy))
        .route_layer(middleware::from_fn_with_state(state.clone(), authorize))
        .route("/healthcheck", get(health_check))
        .layer(cors(&state.config.origins))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins = origins.iter().filter_map(|origin| {
        let value = HeaderValue::from_str(origin);
        if value.is_err() {
            tracing::warn!("ignoring invalid CORS origin \"{origin}\"");
        }
        value.ok()
    });
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

async fn authorize<B>(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, APIError> {
    let client_ip = client_addr.ip();
    if !state.config.caller_permitted(client_ip) {
        tracing::debug!("rejected request from {client_ip}");
        return Err(Error::Forbidden(client_ip).into());
    }

    if let Some(token) = &state.config.access_token {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(token.as_str()) {
            tracing::debug!("rejected request from {client_ip}: bad bearer token");
            return Err(Error::Unauthorized.into());
        }
    }
    Ok(next.run(request).await)
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

// The workflow runs on its own task: if the request times out or the client goes away, the
// run it started still completes.
async fn add_proxy(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<AddProxyRequest>, APIError>,
) -> Result<Response, APIError> {
    let provisioner = state.provisioner.clone();
    let run = tokio::spawn(async move {
        provisioner
            .add_route(&payload.domain, &payload.target)
            .await
    });
    match run.await?? {
        AddOutcome::Created(route) => Ok((
            StatusCode::CREATED,
            Json(ProxyResult::created(route.cert_domain)),
        )
            .into_response()),
        AddOutcome::Conflict(reason) => Ok((
            StatusCode::CONFLICT,
            Json(json!({"error": reason.to_string()})),
        )
            .into_response()),
    }
}

async fn remove_proxy(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RemoveProxyRequest>, APIError>,
) -> Result<Json<ProxyResult>, APIError> {
    let provisioner = state.provisioner.clone();
    let run = tokio::spawn(async move { provisioner.remove_route(&payload.domain).await });
    match run.await?? {
        RemoveOutcome::Deleted => Ok(Json(ProxyResult::deleted(None))),
        RemoveOutcome::DeletedWithStaleRecord { cause } => Ok(Json(ProxyResult::deleted(Some(
            format!("DNS record not deleted: {cause}"),
        )))),
    }
}
