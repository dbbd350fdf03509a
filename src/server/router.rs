// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::ApiError;

use super::handlers;
use super::operation::{ACTION_HEADER, Operation};
use super::response::{self, ALLOW_HEADERS, ALLOW_METHODS, ALLOW_ORIGIN};
use super::state::AppState;

/// Build the HTTP router.
///
/// Every path is served by one dispatcher keyed on method and `X-Action`.
/// The CORS headers are set on every response, errors included.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    // Preflights never depend on configuration
    if request.method() == Method::OPTIONS {
        return response::preflight(request.headers());
    }

    let backend = match state.backend() {
        Ok(backend) => backend,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let action = request
        .headers()
        .get(ACTION_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    let result = match Operation::resolve(request.method(), action.as_deref()) {
        Ok(operation) => {
            debug!(?operation, "dispatching request");
            handlers::handle(&backend, operation, request).await
        }
        Err(e) => Err(e),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}
