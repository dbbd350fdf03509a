// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use crate::catalog::MutationOutcome;
use crate::error::ApiError;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, PUT, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, X-Custom-Filename, X-Action";
const PREFLIGHT_MAX_AGE: &str = "86400";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            error!(code, error = %self, "request failed");
        } else {
            warn!(code, error = %self, "request rejected");
        }

        let body = json!({
            "success": false,
            "error": code,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// `{"success": true}` merged with the fields of `body`
pub fn success(body: Value) -> Response {
    let mut fields = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => Map::from_iter([("data".to_string(), other)]),
    };
    fields.insert("success".into(), Value::Bool(true));
    (StatusCode::OK, Json(Value::Object(fields))).into_response()
}

/// Success body for a catalog read-modify-write
pub fn mutation(outcome: &MutationOutcome) -> Value {
    json!({
        "changed": outcome.changed(),
        "revision": outcome.revision().map(|r| r.as_str()),
    })
}

/// Answer to an OPTIONS request.
///
/// A CORS preflight gets the permitted methods and headers; any other
/// OPTIONS request only learns the allowed methods.
pub fn preflight(headers: &HeaderMap) -> Response {
    let is_cors_preflight = [
        header::ORIGIN,
        header::ACCESS_CONTROL_REQUEST_METHOD,
        header::ACCESS_CONTROL_REQUEST_HEADERS,
    ]
    .iter()
    .all(|name| headers.contains_key(name));

    let mut response = StatusCode::NO_CONTENT.into_response();
    let out = response.headers_mut();
    if is_cors_preflight {
        out.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
    } else {
        out.insert(header::ALLOW, HeaderValue::from_static(ALLOW_METHODS));
    }
    response
}
