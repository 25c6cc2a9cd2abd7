//! `{ data, meta }` wrapper for the v1 routes
//!
//! Failures answer `{ error: { code, message }, meta }` with the same `meta`,
//! so a client can always read `meta.timestamp` to see how fresh a reading is.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub opwatch_version: &'static str,
}

impl Meta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            opwatch_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
struct DataBody<T> {
    data: T,
    meta: Meta,
}

/// 200 with `body` under `data`.
pub fn data<T: Serialize>(body: T) -> Response {
    Json(DataBody {
        data: body,
        meta: Meta::now(),
    })
    .into_response()
}

/// A v1 request that cannot be answered.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
    meta: Meta,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
            },
            meta: Meta::now(),
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;
