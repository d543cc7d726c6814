//! # API Responses
//!
//! Turns the row every compiled statement returns into the HTTP-facing
//! `{status, headers, body}` triple.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::db::{as_i64, truthy, Row};

use super::errors::{ApiError, ApiResult};

/// Columns every main or select statement yields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbResponseRow {
    pub body: Option<String>,
    pub page_total: Option<i64>,
    pub total_result_set: Option<i64>,
    pub constraints_satisfied: Option<bool>,
    pub response_headers: Option<String>,
    pub response_status: Option<u16>,
}

impl DbResponseRow {
    pub fn from_row(row: &Row) -> Self {
        let present = |name: &str| row.get(name).filter(|v| !v.is_null());
        Self {
            body: present("body").map(text_of),
            page_total: present("page_total").and_then(as_i64),
            total_result_set: present("total_result_set").and_then(as_i64),
            constraints_satisfied: present("constraints_satisfied").map(truthy),
            response_headers: present("response_headers").map(text_of),
            response_status: present("response_status")
                .and_then(as_i64)
                .and_then(|s| u16::try_from(s).ok())
                .filter(|s| *s != 0),
        }
    }

    /// Permission check folded into the main statement; absent means passed
    pub fn constraints_failed(&self) -> bool {
        self.constraints_satisfied == Some(false)
    }

    /// Parse `response_headers`: a JSON object, or a list of single-key objects
    pub fn parsed_headers(&self) -> ApiResult<Vec<(String, String)>> {
        let raw = match self.response_headers.as_deref() {
            None | Some("") => return Ok(Vec::new()),
            Some(raw) => raw,
        };
        let value: Value = serde_json::from_str(raw).map_err(|_| ApiError::ResponseHeaders)?;
        let mut headers = Vec::new();
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    headers.push((k, text_of(&v)));
                }
            }
            Value::Array(items) => {
                for item in items {
                    let Value::Object(map) = item else {
                        return Err(ApiError::ResponseHeaders);
                    };
                    if map.len() != 1 {
                        return Err(ApiError::ResponseHeaders);
                    }
                    for (k, v) in map {
                        headers.push((k, text_of(&v)));
                    }
                }
            }
            Value::Null => {}
            _ => return Err(ApiError::ResponseHeaders),
        }
        Ok(headers)
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Final response handed to the HTTP layer
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    /// Build the response for a result row; `offset` comes from the query string
    pub fn from_db_row(row: &DbResponseRow, offset: i64) -> ApiResult<Self> {
        let status = row.response_status.unwrap_or(200);
        let page_total = row.page_total.unwrap_or(0);
        let body = row.body.clone().unwrap_or_default();

        let mut headers = row.parsed_headers()?;
        let mut set = |name: &str, value: String| {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            headers.push((name.to_string(), value));
        };
        set("content-length", body.len().to_string());
        set("content-type", "application/json".to_string());
        set("range-unit", "items".to_string());
        set(
            "content-range",
            fmt_content_range(
                offset,
                offset.saturating_add(page_total).saturating_sub(1),
                row.total_result_set,
            ),
        );

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Pretty JSON document with status 200
    pub fn json(value: &Value) -> Self {
        let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string());
        Self {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let map = response.headers_mut();
        for (k, v) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                map.append(name, value);
            }
        }
        response
    }
}

/// Format a `content-range` value, e.g. `0-9/100`, `*/0`, `*/*`
pub fn fmt_content_range(lower: i64, upper: i64, total: Option<i64>) -> String {
    let range = match total {
        Some(t) if t != 0 && lower <= upper => format!("{}-{}", lower, upper),
        _ => "*".to_string(),
    };
    match total {
        Some(t) => format!("{}/{}", range, t),
        None => format!("{}/*", range),
    }
}

/// Parsed `content-range` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub first: i64,
    pub last: i64,
    pub total: i64,
}

/// Parse `first-last/total`; unparseable pieces become 0
pub fn parse_range_header(value: &str) -> ContentRange {
    let (range, total) = value.split_once('/').unwrap_or((value, ""));
    let (first, last) = range.split_once('-').unwrap_or((range, ""));
    let num = |s: &str| s.trim().parse::<i64>().unwrap_or(0);
    ContentRange {
        first: num(first),
        last: num(last),
        total: num(total),
    }
}
