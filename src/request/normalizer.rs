//! Request normalization
//!
//! Host environments hand over requests in a few structural shapes: the
//! body may already be buffered, readable as a byte stream, or readable
//! through one asynchronous call. [`HostRequest::normalize`] turns all of
//! them into a [`NormalizedRequest`].

use axum::body::{Body, Bytes};
use axum::extract::Query;
use axum::http::{Method, Request, Uri};
use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;

use super::errors::{RequestError, RequestResult};

/// Error type produced by host body sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body materialized by an upstream layer
#[derive(Debug, Clone, PartialEq)]
pub enum BufferedBody {
    Text(String),
    /// Already parsed; re-encoded as JSON text
    Json(Value),
    Bytes(Bytes),
}

/// Where the request body comes from
pub enum RequestBody {
    Empty,
    Buffered(BufferedBody),
    /// Incremental byte stream, drained in arrival order
    Stream(BoxStream<'static, Result<Bytes, BoxError>>),
    /// Single-shot asynchronous read returning the whole body as text
    ReadOnce(Box<dyn FnOnce() -> BoxFuture<'static, Result<String, BoxError>> + Send>),
}

impl RequestBody {
    pub fn text(body: impl Into<String>) -> Self {
        RequestBody::Buffered(BufferedBody::Text(body.into()))
    }

    pub fn json(body: Value) -> Self {
        RequestBody::Buffered(BufferedBody::Json(body))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: futures_util::Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        RequestBody::Stream(stream.boxed())
    }

    pub fn read_once<F, Fut>(read: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<String, BoxError>> + Send + 'static,
    {
        RequestBody::ReadOnce(Box::new(move || Box::pin(read())))
    }

    fn kind(&self) -> &'static str {
        match self {
            RequestBody::Empty => "empty",
            RequestBody::Buffered(_) => "buffered",
            RequestBody::Stream(_) => "stream",
            RequestBody::ReadOnce(_) => "read_once",
        }
    }

    async fn into_text(self) -> RequestResult<String> {
        match self {
            RequestBody::Empty => Ok(String::new()),
            RequestBody::Buffered(BufferedBody::Text(text)) => Ok(text),
            RequestBody::Buffered(BufferedBody::Json(value)) => Ok(value.to_string()),
            RequestBody::Buffered(BufferedBody::Bytes(bytes)) => {
                String::from_utf8(bytes.to_vec()).map_err(|_| RequestError::InvalidUtf8)
            }
            RequestBody::Stream(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| RequestError::BodyRead(e.to_string()))?;
                    buf.extend_from_slice(&chunk);
                }
                String::from_utf8(buf).map_err(|_| RequestError::InvalidUtf8)
            }
            RequestBody::ReadOnce(read) => read().await.map_err(|e| RequestError::BodyRead(e.to_string())),
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RequestBody").field(&self.kind()).finish()
    }
}

/// A request as the host hands it over
#[derive(Debug)]
pub struct HostRequest {
    pub method: Method,
    pub uri: Uri,
    /// Header pairs in arrival order, original case
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HostRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Build from a method and URL text
    pub fn parse(method: Method, url: &str) -> RequestResult<Self> {
        let uri = url
            .parse::<Uri>()
            .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        Ok(Self::new(method, uri))
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Produce the canonical request.
    ///
    /// Consumes the handle, so a body is never read twice. Read-only
    /// methods always yield an empty body and their body source is never
    /// touched.
    pub async fn normalize(self) -> RequestResult<NormalizedRequest> {
        let HostRequest {
            method,
            uri,
            headers,
            body,
        } = self;

        let body = if method.is_safe() {
            String::new()
        } else {
            body.into_text().await?
        };

        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        Ok(NormalizedRequest {
            method,
            uri,
            body,
            headers,
        })
    }
}

impl From<Request<Body>> for HostRequest {
    fn from(req: Request<Body>) -> Self {
        let (parts, body) = req.into_parts();
        let headers = parts
            .headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let stream = body
            .into_data_stream()
            .map_err(|e| Box::new(e) as BoxError);
        Self {
            method: parts.method,
            uri: parts.uri,
            headers,
            body: RequestBody::stream(stream),
        }
    }
}

/// Canonical request: method, URL, text body and lower-cased headers
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub method: Method,
    pub uri: Uri,
    pub body: String,
    /// Lower-cased keys, arrival order and duplicates kept
    pub headers: Vec<(String, String)>,
}

impl NormalizedRequest {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Decoded query pairs in order
    pub fn query_pairs(&self) -> RequestResult<Vec<(String, String)>> {
        Query::<Vec<(String, String)>>::try_from_uri(&self.uri)
            .map(|Query(pairs)| pairs)
            .map_err(|e| RequestError::InvalidQuery(e.body_text()))
    }

    /// First value of a header (name must be lower case)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_read_only(&self) -> bool {
        self.method.is_safe()
    }
}
