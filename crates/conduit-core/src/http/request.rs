//! The inbound request as seen by a compiled pipeline.

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A request body stream.
pub type BoxedBody = Box<dyn AsyncRead + Send + Unpin>;

// ============================================================================
// ValueMap
// ============================================================================

/// Multi-valued map with case-insensitive keys, used for route values,
/// query strings and headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueMap {
    entries: Vec<(String, Vec<String>)>,
}

impl ValueMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Replaces all values of `key`.
    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.position(&key) {
            Some(i) => self.entries[i].1 = values,
            None => self.entries.push((key, values)),
        }
    }

    /// All values of `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.position(key).map(|i| self.entries[i].1.as_slice())
    }

    /// The first value of `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values of `key` joined with `,`.
    pub fn joined(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.join(","))
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

// ============================================================================
// Media types
// ============================================================================

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Returns `true` for `application/json` and any `+json` media type.
pub fn is_json_media_type(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == "application/json" || essence.ends_with("+json")
}

/// Returns `true` for url-encoded and multipart form media types.
pub fn is_form_media_type(content_type: &str) -> bool {
    matches!(
        essence(content_type).as_str(),
        "application/x-www-form-urlencoded" | "multipart/form-data"
    )
}

// ============================================================================
// HttpRequest
// ============================================================================

enum BodyState {
    Pending(Option<BoxedBody>),
    Buffered(Arc<[u8]>),
    Failed { kind: io::ErrorKind, message: String },
}

impl BodyState {
    fn failed(err: &io::Error) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Records a read that was dropped before it finished.
struct PendingRead<'a> {
    state: &'a Mutex<BodyState>,
    finished: bool,
}

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let err = io::Error::new(
                io::ErrorKind::Interrupted,
                "reading the request body was cancelled",
            );
            *self.state.lock() = BodyState::failed(&err);
        }
    }
}

struct RequestParts {
    method: String,
    path: String,
    route_values: ValueMap,
    query: ValueMap,
    headers: ValueMap,
    client_certificate: Option<Arc<[u8]>>,
    has_body: bool,
    body: Mutex<BodyState>,
}

/// The inbound request. Cloning is cheap and shares the body.
#[derive(Clone)]
pub struct HttpRequest {
    inner: Arc<RequestParts>,
}

impl HttpRequest {
    /// Starts building a request.
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// The request method.
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// The request path.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Route values captured by the router.
    pub fn route_values(&self) -> &ValueMap {
        &self.inner.route_values
    }

    /// Query string values.
    pub fn query(&self) -> &ValueMap {
        &self.inner.query
    }

    /// Request headers.
    pub fn headers(&self) -> &ValueMap {
        &self.inner.headers
    }

    /// The `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.inner.headers.first("content-type")
    }

    /// The `Content-Length` header, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.inner
            .headers
            .first("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// The client certificate presented on the connection.
    pub fn client_certificate(&self) -> Option<&[u8]> {
        self.inner.client_certificate.as_deref()
    }

    /// Returns `true` if the request may carry body bytes.
    pub fn can_have_body(&self) -> bool {
        self.inner.has_body && self.content_length() != Some(0)
    }

    /// Returns `true` if the content type is JSON.
    pub fn has_json_content_type(&self) -> bool {
        self.content_type().is_some_and(is_json_media_type)
    }

    /// Returns `true` if the content type is a form.
    pub fn has_form_content_type(&self) -> bool {
        self.content_type().is_some_and(is_form_media_type)
    }

    /// Returns `true` if an `Authorization: Bearer` header is present.
    pub fn has_bearer_authorization(&self) -> bool {
        self.inner.headers.get("authorization").is_some_and(|values| {
            values.iter().any(|v| {
                v.trim_start()
                    .get(..7)
                    .is_some_and(|scheme| scheme.eq_ignore_ascii_case("bearer "))
            })
        })
    }

    /// Reads the whole body.
    ///
    /// The stream is consumed on the first call; later calls return the
    /// buffered bytes, or the same error if the first read failed or was
    /// cancelled.
    pub async fn read_body(&self) -> io::Result<Arc<[u8]>> {
        let reader = {
            let mut state = self.inner.body.lock();
            match &mut *state {
                BodyState::Buffered(bytes) => return Ok(bytes.clone()),
                BodyState::Failed { kind, message } => {
                    return Err(io::Error::new(*kind, message.clone()));
                }
                BodyState::Pending(reader) => reader.take(),
            }
        };

        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let mut pending = PendingRead {
                state: &self.inner.body,
                finished: false,
            };
            let outcome = reader.read_to_end(&mut buf).await;
            pending.finished = true;
            if let Err(err) = outcome {
                *self.inner.body.lock() = BodyState::failed(&err);
                return Err(err);
            }
        }
        let bytes: Arc<[u8]> = Arc::from(buf);
        *self.inner.body.lock() = BodyState::Buffered(bytes.clone());
        Ok(bytes)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.inner.method)
            .field("path", &self.inner.path)
            .field("route_values", &self.inner.route_values)
            .field("query", &self.inner.query)
            .field("headers", &self.inner.headers)
            .finish_non_exhaustive()
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`HttpRequest`].
#[derive(Default)]
pub struct HttpRequestBuilder {
    method: Option<String>,
    path: String,
    route_values: ValueMap,
    query: ValueMap,
    headers: ValueMap,
    client_certificate: Option<Arc<[u8]>>,
    body: Option<BoxedBody>,
}

impl HttpRequestBuilder {
    /// Sets the method (default `GET`).
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a route value.
    pub fn route_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_values.set(name, [value.into()]);
        self
    }

    /// Appends a query value.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(name, value);
        self
    }

    /// Appends a header value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.headers.set("content-type", [content_type.into()]);
        self
    }

    /// Attaches a client certificate.
    pub fn client_certificate(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.client_certificate = Some(Arc::from(der.into()));
        self
    }

    /// Uses `bytes` as the body and records its length.
    pub fn body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        self.headers.set("content-length", [bytes.len().to_string()]);
        self.body = Some(Box::new(io::Cursor::new(bytes)));
        self
    }

    /// Uses `reader` as a body of unknown length.
    pub fn body_reader(mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.body = Some(Box::new(reader));
        self
    }

    /// Builds the request.
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            inner: Arc::new(RequestParts {
                method: self.method.unwrap_or_else(|| "GET".to_string()),
                path: self.path,
                route_values: self.route_values,
                query: self.query,
                headers: self.headers,
                client_certificate: self.client_certificate,
                has_body: self.body.is_some(),
                body: Mutex::new(BodyState::Pending(self.body)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_map_case_insensitive() {
        let mut map = ValueMap::new();
        map.append("X-Tag", "a");
        map.append("x-tag", "b");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("X-TAG").unwrap(), ["a", "b"]);
        assert_eq!(map.joined("x-Tag").as_deref(), Some("a,b"));
        assert_eq!(map.first("x-tag"), Some("a"));
    }

    #[test]
    fn test_media_types() {
        assert!(is_json_media_type("application/json; charset=utf-8"));
        assert!(is_json_media_type("application/problem+json"));
        assert!(!is_json_media_type("text/json-ish"));
        assert!(is_form_media_type("multipart/form-data; boundary=x"));
        assert!(!is_form_media_type("application/xml"));
    }

    #[test]
    fn test_bearer_detection() {
        let request = HttpRequest::builder()
            .header("Authorization", "Bearer abc")
            .build();
        assert!(request.has_bearer_authorization());
        let basic = HttpRequest::builder()
            .header("Authorization", "Basic abc")
            .build();
        assert!(!basic.has_bearer_authorization());
    }

    #[tokio::test]
    async fn test_body_is_buffered_after_first_read() {
        let request = HttpRequest::builder().body(b"hello".to_vec()).build();
        assert!(request.can_have_body());
        assert_eq!(&*request.read_body().await.unwrap(), b"hello");
        assert_eq!(&*request.clone().read_body().await.unwrap(), b"hello");
    }

    struct Broken;

    impl AsyncRead for Broken {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            let err = io::Error::new(io::ErrorKind::ConnectionReset, "peer went away");
            std::task::Poll::Ready(Err(err))
        }
    }

    #[tokio::test]
    async fn test_failed_read_is_remembered() {
        let request = HttpRequest::builder().body_reader(Broken).build();
        let first = request.read_body().await.unwrap_err();
        assert_eq!(first.kind(), io::ErrorKind::ConnectionReset);

        let again = request.clone().read_body().await.unwrap_err();
        assert_eq!(again.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(again.to_string(), "peer went away");
    }

    #[tokio::test]
    async fn test_cancelled_read_is_remembered() {
        let (_writer, reader) = tokio::io::duplex(8);
        let request = HttpRequest::builder().body_reader(reader).build();

        let mut read = Box::pin(request.read_body());
        assert!(futures::poll!(read.as_mut()).is_pending());
        drop(read);

        let err = request.read_body().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    #[test]
    fn test_empty_body_cannot_have_body() {
        let request = HttpRequest::builder().body(Vec::new()).build();
        assert!(!request.can_have_body());
        assert!(!HttpRequest::default().can_have_body());
    }
}
