//! The outbound response written by a compiled pipeline.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::request::ValueMap;

struct ResponseState {
    status: u16,
    content_type: Option<String>,
    headers: ValueMap,
    body: Vec<u8>,
    started: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: None,
            headers: ValueMap::new(),
            body: Vec::new(),
            started: false,
        }
    }
}

/// The response under construction. Cloning is cheap and shares state.
#[derive(Clone, Default)]
pub struct HttpResponse {
    inner: Arc<Mutex<ResponseState>>,
}

impl HttpResponse {
    /// Creates a 200 response with no body.
    pub fn new() -> Self {
        Self::default()
    }

    /// The status code.
    pub fn status(&self) -> u16 {
        self.inner.lock().status
    }

    /// Sets the status code.
    pub fn set_status(&self, status: u16) {
        self.inner.lock().status = status;
    }

    /// The content type, if set.
    pub fn content_type(&self) -> Option<String> {
        self.inner.lock().content_type.clone()
    }

    /// Sets the content type.
    pub fn set_content_type(&self, content_type: impl Into<String>) {
        self.inner.lock().content_type = Some(content_type.into());
    }

    /// Sets the content type unless one is already set.
    pub fn set_default_content_type(&self, content_type: &str) {
        let mut state = self.inner.lock();
        if state.content_type.is_none() {
            state.content_type = Some(content_type.to_string());
        }
    }

    /// Appends a header value.
    pub fn append_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.lock().headers.append(name, value);
    }

    /// The first value of a header.
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.lock().headers.first(name).map(str::to_string)
    }

    /// Returns `true` once body bytes have been written.
    pub fn has_started(&self) -> bool {
        self.inner.lock().started
    }

    /// Appends bytes to the body and marks the response as started.
    pub fn write(&self, bytes: &[u8]) {
        let mut state = self.inner.lock();
        state.started = true;
        state.body.extend_from_slice(bytes);
    }

    /// A copy of the body written so far.
    pub fn body(&self) -> Vec<u8> {
        self.inner.lock().body.clone()
    }

    /// The body decoded as UTF-8, lossily.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().body).into_owned()
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("HttpResponse")
            .field("status", &state.status)
            .field("content_type", &state.content_type)
            .field("body_len", &state.body.len())
            .field("started", &state.started)
            .finish()
    }
}
