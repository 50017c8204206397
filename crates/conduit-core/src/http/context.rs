//! Per-request context handed to pipelines and binding capabilities.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use super::request::HttpRequest;
use super::response::HttpResponse;
use super::services::ServiceProvider;

/// The authenticated principal of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    name: Option<String>,
    claims: Vec<(String, String)>,
}

impl User {
    /// An anonymous principal.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated principal.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            claims: Vec::new(),
        }
    }

    /// Adds a claim.
    pub fn with_claim(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push((kind.into(), value.into()));
        self
    }

    /// The principal's name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The first claim of `kind`.
    pub fn claim(&self, kind: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` for a named principal.
    pub fn is_authenticated(&self) -> bool {
        self.name.is_some()
    }
}

/// Identifier correlating log lines of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceIdentifier(String);

impl TraceIdentifier {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a process-unique identifier.
    pub fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(format!("req-{:016x}", NEXT.fetch_add(1, Ordering::Relaxed)))
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The raw request body, bound as-is for handlers that stream it themselves.
#[derive(Debug, Clone)]
pub struct RequestBody {
    request: HttpRequest,
}

impl RequestBody {
    /// Wraps the body of `request`.
    pub fn new(request: HttpRequest) -> Self {
        Self { request }
    }

    /// Reads the body to the end.
    pub async fn bytes(&self) -> io::Result<Arc<[u8]>> {
        self.request.read_body().await
    }
}

/// Everything a pipeline knows about the request in flight.
///
/// Cloning is cheap; clones share the request, response and abort signal.
#[derive(Clone)]
pub struct HttpContext {
    request: HttpRequest,
    response: HttpResponse,
    services: Option<Arc<dyn ServiceProvider>>,
    user: User,
    trace_identifier: TraceIdentifier,
    aborted: CancellationToken,
}

impl HttpContext {
    /// Creates a context for `request` with a fresh response.
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            response: HttpResponse::new(),
            services: None,
            user: User::anonymous(),
            trace_identifier: TraceIdentifier::generate(),
            aborted: CancellationToken::new(),
        }
    }

    /// Attaches request services.
    pub fn with_services(mut self, services: Arc<dyn ServiceProvider>) -> Self {
        self.services = Some(services);
        self
    }

    /// Sets the principal.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// Sets the trace identifier.
    pub fn with_trace_identifier(mut self, id: TraceIdentifier) -> Self {
        self.trace_identifier = id;
        self
    }

    /// Uses `token` as the abort signal.
    pub fn with_abort_signal(mut self, token: CancellationToken) -> Self {
        self.aborted = token;
        self
    }

    /// The request.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// The response.
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    /// The request services.
    pub fn services(&self) -> Option<&Arc<dyn ServiceProvider>> {
        self.services.as_ref()
    }

    /// The principal.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The trace identifier.
    pub fn trace_identifier(&self) -> &TraceIdentifier {
        &self.trace_identifier
    }

    /// Fires when the client aborts the request.
    pub fn request_aborted(&self) -> &CancellationToken {
        &self.aborted
    }

    /// Aborts the request.
    pub fn abort(&self) {
        self.aborted.cancel();
    }
}

impl fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContext")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("user", &self.user)
            .field("trace_identifier", &self.trace_identifier)
            .field("aborted", &self.aborted.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_identifiers_are_unique() {
        assert_ne!(TraceIdentifier::generate(), TraceIdentifier::generate());
    }

    #[test]
    fn test_abort_is_shared_between_clones() {
        let ctx = HttpContext::new(HttpRequest::default());
        let clone = ctx.clone();
        ctx.abort();
        assert!(clone.request_aborted().is_cancelled());
    }

    #[test]
    fn test_user_claims() {
        let user = User::named("ada").with_claim("role", "admin");
        assert!(user.is_authenticated());
        assert_eq!(user.claim("role"), Some("admin"));
        assert!(!User::anonymous().is_authenticated());
    }
}
