use std::collections::HashMap;

use http::header::ACCEPT;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method};
use tracing::trace;
use trellis_core::{BoxError, Environment};

/// Values captured by `{name}` placeholders of the matched route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(Vec<(String, String)>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }
}

/// One inbound request, in either run mode.
///
/// In server mode the fields come straight from the web server; in CLI mode
/// they were synthesized from `argv` during composition.  Handlers cannot
/// tell the difference, which is the point.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    scheme: String,
    port: u16,
    headers: HeaderMap,
    remote_addr: Option<String>,
    attributes: HashMap<String, String>,
    extensions: Extensions,
    body: String,
    argv: Vec<String>,
}

impl Request {
    /// Creates a bare request for `method` and `uri` (path plus optional query).
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = split_uri(uri);
        Self {
            method,
            path,
            query,
            scheme: "http".to_string(),
            port: 80,
            headers: HeaderMap::new(),
            remote_addr: None,
            attributes: HashMap::new(),
            extensions: Extensions::new(),
            body: String::new(),
            argv: Vec::new(),
        }
    }

    /// Builds the request described by `environment`.
    ///
    /// An explicit query string takes precedence over a `?query` part of the
    /// request URI.  Missing fields default to `GET /` over plain HTTP.
    pub fn from_environment(environment: &Environment) -> Result<Self, BoxError> {
        let method = match environment.method.as_deref() {
            Some(method) => Method::from_bytes(method.trim().as_bytes())?,
            None => Method::GET,
        };
        let mut request = Self::new(method, environment.request_uri.as_deref().unwrap_or("/"));

        if let Some(query) = &environment.query_string {
            request.query = Some(query.clone()).filter(|q| !q.is_empty());
        }
        if let Some(scheme) = &environment.scheme {
            request.scheme = scheme.to_ascii_lowercase();
        }
        request.port = environment
            .port
            .unwrap_or(if request.scheme == "https" { 443 } else { 80 });
        request.remote_addr = environment.remote_addr.clone();
        request.body = environment.body.clone();
        request.argv = environment.argv.clone();

        for (name, value) in &environment.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers.append(name, value);
                }
                _ => trace!(header = %name, "Skipping malformed header"),
            }
        }
        if let Some(accept) = &environment.accept {
            request.headers.insert(ACCEPT, HeaderValue::from_str(accept)?);
        }

        Ok(request)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decodes the query string into `(key, value)` pairs.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, serde_urlencoded::de::Error> {
        match &self.query {
            Some(query) => serde_urlencoded::from_str(query),
            None => Ok(Vec::new()),
        }
    }

    /// First value of the query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .ok()?
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Accept` header.
    pub fn accept(&self) -> Option<&str> {
        self.header(ACCEPT)
    }

    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Named string attribute set by middleware.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Builder-style [`set_attribute`](Self::set_attribute).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Typed values attached by middleware, such as parsed command arguments.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Placeholders captured by the matched route.
    pub fn params(&self) -> Option<&RouteParams> {
        self.extensions.get::<RouteParams>()
    }

    /// Value of the route placeholder `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params().and_then(|params| params.get(name))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// The process argument vector; empty unless invoked from a command line.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn with_argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }
}

fn split_uri(uri: &str) -> (String, Option<String>) {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    };
    let path = if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    (path, query.filter(|q| !q.is_empty()).map(str::to_string))
}
