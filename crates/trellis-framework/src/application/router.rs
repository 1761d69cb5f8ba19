//! Route table and path matching.
//!
//! Patterns are `/`-separated segments; a segment written `{name}` captures
//! whatever single segment appears in its place.  Trailing slashes are not
//! significant.  Routes are tried in registration order.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use http::Method;
use tower::{Service, ServiceExt};
use tracing::debug;
use trellis_core::BoxError;

use super::RequestService;
use crate::http::{HttpError, Request, Response, RouteParams};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                    _ => Segment::Literal(segment.to_string()),
                }
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches `path`, returning the captured placeholders.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let mut params = RouteParams::default();
        let mut parts = split_path(path);
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.push(name.clone(), part),
            }
        }
        parts.next().is_none().then_some(params)
    }

    /// Fills the placeholders from `params`; `None` if one is missing.
    pub fn expand(&self, params: &[(&str, &str)]) -> Option<String> {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param(name) => {
                    let (_, value) = params.iter().find(|(key, _)| key == name)?;
                    path.push_str(value);
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Some(path)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// One registered route.
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) pattern: Pattern,
    pub(crate) name: Option<String>,
    pub(crate) service: RequestService,
}

/// Strips `base_path` from `path`; `None` if the path lies outside it.
pub(crate) fn strip_base<'a>(path: &'a str, base_path: Option<&str>) -> Option<&'a str> {
    let Some(base) = base_path else {
        return Some(path);
    };
    match path.strip_prefix(base) {
        Some("") => Some("/"),
        Some(rest) if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// The innermost service of the pipeline: dispatches to the matching route.
#[derive(Clone)]
pub(crate) struct Router {
    routes: Arc<Vec<Route>>,
    base_path: Option<String>,
}

impl Router {
    pub(crate) fn new(routes: Vec<Route>, base_path: Option<String>) -> Self {
        Self {
            routes: Arc::new(routes),
            base_path,
        }
    }

    fn find(&self, request: &Request) -> Result<(RequestService, RouteParams), HttpError> {
        let not_found = || HttpError::not_found(request.path());
        let path = strip_base(request.path(), self.base_path.as_deref()).ok_or_else(not_found)?;

        let mut allowed = Vec::new();
        for route in self.routes.iter() {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.method == *request.method()
                || (request.method() == Method::HEAD && route.method == Method::GET)
            {
                debug!(pattern = route.pattern.as_str(), "Route matched");
                return Ok((route.service.clone(), params));
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            Err(not_found())
        } else {
            Err(HttpError::MethodNotAllowed {
                method: request.method().clone(),
                path: request.path().to_string(),
                allowed,
            })
        }
    }
}

impl Service<Request> for Router {
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Response, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        match self.find(&request) {
            Ok((service, params)) => {
                request.extensions_mut().insert(params);
                service.oneshot(request).boxed()
            }
            Err(err) => futures::future::ready(Err::<Response, BoxError>(err.into())).boxed(),
        }
    }
}
