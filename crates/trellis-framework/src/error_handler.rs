//! Rendering of request errors into responses.
//!
//! Renderers are registered per media type on the [`ErrorHandler`] service;
//! the request's `Accept` header picks one, defaulting to `text/html`.
//! [`ErrorLayer`] sits near the top of the middleware stack and converts
//! every error coming out of inner services into a rendered response.
//!
//! | error | status | title |
//! |-------|--------|-------|
//! | [`HttpError`] | 404 / 405 | its own |
//! | anything else | 500 | `Unexpected Error` |

use std::error::Error as StdError;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use parking_lot::RwLock;
use tower::{Layer, Service, ServiceExt};
use tracing::{error, warn};
use trellis_core::BoxError;

use crate::http::{HttpError, Request, Response};

pub const DEFAULT_TITLE: &str = "Unexpected Error";
pub const DEFAULT_DESCRIPTION: &str = "An unexpected error occurred, please try again.";

/// What a renderer needs to know about a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub title: String,
    pub description: String,
    /// Messages of the error and its sources; empty unless debugging.
    pub details: Vec<String>,
}

impl ErrorPage {
    /// Describes `error`, listing its source chain when `debug` is set.
    pub fn from_error(error: &(dyn StdError + 'static), debug: bool) -> Self {
        let mut page = match error.downcast_ref::<HttpError>() {
            Some(http) => Self {
                status: http.status(),
                title: http.title().to_string(),
                description: http.description().to_string(),
                details: Vec::new(),
            },
            None => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                title: DEFAULT_TITLE.to_string(),
                description: DEFAULT_DESCRIPTION.to_string(),
                details: Vec::new(),
            },
        };
        if debug {
            let mut current = Some(error);
            while let Some(err) = current {
                page.details.push(err.to_string());
                current = err.source();
            }
        }
        page
    }
}

/// Turns an [`ErrorPage`] into a response body.
pub trait ErrorRenderer: Send + Sync {
    fn render(&self, page: &ErrorPage) -> String;
}

/// Minimal HTML page with title and description.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlErrorRenderer;

impl ErrorRenderer for HtmlErrorRenderer {
    fn render(&self, page: &ErrorPage) -> String {
        let title = escape_html(&page.title);
        let mut body = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<p>{}</p>\n",
            escape_html(&page.description)
        );
        if !page.details.is_empty() {
            body.push_str("<pre>");
            for (depth, detail) in page.details.iter().enumerate() {
                if depth > 0 {
                    body.push_str("\ncaused by: ");
                }
                body.push_str(&escape_html(detail));
            }
            body.push_str("</pre>\n");
        }
        body.push_str("</body>\n</html>\n");
        body
    }
}

/// The title line only; what command-line users see.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextErrorRenderer;

impl ErrorRenderer for PlainTextErrorRenderer {
    fn render(&self, page: &ErrorPage) -> String {
        let mut body = format!("{}\n", page.title);
        for detail in &page.details {
            body.push_str(detail);
            body.push('\n');
        }
        body
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Renderers keyed by media type, chosen by content negotiation.
pub struct ErrorHandler {
    renderers: RwLock<Vec<(String, Arc<dyn ErrorRenderer>)>>,
    default_type: String,
}

impl ErrorHandler {
    /// An empty handler that falls back to `default_type`.
    pub fn new(default_type: impl Into<String>) -> Self {
        Self {
            renderers: RwLock::new(Vec::new()),
            default_type: default_type.into(),
        }
    }

    /// Registers `renderer` for `media_type`, replacing an earlier one.
    pub fn register(
        &self,
        media_type: impl Into<String>,
        renderer: impl ErrorRenderer + 'static,
    ) {
        let media_type = media_type.into().to_ascii_lowercase();
        let renderer: Arc<dyn ErrorRenderer> = Arc::new(renderer);
        let mut renderers = self.renderers.write();
        match renderers.iter_mut().find(|(ty, _)| *ty == media_type) {
            Some(slot) => slot.1 = renderer,
            None => renderers.push((media_type, renderer)),
        }
    }

    pub fn media_types(&self) -> Vec<String> {
        self.renderers.read().iter().map(|(ty, _)| ty.clone()).collect()
    }

    /// Picks the media type to render for an `Accept` header.
    ///
    /// Ranges are tried by descending quality; `*/*` and unmatched headers
    /// select the default type.
    pub fn negotiate(&self, accept: Option<&str>) -> String {
        let renderers = self.renderers.read();
        let registered = |ty: &str| renderers.iter().any(|(t, _)| t == ty);

        let mut ranges: Vec<(String, f32)> = accept
            .unwrap_or_default()
            .split(',')
            .filter_map(|range| {
                let mut parts = range.split(';');
                let media = parts.next()?.trim().to_ascii_lowercase();
                if media.is_empty() {
                    return None;
                }
                let quality = parts
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((media, quality))
            })
            .filter(|(_, quality)| *quality > 0.0)
            .collect();
        ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (media, _) in ranges {
            if media == "*/*" {
                break;
            }
            if registered(&media) {
                return media;
            }
            if let Some(prefix) = media.strip_suffix("/*")
                && let Some((ty, _)) = renderers
                    .iter()
                    .find(|(t, _)| t.split('/').next() == Some(prefix))
            {
                return ty.clone();
            }
        }
        self.default_type.clone()
    }

    /// Renders `error` for a client that sent `accept`.
    pub fn render(
        &self,
        error: &(dyn StdError + 'static),
        accept: Option<&str>,
        debug: bool,
    ) -> Response {
        let page = ErrorPage::from_error(error, debug);
        let media_type = self.negotiate(accept);

        let renderer = self
            .renderers
            .read()
            .iter()
            .find(|(ty, _)| *ty == media_type)
            .map(|(_, renderer)| Arc::clone(renderer));
        let (media_type, body) = match renderer {
            Some(renderer) => (media_type, renderer.render(&page)),
            None => (
                "text/plain".to_string(),
                PlainTextErrorRenderer.render(&page),
            ),
        };

        let mut response = Response::new(page.status, body);
        if let Ok(value) = HeaderValue::from_str(&format!("{media_type}; charset=utf-8")) {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        if let Some(http) = error.downcast_ref::<HttpError>()
            && let Some(allow) = http.allow_header()
            && let Ok(value) = HeaderValue::from_str(&allow)
        {
            response.headers_mut().insert(ALLOW, value);
        }
        response
    }
}

impl Default for ErrorHandler {
    /// HTML and plain-text renderers, defaulting to HTML.
    fn default() -> Self {
        let handler = Self::new("text/html");
        handler.register("text/html", HtmlErrorRenderer);
        handler.register("text/plain", PlainTextErrorRenderer);
        handler
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("media_types", &self.media_types())
            .field("default_type", &self.default_type)
            .finish()
    }
}

// ─── Layer ──────────────────────────────────────────────────────────────

/// A tower [`Layer`] rendering inner errors through an [`ErrorHandler`].
#[derive(Clone)]
pub struct ErrorLayer {
    handler: Arc<ErrorHandler>,
    debug: bool,
}

impl ErrorLayer {
    pub fn new(handler: Arc<ErrorHandler>) -> Self {
        Self {
            handler,
            debug: false,
        }
    }

    /// Include the error chain in rendered pages.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

impl<S> Layer<S> for ErrorLayer {
    type Service = ErrorService<S>;

    fn layer(&self, inner: S) -> ErrorService<S> {
        ErrorService {
            handler: Arc::clone(&self.handler),
            debug: self.debug,
            inner,
        }
    }
}

/// The [`Service`] produced by [`ErrorLayer`].
#[derive(Clone)]
pub struct ErrorService<S> {
    handler: Arc<ErrorHandler>,
    debug: bool,
    inner: S,
}

impl<S> Service<Request> for ErrorService<S>
where
    S: Service<Request, Response = Response, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Response, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let debug = self.debug;
        let accept = request.accept().map(str::to_string);
        let inner = self.inner.clone();

        async move {
            match inner.oneshot(request).await {
                Ok(response) => Ok(response),
                Err(err) => {
                    if err.downcast_ref::<HttpError>().is_some() {
                        warn!(error = %err, "Request not routed");
                    } else {
                        error!(error = %err, "Request failed");
                    }
                    Ok(handler.render(&*err, accept.as_deref(), debug))
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use thiserror::Error;

    use super::*;
    use crate::application::HandlerService;

    #[derive(Debug, Error)]
    #[error("template failed")]
    struct TemplateError(#[source] std::io::Error);

    #[test]
    fn test_negotiation() {
        let handler = ErrorHandler::default();
        assert_eq!(handler.negotiate(None), "text/html");
        assert_eq!(handler.negotiate(Some("text/plain")), "text/plain");
        assert_eq!(handler.negotiate(Some("application/json")), "text/html");
        assert_eq!(
            handler.negotiate(Some("text/html;q=0.5, text/plain;q=0.9")),
            "text/plain"
        );
        assert_eq!(handler.negotiate(Some("*/*")), "text/html");
        assert_eq!(handler.negotiate(Some("text/*")), "text/html");
    }

    #[test]
    fn test_plain_text_is_title_line() {
        let handler = ErrorHandler::default();
        let err = TemplateError(std::io::Error::other("disk"));
        let response = handler.render(&err, Some("text/plain"), false);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), "Unexpected Error\n");
    }

    #[test]
    fn test_html_page_for_routing_error() {
        let handler = ErrorHandler::default();
        let err = HttpError::MethodNotAllowed {
            method: Method::PUT,
            path: "/x".into(),
            allowed: vec![Method::GET],
        };
        let response = handler.render(&err, None, false);

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.body().contains("<title>405 Method Not Allowed</title>"));
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_debug_lists_error_chain() {
        let err = TemplateError(std::io::Error::other("disk <full>"));
        let page = ErrorPage::from_error(&err, true);
        assert_eq!(page.details, vec!["template failed", "disk <full>"]);

        let html = HtmlErrorRenderer.render(&page);
        assert!(html.contains("caused by: disk &lt;full&gt;"));
    }

    #[tokio::test]
    async fn test_layer_renders_inner_errors() {
        async fn failing(_request: Request) -> Result<String, TemplateError> {
            Err(TemplateError(std::io::Error::other("boom")))
        }

        let service = ErrorLayer::new(Arc::new(ErrorHandler::default()))
            .layer(HandlerService::new(failing));
        let mut request = Request::new(Method::GET, "/");
        request
            .headers_mut()
            .insert(http::header::ACCEPT, HeaderValue::from_static("text/plain"));

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), "Unexpected Error\n");
    }
}
