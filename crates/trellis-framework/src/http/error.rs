use http::{Method, StatusCode};
use thiserror::Error;

/// A routing miss, raised by the router and rendered by the error layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// No route pattern matches the path.
    #[error("no route matches '{path}'")]
    NotFound { path: String },

    /// A route pattern matches but not for this method.
    #[error("method {method} is not allowed for '{path}'")]
    MethodNotAllowed {
        method: Method,
        path: String,
        /// Methods the matching routes do accept.
        allowed: Vec<Method>,
    },
}

impl HttpError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Heading shown on the rendered error page.
    pub fn title(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "404 Not Found",
            Self::MethodNotAllowed { .. } => "405 Method Not Allowed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => {
                "The requested resource could not be found. Please verify the URI and try again."
            }
            Self::MethodNotAllowed { .. } => {
                "The request method is not supported for the requested resource."
            }
        }
    }

    /// Value for the `Allow` header, if any.
    pub fn allow_header(&self) -> Option<String> {
        match self {
            Self::MethodNotAllowed { allowed, .. } => Some(
                allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Self::NotFound { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let err = HttpError::not_found("/missing");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.title(), "404 Not Found");
        assert_eq!(err.allow_header(), None);
        assert_eq!(err.to_string(), "no route matches '/missing'");
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let err = HttpError::MethodNotAllowed {
            method: Method::DELETE,
            path: "/users".into(),
            allowed: vec![Method::GET, Method::POST],
        };
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.allow_header().as_deref(), Some("GET, POST"));
    }
}
