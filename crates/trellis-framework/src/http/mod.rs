//! Request and response types shared by the pipeline, handlers and error
//! renderers.
//!
//! Method, status and header types come from the [`http`] crate so tower
//! middleware written against it reads naturally.

mod error;
mod request;
mod response;

pub use error::HttpError;
pub use request::{Request, RouteParams};
pub use response::{IntoResponse, Response};

pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
