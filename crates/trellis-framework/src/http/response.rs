use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, InvalidHeaderValue, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use trellis_core::BoxError;

/// The outcome of one request: status, headers and a text body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// `200 OK` with a `text/plain` body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body).with_header(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )
    }

    /// `200 OK` with a `text/html` body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body).with_header(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )
    }

    /// `200 OK` with `value` encoded as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(value)?;
        Ok(Self::new(StatusCode::OK, body)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json")))
    }

    /// An empty response pointing the client at `location`.
    ///
    /// `status` should be a `3xx` code; anything else becomes
    /// `302 Found`.  The location is sent as given, see
    /// [`Application::redirect`](crate::Application::redirect) for paths
    /// under the base path.
    pub fn redirect(location: &str, status: StatusCode) -> Result<Self, InvalidHeaderValue> {
        let status = if status.is_redirection() {
            status
        } else {
            StatusCode::FOUND
        };
        let location = HeaderValue::from_str(location)?;
        Ok(Self::new(status, "").with_header(LOCATION, location))
    }

    /// Allows cross-origin reads from `origin`, or from any origin with `*`.
    pub fn with_cors(self, origin: &str) -> Result<Self, InvalidHeaderValue> {
        let origin = HeaderValue::from_str(origin)?;
        Ok(self.with_header(ACCESS_CONTROL_ALLOW_ORIGIN, origin))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

/// Conversion of a handler's return value into the pipeline result.
///
/// Plain values become successful responses; the `Err` side of a `Result`
/// travels up the middleware stack to the error layer.
pub trait IntoResponse {
    fn into_response(self) -> Result<Response, BoxError>;
}

impl IntoResponse for Response {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(Response::text(self))
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(Response::text(self))
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(Response::new(StatusCode::NO_CONTENT, ""))
    }
}

impl<T: IntoResponse> IntoResponse for (StatusCode, T) {
    fn into_response(self) -> Result<Response, BoxError> {
        let (status, inner) = self;
        inner.into_response().map(|r| r.with_status(status))
    }
}

impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: Into<BoxError>,
{
    fn into_response(self) -> Result<Response, BoxError> {
        self.map_err(Into::into)?.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpError;

    #[test]
    fn test_text_response() {
        let response = "hello".into_response().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "hello");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_status_tuple() {
        let response = (StatusCode::CREATED, String::from("made"))
            .into_response()
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.into_body(), "made");
    }

    #[test]
    fn test_result_error_passes_through() {
        let result: Result<&'static str, HttpError> = Err(HttpError::not_found("/x"));
        let err = result.into_response().unwrap_err();
        assert!(err.downcast_ref::<HttpError>().is_some());
    }

    #[test]
    fn test_json_response() {
        #[derive(Serialize)]
        struct Entry {
            id: u32,
            title: &'static str,
        }

        let response = Response::json(&Entry { id: 7, title: "Notes" }).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), r#"{"id":7,"title":"Notes"}"#);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");

        let list = Response::json(["a", "b"].as_slice()).unwrap();
        assert_eq!(list.body(), r#"["a","b"]"#);
    }

    #[test]
    fn test_redirect_response() {
        let response = Response::redirect("/login", StatusCode::SEE_OTHER).unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
        assert!(response.body().is_empty());

        let fallback = Response::redirect("/login", StatusCode::OK).unwrap();
        assert_eq!(fallback.status(), StatusCode::FOUND);

        assert!(Response::redirect("/bad\nline", StatusCode::FOUND).is_err());
    }

    #[test]
    fn test_cors_header() {
        let response = Response::text("open").with_cors("*").unwrap();
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");

        let response = Response::text("scoped")
            .with_cors("https://example.org")
            .unwrap();
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://example.org"
        );
        assert_eq!(response.body(), "scoped");
    }
}
