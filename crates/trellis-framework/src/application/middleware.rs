//! Function middleware.
//!
//! [`from_fn`] turns an `async fn(Request, Next)` into a tower [`Layer`].
//! The function decides whether and how to call the rest of the stack
//! through [`Next::run`].
//!
//! ```rust,ignore
//! app.add_middleware(|mut request: Request, next: Next| async move {
//!     request.set_attribute("started", "yes");
//!     next.run(request).await
//! });
//! ```

use std::future::Future;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{Layer, Service, ServiceExt};
use trellis_core::BoxError;

use super::RequestService;
use crate::http::{Request, Response};

/// The remainder of the middleware stack, ending at the router.
pub struct Next {
    inner: RequestService,
}

impl Next {
    /// Passes `request` to the next layer.
    pub async fn run(self, request: Request) -> Result<Response, BoxError> {
        self.inner.oneshot(request).await
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Creates a [`MiddlewareLayer`] from an async function.
pub fn from_fn<F, Fut>(f: F) -> MiddlewareLayer<F>
where
    F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    MiddlewareLayer { f }
}

/// A tower [`Layer`] wrapping services with a middleware function.
#[derive(Clone)]
pub struct MiddlewareLayer<F> {
    f: F,
}

impl<F: Clone> Layer<RequestService> for MiddlewareLayer<F> {
    type Service = MiddlewareService<F>;

    fn layer(&self, inner: RequestService) -> Self::Service {
        MiddlewareService {
            f: self.f.clone(),
            inner,
        }
    }
}

/// The [`Service`] produced by [`MiddlewareLayer`].
#[derive(Clone)]
pub struct MiddlewareService<F> {
    f: F,
    inner: RequestService,
}

impl<F, Fut> Service<Request> for MiddlewareService<F>
where
    F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Response, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let next = Next {
            inner: self.inner.clone(),
        };
        (self.f)(request, next).boxed()
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use tower::util::BoxCloneSyncService;

    use super::*;
    use crate::application::HandlerService;

    async fn echo_attribute(request: Request) -> String {
        request.attribute("seen").unwrap_or("none").to_string()
    }

    #[tokio::test]
    async fn test_middleware_modifies_request() {
        let inner: RequestService = BoxCloneSyncService::new(HandlerService::new(echo_attribute));
        let layer = from_fn(|mut request: Request, next: Next| async move {
            request.set_attribute("seen", "yes");
            next.run(request).await
        });

        let response = layer
            .layer(inner)
            .oneshot(Request::new(Method::GET, "/"))
            .await
            .unwrap();
        assert_eq!(response.body(), "yes");
    }

    #[tokio::test]
    async fn test_middleware_short_circuits() {
        let inner: RequestService = BoxCloneSyncService::new(HandlerService::new(echo_attribute));
        let layer = from_fn(|_request: Request, _next: Next| async move {
            Ok::<_, BoxError>(Response::text("blocked"))
        });

        let response = layer
            .layer(inner)
            .oneshot(Request::new(Method::GET, "/"))
            .await
            .unwrap();
        assert_eq!(response.body(), "blocked");
    }
}
