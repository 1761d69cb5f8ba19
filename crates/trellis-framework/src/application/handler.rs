//! Route handlers.
//!
//! Any `async fn(Request) -> R` where `R: IntoResponse` is a [`Handler`].
//! [`HandlerService`] adapts a handler to a tower [`Service`] so routes and
//! middleware share one calling convention.
//!
//! ```rust,ignore
//! async fn show_user(request: Request) -> Result<String, HttpError> {
//!     let id = request.param("id").unwrap_or_default();
//!     Ok(format!("user {id}"))
//! }
//!
//! app.get("/users/{id}", show_user);
//! ```

use std::future::Future;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;
use trellis_core::BoxError;

use crate::http::{IntoResponse, Request, Response};

/// An async function that answers one request.
pub trait Handler: Clone + Send + Sync + 'static {
    fn call(&self, request: Request) -> BoxFuture<'static, Result<Response, BoxError>>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, request: Request) -> BoxFuture<'static, Result<Response, BoxError>> {
        let future = self(request);
        async move { future.await.into_response() }.boxed()
    }
}

/// A tower [`Service`] that calls a single [`Handler`].
#[derive(Clone)]
pub struct HandlerService<H> {
    handler: H,
}

impl<H: Handler> HandlerService<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

impl<H: Handler> Service<Request> for HandlerService<H> {
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Response, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.handler.call(request)
    }
}
