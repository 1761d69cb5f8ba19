use std::marker::PhantomData;
use std::ops::Deref;
use std::task::{Context, Poll};

use clap::Parser;
use clap::error::ErrorKind;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{Layer, Service, ServiceExt};
use tracing::warn;
use trellis_core::{BoxError, CommandParseError, RunMode};

use super::CommandError;
use crate::application::{Handler, HandlerService};
use crate::http::{Request, Response};

/// Parsed command arguments, stored in the request extensions by
/// [`CommandLayer`].
#[derive(Debug, Clone)]
pub struct CommandArgs<T>(pub T);

impl<T: Clone + Send + Sync + 'static> CommandArgs<T> {
    /// The arguments attached to `request`, if a [`CommandLayer<T>`] ran.
    pub fn from_request(request: &Request) -> Option<&T> {
        request
            .extensions()
            .get::<CommandArgs<T>>()
            .map(|args| &args.0)
    }
}

impl<T> Deref for CommandArgs<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// A tower [`Layer`] that parses `argv` as the clap command `T` before
/// calling the inner service.
///
/// A parse failure is answered with the error message and the command's
/// help text instead of reaching the handler.
pub struct CommandLayer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CommandLayer<T>
where
    T: Parser + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Wraps a handler with this layer.
    pub fn handler<H: Handler>(self, handler: H) -> CommandService<T, HandlerService<H>> {
        self.layer(HandlerService::new(handler))
    }
}

impl<T> Default for CommandLayer<T>
where
    T: Parser + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CommandLayer<T> {
    fn clone(&self) -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, S> Layer<S> for CommandLayer<T> {
    type Service = CommandService<T, S>;

    fn layer(&self, inner: S) -> CommandService<T, S> {
        CommandService {
            inner,
            _marker: PhantomData,
        }
    }
}

/// The [`Service`] produced by [`CommandLayer`].
pub struct CommandService<T, S> {
    inner: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: Clone> Clone for CommandService<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, S> Service<Request> for CommandService<T, S>
where
    T: Parser + Clone + Send + Sync + 'static,
    S: Service<Request, Response = Response, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Response, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let inner = self.inner.clone();

        async move {
            if request.extensions().get::<RunMode>() != Some(&RunMode::Cli) {
                return Err(Box::new(CommandError::NotCli) as BoxError);
            }

            match T::try_parse_from(request.argv()) {
                Ok(args) => {
                    request.extensions_mut().insert(CommandArgs(args));
                    inner.oneshot(request).await
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
                    ) =>
                {
                    Ok(Response::text(err.render().to_string()))
                }
                Err(err) => {
                    let failure = CommandParseError::new(
                        err.render().to_string(),
                        T::command().render_help().to_string(),
                    );
                    warn!(error = %failure, "Command arguments rejected");
                    Ok(Response::text(failure.render()))
                }
            }
        }
        .boxed()
    }
}
