//! The application handle: a route table behind a stack of tower layers.
//!
//! Packages populate it during composition through a shared reference, so
//! the tables use interior mutability.  They are frozen by convention once
//! the framework runs.
//!
//! ```text
//!   request ──► layer N ──► … ──► layer 1 ──► Router ──► handler
//!              (last added)      (first added)
//! ```
//!
//! ```rust,ignore
//! app.add_middleware(|request, next: Next| async move { next.run(request).await });
//! app.get("/users/{id}", show_user).name("user");
//!
//! assert_eq!(app.url_for("user", &[("id", "7")]), Some("/base/users/7".into()));
//! ```

mod handler;
mod middleware;
mod router;

pub use handler::{Handler, HandlerService};
pub use middleware::{MiddlewareLayer, MiddlewareService, Next, from_fn};
pub use router::Pattern;

use std::future::Future;
use std::sync::Arc;

use http::header::InvalidHeaderValue;
use http::{Method, StatusCode};
use parking_lot::RwLock;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};
use tracing::{debug, trace};
use trellis_core::BoxError;

use crate::http::{Request, Response};
use router::{Route, Router};

/// The type-erased service every layer wraps and produces.
pub type RequestService = BoxCloneSyncService<Request, Response, BoxError>;

type LayerFn = Arc<dyn Fn(RequestService) -> RequestService + Send + Sync>;

/// Routes, middleware and base path of one application.
#[derive(Default)]
pub struct Application {
    base_path: RwLock<Option<String>>,
    layers: RwLock<Vec<LayerFn>>,
    routes: RwLock<Vec<Route>>,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Base path ──────────────────────────────────────────────────────

    /// Mounts the application under `path`.
    ///
    /// The prefix is stripped before matching and prepended by
    /// [`url_for`](Self::url_for).  An empty path or `/` clears it.
    pub fn set_base_path(&self, path: impl Into<String>) {
        let path = path.into();
        let trimmed = path.trim_end_matches('/');
        let base = if trimmed.is_empty() {
            None
        } else if trimmed.starts_with('/') {
            Some(trimmed.to_string())
        } else {
            Some(format!("/{trimmed}"))
        };
        debug!(base_path = ?base, "Base path set");
        *self.base_path.write() = base;
    }

    pub fn base_path(&self) -> Option<String> {
        self.base_path.read().clone()
    }

    // ─── Middleware ─────────────────────────────────────────────────────

    /// Adds a tower layer around everything registered so far.
    pub fn add<L>(&self, layer: L) -> &Self
    where
        L: Layer<RequestService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        let wrap: LayerFn =
            Arc::new(move |inner: RequestService| BoxCloneSyncService::new(layer.layer(inner)));
        let mut layers = self.layers.write();
        layers.push(wrap);
        trace!(layers = layers.len(), "Middleware added");
        self
    }

    /// Adds an async middleware function; see [`from_fn`].
    pub fn add_middleware<F, Fut>(&self, f: F) -> &Self
    where
        F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        self.add(from_fn(f))
    }

    pub fn middleware_count(&self) -> usize {
        self.layers.read().len()
    }

    // ─── Routes ─────────────────────────────────────────────────────────

    /// Registers `handler` for `method` requests matching `pattern`.
    pub fn route<H: Handler>(&self, method: Method, pattern: &str, handler: H) -> RouteRef<'_> {
        self.route_service(method, pattern, HandlerService::new(handler))
    }

    /// Registers any tower service as a route endpoint.
    pub fn route_service<S>(&self, method: Method, pattern: &str, service: S) -> RouteRef<'_>
    where
        S: Service<Request, Response = Response, Error = BoxError> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        let mut routes = self.routes.write();
        routes.push(Route {
            method: method.clone(),
            pattern: Pattern::parse(pattern),
            name: None,
            service: BoxCloneSyncService::new(service),
        });
        debug!(%method, pattern, "Route registered");
        RouteRef {
            app: self,
            index: routes.len() - 1,
        }
    }

    pub fn get<H: Handler>(&self, pattern: &str, handler: H) -> RouteRef<'_> {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<H: Handler>(&self, pattern: &str, handler: H) -> RouteRef<'_> {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<H: Handler>(&self, pattern: &str, handler: H) -> RouteRef<'_> {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn delete<H: Handler>(&self, pattern: &str, handler: H) -> RouteRef<'_> {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    /// Builds the path of the route called `name`, base path included.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        let routes = self.routes.read();
        let route = routes.iter().find(|r| r.name.as_deref() == Some(name))?;
        let path = route.pattern.expand(params)?;
        Some(match self.base_path() {
            Some(base) if path == "/" => base,
            Some(base) => format!("{base}{path}"),
            None => path,
        })
    }

    /// Redirects to `path` under the base path.
    ///
    /// Paths not starting with `/` (absolute URLs included) are sent as given.
    pub fn redirect(
        &self,
        path: &str,
        status: StatusCode,
    ) -> Result<Response, InvalidHeaderValue> {
        let location = match self.base_path() {
            Some(base) if path == "/" => base,
            Some(base) if path.starts_with('/') => format!("{base}{path}"),
            _ => path.to_string(),
        };
        Response::redirect(&location, status)
    }

    /// Redirects to the named route, see [`url_for`](Self::url_for).
    pub fn redirect_to(
        &self,
        name: &str,
        params: &[(&str, &str)],
        status: StatusCode,
    ) -> Result<Response, BoxError> {
        let location = self
            .url_for(name, params)
            .ok_or_else(|| format!("no route named `{name}` accepts the given parameters"))?;
        Ok(Response::redirect(&location, status)?)
    }

    // ─── Dispatch ───────────────────────────────────────────────────────

    /// Assembles the layered service from the current tables.
    pub fn service(&self) -> RequestService {
        let router = Router::new(self.routes.read().clone(), self.base_path());
        self.layers
            .read()
            .iter()
            .fold(BoxCloneSyncService::new(router), |inner, wrap| wrap(inner))
    }

    /// Dispatches one request through middleware and router.
    pub async fn handle(&self, request: Request) -> Result<Response, BoxError> {
        self.service().oneshot(request).await
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("base_path", &*self.base_path.read())
            .field("layers", &self.layers.read().len())
            .field("routes", &self.routes.read().len())
            .finish()
    }
}

/// A just-registered route, used to name it.
pub struct RouteRef<'a> {
    app: &'a Application,
    index: usize,
}

impl RouteRef<'_> {
    /// Names the route for [`Application::url_for`].
    pub fn name(self, name: impl Into<String>) -> Self {
        if let Some(route) = self.app.routes.write().get_mut(self.index) {
            route.name = Some(name.into());
        }
        self
    }
}
