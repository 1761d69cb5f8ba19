//! Lifecycle events emitted by the [`Framework`](crate::Framework).

use http::{Method, StatusCode};
use trellis_core::{Event, RunMode};

/// Composition finished; the framework is ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Booted {
    pub mode: RunMode,
}

impl Event for Booted {}

/// A request went through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandled {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
}

impl Event for RequestHandled {}
