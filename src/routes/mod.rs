//! Route sets: groups of HTTP endpoints that hand their work to actions.

pub mod common;
pub mod crud;

use crate::action::ActionFactory;
use crate::error::AppError;
use axum::http::{Method, StatusCode};
use axum::Router;

pub use common::{common_endpoints, common_routes, common_routes_with_ready};
pub use crud::{CrudRouteSet, CrudRouteSetSettings};

/// One routed (method, path) pair, as registered with axum (`:param` segments).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub operation_id: String,
    pub status: StatusCode,
    pub query_params: Vec<&'static str>,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>, operation_id: impl Into<String>) -> Self {
        Endpoint {
            method,
            path: path.into(),
            operation_id: operation_id.into(),
            status: StatusCode::OK,
            query_params: Vec::new(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn query(mut self, params: &[&'static str]) -> Self {
        self.query_params.extend_from_slice(params);
        self
    }

    /// Names of the `:param` segments in the path.
    pub fn path_params(&self) -> Vec<&str> {
        self.path
            .split('/')
            .filter_map(|seg| seg.strip_prefix(':'))
            .collect()
    }

    /// The path in OpenAPI template form (`{param}`).
    pub fn template_path(&self) -> String {
        self.path
            .split('/')
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) => format!("{{{}}}", name),
                None => seg.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

pub trait RouteSet: Send + Sync {
    fn router(&self) -> Router;

    /// Every endpoint `router()` serves.
    fn endpoints(&self) -> Vec<Endpoint>;
}

/// Build the action for `args` and run it.
pub async fn do_action<A, O: Send>(factory: &ActionFactory<A, O>, args: A) -> Result<O, AppError> {
    let action = factory(args);
    action.run().await
}
