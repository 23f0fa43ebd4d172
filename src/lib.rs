//! Lilly: layered CRUD web-service scaffold. Actions hold business logic,
//! repositories hold data access over a data source, and route sets expose
//! actions over HTTP, including a generated CRUD route set.

pub mod action;
pub mod app;
pub mod config;
pub mod datasource;
pub mod error;
pub mod logging;
pub mod migration;
pub mod repository;
pub mod response;
pub mod routes;
pub mod sql;
pub mod validation;

pub use action::{Action, ActionFactory, BoxAction, ReadManyArgs, UpdateManyArgs, UpdateOneArgs};
pub use app::Lilly;
pub use config::{AppSettings, ColumnSpec, ColumnType, DataSourceConfig, ModelSpec, ValidationRule};
pub use datasource::{DataSource, SqlConnection, SqlDataSource};
pub use error::{AppError, ConfigError};
pub use logging::init_tracing;
pub use repository::{Fields, Filters, Options, Repository, Selection, SqlRepository};
pub use routes::{do_action, CrudRouteSet, CrudRouteSetSettings, Endpoint, RouteSet};
pub use sql::{col, Criterion};
