//! Application shell: settings, a data source and route sets composed into one axum app.

use crate::config::AppSettings;
use crate::datasource::SqlDataSource;
use crate::error::{AppError, ConfigError};
use crate::routes::{common_endpoints, common_routes, common_routes_with_ready, Endpoint, RouteSet};
use axum::{http::Method, routing::get, Json, Router};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::openapi::path::{HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn, PathItem, PathsBuilder};
use utoipa::openapi::{InfoBuilder, OpenApi, OpenApiBuilder, Required, ResponseBuilder};

const OPENAPI_PATH: &str = "/openapi.json";

pub struct Lilly {
    settings: AppSettings,
    route_sets: Vec<Box<dyn RouteSet>>,
    datasource: Option<Arc<SqlDataSource>>,
}

impl Lilly {
    pub fn new(settings: AppSettings) -> Self {
        Lilly {
            settings,
            route_sets: Vec::new(),
            datasource: None,
        }
    }

    pub fn route_set(mut self, route_set: impl RouteSet + 'static) -> Self {
        self.route_sets.push(Box::new(route_set));
        self
    }

    /// The data source checked by `GET /ready`.
    pub fn datasource(mut self, datasource: Arc<SqlDataSource>) -> Self {
        self.datasource = Some(datasource);
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Every served endpoint: common routes, then each route set in registration order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut out = common_endpoints(self.datasource.is_some());
        out.push(Endpoint::new(Method::GET, OPENAPI_PATH, "openapi"));
        for rs in &self.route_sets {
            out.extend(rs.endpoints());
        }
        out
    }

    /// OpenAPI description of the registered endpoints.
    pub fn openapi(&self) -> OpenApi {
        let mut paths = PathsBuilder::new();
        for e in self.endpoints() {
            let Some(method) = http_method(&e.method) else {
                tracing::warn!(method = %e.method, path = %e.path, "method not describable in openapi");
                continue;
            };
            let mut op = OperationBuilder::new().operation_id(Some(e.operation_id.clone())).response(
                e.status.as_u16().to_string(),
                ResponseBuilder::new()
                    .description(e.status.canonical_reason().unwrap_or_default())
                    .build(),
            );
            for name in e.path_params() {
                op = op.parameter(
                    ParameterBuilder::new()
                        .name(name)
                        .parameter_in(ParameterIn::Path)
                        .required(Required::True)
                        .build(),
                );
            }
            for name in &e.query_params {
                op = op.parameter(
                    ParameterBuilder::new()
                        .name(*name)
                        .parameter_in(ParameterIn::Query)
                        .required(Required::False)
                        .build(),
                );
            }
            paths = paths.path(e.template_path(), PathItem::new(method, op.build()));
        }
        OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title(self.settings.app_name.clone())
                    .version(env!("CARGO_PKG_VERSION"))
                    .build(),
            )
            .paths(paths.build())
            .build()
    }

    /// A path may be served by one source only (common routes or a single route set).
    fn check_routes(&self) -> Result<(), ConfigError> {
        let mut owners: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<(Method, String)> = HashSet::new();
        let common = common_endpoints(true)
            .into_iter()
            .chain(std::iter::once(Endpoint::new(Method::GET, OPENAPI_PATH, "openapi")));
        let sources = std::iter::once(common.collect::<Vec<_>>()).chain(self.route_sets.iter().map(|rs| rs.endpoints()));
        for (owner, endpoints) in sources.enumerate() {
            for e in endpoints {
                if !seen.insert((e.method.clone(), e.path.clone())) {
                    return Err(ConfigError::DuplicatePath(format!("{} {}", e.method, e.path)));
                }
                match owners.get(&e.path) {
                    Some(&o) if o != owner => return Err(ConfigError::DuplicatePath(e.path)),
                    _ => {
                        owners.insert(e.path, owner);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn into_router(&self) -> Result<Router, AppError> {
        self.check_routes()?;
        let doc = self.openapi();
        let mut router = match &self.datasource {
            Some(ds) => common_routes_with_ready(Arc::clone(ds)),
            None => common_routes(),
        };
        for rs in &self.route_sets {
            router = router.merge(rs.router());
        }
        router = router.route(
            OPENAPI_PATH,
            get(move || {
                let doc = doc.clone();
                async move { Json(doc) }
            }),
        );
        Ok(router.layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(self.settings.max_body_bytes))))
    }

    /// Bind `settings.bind_addr` and serve until the process stops.
    pub async fn serve(self) -> Result<(), AppError> {
        let app = self.into_router()?;
        let listener = TcpListener::bind(&self.settings.bind_addr).await?;
        let addr = listener.local_addr()?;
        tracing::info!(app = %self.settings.app_name, environment = %self.settings.environment, %addr, "listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn http_method(m: &Method) -> Option<HttpMethod> {
    Some(match *m {
        Method::GET => HttpMethod::Get,
        Method::POST => HttpMethod::Post,
        Method::PUT => HttpMethod::Put,
        Method::PATCH => HttpMethod::Patch,
        Method::DELETE => HttpMethod::Delete,
        Method::HEAD => HttpMethod::Head,
        Method::OPTIONS => HttpMethod::Options,
        Method::TRACE => HttpMethod::Trace,
        _ => return None,
    })
}
