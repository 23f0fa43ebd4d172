//! Generated CRUD route set. With `P` the single-item base path and `M` the
//! multiple-items base path:
//!
//! | Route | Action |
//! |-------|--------|
//! | `POST P/` | create one |
//! | `GET P/?skip&limit&q` | read many |
//! | `GET P/:record_id` | read one |
//! | `PUT P/:record_id` | update one, full body |
//! | `PATCH P/:record_id` | update one, partial body |
//! | `DELETE P/:record_id` | delete one |
//! | `POST M/` | create many |
//! | `PUT M/?q` | update many |
//! | `DELETE M/?q` | delete many |
//!
//! An operation without an action has no route and no endpoint description.

use super::{do_action, Endpoint, RouteSet};
use crate::action::{
    ActionFactory, CreateManyAction, CreateOneAction, DeleteManyAction, DeleteOneAction, ReadManyAction,
    ReadManyArgs, ReadOneAction, UpdateManyAction, UpdateManyArgs, UpdateOneAction, UpdateOneArgs,
};
use crate::config::ColumnType;
use crate::error::{AppError, ConfigError};
use crate::repository::{to_fields, Repository, Selection};
use crate::response::{created, ok};
use crate::sql::{col, Criterion};
use axum::{
    extract::{Path, Query},
    http::{Method, StatusCode},
    routing::MethodRouter,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Settings for a generated CRUD route set. `C` is the creation body, `P` the
/// partial-update body, `O` the output DTO (also the full-update body).
pub struct CrudRouteSetSettings<C, P, O> {
    pub base_path: String,
    pub base_path_for_multiple_items: String,
    /// Fields matched against `q` with a substring LIKE.
    pub string_searchable_fields: Vec<String>,
    /// Type of `:record_id` path segments.
    pub id_type: ColumnType,
    pub create_one_action: Option<ActionFactory<C, O>>,
    pub create_many_action: Option<ActionFactory<Vec<C>, Vec<O>>>,
    pub read_one_action: Option<ActionFactory<Value, O>>,
    pub read_many_action: Option<ActionFactory<ReadManyArgs<Criterion>, Vec<O>>>,
    pub update_one_action: Option<ActionFactory<UpdateOneArgs, O>>,
    pub update_many_action: Option<ActionFactory<UpdateManyArgs<Criterion>, Vec<O>>>,
    pub delete_one_action: Option<ActionFactory<Value, O>>,
    pub delete_many_action: Option<ActionFactory<Selection<Criterion>, Vec<O>>>,
    _partial: PhantomData<fn() -> P>,
}

impl<C, P, O> Clone for CrudRouteSetSettings<C, P, O> {
    fn clone(&self) -> Self {
        CrudRouteSetSettings {
            base_path: self.base_path.clone(),
            base_path_for_multiple_items: self.base_path_for_multiple_items.clone(),
            string_searchable_fields: self.string_searchable_fields.clone(),
            id_type: self.id_type,
            create_one_action: self.create_one_action.clone(),
            create_many_action: self.create_many_action.clone(),
            read_one_action: self.read_one_action.clone(),
            read_many_action: self.read_many_action.clone(),
            update_one_action: self.update_one_action.clone(),
            update_many_action: self.update_many_action.clone(),
            delete_one_action: self.delete_one_action.clone(),
            delete_many_action: self.delete_many_action.clone(),
            _partial: PhantomData,
        }
    }
}

impl<C, P, O> CrudRouteSetSettings<C, P, O> {
    /// Settings with no actions; every operation starts disabled.
    pub fn new(base_path: impl Into<String>, base_path_for_multiple_items: impl Into<String>) -> Self {
        CrudRouteSetSettings {
            base_path: base_path.into(),
            base_path_for_multiple_items: base_path_for_multiple_items.into(),
            string_searchable_fields: Vec::new(),
            id_type: ColumnType::Integer,
            create_one_action: None,
            create_many_action: None,
            read_one_action: None,
            read_many_action: None,
            update_one_action: None,
            update_many_action: None,
            delete_one_action: None,
            delete_many_action: None,
            _partial: PhantomData,
        }
    }

    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_searchable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn id_type(mut self, id_type: ColumnType) -> Self {
        self.id_type = id_type;
        self
    }

    /// All eight operations wired to the standard actions over one repository.
    pub fn for_repository<R>(
        base_path: impl Into<String>,
        base_path_for_multiple_items: impl Into<String>,
        repository: Arc<R>,
    ) -> Self
    where
        R: Repository<Criterion = Criterion, Dto = O> + 'static,
        C: Serialize + Send + Sync + 'static,
    {
        let mut s = Self::new(base_path, base_path_for_multiple_items);
        s.create_one_action = Some(CreateOneAction::<R, C>::factory(Arc::clone(&repository)));
        s.create_many_action = Some(CreateManyAction::<R, C>::factory(Arc::clone(&repository)));
        s.read_one_action = Some(ReadOneAction::factory(Arc::clone(&repository)));
        s.read_many_action = Some(ReadManyAction::factory(Arc::clone(&repository)));
        s.update_one_action = Some(UpdateOneAction::factory(Arc::clone(&repository)));
        s.update_many_action = Some(UpdateManyAction::factory(Arc::clone(&repository)));
        s.delete_one_action = Some(DeleteOneAction::factory(Arc::clone(&repository)));
        s.delete_many_action = Some(DeleteManyAction::factory(repository));
        s
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: u64,
    pub limit: Option<u64>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// `q` as an OR of substring matches over `fields`. No fields matches nothing.
pub fn search_criterion(fields: &[String], q: &str) -> Criterion {
    Criterion::any(fields.iter().map(|f| col(f.as_str()).contains(q)))
}

fn search_selection(fields: &[String], q: Option<&str>) -> Selection<Criterion> {
    match q {
        Some(q) => Selection::new().criterion(search_criterion(fields, q)),
        None => Selection::new(),
    }
}

/// Parse a `:record_id` segment into a typed key.
pub fn parse_id(id_str: &str, id_type: ColumnType) -> Result<Value, AppError> {
    Ok(match id_type {
        ColumnType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        ColumnType::Integer => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        ColumnType::Real => {
            let n = id_str
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .ok_or_else(|| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n)
        }
        ColumnType::Boolean => {
            let b: bool = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Bool(b)
        }
        ColumnType::Text => Value::String(id_str.to_string()),
    })
}

fn normalize(path: &str) -> String {
    path.trim_end_matches('/').to_string()
}

/// A CRUD route set generated from its settings.
pub struct CrudRouteSet<C, P, O> {
    settings: CrudRouteSetSettings<C, P, O>,
    base: String,
    multi: String,
}

impl<C, P, O> CrudRouteSet<C, P, O> {
    /// Fails when both base paths name the same route.
    pub fn new(settings: CrudRouteSetSettings<C, P, O>) -> Result<Self, ConfigError> {
        let base = normalize(&settings.base_path);
        let multi = normalize(&settings.base_path_for_multiple_items);
        if base == multi {
            return Err(ConfigError::DuplicatePath(format!("{}/", base)));
        }
        Ok(CrudRouteSet { settings, base, multi })
    }

    pub fn settings(&self) -> &CrudRouteSetSettings<C, P, O> {
        &self.settings
    }

    fn collection_path(&self) -> String {
        format!("{}/", self.base)
    }

    fn item_path(&self) -> String {
        format!("{}/:record_id", self.base)
    }

    fn multi_path(&self) -> String {
        format!("{}/", self.multi)
    }
}

impl<C, P, O> RouteSet for CrudRouteSet<C, P, O>
where
    C: DeserializeOwned + Send + Sync + 'static,
    P: DeserializeOwned + Serialize + Send + 'static,
    O: DeserializeOwned + Serialize + Send + 'static,
{
    fn router(&self) -> Router {
        let s = &self.settings;
        let id_type = s.id_type;
        let fields = Arc::new(s.string_searchable_fields.clone());

        let mut collection: Option<MethodRouter> = None;
        let mut item: Option<MethodRouter> = None;
        let mut multi: Option<MethodRouter> = None;

        if let Some(f) = s.create_one_action.clone() {
            let route = axum::routing::post(move |Json(body): Json<C>| {
                let f = f.clone();
                async move { do_action(&f, body).await.map(created) }
            });
            collection = Some(add(collection, route));
        }
        if let Some(f) = s.read_many_action.clone() {
            let fields = Arc::clone(&fields);
            let route = axum::routing::get(move |Query(query): Query<ListQuery>| {
                let f = f.clone();
                let fields = Arc::clone(&fields);
                async move {
                    let args = ReadManyArgs {
                        selection: search_selection(&fields, query.q.as_deref()),
                        skip: query.skip,
                        limit: query.limit,
                    };
                    do_action(&f, args).await.map(ok)
                }
            });
            collection = Some(add(collection, route));
        }
        if let Some(f) = s.read_one_action.clone() {
            let route = axum::routing::get(move |Path(record_id): Path<String>| {
                let f = f.clone();
                async move {
                    let record_id = parse_id(&record_id, id_type)?;
                    do_action(&f, record_id).await.map(ok)
                }
            });
            item = Some(add(item, route));
        }
        if let Some(f) = s.update_one_action.clone() {
            let full = f.clone();
            let route = axum::routing::put(move |Path(record_id): Path<String>, Json(body): Json<O>| {
                let f = full.clone();
                async move {
                    let args = UpdateOneArgs {
                        record_id: parse_id(&record_id, id_type)?,
                        changes: to_fields(&body)?,
                    };
                    do_action(&f, args).await.map(ok)
                }
            })
            .patch(move |Path(record_id): Path<String>, Json(body): Json<P>| {
                let f = f.clone();
                async move {
                    let args = UpdateOneArgs {
                        record_id: parse_id(&record_id, id_type)?,
                        changes: to_fields(&body)?,
                    };
                    do_action(&f, args).await.map(ok)
                }
            });
            item = Some(add(item, route));
        }
        if let Some(f) = s.delete_one_action.clone() {
            let route = axum::routing::delete(move |Path(record_id): Path<String>| {
                let f = f.clone();
                async move {
                    let record_id = parse_id(&record_id, id_type)?;
                    do_action(&f, record_id).await.map(ok)
                }
            });
            item = Some(add(item, route));
        }
        if let Some(f) = s.create_many_action.clone() {
            let route = axum::routing::post(move |Json(body): Json<Vec<C>>| {
                let f = f.clone();
                async move { do_action(&f, body).await.map(created) }
            });
            multi = Some(add(multi, route));
        }
        if let Some(f) = s.update_many_action.clone() {
            let fields = Arc::clone(&fields);
            let route = axum::routing::put(move |Query(query): Query<SearchQuery>, Json(body): Json<P>| {
                let f = f.clone();
                let fields = Arc::clone(&fields);
                async move {
                    let args = UpdateManyArgs {
                        changes: to_fields(&body)?,
                        selection: search_selection(&fields, query.q.as_deref()),
                    };
                    do_action(&f, args).await.map(ok)
                }
            });
            multi = Some(add(multi, route));
        }
        if let Some(f) = s.delete_many_action.clone() {
            let route = axum::routing::delete(move |Query(query): Query<SearchQuery>| {
                let f = f.clone();
                let fields = Arc::clone(&fields);
                async move {
                    let selection = search_selection(&fields, query.q.as_deref());
                    do_action(&f, selection).await.map(ok)
                }
            });
            multi = Some(add(multi, route));
        }

        let mut router = Router::new();
        for (path, methods) in [
            (self.collection_path(), collection),
            (self.item_path(), item),
            (self.multi_path(), multi),
        ] {
            if let Some(methods) = methods {
                router = router.route(&path, methods);
            }
        }
        router
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        let s = &self.settings;
        let mut out = Vec::new();
        if s.create_one_action.is_some() {
            out.push(Endpoint::new(Method::POST, self.collection_path(), "create_one").status(StatusCode::CREATED));
        }
        if s.read_many_action.is_some() {
            out.push(Endpoint::new(Method::GET, self.collection_path(), "read_many").query(&["skip", "limit", "q"]));
        }
        if s.read_one_action.is_some() {
            out.push(Endpoint::new(Method::GET, self.item_path(), "read_one"));
        }
        if s.update_one_action.is_some() {
            out.push(Endpoint::new(Method::PUT, self.item_path(), "update_one"));
            out.push(Endpoint::new(Method::PATCH, self.item_path(), "update_partial"));
        }
        if s.delete_one_action.is_some() {
            out.push(Endpoint::new(Method::DELETE, self.item_path(), "delete_one"));
        }
        if s.create_many_action.is_some() {
            out.push(Endpoint::new(Method::POST, self.multi_path(), "create_many").status(StatusCode::CREATED));
        }
        if s.update_many_action.is_some() {
            out.push(Endpoint::new(Method::PUT, self.multi_path(), "update_many").query(&["q"]));
        }
        if s.delete_many_action.is_some() {
            out.push(Endpoint::new(Method::DELETE, self.multi_path(), "delete_many").query(&["q"]));
        }
        out
    }
}

fn add(existing: Option<MethodRouter>, route: MethodRouter) -> MethodRouter {
    match existing {
        Some(methods) => methods.merge(route),
        None => route,
    }
}
