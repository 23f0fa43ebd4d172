//! Actions: one command object per repository operation. Route handlers build an
//! action from request arguments through an [`ActionFactory`] and run it.

use crate::error::AppError;
use crate::repository::{Fields, Options, Repository, Selection};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait Action: Send + Sync {
    type Output: Send;

    async fn run(&self) -> Result<Self::Output, AppError>;
}

pub type BoxAction<O> = Box<dyn Action<Output = O>>;

/// Builds an action from its arguments.
pub type ActionFactory<A, O> = Arc<dyn Fn(A) -> BoxAction<O> + Send + Sync>;

type Dto<R> = <R as Repository>::Dto;

fn boxed<A: Action + 'static>(action: A) -> BoxAction<A::Output> {
    Box::new(action)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReadManyArgs<C> {
    pub selection: Selection<C>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl<C> Default for ReadManyArgs<C> {
    fn default() -> Self {
        ReadManyArgs {
            selection: Selection::default(),
            skip: 0,
            limit: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateOneArgs {
    pub record_id: Value,
    pub changes: Fields,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateManyArgs<C> {
    pub changes: Fields,
    pub selection: Selection<C>,
}

pub struct CreateOneAction<R, D> {
    repository: Arc<R>,
    record: D,
    options: Options,
}

impl<R, D> CreateOneAction<R, D>
where
    R: Repository + 'static,
    D: Serialize + Send + Sync + 'static,
{
    pub fn new(repository: Arc<R>, record: D) -> Self {
        CreateOneAction {
            repository,
            record,
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<D, Dto<R>> {
        Arc::new(move |record| boxed(Self::new(Arc::clone(&repository), record)))
    }
}

#[async_trait]
impl<R, D> Action for CreateOneAction<R, D>
where
    R: Repository + 'static,
    D: Serialize + Send + Sync + 'static,
{
    type Output = Dto<R>;

    async fn run(&self) -> Result<Dto<R>, AppError> {
        self.repository.create_one(&self.record, &self.options).await
    }
}

pub struct CreateManyAction<R, D> {
    repository: Arc<R>,
    records: Vec<D>,
    options: Options,
}

impl<R, D> CreateManyAction<R, D>
where
    R: Repository + 'static,
    D: Serialize + Send + Sync + 'static,
{
    pub fn new(repository: Arc<R>, records: Vec<D>) -> Self {
        CreateManyAction {
            repository,
            records,
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<Vec<D>, Vec<Dto<R>>> {
        Arc::new(move |records| boxed(Self::new(Arc::clone(&repository), records)))
    }
}

#[async_trait]
impl<R, D> Action for CreateManyAction<R, D>
where
    R: Repository + 'static,
    D: Serialize + Send + Sync + 'static,
{
    type Output = Vec<Dto<R>>;

    async fn run(&self) -> Result<Vec<Dto<R>>, AppError> {
        self.repository.create_many(&self.records, &self.options).await
    }
}

pub struct ReadOneAction<R> {
    repository: Arc<R>,
    record_id: Value,
    options: Options,
}

impl<R: Repository + 'static> ReadOneAction<R> {
    pub fn new(repository: Arc<R>, record_id: impl Into<Value>) -> Self {
        ReadOneAction {
            repository,
            record_id: record_id.into(),
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<Value, Dto<R>> {
        Arc::new(move |record_id: Value| boxed(Self::new(Arc::clone(&repository), record_id)))
    }
}

#[async_trait]
impl<R: Repository + 'static> Action for ReadOneAction<R> {
    type Output = Dto<R>;

    async fn run(&self) -> Result<Dto<R>, AppError> {
        self.repository.get_one(&self.record_id, &self.options).await
    }
}

pub struct ReadManyAction<R: Repository> {
    repository: Arc<R>,
    args: ReadManyArgs<R::Criterion>,
    options: Options,
}

impl<R: Repository + 'static> ReadManyAction<R> {
    pub fn new(repository: Arc<R>, args: ReadManyArgs<R::Criterion>) -> Self {
        ReadManyAction {
            repository,
            args,
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<ReadManyArgs<R::Criterion>, Vec<Dto<R>>> {
        Arc::new(move |args| boxed(Self::new(Arc::clone(&repository), args)))
    }
}

#[async_trait]
impl<R: Repository + 'static> Action for ReadManyAction<R> {
    type Output = Vec<Dto<R>>;

    async fn run(&self) -> Result<Vec<Dto<R>>, AppError> {
        let ReadManyArgs { selection, skip, limit } = &self.args;
        self.repository
            .get_many(selection, *skip, *limit, &self.options)
            .await
    }
}

pub struct UpdateOneAction<R> {
    repository: Arc<R>,
    args: UpdateOneArgs,
    options: Options,
}

impl<R: Repository + 'static> UpdateOneAction<R> {
    pub fn new(repository: Arc<R>, args: UpdateOneArgs) -> Self {
        UpdateOneAction {
            repository,
            args,
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<UpdateOneArgs, Dto<R>> {
        Arc::new(move |args| boxed(Self::new(Arc::clone(&repository), args)))
    }
}

#[async_trait]
impl<R: Repository + 'static> Action for UpdateOneAction<R> {
    type Output = Dto<R>;

    async fn run(&self) -> Result<Dto<R>, AppError> {
        self.repository
            .update_one(&self.args.record_id, &self.args.changes, &self.options)
            .await
    }
}

pub struct UpdateManyAction<R: Repository> {
    repository: Arc<R>,
    args: UpdateManyArgs<R::Criterion>,
    options: Options,
}

impl<R: Repository + 'static> UpdateManyAction<R> {
    pub fn new(repository: Arc<R>, args: UpdateManyArgs<R::Criterion>) -> Self {
        UpdateManyAction {
            repository,
            args,
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<UpdateManyArgs<R::Criterion>, Vec<Dto<R>>> {
        Arc::new(move |args| boxed(Self::new(Arc::clone(&repository), args)))
    }
}

#[async_trait]
impl<R: Repository + 'static> Action for UpdateManyAction<R> {
    type Output = Vec<Dto<R>>;

    async fn run(&self) -> Result<Vec<Dto<R>>, AppError> {
        self.repository
            .update_many(&self.args.changes, &self.args.selection, &self.options)
            .await
    }
}

pub struct DeleteOneAction<R> {
    repository: Arc<R>,
    record_id: Value,
    options: Options,
}

impl<R: Repository + 'static> DeleteOneAction<R> {
    pub fn new(repository: Arc<R>, record_id: impl Into<Value>) -> Self {
        DeleteOneAction {
            repository,
            record_id: record_id.into(),
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<Value, Dto<R>> {
        Arc::new(move |record_id: Value| boxed(Self::new(Arc::clone(&repository), record_id)))
    }
}

#[async_trait]
impl<R: Repository + 'static> Action for DeleteOneAction<R> {
    type Output = Dto<R>;

    async fn run(&self) -> Result<Dto<R>, AppError> {
        self.repository.remove_one(&self.record_id, &self.options).await
    }
}

pub struct DeleteManyAction<R: Repository> {
    repository: Arc<R>,
    selection: Selection<R::Criterion>,
    options: Options,
}

impl<R: Repository + 'static> DeleteManyAction<R> {
    pub fn new(repository: Arc<R>, selection: Selection<R::Criterion>) -> Self {
        DeleteManyAction {
            repository,
            selection,
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn factory(repository: Arc<R>) -> ActionFactory<Selection<R::Criterion>, Vec<Dto<R>>> {
        Arc::new(move |selection| boxed(Self::new(Arc::clone(&repository), selection)))
    }
}

#[async_trait]
impl<R: Repository + 'static> Action for DeleteManyAction<R> {
    type Output = Vec<Dto<R>>;

    async fn run(&self) -> Result<Vec<Dto<R>>, AppError> {
        self.repository.remove_many(&self.selection, &self.options).await
    }
}
