use std::marker::PhantomData;

use serde::Serialize;
use shared::{
    error::ValidationErrors,
    model::{bind, Entity, Params},
    protocol::ListPage,
};
use storage::{Conflict, DraftOf, Repository};
use tracing::{debug, info};

use crate::{
    find_model,
    search::{search, Criteria, DataProvider},
    CrudError,
};

/// Rewrites a submitted payload before it is bound onto a draft.
pub type PayloadHook = fn(&mut Params);

#[derive(Debug, Clone, Serialize)]
pub struct Listing<T, C> {
    pub criteria: C,
    pub page: ListPage<T>,
}

/// What a create or update request led to.
#[derive(Debug, Clone)]
pub enum FormOutcome<T, D> {
    /// Nothing bindable was submitted; show the form prefilled with `D`.
    Blank(D),
    Invalid { draft: D, errors: ValidationErrors },
    Saved(T),
}

/// Index, view, create, update and delete for one entity, generic over its
/// repository and search criteria.
pub struct CrudController<R, C> {
    repo: R,
    hooks: Vec<PayloadHook>,
    criteria: PhantomData<fn() -> C>,
}

impl<R: Clone, C> Clone for CrudController<R, C> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            hooks: self.hooks.clone(),
            criteria: PhantomData,
        }
    }
}

impl<R, C> CrudController<R, C>
where
    R: Repository,
    C: Criteria,
{
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            hooks: Vec::new(),
            criteria: PhantomData,
        }
    }

    pub fn with_hook(mut self, hook: PayloadHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub async fn index(&self, raw: &Params) -> Result<Listing<R::Record, C>, CrudError> {
        let (criteria, query) = search::<C>(raw);
        let page = DataProvider::from_params::<C>(&self.repo, query, raw)
            .fetch()
            .await?;
        Ok(Listing { criteria, page })
    }

    pub async fn view(&self, id: i64) -> Result<R::Record, CrudError> {
        find_model(&self.repo, id).await
    }

    pub async fn create(
        &self,
        payload: Option<Params>,
    ) -> Result<FormOutcome<R::Record, DraftOf<R>>, CrudError> {
        self.save(None, payload).await
    }

    pub async fn update(
        &self,
        id: i64,
        payload: Option<Params>,
    ) -> Result<FormOutcome<R::Record, DraftOf<R>>, CrudError> {
        let current = find_model(&self.repo, id).await?;
        self.save(Some(current), payload).await
    }

    pub async fn delete(&self, id: i64) -> Result<R::Record, CrudError> {
        let record = find_model(&self.repo, id).await?;
        if !self.repo.delete(id).await? {
            return Err(CrudError::not_found::<R::Record>(id));
        }
        info!(kind = R::Record::KIND, id, "deleted");
        Ok(record)
    }

    async fn save(
        &self,
        current: Option<R::Record>,
        payload: Option<Params>,
    ) -> Result<FormOutcome<R::Record, DraftOf<R>>, CrudError> {
        let start = current
            .as_ref()
            .map_or_else(Default::default, Entity::to_draft);
        let Some(mut payload) = payload else {
            return Ok(FormOutcome::Blank(start));
        };
        for hook in &self.hooks {
            hook(&mut payload);
        }

        let binding = bind(start, &payload);
        if !binding.rejected.is_empty() {
            debug!(
                kind = R::Record::KIND,
                rejected = ?binding.rejected,
                "ignored fields outside the allow-list"
            );
        }
        if !binding.is_loaded() {
            return Ok(FormOutcome::Blank(binding.draft));
        }
        let draft = match binding.validated() {
            Ok(draft) => draft,
            Err((draft, errors)) => return Ok(FormOutcome::Invalid { draft, errors }),
        };

        let written = match &current {
            Some(record) if record.to_draft() == draft => {
                debug!(kind = R::Record::KIND, id = record.id(), "no changes to save");
                return Ok(FormOutcome::Saved(record.clone()));
            }
            Some(record) => self.repo.update(record.id(), &draft).await,
            None => self.repo.insert(&draft).await.map(Some),
        };

        match written {
            Ok(Some(record)) => {
                info!(kind = R::Record::KIND, id = record.id(), "saved");
                Ok(FormOutcome::Saved(record))
            }
            Ok(None) => Err(CrudError::not_found::<R::Record>(
                current.as_ref().map_or(0, Entity::id),
            )),
            Err(err) => match err.downcast_ref::<Conflict>() {
                Some(conflict) => {
                    let mut errors = ValidationErrors::new();
                    errors.add(conflict.field, "This value has already been taken.");
                    Ok(FormOutcome::Invalid { draft, errors })
                }
                None => Err(err.into()),
            },
        }
    }
}

/// Moves `from` to `to`, overwriting any value already under `to`.
pub fn rename_field(payload: &mut Params, from: &str, to: &str) {
    if let Some(value) = payload.remove(from) {
        payload.insert(to.to_string(), value);
    }
}

/// Articles are edited as `data` in the form but stored as `texts`.
pub fn article_data_to_texts(payload: &mut Params) {
    rename_field(payload, "data", "texts");
}
