//! Generic CRUD pipeline: validate, map, stage, save, all under the retry policy.
//!
//! Entity services are a [`CrudService`] parameterised by a [`CrudRules`]
//! implementation. The rules supply the mapping and override whichever
//! validation hooks the entity needs; callers see the capability traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RetrySettings;
use crate::db::{complete_transaction, Entity, Repository, Store, UnitOfWork};
use crate::error::{ServiceError, ServiceResult};
use crate::models::RowVersion;
use crate::retry::RetryPolicy;

#[async_trait]
pub trait Reader: Send + Sync {
    type BasicReading: Send;
    type DetailedReading: Send;

    async fn get_all(&self) -> ServiceResult<Vec<Self::BasicReading>>;

    /// `Ok(None)` when the item does not exist.
    async fn get(&self, id: i64) -> ServiceResult<Option<Self::DetailedReading>>;
}

#[async_trait]
pub trait Creator: Send + Sync {
    type Creation: Send + Sync;

    async fn add(&self, model: Self::Creation) -> ServiceResult<i64>;
}

#[async_trait]
pub trait Updater: Send + Sync {
    type Updating: Send + Sync;

    async fn update(&self, model: Self::Updating) -> ServiceResult<()>;
}

#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(&self, id: i64) -> ServiceResult<()>;
}

/// Entity-specific mapping and validation plugged into [`CrudService`].
#[async_trait]
pub trait CrudRules: Send + Sync + 'static {
    type Entity: Entity;
    type BasicReading: From<Self::Entity> + Send;
    type DetailedReading: From<Self::Entity> + Send;
    type Creation: Send + Sync;
    type Updating: Send + Sync;

    /// Run add and delete inside an explicit transaction.
    const TRANSACTIONAL: bool = false;

    fn repository(uow: &mut dyn UnitOfWork) -> &mut dyn Repository<Self::Entity>;

    fn updating_id(model: &Self::Updating) -> i64;

    /// Version the update must be checked against; `None` uses the loaded one.
    fn updating_version(_model: &Self::Updating) -> Option<RowVersion> {
        None
    }

    fn apply_update(model: &Self::Updating, entity: &mut Self::Entity);

    /// Build the insert shape. May stage related writes on `uow`.
    async fn prepare_add(
        &self,
        uow: &mut dyn UnitOfWork,
        model: &Self::Creation,
    ) -> ServiceResult<<Self::Entity as Entity>::Draft>;

    async fn check_get_all(&self) -> ServiceResult<()> {
        Ok(())
    }

    async fn check_get(&self, _id: i64) -> ServiceResult<()> {
        Ok(())
    }

    async fn validate_add(
        &self,
        _uow: &mut dyn UnitOfWork,
        _model: &Self::Creation,
    ) -> ServiceResult<()> {
        Ok(())
    }

    async fn validate_update(
        &self,
        uow: &mut dyn UnitOfWork,
        model: &Self::Updating,
    ) -> ServiceResult<()> {
        ensure_exists::<Self>(uow, Self::updating_id(model)).await
    }

    async fn validate_delete(&self, uow: &mut dyn UnitOfWork, id: i64) -> ServiceResult<()> {
        ensure_exists::<Self>(uow, id).await
    }

    /// Stage follow-up writes once the delete itself is staged.
    async fn after_delete(&self, _uow: &mut dyn UnitOfWork, _id: i64) -> ServiceResult<()> {
        Ok(())
    }
}

/// `ItemNotExists` unless a live `R::Entity` with `id` exists.
pub async fn ensure_exists<R: CrudRules + ?Sized>(
    uow: &mut dyn UnitOfWork,
    id: i64,
) -> ServiceResult<()> {
    if R::repository(uow).exists(id).await? {
        Ok(())
    } else {
        Err(ServiceError::item_not_exists(<R::Entity as Entity>::NAME, id))
    }
}

pub struct CrudService<R> {
    rules: R,
    store: Arc<dyn Store>,
    retry: RetrySettings,
}

impl<R: CrudRules> CrudService<R> {
    pub fn new(rules: R, store: Arc<dyn Store>, retry: RetrySettings) -> Self {
        Self {
            rules,
            store,
            retry,
        }
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_settings(&self.retry)
    }

    pub(crate) async fn unit_of_work(&self) -> ServiceResult<Box<dyn UnitOfWork>> {
        Ok(self.store.unit_of_work().await?)
    }

    async fn get_all_once(&self) -> ServiceResult<Vec<R::BasicReading>> {
        self.rules.check_get_all().await?;
        let mut uow = self.unit_of_work().await?;
        let entities = R::repository(uow.as_mut()).get_all().await?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn get_once(&self, id: i64) -> ServiceResult<Option<R::DetailedReading>> {
        self.rules.check_get(id).await?;
        let mut uow = self.unit_of_work().await?;
        let entity = R::repository(uow.as_mut()).get(id).await?;
        Ok(entity.map(Into::into))
    }

    async fn add_once(&self, model: &R::Creation) -> ServiceResult<i64> {
        let mut uow = self.unit_of_work().await?;
        if R::TRANSACTIONAL {
            uow.begin_transaction().await?;
            let outcome = self.stage_add(uow.as_mut(), model).await;
            complete_transaction(uow.as_mut(), outcome).await
        } else {
            self.stage_add(uow.as_mut(), model).await
        }
    }

    async fn stage_add(
        &self,
        uow: &mut dyn UnitOfWork,
        model: &R::Creation,
    ) -> ServiceResult<i64> {
        self.rules.validate_add(&mut *uow, model).await?;
        let draft = self.rules.prepare_add(&mut *uow, model).await?;
        let id = R::repository(&mut *uow).add(draft).await?;
        uow.save_changes().await?;
        tracing::debug!("Added {} {id}", <R::Entity as Entity>::NAME);
        Ok(id)
    }

    async fn update_once(&self, model: &R::Updating) -> ServiceResult<()> {
        let mut uow = self.unit_of_work().await?;
        self.rules.validate_update(uow.as_mut(), model).await?;

        let id = R::updating_id(model);
        let repository = R::repository(uow.as_mut());
        let entity = match R::updating_version(model) {
            Some(version) => repository.attach(id, version).await?,
            None => repository.get(id).await?,
        };
        let mut entity = entity
            .ok_or_else(|| ServiceError::item_not_exists(<R::Entity as Entity>::NAME, id))?;

        R::apply_update(model, &mut entity);
        R::repository(uow.as_mut()).update(entity).await?;
        uow.save_changes().await?;
        tracing::debug!("Updated {} {id}", <R::Entity as Entity>::NAME);
        Ok(())
    }

    async fn delete_once(&self, id: i64) -> ServiceResult<()> {
        let mut uow = self.unit_of_work().await?;
        if R::TRANSACTIONAL {
            uow.begin_transaction().await?;
            let outcome = self.stage_delete(uow.as_mut(), id).await;
            complete_transaction(uow.as_mut(), outcome).await
        } else {
            self.stage_delete(uow.as_mut(), id).await
        }
    }

    async fn stage_delete(&self, uow: &mut dyn UnitOfWork, id: i64) -> ServiceResult<()> {
        self.rules.validate_delete(&mut *uow, id).await?;
        R::repository(&mut *uow).delete(id, None).await?;
        self.rules.after_delete(&mut *uow, id).await?;
        uow.save_changes().await?;
        tracing::debug!("Deleted {} {id}", <R::Entity as Entity>::NAME);
        Ok(())
    }
}

#[async_trait]
impl<R: CrudRules> Reader for CrudService<R> {
    type BasicReading = R::BasicReading;
    type DetailedReading = R::DetailedReading;

    async fn get_all(&self) -> ServiceResult<Vec<R::BasicReading>> {
        self.retry_policy().execute(move || self.get_all_once()).await
    }

    async fn get(&self, id: i64) -> ServiceResult<Option<R::DetailedReading>> {
        self.retry_policy().execute(move || self.get_once(id)).await
    }
}

#[async_trait]
impl<R: CrudRules> Creator for CrudService<R> {
    type Creation = R::Creation;

    async fn add(&self, model: R::Creation) -> ServiceResult<i64> {
        let model = &model;
        self.retry_policy().execute(move || self.add_once(model)).await
    }
}

#[async_trait]
impl<R: CrudRules> Updater for CrudService<R> {
    type Updating = R::Updating;

    async fn update(&self, model: R::Updating) -> ServiceResult<()> {
        let model = &model;
        self.retry_policy().execute(move || self.update_once(model)).await
    }
}

#[async_trait]
impl<R: CrudRules> Deleter for CrudService<R> {
    async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.retry_policy().execute(move || self.delete_once(id)).await
    }
}
