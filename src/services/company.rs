use std::sync::Arc;

use async_trait::async_trait;

use super::crud::{ensure_exists, CrudRules, CrudService};
use super::UserContext;
use crate::db::{Repository, UnitOfWork};
use crate::error::{ErrorCode, ServiceError, ServiceResult};
use crate::models::{Company, NewCompany, UpdatingCompany};

pub type CompanyService = CrudService<CompanyRules>;

/// The company is a singleton managed by administrators.
pub struct CompanyRules {
    caller: Arc<dyn UserContext>,
}

impl CompanyRules {
    pub fn new(caller: Arc<dyn UserContext>) -> Self {
        Self { caller }
    }

    fn ensure_admin(&self) -> ServiceResult<()> {
        if self.caller.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::ForbiddenAction)
        }
    }
}

#[async_trait]
impl CrudRules for CompanyRules {
    type Entity = Company;
    type BasicReading = Company;
    type DetailedReading = Company;
    type Creation = NewCompany;
    type Updating = UpdatingCompany;

    fn repository(uow: &mut dyn UnitOfWork) -> &mut dyn Repository<Company> {
        uow.companies().base()
    }

    fn updating_id(model: &UpdatingCompany) -> i64 {
        model.id
    }

    fn apply_update(model: &UpdatingCompany, entity: &mut Company) {
        entity.name = model.name.trim().to_string();
    }

    async fn prepare_add(
        &self,
        _uow: &mut dyn UnitOfWork,
        model: &NewCompany,
    ) -> ServiceResult<NewCompany> {
        Ok(model.clone())
    }

    async fn validate_add(
        &self,
        _uow: &mut dyn UnitOfWork,
        _model: &NewCompany,
    ) -> ServiceResult<()> {
        self.ensure_admin()
    }

    async fn validate_update(
        &self,
        uow: &mut dyn UnitOfWork,
        model: &UpdatingCompany,
    ) -> ServiceResult<()> {
        self.ensure_admin()?;
        ensure_exists::<Self>(uow, model.id).await
    }

    async fn validate_delete(&self, _uow: &mut dyn UnitOfWork, _id: i64) -> ServiceResult<()> {
        Err(ServiceError::ForbiddenAction)
    }
}

impl CrudService<CompanyRules> {
    /// The single company; `ItemNotExists` before it has been seeded.
    pub async fn get_company(&self) -> ServiceResult<Company> {
        self.retry_policy().execute(move || self.get_company_once()).await
    }

    async fn get_company_once(&self) -> ServiceResult<Company> {
        let mut uow = self.unit_of_work().await?;
        uow.companies().get_first().await?.ok_or_else(|| {
            ServiceError::not_valid(
                ErrorCode::ItemNotExists,
                "No company has been set up",
            )
        })
    }
}
