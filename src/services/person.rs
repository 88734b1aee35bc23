use std::sync::Arc;

use async_trait::async_trait;

use super::crud::{ensure_exists, CrudRules, CrudService};
use super::UserContext;
use crate::auth::identity::IdentityProvider;
use crate::db::{Repository, UnitOfWork};
use crate::error::{ErrorCode, ServiceError, ServiceResult};
use crate::models::{
    CreatingPerson, NewPerson, Person, PersonBasic, PersonDetailed, Role, RowVersion,
    UpdatingPerson,
};

pub type PersonService = CrudService<PersonRules>;

/// Person rules: unique names, self-service updates and deletes, a protected
/// default person, and a credential provisioned alongside every person.
pub struct PersonRules {
    caller: Arc<dyn UserContext>,
    identity: Arc<dyn IdentityProvider>,
}

impl PersonRules {
    pub fn new(caller: Arc<dyn UserContext>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { caller, identity }
    }

    fn target_company(&self, model: &CreatingPerson) -> Option<i64> {
        model.company_id.or_else(|| self.caller.company_id())
    }

    fn ensure_self(&self, id: i64) -> ServiceResult<()> {
        if self.caller.person_id() == Some(id) {
            Ok(())
        } else {
            Err(ServiceError::ForbiddenAction)
        }
    }
}

async fn ensure_unique_name(
    uow: &mut dyn UnitOfWork,
    exclude: Option<i64>,
    name: &str,
) -> ServiceResult<()> {
    if uow.persons().exists_name(exclude, name).await? {
        return Err(ServiceError::not_valid(
            ErrorCode::PersonNameExists,
            format!("A person named '{}' already exists", name.trim()),
        ));
    }
    Ok(())
}

#[async_trait]
impl CrudRules for PersonRules {
    type Entity = Person;
    type BasicReading = PersonBasic;
    type DetailedReading = PersonDetailed;
    type Creation = CreatingPerson;
    type Updating = UpdatingPerson;

    const TRANSACTIONAL: bool = true;

    fn repository(uow: &mut dyn UnitOfWork) -> &mut dyn Repository<Person> {
        uow.persons().base()
    }

    fn updating_id(model: &UpdatingPerson) -> i64 {
        model.id
    }

    fn updating_version(model: &UpdatingPerson) -> Option<RowVersion> {
        model.row_version
    }

    fn apply_update(model: &UpdatingPerson, entity: &mut Person) {
        entity.name = model.name.trim().to_string();
    }

    async fn prepare_add(
        &self,
        uow: &mut dyn UnitOfWork,
        model: &CreatingPerson,
    ) -> ServiceResult<NewPerson> {
        let company_id = self
            .target_company(model)
            .ok_or(ServiceError::ForbiddenAction)?;
        let user_id = self
            .identity
            .register(uow, &model.email, &model.password, Role::Employee)
            .await?;

        Ok(NewPerson {
            name: model.name.trim().to_string(),
            user_id,
            company_id,
            is_default: false,
        })
    }

    // Listing every person is never allowed; use `get_all_by_company_id`.
    async fn check_get_all(&self) -> ServiceResult<()> {
        Err(ServiceError::ForbiddenAction)
    }

    async fn validate_add(
        &self,
        uow: &mut dyn UnitOfWork,
        model: &CreatingPerson,
    ) -> ServiceResult<()> {
        ensure_unique_name(&mut *uow, None, &model.name).await?;

        if let Some(company_id) = model.company_id {
            if !uow.companies().exists(company_id).await? {
                return Err(ServiceError::not_valid(
                    ErrorCode::CompanyNotExists,
                    format!("Company {company_id} does not exist"),
                ));
            }
        }

        match (self.caller.company_id(), self.target_company(model)) {
            (Some(own), Some(target)) if own == target => Ok(()),
            _ => Err(ServiceError::ForbiddenAction),
        }
    }

    async fn validate_update(
        &self,
        uow: &mut dyn UnitOfWork,
        model: &UpdatingPerson,
    ) -> ServiceResult<()> {
        ensure_exists::<Self>(&mut *uow, model.id).await?;
        self.ensure_self(model.id)?;
        ensure_unique_name(uow, Some(model.id), &model.name).await
    }

    async fn validate_delete(&self, uow: &mut dyn UnitOfWork, id: i64) -> ServiceResult<()> {
        let person = uow
            .persons()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::item_not_exists("Person", id))?;

        if person.is_default {
            return Err(ServiceError::not_valid(
                ErrorCode::PersonDefault,
                "The default person cannot be deleted",
            ));
        }
        self.ensure_self(id)
    }

    async fn after_delete(&self, uow: &mut dyn UnitOfWork, id: i64) -> ServiceResult<()> {
        // The soft delete is only staged, so the row is still readable here.
        let person = uow
            .persons()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::item_not_exists("Person", id))?;
        self.identity.delete(uow, person.user_id).await
    }
}

impl CrudService<PersonRules> {
    /// Persons of `company_id`; callers may only list their own company.
    pub async fn get_all_by_company_id(
        &self,
        company_id: i64,
    ) -> ServiceResult<Vec<PersonBasic>> {
        self.retry_policy()
            .execute(move || self.get_all_by_company_id_once(company_id))
            .await
    }

    async fn get_all_by_company_id_once(
        &self,
        company_id: i64,
    ) -> ServiceResult<Vec<PersonBasic>> {
        if self.rules().caller.company_id() != Some(company_id) {
            return Err(ServiceError::ForbiddenAction);
        }
        let mut uow = self.unit_of_work().await?;
        let persons = uow.persons().get_by_company(company_id).await?;
        Ok(persons.into_iter().map(PersonBasic::from).collect())
    }
}
