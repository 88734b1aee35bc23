//! Persistence boundary.
//!
//! A [`Store`] hands out one [`UnitOfWork`] per operation attempt. Reads go
//! straight to the backing store; writes are staged and flushed in order by
//! [`UnitOfWork::save_changes`], which is also where row versions are checked.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Company, Credential, NewCompany, NewPerson, NewTimeRecord, Pagination, Person, RowVersion,
    TimeRecord,
};

/// A persisted row with an `i64` identity.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Insert shape; the store assigns the id and the initial version.
    type Draft: Send + 'static;

    const NAME: &'static str;

    fn id(&self) -> i64;

    /// Replace the version the next guarded write will be checked against.
    fn expect_version(&mut self, version: RowVersion);
}

impl Entity for TimeRecord {
    type Draft = NewTimeRecord;
    const NAME: &'static str = "TimeRecord";

    fn id(&self) -> i64 {
        self.id
    }

    fn expect_version(&mut self, version: RowVersion) {
        self.row_version = version;
    }
}

impl Entity for Person {
    type Draft = NewPerson;
    const NAME: &'static str = "Person";

    fn id(&self) -> i64 {
        self.id
    }

    fn expect_version(&mut self, version: RowVersion) {
        self.row_version = version;
    }
}

impl Entity for Company {
    type Draft = NewCompany;
    const NAME: &'static str = "Company";

    fn id(&self) -> i64 {
        self.id
    }

    // Companies carry no concurrency token.
    fn expect_version(&mut self, _version: RowVersion) {}
}

/// CRUD shared by every entity. Soft-deleted rows are invisible to all reads.
#[async_trait]
pub trait Repository<E: Entity>: Send {
    async fn exists(&mut self, id: i64) -> StoreResult<bool>;

    async fn get_all(&mut self) -> StoreResult<Vec<E>>;

    async fn get(&mut self, id: i64) -> StoreResult<Option<E>>;

    /// Load `id` and bind `version` as the version subsequent writes expect.
    async fn attach(&mut self, id: i64, version: RowVersion) -> StoreResult<Option<E>> {
        Ok(self.get(id).await?.map(|mut entity| {
            entity.expect_version(version);
            entity
        }))
    }

    /// Stage an insert and return the id reserved for it.
    async fn add(&mut self, draft: E::Draft) -> StoreResult<i64>;

    /// Stage an update guarded by `entity`'s current version.
    async fn update(&mut self, entity: E) -> StoreResult<()>;

    /// Stage a soft delete, guarded by `expected` when given.
    async fn delete(&mut self, id: i64, expected: Option<RowVersion>) -> StoreResult<()>;
}

#[async_trait]
pub trait TimeRecordRepository: Repository<TimeRecord> {
    /// Any live record of `person_id` (other than `exclude`) with
    /// `start <= instant < end`, open records counting as unbounded.
    async fn exists_overlapping(
        &mut self,
        person_id: i64,
        exclude: Option<i64>,
        instant: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Any live record of `person_id` (other than `exclude`) whose start lies
    /// in `[from, until)`; `until = None` is unbounded.
    async fn exists_starting_within(
        &mut self,
        person_id: i64,
        exclude: Option<i64>,
        from: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<bool>;

    async fn get_page(
        &mut self,
        page: Pagination,
        person_id: Option<i64>,
    ) -> StoreResult<Vec<TimeRecord>>;

    async fn get_total_records(&mut self, person_id: Option<i64>) -> StoreResult<i64>;

    fn base(&mut self) -> &mut dyn Repository<TimeRecord>;
}

#[async_trait]
pub trait PersonRepository: Repository<Person> {
    /// Case- and surrounding-whitespace-insensitive name lookup.
    async fn exists_name(&mut self, exclude: Option<i64>, name: &str) -> StoreResult<bool>;

    async fn get_by_company(&mut self, company_id: i64) -> StoreResult<Vec<Person>>;

    async fn get_by_user_id(&mut self, user_id: Uuid) -> StoreResult<Option<Person>>;

    async fn get_default(&mut self) -> StoreResult<Option<Person>>;

    async fn get_page(&mut self, page: Pagination) -> StoreResult<Vec<Person>>;

    async fn get_total_records(&mut self) -> StoreResult<i64>;

    fn base(&mut self) -> &mut dyn Repository<Person>;
}

#[async_trait]
pub trait CompanyRepository: Repository<Company> {
    /// The company with the lowest id.
    async fn get_first(&mut self) -> StoreResult<Option<Company>>;

    fn base(&mut self) -> &mut dyn Repository<Company>;
}

/// Identity-provider rows. Keyed by `Uuid` and erased rather than soft deleted.
#[async_trait]
pub trait CredentialRepository: Send {
    async fn find_by_email(&mut self, email: &str) -> StoreResult<Option<Credential>>;

    async fn add(&mut self, credential: Credential) -> StoreResult<()>;

    async fn remove(&mut self, id: Uuid) -> StoreResult<()>;
}

/// One transactional scope over the store.
///
/// Outside an explicit transaction every `save_changes` is atomic on its own.
/// Inside one, `save_changes` flushes without committing and
/// [`complete_transaction`] decides the outcome.
#[async_trait]
pub trait UnitOfWork: Send {
    fn time_records(&mut self) -> &mut dyn TimeRecordRepository;

    fn persons(&mut self) -> &mut dyn PersonRepository;

    fn companies(&mut self) -> &mut dyn CompanyRepository;

    fn credentials(&mut self) -> &mut dyn CredentialRepository;

    /// Flush staged writes and return how many rows they touched.
    async fn save_changes(&mut self) -> StoreResult<usize>;

    async fn begin_transaction(&mut self) -> StoreResult<()>;

    async fn commit(&mut self) -> StoreResult<()>;

    async fn rollback(&mut self) -> StoreResult<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn unit_of_work(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// Commit when `outcome` is `Ok`, roll back otherwise, and hand `outcome` back.
pub async fn complete_transaction<T, E>(
    uow: &mut dyn UnitOfWork,
    outcome: Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError> + std::fmt::Display,
{
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!("Rollback after `{err}` failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

/// Staged write, applied by `save_changes` in staging order.
#[derive(Debug, Clone)]
pub(crate) enum Change {
    AddTimeRecord(TimeRecord),
    UpdateTimeRecord(TimeRecord),
    DeleteTimeRecord {
        id: i64,
        expected: Option<RowVersion>,
    },
    AddPerson(Person),
    UpdatePerson(Person),
    DeletePerson {
        id: i64,
        expected: Option<RowVersion>,
    },
    AddCompany(Company),
    UpdateCompany(Company),
    AddCredential(Credential),
    RemoveCredential(Uuid),
}

impl Change {
    /// Writes that must hit an existing live row at the expected version.
    fn requires_row(&self) -> bool {
        matches!(
            self,
            Change::UpdateTimeRecord(_)
                | Change::DeleteTimeRecord { .. }
                | Change::UpdatePerson(_)
                | Change::DeletePerson { .. }
                | Change::UpdateCompany(_)
        )
    }

    fn conflict(&self) -> StoreError {
        let (entity, id) = match self {
            Change::AddTimeRecord(r) | Change::UpdateTimeRecord(r) => (TimeRecord::NAME, r.id),
            Change::DeleteTimeRecord { id, .. } => (TimeRecord::NAME, *id),
            Change::AddPerson(p) | Change::UpdatePerson(p) => (Person::NAME, p.id),
            Change::DeletePerson { id, .. } => (Person::NAME, *id),
            Change::AddCompany(c) | Change::UpdateCompany(c) => (Company::NAME, c.id),
            Change::AddCredential(_) | Change::RemoveCredential(_) => ("Credential", 0),
        };
        StoreError::ConcurrencyConflict { entity, id }
    }
}
