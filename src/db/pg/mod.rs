pub mod companies;
pub mod credentials;
pub mod persons;
pub mod time_records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    Change, CompanyRepository, CredentialRepository, PersonRepository, Repository, Store,
    TimeRecordRepository, UnitOfWork,
};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Company, Credential, NewCompany, NewPerson, NewTimeRecord, Pagination, Person, RowVersion,
    TimeRecord,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn unit_of_work(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(PgUnitOfWork {
            pool: self.pool.clone(),
            tx: None,
            explicit: false,
            pending: Vec::new(),
        }))
    }
}

/// Unit of work over one Postgres transaction, opened on first use.
///
/// Dropping it without `save_changes`/`commit` rolls the transaction back.
pub struct PgUnitOfWork {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    explicit: bool,
    pending: Vec<Change>,
}

impl PgUnitOfWork {
    async fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        if self.tx.is_none() {
            self.tx = Some(self.pool.begin().await?);
        }
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(StoreError::Unavailable("transaction not open".to_string())),
        }
    }

    async fn flush(&mut self) -> StoreResult<usize> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(0);
        }

        let conn = self.conn().await?;
        let mut affected = 0;
        for change in &pending {
            let rows = apply(&mut *conn, change)
                .await
                .map_err(|err| classify(err, change))?;
            if rows == 0 && change.requires_row() {
                return Err(change.conflict());
            }
            affected += rows as usize;
        }
        Ok(affected)
    }

    async fn finish(&mut self, commit: bool) -> StoreResult<()> {
        self.explicit = false;
        match self.tx.take() {
            Some(tx) if commit => tx.commit().await?,
            Some(tx) => tx.rollback().await?,
            None => {}
        }
        Ok(())
    }
}

async fn apply(conn: &mut PgConnection, change: &Change) -> Result<u64, sqlx::Error> {
    match change {
        Change::AddTimeRecord(row) => time_records::create(conn, row).await,
        Change::UpdateTimeRecord(row) => time_records::update(conn, row).await,
        Change::DeleteTimeRecord { id, expected } => {
            time_records::soft_delete(conn, *id, *expected).await
        }
        Change::AddPerson(row) => persons::create(conn, row).await,
        Change::UpdatePerson(row) => persons::update(conn, row).await,
        Change::DeletePerson { id, expected } => persons::soft_delete(conn, *id, *expected).await,
        Change::AddCompany(row) => companies::create(conn, row).await,
        Change::UpdateCompany(row) => companies::update(conn, row).await,
        Change::AddCredential(row) => credentials::create(conn, row).await,
        Change::RemoveCredential(id) => credentials::delete(conn, *id).await,
    }
}

/// Unique and exclusion violations mean a concurrent writer got there first.
fn classify(err: sqlx::Error, change: &Change) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some("23505") | Some("23P01")) {
            tracing::debug!("Constraint violation on flush: {db}");
            return change.conflict();
        }
    }
    err.into()
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn time_records(&mut self) -> &mut dyn TimeRecordRepository {
        self
    }

    fn persons(&mut self) -> &mut dyn PersonRepository {
        self
    }

    fn companies(&mut self) -> &mut dyn CompanyRepository {
        self
    }

    fn credentials(&mut self) -> &mut dyn CredentialRepository {
        self
    }

    async fn save_changes(&mut self) -> StoreResult<usize> {
        let flushed = self.flush().await;
        if self.explicit {
            return flushed;
        }

        match flushed {
            Ok(affected) => {
                self.finish(true).await?;
                Ok(affected)
            }
            Err(err) => {
                if let Err(rollback_err) = self.finish(false).await {
                    tracing::error!("Rollback after `{err}` failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    async fn begin_transaction(&mut self) -> StoreResult<()> {
        if self.explicit {
            return Err(StoreError::Unavailable(
                "transaction already in progress".to_string(),
            ));
        }
        self.conn().await?;
        self.explicit = true;
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.flush().await?;
        self.finish(true).await
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.pending.clear();
        self.finish(false).await
    }
}

#[async_trait]
impl Repository<TimeRecord> for PgUnitOfWork {
    async fn exists(&mut self, id: i64) -> StoreResult<bool> {
        Ok(time_records::exists(self.conn().await?, id).await?)
    }

    async fn get_all(&mut self) -> StoreResult<Vec<TimeRecord>> {
        Ok(time_records::list(self.conn().await?).await?)
    }

    async fn get(&mut self, id: i64) -> StoreResult<Option<TimeRecord>> {
        Ok(time_records::find_by_id(self.conn().await?, id).await?)
    }

    async fn add(&mut self, draft: NewTimeRecord) -> StoreResult<i64> {
        let id = time_records::next_id(self.conn().await?).await?;
        self.pending.push(Change::AddTimeRecord(TimeRecord {
            id,
            person_id: draft.person_id,
            start_date_time: draft.start_date_time,
            end_date_time: draft.end_date_time,
            row_version: RowVersion::INITIAL,
            is_deleted: false,
        }));
        Ok(id)
    }

    async fn update(&mut self, entity: TimeRecord) -> StoreResult<()> {
        self.pending.push(Change::UpdateTimeRecord(entity));
        Ok(())
    }

    async fn delete(&mut self, id: i64, expected: Option<RowVersion>) -> StoreResult<()> {
        self.pending.push(Change::DeleteTimeRecord { id, expected });
        Ok(())
    }
}

#[async_trait]
impl TimeRecordRepository for PgUnitOfWork {
    async fn exists_overlapping(
        &mut self,
        person_id: i64,
        exclude: Option<i64>,
        instant: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(
            time_records::exists_overlapping(self.conn().await?, person_id, exclude, instant)
                .await?,
        )
    }

    async fn exists_starting_within(
        &mut self,
        person_id: i64,
        exclude: Option<i64>,
        from: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        Ok(time_records::exists_starting_within(
            self.conn().await?,
            person_id,
            exclude,
            from,
            until,
        )
        .await?)
    }

    async fn get_page(
        &mut self,
        page: Pagination,
        person_id: Option<i64>,
    ) -> StoreResult<Vec<TimeRecord>> {
        Ok(time_records::list_page(self.conn().await?, page, person_id).await?)
    }

    async fn get_total_records(&mut self, person_id: Option<i64>) -> StoreResult<i64> {
        Ok(time_records::count(self.conn().await?, person_id).await?)
    }

    fn base(&mut self) -> &mut dyn Repository<TimeRecord> {
        self
    }
}

#[async_trait]
impl Repository<Person> for PgUnitOfWork {
    async fn exists(&mut self, id: i64) -> StoreResult<bool> {
        Ok(persons::exists(self.conn().await?, id).await?)
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Person>> {
        Ok(persons::list(self.conn().await?).await?)
    }

    async fn get(&mut self, id: i64) -> StoreResult<Option<Person>> {
        Ok(persons::find_by_id(self.conn().await?, id).await?)
    }

    async fn add(&mut self, draft: NewPerson) -> StoreResult<i64> {
        let id = persons::next_id(self.conn().await?).await?;
        self.pending.push(Change::AddPerson(Person {
            id,
            name: draft.name.trim().to_string(),
            user_id: draft.user_id,
            company_id: draft.company_id,
            is_default: draft.is_default,
            row_version: RowVersion::INITIAL,
            is_deleted: false,
        }));
        Ok(id)
    }

    async fn update(&mut self, entity: Person) -> StoreResult<()> {
        self.pending.push(Change::UpdatePerson(entity));
        Ok(())
    }

    async fn delete(&mut self, id: i64, expected: Option<RowVersion>) -> StoreResult<()> {
        self.pending.push(Change::DeletePerson { id, expected });
        Ok(())
    }
}

#[async_trait]
impl PersonRepository for PgUnitOfWork {
    async fn exists_name(&mut self, exclude: Option<i64>, name: &str) -> StoreResult<bool> {
        Ok(persons::exists_name(self.conn().await?, exclude, name).await?)
    }

    async fn get_by_company(&mut self, company_id: i64) -> StoreResult<Vec<Person>> {
        Ok(persons::list_by_company(self.conn().await?, company_id).await?)
    }

    async fn get_by_user_id(&mut self, user_id: Uuid) -> StoreResult<Option<Person>> {
        Ok(persons::find_by_user_id(self.conn().await?, user_id).await?)
    }

    async fn get_default(&mut self) -> StoreResult<Option<Person>> {
        Ok(persons::find_default(self.conn().await?).await?)
    }

    async fn get_page(&mut self, page: Pagination) -> StoreResult<Vec<Person>> {
        Ok(persons::list_page(self.conn().await?, page).await?)
    }

    async fn get_total_records(&mut self) -> StoreResult<i64> {
        Ok(persons::count(self.conn().await?).await?)
    }

    fn base(&mut self) -> &mut dyn Repository<Person> {
        self
    }
}

#[async_trait]
impl Repository<Company> for PgUnitOfWork {
    async fn exists(&mut self, id: i64) -> StoreResult<bool> {
        Ok(companies::exists(self.conn().await?, id).await?)
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Company>> {
        Ok(companies::list(self.conn().await?).await?)
    }

    async fn get(&mut self, id: i64) -> StoreResult<Option<Company>> {
        Ok(companies::find_by_id(self.conn().await?, id).await?)
    }

    async fn add(&mut self, draft: NewCompany) -> StoreResult<i64> {
        let id = companies::next_id(self.conn().await?).await?;
        self.pending.push(Change::AddCompany(Company {
            id,
            name: draft.name,
        }));
        Ok(id)
    }

    async fn update(&mut self, entity: Company) -> StoreResult<()> {
        self.pending.push(Change::UpdateCompany(entity));
        Ok(())
    }

    // Companies are never removed; the singleton only changes by update.
    async fn delete(&mut self, id: i64, _expected: Option<RowVersion>) -> StoreResult<()> {
        Err(StoreError::Unavailable(format!("Company {id} cannot be deleted")))
    }
}

#[async_trait]
impl CompanyRepository for PgUnitOfWork {
    async fn get_first(&mut self) -> StoreResult<Option<Company>> {
        Ok(companies::find_first(self.conn().await?).await?)
    }

    fn base(&mut self) -> &mut dyn Repository<Company> {
        self
    }
}

#[async_trait]
impl CredentialRepository for PgUnitOfWork {
    async fn find_by_email(&mut self, email: &str) -> StoreResult<Option<Credential>> {
        Ok(credentials::find_by_email(self.conn().await?, email).await?)
    }

    async fn add(&mut self, credential: Credential) -> StoreResult<()> {
        self.pending.push(Change::AddCredential(credential));
        Ok(())
    }

    async fn remove(&mut self, id: Uuid) -> StoreResult<()> {
        self.pending.push(Change::RemoveCredential(id));
        Ok(())
    }
}
