//! In-process store with the same staging, versioning and transaction rules
//! as the Postgres one. Used when no `DATABASE_URL` is configured.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    Change, CompanyRepository, CredentialRepository, Entity, PersonRepository, Repository, Store,
    TimeRecordRepository, UnitOfWork,
};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    normalize_name, Company, Credential, NewCompany, NewPerson, NewTimeRecord, Pagination, Person,
    RowVersion, TimeRecord,
};

#[derive(Debug, Default)]
struct Tables {
    time_records: BTreeMap<i64, TimeRecord>,
    persons: BTreeMap<i64, Person>,
    companies: BTreeMap<i64, Company>,
    credentials: HashMap<Uuid, Credential>,
    time_record_seq: i64,
    person_seq: i64,
    company_seq: i64,
}

/// Prior state of a row, restored on rollback.
#[derive(Debug)]
enum Undo {
    TimeRecord(i64, Option<TimeRecord>),
    Person(i64, Option<Person>),
    Company(i64, Option<Company>),
    Credential(Uuid, Option<Credential>),
}

impl Tables {
    fn restore(&mut self, undo: Undo) {
        match undo {
            Undo::TimeRecord(id, Some(row)) => {
                self.time_records.insert(id, row);
            }
            Undo::TimeRecord(id, None) => {
                self.time_records.remove(&id);
            }
            Undo::Person(id, Some(row)) => {
                self.persons.insert(id, row);
            }
            Undo::Person(id, None) => {
                self.persons.remove(&id);
            }
            Undo::Company(id, Some(row)) => {
                self.companies.insert(id, row);
            }
            Undo::Company(id, None) => {
                self.companies.remove(&id);
            }
            Undo::Credential(id, Some(row)) => {
                self.credentials.insert(id, row);
            }
            Undo::Credential(id, None) => {
                self.credentials.remove(&id);
            }
        }
    }

    /// Same rule as the Postgres exclusion constraint: no two live records of
    /// one person share an instant.
    fn overlaps_live(&self, row: &TimeRecord) -> bool {
        self.time_records.values().any(|other| {
            !other.is_deleted
                && other.id != row.id
                && other.person_id == row.person_id
                && other.overlaps(row)
        })
    }

    /// Apply one staged change, pushing what it overwrote onto `undo`.
    fn apply(&mut self, change: &Change, undo: &mut Vec<Undo>) -> StoreResult<usize> {
        match change {
            Change::AddTimeRecord(row) => {
                if self.overlaps_live(row) {
                    return Err(change.conflict());
                }
                undo.push(Undo::TimeRecord(
                    row.id,
                    self.time_records.insert(row.id, row.clone()),
                ));
            }
            Change::UpdateTimeRecord(row) => {
                let current = live_time_record(&self.time_records, row.id, Some(row.row_version))
                    .ok_or_else(|| change.conflict())?;
                if self.overlaps_live(row) {
                    return Err(change.conflict());
                }
                let mut next = row.clone();
                next.row_version = current.row_version.next();
                next.is_deleted = false;
                undo.push(Undo::TimeRecord(
                    row.id,
                    self.time_records.insert(row.id, next),
                ));
            }
            Change::DeleteTimeRecord { id, expected } => {
                let mut next = live_time_record(&self.time_records, *id, *expected)
                    .ok_or_else(|| change.conflict())?;
                next.row_version = next.row_version.next();
                next.is_deleted = true;
                undo.push(Undo::TimeRecord(*id, self.time_records.insert(*id, next)));
            }
            Change::AddPerson(row) => {
                undo.push(Undo::Person(row.id, self.persons.insert(row.id, row.clone())));
            }
            Change::UpdatePerson(row) => {
                let current = live_person(&self.persons, row.id, Some(row.row_version))
                    .ok_or_else(|| change.conflict())?;
                let mut next = row.clone();
                next.row_version = current.row_version.next();
                next.is_deleted = false;
                undo.push(Undo::Person(row.id, self.persons.insert(row.id, next)));
            }
            Change::DeletePerson { id, expected } => {
                let mut next =
                    live_person(&self.persons, *id, *expected).ok_or_else(|| change.conflict())?;
                next.row_version = next.row_version.next();
                next.is_deleted = true;
                undo.push(Undo::Person(*id, self.persons.insert(*id, next)));
            }
            Change::AddCompany(row) | Change::UpdateCompany(row) => {
                undo.push(Undo::Company(row.id, self.companies.insert(row.id, row.clone())));
            }
            Change::AddCredential(row) => {
                if self
                    .credentials
                    .values()
                    .any(|c| c.email.eq_ignore_ascii_case(&row.email))
                {
                    return Err(StoreError::Unavailable(format!(
                        "credential for {} already exists",
                        row.email
                    )));
                }
                undo.push(Undo::Credential(
                    row.id,
                    self.credentials.insert(row.id, row.clone()),
                ));
            }
            Change::RemoveCredential(id) => match self.credentials.remove(id) {
                Some(previous) => undo.push(Undo::Credential(*id, Some(previous))),
                None => return Ok(0),
            },
        }
        Ok(1)
    }
}

fn live_time_record(
    rows: &BTreeMap<i64, TimeRecord>,
    id: i64,
    expected: Option<RowVersion>,
) -> Option<TimeRecord> {
    rows.get(&id)
        .filter(|row| !row.is_deleted && expected.is_none_or(|v| v == row.row_version))
        .cloned()
}

fn live_person(
    rows: &BTreeMap<i64, Person>,
    id: i64,
    expected: Option<RowVersion>,
) -> Option<Person> {
    rows.get(&id)
        .filter(|row| !row.is_deleted && expected.is_none_or(|v| v == row.row_version))
        .cloned()
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn unit_of_work(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            tables: self.tables.clone(),
            pending: Vec::new(),
            transaction: None,
        }))
    }
}

pub struct MemoryUnitOfWork {
    tables: Arc<Mutex<Tables>>,
    pending: Vec<Change>,
    /// Undo log of the open explicit transaction, oldest first.
    transaction: Option<Vec<Undo>>,
}

impl MemoryUnitOfWork {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
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
        let pending = std::mem::take(&mut self.pending);
        let mut undo = Vec::with_capacity(pending.len());
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;

        let mut affected = 0;
        for change in &pending {
            match tables.apply(change, &mut undo) {
                Ok(n) => affected += n,
                Err(err) => {
                    while let Some(entry) = undo.pop() {
                        tables.restore(entry);
                    }
                    return Err(err);
                }
            }
        }

        if let Some(log) = self.transaction.as_mut() {
            log.extend(undo);
        }
        Ok(affected)
    }

    async fn begin_transaction(&mut self) -> StoreResult<()> {
        if self.transaction.is_some() {
            return Err(StoreError::Unavailable(
                "transaction already in progress".to_string(),
            ));
        }
        self.transaction = Some(Vec::new());
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if !self.pending.is_empty() {
            self.save_changes().await?;
        }
        self.transaction = None;
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.pending.clear();
        if let Some(mut log) = self.transaction.take() {
            let mut tables = self.lock()?;
            while let Some(entry) = log.pop() {
                tables.restore(entry);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Repository<TimeRecord> for MemoryUnitOfWork {
    async fn exists(&mut self, id: i64) -> StoreResult<bool> {
        Ok(live_time_record(&self.lock()?.time_records, id, None).is_some())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<TimeRecord>> {
        Ok(self
            .lock()?
            .time_records
            .values()
            .filter(|r| !r.is_deleted)
            .cloned()
            .collect())
    }

    async fn get(&mut self, id: i64) -> StoreResult<Option<TimeRecord>> {
        Ok(live_time_record(&self.lock()?.time_records, id, None))
    }

    async fn add(&mut self, draft: NewTimeRecord) -> StoreResult<i64> {
        let id = {
            let mut tables = self.lock()?;
            tables.time_record_seq += 1;
            tables.time_record_seq
        };
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

impl MemoryUnitOfWork {
    fn person_time_records(
        &self,
        person_id: i64,
        exclude: Option<i64>,
    ) -> StoreResult<Vec<TimeRecord>> {
        Ok(self
            .lock()?
            .time_records
            .values()
            .filter(|r| !r.is_deleted && r.person_id == person_id && exclude != Some(r.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TimeRecordRepository for MemoryUnitOfWork {
    async fn exists_overlapping(
        &mut self,
        person_id: i64,
        exclude: Option<i64>,
        instant: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self
            .person_time_records(person_id, exclude)?
            .iter()
            .any(|r| r.covers(instant)))
    }

    async fn exists_starting_within(
        &mut self,
        person_id: i64,
        exclude: Option<i64>,
        from: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        Ok(self
            .person_time_records(person_id, exclude)?
            .iter()
            .any(|r| r.starts_within(from, until)))
    }

    async fn get_page(
        &mut self,
        page: Pagination,
        person_id: Option<i64>,
    ) -> StoreResult<Vec<TimeRecord>> {
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit()).unwrap_or(0);
        Ok(self
            .lock()?
            .time_records
            .values()
            .filter(|r| !r.is_deleted && person_id.is_none_or(|p| p == r.person_id))
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn get_total_records(&mut self, person_id: Option<i64>) -> StoreResult<i64> {
        let count = self
            .lock()?
            .time_records
            .values()
            .filter(|r| !r.is_deleted && person_id.is_none_or(|p| p == r.person_id))
            .count();
        Ok(count as i64)
    }

    fn base(&mut self) -> &mut dyn Repository<TimeRecord> {
        self
    }
}

#[async_trait]
impl Repository<Person> for MemoryUnitOfWork {
    async fn exists(&mut self, id: i64) -> StoreResult<bool> {
        Ok(live_person(&self.lock()?.persons, id, None).is_some())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Person>> {
        Ok(self
            .lock()?
            .persons
            .values()
            .filter(|p| !p.is_deleted)
            .cloned()
            .collect())
    }

    async fn get(&mut self, id: i64) -> StoreResult<Option<Person>> {
        Ok(live_person(&self.lock()?.persons, id, None))
    }

    async fn add(&mut self, draft: NewPerson) -> StoreResult<i64> {
        let id = {
            let mut tables = self.lock()?;
            tables.person_seq += 1;
            tables.person_seq
        };
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

    async fn update(&mut self, mut entity: Person) -> StoreResult<()> {
        entity.name = entity.name.trim().to_string();
        self.pending.push(Change::UpdatePerson(entity));
        Ok(())
    }

    async fn delete(&mut self, id: i64, expected: Option<RowVersion>) -> StoreResult<()> {
        self.pending.push(Change::DeletePerson { id, expected });
        Ok(())
    }
}

#[async_trait]
impl PersonRepository for MemoryUnitOfWork {
    async fn exists_name(&mut self, exclude: Option<i64>, name: &str) -> StoreResult<bool> {
        let key = normalize_name(name);
        Ok(self
            .lock()?
            .persons
            .values()
            .any(|p| !p.is_deleted && exclude != Some(p.id) && normalize_name(&p.name) == key))
    }

    async fn get_by_company(&mut self, company_id: i64) -> StoreResult<Vec<Person>> {
        Ok(self
            .lock()?
            .persons
            .values()
            .filter(|p| !p.is_deleted && p.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn get_by_user_id(&mut self, user_id: Uuid) -> StoreResult<Option<Person>> {
        Ok(self
            .lock()?
            .persons
            .values()
            .find(|p| !p.is_deleted && p.user_id == user_id)
            .cloned())
    }

    async fn get_default(&mut self) -> StoreResult<Option<Person>> {
        Ok(self
            .lock()?
            .persons
            .values()
            .find(|p| !p.is_deleted && p.is_default)
            .cloned())
    }

    async fn get_page(&mut self, page: Pagination) -> StoreResult<Vec<Person>> {
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit()).unwrap_or(0);
        Ok(self
            .lock()?
            .persons
            .values()
            .filter(|p| !p.is_deleted)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn get_total_records(&mut self) -> StoreResult<i64> {
        let count = self.lock()?.persons.values().filter(|p| !p.is_deleted).count();
        Ok(count as i64)
    }

    fn base(&mut self) -> &mut dyn Repository<Person> {
        self
    }
}

#[async_trait]
impl Repository<Company> for MemoryUnitOfWork {
    async fn exists(&mut self, id: i64) -> StoreResult<bool> {
        Ok(self.lock()?.companies.contains_key(&id))
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Company>> {
        Ok(self.lock()?.companies.values().cloned().collect())
    }

    async fn get(&mut self, id: i64) -> StoreResult<Option<Company>> {
        Ok(self.lock()?.companies.get(&id).cloned())
    }

    async fn add(&mut self, draft: NewCompany) -> StoreResult<i64> {
        let id = {
            let mut tables = self.lock()?;
            tables.company_seq += 1;
            tables.company_seq
        };
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
        Err(StoreError::Unavailable(format!(
            "{} {id} cannot be deleted",
            Company::NAME
        )))
    }
}

#[async_trait]
impl CompanyRepository for MemoryUnitOfWork {
    async fn get_first(&mut self) -> StoreResult<Option<Company>> {
        Ok(self.lock()?.companies.values().next().cloned())
    }

    fn base(&mut self) -> &mut dyn Repository<Company> {
        self
    }
}

#[async_trait]
impl CredentialRepository for MemoryUnitOfWork {
    async fn find_by_email(&mut self, email: &str) -> StoreResult<Option<Credential>> {
        Ok(self
            .lock()?
            .credentials
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned())
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
