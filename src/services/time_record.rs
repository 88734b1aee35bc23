//! Time record lifecycle: overlap-free, version-guarded, owner-scoped.
//!
//! Every record belongs to one person. Callers act on their own records;
//! administrators may additionally read anyone's. Two live records of the
//! same person never share an instant under `[start, end)` semantics, with an
//! open record extending forever.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::UserContext;
use crate::config::RetrySettings;
use crate::db::{Store, TimeRecordRepository, UnitOfWork};
use crate::error::{ErrorCode, ServiceError, ServiceResult};
use crate::models::{
    CreatingTimeRecord, DeletingTimeRecord, NewTimeRecord, Page, Pagination, TimeRecord,
    TimeRecordReading, UpdatingTimeRecord,
};
use crate::retry::RetryPolicy;

pub struct TimeRecordService {
    store: Arc<dyn Store>,
    retry: RetrySettings,
    caller: Arc<dyn UserContext>,
}

impl TimeRecordService {
    pub fn new(store: Arc<dyn Store>, retry: RetrySettings, caller: Arc<dyn UserContext>) -> Self {
        Self {
            store,
            retry,
            caller,
        }
    }

    /// Any person's records, one page at a time. Administrators only.
    pub async fn get_all(&self, page: Pagination) -> ServiceResult<Page<TimeRecordReading>> {
        self.ensure_admin()?;
        self.retry_policy()
            .execute(move || self.page_once(page, None))
            .await
    }

    /// The caller's own records, one page at a time.
    pub async fn get_all_own(&self, page: Pagination) -> ServiceResult<Page<TimeRecordReading>> {
        let person_id = self.own_person_id()?;
        self.retry_policy()
            .execute(move || self.page_once(page, Some(person_id)))
            .await
    }

    /// Any record by id. Administrators only.
    pub async fn get(&self, id: i64) -> ServiceResult<Option<TimeRecordReading>> {
        self.ensure_admin()?;
        self.retry_policy()
            .execute(move || self.get_once(id, None))
            .await
    }

    /// One of the caller's records. A record owned by someone else reads as
    /// absent so its existence is not disclosed.
    pub async fn get_own(&self, id: i64) -> ServiceResult<Option<TimeRecordReading>> {
        let person_id = self.own_person_id()?;
        self.retry_policy()
            .execute(move || self.get_once(id, Some(person_id)))
            .await
    }

    pub async fn add(&self, model: CreatingTimeRecord) -> ServiceResult<i64> {
        let model = &model;
        self.retry_policy().execute(move || self.add_once(model)).await
    }

    pub async fn update(&self, model: UpdatingTimeRecord) -> ServiceResult<()> {
        let model = &model;
        self.retry_policy()
            .execute(move || self.update_once(model))
            .await
    }

    pub async fn delete(&self, model: DeletingTimeRecord) -> ServiceResult<()> {
        self.retry_policy()
            .execute(move || self.delete_once(model))
            .await
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_settings(&self.retry)
    }

    fn ensure_admin(&self) -> ServiceResult<()> {
        if self.caller.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::ForbiddenAction)
        }
    }

    fn own_person_id(&self) -> ServiceResult<i64> {
        self.caller.person_id().ok_or(ServiceError::ForbiddenAction)
    }

    async fn page_once(
        &self,
        page: Pagination,
        person_id: Option<i64>,
    ) -> ServiceResult<Page<TimeRecordReading>> {
        page.validate()
            .map_err(|msg| ServiceError::not_valid(ErrorCode::InvalidPagination, msg))?;

        let mut uow = self.store.unit_of_work().await?;
        let repository = uow.time_records();
        let total_registers = repository.get_total_records(person_id).await?;
        let records = repository.get_page(page, person_id).await?;
        Ok(Page {
            total_registers,
            result: records.into_iter().map(TimeRecordReading::from).collect(),
        })
    }

    async fn get_once(
        &self,
        id: i64,
        owner: Option<i64>,
    ) -> ServiceResult<Option<TimeRecordReading>> {
        let mut uow = self.store.unit_of_work().await?;
        let record = uow.time_records().get(id).await?;
        Ok(record
            .filter(|record| owner.is_none_or(|person_id| record.person_id == person_id))
            .map(TimeRecordReading::from))
    }

    async fn add_once(&self, model: &CreatingTimeRecord) -> ServiceResult<i64> {
        let person_id = self.own_person_id()?;
        ensure_range(model.start_date_time, model.end_date_time)?;

        let mut uow = self.store.unit_of_work().await?;
        ensure_no_overlap(
            uow.time_records(),
            person_id,
            None,
            model.start_date_time,
            model.end_date_time,
        )
        .await?;

        let id = uow
            .time_records()
            .add(NewTimeRecord {
                person_id,
                start_date_time: model.start_date_time,
                end_date_time: model.end_date_time,
            })
            .await?;
        uow.save_changes().await?;
        tracing::debug!("Added time record {id} for person {person_id}");
        Ok(id)
    }

    async fn update_once(&self, model: &UpdatingTimeRecord) -> ServiceResult<()> {
        let mut uow = self.store.unit_of_work().await?;
        let record = self.load_owned(uow.as_mut(), model.id).await?;

        let mut record = uow
            .time_records()
            .attach(record.id, model.row_version)
            .await?
            .ok_or_else(|| ServiceError::item_not_exists("TimeRecord", model.id))?;

        ensure_range(model.start_date_time, model.end_date_time)?;
        ensure_no_overlap(
            uow.time_records(),
            record.person_id,
            Some(record.id),
            model.start_date_time,
            model.end_date_time,
        )
        .await?;

        record.start_date_time = model.start_date_time;
        record.end_date_time = model.end_date_time;
        uow.time_records().update(record).await?;
        uow.save_changes().await?;
        tracing::debug!("Updated time record {}", model.id);
        Ok(())
    }

    async fn delete_once(&self, model: DeletingTimeRecord) -> ServiceResult<()> {
        let mut uow = self.store.unit_of_work().await?;
        self.load_owned(uow.as_mut(), model.id).await?;

        uow.time_records()
            .delete(model.id, Some(model.row_version))
            .await?;
        uow.save_changes().await?;
        tracing::debug!("Deleted time record {}", model.id);
        Ok(())
    }

    /// `ItemNotExists` when absent, `ForbiddenAction` when owned by another person.
    async fn load_owned(&self, uow: &mut dyn UnitOfWork, id: i64) -> ServiceResult<TimeRecord> {
        let record = uow
            .time_records()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::item_not_exists("TimeRecord", id))?;

        if self.caller.person_id() != Some(record.person_id) {
            return Err(ServiceError::ForbiddenAction);
        }
        Ok(record)
    }
}

fn ensure_range(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> ServiceResult<()> {
    match end {
        Some(end) if end <= start => Err(ServiceError::not_valid(
            ErrorCode::InvalidTimeRange,
            "The end of a time record must be after its start",
        )),
        _ => Ok(()),
    }
}

/// Rejects `[start, end)` when it shares any instant with another live record
/// of `person_id`. Either the candidate starts inside an existing record, or
/// an existing record starts inside the candidate.
async fn ensure_no_overlap(
    repository: &mut dyn TimeRecordRepository,
    person_id: i64,
    exclude: Option<i64>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> ServiceResult<()> {
    let overlapping = repository
        .exists_overlapping(person_id, exclude, start)
        .await?
        || repository
            .exists_starting_within(person_id, exclude, start, end)
            .await?;

    if overlapping {
        return Err(ServiceError::not_valid(
            ErrorCode::TimeRecordOverlappingExists,
            "The time record overlaps an existing one",
        ));
    }
    Ok(())
}
