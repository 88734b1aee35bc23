use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{
    CreatingTimeRecord, DeletingTimeRecord, Page, Pagination, RowVersion, TimeRecordReading,
    UpdatingTimeRecord,
};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct PageQuery {
    pub page_size: Option<i64>,
    pub page_number: Option<i64>,
}

impl PageQuery {
    fn pagination(&self) -> Pagination {
        Pagination::new(self.page_size.unwrap_or(20), self.page_number.unwrap_or(1))
    }
}

#[derive(Deserialize)]
pub struct UpdateTimeRecord {
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub row_version: RowVersion,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub row_version: RowVersion,
}

#[derive(Serialize)]
pub struct Created {
    pub id: i64,
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<TimeRecordReading>>, AppError> {
    let page = state
        .time_records(&auth)
        .get_all(query.pagination())
        .await?;
    Ok(Json(page))
}

pub async fn list_own(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<TimeRecordReading>>, AppError> {
    let page = state
        .time_records(&auth)
        .get_all_own(query.pagination())
        .await?;
    Ok(Json(page))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<TimeRecordReading>, AppError> {
    let record = state
        .time_records(&auth)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Time record not found".to_string()))?;
    Ok(Json(record))
}

pub async fn get_own(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<TimeRecordReading>, AppError> {
    let record = state
        .time_records(&auth)
        .get_own(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Time record not found".to_string()))?;
    Ok(Json(record))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreatingTimeRecord>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let id = state.time_records(&auth).add(req).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTimeRecord>,
) -> Result<StatusCode, AppError> {
    state
        .time_records(&auth)
        .update(UpdatingTimeRecord {
            id,
            start_date_time: req.start_date_time,
            end_date_time: req.end_date_time,
            row_version: req.row_version,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, AppError> {
    state
        .time_records(&auth)
        .delete(DeletingTimeRecord {
            id,
            row_version: query.row_version,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
