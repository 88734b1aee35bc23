use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{CreatingPerson, PersonBasic, PersonDetailed, RowVersion, UpdatingPerson};
use crate::services::{Creator, Deleter, Reader, Updater};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct UpdatePerson {
    pub name: String,
    pub row_version: Option<RowVersion>,
}

#[derive(Serialize)]
pub struct Created {
    pub id: i64,
}

/// Listing every person is never allowed; see `list_by_company`.
pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<PersonBasic>>, AppError> {
    let persons = state.persons(&auth).get_all().await?;
    Ok(Json(persons))
}

pub async fn list_by_company(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(company_id): Path<i64>,
) -> Result<Json<Vec<PersonBasic>>, AppError> {
    let persons = state
        .persons(&auth)
        .get_all_by_company_id(company_id)
        .await?;
    Ok(Json(persons))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreatingPerson>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    auth.require_admin()?;
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Person name is required".to_string()));
    }

    let id = state.persons(&auth).add(req).await?;
    tracing::info!("Person {id} created by {}", auth.person_id);
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<PersonDetailed>, AppError> {
    let person = state
        .persons(&auth)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Person not found".to_string()))?;
    Ok(Json(person))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePerson>,
) -> Result<StatusCode, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Person name is required".to_string()));
    }

    state
        .persons(&auth)
        .update(UpdatingPerson {
            id,
            name: req.name,
            row_version: req.row_version,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.persons(&auth).delete(id).await?;
    tracing::info!("Person {id} deleted");
    Ok(StatusCode::NO_CONTENT)
}
