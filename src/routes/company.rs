use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{Company, UpdatingCompany};
use crate::services::Updater;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct UpdateCompany {
    pub name: String,
}

pub async fn get_company(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Company>, AppError> {
    let company = state.company(&auth).get_company().await?;
    Ok(Json(company))
}

pub async fn update_company(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<UpdateCompany>,
) -> Result<Json<Company>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Company name is required".to_string()));
    }

    let service = state.company(&auth);
    let company = service.get_company().await?;
    service
        .update(UpdatingCompany {
            id: company.id,
            name: req.name,
        })
        .await?;

    let company = service.get_company().await?;
    Ok(Json(company))
}
