use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::jwt::{encode_token, Claims};
use crate::auth::password;
use crate::error::AppError;
use crate::models::Role;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub person_id: i64,
    pub company_id: i64,
    pub is_admin: bool,
}

fn access_cookie(access_token: &str) -> Cookie<'static> {
    Cookie::build(("access_token", access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    if state.login_limiter.check(&req.email).is_err() {
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let mut uow = state.store.unit_of_work().await?;
    let Some(credential) = uow.credentials().find_by_email(req.email.trim()).await? else {
        state.login_limiter.record_failure(&req.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    let valid = password::verify(&req.password, &credential.password_hash)
        .map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&req.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    // A credential without a live person belongs to a deleted account.
    let person = uow
        .persons()
        .get_by_user_id(credential.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    state.login_limiter.reset(&req.email);

    let ttl_minutes = state.config.token_ttl_minutes;
    let claims = Claims::new(
        credential.id,
        person.id,
        person.company_id,
        credential.role() == Role::Admin,
        ttl_minutes,
    );
    let access_token =
        encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    tracing::info!("Person {} logged in", person.id);

    let jar = jar.add(access_cookie(&access_token));
    Ok((
        jar,
        Json(AuthResponse {
            access_token,
            token_type: "Bearer",
            expires_in: ttl_minutes * 60,
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(("access_token", "")).path("/").build())
}

pub async fn me(auth: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: auth.user_id,
        person_id: auth.person_id,
        company_id: auth.company_id,
        is_admin: auth.is_admin,
    })
}
