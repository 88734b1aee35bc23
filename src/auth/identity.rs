use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::password;
use crate::db::UnitOfWork;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Credential, Role};

/// Owner of login credentials.
///
/// Writes are staged on the caller's unit of work, so a credential lands or
/// disappears together with the person row that references it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register(
        &self,
        uow: &mut dyn UnitOfWork,
        email: &str,
        password: &str,
        role: Role,
    ) -> ServiceResult<Uuid>;

    async fn delete(&self, uow: &mut dyn UnitOfWork, user_id: Uuid) -> ServiceResult<()>;
}

/// Email + argon2 password credentials kept in the `users` table.
#[derive(Debug, Clone, Default)]
pub struct PasswordIdentityProvider;

impl PasswordIdentityProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityProvider for PasswordIdentityProvider {
    async fn register(
        &self,
        uow: &mut dyn UnitOfWork,
        email: &str,
        password: &str,
        role: Role,
    ) -> ServiceResult<Uuid> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::UserRegister(format!(
                "'{email}' is not a valid email address"
            )));
        }
        password::validate(password).map_err(ServiceError::UserRegister)?;

        if uow.credentials().find_by_email(email).await?.is_some() {
            return Err(ServiceError::UserRegister(format!(
                "A user with email '{email}' already exists"
            )));
        }

        let password_hash = password::hash(password).map_err(ServiceError::UserRegister)?;
        let id = Uuid::now_v7();
        uow.credentials()
            .add(Credential {
                id,
                email: email.to_string(),
                password_hash,
                role: role.as_str().to_string(),
                created_at: Utc::now(),
            })
            .await?;

        tracing::debug!("Staged credential {id} for {email}");
        Ok(id)
    }

    async fn delete(&self, uow: &mut dyn UnitOfWork, user_id: Uuid) -> ServiceResult<()> {
        uow.credentials().remove(user_id).await?;
        Ok(())
    }
}
