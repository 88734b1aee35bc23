use std::sync::Arc;

use crate::auth::identity::IdentityProvider;
use crate::config::BootstrapConfig;
use crate::db::{complete_transaction, Store, UnitOfWork};
use crate::error::ServiceResult;
use crate::models::{NewCompany, NewPerson, Role};

/// Create the company and the default admin person unless they already exist.
pub async fn ensure_defaults(
    store: &Arc<dyn Store>,
    identity: &Arc<dyn IdentityProvider>,
    bootstrap: &BootstrapConfig,
) -> ServiceResult<()> {
    let mut uow = store.unit_of_work().await?;
    uow.begin_transaction().await?;
    let outcome = seed(uow.as_mut(), identity.as_ref(), bootstrap).await;
    complete_transaction(uow.as_mut(), outcome).await
}

async fn seed(
    uow: &mut dyn UnitOfWork,
    identity: &dyn IdentityProvider,
    bootstrap: &BootstrapConfig,
) -> ServiceResult<()> {
    let company_id = match uow.companies().get_first().await? {
        Some(company) => company.id,
        None => {
            let id = uow
                .companies()
                .add(NewCompany {
                    name: bootstrap.company_name.trim().to_string(),
                })
                .await?;
            uow.save_changes().await?;
            tracing::info!("Created company '{}' ({id})", bootstrap.company_name);
            id
        }
    };

    if uow.persons().get_default().await?.is_some() {
        return Ok(());
    }

    let user_id = identity
        .register(
            uow,
            &bootstrap.admin_email,
            &bootstrap.admin_password,
            Role::Admin,
        )
        .await?;
    let person_id = uow
        .persons()
        .add(NewPerson {
            name: bootstrap.admin_name.trim().to_string(),
            user_id,
            company_id,
            is_default: true,
        })
        .await?;
    uow.save_changes().await?;

    tracing::info!(
        "Created default person {person_id} for {}",
        bootstrap.admin_email
    );
    Ok(())
}
