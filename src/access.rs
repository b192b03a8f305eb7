use casbin::{CoreApi, Enforcer};

use crate::error::ApiError;
use crate::model::User;

pub const ADMIN: &str = "admin";
pub const ACCOUNT: &str = "account";

/// Policy subject for `user`. Only the superuser flag decides it; the role
/// column plays no part in access checks.
pub fn subject(user: &User) -> &'static str {
    if user.is_superuser {
        "superuser"
    } else {
        "user"
    }
}

/// Model and policy paths are kept for the life of the process.
pub async fn load_enforcer(
    model: &'static str,
    policy: &'static str,
) -> casbin::Result<Enforcer> {
    Enforcer::new(model, policy).await
}

pub fn require(enforcer: &Enforcer, user: &User, area: &str) -> Result<(), ApiError> {
    if enforcer
        .enforce((subject(user), area, "access"))
        .unwrap_or_default()
    {
        Ok(())
    } else {
        tracing::debug!("{} denied access to {}", user.email, area);
        Err(ApiError::PermissionDenied)
    }
}

pub fn require_admin(enforcer: &Enforcer, user: &User) -> Result<(), ApiError> {
    require(enforcer, user, ADMIN)
}

#[cfg(test)]
pub async fn test_enforcer() -> Enforcer {
    load_enforcer(
        concat!(env!("CARGO_MANIFEST_DIR"), "/acl/model.conf"),
        concat!(env!("CARGO_MANIFEST_DIR"), "/acl/policy.csv"),
    )
    .await
    .unwrap()
}
