//! Grant a role to an existing user.

use chrono::NaiveDateTime;
use tracing::info;

use crate::errors::{KeeperError, KeeperResult};
use crate::models::{Role, User};
use crate::store::UserStore;
use crate::validation::{validate_email, validate_not_empty};

/// Set the role of the user registered under `email`.
///
/// Returns the updated user, or `NotFound` if no user has that e-mail.
pub async fn assign_role(
    store: &dyn UserStore,
    email: &str,
    role: &str,
    now: NaiveDateTime,
) -> KeeperResult<User> {
    validate_email(email, "email")?;
    validate_not_empty(role, "role")?;
    let role: Role = role.parse()?;

    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| KeeperError::NotFound(format!("user with email {email}")))?;

    if user.role == role {
        info!("User {} already has role {}", email, role);
        return Ok(user);
    }

    let updated = store
        .set_user_role(&user.id, role, now)
        .await?
        .ok_or_else(|| KeeperError::NotFound(format!("user {}", user.id)))?;

    info!(
        user_id = %updated.id,
        previous = %user.role,
        "Assigned role {} to {}",
        role,
        email
    );

    Ok(updated)
}
