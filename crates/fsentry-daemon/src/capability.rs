//! Startup precondition: the credential must be allowed to suppress.

use anyhow::{bail, Context, Result};
use fsentry_wiki::{RevisionRepository, UserInfo, SUPPRESS_RIGHT};
use tracing::info;

pub async fn check_capability<R: RevisionRepository + ?Sized>(repo: &R) -> Result<UserInfo> {
    let user = repo
        .user_info()
        .await
        .context("CAPABILITY_CHECK_FAILED: could not query account rights")?;

    if !user.can_suppress() {
        bail!(
            "CAPABILITY_MISSING: account '{}' lacks the '{}' right",
            user.name,
            SUPPRESS_RIGHT
        );
    }

    info!(user = %user.name, "suppression capability verified");
    Ok(user)
}
