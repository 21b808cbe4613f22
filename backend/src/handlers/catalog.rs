//! Catalog cache administration

use axum::extract::State;

use super::extract::OptionalJson;
use super::{ok, Envelope};
use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::catalog::{CatalogInvalidation, InvalidationReport};
use crate::AppState;

/// Drop cached catalog entries; an empty body clears everything
pub async fn invalidate_catalog_cache(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    OptionalJson(request): OptionalJson<CatalogInvalidation>,
) -> AppResult<Envelope<InvalidationReport>> {
    check_permission(&user, "catalog", "manage")?;

    let cleared = state.catalog.invalidate(&request);

    tracing::info!(
        user_id = %user.user_id,
        everything = request.is_everything(),
        cleared,
        "Catalog cache invalidated"
    );
    Ok(ok(InvalidationReport { cleared }))
}
