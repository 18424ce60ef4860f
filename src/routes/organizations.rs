use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde_json::json;
use uuid::Uuid;

use crate::dto::organization_dto::BootstrapOrganizationPayload;
use crate::error::Result;
use crate::middleware::auth::CurrentActor;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/organizations/bootstrap",
    request_body = BootstrapOrganizationPayload,
    responses(
        (status = 201, description = "Organization created with the caller as owner", body = Organization),
        (status = 400, description = "Invalid name or malformed body")
    )
)]
#[axum::debug_handler]
pub async fn bootstrap_organization(
    State(state): State<AppState>,
    actor: CurrentActor,
    body: Bytes,
) -> Result<impl IntoResponse> {
    // Only an empty body falls back to the default name.
    let payload: BootstrapOrganizationPayload = if body.iter().all(u8::is_ascii_whitespace) {
        BootstrapOrganizationPayload::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let organization = state
        .organization_service
        .bootstrap(actor.as_ref(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/current",
    responses((status = 200, description = "Caller's first organization, or null"))
)]
#[axum::debug_handler]
pub async fn current_organization(
    State(state): State<AppState>,
    actor: CurrentActor,
) -> Result<impl IntoResponse> {
    let organization = state
        .organization_service
        .current_organization(actor.as_ref())
        .await?;
    Ok(Json(json!({ "organization": organization })))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/settings",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization settings", body = OrganizationSettings),
        (status = 404, description = "Organization not found")
    )
)]
#[axum::debug_handler]
pub async fn get_settings(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let settings = state
        .organization_service
        .get_settings(actor.as_ref(), org_id)
        .await?;
    Ok(Json(settings))
}

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/settings/onboarding-seen",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Updated settings", body = OrganizationSettings),
        (status = 404, description = "Organization not found")
    )
)]
#[axum::debug_handler]
pub async fn mark_onboarding_seen(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let settings = state
        .organization_service
        .mark_demo_onboarding_seen(actor.as_ref(), org_id)
        .await?;
    Ok(Json(settings))
}
