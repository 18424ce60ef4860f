use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dto::candidate_dto::CandidateFiltersInput;
use crate::error::Result;
use crate::middleware::auth::CurrentActor;
use crate::services::filter_compiler;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/metrics",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Stage totals, weekly intake and conversion rate", body = Metrics),
        (status = 404, description = "Organization not found")
    )
)]
#[axum::debug_handler]
pub async fn get_metrics(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.organization_service.require_member(actor.as_ref(), org_id).await?;
    let metrics = state.metrics_service.organization_metrics(org_id).await?;
    Ok(Json(metrics))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/board",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Candidates grouped into the six stage columns"),
        (status = 400, description = "Invalid filter"),
        (status = 404, description = "Organization not found")
    )
)]
#[axum::debug_handler]
pub async fn get_board(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
    Query(input): Query<CandidateFiltersInput>,
) -> Result<impl IntoResponse> {
    state.organization_service.require_member(actor.as_ref(), org_id).await?;
    let filter = filter_compiler::compile(&input)?;
    let board = state.metrics_service.organization_board(org_id, Some(&filter)).await?;
    Ok(Json(board))
}
