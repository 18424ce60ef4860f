use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dto::candidate_dto::{
    AddNotePayload, CandidateCountResponse, CandidateFiltersInput, CandidateListResponse,
    CreateCandidatePayload, MoveStagePayload, UpdateCandidatePayload,
};
use crate::error::Result;
use crate::middleware::auth::CurrentActor;
use crate::services::filter_compiler;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/candidates",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("search" = Option<String>, Query, description = "Case-insensitive name substring"),
        ("stage" = Option<String>, Query, description = "Stage token"),
        ("salaryMin" = Option<String>, Query, description = "Inclusive lower salary bound"),
        ("salaryMax" = Option<String>, Query, description = "Inclusive upper salary bound"),
        ("createdFrom" = Option<String>, Query, description = "YYYY-MM-DD or RFC 3339"),
        ("createdTo" = Option<String>, Query, description = "YYYY-MM-DD or RFC 3339"),
        ("page" = Option<String>, Query, description = "Page number, from 1"),
        ("perPage" = Option<String>, Query, description = "Items per page, up to 100")
    ),
    responses(
        (status = 200, description = "Matching candidates, newest first", body = CandidateListResponse),
        (status = 400, description = "Invalid filter"),
        (status = 404, description = "Organization not found")
    )
)]
#[axum::debug_handler]
pub async fn list_candidates(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
    Query(input): Query<CandidateFiltersInput>,
) -> Result<impl IntoResponse> {
    state.organization_service.require_member(actor.as_ref(), org_id).await?;
    let filter = filter_compiler::compile(&input)?;
    let list = state.candidate_service.list_candidates(org_id, Some(&filter)).await?;
    Ok(Json(CandidateListResponse::from(list)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/candidates/count",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Number of candidates", body = CandidateCountResponse),
        (status = 404, description = "Organization not found")
    )
)]
#[axum::debug_handler]
pub async fn count_candidates(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.organization_service.require_member(actor.as_ref(), org_id).await?;
    let total = state.candidate_service.get_candidates_count(org_id).await?;
    Ok(Json(CandidateCountResponse {
        organization_id: org_id,
        total,
    }))
}

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/candidates",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateCandidatePayload,
    responses(
        (status = 201, description = "Candidate created", body = Candidate),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Organization not found")
    )
)]
#[axum::debug_handler]
pub async fn create_candidate(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateCandidatePayload>,
) -> Result<impl IntoResponse> {
    let candidate = state
        .candidate_service
        .create_candidate(actor.as_ref(), org_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(candidate)))
}

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/candidates/demo",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 201, description = "Demo candidates inserted"),
        (status = 412, description = "Pipeline not empty")
    )
)]
#[axum::debug_handler]
pub async fn seed_demo_candidates(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let candidates = state
        .seed_service
        .seed_demo_candidates(actor.as_ref(), org_id)
        .await?;
    Ok((StatusCode::CREATED, Json(candidates)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/candidates/{id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("id" = Uuid, Path, description = "Candidate ID")
    ),
    responses(
        (status = 200, description = "Candidate with notes, activity and files", body = CandidateProfile),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn get_candidate_profile(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    state.organization_service.require_member(actor.as_ref(), org_id).await?;
    let profile = state.candidate_service.get_candidate_profile(org_id, id).await?;
    Ok(Json(profile))
}

#[utoipa::path(
    put,
    path = "/api/candidates/{id}",
    params(("id" = Uuid, Path, description = "Candidate ID")),
    request_body = UpdateCandidatePayload,
    responses(
        (status = 200, description = "Candidate updated", body = Candidate),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Candidate not found"),
        (status = 409, description = "Version mismatch")
    )
)]
#[axum::debug_handler]
pub async fn update_candidate(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCandidatePayload>,
) -> Result<impl IntoResponse> {
    let candidate = state
        .candidate_service
        .update_candidate(actor.as_ref(), id, payload)
        .await?;
    Ok(Json(candidate))
}

#[utoipa::path(
    patch,
    path = "/api/candidates/{id}/stage",
    params(("id" = Uuid, Path, description = "Candidate ID")),
    request_body = MoveStagePayload,
    responses(
        (status = 200, description = "Candidate after the move", body = Candidate),
        (status = 400, description = "Unknown stage"),
        (status = 404, description = "Candidate not found"),
        (status = 409, description = "Version mismatch")
    )
)]
#[axum::debug_handler]
pub async fn move_candidate_stage(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveStagePayload>,
) -> Result<impl IntoResponse> {
    let candidate = state
        .stage_service
        .move_candidate_stage(actor.as_ref(), id, &payload.stage, payload.expected_version)
        .await?;
    Ok(Json(candidate))
}

#[utoipa::path(
    delete,
    path = "/api/candidates/{id}",
    params(("id" = Uuid, Path, description = "Candidate ID")),
    responses(
        (status = 204, description = "Candidate deleted"),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_candidate(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.candidate_service.delete_candidate(actor.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/candidates/{id}/notes",
    params(("id" = Uuid, Path, description = "Candidate ID")),
    request_body = AddNotePayload,
    responses(
        (status = 201, description = "Note added", body = Note),
        (status = 400, description = "Empty note"),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn add_note(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNotePayload>,
) -> Result<impl IntoResponse> {
    let note = state
        .candidate_service
        .add_note(actor.as_ref(), id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}
