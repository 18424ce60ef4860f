use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dto::candidate_dto::{FileUrlQuery, FileUrlResponse, SignedDownloadQuery};
use crate::error::{Error, Result};
use crate::middleware::auth::CurrentActor;
use crate::utils::validation::field_error;
use crate::AppState;

/// Accepts a multipart body with a single `file` part.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/candidates/{id}/files",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("id" = Uuid, Path, description = "Candidate ID")
    ),
    responses(
        (status = 201, description = "File stored", body = FileRecord),
        (status = 400, description = "Missing file part"),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn upload_file(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    while let Some(field) = multipart.next_field().await.map_err(Error::Multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        let record = state
            .file_service
            .upload_file(actor.as_ref(), org_id, id, &file_name, data)
            .await?;
        return Ok((StatusCode::CREATED, Json(record)));
    }
    Err(Error::Validation(field_error("file", "required", "a `file` part is required")))
}

#[utoipa::path(
    get,
    path = "/api/files/url",
    params(("path" = String, Query, description = "Storage path of the file")),
    responses(
        (status = 200, description = "Signed download link", body = FileUrlResponse),
        (status = 404, description = "File not found")
    )
)]
#[axum::debug_handler]
pub async fn get_file_url(
    State(state): State<AppState>,
    actor: CurrentActor,
    Query(query): Query<FileUrlQuery>,
) -> Result<impl IntoResponse> {
    let url = state
        .file_service
        .get_file_download_url(actor.as_ref(), &query.path)
        .await?;
    Ok(Json(FileUrlResponse {
        url,
        expires_in: state.file_service.url_ttl_secs(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/files/download",
    params(
        ("path" = String, Query, description = "Storage path"),
        ("expires" = i64, Query, description = "Unix expiry"),
        ("signature" = String, Query, description = "Hex HMAC")
    ),
    responses(
        (status = 200, description = "File bytes"),
        (status = 403, description = "Expired or invalid signature"),
        (status = 404, description = "File not found")
    )
)]
#[axum::debug_handler]
pub async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<SignedDownloadQuery>,
) -> Result<impl IntoResponse> {
    let bytes = state
        .file_service
        .download(&query.path, query.expires, &query.signature)
        .await?;
    let file_name = query.path.rsplit('/').next().unwrap_or("download").to_string();
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}
