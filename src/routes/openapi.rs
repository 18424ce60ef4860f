use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::routes::{candidates, dashboard, files, health, organizations};

#[derive(OpenApi)]
#[openapi(
    info(title = "ATS pipeline API"),
    paths(
        health::health,
        organizations::bootstrap_organization,
        organizations::current_organization,
        organizations::get_settings,
        organizations::mark_onboarding_seen,
        candidates::list_candidates,
        candidates::count_candidates,
        candidates::create_candidate,
        candidates::seed_demo_candidates,
        candidates::get_candidate_profile,
        candidates::update_candidate,
        candidates::move_candidate_stage,
        candidates::delete_candidate,
        candidates::add_note,
        files::upload_file,
        files::get_file_url,
        files::download_file,
        dashboard::get_metrics,
        dashboard::get_board,
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
