pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::PipelineStore;
use crate::error::Result;
use crate::services::{
    candidate_service::CandidateService, file_service::FileService, metrics_service::MetricsService,
    organization_service::OrganizationService, query_cache::QueryCache, seed_service::SeedService,
    stage_service::StageService,
};
use crate::storage::BlobStorage;
use crate::utils::signed_url::{UrlSigner, DOWNLOAD_ROUTE};

#[derive(Clone)]
pub struct AppState {
    pub candidate_service: CandidateService,
    pub stage_service: StageService,
    pub metrics_service: MetricsService,
    pub seed_service: SeedService,
    pub file_service: FileService,
    pub organization_service: OrganizationService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        blobs: Arc<dyn BlobStorage>,
        signer: UrlSigner,
        metrics_utc_offset_minutes: i32,
    ) -> Result<Self> {
        let cache = QueryCache::new();
        let candidate_service = CandidateService::new(store.clone(), cache.clone());
        let stage_service = StageService::new(store.clone(), cache.clone());
        let metrics_service = MetricsService::new(candidate_service.clone(), metrics_utc_offset_minutes)?;
        let seed_service = SeedService::new(store.clone(), cache.clone());
        let file_service = FileService::new(store.clone(), blobs, signer, cache);
        let organization_service = OrganizationService::new(store);

        Ok(Self {
            candidate_service,
            stage_service,
            metrics_service,
            seed_service,
            file_service,
            organization_service,
        })
    }

    /// State wired from the loaded [`config::Config`].
    pub fn from_config(store: Arc<dyn PipelineStore>, blobs: Arc<dyn BlobStorage>) -> Result<Self> {
        let config = config::get_config();
        let signer = UrlSigner::new(
            config.storage_signing_secret.as_bytes(),
            config.public_base_url.clone(),
            config.signed_url_ttl_secs,
        );
        Self::new(store, blobs, signer, config.metrics_utc_offset_minutes)
    }
}

/// Full HTTP surface. Everything under `/api` except the signed download
/// and the OpenAPI document sits behind bearer auth.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    let open_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route(DOWNLOAD_ROUTE, get(routes::files::download_file))
        .route("/api/openapi.json", get(routes::openapi::openapi_json));

    let api = Router::new()
        .route(
            "/api/organizations/bootstrap",
            post(routes::organizations::bootstrap_organization),
        )
        .route(
            "/api/organizations/current",
            get(routes::organizations::current_organization),
        )
        .route(
            "/api/organizations/:org_id/settings",
            get(routes::organizations::get_settings),
        )
        .route(
            "/api/organizations/:org_id/settings/onboarding-seen",
            post(routes::organizations::mark_onboarding_seen),
        )
        .route(
            "/api/organizations/:org_id/candidates",
            get(routes::candidates::list_candidates).post(routes::candidates::create_candidate),
        )
        .route(
            "/api/organizations/:org_id/candidates/count",
            get(routes::candidates::count_candidates),
        )
        .route(
            "/api/organizations/:org_id/candidates/demo",
            post(routes::candidates::seed_demo_candidates),
        )
        .route(
            "/api/organizations/:org_id/candidates/:id",
            get(routes::candidates::get_candidate_profile),
        )
        .route(
            "/api/organizations/:org_id/candidates/:id/files",
            post(routes::files::upload_file),
        )
        .route(
            "/api/organizations/:org_id/metrics",
            get(routes::dashboard::get_metrics),
        )
        .route(
            "/api/organizations/:org_id/board",
            get(routes::dashboard::get_board),
        )
        .route(
            "/api/candidates/:id",
            put(routes::candidates::update_candidate).delete(routes::candidates::delete_candidate),
        )
        .route(
            "/api/candidates/:id/stage",
            patch(routes::candidates::move_candidate_stage),
        )
        .route("/api/candidates/:id/notes", post(routes::candidates::add_note))
        .route("/api/files/url", get(routes::files::get_file_url))
        .layer(axum::middleware::from_fn(middleware::auth::require_bearer_auth));

    open_routes
        .merge(api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
