pub mod access;
pub mod candidate_service;
pub mod file_service;
pub mod filter_compiler;
pub mod metrics_service;
pub mod organization_service;
pub mod query_cache;
pub mod seed_service;
pub mod stage_service;
