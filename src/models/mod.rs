pub mod activity_log;
pub mod actor;
pub mod candidate;
pub mod file;
pub mod note;
pub mod organization;
pub mod stage;
