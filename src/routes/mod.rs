pub mod candidates;
pub mod dashboard;
pub mod files;
pub mod health;
pub mod organizations;
pub mod openapi;
