pub mod signed_url;
pub mod time;
pub mod validation;
