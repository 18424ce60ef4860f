use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct BootstrapOrganizationPayload {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
}
