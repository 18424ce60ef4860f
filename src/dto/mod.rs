pub mod candidate_dto;
pub mod organization_dto;
