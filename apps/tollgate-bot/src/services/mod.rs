pub mod delivery;
pub mod guide_service;
