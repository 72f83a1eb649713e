pub mod admin_service;
pub mod reconcile_service;
