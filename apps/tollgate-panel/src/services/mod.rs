pub mod session_service;
pub mod stripe;
pub mod webhook_service;
