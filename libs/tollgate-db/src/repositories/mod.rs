pub mod payment_repo;
pub mod user_repo;
