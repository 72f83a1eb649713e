pub mod auth;
pub mod dashboard;
pub mod users;

pub use auth::{get_login, login, logout, require_admin};
pub use dashboard::get_dashboard;
pub use users::{bind_user, delete_user, mark_paid};
