pub mod db;
pub mod models;
pub mod repositories;
pub mod services;

pub use sqlx;
pub use db::{connect, connect_memory};
