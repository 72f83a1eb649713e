use anyhow::{Context, Result};
use tollgate_db::services::admin_service::AdminService;

pub fn hash_password(password: &str) -> Result<()> {
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")?;
    println!("{}", hash);
    println!("Set this as admin_password_hash in panel.toml or ADMIN_PASSWORD_HASH in .env");
    Ok(())
}

pub async fn mark_paid(admin: &AdminService, user_id: i64) -> Result<()> {
    admin
        .force_mark_paid_and_fulfilled(user_id)
        .await
        .with_context(|| format!("Failed to mark user {} as paid", user_id))?;
    println!("User {} marked as paid and fulfilled.", user_id);
    Ok(())
}

pub async fn delete_user(admin: &AdminService, user_id: i64) -> Result<()> {
    let freed = admin
        .delete_user(user_id)
        .await
        .with_context(|| format!("Failed to delete user {}", user_id))?;
    match freed {
        Some(session_id) => println!("User {} deleted. Session {} is free again.", user_id, session_id),
        None => println!("User {} deleted.", user_id),
    }
    Ok(())
}

pub async fn bind(admin: &AdminService, user_id: i64, session_id: &str) -> Result<()> {
    admin
        .force_bind(user_id, session_id)
        .await
        .with_context(|| format!("Failed to bind user {} to {}", user_id, session_id))?;
    println!("User {} bound to session {}.", user_id, session_id);
    Ok(())
}

pub async fn list_users(admin: &AdminService) -> Result<()> {
    let users = admin.list_users().await?;
    println!("{:<14} {:<24} {:<40} {:<9} {}", "USER", "NAME", "SESSION", "FULFILLED", "DELIVERED");
    for user in users {
        println!(
            "{:<14} {:<24} {:<40} {:<9} {}",
            user.user_id,
            user.label(),
            user.bound_session_id.as_deref().unwrap_or("-"),
            user.fulfilled,
            user.delivered
        );
    }
    Ok(())
}
