//! Account administration commands

use super::open_state;
use crate::config::Config;
use crate::entities::users::Role;

pub async fn cmd_create_admin(
    config: &Config,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    let user = state
        .account_service
        .create_admin(username, email, password)
        .await?;

    println!("✓ Created admin '{}' (ID: {})", user.username, user.id);
    println!("  Role: {} | Staff: yes | Superuser: yes", user.role);
    Ok(())
}

pub async fn cmd_fix_admin_role(config: &Config, username: &str) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    let user = state.account_service.fix_admin_role(username).await?;

    println!(
        "✓ '{}' is now role={} staff={} superuser={}",
        user.username, user.role, user.is_staff, user.is_superuser
    );
    Ok(())
}

pub async fn cmd_set_role(config: &Config, username: &str, role: Role) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    let user = state.account_service.set_role(username, role).await?;

    if user.role == role {
        println!("✓ '{}' now has role {}", user.username, user.role);
    } else {
        // Superusers are pinned to admin when saved.
        println!(
            "! '{}' is a superuser; role stays {}",
            user.username, user.role
        );
    }
    Ok(())
}
