//! Token maintenance commands

use super::open_state;
use crate::config::Config;
use crate::services::SweepRequest;

pub async fn cmd_list_tokens(config: &Config, username: Option<&str>) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    let tokens = state.account_service.list_tokens(username).await?;

    if tokens.is_empty() {
        match username {
            Some(name) => println!("No tokens for user '{name}'."),
            None => println!("No tokens issued."),
        }
        return Ok(());
    }

    println!("API Tokens ({} total)", tokens.len());
    println!("{:-<78}", "");

    for token in &tokens {
        let status = if token.is_expired { "expired" } else { "active" };
        let last_used = token
            .last_used
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());

        println!(
            "{:>5}  {:<20} {:<12} {:<8} {}",
            token.id, token.username, token.masked_key, status, token.device_name
        );
        println!(
            "       created {} | expires {} | last used {}",
            token.created_at.format("%Y-%m-%d %H:%M"),
            token.expires_at.format("%Y-%m-%d %H:%M"),
            last_used
        );
    }

    Ok(())
}

pub async fn cmd_sweep_tokens(
    config: &Config,
    expired: bool,
    idle_days: Option<u32>,
) -> anyhow::Result<()> {
    if !expired && idle_days.is_none() {
        println!("Nothing to sweep. Pass --expired and/or --idle-days <N>.");
        println!("Example: helpdesk tokens sweep --expired --idle-days {}", config.tokens.idle_days);
        return Ok(());
    }

    let state = open_state(config).await?;
    let report = state
        .account_service
        .sweep_tokens(SweepRequest { expired, idle_days })
        .await?;

    if expired {
        println!("✓ Removed {} expired token(s)", report.expired_removed);
    }
    if let Some(days) = idle_days {
        println!(
            "✓ Removed {} token(s) idle for more than {days} day(s)",
            report.idle_removed
        );
    }

    Ok(())
}

pub async fn cmd_revoke_tokens(config: &Config, username: &str) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    let summary = state
        .account_service
        .revoke_tokens_by_username(username)
        .await?;

    println!(
        "✓ Revoked {} token(s) and {} legacy token(s) for '{username}'",
        summary.tokens, summary.legacy_tokens
    );
    Ok(())
}

pub async fn cmd_issue_legacy_tokens(config: &Config) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    let created = state.account_service.issue_missing_legacy_tokens().await?;

    if created == 0 {
        println!("Every user already has a legacy token.");
    } else {
        println!("✓ Created {created} legacy token(s)");
    }
    Ok(())
}
