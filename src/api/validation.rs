use super::ApiError;

/// Largest idle window an operator may sweep with, in days.
const MAX_IDLE_DAYS: u32 = 3650;

pub fn validate_user_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid user ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn validate_idle_days(days: u32) -> Result<u32, ApiError> {
    if days > MAX_IDLE_DAYS {
        return Err(ApiError::validation(format!(
            "Invalid idle window: {days}. Must be at most {MAX_IDLE_DAYS} days"
        )));
    }
    Ok(days)
}

/// Only local absolute paths may be used as redirect hints.
pub fn validate_redirect_hint(hint: &str) -> Result<&str, ApiError> {
    let trimmed = hint.trim();
    if trimmed.is_empty()
        || trimmed.contains("://")
        || trimmed.starts_with("//")
        || trimmed.chars().any(char::is_control)
    {
        return Err(ApiError::validation("Invalid redirect target"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id(1).is_ok());
        assert!(validate_user_id(0).is_err());
        assert!(validate_user_id(-4).is_err());
    }

    #[test]
    fn test_validate_idle_days() {
        assert!(validate_idle_days(0).is_ok());
        assert!(validate_idle_days(30).is_ok());
        assert!(validate_idle_days(100_000).is_err());
    }

    #[test]
    fn test_validate_redirect_hint() {
        assert_eq!(validate_redirect_hint("admin-panel").unwrap(), "admin-panel");
        assert!(validate_redirect_hint("https://evil.example").is_err());
        assert!(validate_redirect_hint("//evil.example").is_err());
        assert!(validate_redirect_hint("  ").is_err());
    }
}
