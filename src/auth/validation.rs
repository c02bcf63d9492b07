//! Input hygiene for credentials and account fields.

use std::sync::LazyLock;

use regex::Regex;

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const USERNAME_MIN_LEN: usize = 3;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex")
});

/// Trim and clamp. No escaping: usernames are matched verbatim on login.
#[must_use]
pub fn sanitize_username(raw: &str) -> String {
    clamp(raw.trim(), USERNAME_MAX_LEN).trim().to_string()
}

/// HTML-escape, clamp, trim.
#[must_use]
pub fn sanitize_input(raw: &str, max_len: usize) -> String {
    let escaped = html_escape::encode_text(raw);
    clamp(&escaped, max_len).trim().to_string()
}

fn clamp(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.chars().count() < USERNAME_MIN_LEN {
        return Err(format!(
            "Username must be at least {USERNAME_MIN_LEN} characters long."
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(
            "Username may only contain letters, digits, underscores (_) and hyphens (-)."
                .to_string(),
        );
    }

    Ok(())
}

/// Every rule the password breaks, in a fixed order. Empty means strong enough.
#[must_use]
pub fn validate_password_strength(password: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();

    if password.chars().count() < PASSWORD_MIN_LEN {
        errors.push("Password must be at least 8 characters long.");
    }
    if !password.chars().any(char::is_uppercase) {
        errors.push("Password must contain at least one uppercase letter.");
    }
    if !password.chars().any(char::is_lowercase) {
        errors.push("Password must contain at least one lowercase letter.");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one digit.");
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        errors.push("Password must contain at least one special character.");
    }

    errors
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err("Enter a valid email address.".to_string())
    }
}
