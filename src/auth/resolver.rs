//! Turns request credentials into a user.
//!
//! Sources are tried in a fixed order (header, cookie, query/form parameter,
//! native session) and the first one that resolves wins. Lookup failures of
//! any kind mean "not authenticated"; they are logged and never surfaced.

use std::fmt;

use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cookies::{AUTH_TOKEN_COOKIE, read_cookie};
use crate::db::{AuthToken, Store, User, mask_key};

/// Exact, case-sensitive prefix of the `Authorization` header.
pub const TOKEN_HEADER_PREFIX: &str = "Token ";

/// Query parameter / form field carrying a token.
pub const TOKEN_PARAM: &str = "token";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    Header,
    Cookie,
    Param,
    Session,
}

impl TokenSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Param => "param",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw credentials found on a request, before any lookup.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub header: Option<String>,
    pub cookie: Option<String>,
    pub param: Option<String>,
    pub session_user_id: Option<i32>,
}

impl Credentials {
    /// Header and cookie candidates; parameter and session are filled in by
    /// the caller, which owns the body and the session.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            header: header_token(headers),
            cookie: read_cookie(headers, AUTH_TOKEN_COOKIE),
            ..Self::default()
        }
    }

    /// Token candidates in resolution order.
    pub fn candidates(&self) -> impl Iterator<Item = (TokenSource, &str)> {
        [
            (TokenSource::Header, self.header.as_deref()),
            (TokenSource::Cookie, self.cookie.as_deref()),
            (TokenSource::Param, self.param.as_deref()),
        ]
        .into_iter()
        .filter_map(|(source, key)| key.map(|key| (source, key)))
    }
}

#[must_use]
pub fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(TOKEN_HEADER_PREFIX))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

/// First `token` pair of an urlencoded string (query string or form body).
#[must_use]
pub fn token_param(encoded: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(name, _)| name == TOKEN_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A resolved caller.
#[derive(Clone, Debug)]
pub struct Identity {
    pub user: User,
    pub source: TokenSource,
    /// Bearer token that authenticated the request, after any refresh.
    pub token: Option<AuthToken>,
    /// Set when an expired token was renewed during this request.
    pub refreshed_key: Option<String>,
}

impl Identity {
    /// Whether to mirror this identity into a server-side session. Header
    /// clients never send `sessionid` back, so they only get one when the
    /// request already carries a session cookie.
    #[must_use]
    pub const fn wants_session(&self, has_session_cookie: bool) -> bool {
        match self.source {
            TokenSource::Session => false,
            TokenSource::Header => has_session_cookie,
            TokenSource::Cookie | TokenSource::Param => true,
        }
    }
}

/// Result of looking up one key.
#[derive(Clone, Debug)]
pub struct KeyMatch {
    pub user: User,
    pub token: Option<AuthToken>,
    pub refreshed: bool,
}

/// Read-only view of a key for diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct KeyReport {
    pub masked_key: String,
    pub found_in: Option<&'static str>,
    pub username: Option<String>,
    pub is_expired: Option<bool>,
    pub user_active: Option<bool>,
}

#[derive(Clone)]
pub struct TokenResolver {
    store: Store,
    lifetime: Duration,
}

impl TokenResolver {
    #[must_use]
    pub const fn new(store: Store, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    pub async fn resolve(&self, credentials: &Credentials) -> Option<Identity> {
        for (source, key) in credentials.candidates() {
            if let Some(found) = self.resolve_key(key).await {
                debug!(source = %source, key = %mask_key(key), user_id = found.user.id, "Token resolved");
                let refreshed_key = found
                    .refreshed
                    .then(|| found.token.as_ref().map(|t| t.key.clone()))
                    .flatten();
                return Some(Identity {
                    user: found.user,
                    source,
                    token: found.token,
                    refreshed_key,
                });
            }
            debug!(source = %source, key = %mask_key(key), "Token candidate rejected");
        }

        let user_id = credentials.session_user_id?;
        match self.store.get_user(user_id).await {
            Ok(Some(user)) if user.is_active => Some(Identity {
                user,
                source: TokenSource::Session,
                token: None,
                refreshed_key: None,
            }),
            Ok(_) => None,
            Err(e) => {
                warn!(user_id, error = %e, "Session user lookup failed");
                None
            }
        }
    }

    /// Resolve one key against the primary table, then the legacy table.
    pub async fn resolve_key(&self, key: &str) -> Option<KeyMatch> {
        match self.lookup(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %mask_key(key), error = %e, "Token lookup failed");
                None
            }
        }
    }

    async fn lookup(&self, key: &str) -> anyhow::Result<Option<KeyMatch>> {
        if let Some(token) = self.store.find_token(key).await? {
            if !token.is_active {
                return Ok(None);
            }

            let (token, refreshed) = if token.is_expired(Utc::now()) {
                let renewed = self.store.refresh_token(&token, self.lifetime).await?;
                info!(
                    token_id = renewed.id,
                    user_id = renewed.user_id,
                    old_key = %mask_key(key),
                    new_key = %renewed.masked_key(),
                    "Expired token refreshed"
                );
                metrics::counter!("auth_token_refreshed_total").increment(1);
                (renewed, true)
            } else {
                (token, false)
            };

            if let Err(e) = self.store.mark_token_used(token.id).await {
                warn!(token_id = token.id, error = %e, "Failed to stamp token use");
            }

            let user = self.store.get_user(token.user_id).await?;
            return Ok(user.filter(|u| u.is_active).map(|user| KeyMatch {
                user,
                token: Some(token),
                refreshed,
            }));
        }

        if let Some(user_id) = self.store.user_id_for_legacy_token(key).await? {
            let user = self.store.get_user(user_id).await?;
            return Ok(user.filter(|u| u.is_active).map(|user| KeyMatch {
                user,
                token: None,
                refreshed: false,
            }));
        }

        Ok(None)
    }

    /// Describe a key without refreshing or stamping it.
    pub async fn inspect(&self, key: &str) -> KeyReport {
        let mut report = KeyReport {
            masked_key: mask_key(key),
            found_in: None,
            username: None,
            is_expired: None,
            user_active: None,
        };

        if let Err(e) = self.fill_report(key, &mut report).await {
            warn!(key = %report.masked_key, error = %e, "Token inspection failed");
        }
        report
    }

    async fn fill_report(&self, key: &str, report: &mut KeyReport) -> anyhow::Result<()> {
        let (table, user_id, expired) = if let Some(token) = self.store.find_token(key).await? {
            ("auth_tokens", token.user_id, Some(token.is_expired(Utc::now())))
        } else if let Some(user_id) = self.store.user_id_for_legacy_token(key).await? {
            ("legacy_tokens", user_id, None)
        } else {
            return Ok(());
        };

        report.found_in = Some(table);
        report.is_expired = expired;
        if let Some(user) = self.store.get_user(user_id).await? {
            report.username = Some(user.username);
            report.user_active = Some(user.is_active);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_prefix_is_case_sensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc123"));
        assert_eq!(header_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("token abc123"));
        assert_eq!(header_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(header_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token "));
        assert_eq!(header_token(&headers), None);
    }

    #[test]
    fn candidates_follow_priority_order() {
        let credentials = Credentials {
            header: Some("h".to_string()),
            cookie: Some("c".to_string()),
            param: Some("p".to_string()),
            session_user_id: Some(1),
        };
        let order: Vec<_> = credentials.candidates().collect();
        assert_eq!(
            order,
            vec![
                (TokenSource::Header, "h"),
                (TokenSource::Cookie, "c"),
                (TokenSource::Param, "p"),
            ]
        );
    }

    #[test]
    fn credentials_from_headers_reads_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("auth_token=cookie-key"));
        let credentials = Credentials::from_headers(&headers);
        assert_eq!(credentials.header, None);
        assert_eq!(credentials.cookie.as_deref(), Some("cookie-key"));
    }

    #[test]
    fn token_param_decodes_urlencoded_pairs() {
        assert_eq!(token_param(b"a=1&token=abc%2Bdef").as_deref(), Some("abc+def"));
        assert_eq!(token_param(b"a=1&token="), None);
        assert_eq!(token_param(b""), None);
    }
}
