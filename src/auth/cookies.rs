//! Browser-side credential cookies.

use axum::http::{HeaderMap, HeaderValue, header};
use tower_sessions::cookie::{Cookie, SameSite};

use crate::db::User;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";
pub const USER_ID_COOKIE: &str = "user_id";
pub const USER_ROLE_COOKIE: &str = "user_role";
pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";

/// Max age of the credential cookies.
pub const COOKIE_MAX_AGE_DAYS: i64 = 7;

/// Find a cookie value in the request `Cookie` header(s).
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// `auth_token` is HttpOnly; `user_id` and `user_role` are readable by
    /// page scripts.
    #[must_use]
    pub fn login_cookies(self, token_key: &str, user: &User) -> Vec<Cookie<'static>> {
        vec![
            self.build(AUTH_TOKEN_COOKIE, token_key.to_string(), true),
            self.build(USER_ID_COOKIE, user.id.to_string(), false),
            self.build(USER_ROLE_COOKIE, user.role.to_string(), false),
        ]
    }

    #[must_use]
    pub fn token_cookie(self, token_key: &str) -> Cookie<'static> {
        self.build(AUTH_TOKEN_COOKIE, token_key.to_string(), true)
    }

    fn build(self, name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
            .build()
    }
}

/// Expired, empty cookie that makes the browser drop `name`.
#[must_use]
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// The credential cookies cleared by logout. `sessionid` is left to the
/// session layer, which expires it when the session is flushed.
#[must_use]
pub fn logout_removals(include_csrf: bool) -> Vec<Cookie<'static>> {
    let mut cookies = vec![
        removal(AUTH_TOKEN_COOKIE),
        removal(USER_ID_COOKIE),
        removal(USER_ROLE_COOKIE),
    ];
    if include_csrf {
        cookies.push(removal(CSRF_COOKIE));
    }
    cookies
}

pub fn append_set_cookies<I>(headers: &mut HeaderMap, cookies: I)
where
    I: IntoIterator<Item = Cookie<'static>>,
{
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}
