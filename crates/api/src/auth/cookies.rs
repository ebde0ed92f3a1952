//! The `access_token` cookie set on login and refresh.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Build the http-only access-token cookie.
pub fn access_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Add the access-token cookie to `jar`.
pub fn set_access_cookie(jar: CookieJar, token: &str, max_age_secs: i64, secure: bool) -> CookieJar {
    jar.add(access_cookie(token.to_string(), max_age_secs, secure))
}

/// Expire the access-token cookie.
pub fn clear_access_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
}

/// Token from the cookie, ignoring placeholder values some clients send.
pub fn access_token_from(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty() && v != "undefined" && v != "null")
}
