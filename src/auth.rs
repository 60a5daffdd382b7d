use std::sync::Arc;

use axum::{
    extract::{Form, Query, Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cmov::Cmov;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{AppState, templates};

pub const SESSION_COOKIE: &str = "seenema_session";

const SESSION_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub api_token: String,
    pub secure_cookies: bool,
}

/// Compares two byte strings without short-circuiting on the first difference.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    // length is not secret
    if a.len() != b.len() {
        return false;
    }

    let mut x = 1u8;
    a.iter().zip(b.iter()).for_each(|(l, r)| x.cmovnz(&0u8, l ^ r));
    x != 0u8
}

/// Local paths only, so a login link cannot bounce the user to another site.
pub fn is_valid_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.contains("://")
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    let token = state.auth.api_token.as_bytes();

    if let Some(header) = req.headers().get(AUTHORIZATION) {
        let presented = header
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .unwrap_or_default();
        if ct_eq(presented.as_bytes(), token) {
            return next.run(req).await;
        }
        warn!(path = %req.uri().path(), "rejected bearer token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let original = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let login = login_url(original);

    match jar.get(SESSION_COOKIE) {
        Some(cookie) if ct_eq(cookie.value().as_bytes(), token) => next.run(req).await,
        Some(_) => {
            debug!("clearing invalid session cookie");
            (jar.remove(removal_cookie()), Redirect::to(&login)).into_response()
        },
        None => Redirect::to(&login).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    redirect: Option<String>,
}

pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LoginQuery>,
) -> Html<String> {
    let redirect = q.redirect.unwrap_or_default();
    Html(templates::login_page(&state.assets, &redirect, None))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    token: String,
    #[serde(default)]
    redirect: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let token = form.token.trim();
    if !ct_eq(token.as_bytes(), state.auth.api_token.as_bytes()) {
        warn!("failed login attempt");
        let body = templates::login_page(&state.assets, &form.redirect, Some("Invalid token"));
        return (StatusCode::UNAUTHORIZED, Html(body)).into_response();
    }

    let target = if is_valid_redirect(&form.redirect) { form.redirect.as_str() } else { "/" };
    let cookie = Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.auth.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_DAYS));

    (jar.add(cookie), Redirect::to(target)).into_response()
}

pub async fn logout(jar: CookieJar) -> Response {
    (jar.remove(removal_cookie()), Redirect::to("/login")).into_response()
}

/// Login page that returns to `original` afterwards; the home page needs no parameter.
fn login_url(original: &str) -> String {
    if original == "/" {
        return "/login".to_string();
    }
    format!("/login?redirect={}", urlencoding::encode(original))
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_equality() {
        assert!(ct_eq(b"secret", b"secret"));
        assert!(!ct_eq(b"secret", b"secreT"));
        assert!(!ct_eq(b"secret", b"secrets"));
        assert!(!ct_eq(b"", b"x"));
        assert!(ct_eq(b"", b""));
    }

    #[test]
    fn login_url_keeps_non_root_targets() {
        assert_eq!(login_url("/"), "/login");
        assert_eq!(login_url("/groups/3"), "/login?redirect=%2Fgroups%2F3");
    }

    #[test]
    fn redirects_must_stay_local() {
        assert!(is_valid_redirect("/"));
        assert!(is_valid_redirect("/entries/abc?x=1"));
        assert!(!is_valid_redirect(""));
        assert!(!is_valid_redirect("//evil.example"));
        assert!(!is_valid_redirect("https://evil.example"));
        assert!(!is_valid_redirect("/\\evil.example"));
        assert!(!is_valid_redirect("entries"));
    }
}
