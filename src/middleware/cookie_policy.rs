use axum::{
    extract::Request,
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::debug;

/// Cookie recording that the visitor accepted non-essential cookies.
pub const CONSENT_COOKIE: &str = ".AspNet.Consent";
pub const CONSENT_GRANTED: &str = "yes";

/// Cookies allowed before consent is given.
const ESSENTIAL_COOKIES: &[&str] = &[CONSENT_COOKIE];

/// Consent is required for every non-essential cookie. Until the consent
/// cookie is present, other `Set-Cookie` headers are removed from responses.
/// The minimum SameSite policy is `None`, so attributes are left as set.
pub async fn cookie_policy(jar: CookieJar, req: Request, next: Next) -> Response {
    let consented = jar
        .get(CONSENT_COOKIE)
        .is_some_and(|c| c.value() == CONSENT_GRANTED);
    let mut resp = next.run(req).await;
    if consented {
        return resp;
    }

    let headers = resp.headers_mut();
    let total = headers.get_all(SET_COOKIE).iter().count();
    if total == 0 {
        return resp;
    }
    let kept: Vec<HeaderValue> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter(|v| is_essential(v))
        .cloned()
        .collect();
    let dropped = total - kept.len();
    headers.remove(SET_COOKIE);
    for value in kept {
        headers.append(SET_COOKIE, value);
    }
    if dropped > 0 {
        debug!(dropped, "Suppressed non-essential cookies pending consent");
    }
    resp
}

fn is_essential(value: &HeaderValue) -> bool {
    value
        .to_str()
        .ok()
        .and_then(|s| Cookie::parse(s).ok())
        .is_some_and(|c| ESSENTIAL_COOKIES.contains(&c.name()))
}
