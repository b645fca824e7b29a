use crate::middleware::cookie_policy::{CONSENT_COOKIE, CONSENT_GRANTED};
use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use time::Duration;

#[derive(Debug, Serialize)]
pub struct ErrorViewModel {
    pub request_id: Option<String>,
    pub show_request_id: bool,
    pub message: &'static str,
}

impl ErrorViewModel {
    pub fn new(request_id: Option<String>) -> Self {
        Self {
            show_request_id: request_id.is_some(),
            request_id,
            message: "An error occurred while processing your request.",
        }
    }

    pub fn request_id_of(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// GET /Home/Error
pub async fn error(headers: HeaderMap) -> impl IntoResponse {
    Json(ErrorViewModel::new(ErrorViewModel::request_id_of(&headers)))
}

/// POST /Home/Consent -> records cookie consent for a year.
pub async fn consent(jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build(Cookie::new(CONSENT_COOKIE, CONSENT_GRANTED))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(Duration::days(365))
        .build();
    (jar.add(cookie), StatusCode::NO_CONTENT)
}
