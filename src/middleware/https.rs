use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header::STRICT_TRANSPORT_SECURITY},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use headers::{HeaderMapExt, Host};

/// Where plain HTTP requests are sent. `None` disables redirection.
#[derive(Debug, Clone, Copy)]
pub struct HttpsRedirect {
    pub https_port: Option<u16>,
}

pub async fn https_redirection(
    State(cfg): State<HttpsRedirect>,
    req: Request,
    next: Next,
) -> Response {
    let Some(port) = cfg.https_port else {
        return next.run(req).await;
    };
    if is_https(&req) {
        return next.run(req).await;
    }
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    match redirect_target(req.headers(), path_and_query, port) {
        Some(location) => Redirect::temporary(&location).into_response(),
        None => next.run(req).await,
    }
}

/// `Strict-Transport-Security` value sent on HTTPS responses.
#[derive(Debug, Clone)]
pub struct Hsts {
    pub header: HeaderValue,
}

impl Hsts {
    pub fn max_age(secs: u64) -> Self {
        Self {
            header: HeaderValue::from_str(&format!("max-age={secs}"))
                .unwrap_or(HeaderValue::from_static("max-age=2592000")),
        }
    }
}

/// Plain HTTP responses, redirects included, never carry the header.
pub async fn hsts(State(cfg): State<Hsts>, req: Request, next: Next) -> Response {
    let secure = is_https(&req);
    let mut resp = next.run(req).await;
    if secure {
        resp.headers_mut()
            .entry(STRICT_TRANSPORT_SECURITY)
            .or_insert(cfg.header);
    }
    resp
}

fn is_https(req: &Request) -> bool {
    if req.uri().scheme_str() == Some("https") {
        return true;
    }
    req.headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

fn redirect_target(headers: &HeaderMap, path_and_query: &str, port: u16) -> Option<String> {
    let host = headers.typed_get::<Host>()?;
    let hostname = host.hostname();
    if port == 443 {
        Some(format!("https://{hostname}{path_and_query}"))
    } else {
        Some(format!("https://{hostname}:{port}{path_and_query}"))
    }
}
