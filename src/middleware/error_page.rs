use crate::error::ErrorDetail;
use crate::handlers::home::ErrorViewModel;
use axum::{
    Json,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

/// Development: error responses carry the full error text and request path.
pub async fn developer_exception_page(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let resp = next.run(req).await;
    let Some(ErrorDetail(detail)) = resp.extensions().get::<ErrorDetail>().cloned() else {
        return resp;
    };

    let status = resp.status();
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "status": status.canonical_reason().unwrap_or("UNKNOWN"),
                "message": detail,
            },
            "path": path,
        })),
    )
        .into_response()
}

/// Production: server errors are logged and answered with the generic error page.
pub async fn exception_handler(req: Request, next: Next) -> Response {
    let request_id = ErrorViewModel::request_id_of(req.headers());
    let path = req.uri().path().to_string();
    let resp = next.run(req).await;
    if !resp.status().is_server_error() {
        return resp;
    }
    let Some(ErrorDetail(detail)) = resp.extensions().get::<ErrorDetail>().cloned() else {
        return resp;
    };

    error!(path = %path, request_id = ?request_id, error = %detail, "Unhandled request error");
    (resp.status(), Json(ErrorViewModel::new(request_id))).into_response()
}
