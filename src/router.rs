use crate::config::BasicConfig;
use crate::cosmos::CosmosDbService;
use crate::handlers::{home, item};
use crate::middleware::cookie_policy::cookie_policy;
use crate::middleware::error_page::{developer_exception_page, exception_handler};
use crate::middleware::https::{Hsts, HttpsRedirect, hsts, https_redirection};
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

/// Shared state handed to every handler. Holds the one `CosmosDbService`
/// built at startup; clones share it.
#[derive(Clone)]
pub struct TodoState {
    pub cosmos: Arc<CosmosDbService>,
}

impl TodoState {
    pub fn new(cosmos: CosmosDbService) -> Self {
        Self {
            cosmos: Arc::new(cosmos),
        }
    }
}

/// Pipeline, outermost first: request id, tracing, HSTS (HTTPS only) and error handling
/// (development shows error detail instead), HTTPS redirection, cookie policy, then the
/// `{controller=Item}/{action=Index}/{id?}` routes with static files as fallback.
pub fn todo_router(state: TodoState, basic: &BasicConfig) -> Router {
    if basic.https_port.is_none() {
        warn!("Failed to determine the https port for redirect; HTTPS redirection is disabled");
    }

    let router = Router::new()
        .route("/", get(item::index))
        .route("/Item", get(item::index))
        .route("/Item/Index", get(item::index))
        .route("/Item/Details/{id}", get(item::details))
        .route("/Item/Create", post(item::create))
        .route("/Item/Edit/{id}", get(item::details).post(item::edit))
        .route("/Item/Delete/{id}", get(item::details).post(item::delete))
        .route("/Home/Error", get(home::error))
        .route("/Home/Consent", post(home::consent))
        .fallback_service(ServeDir::new(&basic.static_dir))
        .with_state(state)
        .layer(from_fn(cookie_policy))
        .layer(from_fn_with_state(
            HttpsRedirect {
                https_port: basic.https_port,
            },
            https_redirection,
        ));

    let router = if basic.environment.is_development() {
        router.layer(from_fn(developer_exception_page))
    } else {
        router
            .layer(from_fn(exception_handler))
            .layer(from_fn_with_state(
                Hsts::max_age(basic.hsts_max_age_secs),
                hsts,
            ))
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
