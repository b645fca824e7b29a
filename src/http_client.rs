use crate::config::HttpConfig;
use crate::error::TodoError;
use std::time::Duration;

/// Outbound HTTP client shared by the vault and Cosmos callers.
///
/// Redirects are never followed: a token endpoint that redirects is
/// treated as a failure rather than replaying credentials elsewhere.
pub fn build_http_client(cfg: &HttpConfig, user_agent: &str) -> Result<reqwest::Client, TodoError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .timeout(Duration::from_secs(cfg.timeout_secs));
    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}
