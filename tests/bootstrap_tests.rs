use serde_json::json;
use todo_cosmos::config::{Config, SecretSource};
use todo_cosmos::cosmos::ConnectionMode;
use todo_cosmos::{InitStage, TodoError, initialize_cosmos_client_instance};
use url::Url;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MASTER_KEY: &str = "dG9kby1jb3Ntb3MtdGVzdC1tYXN0ZXIta2V5";
const TOKEN_PATH: &str = "/common/oauth2/v2.0/token";

fn config_for(server: &MockServer) -> Config {
    let mut cfg = Config::default();
    let base = Url::parse(&server.uri()).expect("mock uri");
    cfg.vault.authority = base.clone();
    cfg.vault.base_uri = base;
    cfg.vault.client_id = "todo-app".to_string();
    cfg.vault.client_secret = "todo-secret".to_string();
    cfg.http.max_throttle_retries = 2;
    cfg
}

async fn mount_token(server: &MockServer, access_token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=todo-app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_secret(server: &MockServer, name: &str, value: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/secrets/{name}")))
        .and(query_param("api-version", "7.4"))
        .and(header("authorization", "Bearer vault-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": value,
            "id": format!("https://cosmosdbkeys.vault.azure.net/secrets/{name}/1"),
        })))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_all_secrets(server: &MockServer, times: u64) {
    mount_secret(server, "cosmosdbURI", &server.uri(), times).await;
    mount_secret(server, "cosmosdbKeys", MASTER_KEY, times).await;
    mount_secret(server, "cosmosDBDatabaseName", "TodoDb", times).await;
    mount_secret(server, "cosmosDBContainerName", "Items", times).await;
}

async fn mount_create_database(server: &MockServer, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path("/dbs"))
        .and(header("x-ms-version", "2018-12-31"))
        .and(body_partial_json(json!({"id": "TodoDb"})))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"id": "TodoDb"})))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_create_container(server: &MockServer, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path("/dbs/TodoDb/colls"))
        .and(body_partial_json(json!({
            "id": "Items",
            "partitionKey": {"paths": ["/id"], "kind": "Hash"}
        })))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"id": "Items"})))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_read_container(server: &MockServer, partition_path: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/dbs/TodoDb/colls/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "Items",
            "partitionKey": {"paths": [partition_path], "kind": "Hash"}
        })))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn vault_secrets_produce_handle_bound_to_database_and_container() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    mount_all_secrets(&server, 1).await;
    mount_create_database(&server, 201, 1).await;
    mount_create_container(&server, 201, 1).await;

    let service = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .expect("bootstrap should succeed");

    assert_eq!(service.database_name(), "TodoDb");
    assert_eq!(service.container_name(), "Items");
    assert_eq!(service.client().connection_mode(), ConnectionMode::Gateway);
    assert_eq!(
        service.client().endpoint().as_str(),
        Url::parse(&server.uri()).unwrap().as_str()
    );
}

#[tokio::test]
async fn provisioning_requests_are_signed_with_master_key() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    mount_all_secrets(&server, 1).await;
    mount_create_database(&server, 201, 1).await;
    mount_create_container(&server, 201, 1).await;

    initialize_cosmos_client_instance(&config_for(&server))
        .await
        .expect("bootstrap should succeed");

    let received = server.received_requests().await.unwrap();
    let provisioning: Vec<_> = received
        .iter()
        .filter(|r| r.url.path().starts_with("/dbs"))
        .collect();
    assert_eq!(provisioning.len(), 2);
    for req in provisioning {
        let auth = req.headers.get("authorization").unwrap().to_str().unwrap();
        assert!(auth.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"), "{auth}");
        assert!(req.headers.get("x-ms-date").is_some());
    }
}

#[tokio::test]
async fn rejected_token_request_aborts_before_any_secret_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "bad secret"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_all_secrets(&server, 0).await;
    mount_create_database(&server, 201, 0).await;

    let err = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .unwrap_err();
    match err {
        TodoError::Startup { stage, source } => {
            assert_eq!(stage, InitStage::AuthenticatingSecrets);
            assert!(
                matches!(*source, TodoError::Oauth2Server { ref error } if error == "invalid_client")
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn empty_access_token_is_an_invalid_operation() {
    let server = MockServer::start().await;
    mount_token(&server, "", 1).await;
    mount_all_secrets(&server, 0).await;
    mount_create_database(&server, 201, 0).await;

    let err = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .unwrap_err();
    match err {
        TodoError::Startup { stage, source } => {
            assert_eq!(stage, InitStage::AuthenticatingSecrets);
            assert!(matches!(*source, TodoError::MissingAccessToken));
            assert_eq!(source.to_string(), "Failed to retrieve JWT token");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn second_startup_against_provisioned_backend_succeeds() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 2).await;
    mount_all_secrets(&server, 2).await;
    mount_create_database(&server, 409, 2).await;
    mount_create_container(&server, 409, 2).await;
    mount_read_container(&server, "/id", 2).await;

    let cfg = config_for(&server);
    let first = initialize_cosmos_client_instance(&cfg).await.unwrap();
    let second = initialize_cosmos_client_instance(&cfg).await.unwrap();
    assert_eq!(first.database_name(), second.database_name());
    assert_eq!(first.container_name(), second.container_name());
}

#[tokio::test]
async fn existing_container_with_other_partition_key_fails_startup() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    mount_all_secrets(&server, 1).await;
    mount_create_database(&server, 409, 1).await;
    mount_create_container(&server, 409, 1).await;
    mount_read_container(&server, "/category", 1).await;

    let err = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .unwrap_err();
    match err {
        TodoError::Startup { stage, source } => {
            assert_eq!(stage, InitStage::ContainerEnsured);
            assert!(matches!(*source, TodoError::PartitionKeyMismatch { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn forbidden_database_creation_stops_before_container() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    mount_all_secrets(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/dbs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "Forbidden",
            "message": "Request blocked by Auth"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_create_container(&server, 201, 0).await;

    let err = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .unwrap_err();
    match err {
        TodoError::Startup { stage, source } => {
            assert_eq!(stage, InitStage::DatabaseEnsured);
            match *source {
                TodoError::CosmosStatus { status, message, .. } => {
                    assert_eq!(status.as_u16(), 403);
                    assert_eq!(message, "Forbidden: Request blocked by Auth");
                }
                other => panic!("unexpected source: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_secret_fails_and_skips_the_rest() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    mount_secret(&server, "cosmosdbURI", "https://acct.example.com", 1).await;
    Mock::given(method("GET"))
        .and(path("/secrets/cosmosdbKeys"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_secret(&server, "cosmosDBDatabaseName", "TodoDb", 0).await;
    mount_secret(&server, "cosmosDBContainerName", "Items", 0).await;

    let err = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .unwrap_err();
    match err {
        TodoError::Startup { stage, source } => {
            assert_eq!(stage, InitStage::AuthenticatingSecrets);
            assert!(
                matches!(*source, TodoError::VaultStatus { ref name, .. } if name == "cosmosdbKeys")
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn empty_secret_value_fails_and_skips_the_rest() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    mount_secret(&server, "cosmosdbURI", "https://acct.example.com", 1).await;
    mount_secret(&server, "cosmosdbKeys", "", 1).await;
    mount_secret(&server, "cosmosDBDatabaseName", "TodoDb", 0).await;
    mount_secret(&server, "cosmosDBContainerName", "Items", 0).await;
    mount_create_database(&server, 201, 0).await;

    let err = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .unwrap_err();
    match err {
        TodoError::Startup { stage, source } => {
            assert_eq!(stage, InitStage::AuthenticatingSecrets);
            assert!(matches!(*source, TodoError::EmptySecret(ref name) if name == "cosmosdbKeys"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn secret_bundle_without_value_fails() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    Mock::given(method("GET"))
        .and(path("/secrets/cosmosdbURI"))
        .and(header("authorization", "Bearer vault-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "https://cosmosdbkeys.vault.azure.net/secrets/cosmosdbURI/1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_secret(&server, "cosmosdbKeys", MASTER_KEY, 0).await;
    mount_secret(&server, "cosmosDBDatabaseName", "TodoDb", 0).await;
    mount_secret(&server, "cosmosDBContainerName", "Items", 0).await;

    let err = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .unwrap_err();
    match err {
        TodoError::Startup { stage, source } => {
            assert_eq!(stage, InitStage::AuthenticatingSecrets);
            assert!(matches!(*source, TodoError::EmptySecret(ref name) if name == "cosmosdbURI"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn throttled_provisioning_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server, "vault-token", 1).await;
    mount_all_secrets(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/dbs"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "code": "TooManyRequests",
            "message": "Request rate is large"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_create_database(&server, 201, 1).await;
    mount_create_container(&server, 201, 1).await;

    let service = initialize_cosmos_client_instance(&config_for(&server))
        .await
        .expect("429 should be retried");
    assert_eq!(service.database_name(), "TodoDb");
}

#[tokio::test]
async fn config_section_source_skips_the_vault() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_create_database(&server, 201, 1).await;
    mount_create_container(&server, 201, 1).await;

    let mut cfg = Config::default();
    cfg.bootstrap.source = SecretSource::Config;
    cfg.cosmos_db.account = Some(server.uri());
    cfg.cosmos_db.key = Some(MASTER_KEY.to_string());
    cfg.cosmos_db.database_name = Some("TodoDb".to_string());
    cfg.cosmos_db.container_name = Some("Items".to_string());

    let service = initialize_cosmos_client_instance(&cfg).await.unwrap();
    assert_eq!(service.container_name(), "Items");
}
