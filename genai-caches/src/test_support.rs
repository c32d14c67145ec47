use crate::client::{
    ApiClient, AuthProvider, Backend, ClientConfig, ClientInner, Credentials, HttpOptions,
    VertexConfig,
};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// 串行化环境变量修改，结束后恢复原值。
pub fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
    let _guard = ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let backup: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| ((*key).to_string(), std::env::var(key).ok()))
        .collect();
    for (key, value) in vars {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    f();
    for (key, value) in backup {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}

pub fn test_client_inner(backend: Backend) -> ClientInner {
    let vertex_config = (backend == Backend::VertexAi).then(|| VertexConfig {
        project: "proj".to_string(),
        location: "loc".to_string(),
    });
    test_client_inner_with_vertex(backend, vertex_config)
}

pub fn test_client_inner_with_vertex(
    backend: Backend,
    vertex_config: Option<VertexConfig>,
) -> ClientInner {
    let credentials = match backend {
        Backend::GeminiApi => Credentials::ApiKey("test-key".into()),
        Backend::VertexAi => Credentials::AccessToken("test-token".into()),
    };
    let auth_provider = AuthProvider::for_credentials(&credentials).unwrap();
    let config = ClientConfig {
        api_key: None,
        backend,
        vertex_config,
        http_options: HttpOptions::default(),
        credentials,
        auth_scopes: Vec::new(),
    };
    let api_client = ApiClient::new(&config);
    ClientInner {
        http: reqwest::Client::new(),
        config,
        api_client,
        auth_provider,
        cancellation: CancellationToken::new(),
    }
}
