//! Client configuration and transport layer.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use google_cloud_auth::credentials::{
    Builder as AuthBuilder, CacheableResource, Credentials as GoogleCredentials,
};
use http::Extensions;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client as HttpClient, Proxy};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Gemini 缓存客户端。
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub http: HttpClient,
    pub config: ClientConfig,
    pub api_client: ApiClient,
    pub(crate) auth_provider: AuthProvider,
    pub(crate) cancellation: CancellationToken,
}

/// 客户端配置。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API 密钥（Gemini API）。
    pub api_key: Option<String>,
    pub backend: Backend,
    pub vertex_config: Option<VertexConfig>,
    pub http_options: HttpOptions,
    pub credentials: Credentials,
    /// OAuth scopes（ADC 使用）。
    pub auth_scopes: Vec<String>,
}

/// 后端选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    GeminiApi,
    VertexAi,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeminiApi => f.write_str("GeminiAPI"),
            Self::VertexAi => f.write_str("VertexAI"),
        }
    }
}

/// 认证方式。
#[derive(Clone)]
pub enum Credentials {
    /// API Key（Gemini API），以 `x-goog-api-key` 头发送。
    ApiKey(String),
    /// 预先获取的 OAuth access token，以 Bearer 头发送。
    AccessToken(String),
    /// Application Default Credentials (ADC)。
    ApplicationDefault,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::AccessToken(_) => f.write_str("AccessToken(***)"),
            Self::ApplicationDefault => f.write_str("ApplicationDefault"),
        }
    }
}

/// Vertex AI 配置。
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project: String,
    pub location: String,
}

/// HTTP 配置。
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// 请求超时（秒）。
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub headers: HashMap<String, String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
}

impl Client {
    /// 创建新客户端（Gemini API）。
    ///
    /// # Errors
    /// 当配置无效或构建客户端失败时返回错误。
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder()
            .api_key(api_key)
            .backend(Backend::GeminiApi)
            .build()
    }

    /// 从环境变量创建客户端。
    ///
    /// `GOOGLE_GENAI_USE_VERTEXAI=true` 时使用 Vertex AI（需要 `GOOGLE_CLOUD_PROJECT`
    /// 与 `GOOGLE_CLOUD_LOCATION`，通过 ADC 认证）；否则读取 `GEMINI_API_KEY`
    /// 或 `GOOGLE_API_KEY`。
    ///
    /// # Errors
    /// 当环境变量缺失或构建客户端失败时返回错误。
    pub fn from_env() -> Result<Self> {
        let mut builder = if env_flag("GOOGLE_GENAI_USE_VERTEXAI") {
            Self::builder()
                .backend(Backend::VertexAi)
                .vertex_project(required_env("GOOGLE_CLOUD_PROJECT")?)
                .vertex_location(required_env("GOOGLE_CLOUD_LOCATION")?)
        } else {
            let api_key = env_value("GEMINI_API_KEY")
                .or_else(|| env_value("GOOGLE_API_KEY"))
                .ok_or_else(|| Error::InvalidConfig {
                    message: "GEMINI_API_KEY or GOOGLE_API_KEY not found".into(),
                })?;
            Self::builder().backend(Backend::GeminiApi).api_key(api_key)
        };
        let base_url = env_value("GENAI_BASE_URL").or_else(|| env_value("GEMINI_BASE_URL"));
        if let Some(base_url) = base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(api_version) = env_value("GENAI_API_VERSION") {
            builder = builder.api_version(api_version);
        }
        builder.build()
    }

    /// 创建 Vertex AI 客户端（ADC 认证）。
    ///
    /// # Errors
    /// 当配置无效或构建客户端失败时返回错误。
    pub fn new_vertex(project: impl Into<String>, location: impl Into<String>) -> Result<Self> {
        Self::builder()
            .backend(Backend::VertexAi)
            .vertex_project(project)
            .vertex_location(location)
            .build()
    }

    /// 使用 Application Default Credentials 创建客户端。
    ///
    /// # Errors
    /// 当构建客户端失败时返回错误。
    pub fn with_adc() -> Result<Self> {
        Self::builder()
            .credentials(Credentials::ApplicationDefault)
            .build()
    }

    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// 当前使用的后端。
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.inner.config.backend
    }

    /// 客户端级取消令牌；取消后所有进行中与后续请求返回 `Error::Cancelled`。
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation.clone()
    }

    /// 访问 Caches API。
    #[must_use]
    pub fn caches(&self) -> crate::caches::Caches {
        crate::caches::Caches::new(self.inner.clone())
    }
}

/// 客户端 Builder。
#[derive(Default)]
pub struct ClientBuilder {
    api_key: Option<String>,
    credentials: Option<Credentials>,
    backend: Option<Backend>,
    vertex_project: Option<String>,
    vertex_location: Option<String>,
    http_options: HttpOptions,
    auth_scopes: Option<Vec<String>>,
    cancellation: Option<CancellationToken>,
}

impl ClientBuilder {
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub const fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn vertex_project(mut self, project: impl Into<String>) -> Self {
        self.vertex_project = Some(project.into());
        self
    }

    #[must_use]
    pub fn vertex_location(mut self, location: impl Into<String>) -> Self {
        self.vertex_location = Some(location.into());
        self
    }

    /// 设置请求超时（秒）。
    #[must_use]
    pub const fn timeout(mut self, secs: u64) -> Self {
        self.http_options.timeout = Some(secs);
        self
    }

    #[must_use]
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.http_options.proxy = Some(url.into());
        self
    }

    /// 增加默认 HTTP 头。
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_options.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http_options.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.http_options.api_version = Some(api_version.into());
        self
    }

    #[must_use]
    pub fn auth_scopes(mut self, scopes: Vec<String>) -> Self {
        self.auth_scopes = Some(scopes);
        self
    }

    /// 绑定外部取消令牌。
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// 构建客户端。
    ///
    /// # Errors
    /// 当配置不完整、参数无效或构建 HTTP 客户端失败时返回错误。
    pub fn build(self) -> Result<Client> {
        let Self {
            api_key,
            credentials,
            backend,
            vertex_project,
            vertex_location,
            http_options,
            auth_scopes,
            cancellation,
        } = self;

        let (backend, vertex_config) = resolve_target(backend, vertex_project, vertex_location)?;
        let credentials = resolve_credentials(backend, api_key, credentials)?;
        let auth_provider = AuthProvider::for_credentials(&credentials)?;
        let http = build_http_client(&http_options)?;

        let config = ClientConfig {
            api_key: match &credentials {
                Credentials::ApiKey(key) => Some(key.clone()),
                _ => None,
            },
            backend,
            vertex_config,
            http_options,
            credentials,
            auth_scopes: auth_scopes.unwrap_or_else(|| default_auth_scopes(backend)),
        };
        let api_client = ApiClient::new(&config);
        debug!(
            %backend,
            base_url = %api_client.base_url,
            api_version = %api_client.api_version,
            credentials = ?config.credentials,
            "client configured"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                config,
                api_client,
                auth_provider,
                cancellation: cancellation.unwrap_or_default(),
            }),
        })
    }
}

/// 确定后端及 Vertex 资源位置；未指定后端但给出 project/location 时走 Vertex AI。
fn resolve_target(
    backend: Option<Backend>,
    project: Option<String>,
    location: Option<String>,
) -> Result<(Backend, Option<VertexConfig>)> {
    let backend = backend.unwrap_or(if project.is_some() || location.is_some() {
        Backend::VertexAi
    } else {
        Backend::GeminiApi
    });
    match (backend, project, location) {
        (Backend::GeminiApi, ..) => Ok((backend, None)),
        (Backend::VertexAi, Some(project), Some(location)) => {
            Ok((backend, Some(VertexConfig { project, location })))
        }
        (Backend::VertexAi, ..) => Err(Error::InvalidConfig {
            message: "Project and location required for Vertex AI".into(),
        }),
    }
}

fn resolve_credentials(
    backend: Backend,
    api_key: Option<String>,
    credentials: Option<Credentials>,
) -> Result<Credentials> {
    let credentials = match (api_key, credentials) {
        (None, Some(credentials)) | (Some(_), Some(credentials @ Credentials::ApiKey(_))) => {
            credentials
        }
        (Some(key), None) => Credentials::ApiKey(key),
        (Some(_), Some(_)) => {
            return Err(Error::InvalidConfig {
                message: "API key cannot be combined with token or ADC credentials".into(),
            })
        }
        (None, None) => match backend {
            Backend::VertexAi => Credentials::ApplicationDefault,
            Backend::GeminiApi => {
                return Err(Error::InvalidConfig {
                    message: "API key or credentials required for Gemini API".into(),
                })
            }
        },
    };

    if backend == Backend::VertexAi && matches!(credentials, Credentials::ApiKey(_)) {
        return Err(Error::InvalidConfig {
            message: "Vertex AI does not support API key authentication".into(),
        });
    }
    Ok(credentials)
}

fn build_http_client(options: &HttpOptions) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    for (key, value) in &options.headers {
        let (name, value) = parse_header(key, value)?;
        headers.insert(name, value);
    }

    let mut builder = HttpClient::builder().default_headers(headers);
    if let Some(secs) = options.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(proxy_url) = &options.proxy {
        let proxy = Proxy::all(proxy_url).map_err(|e| Error::InvalidConfig {
            message: format!("Invalid proxy: {e}"),
        })?;
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}

pub(crate) fn parse_header(key: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| Error::InvalidConfig {
        message: format!("Invalid header name: {key}"),
    })?;
    let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidConfig {
        message: format!("Invalid header value for {key}"),
    })?;
    Ok((name, value))
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|value| {
            let value = value.trim();
            value == "1" || value.eq_ignore_ascii_case("true")
        })
        .unwrap_or(false)
}

/// 读取非空白的环境变量。
fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn required_env(key: &str) -> Result<String> {
    env_value(key).ok_or_else(|| Error::InvalidConfig {
        message: format!("{key} is required when GOOGLE_GENAI_USE_VERTEXAI is set"),
    })
}

/// 每个请求注入的鉴权头来源。
pub(crate) enum AuthProvider {
    /// 固定头：API key（`x-goog-api-key`）或预取的 Bearer token。
    Static { name: HeaderName, value: HeaderValue },
    /// ADC，首个请求时初始化。
    ApplicationDefault(Arc<OnceCell<Arc<GoogleCredentials>>>),
}

impl AuthProvider {
    pub(crate) fn for_credentials(credentials: &Credentials) -> Result<Self> {
        match credentials {
            Credentials::ApiKey(key) => Self::fixed(
                HeaderName::from_static("x-goog-api-key"),
                key,
                "Invalid API key value",
            ),
            Credentials::AccessToken(token) => Self::fixed(
                AUTHORIZATION,
                &format!("Bearer {token}"),
                "Invalid access token value",
            ),
            Credentials::ApplicationDefault => Ok(Self::ApplicationDefault(Arc::default())),
        }
    }

    fn fixed(name: HeaderName, value: &str, invalid: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(value).map_err(|_| Error::InvalidConfig {
            message: invalid.to_string(),
        })?;
        value.set_sensitive(true);
        Ok(Self::Static { name, value })
    }

    async fn headers(&self, scopes: &[&str]) -> Result<HeaderMap> {
        match self {
            Self::Static { name, value } => {
                let mut headers = HeaderMap::new();
                headers.insert(name.clone(), value.clone());
                Ok(headers)
            }
            Self::ApplicationDefault(cell) => {
                let credentials = cell
                    .get_or_try_init(|| async {
                        AuthBuilder::default()
                            .with_scopes(scopes.iter().copied())
                            .build()
                            .map(Arc::new)
                            .map_err(|err| Error::Auth {
                                message: format!("ADC init failed: {err}"),
                            })
                    })
                    .await?;
                let headers = credentials
                    .headers(Extensions::new())
                    .await
                    .map_err(|err| Error::Auth {
                        message: format!("ADC header fetch failed: {err}"),
                    })?;
                match headers {
                    CacheableResource::New { data, .. } => Ok(data),
                    CacheableResource::NotModified => Err(Error::Auth {
                        message: "ADC header fetch returned NotModified without cached headers"
                            .into(),
                    }),
                }
            }
        }
    }
}

impl ClientInner {
    /// 发送请求：注入鉴权头，并与取消令牌竞争。
    ///
    /// # Errors
    /// 当请求构建、鉴权头获取、网络请求失败或请求被取消时返回错误。
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut request = request.build()?;
        // 请求级 headers 优先于鉴权头。
        for (name, mut value) in self.auth_headers().await? {
            let Some(name) = name else { continue };
            if request.headers().contains_key(&name) {
                continue;
            }
            value.set_sensitive(true);
            request.headers_mut().insert(name, value);
        }
        debug!(method = %request.method(), url = %request.url(), "sending request");
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => {
                debug!("request cancelled");
                Err(Error::Cancelled)
            }
            response = self.http.execute(request) => Ok(response?),
        }
    }

    async fn auth_headers(&self) -> Result<HeaderMap> {
        let scopes: Vec<&str> = self.config.auth_scopes.iter().map(String::as_str).collect();
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Error::Cancelled),
            headers = self.auth_provider.headers(&scopes) => headers,
        }
    }
}

fn default_auth_scopes(backend: Backend) -> Vec<String> {
    match backend {
        Backend::VertexAi => vec!["https://www.googleapis.com/auth/cloud-platform".into()],
        Backend::GeminiApi => vec!["https://www.googleapis.com/auth/generative-language".into()],
    }
}

pub(crate) struct ApiClient {
    pub base_url: String,
    pub api_version: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        let base_url = config.http_options.base_url.as_deref().map_or_else(
            || match config.backend {
                Backend::VertexAi => {
                    let location = config
                        .vertex_config
                        .as_ref()
                        .map_or("", |cfg| cfg.location.as_str());
                    if location.is_empty() || location == "global" {
                        "https://aiplatform.googleapis.com/".to_string()
                    } else {
                        format!("https://{location}-aiplatform.googleapis.com/")
                    }
                }
                Backend::GeminiApi => "https://generativelanguage.googleapis.com/".to_string(),
            },
            normalize_base_url,
        );

        let api_version =
            config
                .http_options
                .api_version
                .clone()
                .unwrap_or_else(|| match config.backend {
                    Backend::VertexAi => "v1beta1".to_string(),
                    Backend::GeminiApi => "v1beta".to_string(),
                });

        Self {
            base_url,
            api_version,
        }
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let mut value = base_url.trim().to_string();
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_env;

    const CLEAR_ENV: [EnvVar; 8] = [
        ("GOOGLE_GENAI_USE_VERTEXAI", None),
        ("GOOGLE_CLOUD_PROJECT", None),
        ("GOOGLE_CLOUD_LOCATION", None),
        ("GEMINI_API_KEY", None),
        ("GOOGLE_API_KEY", None),
        ("GENAI_BASE_URL", None),
        ("GEMINI_BASE_URL", None),
        ("GENAI_API_VERSION", None),
    ];

    type EnvVar = (&'static str, Option<&'static str>);

    fn env_with(overrides: &[EnvVar]) -> Vec<EnvVar> {
        let mut vars: Vec<_> = CLEAR_ENV
            .iter()
            .filter(|(key, _)| !overrides.iter().any(|(k, _)| k == key))
            .copied()
            .collect();
        vars.extend_from_slice(overrides);
        vars
    }

    #[test]
    fn test_client_from_api_key() {
        let client = Client::new("test-api-key").unwrap();
        assert_eq!(client.backend(), Backend::GeminiApi);
        assert_eq!(
            client.inner.api_client.base_url,
            "https://generativelanguage.googleapis.com/"
        );
        assert_eq!(client.inner.api_client.api_version, "v1beta");
    }

    #[test]
    fn test_vertex_ai_config() {
        let client = Client::new_vertex("my-project", "us-central1").unwrap();
        assert_eq!(client.backend(), Backend::VertexAi);
        assert_eq!(
            client.inner.api_client.base_url,
            "https://us-central1-aiplatform.googleapis.com/"
        );
        assert_eq!(client.inner.api_client.api_version, "v1beta1");
        assert!(matches!(
            client.inner.config.credentials,
            Credentials::ApplicationDefault
        ));
    }

    #[test]
    fn test_vertex_global_location_uses_global_host() {
        let client = Client::new_vertex("my-project", "global").unwrap();
        assert_eq!(
            client.inner.api_client.base_url,
            "https://aiplatform.googleapis.com/"
        );
    }

    #[test]
    fn test_base_url_normalization() {
        let client = Client::builder()
            .api_key("test-key")
            .base_url("https://example.com")
            .build()
            .unwrap();
        assert_eq!(client.inner.api_client.base_url, "https://example.com/");
    }

    #[test]
    fn test_from_env_gemini_with_overrides() {
        with_env(
            &env_with(&[
                ("GEMINI_API_KEY", Some("env-key")),
                ("GENAI_BASE_URL", Some("https://env.example.com")),
                ("GENAI_API_VERSION", Some("v99")),
            ]),
            || {
                let client = Client::from_env().unwrap();
                assert_eq!(client.backend(), Backend::GeminiApi);
                assert_eq!(client.inner.api_client.base_url, "https://env.example.com/");
                assert_eq!(client.inner.api_client.api_version, "v99");
            },
        );
    }

    #[test]
    fn test_from_env_ignores_blank_overrides() {
        with_env(
            &env_with(&[
                ("GEMINI_API_KEY", Some("env-key")),
                ("GENAI_BASE_URL", Some("   ")),
                ("GENAI_API_VERSION", Some("")),
            ]),
            || {
                let client = Client::from_env().unwrap();
                assert_eq!(
                    client.inner.api_client.base_url,
                    "https://generativelanguage.googleapis.com/"
                );
                assert_eq!(client.inner.api_client.api_version, "v1beta");
            },
        );
    }

    #[test]
    fn test_from_env_google_api_key_fallback() {
        with_env(&env_with(&[("GOOGLE_API_KEY", Some("google-key"))]), || {
            let client = Client::from_env().unwrap();
            assert_eq!(client.inner.config.api_key.as_deref(), Some("google-key"));
        });
    }

    #[test]
    fn test_from_env_missing_key_errors() {
        with_env(&env_with(&[]), || {
            let err = Client::from_env().err().unwrap();
            assert!(err.is_config_error());
        });
    }

    #[test]
    fn test_from_env_selects_vertex() {
        with_env(
            &env_with(&[
                ("GOOGLE_GENAI_USE_VERTEXAI", Some("True")),
                ("GOOGLE_CLOUD_PROJECT", Some("proj")),
                ("GOOGLE_CLOUD_LOCATION", Some("europe-west4")),
                ("GOOGLE_API_KEY", Some("ignored")),
            ]),
            || {
                let client = Client::from_env().unwrap();
                assert_eq!(client.backend(), Backend::VertexAi);
                let vertex = client.inner.config.vertex_config.as_ref().unwrap();
                assert_eq!(vertex.project, "proj");
                assert_eq!(vertex.location, "europe-west4");
                assert!(client.inner.config.api_key.is_none());
            },
        );
    }

    #[test]
    fn test_from_env_vertex_requires_project() {
        with_env(
            &env_with(&[
                ("GOOGLE_GENAI_USE_VERTEXAI", Some("1")),
                ("GOOGLE_CLOUD_LOCATION", Some("us-central1")),
            ]),
            || {
                let err = Client::from_env().err().unwrap();
                assert!(
                    matches!(err, Error::InvalidConfig { ref message } if message.contains("GOOGLE_CLOUD_PROJECT"))
                );
            },
        );
    }

    #[test]
    fn test_from_env_false_flag_uses_gemini() {
        with_env(
            &env_with(&[
                ("GOOGLE_GENAI_USE_VERTEXAI", Some("false")),
                ("GEMINI_API_KEY", Some("key")),
            ]),
            || {
                let client = Client::from_env().unwrap();
                assert_eq!(client.backend(), Backend::GeminiApi);
            },
        );
    }

    #[test]
    fn test_builder_defaults_to_vertex_when_project_set() {
        let client = Client::builder()
            .vertex_project("proj")
            .vertex_location("loc")
            .build()
            .unwrap();
        assert_eq!(client.backend(), Backend::VertexAi);
    }

    #[test]
    fn test_vertex_requires_project_and_location() {
        let result = Client::builder().backend(Backend::VertexAi).build();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_api_key_with_adc_is_invalid() {
        let result = Client::builder()
            .api_key("test-key")
            .credentials(Credentials::ApplicationDefault)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_api_key_for_gemini_errors() {
        let result = Client::builder().backend(Backend::GeminiApi).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_vertex_api_key_is_rejected() {
        let result = Client::builder()
            .backend(Backend::VertexAi)
            .vertex_project("proj")
            .vertex_location("loc")
            .credentials(Credentials::ApiKey("key".into()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_headers_are_rejected() {
        for (name, value) in [("bad header", "value"), ("x-test", "bad\nvalue")] {
            let result = Client::builder()
                .api_key("test-key")
                .header(name, value)
                .build();
            assert!(result.is_err(), "{name}");
        }
    }

    #[test]
    fn test_invalid_api_key_value_is_rejected() {
        let err = Client::builder().api_key("bad\nkey").build().err().unwrap();
        assert!(
            matches!(err, Error::InvalidConfig { message } if message.contains("Invalid API key value"))
        );
    }

    #[test]
    fn test_invalid_access_token_is_rejected() {
        let err = Client::builder()
            .credentials(Credentials::AccessToken("bad\ntoken".into()))
            .build()
            .err()
            .unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_proxy_validation() {
        assert!(Client::builder()
            .api_key("test-key")
            .proxy("http://127.0.0.1:8888")
            .build()
            .is_ok());
        assert!(Client::builder()
            .api_key("test-key")
            .proxy("not a url")
            .build()
            .is_err());
    }

    #[test]
    fn test_default_auth_scopes() {
        let gemini = default_auth_scopes(Backend::GeminiApi);
        assert!(gemini.iter().any(|s| s.contains("generative-language")));

        let vertex = default_auth_scopes(Backend::VertexAi);
        assert!(vertex.iter().any(|s| s.contains("cloud-platform")));
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let rendered = format!("{:?}", Credentials::ApiKey("secret".into()));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_external_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let client = Client::builder()
            .api_key("test-key")
            .cancellation_token(token.clone())
            .build()
            .unwrap();
        token.cancel();
        assert!(client.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_auth_provider_headers_follow_credentials() {
        let api_key = AuthProvider::for_credentials(&Credentials::ApiKey("k".into())).unwrap();
        assert!(matches!(
            api_key,
            AuthProvider::Static { ref name, ref value }
                if name == "x-goog-api-key" && value == "k" && value.is_sensitive()
        ));

        let token = AuthProvider::for_credentials(&Credentials::AccessToken("t".into())).unwrap();
        assert!(matches!(
            token,
            AuthProvider::Static { ref name, ref value }
                if *name == AUTHORIZATION && value == "Bearer t"
        ));

        assert!(matches!(
            AuthProvider::for_credentials(&Credentials::ApplicationDefault).unwrap(),
            AuthProvider::ApplicationDefault(_)
        ));
    }

    #[test]
    fn test_resolve_target() {
        let (backend, vertex) = resolve_target(None, None, None).unwrap();
        assert_eq!(backend, Backend::GeminiApi);
        assert!(vertex.is_none());

        let (backend, vertex) = resolve_target(
            Some(Backend::GeminiApi),
            Some("proj".into()),
            Some("loc".into()),
        )
        .unwrap();
        assert_eq!(backend, Backend::GeminiApi);
        assert!(vertex.is_none());

        let err = resolve_target(None, Some("proj".into()), None).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_from_env_skips_blank_gemini_key() {
        with_env(
            &env_with(&[
                ("GEMINI_API_KEY", Some(" ")),
                ("GOOGLE_API_KEY", Some("google-key")),
            ]),
            || {
                let client = Client::from_env().unwrap();
                assert_eq!(client.inner.config.api_key.as_deref(), Some("google-key"));
            },
        );
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::GeminiApi.to_string(), "GeminiAPI");
        assert_eq!(Backend::VertexAi.to_string(), "VertexAI");
    }
}
