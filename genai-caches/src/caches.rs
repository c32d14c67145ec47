//! Caches API surface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use genai_caches_types::caches::{
    is_valid_ttl, CachedContent, CreateCachedContentConfig, DeleteCachedContentConfig,
    DeleteCachedContentResponse, GetCachedContentConfig, ListCachedContentsConfig,
    ListCachedContentsResponse, UpdateCachedContentConfig,
};
use genai_caches_types::content::Content;
use genai_caches_types::http::{HttpOptions, HttpResponse};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::{parse_header, Backend, ClientInner, VertexConfig};
use crate::error::{api_error_from_response, Error, Result};
use crate::http_response::sdk_http_response_from_headers;
use crate::pagination::{continuation, PageOutcome};

#[derive(Clone)]
pub struct Caches {
    pub(crate) inner: Arc<ClientInner>,
}

impl Caches {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// 创建缓存。
    ///
    /// # Errors
    /// TTL 格式错误或内容缺少 parts 时返回 `InvalidConfig`（不发送请求）；
    /// 请求失败或服务端返回非 2xx 时返回错误。
    pub async fn create(
        &self,
        model: impl Into<String>,
        mut config: CreateCachedContentConfig,
    ) -> Result<CachedContent> {
        let http_options = config.http_options.take();
        validate_create_config(&config)?;
        let model = normalize_cache_model(&self.inner, &model.into())?;

        let mut body = serde_json::to_value(&config)?;
        let body_map = body.as_object_mut().ok_or_else(|| Error::Parse {
            message: "CreateCachedContentConfig must be object".into(),
        })?;
        body_map.insert("model".to_string(), Value::String(model));
        handle_kms_key(&self.inner, body_map)?;
        if let Some(options) = http_options.as_ref() {
            merge_extra_body(&mut body, options)?;
        }

        let url = build_cached_contents_url(&self.inner, http_options.as_ref())?;
        let request = self.inner.http.post(url).json(&body);
        let request = apply_http_options(request, http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(api_error_from_response(response).await);
        }
        let created = decode_json::<CachedContent>(response).await?;
        debug!(name = ?created.name, "cached content created");
        Ok(created)
    }

    /// 获取缓存。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn get(&self, name: impl AsRef<str>) -> Result<CachedContent> {
        self.get_with_config(name, GetCachedContentConfig::default())
            .await
    }

    /// 获取缓存（带配置）。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn get_with_config(
        &self,
        name: impl AsRef<str>,
        mut config: GetCachedContentConfig,
    ) -> Result<CachedContent> {
        let http_options = config.http_options.take();
        let name = normalize_cached_content_name(&self.inner, name.as_ref())?;
        let url = build_cached_content_url(&self.inner, &name, http_options.as_ref());
        let request = apply_http_options(self.inner.http.get(url), http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(api_error_from_response(response).await);
        }
        decode_json::<CachedContent>(response).await
    }

    /// 更新缓存（TTL/过期时间）。
    ///
    /// # Errors
    /// TTL 格式错误、请求失败或服务端返回非 2xx 时返回错误。
    pub async fn update(
        &self,
        name: impl AsRef<str>,
        mut config: UpdateCachedContentConfig,
    ) -> Result<CachedContent> {
        let http_options = config.http_options.take();
        validate_ttl(config.ttl.as_deref())?;
        let name = normalize_cached_content_name(&self.inner, name.as_ref())?;
        let url = build_cached_content_url(&self.inner, &name, http_options.as_ref());
        let mut body = serde_json::to_value(&config)?;
        if let Some(options) = http_options.as_ref() {
            merge_extra_body(&mut body, options)?;
        }
        let request = self.inner.http.patch(url).json(&body);
        let request = apply_http_options(request, http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(api_error_from_response(response).await);
        }
        decode_json::<CachedContent>(response).await
    }

    /// 删除缓存。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn delete(&self, name: impl AsRef<str>) -> Result<DeleteCachedContentResponse> {
        self.delete_with_config(name, DeleteCachedContentConfig::default())
            .await
    }

    /// 删除缓存（带配置）。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn delete_with_config(
        &self,
        name: impl AsRef<str>,
        mut config: DeleteCachedContentConfig,
    ) -> Result<DeleteCachedContentResponse> {
        let http_options = config.http_options.take();
        let name = normalize_cached_content_name(&self.inner, name.as_ref())?;
        let url = build_cached_content_url(&self.inner, &name, http_options.as_ref());
        let request = apply_http_options(self.inner.http.delete(url), http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(api_error_from_response(response).await);
        }
        Ok(DeleteCachedContentResponse {
            sdk_http_response: Some(sdk_http_response_from_headers(response.headers())),
        })
    }

    /// 列出缓存（单页原始响应）。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn list(&self) -> Result<ListCachedContentsResponse> {
        self.list_with_config(ListCachedContentsConfig::default())
            .await
    }

    /// 列出缓存（带配置，单页原始响应）。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn list_with_config(
        &self,
        mut config: ListCachedContentsConfig,
    ) -> Result<ListCachedContentsResponse> {
        let http_options = config.http_options.take();
        let url = build_cached_contents_url(&self.inner, http_options.as_ref())?;
        let url = add_list_query_params(&url, &config)?;
        let request = apply_http_options(self.inner.http.get(url), http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(api_error_from_response(response).await);
        }
        let headers = sdk_http_response_from_headers(response.headers());
        let mut list = decode_json::<ListCachedContentsResponse>(response).await?;
        list.sdk_http_response = Some(headers);
        debug!(
            items = list.cached_contents.as_ref().map_or(0, Vec::len),
            has_next = continuation(list.next_page_token.as_deref()).is_some(),
            "cached contents page fetched"
        );
        Ok(list)
    }

    /// 获取一页缓存，保留配置以便继续翻页。
    ///
    /// 未携带 page token 的首次请求总是返回 `PageOutcome::Page`（可能为空）。
    /// 携带 token 时：token 为空字符串直接返回 `NoMorePages`（不发送请求）；
    /// 服务端返回空页且没有下一页 token 时同样返回 `NoMorePages`。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn list_page(
        &self,
        config: ListCachedContentsConfig,
    ) -> Result<PageOutcome<CachedContentsPage>> {
        let continuing = config.page_token.is_some();
        if continuing && continuation(config.page_token.as_deref()).is_none() {
            debug!("empty page token, listing exhausted");
            return Ok(PageOutcome::NoMorePages);
        }

        let response = self.list_with_config(config.clone()).await?;
        let items = response.cached_contents.unwrap_or_default();
        let next_page_token = response
            .next_page_token
            .filter(|token| !token.is_empty());
        if continuing && items.is_empty() && next_page_token.is_none() {
            debug!("continuation returned no items, listing exhausted");
            return Ok(PageOutcome::NoMorePages);
        }

        Ok(PageOutcome::Page(CachedContentsPage {
            items,
            next_page_token,
            sdk_http_response: response.sdk_http_response,
            config,
            caches: self.clone(),
        }))
    }

    /// 惰性遍历所有缓存（自动翻页）。
    pub fn all(&self) -> impl Stream<Item = Result<CachedContent>> {
        self.all_with_config(ListCachedContentsConfig::default())
    }

    /// 惰性遍历所有缓存（带配置，自动翻页）。
    ///
    /// 每次缓冲区耗尽时才请求下一页；遇到错误时产出该错误后结束。
    /// 流不可重启，重新扫描需再次调用。
    pub fn all_with_config(
        &self,
        config: ListCachedContentsConfig,
    ) -> impl Stream<Item = Result<CachedContent>> {
        let state = AllState {
            caches: self.clone(),
            config,
            buffer: VecDeque::new(),
            finished: false,
        };
        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.buffer.pop_front() {
                    return Some((Ok(item), state));
                }
                if state.finished {
                    return None;
                }
                match state.caches.list_with_config(state.config.clone()).await {
                    Ok(response) => {
                        state
                            .buffer
                            .extend(response.cached_contents.unwrap_or_default());
                        match continuation(response.next_page_token.as_deref()) {
                            Some(token) => state.config.page_token = Some(token.to_string()),
                            None => state.finished = true,
                        }
                    }
                    Err(err) => {
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                }
            }
        })
    }
}

struct AllState {
    caches: Caches,
    config: ListCachedContentsConfig,
    buffer: VecDeque<CachedContent>,
    finished: bool,
}

/// 手动翻页得到的一页缓存。
#[derive(Clone)]
pub struct CachedContentsPage {
    pub items: Vec<CachedContent>,
    /// 下一页 token；`None` 表示这是最后一页。
    pub next_page_token: Option<String>,
    pub sdk_http_response: Option<HttpResponse>,
    config: ListCachedContentsConfig,
    caches: Caches,
}

impl CachedContentsPage {
    /// 获取该页时使用的配置。
    #[must_use]
    pub const fn config(&self) -> &ListCachedContentsConfig {
        &self.config
    }

    /// 以相同配置和本页 token 获取下一页。
    ///
    /// # Errors
    /// 当请求失败或服务端返回非 2xx 时返回错误。
    pub async fn next_page(&self) -> Result<PageOutcome<Self>> {
        let Some(token) = self.next_page_token.as_deref() else {
            debug!("last page reached, listing exhausted");
            return Ok(PageOutcome::NoMorePages);
        };
        let mut config = self.config.clone();
        config.page_token = Some(token.to_string());
        self.caches.list_page(config).await
    }
}

impl std::fmt::Debug for CachedContentsPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedContentsPage")
            .field("items", &self.items)
            .field("next_page_token", &self.next_page_token)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// 读取响应体并解析 JSON；解析失败归为 `Serialization`，而非传输错误。
async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

fn validate_create_config(config: &CreateCachedContentConfig) -> Result<()> {
    validate_ttl(config.ttl.as_deref())?;
    for (index, content) in config.contents.iter().flatten().enumerate() {
        validate_content(index, content)?;
    }
    if config
        .system_instruction
        .as_ref()
        .is_some_and(|instruction| instruction.parts.is_empty())
    {
        return Err(Error::InvalidConfig {
            message: "System instruction has no parts".into(),
        });
    }
    Ok(())
}

fn validate_ttl(ttl: Option<&str>) -> Result<()> {
    match ttl {
        Some(ttl) if !is_valid_ttl(ttl) => Err(Error::InvalidConfig {
            message: format!("Invalid ttl {ttl:?}: expected a duration like \"3600s\""),
        }),
        _ => Ok(()),
    }
}

fn validate_content(index: usize, content: &Content) -> Result<()> {
    if content.parts.is_empty() {
        return Err(Error::InvalidConfig {
            message: format!("Content at index {index} has no parts"),
        });
    }
    Ok(())
}

fn vertex_config(inner: &ClientInner) -> Result<&VertexConfig> {
    inner
        .config
        .vertex_config
        .as_ref()
        .ok_or_else(|| Error::InvalidConfig {
            message: "Vertex config missing".into(),
        })
}

fn normalize_cache_model(inner: &ClientInner, model: &str) -> Result<String> {
    match inner.config.backend {
        Backend::GeminiApi => {
            if model.starts_with("models/") || model.starts_with("tunedModels/") {
                Ok(model.to_string())
            } else {
                Ok(format!("models/{model}"))
            }
        }
        Backend::VertexAi => {
            let VertexConfig { project, location } = vertex_config(inner)?;
            let prefix = format!("projects/{project}/locations/{location}");
            Ok(if model.starts_with("projects/") {
                model.to_string()
            } else if model.starts_with("publishers/") {
                format!("{prefix}/{model}")
            } else if model.starts_with("models/") {
                format!("{prefix}/publishers/google/{model}")
            } else if let Some((publisher, name)) = model.split_once('/') {
                format!("{prefix}/publishers/{publisher}/models/{name}")
            } else {
                format!("{prefix}/publishers/google/models/{model}")
            })
        }
    }
}

fn normalize_cached_content_name(inner: &ClientInner, name: &str) -> Result<String> {
    match inner.config.backend {
        Backend::GeminiApi => {
            if name.starts_with("cachedContents/") {
                Ok(name.to_string())
            } else {
                Ok(format!("cachedContents/{name}"))
            }
        }
        Backend::VertexAi => {
            let VertexConfig { project, location } = vertex_config(inner)?;
            Ok(if name.starts_with("projects/") {
                name.to_string()
            } else if name.starts_with("locations/") {
                format!("projects/{project}/{name}")
            } else if name.starts_with("cachedContents/") {
                format!("projects/{project}/locations/{location}/{name}")
            } else {
                format!("projects/{project}/locations/{location}/cachedContents/{name}")
            })
        }
    }
}

fn base_and_version<'a>(
    inner: &'a ClientInner,
    http_options: Option<&'a HttpOptions>,
) -> (&'a str, &'a str) {
    let base = http_options
        .and_then(|opts| opts.base_url.as_deref())
        .unwrap_or(&inner.api_client.base_url);
    let version = http_options
        .and_then(|opts| opts.api_version.as_deref())
        .unwrap_or(&inner.api_client.api_version);
    (base, version)
}

fn build_cached_contents_url(
    inner: &ClientInner,
    http_options: Option<&HttpOptions>,
) -> Result<String> {
    let (base, version) = base_and_version(inner, http_options);
    let base = base.trim_end_matches('/');
    Ok(match inner.config.backend {
        Backend::GeminiApi => format!("{base}/{version}/cachedContents"),
        Backend::VertexAi => {
            let VertexConfig { project, location } = vertex_config(inner)?;
            format!("{base}/{version}/projects/{project}/locations/{location}/cachedContents")
        }
    })
}

fn build_cached_content_url(
    inner: &ClientInner,
    name: &str,
    http_options: Option<&HttpOptions>,
) -> String {
    let (base, version) = base_and_version(inner, http_options);
    format!("{}/{version}/{name}", base.trim_end_matches('/'))
}

fn add_list_query_params(url: &str, config: &ListCachedContentsConfig) -> Result<String> {
    let mut url = reqwest::Url::parse(url).map_err(|err| Error::InvalidConfig {
        message: err.to_string(),
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(page_size) = config.page_size {
            pairs.append_pair("pageSize", &page_size.to_string());
        }
        if let Some(page_token) = continuation(config.page_token.as_deref()) {
            pairs.append_pair("pageToken", page_token);
        }
    }
    Ok(url.to_string().trim_end_matches('?').to_string())
}

fn handle_kms_key(inner: &ClientInner, body: &mut Map<String, Value>) -> Result<()> {
    if let Some(kms_key_name) = body.remove("kmsKeyName") {
        match inner.config.backend {
            Backend::GeminiApi => {
                return Err(Error::InvalidConfig {
                    message: "kms_key_name is not supported in Gemini API".into(),
                })
            }
            Backend::VertexAi => {
                body.insert(
                    "encryptionSpec".to_string(),
                    json!({ "kmsKeyName": kms_key_name }),
                );
            }
        }
    }
    Ok(())
}

fn apply_http_options(
    mut request: reqwest::RequestBuilder,
    http_options: Option<&HttpOptions>,
) -> Result<reqwest::RequestBuilder> {
    if let Some(options) = http_options {
        if let Some(timeout) = options.timeout {
            request = request.timeout(Duration::from_millis(timeout));
        }
        for (key, value) in options.headers.iter().flatten() {
            let (name, value) = parse_header(key, value)?;
            request = request.header(name, value);
        }
    }
    Ok(request)
}

fn merge_extra_body(body: &mut Value, http_options: &HttpOptions) -> Result<()> {
    let Some(extra) = &http_options.extra_body else {
        return Ok(());
    };
    match (body, extra) {
        (Value::Object(body_map), Value::Object(extra_map)) => {
            for (key, value) in extra_map {
                body_map.insert(key.clone(), value.clone());
            }
            Ok(())
        }
        _ => Err(Error::InvalidConfig {
            message: "HttpOptions.extra_body must be an object".into(),
        }),
    }
}
