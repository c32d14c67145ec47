#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use genai_caches::{Backend, Client, Credentials};

pub fn build_gemini_client(base_url: &str) -> Client {
    Client::builder()
        .api_key("test-key")
        .base_url(base_url)
        .api_version("v1beta")
        .build()
        .unwrap()
}

pub fn build_vertex_client(base_url: &str) -> Client {
    Client::builder()
        .backend(Backend::VertexAi)
        .vertex_project("proj")
        .vertex_location("us-central1")
        .credentials(Credentials::AccessToken("vertex-token".into()))
        .base_url(base_url)
        .api_version("v1beta1")
        .build()
        .unwrap()
}

pub fn cache_json(id: usize) -> Value {
    json!({
        "name": format!("cachedContents/{id}"),
        "model": "models/gemini-1.5-pro-002",
        "usageMetadata": {"totalTokenCount": 1000 + id}
    })
}

/// 挂载一个按 `page_size` 分页、共 `total` 条的列表端点；token 形如 `page-<n>`。
pub async fn mount_paged_list(server: &MockServer, total: usize, page_size: usize) {
    let pages: Vec<Vec<Value>> = (1..=total)
        .map(cache_json)
        .collect::<Vec<_>>()
        .chunks(page_size)
        .map(<[Value]>::to_vec)
        .collect();
    let page_count = pages.len();
    for (index, items) in pages.into_iter().enumerate() {
        let mut body = json!({ "cachedContents": items });
        if index + 1 < page_count {
            body["nextPageToken"] = json!(format!("page-{}", index + 1));
        }
        let mock = Mock::given(method("GET"))
            .and(path("/v1beta/cachedContents"))
            .and(query_param("pageSize", page_size.to_string()));
        let mock = if index == 0 {
            mock.and(query_param_is_missing("pageToken"))
        } else {
            mock.and(query_param("pageToken", format!("page-{index}")))
        };
        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}
