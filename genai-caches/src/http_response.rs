use std::collections::HashMap;

use reqwest::header::HeaderMap;

use genai_caches_types::http::HttpResponse;

/// 将响应头收集为 `HttpResponse`，同名头以 `", "` 合并。
pub(crate) fn sdk_http_response_from_headers(headers: &HeaderMap) -> HttpResponse {
    let mut map: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let Ok(value_str) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                if !existing.is_empty() {
                    existing.push_str(", ");
                }
                existing.push_str(value_str);
            })
            .or_insert_with(|| value_str.to_string());
    }

    HttpResponse {
        headers: Some(map),
        body: None,
    }
}
