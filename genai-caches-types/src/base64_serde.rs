use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serializer};

/// 将内联字节编码为 base64 字符串。
pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// 解码 base64 字符串为字节。
pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        data: Vec<u8>,
    }

    #[test]
    fn encodes_as_standard_base64() {
        let value = serde_json::to_value(Wrapper {
            data: b"hello".to_vec(),
        })
        .unwrap();
        assert_eq!(value["data"], "aGVsbG8=");
    }

    #[test]
    fn rejects_invalid_base64() {
        let result = serde_json::from_str::<Wrapper>(r#"{"data":"***"}"#);
        assert!(result.is_err());
    }
}
