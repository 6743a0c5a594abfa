use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

/// base64url without padding.
pub fn b64_encode(source: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(source)
}

/// Compact JSON of `value`, base64url without padding.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_vec(value).map(b64_encode)
}
