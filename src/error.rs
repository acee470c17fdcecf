use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("{0}")]
    Transport(String),

    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("{0}")]
    Dom(String),
}

impl ClientError {
    pub fn from_js(value: &JsValue) -> Self {
        ClientError::Transport(js_value_to_string(value))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<ClientError> for JsValue {
    fn from(err: ClientError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub fn js_value_to_string(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    // Error objects carry their text in `message`.
    js_sys::Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_message_includes_status_and_detail() {
        let err = ClientError::Http {
            status: 404,
            detail: "Upload abc not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404: Upload abc not found");
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = ClientError::Validation("Enter a title");
        assert_eq!(err.to_string(), "Enter a title");
    }
}
