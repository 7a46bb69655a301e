//! 日志消息翻译：把传输错误转成面向运维的文字。

use crate::error::ProtocolError;
use serde_json::Value;

fn http_text(status: u16, message: &str) -> String {
    match status {
        401 | 403 => format!(
            "The network server rejected the credentials (HTTP {}): {}",
            status, message
        ),
        404 => format!("The network server could not find the resource (HTTP 404): {}", message),
        _ => format!("The network server returned HTTP {}: {}", status, message),
    }
}

/// 翻译协议错误。
pub fn translate_error(err: &ProtocolError) -> String {
    match err {
        ProtocolError::ConnectionRefused(target) => {
            format!("Connection refused: the network server at {} is not reachable", target)
        }
        ProtocolError::Timeout(target) => {
            format!("The network server at {} did not respond in time", target)
        }
        ProtocolError::Http { status, message } => http_text(*status, message),
        ProtocolError::Unauthorized(message) => {
            format!("The network is not authorized: {}", message)
        }
        other => other.to_string(),
    }
}

/// 翻译任意 JSON 值：识别常见的传输错误形态，其余原样序列化。
pub fn translate_value(value: &Value) -> String {
    if let Value::String(text) = value {
        return text.clone();
    }
    let code = value.get("code").and_then(Value::as_str);
    let target = value
        .get("address")
        .or_else(|| value.get("url"))
        .and_then(Value::as_str)
        .unwrap_or("the configured address");
    match code {
        Some("ECONNREFUSED") | Some("ENOTFOUND") | Some("EHOSTUNREACH") => {
            return translate_error(&ProtocolError::ConnectionRefused(target.to_string()));
        }
        Some("ETIMEDOUT") | Some("ESOCKETTIMEDOUT") | Some("ECONNABORTED") => {
            return translate_error(&ProtocolError::Timeout(target.to_string()));
        }
        _ => {}
    }
    let status = value
        .get("statusCode")
        .or_else(|| value.get("status"))
        .and_then(Value::as_u64)
        .and_then(|status| u16::try_from(status).ok());
    if let Some(status) = status {
        let message = value
            .get("message")
            .or_else(|| value.get("error"))
            .or_else(|| value.get("body"))
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        return http_text(status, &message);
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn out_of_range_status_is_not_an_http_status() {
        let value = json!({"statusCode": 65_936, "message": "boom"});
        assert_eq!(translate_value(&value), value.to_string());
    }

    #[test]
    fn recognizes_transport_shapes() {
        let refused = translate_value(&json!({"code": "ECONNREFUSED", "address": "10.0.0.1:8080"}));
        assert_eq!(
            refused,
            "Connection refused: the network server at 10.0.0.1:8080 is not reachable"
        );
        let timeout = translate_value(&json!({"code": "ETIMEDOUT"}));
        assert!(timeout.contains("did not respond in time"));
        let status = translate_value(&json!({"statusCode": 500, "message": "boom"}));
        assert_eq!(status, "The network server returned HTTP 500: boom");
    }

    #[test]
    fn unknown_values_are_stringified() {
        assert_eq!(translate_value(&json!({"a": 1})), "{\"a\":1}");
        assert_eq!(translate_value(&json!("plain")), "plain");
    }

    #[test]
    fn rejected_credentials_are_explained() {
        let text = translate_error(&ProtocolError::Http {
            status: 401,
            message: "bad token".to_string(),
        });
        assert!(text.starts_with("The network server rejected the credentials"));
    }
}
