//! Response envelopes, one per stdout line.

use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody<'a>>,
}

fn render(envelope: Envelope<'_>) -> Value {
    serde_json::to_value(envelope).unwrap_or(Value::Null)
}

pub fn ok(id: &str, result: Value) -> Value {
    render(Envelope {
        id,
        ok: true,
        result: Some(result),
        error: None,
    })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    render(Envelope {
        id,
        ok: false,
        result: None,
        error: Some(ErrorBody {
            code,
            message: message.into(),
            details,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_carry_only_their_branch() {
        assert_eq!(
            ok("1", json!({ "n": 1 })),
            json!({ "id": "1", "ok": true, "result": { "n": 1 } })
        );
        assert_eq!(
            err("2", "not_found", "class not found", None),
            json!({ "id": "2", "ok": false, "error": { "code": "not_found", "message": "class not found" } })
        );
    }
}
