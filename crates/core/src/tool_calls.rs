use serde_json::Value;

use crate::ai_sdk_types::{InvalidToolCall, ToolCall};

/// Strictly parse one tool call's argument text.
///
/// Empty arguments count as `{}`. Anything that is not a JSON object, or a
/// call without a function name, becomes an [`InvalidToolCall`] carrying the
/// raw text and the reason.
pub fn parse_tool_call(
    id: Option<String>,
    name: Option<String>,
    raw_args: &str,
) -> Result<ToolCall, InvalidToolCall> {
    let invalid = |error: String| InvalidToolCall {
        id: id.clone(),
        name: name.clone(),
        args: Some(raw_args.to_string()),
        error: Some(error),
    };
    let Some(fn_name) = name.clone().filter(|n| !n.is_empty()) else {
        return Err(invalid("tool call is missing a function name".into()));
    };
    let args = if raw_args.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str::<Value>(raw_args) {
            Ok(v @ Value::Object(_)) => v,
            Ok(other) => {
                return Err(invalid(format!(
                    "tool call arguments must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
            Err(e) => {
                return Err(invalid(format!(
                    "Function \"{fn_name}\" arguments:\n\n{raw_args}\n\nare not valid JSON. Received JSONDecodeError {e}"
                )))
            }
        }
    };
    Ok(ToolCall {
        id,
        name: fn_name,
        args,
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_object_arguments() {
        let tc = parse_tool_call(Some("abc".into()), Some("get_weather".into()), r#"{"city":"Paris"}"#)
            .unwrap();
        assert_eq!(tc.name, "get_weather");
        assert_eq!(tc.args, json!({"city": "Paris"}));
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let tc = parse_tool_call(None, Some("noop".into()), "  ").unwrap();
        assert_eq!(tc.args, json!({}));
    }

    #[test]
    fn malformed_arguments_keep_raw_text() {
        let bad = parse_tool_call(Some("1".into()), Some("f".into()), "{\"a\": ").unwrap_err();
        assert_eq!(bad.args.as_deref(), Some("{\"a\": "));
        assert!(bad.error.unwrap().contains("are not valid JSON"));
    }

    #[test]
    fn non_object_and_nameless_calls_are_invalid() {
        let arr = parse_tool_call(None, Some("f".into()), "[1]").unwrap_err();
        assert!(arr.error.unwrap().contains("an array"));
        let nameless = parse_tool_call(None, None, "{}").unwrap_err();
        assert!(nameless.error.unwrap().contains("missing a function name"));
    }
}
