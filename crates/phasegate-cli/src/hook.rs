use serde_json::Value;

/// Text to scan from a host hook payload. A JSON object contributes its
/// `prompt`, or else the string fields of `tool_input`; anything else is
/// scanned verbatim.
pub fn payload_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return raw.to_string();
    }
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) else {
        return raw.to_string();
    };
    if let Some(Value::String(prompt)) = obj.get("prompt") {
        return prompt.clone();
    }
    if let Some(Value::Object(input)) = obj.get("tool_input") {
        let parts: Vec<&str> = input.values().filter_map(Value::as_str).collect();
        return parts.join("\n");
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_payload() {
        assert_eq!(payload_text(r#"{"session_id":"s","prompt":"继续写代码"}"#), "继续写代码");
    }

    #[test]
    fn tool_input_strings_are_joined() {
        let raw = r#"{"tool_name":"Edit","tool_input":{"file_path":"src/a.rs","new_string":"fn a() {}","replace_all":false}}"#;
        let text = payload_text(raw);
        assert!(text.contains("src/a.rs"));
        assert!(text.contains("fn a() {}"));
        assert!(!text.contains("false"));
    }

    #[test]
    fn plain_text_and_bad_json_pass_through() {
        assert_eq!(payload_text("implement login"), "implement login");
        assert_eq!(payload_text("{not json"), "{not json");
        assert_eq!(payload_text(r#"{"other":1}"#), r#"{"other":1}"#);
    }
}
