use serde_json::Value;

/// Reconcile stored document content with a tool's current content shape.
///
/// - absent (or null) content becomes the template;
/// - two objects merge template-then-stored, stored winning per key, so
///   fields added to a tool after the document was written get defaults;
/// - a bare string stored for a single-string-field template is wrapped
///   into that field;
/// - array content survives only against an array template;
/// - any other shape mismatch against an object or array template falls
///   back to the template. Scalar templates accept stored values as-is.
pub fn normalize_content(template: &Value, raw: Option<&Value>) -> Value {
    let raw = match raw {
        None | Some(Value::Null) => return template.clone(),
        Some(raw) => raw,
    };

    match (template, raw) {
        (Value::Object(defaults), Value::Object(stored)) => {
            let mut merged = defaults.clone();
            for (key, value) in stored {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (Value::Object(defaults), Value::String(text)) => match single_text_field(defaults) {
            Some(field) => {
                let mut wrapped = defaults.clone();
                wrapped.insert(field.to_string(), Value::String(text.clone()));
                Value::Object(wrapped)
            }
            None => template.clone(),
        },
        (Value::Array(_), Value::Array(_)) => raw.clone(),
        (Value::Object(_), _) | (Value::Array(_), _) => template.clone(),
        _ => raw.clone(),
    }
}

fn single_text_field(defaults: &serde_json::Map<String, Value>) -> Option<&str> {
    if defaults.len() != 1 {
        return None;
    }
    let (key, value) = defaults.iter().next()?;
    value.is_string().then_some(key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_uses_template() {
        let template = json!({"text": ""});
        assert_eq!(normalize_content(&template, None), template);
        assert_eq!(normalize_content(&template, Some(&Value::Null)), template);
    }

    #[test]
    fn test_bare_string_wrapped_into_single_field() {
        let template = json!({"text": ""});
        assert_eq!(
            normalize_content(&template, Some(&json!("hello"))),
            json!({"text": "hello"})
        );
    }

    #[test]
    fn test_bare_string_against_multi_field_template_falls_back() {
        let template = json!({"code": "", "language": "javascript"});
        assert_eq!(normalize_content(&template, Some(&json!("x"))), template);
    }

    #[test]
    fn test_objects_merge_with_stored_winning() {
        let template = json!({"code": "", "language": "javascript", "autoRun": true});
        let stored = json!({"code": "1+1", "language": "typescript", "extra": 3});
        assert_eq!(
            normalize_content(&template, Some(&stored)),
            json!({"code": "1+1", "language": "typescript", "autoRun": true, "extra": 3})
        );
    }

    #[test]
    fn test_arrays_only_against_arrays() {
        let list_template = json!([]);
        assert_eq!(
            normalize_content(&list_template, Some(&json!([1, 2]))),
            json!([1, 2])
        );
        assert_eq!(
            normalize_content(&list_template, Some(&json!({"a": 1}))),
            list_template
        );

        let object_template = json!({"tasks": []});
        assert_eq!(
            normalize_content(&object_template, Some(&json!([{"text": "a"}]))),
            object_template
        );
    }

    #[test]
    fn test_scalar_template_keeps_stored_value() {
        assert_eq!(normalize_content(&json!(""), Some(&json!("body"))), json!("body"));
        assert_eq!(normalize_content(&json!(0), Some(&json!(7))), json!(7));
    }
}
