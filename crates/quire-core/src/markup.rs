use std::borrow::Cow;

use uuid::Uuid;

/// Escapes text for use inside a double- or single-quoted HTML attribute.
pub fn escape_attr(text: &str) -> Cow<'_, str> {
    htmlize::escape_all_quotes(text)
}

/// Wraps rendered markup in the copy/paste affordance when the node carries a value.
///
/// The wrapper is what the delegated click handler looks for: `class="value"` plus the escaped
/// `data-value` attribute.
pub fn wrap_with_value(value: Option<&str>, inner: String) -> String {
    match value {
        Some(value) => format!(
            r#"<span class="value" data-value="{}">{inner}</span>"#,
            escape_attr(value)
        ),
        None => inner,
    }
}

/// A document-unique id for one rendered node.
pub fn fresh_element_id() -> String {
    format!("out-{}", Uuid::new_v4())
}

/// A document-unique id for the block that wraps one render pass.
pub fn fresh_region_id() -> String {
    format!("region-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_wrapper_escapes_quotes_and_markup() {
        let html = wrap_with_value(Some(r#"{:a "<b>" 'c'}"#), "x".to_string());
        let prefix = r#"<span class="value" data-value=""#;
        assert!(html.starts_with(prefix));
        assert!(html.ends_with(r#"">x</span>"#));
        let attr = &html[prefix.len()..html.len() - r#"">x</span>"#.len()];
        assert!(attr.starts_with("{:a &quot;&lt;b&gt;&quot; "));
        assert!(!attr.contains(['"', '\'', '<', '>']));
    }

    #[test]
    fn no_value_means_no_wrapper() {
        assert_eq!(wrap_with_value(None, "<i>x</i>".to_string()), "<i>x</i>");
    }

    #[test]
    fn element_ids_are_unique_and_selector_safe() {
        let a = fresh_element_id();
        let b = fresh_element_id();
        assert_ne!(a, b);
        assert!(a.starts_with("out-"));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }
}
