//! Minimal prompt-template renderer.
//!
//! Phases reference dependency outputs with a dot-prefixed variable, e.g.
//! `{{._input}}` for the run's original input or `{{.phases.a}}` for the
//! output of dependency phase `a`; the bare form `{{.a}}` resolves the
//! same dependency directly. A reference to a key that is not present in
//! the namespace substitutes the literal sentinel `<no value>` rather
//! than failing the render. Only a malformed tag (unterminated `{{`, or
//! a path that isn't a dotted identifier) is a [`TemplateError`].

use std::collections::HashMap;

use crate::error::TemplateError;

const NO_VALUE: &str = "<no value>";

/// Renders `template` against `namespace`, a mapping of dependency-phase-id
/// (plus the reserved `_input` key) to that dependency's output.
pub fn render(template: &str, namespace: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        match rest.find("{{") {
            None => {
                output.push_str(rest);
                return Ok(output);
            }
            Some(start) => {
                output.push_str(&rest[..start]);
                let after_open = &rest[start + 2..];
                let end = after_open.find("}}").ok_or_else(|| {
                    TemplateError::UnterminatedTag(template.to_string())
                })?;
                let raw_path = after_open[..end].trim();
                output.push_str(&resolve(raw_path, namespace)?);
                rest = &after_open[end + 2..];
            }
        }
    }
}

fn resolve(raw_path: &str, namespace: &HashMap<String, String>) -> Result<String, TemplateError> {
    let path = raw_path
        .strip_prefix('.')
        .filter(|p| !p.is_empty())
        .ok_or_else(|| TemplateError::InvalidPath(raw_path.to_string()))?;

    if !path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(TemplateError::InvalidPath(raw_path.to_string()));
    }

    let key = path.strip_prefix("phases.").unwrap_or(path);
    Ok(namespace
        .get(key)
        .cloned()
        .unwrap_or_else(|| NO_VALUE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_resolves_reserved_input_key() {
        let namespace = ns(&[("_input", "hello")]);
        assert_eq!(render("{{._input}}", &namespace).unwrap(), "hello");
    }

    #[test]
    fn test_render_resolves_bare_dependency_key() {
        let namespace = ns(&[("a", "out-a")]);
        assert_eq!(render("prefix {{.a}} suffix", &namespace).unwrap(), "prefix out-a suffix");
    }

    #[test]
    fn test_render_resolves_nested_phases_key() {
        let namespace = ns(&[("a", "out-a")]);
        assert_eq!(render("{{.phases.a}}", &namespace).unwrap(), "out-a");
    }

    #[test]
    fn test_render_missing_key_substitutes_sentinel() {
        let namespace = ns(&[]);
        assert_eq!(render("{{.ghost}}", &namespace).unwrap(), "<no value>");
    }

    #[test]
    fn test_render_unterminated_tag_is_template_error() {
        let namespace = ns(&[]);
        assert!(matches!(
            render("{{.a", &namespace),
            Err(TemplateError::UnterminatedTag(_))
        ));
    }

    #[test]
    fn test_render_invalid_path_is_template_error() {
        let namespace = ns(&[]);
        assert!(matches!(
            render("{{a}}", &namespace),
            Err(TemplateError::InvalidPath(_))
        ));
        assert!(matches!(
            render("{{.}}", &namespace),
            Err(TemplateError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_render_literal_text_without_tags_passes_through() {
        let namespace = ns(&[]);
        assert_eq!(render("no variables here", &namespace).unwrap(), "no variables here");
    }
}
