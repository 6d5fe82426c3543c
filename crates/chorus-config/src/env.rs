use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// `{{ env.NAME }}` with an optional `| default("...")` filter
fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
    })
}

/// Substitute environment placeholders in raw configuration text
///
/// Only the `env.` scope is understood. Comment lines are copied through
/// untouched so commented-out secrets never have to be set.
pub(crate) fn expand_env(input: &str) -> Result<String, String> {
    let mut failure: Option<String> = None;

    let lines: Vec<Cow<'_, str>> = input
        .split_inclusive('\n')
        .map(|line| {
            if failure.is_some() || line.trim_start().starts_with('#') {
                return Cow::Borrowed(line);
            }

            placeholder().replace_all(line, |caps: &Captures<'_>| {
                match resolve(&caps[1], caps.get(2).map(|m| m.as_str())) {
                    Ok(value) => value,
                    Err(e) => {
                        failure.get_or_insert(e);
                        String::new()
                    }
                }
            })
        })
        .collect();

    match failure {
        Some(e) => Err(e),
        None => Ok(lines.concat()),
    }
}

fn resolve(key: &str, default: Option<&str>) -> Result<String, String> {
    let Some(name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.to_owned()),
        (Err(_), None) => Err(format!("environment variable not found: `{name}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let input = "[llm.providers.openai]\ntype = \"openai\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_api_key() {
        temp_env::with_var("CHORUS_TEST_KEY", Some("sk-test"), || {
            let out = expand_env("api_key = \"{{ env.CHORUS_TEST_KEY }}\"").unwrap();
            assert_eq!(out, "api_key = \"sk-test\"");
        });
    }

    #[test]
    fn expands_several_on_one_line() {
        let vars = [("CHORUS_HOST", Some("localhost")), ("CHORUS_PORT", Some("8080"))];
        temp_env::with_vars(vars, || {
            let out = expand_env("url = \"http://{{ env.CHORUS_HOST }}:{{env.CHORUS_PORT}}/v1\"").unwrap();
            assert_eq!(out, "url = \"http://localhost:8080/v1\"");
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("CHORUS_ABSENT", || {
            let err = expand_env("api_key = \"{{ env.CHORUS_ABSENT }}\"").unwrap_err();
            assert!(err.contains("CHORUS_ABSENT"));
        });
    }

    #[test]
    fn default_fills_missing_variable() {
        temp_env::with_var_unset("CHORUS_ABSENT", || {
            let out = expand_env("model = \"{{ env.CHORUS_ABSENT | default(\"gpt-4o-mini\") }}\"").unwrap();
            assert_eq!(out, "model = \"gpt-4o-mini\"");
        });
    }

    #[test]
    fn set_variable_wins_over_default() {
        temp_env::with_var("CHORUS_MODEL", Some("o3"), || {
            let out = expand_env("model = \"{{ env.CHORUS_MODEL | default(\"gpt-4o-mini\") }}\"").unwrap();
            assert_eq!(out, "model = \"o3\"");
        });
    }

    #[test]
    fn other_scopes_are_rejected() {
        let err = expand_env("key = \"{{ secrets.KEY }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comments_are_not_expanded() {
        temp_env::with_var_unset("CHORUS_ABSENT", || {
            let input = "  # api_key = \"{{ env.CHORUS_ABSENT }}\"\nmodel = \"x\"\n";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
