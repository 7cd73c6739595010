//! Environment variable interpolation for config files.
//!
//! - `$VAR` / `${VAR}`: value of `VAR`, an error if unset
//! - `${VAR:-default}`: `default` if `VAR` is unset or empty
//! - `${VAR-default}`: `default` only if `VAR` is unset
//! - `$$`: a literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        | \$\{ (?P<braced>[A-Za-z_][A-Za-z0-9_]*) (?: (?P<op>:?-) (?P<default>[^}]*) )? \}
        | \$ (?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("placeholder pattern is valid")
});

/// Replace every placeholder in `input`.
///
/// All problems are collected so a config with several missing variables
/// reports them together.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    let mut problems = Vec::new();
    let text = PLACEHOLDER.replace_all(input, |caps: &Captures| {
        let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
            return "$".to_string();
        };
        let name = name.as_str();
        let default = caps.name("default").map(|m| m.as_str());
        let empty_means_unset = caps.name("op").is_some_and(|m| m.as_str() == ":-");

        match env::var(name) {
            Ok(value) if value.contains(['\n', '\r']) => {
                problems.push(format!("environment variable '{name}' contains a newline"));
                String::new()
            }
            Ok(value) if value.is_empty() && empty_means_unset => {
                default.unwrap_or_default().to_string()
            }
            Ok(value) => value,
            Err(_) => match default {
                Some(default) => default.to_string(),
                None => {
                    problems.push(format!("environment variable '{name}' is not set"));
                    String::new()
                }
            },
        }
    });

    if problems.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names so parallel tests don't interfere.
    fn set(key: &str, value: &str) {
        // SAFETY: keys are unique to each test
        unsafe { env::set_var(key, value) }
    }

    fn unset(key: &str) {
        // SAFETY: keys are unique to each test
        unsafe { env::remove_var(key) }
    }

    #[test]
    fn test_braced_and_bare() {
        set("FP_VARS_DIR", "/data/runs");
        assert_eq!(
            interpolate("a: ${FP_VARS_DIR}/x\nb: $FP_VARS_DIR").unwrap(),
            "a: /data/runs/x\nb: /data/runs"
        );
    }

    #[test]
    fn test_defaults() {
        unset("FP_VARS_UNSET");
        set("FP_VARS_EMPTY", "");
        assert_eq!(interpolate("${FP_VARS_UNSET:-200}").unwrap(), "200");
        assert_eq!(interpolate("${FP_VARS_UNSET-200}").unwrap(), "200");
        assert_eq!(interpolate("${FP_VARS_EMPTY:-200}").unwrap(), "200");
        assert_eq!(interpolate("${FP_VARS_EMPTY-200}").unwrap(), "");
    }

    #[test]
    fn test_escape() {
        assert_eq!(interpolate("cost: $$5").unwrap(), "cost: $5");
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        unset("FP_VARS_MISSING_A");
        unset("FP_VARS_MISSING_B");
        let problems = interpolate("${FP_VARS_MISSING_A} $FP_VARS_MISSING_B").unwrap_err();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("FP_VARS_MISSING_A"));
    }

    #[test]
    fn test_newline_rejected() {
        set("FP_VARS_NEWLINE", "a\nb: c");
        assert!(interpolate("x: ${FP_VARS_NEWLINE}").is_err());
    }
}
