//! `${name}` placeholder substitution for image references.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|\$)").expect("valid regex")
});

/// Replace every `${name}` in `input` with the matching variable.
///
/// `$$` yields a literal `$`.
///
/// # Errors
///
/// Returns the name of the first placeholder without a matching variable.
pub fn substitute(input: &str, vars: &BTreeMap<String, String>) -> Result<String, String> {
    let mut missing: Option<String> = None;
    let output = PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| match caps.get(1) {
        None => "$".to_string(),
        Some(name) => match vars.get(name.as_str()) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.as_str().to_string());
                String::new()
            }
        },
    });

    match missing {
        Some(name) => Err(name),
        None => Ok(output.into_owned()),
    }
}
