use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// A fetched WordPress page body with `{{FIELD}}` placeholders.
#[derive(Debug, Clone)]
pub struct Template {
    pub page_id: u64,
    pub title: String,
    body: String,
}

impl Template {
    pub fn new(page_id: u64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            page_id,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Distinct placeholder names in the body.
    pub fn placeholders(&self) -> BTreeSet<String> {
        placeholder_re()
            .captures_iter(&self.body)
            .map(|c| c[1].to_string())
            .collect()
    }

    pub fn render<'a, F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        substitute(&self.body, lookup)
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").unwrap())
}

/// Replace each `{{KEY}}` whose key resolves through `lookup`. Unresolved
/// tokens are copied through unchanged. Single pass: replacement text is
/// never scanned again.
pub fn substitute<'a, F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    placeholder_re()
        .replace_all(text, |caps: &Captures| match lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
