//! Regex-routed transform rules.
//!
//! An ordered list of `(predicate, transform)` pairs. The first rule whose
//! `pattern` matches a module path, and none of whose `exclude_patterns` do,
//! decides how that module is transformed.

use regex_lite::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Options handed to a transform, e.g. `verbose=true`.
pub type TransformOptions = BTreeMap<String, String>;

/// One routing rule.
#[derive(Debug, Clone)]
pub struct TransformRule {
    pub pattern: Regex,
    pub exclude_patterns: Vec<Regex>,
    pub transform_id: String,
    pub transform_options: TransformOptions,
}

impl TransformRule {
    /// Whether this rule claims `subject` (a `/`-separated module path).
    #[must_use]
    pub fn matches(&self, subject: &str) -> bool {
        self.pattern.is_match(subject)
            && !self
                .exclude_patterns
                .iter()
                .any(|exclude| exclude.is_match(subject))
    }
}

/// Ordered rule list. Order is precedence.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<TransformRule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: Vec<TransformRule>) -> Self {
        Self { rules }
    }

    /// First rule matching `subject`, or `None` for pass-through.
    #[must_use]
    pub fn select(&self, subject: &str) -> Option<&TransformRule> {
        self.rules.iter().find(|rule| rule.matches(subject))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformRule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The string rules are matched against.
///
/// Paths inside `root` are matched relative to it, so `^src/` style patterns
/// work and the location of the checkout never trips an exclusion. Separators
/// are always `/`.
#[must_use]
pub fn match_subject(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let subject = relative.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        subject.into_owned()
    } else {
        subject.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Split a webpack-style loader string `id?key=value&flag` into an id and options.
///
/// A key without `=` is a boolean flag and maps to `"true"`.
#[must_use]
pub fn parse_loader(loader: &str) -> (String, TransformOptions) {
    let (id, query) = match loader.split_once('?') {
        Some((id, query)) => (id, query),
        None => (loader, ""),
    };

    let mut options = TransformOptions::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let has_value = pair.contains('=');
        for (key, value) in url::form_urlencoded::parse(pair.as_bytes()) {
            let value = if has_value {
                value.into_owned()
            } else {
                "true".to_string()
            };
            options.insert(key.into_owned(), value);
        }
    }

    (id.trim().to_string(), options)
}
