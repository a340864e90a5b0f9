use std::sync::Arc;

use dashmap::DashMap;

/// Formats "{prefix}.{scope}" subjects for domain events.
/// Subjects are cached per scope so the publish path does not format.
pub struct SubjectBuilder {
    /// Pre-computed "{prefix}."
    base_prefix: Arc<str>,
    /// Pre-computed "{prefix}.>"
    wildcard: Arc<str>,
    scope_cache: DashMap<&'static str, Arc<str>>,
}

impl SubjectBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('.');
        Self {
            base_prefix: format!("{}.", prefix).into(),
            wildcard: format!("{}.>", prefix).into(),
            scope_cache: DashMap::new(),
        }
    }

    /// Subject for one event scope, e.g. "brx.browser_app_perf"
    #[inline]
    pub fn scope(&self, scope: &'static str) -> Arc<str> {
        if let Some(cached) = self.scope_cache.get(scope) {
            return Arc::clone(cached.value());
        }
        let subject: Arc<str> = format!("{}{}", self.base_prefix, sanitize_token(scope)).into();
        self.scope_cache.insert(scope, Arc::clone(&subject));
        subject
    }

    /// Wildcard matching every scope under the prefix
    pub fn all(&self) -> &str {
        &self.wildcard
    }
}

/// NATS tokens cannot contain '.', '*', '>' or whitespace
fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}
