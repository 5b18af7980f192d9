use std::fmt::Display;

/// Percent-encoded query string builder. Unset values are left out entirely.
#[derive(Debug, Default, Clone)]
pub(crate) struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn opt<V: Display>(mut self, key: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            let value = value.to_string();
            if !value.trim().is_empty() {
                self.pairs.push((key, value));
            }
        }
        self
    }

    pub(crate) fn apply(&self, path: &str) -> String {
        if self.pairs.is_empty() {
            return path.to_string();
        }
        let query = self
            .pairs
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{path}?{query}")
    }
}

/// Encodes one path segment such as a contract id.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
