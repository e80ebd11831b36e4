use std::collections::HashMap;

/// Case-insensitive multi-map of header field names to their values.
///
/// Every lookup and mutation lower-cases the name first, so `Host`, `host`
/// and `HOST` all address the same entry. A field may repeat; values under
/// one name keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: HashMap<String, Vec<String>>,
}

/// Returns the canonical (lower-cased) form of a header name.
pub fn canonical(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under `key`, keeping any existing values.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(canonical(key))
            .or_default()
            .push(value.into());
    }

    /// Replaces all values under `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(canonical(key), vec![value.into()]);
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&canonical(key))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value stored under `key`, or an empty slice.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&canonical(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Exact match of `value` against any value stored under `key`.
    pub fn contains_value(&self, key: &str, value: &str) -> bool {
        self.get_all(key).iter().any(|v| v == value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&canonical(key))
    }

    /// Removes `key` and returns its values, if any.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(&canonical(key))
    }

    /// Visits every `(name, value)` pair, duplicates included.
    ///
    /// Order across distinct names is unspecified; duplicates of one name
    /// come out in insertion order.
    pub fn for_each(&self, mut visit: impl FnMut(&str, &str)) {
        for (name, value) in self.iter() {
            visit(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values.iter().map(move |v| (name.as_str(), v.as_str()))
        })
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any comma-separated token of any value under `key` equals
    /// `token`, ignoring ASCII case. Used for `Connection` style lists.
    pub fn has_token(&self, key: &str, token: &str) -> bool {
        self.get_all(key)
            .iter()
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }
}
