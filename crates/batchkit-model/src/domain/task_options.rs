use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Options handed to the processing function together with the task input.
///
/// Stored as an ordered list of key–value pairs and serialized as a transparent array.
/// Tools use it for per-item parameters such as a target width or output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskOptions(pub Vec<KeyValue>);

impl TaskOptions {
    /// Create an empty option list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builder-style append.
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.push(key, value);
        self
    }

    /// Append a key–value pair.
    ///
    /// Later entries override earlier ones when queried via [`TaskOptions::get`].
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Get the value for a key, returning the last matching entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Parse the value for a key, `None` when missing or unparsable.
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for TaskOptions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::TaskOptions;

    #[test]
    fn new_is_empty() {
        let opts = TaskOptions::new();
        assert!(opts.is_empty());
        assert!(opts.get("width").is_none());
    }

    #[test]
    fn last_write_wins() {
        let opts = TaskOptions::new()
            .with("format", "png")
            .with("width", "800")
            .with("format", "webp");

        assert_eq!(opts.get("format"), Some("webp"));
        assert_eq!(opts.parse::<u32>("width"), Some(800));
        assert_eq!(opts.len(), 3);
    }

    #[test]
    fn parse_rejects_garbage() {
        let opts = TaskOptions::new().with("angle", "ninety");
        assert_eq!(opts.parse::<i32>("angle"), None);
    }


    #[test]
    fn serializes_as_array() {
        let opts = TaskOptions::new().with("format", "png");
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(json, r#"[{"key":"format","value":"png"}]"#);
    }
}
