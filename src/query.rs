use url::form_urlencoded;

/// Decoded query string that keeps repeated keys (`tags=a&tags=b`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|raw| form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    /// Last value for `key`, matching form semantics.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Query string with `key` set to `value`, other pairs kept in order.
    pub fn with(&self, key: &str, value: &str) -> String {
        let mut replaced = false;
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            if k == key {
                if !replaced {
                    serializer.append_pair(k, value);
                    replaced = true;
                }
            } else {
                serializer.append_pair(k, v);
            }
        }
        if !replaced {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Query string with every `key` pair removed.
    pub fn without(&self, key: &str) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.pairs.iter().filter(|(k, _)| k != key) {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}
