// Environment variable loading

use std::collections::BTreeMap;
use std::env;

/// Prefix of every relay environment variable.
pub const ENV_PREFIX: &str = "CONTACTS";

/// Collects prefixed variables as lower-cased keys with the prefix removed,
/// so `CONTACTS_BROKER_URL` becomes `broker_url`.
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    /// Create a loader for the given prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: format!("{}_", prefix.to_uppercase()),
        }
    }

    /// Read the process environment
    pub fn load(&self) -> BTreeMap<String, String> {
        self.collect(env::vars())
    }

    /// Keep the pairs carrying this loader's prefix
    pub fn collect<I>(&self, vars: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| {
                key.to_uppercase()
                    .strip_prefix(&self.prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_lowercase(), value))
            })
            .collect()
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}
