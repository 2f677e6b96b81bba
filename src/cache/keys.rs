use crate::error::{StoreError, StoreResult};

/// Namespace holding conversation contexts
pub const CONTEXT_NAMESPACE: &str = "context";
/// Namespace holding each user's active conversation list
pub const ACTIVE_CONVERSATIONS_NAMESPACE: &str = "activeConvs";
/// Namespace holding vector records
pub const VECTOR_NAMESPACE: &str = "vectors";

/// Derives store keys of the form `<prefix><namespace>:<key>`.
///
/// Keys without a namespace sit directly under the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespacer {
    prefix: String,
}

impl KeyNamespacer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fully qualified key for `key` in `namespace`.
    ///
    /// Namespaces must be non-empty and free of `:`, otherwise
    /// `("a:b", "c")` and `("a", "b:c")` would share a key.
    pub fn full_key(&self, key: &str, namespace: Option<&str>) -> StoreResult<String> {
        match namespace {
            Some(ns) => {
                check_namespace(ns)?;
                Ok(format!("{}{}:{}", self.prefix, ns, key))
            }
            None => Ok(format!("{}{}", self.prefix, key)),
        }
    }

    /// KEYS pattern matching every key in `namespace`, or every key under the prefix
    pub fn pattern(&self, namespace: Option<&str>) -> StoreResult<String> {
        match namespace {
            Some(ns) => {
                check_namespace(ns)?;
                Ok(format!("{}{}:*", escape_glob(&self.prefix), escape_glob(ns)))
            }
            None => Ok(format!("{}*", escape_glob(&self.prefix))),
        }
    }

    /// Recover the logical key from a fully qualified one
    pub fn strip<'a>(&self, full_key: &'a str, namespace: Option<&str>) -> Option<&'a str> {
        let rest = full_key.strip_prefix(self.prefix.as_str())?;
        match namespace {
            Some(ns) => rest.strip_prefix(ns)?.strip_prefix(':'),
            None => Some(rest),
        }
    }
}

fn check_namespace(namespace: &str) -> StoreResult<()> {
    if namespace.is_empty() || namespace.contains(':') {
        return Err(StoreError::InvalidArgument(format!(
            "invalid namespace {:?}: must be non-empty and must not contain ':'",
            namespace
        )));
    }
    Ok(())
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
