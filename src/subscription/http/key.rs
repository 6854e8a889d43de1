use std::fmt;
use std::sync::Arc;

/// A single primitive token of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for KeyToken {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeyToken {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for KeyToken {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeyToken {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for KeyToken {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for KeyToken {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Identity of a logical query, used as the cache index.
///
/// A key is an ordered, immutable sequence of tokens: usually a name followed by
/// optional parameters. Two keys are equal iff their token sequences are equal.
///
/// ```
/// use hello_query::subscription::http::QueryKey;
///
/// let a = QueryKey::new("user").with(42);
/// let b = QueryKey::new("user").with(42);
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "user/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    tokens: Arc<[KeyToken]>,
}

impl QueryKey {
    /// Creates a key consisting of a single name token.
    #[must_use]
    pub fn new(name: impl Into<KeyToken>) -> Self {
        let name: KeyToken = name.into();
        Self {
            tokens: Arc::from([name]),
        }
    }

    /// Returns a new key with `token` appended.
    #[must_use]
    pub fn with(&self, token: impl Into<KeyToken>) -> Self {
        self.tokens
            .iter()
            .cloned()
            .chain(std::iter::once(token.into()))
            .collect()
    }

    /// Returns the tokens of this key in order.
    #[must_use]
    pub fn tokens(&self) -> &[KeyToken] {
        &self.tokens
    }
}

impl FromIterator<KeyToken> for QueryKey {
    fn from_iter<I: IntoIterator<Item = KeyToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl From<&str> for QueryKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QueryKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}
