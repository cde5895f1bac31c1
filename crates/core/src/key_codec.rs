//! Composite result-key codec.
//!
//! The query layer names every result column `"{accessor}{delimiter}{suffix}"`.
//! The accessor identifies one metric/dimension combination (see
//! [`crate::key_spec`]); the suffix is positional and its meaning belongs to
//! the renderer reading it (a severity label, a bucket index, ...).

/// Delimiter used when none is configured.
pub const DEFAULT_KEY_DELIMITER: &str = "::";

/// A result key split into its accessor and positional suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeKey<'a> {
    pub accessor: &'a str,
    /// `None` when the key carries no delimiter at all.
    pub suffix: Option<&'a str>,
}

/// Encodes and decodes composite result keys.
pub trait KeyCodec: Send + Sync {
    /// Split a raw result key. Never fails: a key without a suffix decodes
    /// to the whole key as accessor.
    fn decode<'a>(&self, key: &'a str) -> CompositeKey<'a>;

    /// Build the raw result key for `accessor` and `suffix`.
    fn encode(&self, accessor: &str, suffix: &str) -> String;
}

/// Codec splitting on the first occurrence of a fixed delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedKeyCodec {
    delimiter: String,
}

impl DelimitedKeyCodec {
    /// Create a codec for the given delimiter. An empty delimiter falls back
    /// to [`DEFAULT_KEY_DELIMITER`].
    pub fn new(delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Self::default();
        }
        Self { delimiter }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }
}

impl Default for DelimitedKeyCodec {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_KEY_DELIMITER.to_string(),
        }
    }
}

impl KeyCodec for DelimitedKeyCodec {
    fn decode<'a>(&self, key: &'a str) -> CompositeKey<'a> {
        match key.split_once(self.delimiter.as_str()) {
            Some((accessor, suffix)) => CompositeKey {
                accessor,
                suffix: Some(suffix),
            },
            None => CompositeKey {
                accessor: key,
                suffix: None,
            },
        }
    }

    fn encode(&self, accessor: &str, suffix: &str) -> String {
        format!("{accessor}{}{suffix}", self.delimiter)
    }
}
