//! Compact ordered-field records used as frame payloads. Semantically
//! equivalent to the JSON objects `spec.md` §3 describes the data model
//! with, but rendered as `key=value,key=value` so the wire never has to
//! carry `{`/`}`/`"`, which already mean something in shell contexts.

use thiserror::Error;

/// A parsed `key=value,key=value` payload, preserving field order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record(Vec<(String, String)>);

/// Errors raised while parsing a required field out of a [`Record`].
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RecordError {
    /// A field named by the caller was not present.
    #[error("missing field {0:?}")]
    MissingField(&'static str),
    /// A field was present but failed to parse as the requested type.
    #[error("field {0:?} has invalid value {1:?}")]
    InvalidValue(&'static str, String),
}

impl Record {
    /// Starts an empty record to be built up with [`Record::with`].
    #[must_use]
    pub fn builder() -> Self {
        Self::default()
    }

    /// Appends a `key=value` field, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    /// Renders the record in wire form.
    #[must_use]
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses wire-form text into a [`Record`]. A bare token with no `=`
    /// is kept as a key with an empty value rather than rejected, since a
    /// malformed field should surface as a typed lookup failure later, not
    /// as a parse error here.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let fields = text
            .split(',')
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (token.to_string(), String::new()),
            })
            .collect();
        Self(fields)
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Looks up a required string field.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingField`] if `key` is absent.
    pub fn field(&self, key: &'static str) -> Result<&str, RecordError> {
        self.raw(key).ok_or(RecordError::MissingField(key))
    }

    /// Looks up a required field and parses it via [`std::str::FromStr`].
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingField`] if absent, or
    /// [`RecordError::InvalidValue`] if present but unparsable.
    pub fn parsed<T: std::str::FromStr>(&self, key: &'static str) -> Result<T, RecordError> {
        let raw = self.field(key)?;
        raw.parse()
            .map_err(|_| RecordError::InvalidValue(key, raw.to_string()))
    }

    /// Looks up an optional boolean field, defaulting to `false` when the
    /// key is entirely absent.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidValue`] if present but not `true`/`false`.
    pub fn bool_or_false(&self, key: &'static str) -> Result<bool, RecordError> {
        match self.raw(key) {
            None => Ok(false),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(RecordError::InvalidValue(key, other.to_string())),
        }
    }
}
