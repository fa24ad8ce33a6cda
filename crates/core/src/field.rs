//! Field names and indexable entities

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A named index field
///
/// Fields are plain names; whether a field is text, numeric, stored or fast is
/// decided by the index schema, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Field(Cow<'static, str>);

impl Field {
    /// Marker meaning "every field" in return, highlight and facet sets
    pub const ALL: Field = Field(Cow::Borrowed("*"));

    /// Default id field
    pub const ID: Field = Field(Cow::Borrowed("id"));

    /// Create a field from any name
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Field(name.into())
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether this is the "every field" marker
    pub fn is_all(&self) -> bool {
        self.0 == "*"
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Field {
    fn from(name: &'static str) -> Self {
        Field(Cow::Borrowed(name))
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field(Cow::Owned(name))
    }
}

impl AsRef<str> for Field {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Something that can be indexed and later deleted by id
pub trait Entity {
    /// Unique id of this entity
    fn id(&self) -> String;

    /// Field the id is indexed under
    fn id_field(&self) -> Field {
        Field::ID
    }
}
