use std::fmt::{Display, Formatter, Result as FmtResult};

/// The opaque per-memory token shared by a main asset, its overlay and its
/// metadata record.
///
/// Always stored lower-cased; two identifiers compare equal regardless of
/// the casing they were read with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Normalizes `raw`: trimmed and lower-cased.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
