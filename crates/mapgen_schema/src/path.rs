//! JSON-pointer style paths used to locate validation problems.

use serde::{Deserialize, Serialize};

/// A JSON pointer such as `/config/foundation/crust/config/ratio`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(String);

impl Path {
    /// The empty (document root) pointer
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Pointer built from unescaped segments
    #[must_use]
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        segments.into_iter().fold(Self::root(), |path, seg| path.child(seg))
    }

    /// Pointer to a child key
    ///
    /// `~` and `/` inside the key are escaped as `~0` and `~1`.
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        let escaped = key.replace('~', "~0").replace('/', "~1");
        Self(format!("{}/{}", self.0, escaped))
    }

    /// Pointer to an array element
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}/{}", self.0, index))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}
