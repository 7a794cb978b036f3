//! Quad-state boolean for catalog metadata.

use serde::{Deserialize, Serialize};

/// A metadata flag that may be unknown, or meaningless for a backend.
///
/// Catalogs frequently cannot say whether a column is nullable or a
/// constraint deferrable, and some concepts do not exist on some products.
/// `Unknown` and `NotApplicable` render differently and are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaBool {
    /// Definitely true
    True,
    /// Definitely false
    False,
    /// The backend did not report a value
    Unknown,
    /// The concept does not exist on this backend
    NotApplicable,
}

impl MetaBool {
    /// Convert to string representation for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Unknown => "unknown",
            Self::NotApplicable => "N/A",
        }
    }

    /// Parse catalog yes/no style text.
    ///
    /// Accepts `YES`/`NO`, `true`/`false`, `t`/`f` and `1`/`0`; anything else is `Unknown`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("yes" | "true" | "t" | "1") => Self::True,
            Some("no" | "false" | "f" | "0") => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Whether the value is definitely true.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Whether the value is definitely false.
    pub fn is_false(&self) -> bool {
        matches!(self, Self::False)
    }
}

impl From<bool> for MetaBool {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl std::fmt::Display for MetaBool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_values() {
        assert_eq!(MetaBool::parse(Some("YES")), MetaBool::True);
        assert_eq!(MetaBool::parse(Some("no")), MetaBool::False);
        assert_eq!(MetaBool::parse(Some("t")), MetaBool::True);
        assert_eq!(MetaBool::parse(Some("0")), MetaBool::False);
        assert_eq!(MetaBool::parse(Some("maybe")), MetaBool::Unknown);
        assert_eq!(MetaBool::parse(None), MetaBool::Unknown);
    }

    #[test]
    fn test_unknown_and_not_applicable_render_differently() {
        assert_eq!(MetaBool::Unknown.as_str(), "unknown");
        assert_eq!(MetaBool::NotApplicable.to_string(), "N/A");
        assert_ne!(MetaBool::Unknown, MetaBool::NotApplicable);
    }
}
