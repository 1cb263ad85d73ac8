//! Cache key derivation.

use std::fmt;

/// Identifies one composite: `(top, bottom, percent)`.
///
/// Both identifiers are rendered with escaped, quoted formatting so that no
/// choice of separator characters inside an identifier can make two distinct
/// triples collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(top: &str, bottom: &str, percent: u8) -> Self {
        Self(format!("emoji_{:?}_{:?}_{}", top, bottom, percent))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_triple_same_key() {
        assert_eq!(CacheKey::new("smile", "cry", 40), CacheKey::new("smile", "cry", 40));
        assert_eq!(CacheKey::new("smile", "cry", 40).as_str(), r#"emoji_"smile"_"cry"_40"#);
    }

    #[test]
    fn order_and_percent_matter() {
        assert_ne!(CacheKey::new("a", "b", 50), CacheKey::new("b", "a", 50));
        assert_ne!(CacheKey::new("a", "b", 50), CacheKey::new("a", "b", 51));
    }

    #[test]
    fn separators_inside_identifiers_do_not_collide() {
        assert_ne!(CacheKey::new("a_b", "c", 1), CacheKey::new("a", "b_c", 1));
        assert_ne!(CacheKey::new("a\"_\"b", "c", 1), CacheKey::new("a", "b\"_\"c", 1));
        assert_ne!(CacheKey::new("x", "y_1", 2), CacheKey::new("x", "y", 12));
    }

    #[test]
    fn no_case_folding() {
        assert_ne!(CacheKey::new("Smile", "cry", 1), CacheKey::new("smile", "cry", 1));
    }
}
