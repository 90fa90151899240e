//! Discriminated result for single-item lookups against an external store.

/// Outcome of looking up one item by key.
///
/// Callers branch on the variant instead of telling "missing" apart from
/// "store unreachable" by inspecting error types.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// The store could not be reached; carries the underlying cause.
    ConnectionFailed(String),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Convert into an `Option`, discarding the failure detail.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(value) => Lookup::Found(f(value)),
            Self::NotFound => Lookup::NotFound,
            Self::ConnectionFailed(detail) => Lookup::ConnectionFailed(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_variant() {
        assert_eq!(Lookup::Found(2).map(|v| v * 2), Lookup::Found(4));
        assert_eq!(Lookup::<i32>::NotFound.map(|v| v * 2), Lookup::NotFound);
        assert_eq!(
            Lookup::<i32>::ConnectionFailed("refused".into()).map(|v| v * 2),
            Lookup::ConnectionFailed("refused".into())
        );
    }

    #[test]
    fn test_found() {
        assert_eq!(Lookup::Found("x").found(), Some("x"));
        assert_eq!(Lookup::<&str>::NotFound.found(), None);
        assert!(!Lookup::<&str>::ConnectionFailed("down".into()).is_found());
    }
}
