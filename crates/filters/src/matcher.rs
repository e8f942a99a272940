use regex::Regex;
use tokens::{joined, Step};

/// Matches a key path in its joined string form: either a literal compared
/// for equality, or a regular expression.
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    Literal(String),
    Pattern(Regex),
}

impl KeyMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            KeyMatcher::Literal(literal) => literal == path,
            KeyMatcher::Pattern(pattern) => pattern.is_match(path),
        }
    }

    /// The literal text or the pattern source.
    pub fn as_str(&self) -> &str {
        match self {
            KeyMatcher::Literal(literal) => literal,
            KeyMatcher::Pattern(pattern) => pattern.as_str(),
        }
    }
}

impl From<&str> for KeyMatcher {
    fn from(literal: &str) -> KeyMatcher {
        KeyMatcher::Literal(literal.to_string())
    }
}

impl From<String> for KeyMatcher {
    fn from(literal: String) -> KeyMatcher {
        KeyMatcher::Literal(literal)
    }
}

impl From<Regex> for KeyMatcher {
    fn from(pattern: Regex) -> KeyMatcher {
        KeyMatcher::Pattern(pattern)
    }
}

/// An ordered set of key matchers with first-match-wins semantics, plus the
/// separator used to join path components before comparison.
#[derive(Debug, Clone)]
pub struct MatchSet {
    matchers: Vec<KeyMatcher>,
    separator: String,
}

impl MatchSet {
    pub fn new<I, M>(matchers: I) -> MatchSet
    where
        I: IntoIterator<Item = M>,
        M: Into<KeyMatcher>,
    {
        MatchSet {
            matchers: matchers.into_iter().map(Into::into).collect(),
            separator: ".".to_string(),
        }
    }

    pub fn one(matcher: impl Into<KeyMatcher>) -> MatchSet {
        MatchSet::new([matcher.into()])
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> MatchSet {
        self.separator = separator.into();
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Index of the first matcher accepting the joined path, if any.
    pub fn matched(&self, steps: &[Step]) -> Option<usize> {
        let path = joined(steps, &self.separator);
        self.matchers.iter().position(|m| m.matches(&path))
    }

    pub fn get(&self, index: usize) -> &KeyMatcher {
        &self.matchers[index]
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use regex::Regex;
    use tokens::Step;

    fn steps(parts: &[&str]) -> Vec<Step> {
        parts.iter().map(|p| Step::Key(p.to_string())).collect()
    }

    #[test]
    fn literal_matches_joined_path_exactly() {
        let set = MatchSet::one("a.b");
        assert_eq!(set.matched(&steps(&["a", "b"])), Some(0));
        assert_eq!(set.matched(&steps(&["a"])), None);
        assert_eq!(set.matched(&steps(&["a", "b", "c"])), None);
    }

    #[test]
    fn separator_changes_the_joined_form() {
        let set = MatchSet::one("a/b").with_separator("/");
        assert_eq!(set.matched(&steps(&["a", "b"])), Some(0));
    }

    #[test]
    fn first_match_wins() {
        let set = MatchSet::new([
            KeyMatcher::from(Regex::new(r"^a\.").unwrap()),
            KeyMatcher::from("a.b"),
        ]);
        assert_eq!(set.matched(&steps(&["a", "b"])), Some(0));
    }

    #[test]
    fn indices_join_into_paths() {
        let set = MatchSet::one(Regex::new(r"^\d+\.name$").unwrap());
        let path = vec![Step::Index(3), Step::Key("name".to_string())];
        assert_eq!(set.matched(&path), Some(0));
    }
}
