use std::fmt;

/// One component of a key path: the sequence of enclosing object keys and
/// array indices locating the current cursor position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Current index while inside an array. Starts at -1 on `StartArray` and
    /// is incremented as each contained value begins, so the first element
    /// is index 0.
    Index(i64),
    /// The current object key at this level.
    Key(String),
    /// Inside an object, but no key assigned yet.
    Pending,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Index(index) => write!(f, "{index}"),
            Step::Key(key) => f.write_str(key),
            Step::Pending => Ok(()),
        }
    }
}

impl From<&str> for Step {
    fn from(key: &str) -> Step {
        Step::Key(key.to_string())
    }
}

impl From<i64> for Step {
    fn from(index: i64) -> Step {
        Step::Index(index)
    }
}

/// Join a key path with a separator, producing the string form filters
/// compare against. `joined(&[Key("a"), Index(3)], ".")` is `"a.3"`.
pub fn joined(steps: &[Step], separator: &str) -> String {
    JoinedPath { steps, separator }.to_string()
}

/// Display adapter for a key path; avoids the intermediate `String` when
/// formatting into an existing buffer.
pub struct JoinedPath<'a> {
    pub steps: &'a [Step],
    pub separator: &'a str,
}

impl<'a> fmt::Display for JoinedPath<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(self.separator)?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn join_mixes_keys_and_indices() {
        let steps = vec![
            Step::Key("a".to_string()),
            Step::Index(3),
            Step::Key("b".to_string()),
        ];
        assert_eq!(joined(&steps, "."), "a.3.b");
        assert_eq!(joined(&steps, "/"), "a/3/b");
        assert_eq!(joined(&[], "."), "");
    }
}
