use crate::{joined, Step, Token};

/// Tracks the full key path over a token stream: array indices and object
/// keys from the outermost root down to the current cursor position.
///
/// Inside an array the head is `Step::Index`, starting at -1 and bumped as
/// each contained value begins. Inside an object the head is `Step::Pending`
/// until a key completes, after which it holds `Step::Key` until the next
/// key replaces it. A packed `KeyValue` that duplicates a just-streamed key
/// is idempotent, since the head already carries the same key.
#[derive(Debug, Default)]
pub struct StackKeyTracker {
    stack: Vec<Step>,
    key_buf: Option<String>,
    last_end: Option<Streamed>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Streamed {
    String,
    Number,
}

impl StackKeyTracker {
    pub fn new() -> StackKeyTracker {
        StackKeyTracker::default()
    }

    pub fn update(&mut self, token: &Token) {
        if token.is_synthetic() {
            return;
        }
        let last_end = self.last_end.take();

        match token {
            Token::StartObject => {
                self.bump_index();
                self.stack.push(Step::Pending);
            }
            Token::StartArray => {
                self.bump_index();
                self.stack.push(Step::Index(-1));
            }
            Token::EndObject | Token::EndArray => {
                self.stack.pop().expect("container close without matching open");
            }
            Token::StartString | Token::StartNumber => self.bump_index(),
            Token::True | Token::False | Token::Null => self.bump_index(),
            // A packed duplicate immediately after its streamed form is the
            // same value, not a new one.
            Token::StringValue(_) => {
                if last_end != Some(Streamed::String) {
                    self.bump_index();
                }
            }
            Token::NumberValue(_) => {
                if last_end != Some(Streamed::Number) {
                    self.bump_index();
                }
            }
            Token::StartKey => self.key_buf = Some(String::new()),
            Token::StringChunk(chunk) => {
                if let Some(buf) = self.key_buf.as_mut() {
                    buf.push_str(chunk);
                }
            }
            Token::EndKey => {
                let key = self.key_buf.take().expect("endKey without startKey");
                self.set_key(key);
            }
            Token::KeyValue(key) => {
                self.key_buf = None;
                self.set_key(key.clone());
            }
            _ => (),
        }

        self.last_end = match token {
            Token::EndString => Some(Streamed::String),
            Token::EndNumber => Some(Streamed::Number),
            _ => None,
        };
    }

    pub fn stack(&self) -> &[Step] {
        &self.stack
    }

    /// The stack element `offset` levels above the innermost one.
    pub fn head(&self, offset: usize) -> Option<&Step> {
        self.stack.iter().nth_back(offset)
    }

    pub fn joined(&self, separator: &str) -> String {
        joined(&self.stack, separator)
    }

    fn bump_index(&mut self) {
        if let Some(Step::Index(index)) = self.stack.last_mut() {
            *index += 1;
        }
    }

    fn set_key(&mut self, key: String) {
        match self.stack.last_mut() {
            Some(head @ (Step::Pending | Step::Key(_))) => *head = Step::Key(key),
            other => panic!("key outside of object context: {other:?}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(tokens: &[Token]) -> StackKeyTracker {
        let mut tracker = StackKeyTracker::new();
        for token in tokens {
            tracker.update(token);
        }
        tracker
    }

    #[test]
    fn array_indices_start_at_minus_one() {
        let tracker = run(&[Token::StartArray]);
        assert_eq!(tracker.stack(), &[Step::Index(-1)]);

        let tracker = run(&[Token::StartArray, Token::Null]);
        assert_eq!(tracker.stack(), &[Step::Index(0)]);

        let tracker = run(&[Token::StartArray, Token::Null, Token::True]);
        assert_eq!(tracker.stack(), &[Step::Index(1)]);
    }

    #[test]
    fn object_keys_replace_the_head() {
        let tracker = run(&[Token::StartObject]);
        assert_eq!(tracker.stack(), &[Step::Pending]);

        let tracker = run(&[Token::StartObject, Token::KeyValue("a".to_string())]);
        assert_eq!(tracker.stack(), &[Step::Key("a".to_string())]);

        let tracker = run(&[
            Token::StartObject,
            Token::KeyValue("a".to_string()),
            Token::Null,
            Token::KeyValue("b".to_string()),
        ]);
        assert_eq!(tracker.stack(), &[Step::Key("b".to_string())]);
    }

    #[test]
    fn streamed_keys_assemble_from_chunks() {
        let tracker = run(&[
            Token::StartObject,
            Token::StartKey,
            Token::StringChunk("na".to_string()),
            Token::StringChunk("me".to_string()),
            Token::EndKey,
        ]);
        assert_eq!(tracker.stack(), &[Step::Key("name".to_string())]);
    }

    #[test]
    fn packed_key_duplicate_is_idempotent() {
        let tracker = run(&[
            Token::StartObject,
            Token::StartKey,
            Token::StringChunk("name".to_string()),
            Token::EndKey,
            Token::KeyValue("name".to_string()),
        ]);
        assert_eq!(tracker.stack(), &[Step::Key("name".to_string())]);
    }

    #[test]
    fn packed_duplicate_of_streamed_string_does_not_advance_index() {
        // ["x"] with the string in streamed+packed form: one element, not two.
        let tracker = run(&[
            Token::StartArray,
            Token::StartString,
            Token::StringChunk("x".to_string()),
            Token::EndString,
            Token::StringValue("x".to_string()),
        ]);
        assert_eq!(tracker.stack(), &[Step::Index(0)]);
    }

    #[test]
    fn packed_only_values_advance_the_index() {
        let tracker = run(&[
            Token::StartArray,
            Token::StringValue("x".to_string()),
            Token::NumberValue("3".to_string()),
        ]);
        assert_eq!(tracker.stack(), &[Step::Index(1)]);
    }

    #[test]
    fn nested_paths_join() {
        let tracker = run(&[
            Token::StartObject,
            Token::KeyValue("a".to_string()),
            Token::StartArray,
            Token::StartObject,
            Token::KeyValue("b".to_string()),
        ]);
        assert_eq!(tracker.joined("."), "a.0.b");
        assert_eq!(tracker.head(0), Some(&Step::Key("b".to_string())));
        assert_eq!(tracker.head(1), Some(&Step::Index(0)));
        assert_eq!(tracker.head(2), Some(&Step::Key("a".to_string())));
        assert_eq!(tracker.head(3), None);
    }

    #[test]
    fn synthetic_tokens_are_ignored() {
        let mut tracker = run(&[Token::StartArray]);
        tracker.update(&Token::Finish);
        assert_eq!(tracker.stack(), &[Step::Index(-1)]);
    }
}
