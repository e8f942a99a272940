use crate::{transform, FilterError, MatchSet, TokenTransform};
use futures::Stream;
use tokens::{FullAssembler, OwnerId, PackedEntry, SparseEntry, StackKeyTracker, Step, Token};

/// Configuration for [`pack_entry`].
#[derive(Debug)]
pub struct PackEntry {
    matchers: MatchSet,
    sparse: bool,
    discard_component_tokens: bool,
    owner: Option<OwnerId>,
}

impl PackEntry {
    pub fn new(matchers: MatchSet) -> PackEntry {
        PackEntry {
            matchers,
            sparse: false,
            discard_component_tokens: false,
            owner: None,
        }
    }

    /// Emit the four sparse bracket tokens instead of materializing matched
    /// values.
    pub fn sparse(mut self, sparse: bool) -> PackEntry {
        self.sparse = sparse;
        self
    }

    /// Remove a matched entry's key and value tokens from the stream,
    /// leaving only the synthetic output.
    pub fn discard_component_tokens(mut self, discard: bool) -> PackEntry {
        self.discard_component_tokens = discard;
        self
    }

    /// Tag emitted synthetic tokens so downstream stages can recognize this
    /// instance's output among others'.
    pub fn owner(mut self, owner: OwnerId) -> PackEntry {
        self.owner = Some(owner);
        self
    }
}

/// Scans for object entries whose key path matches the configured set. For
/// each match, a [`Token::PackedEntry`] carrying the fully assembled value
/// (or, in sparse mode, bracket tokens around the entry's components) is
/// emitted immediately after the final token of the entry's value,
/// including any trailing packed duplicate.
///
/// In non-sparse mode the matched value is materialized in memory; callers
/// must not match entries whose values are unbounded.
pub fn pack_entry<S, E>(input: S, config: PackEntry) -> impl Stream<Item = Result<Token, E>> + Send
where
    S: Stream<Item = Result<Token, E>> + Send + 'static,
    E: From<FilterError> + Send + 'static,
{
    transform(input, Packer::new(config))
}

struct Packer {
    cfg: PackEntry,
    keys: StackKeyTracker,
    state: State,
}

enum State {
    Idle,
    /// Buffering a streamed key's tokens until the key is known and the
    /// match decision can be made.
    PackingKey { buffer: Vec<Token> },
    /// Key matched; awaiting a possible packed key duplicate.
    FinalizingKey { pending: Pending },
    /// Feeding value tokens to the assembler until the value completes.
    PackingValue { pending: Pending, asm: FullAssembler },
    /// Value complete; awaiting a possible trailing packed duplicate.
    FinalizingValue {
        pending: Pending,
        asm: FullAssembler,
        dup: Dup,
    },
}

struct Pending {
    key: String,
    stack: Vec<Step>,
    matcher: usize,
}

/// Which packed duplicate may legally trail the just-completed value.
#[derive(Clone, Copy, PartialEq)]
enum Dup {
    String,
    Number,
}

impl Packer {
    fn new(cfg: PackEntry) -> Packer {
        Packer {
            cfg,
            keys: StackKeyTracker::new(),
            state: State::Idle,
        }
    }

    /// The match decision for the entry whose key just completed. The
    /// tracker head already holds the assembled key.
    fn matched(&self) -> Option<Pending> {
        let steps = self.keys.stack();
        let matcher = self.cfg.matchers.matched(steps)?;
        let key = match steps.last() {
            Some(Step::Key(key)) => key.clone(),
            _ => return None,
        };
        tracing::debug!(
            path = %tokens::JoinedPath { steps, separator: self.cfg.matchers.separator() },
            matcher, "entry matched"
        );
        Some(Pending {
            key,
            stack: steps.to_vec(),
            matcher,
        })
    }

    fn entry(&self, pending: &Pending) -> SparseEntry {
        SparseEntry {
            key: pending.key.clone(),
            stack: pending.stack.clone(),
            matcher: pending.matcher,
            owner: self.cfg.owner,
        }
    }

    fn new_assembler(&self) -> FullAssembler {
        if self.cfg.sparse {
            FullAssembler::sparse()
        } else {
            FullAssembler::new()
        }
    }

    fn open_key(&self, pending: &Pending, out: &mut Vec<Token>) {
        if self.cfg.sparse {
            out.push(Token::SparseKeyStart(self.entry(pending)));
        }
    }

    /// Close the key bracket and open the value bracket; value tokens follow.
    fn close_key(&self, pending: &Pending, out: &mut Vec<Token>) {
        if self.cfg.sparse {
            out.push(Token::SparseKeyEnd(self.entry(pending)));
            out.push(Token::SparseValueStart(self.entry(pending)));
        }
    }

    fn flush_key(&self, buffer: Vec<Token>, out: &mut Vec<Token>) {
        if self.cfg.discard_component_tokens {
            // Buffered foreign synthetics survive the discard.
            out.extend(buffer.into_iter().filter(Token::is_synthetic));
        } else {
            out.extend(buffer);
        }
    }

    fn emit_synthetic(&self, pending: Pending, asm: FullAssembler, out: &mut Vec<Token>) {
        if self.cfg.sparse {
            out.push(Token::SparseValueEnd(self.entry(&pending)));
        } else {
            out.push(Token::PackedEntry(PackedEntry {
                key: pending.key,
                stack: pending.stack,
                matcher: pending.matcher,
                value: asm.into_value(),
                owner: self.cfg.owner,
            }));
        }
    }

    fn step(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), FilterError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => self.idle(token, out),

            State::PackingKey { mut buffer } => match token {
                Token::StringChunk(_) => {
                    buffer.push(token);
                    self.state = State::PackingKey { buffer };
                    Ok(())
                }
                Token::EndKey => {
                    buffer.push(token);
                    match self.matched() {
                        Some(pending) => {
                            self.open_key(&pending, out);
                            self.flush_key(buffer, out);
                            self.state = State::FinalizingKey { pending };
                        }
                        None => out.extend(buffer),
                    }
                    Ok(())
                }
                _ => Err(FilterError::Malformed(
                    "unexpected token inside a streamed key",
                )),
            },

            State::FinalizingKey { pending } => match token {
                // The packed duplicate of the just-completed key.
                Token::KeyValue(_) => {
                    if !self.cfg.discard_component_tokens {
                        out.push(token);
                    }
                    self.close_key(&pending, out);
                    self.state = State::PackingValue {
                        pending,
                        asm: self.new_assembler(),
                    };
                    Ok(())
                }
                _ => {
                    self.close_key(&pending, out);
                    self.state = State::PackingValue {
                        pending,
                        asm: self.new_assembler(),
                    };
                    // The first token of the entry's value.
                    self.step(token, out)
                }
            },

            State::PackingValue { pending, mut asm } => {
                let dup = match &token {
                    Token::EndString => Some(Dup::String),
                    Token::EndNumber => Some(Dup::Number),
                    _ => None,
                };
                let completed = asm.consume(&token);
                if !self.cfg.discard_component_tokens {
                    out.push(token);
                }
                if !completed {
                    self.state = State::PackingValue { pending, asm };
                } else if let Some(dup) = dup {
                    self.state = State::FinalizingValue { pending, asm, dup };
                } else {
                    // Packed or structural final token: no duplicate can
                    // follow, so the synthetic is due now.
                    self.emit_synthetic(pending, asm, out);
                }
                Ok(())
            }

            State::FinalizingValue { pending, asm, dup } => {
                let is_dup = matches!(
                    (&token, dup),
                    (Token::StringValue(_), Dup::String) | (Token::NumberValue(_), Dup::Number)
                );
                if is_dup {
                    if !self.cfg.discard_component_tokens {
                        out.push(token);
                    }
                    self.emit_synthetic(pending, asm, out);
                    Ok(())
                } else {
                    self.emit_synthetic(pending, asm, out);
                    self.step(token, out)
                }
            }
        }
    }

    fn idle(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), FilterError> {
        match token {
            Token::StartKey => {
                self.state = State::PackingKey {
                    buffer: vec![token],
                };
                Ok(())
            }
            // A packed-only key; the match decision is immediate.
            Token::KeyValue(_) => {
                match self.matched() {
                    Some(pending) => {
                        self.open_key(&pending, out);
                        if !self.cfg.discard_component_tokens {
                            out.push(token);
                        }
                        self.state = State::FinalizingKey { pending };
                    }
                    None => out.push(token),
                }
                Ok(())
            }
            _ => {
                out.push(token);
                Ok(())
            }
        }
    }
}

impl TokenTransform for Packer {
    fn advance(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), FilterError> {
        if token.is_synthetic() {
            // Not ours to interpret; preserve ordering relative to any
            // buffered key run.
            if let State::PackingKey { buffer } = &mut self.state {
                buffer.push(token);
            } else {
                out.push(token);
            }
            return Ok(());
        }
        self.keys.update(&token);
        self.step(token, out)
    }

    fn finish(&mut self, out: &mut Vec<Token>) -> Result<(), FilterError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => Ok(()),
            State::FinalizingValue { pending, asm, .. } => {
                self.emit_synthetic(pending, asm, out);
                Ok(())
            }
            _ => Err(FilterError::Malformed(
                "stream ended inside a matched entry",
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::test::run;
    use crate::MatchSet;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokens::tokenize_value;

    fn pack(tokens: Vec<Token>, config: PackEntry) -> Vec<Token> {
        run(tokens, |input| pack_entry(input, config).boxed()).unwrap()
    }

    #[test]
    fn packs_a_deeply_nested_entry_in_place() {
        // {"a":{"b":{"c":{"d":{"e":"deep"}}}}} with streamed string values.
        let input = vec![
            Token::StartObject,
            Token::KeyValue("a".to_string()),
            Token::StartObject,
            Token::KeyValue("b".to_string()),
            Token::StartObject,
            Token::KeyValue("c".to_string()),
            Token::StartObject,
            Token::KeyValue("d".to_string()),
            Token::StartObject,
            Token::KeyValue("e".to_string()),
            Token::StartString,
            Token::StringChunk("deep".to_string()),
            Token::EndString,
            Token::EndObject,
            Token::EndObject,
            Token::EndObject,
            Token::EndObject,
            Token::EndObject,
        ];

        let out = pack(input.clone(), PackEntry::new(MatchSet::one("a.b.c.d.e")));

        // Original tokens intact, with one synthetic inserted immediately
        // after the EndString of "deep".
        let synthetic_at = out
            .iter()
            .position(|t| matches!(t, Token::PackedEntry(_)))
            .expect("one packed entry");
        assert_eq!(synthetic_at, 13);

        let Token::PackedEntry(entry) = &out[synthetic_at] else {
            unreachable!()
        };
        assert_eq!(entry.key, "e");
        assert_eq!(
            entry.stack,
            vec![
                Step::Key("a".to_string()),
                Step::Key("b".to_string()),
                Step::Key("c".to_string()),
                Step::Key("d".to_string()),
                Step::Key("e".to_string()),
            ]
        );
        assert_eq!(entry.matcher, 0);
        assert_eq!(entry.value, json!("deep"));

        let mut without: Vec<Token> = out.clone();
        without.remove(synthetic_at);
        assert_eq!(without, input);
    }

    #[test]
    fn no_match_is_identity() {
        let mut input = Vec::new();
        tokenize_value(&json!({"a": 1, "b": [true, {"c": "x"}]}), &mut input);

        for discard in [false, true] {
            let out = pack(
                input.clone(),
                PackEntry::new(MatchSet::one("missing")).discard_component_tokens(discard),
            );
            assert_eq!(out, input, "discard={discard}");
        }
    }

    #[test]
    fn streamed_key_with_packed_duplicate_matches_once() {
        let input = vec![
            Token::StartObject,
            Token::StartKey,
            Token::StringChunk("name".to_string()),
            Token::EndKey,
            Token::KeyValue("name".to_string()),
            Token::StringValue("object-1".to_string()),
            Token::EndObject,
        ];
        let out = pack(input.clone(), PackEntry::new(MatchSet::one("name")));

        let packed: Vec<&PackedEntry> = out
            .iter()
            .filter_map(|t| match t {
                Token::PackedEntry(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].value, json!("object-1"));

        // Placement: immediately after the packed value.
        assert_eq!(
            out[5],
            Token::StringValue("object-1".to_string()),
        );
        assert!(matches!(out[6], Token::PackedEntry(_)));
    }

    #[test]
    fn trailing_packed_duplicate_is_included_before_the_synthetic() {
        // Value in streamed+packed form: synthetic must follow the duplicate.
        let input = vec![
            Token::StartObject,
            Token::KeyValue("name".to_string()),
            Token::StartString,
            Token::StringChunk("x".to_string()),
            Token::EndString,
            Token::StringValue("x".to_string()),
            Token::EndObject,
        ];
        let out = pack(input, PackEntry::new(MatchSet::one("name")));
        assert_eq!(out[4], Token::EndString);
        assert_eq!(out[5], Token::StringValue("x".to_string()));
        assert!(matches!(out[6], Token::PackedEntry(_)));
        assert_eq!(out[7], Token::EndObject);
    }

    #[test]
    fn discard_component_tokens_leaves_only_the_synthetic() {
        let input = vec![
            Token::StartObject,
            Token::KeyValue("a".to_string()),
            Token::NumberValue("1".to_string()),
            Token::KeyValue("b".to_string()),
            Token::NumberValue("2".to_string()),
            Token::EndObject,
        ];
        let out = pack(
            input,
            PackEntry::new(MatchSet::one("a")).discard_component_tokens(true),
        );
        assert_eq!(
            out,
            vec![
                Token::StartObject,
                Token::PackedEntry(PackedEntry {
                    key: "a".to_string(),
                    stack: vec![Step::Key("a".to_string())],
                    matcher: 0,
                    value: json!(1),
                    owner: None,
                }),
                Token::KeyValue("b".to_string()),
                Token::NumberValue("2".to_string()),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn sparse_mode_brackets_key_and_value_tokens() {
        let input = vec![
            Token::StartObject,
            Token::StartKey,
            Token::StringChunk("a".to_string()),
            Token::EndKey,
            Token::StartObject,
            Token::KeyValue("inner".to_string()),
            Token::True,
            Token::EndObject,
            Token::EndObject,
        ];
        let owner = OwnerId::next();
        let out = pack(
            input,
            PackEntry::new(MatchSet::one("a")).sparse(true).owner(owner),
        );

        let kinds: Vec<&'static str> = out
            .iter()
            .map(|t| match t {
                Token::SparseKeyStart(_) => "ks",
                Token::SparseKeyEnd(_) => "ke",
                Token::SparseValueStart(_) => "vs",
                Token::SparseValueEnd(_) => "ve",
                Token::PackedEntry(_) => "packed",
                _ => "t",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["t", "ks", "t", "t", "t", "ke", "vs", "t", "t", "t", "t", "ve", "t"]
        );
        for token in &out {
            if let Token::SparseKeyStart(e)
            | Token::SparseKeyEnd(e)
            | Token::SparseValueStart(e)
            | Token::SparseValueEnd(e) = token
            {
                assert_eq!(e.owner, Some(owner));
                assert_eq!(e.key, "a");
            }
        }
    }

    #[test]
    fn entries_inside_a_matched_value_are_not_rematched() {
        // {"a":{"a":1}} with filter "a": only the outer entry packs.
        let mut input = Vec::new();
        tokenize_value(&json!({"a": {"a": 1}}), &mut input);
        let out = pack(input, PackEntry::new(MatchSet::one("a")));
        let packed: Vec<&PackedEntry> = out
            .iter()
            .filter_map(|t| match t {
                Token::PackedEntry(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].value, json!({"a": 1}));
    }

    #[test]
    fn non_matching_streamed_key_is_flushed_in_order() {
        let input = vec![
            Token::StartObject,
            Token::StartKey,
            Token::StringChunk("other".to_string()),
            Token::EndKey,
            Token::Null,
            Token::EndObject,
        ];
        let out = pack(input.clone(), PackEntry::new(MatchSet::one("name")));
        assert_eq!(out, input);
    }

    #[test]
    fn truncated_entry_is_an_error() {
        let input = vec![
            Token::StartObject,
            Token::KeyValue("a".to_string()),
            Token::StartArray,
        ];
        let result = run(input, |s| {
            pack_entry(s, PackEntry::new(MatchSet::one("a"))).boxed()
        });
        assert!(matches!(result, Err(FilterError::Malformed(_))));
    }
}
