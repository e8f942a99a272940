use crate::Token;
use serde_json::{Map, Number, Value};

/// Reconstructs a JSON value from any valid token sequence, handling every
/// combination of streamed-only, packed-only, and streamed+packed forms
/// without double-counting.
///
/// `done()` is true whenever the last fully formed value is complete, and
/// `current()` is the latest completed or in-progress value. Feeding a token
/// sequence that violates the grammar is a programmer error and panics; this
/// type is not an input validator.
///
/// In sparse mode (`FullAssembler::sparse()`) no values are materialized:
/// the construction stack grows and shrinks identically and `done()` toggles
/// at the same token boundaries, but `current()` stays `Null`. Filters use
/// this to reuse the completion-detection logic without paying for values
/// they will not read.
#[derive(Debug)]
pub struct FullAssembler {
    sparse: bool,
    done: bool,
    current: Value,
    /// Frames of enclosing in-progress containers: the parent value and the
    /// pending key under which `current` will attach into it.
    stack: Vec<(Value, Option<String>)>,
    key: Option<String>,
    buf: String,
    streaming: Option<Prim>,
    saved_done: bool,
    just_finalized: Option<Prim>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Prim {
    Key,
    String,
    Number,
}

impl FullAssembler {
    pub fn new() -> FullAssembler {
        FullAssembler {
            sparse: false,
            done: true,
            current: Value::Null,
            stack: Vec::new(),
            key: None,
            buf: String::new(),
            streaming: None,
            saved_done: true,
            just_finalized: None,
        }
    }

    pub fn sparse() -> FullAssembler {
        FullAssembler {
            sparse: true,
            ..FullAssembler::new()
        }
    }

    /// True when the last fully formed value is complete (and immediately
    /// after construction, when there is nothing in progress).
    pub fn done(&self) -> bool {
        self.done
    }

    /// The latest completed or in-progress value. Always `Null` in sparse
    /// mode.
    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn into_value(self) -> Value {
        self.current
    }

    /// Depth of the internal construction stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Consume one token. Returns true when this token completed a root
    /// value; packed duplicates of a just-streamed form return false, so a
    /// both-forms stream reports each value exactly once.
    pub fn consume(&mut self, token: &Token) -> bool {
        if token.is_synthetic() {
            return false;
        }
        let just = self.just_finalized.take();

        match token {
            Token::StartObject => {
                self.begin_container(|| Value::Object(Map::new()));
                false
            }
            Token::StartArray => {
                self.begin_container(|| Value::Array(Vec::new()));
                false
            }
            Token::EndObject | Token::EndArray => self.end_container(),

            Token::True => self.primitive(Value::Bool(true)),
            Token::False => self.primitive(Value::Bool(false)),
            Token::Null => self.primitive(Value::Null),

            // Packed primitives are skipped when they duplicate a streamed
            // form that just finalized.
            Token::KeyValue(key) => {
                if just != Some(Prim::Key) {
                    self.set_key(key.clone());
                }
                false
            }
            Token::StringValue(text) => {
                if just != Some(Prim::String) {
                    self.primitive(Value::String(text.clone()))
                } else {
                    false
                }
            }
            Token::NumberValue(text) => {
                if just != Some(Prim::Number) {
                    self.primitive(parse_number(text))
                } else {
                    false
                }
            }

            Token::StartKey => {
                self.begin_streamed(Prim::Key);
                false
            }
            Token::StartString => {
                self.begin_streamed(Prim::String);
                false
            }
            Token::StartNumber => {
                self.begin_streamed(Prim::Number);
                false
            }

            Token::StringChunk(chunk) => {
                match self.streaming {
                    // Keys are always assembled; they are bounded by key
                    // length even in sparse mode.
                    Some(Prim::Key) => self.buf.push_str(chunk),
                    Some(Prim::String) => {
                        if !self.sparse {
                            self.buf.push_str(chunk);
                        }
                    }
                    _ => panic!("string chunk outside of a streamed key or string"),
                }
                false
            }
            Token::NumberChunk(chunk) => {
                assert!(
                    self.streaming == Some(Prim::Number),
                    "number chunk outside of a streamed number"
                );
                if !self.sparse {
                    self.buf.push_str(chunk);
                }
                false
            }

            Token::EndKey => {
                self.end_streamed(Prim::Key);
                let key = std::mem::take(&mut self.buf);
                self.set_key(key);
                self.just_finalized = Some(Prim::Key);
                false
            }
            Token::EndString => {
                self.end_streamed(Prim::String);
                let text = std::mem::take(&mut self.buf);
                let completed = self.primitive(Value::String(text));
                self.just_finalized = Some(Prim::String);
                completed
            }
            Token::EndNumber => {
                self.end_streamed(Prim::Number);
                let text = std::mem::take(&mut self.buf);
                let completed = self.primitive(parse_number(&text));
                self.just_finalized = Some(Prim::Number);
                completed
            }

            Token::PackedEntry(_)
            | Token::SparseKeyStart(_)
            | Token::SparseKeyEnd(_)
            | Token::SparseValueStart(_)
            | Token::SparseValueEnd(_)
            | Token::Finish => unreachable!("synthetic tokens are filtered above"),
        }
    }

    fn begin_streamed(&mut self, prim: Prim) {
        assert!(
            self.streaming.is_none(),
            "streamed {prim:?} start inside another streamed primitive"
        );
        self.streaming = Some(prim);
        self.saved_done = self.done;
        self.done = false;
        self.buf.clear();
    }

    fn end_streamed(&mut self, prim: Prim) {
        assert!(
            self.streaming == Some(prim),
            "streamed {prim:?} end does not match its start"
        );
        self.streaming = None;
        self.done = self.saved_done;
    }

    fn begin_container(&mut self, empty: impl FnOnce() -> Value) {
        if self.done {
            // A new root value begins.
            if !self.sparse {
                self.current = empty();
            }
            self.done = false;
        } else {
            // A child of the currently open container begins.
            let parent = if self.sparse {
                Value::Null
            } else {
                std::mem::replace(&mut self.current, empty())
            };
            self.stack.push((parent, self.key.take()));
        }
    }

    fn end_container(&mut self) -> bool {
        match self.stack.pop() {
            Some((parent, key)) => {
                if !self.sparse {
                    let child = std::mem::replace(&mut self.current, parent);
                    self.attach(child, key);
                }
                false
            }
            // The root container completed; `current` already holds it.
            None => {
                self.done = true;
                true
            }
        }
    }

    fn primitive(&mut self, value: Value) -> bool {
        if self.done {
            // A root value which is complete in a single step.
            if !self.sparse {
                self.current = value;
            }
            true
        } else {
            if !self.sparse {
                let key = self.key.take();
                self.attach(value, key);
            }
            false
        }
    }

    fn attach(&mut self, child: Value, key: Option<String>) {
        match &mut self.current {
            Value::Object(fields) => {
                let key = key.expect("object entry value without a key");
                fields.insert(key, child);
            }
            Value::Array(items) => items.push(child),
            other => panic!("cannot attach a child value to {other:?}"),
        }
    }

    fn set_key(&mut self, key: String) {
        if !self.sparse {
            self.key = Some(key);
        }
    }
}

impl Default for FullAssembler {
    fn default() -> FullAssembler {
        FullAssembler::new()
    }
}

fn parse_number(text: &str) -> Value {
    let float = || {
        let parsed = text.parse::<f64>().expect("malformed number token");
        Number::from_f64(parsed).expect("number tokens are finite")
    };
    let number = if text.bytes().any(|b| matches!(b, b'.' | b'e' | b'E')) {
        float()
    } else if let Ok(n) = text.parse::<i64>() {
        Number::from(n)
    } else if let Ok(n) = text.parse::<u64>() {
        Number::from(n)
    } else {
        // Integer text outside the 64-bit range.
        float()
    };
    Value::Number(number)
}
