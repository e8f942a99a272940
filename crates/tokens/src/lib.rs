//! Lexical events of a JSON stream, and the trackers that interpret them.
//!
//! A token stream is the flat representation of one or more concatenated
//! JSON values. Keys, strings, and numbers may each appear in streamed form
//! (`StartX`, zero or more chunks, `EndX`), packed form (a single `XValue`),
//! or both, in which case the packed token immediately follows the matching
//! `EndX` and carries the identical text.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

mod assemble;
mod depth;
mod path;
mod stack;

pub use assemble::FullAssembler;
pub use depth::DepthTracker;
pub use path::{joined, JoinedPath, Step};
pub use stack::StackKeyTracker;

/// One lexical event of a JSON stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,

    /// Begin / end of a streamed object key.
    StartKey,
    EndKey,
    /// Begin / end of a streamed string value.
    StartString,
    EndString,
    /// Begin / end of a streamed number value.
    StartNumber,
    EndNumber,

    /// A fragment of the key or string currently being streamed.
    StringChunk(String),
    /// A fragment of the number currently being streamed, as decimal text.
    NumberChunk(String),

    /// A packed (complete) object key.
    KeyValue(String),
    /// A packed string value.
    StringValue(String),
    /// A packed number value, as decimal text.
    NumberValue(String),
    True,
    False,
    Null,

    /// Synthetic: a matched entry whose value has been fully materialized.
    PackedEntry(PackedEntry),
    /// Synthetic: sparse-mode brackets around a matched entry's key tokens.
    SparseKeyStart(SparseEntry),
    SparseKeyEnd(SparseEntry),
    /// Synthetic: sparse-mode brackets around a matched entry's value tokens.
    SparseValueStart(SparseEntry),
    SparseValueEnd(SparseEntry),

    /// Synthetic: appended by a source when it is exhausted, so that sinks
    /// know to finalize their output.
    Finish,
}

impl Token {
    /// Synthetic tokens are produced by filters (or sources) and pass through
    /// every transformer that does not own them.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            Token::PackedEntry(_)
                | Token::SparseKeyStart(_)
                | Token::SparseKeyEnd(_)
                | Token::SparseValueStart(_)
                | Token::SparseValueEnd(_)
                | Token::Finish
        )
    }

    /// True for tokens which begin a new value when read at array level:
    /// container opens, streamed starts, and the packed primitives.
    ///
    /// `StringValue` and `NumberValue` are value starts only when they are
    /// not the trailing duplicate of a streamed form; that distinction needs
    /// one token of look-behind and lives in [`StackKeyTracker`].
    pub fn is_value_start(&self) -> bool {
        matches!(
            self,
            Token::StartObject
                | Token::StartArray
                | Token::StartString
                | Token::StartNumber
                | Token::StringValue(_)
                | Token::NumberValue(_)
                | Token::True
                | Token::False
                | Token::Null
        )
    }
}

/// Opaque identity scoping synthetic tokens to the filter instance that
/// emitted them. Ids are process-unique and compared only by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    pub fn next() -> OwnerId {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        OwnerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Payload of [`Token::PackedEntry`]: a matched object entry with its value
/// fully materialized. Emitted immediately after the final token of the
/// entry's value (including any trailing packed duplicate).
#[derive(Debug, Clone, PartialEq)]
pub struct PackedEntry {
    /// The entry's key.
    pub key: String,
    /// Full key path of the entry, including its key.
    pub stack: Vec<Step>,
    /// Index of the filter that matched, in the order filters were supplied.
    pub matcher: usize,
    pub value: Value,
    pub owner: Option<OwnerId>,
}

/// Payload shared by the four sparse bracket tokens, which delimit a matched
/// entry's key tokens and value tokens without materializing the value.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseEntry {
    pub key: String,
    pub stack: Vec<Step>,
    pub matcher: usize,
    pub owner: Option<OwnerId>,
}

/// Append the packed-form token rendition of `value` to `out`.
///
/// Containers become structural tokens, keys become `KeyValue`, and
/// primitives become their packed tokens. This is the canonical way to turn
/// an in-memory value back into a stream, e.g. for injected entries.
pub fn tokenize_value(value: &Value, out: &mut Vec<Token>) {
    match value {
        Value::Null => out.push(Token::Null),
        Value::Bool(true) => out.push(Token::True),
        Value::Bool(false) => out.push(Token::False),
        Value::Number(n) => out.push(Token::NumberValue(n.to_string())),
        Value::String(s) => out.push(Token::StringValue(s.clone())),
        Value::Array(items) => {
            out.push(Token::StartArray);
            for item in items {
                tokenize_value(item, out);
            }
            out.push(Token::EndArray);
        }
        Value::Object(fields) => {
            out.push(Token::StartObject);
            for (key, field) in fields {
                out.push(Token::KeyValue(key.clone()));
                tokenize_value(field, out);
            }
            out.push(Token::EndObject);
        }
    }
}
