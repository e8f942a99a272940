use crate::{pack_entry, transform, FilterError, KeyMatcher, MatchSet, PackEntry, TokenTransform};
use futures::Stream;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokens::{DepthTracker, OwnerId, PackedEntry, Token};

/// Decides whether a candidate entry's value qualifies its object for
/// release.
#[derive(Clone)]
pub enum ValueMatcher {
    /// The packed value equals this literal.
    Equal(Value),
    /// The packed value is a structural superset of this shape: objects by
    /// key, arrays positionally, scalars by equality.
    Contains(Value),
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl ValueMatcher {
    pub fn predicate(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> ValueMatcher {
        ValueMatcher::Predicate(Arc::new(f))
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueMatcher::Equal(literal) => literal == value,
            ValueMatcher::Contains(shape) => contains(shape, value),
            ValueMatcher::Predicate(f) => f(value),
        }
    }
}

impl fmt::Debug for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueMatcher::Equal(v) => f.debug_tuple("Equal").field(v).finish(),
            ValueMatcher::Contains(v) => f.debug_tuple("Contains").field(v).finish(),
            ValueMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

fn contains(shape: &Value, value: &Value) -> bool {
    match (shape, value) {
        (Value::Object(shape), Value::Object(value)) => shape
            .iter()
            .all(|(key, sv)| value.get(key).map_or(false, |vv| contains(sv, vv))),
        (Value::Array(shape), Value::Array(value)) => {
            shape.len() <= value.len()
                && shape.iter().zip(value).all(|(sv, vv)| contains(sv, vv))
        }
        _ => shape == value,
    }
}

/// Configuration for [`object_sieve`]: ordered `(key, value)` matcher pairs
/// with first-match-wins key semantics.
#[derive(Debug)]
pub struct ObjectSieve {
    filters: Vec<(KeyMatcher, ValueMatcher)>,
    separator: String,
}

impl ObjectSieve {
    pub fn new<I, K>(filters: I) -> ObjectSieve
    where
        I: IntoIterator<Item = (K, ValueMatcher)>,
        K: Into<KeyMatcher>,
    {
        ObjectSieve {
            filters: filters
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
            separator: ".".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> ObjectSieve {
        self.separator = separator.into();
        self
    }
}

/// Buffers each root-level object until one of its entries decides its
/// fate: a matching entry releases the buffered tokens downstream in their
/// original order, a conclusive miss or the object's end discards them.
/// Non-objects at root level pass through unchanged.
///
/// The whole object may reside in the buffer at once; pass only
/// metadata-sized objects through the sieve, or arrange for matching
/// entries to appear early.
pub fn object_sieve<S, E>(
    input: S,
    config: ObjectSieve,
) -> impl Stream<Item = Result<Token, E>> + Send
where
    S: Stream<Item = Result<Token, E>> + Send + 'static,
    E: From<FilterError> + Send + 'static,
{
    let owner = OwnerId::next();
    let keys = MatchSet::new(config.filters.iter().map(|(k, _)| k.clone()))
        .with_separator(config.separator.clone());
    // Non-sparse: decisions need the materialized entry values.
    let packed = pack_entry(input, PackEntry::new(keys).owner(owner));

    // A single literal key filter either matches an entry or can never
    // match this object at all.
    let conclusive_single = config.filters.len() == 1
        && matches!(config.filters[0].0, KeyMatcher::Literal(_));

    transform(
        packed,
        Sieve {
            owner,
            values: config.filters.into_iter().map(|(_, v)| v).collect(),
            conclusive_single,
            depth: DepthTracker::new(),
            outer_is_array: false,
            state: SieveState::Passing,
        },
    )
}

struct Sieve {
    owner: OwnerId,
    values: Vec<ValueMatcher>,
    conclusive_single: bool,
    depth: DepthTracker,
    outer_is_array: bool,
    state: SieveState,
}

enum SieveState {
    Passing,
    Buffering { buffer: Vec<Token>, base: usize },
    Releasing { base: usize },
    Discarding { base: usize },
}

impl Sieve {
    fn decide(&mut self, entry: &PackedEntry, out: &mut Vec<Token>) {
        let SieveState::Buffering { buffer, base } = &mut self.state else {
            // The object's fate is already decided.
            return;
        };
        let base = *base;
        if self.values[entry.matcher].accepts(&entry.value) {
            tracing::debug!(key = %entry.key, "sieve releases object");
            out.append(buffer);
            self.state = SieveState::Releasing { base };
        } else if self.conclusive_single {
            tracing::debug!(key = %entry.key, "sieve discards object on conclusive miss");
            out.extend(buffer.drain(..).filter(Token::is_synthetic));
            self.state = SieveState::Discarding { base };
        }
        // Otherwise stay undecided; another entry may still match.
    }
}

impl TokenTransform for Sieve {
    fn advance(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), FilterError> {
        // Our inner packer's output drives decisions and is never forwarded.
        if let Token::PackedEntry(entry) = &token {
            if entry.owner == Some(self.owner) {
                self.decide(entry, out);
                return Ok(());
            }
        }
        if token.is_synthetic() {
            match &mut self.state {
                SieveState::Buffering { buffer, .. } => buffer.push(token),
                _ => out.push(token),
            }
            return Ok(());
        }

        let depth_before = self.depth.depth();
        if depth_before == 0 {
            self.outer_is_array = matches!(token, Token::StartArray);
        }
        self.depth.update(&token);

        let root_object = matches!(token, Token::StartObject)
            && (depth_before == 0 || (depth_before == 1 && self.outer_is_array));

        match &mut self.state {
            SieveState::Passing => {
                if root_object {
                    self.state = SieveState::Buffering {
                        buffer: vec![token],
                        base: depth_before,
                    };
                } else {
                    out.push(token);
                }
            }
            SieveState::Buffering { buffer, base } => {
                let closing =
                    matches!(token, Token::EndObject) && self.depth.depth() == *base;
                buffer.push(token);
                if closing {
                    // Undecided through the whole object: discard.
                    tracing::debug!("sieve discards undecided object");
                    let buffer = std::mem::take(buffer);
                    out.extend(buffer.into_iter().filter(Token::is_synthetic));
                    self.state = SieveState::Passing;
                }
            }
            SieveState::Releasing { base } => {
                let closing =
                    matches!(token, Token::EndObject) && self.depth.depth() == *base;
                out.push(token);
                if closing {
                    self.state = SieveState::Passing;
                }
            }
            SieveState::Discarding { base } => {
                let closing =
                    matches!(token, Token::EndObject) && self.depth.depth() == *base;
                if closing {
                    self.state = SieveState::Passing;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Token>) -> Result<(), FilterError> {
        let _ = out;
        match self.state {
            SieveState::Passing => Ok(()),
            _ => Err(FilterError::Malformed(
                "stream ended inside a sieved object",
            )),
        }
    }
}
