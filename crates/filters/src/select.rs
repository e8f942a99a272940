use crate::{pack_entry, transform, FilterError, MatchSet, PackEntry, TokenTransform};
use futures::Stream;
use tokens::{OwnerId, Token};

/// Configuration for [`select_entry`].
#[derive(Debug)]
pub struct SelectEntry {
    matchers: MatchSet,
    discard_enclosing_array: bool,
}

impl SelectEntry {
    pub fn new(matchers: MatchSet) -> SelectEntry {
        SelectEntry {
            matchers,
            discard_enclosing_array: true,
        }
    }

    /// When the selected value is an array, suppress its outermost
    /// delimiters so each element streams as a top-level value. Defaults to
    /// true; scalars and objects pass through untouched either way.
    pub fn discard_enclosing_array(mut self, discard: bool) -> SelectEntry {
        self.discard_enclosing_array = discard;
        self
    }
}

/// Keeps only the values of matched entries, discarding everything else in
/// the stream. With `discard_enclosing_array`, a selected array value is
/// unwrapped so its elements become top-level values.
pub fn select_entry<S, E>(
    input: S,
    config: SelectEntry,
) -> impl Stream<Item = Result<Token, E>> + Send
where
    S: Stream<Item = Result<Token, E>> + Send + 'static,
    E: From<FilterError> + Send + 'static,
{
    let owner = OwnerId::next();
    let packed = pack_entry(
        input,
        PackEntry::new(config.matchers).sparse(true).owner(owner),
    );
    transform(
        packed,
        Selector {
            owner,
            unwrap_array: config.discard_enclosing_array,
            region: Region::Outside,
        },
    )
}

struct Selector {
    owner: OwnerId,
    unwrap_array: bool,
    region: Region,
}

enum Region {
    /// Between selections: every grammar token is dropped.
    Outside,
    /// Inside the key brackets of a selection: key tokens are dropped.
    Key,
    /// Inside the value brackets: tokens pass, with the outermost array
    /// delimiters suppressed when unwrapping.
    Value {
        depth: usize,
        first: bool,
        unwrapped: bool,
    },
}

impl TokenTransform for Selector {
    fn advance(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), FilterError> {
        // Our own brackets switch regions and are themselves dropped.
        let mine = match &token {
            Token::SparseKeyStart(e) => {
                if e.owner == Some(self.owner) {
                    self.region = Region::Key;
                    true
                } else {
                    false
                }
            }
            Token::SparseKeyEnd(e) => {
                if e.owner == Some(self.owner) {
                    self.region = Region::Outside;
                    true
                } else {
                    false
                }
            }
            Token::SparseValueStart(e) => {
                if e.owner == Some(self.owner) {
                    self.region = Region::Value {
                        depth: 0,
                        first: true,
                        unwrapped: false,
                    };
                    true
                } else {
                    false
                }
            }
            Token::SparseValueEnd(e) => {
                if e.owner == Some(self.owner) {
                    self.region = Region::Outside;
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if mine {
            return Ok(());
        }

        if token.is_synthetic() {
            out.push(token);
            return Ok(());
        }

        match &mut self.region {
            Region::Outside | Region::Key => (),
            Region::Value {
                depth,
                first,
                unwrapped,
            } => {
                if *first && self.unwrap_array && matches!(token, Token::StartArray) {
                    *unwrapped = true;
                    *depth = 1;
                    *first = false;
                    return Ok(());
                }
                *first = false;
                match token {
                    Token::StartObject | Token::StartArray => *depth += 1,
                    Token::EndObject | Token::EndArray => *depth -= 1,
                    _ => (),
                }
                if *unwrapped && *depth == 0 && matches!(token, Token::EndArray) {
                    // The unwrapped array's closing delimiter.
                    return Ok(());
                }
                out.push(token);
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Token>) -> Result<(), FilterError> {
        let _ = out;
        match self.region {
            Region::Outside => Ok(()),
            _ => Err(FilterError::Malformed(
                "stream ended inside a selected entry",
            )),
        }
    }
}
