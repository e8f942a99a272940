use crate::CodecError;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use tokens::Token;

/// Which forms keys, strings, and numbers take in the produced stream.
/// Enabling both emits the streamed form immediately followed by its packed
/// duplicate. Booleans and null are always packed. If both forms of a class
/// are disabled, the packed form is re-enabled; something must be emitted.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub stream_keys: bool,
    pub pack_keys: bool,
    pub stream_strings: bool,
    pub pack_strings: bool,
    pub stream_numbers: bool,
    pub pack_numbers: bool,
    /// Streamed fragments are flushed once they reach this many bytes.
    pub chunk_size: usize,
}

impl Default for LexerConfig {
    fn default() -> LexerConfig {
        LexerConfig {
            stream_keys: true,
            pack_keys: true,
            stream_strings: true,
            pack_strings: true,
            stream_numbers: true,
            pack_numbers: true,
            chunk_size: 1024,
        }
    }
}

impl LexerConfig {
    /// Profile for documents dominated by one large string per entry:
    /// packed keys and numbers, streamed strings. Minimizes resident memory
    /// when the strings are the bulk of the document.
    pub fn big_string() -> LexerConfig {
        LexerConfig {
            stream_keys: false,
            pack_keys: true,
            stream_strings: true,
            pack_strings: false,
            stream_numbers: false,
            pack_numbers: true,
            ..LexerConfig::default()
        }
    }

    /// Everything packed; the most compact stream for small documents.
    pub fn packed() -> LexerConfig {
        LexerConfig {
            stream_keys: false,
            pack_keys: true,
            stream_strings: false,
            pack_strings: true,
            stream_numbers: false,
            pack_numbers: true,
            ..LexerConfig::default()
        }
    }

    fn normalized(mut self) -> LexerConfig {
        if !self.stream_keys && !self.pack_keys {
            self.pack_keys = true;
        }
        if !self.stream_strings && !self.pack_strings {
            self.pack_strings = true;
        }
        if !self.stream_numbers && !self.pack_numbers {
            self.pack_numbers = true;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StrKind {
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lit {
    True,
    False,
    Null,
}

impl Lit {
    fn text(self) -> &'static [u8] {
        match self {
            Lit::True => b"true",
            Lit::False => b"false",
            Lit::Null => b"null",
        }
    }

    fn token(self) -> Token {
        match self {
            Lit::True => Token::True,
            Lit::False => Token::False,
            Lit::Null => Token::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NumState {
    Sign,
    Zero,
    Int,
    Dot,
    Frac,
    Exp,
    ExpSign,
    ExpDigits,
}

impl NumState {
    /// May a number legally end in this state?
    fn terminal(self) -> bool {
        matches!(
            self,
            NumState::Zero | NumState::Int | NumState::Frac | NumState::ExpDigits
        )
    }

    fn step(self, b: u8) -> Option<NumState> {
        match (self, b) {
            (NumState::Sign, b'0') => Some(NumState::Zero),
            (NumState::Sign, b'1'..=b'9') => Some(NumState::Int),
            (NumState::Zero, b'.') | (NumState::Int, b'.') => Some(NumState::Dot),
            (NumState::Zero, b'e' | b'E')
            | (NumState::Int, b'e' | b'E')
            | (NumState::Frac, b'e' | b'E') => Some(NumState::Exp),
            (NumState::Int, b'0'..=b'9') => Some(NumState::Int),
            (NumState::Dot, b'0'..=b'9') | (NumState::Frac, b'0'..=b'9') => Some(NumState::Frac),
            (NumState::Exp, b'+' | b'-') => Some(NumState::ExpSign),
            (NumState::Exp, b'0'..=b'9')
            | (NumState::ExpSign, b'0'..=b'9')
            | (NumState::ExpDigits, b'0'..=b'9') => Some(NumState::ExpDigits),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    /// Expecting a value: at the root, after `:`, or after `,` in an array.
    Value,
    /// Expecting a value or `]`.
    ArrayFirst,
    /// Expecting a key or `}`.
    KeyFirst,
    /// Expecting a key.
    Key,
    /// Expecting `:`.
    Colon,
    /// Expecting `,`, a container close, or (at the root) the next value.
    AfterValue,
    Str(StrKind),
    Esc(StrKind),
    Unicode {
        kind: StrKind,
        high: Option<u16>,
        acc: u16,
        digits: u8,
    },
    /// Between a high surrogate escape and the `\u` of its low half.
    SurrogateBackslash {
        kind: StrKind,
        high: u16,
    },
    SurrogateU {
        kind: StrKind,
        high: u16,
    },
    Number(NumState),
    Literal {
        lit: Lit,
        matched: u8,
    },
}

/// Incremental JSON lexer. Feed byte chunks with [`Lexer::push`], drain
/// tokens with [`Lexer::pop`], and call [`Lexer::finish`] at end of input.
/// Chunks may split the input anywhere, including inside escapes and
/// multi-byte UTF-8 sequences.
pub struct Lexer {
    cfg: LexerConfig,
    out: VecDeque<Token>,
    /// Unconsumed input tail (at most one incomplete escape or character).
    pending: Vec<u8>,
    /// Absolute offset of `pending[0]` in the overall input.
    offset: u64,
    containers: Vec<Container>,
    mode: Mode,
    /// Packed-form accumulation for the current key, string, or number.
    text: String,
    /// Streamed-fragment accumulation, flushed at `chunk_size`.
    chunk: String,
    finished: bool,
}

impl Lexer {
    pub fn new(config: LexerConfig) -> Lexer {
        Lexer {
            cfg: config.normalized(),
            out: VecDeque::new(),
            pending: Vec::new(),
            offset: 0,
            containers: Vec::new(),
            mode: Mode::Value,
            text: String::new(),
            chunk: String::new(),
            finished: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        debug_assert!(!self.finished, "push after finish");
        self.pending.extend_from_slice(bytes);
        self.scan()
    }

    pub fn pop(&mut self) -> Option<Token> {
        self.out.pop_front()
    }

    pub fn finish(&mut self) -> Result<(), CodecError> {
        if self.finished {
            return Ok(());
        }
        if !self.pending.is_empty() {
            return Err(CodecError::UnexpectedEof);
        }
        match self.mode {
            Mode::Number(state) if state.terminal() => {
                self.end_number();
                self.mode = Mode::AfterValue;
            }
            Mode::Value | Mode::AfterValue => (),
            _ => return Err(CodecError::UnexpectedEof),
        }
        if !self.containers.is_empty() {
            return Err(CodecError::UnexpectedEof);
        }
        self.finished = true;
        Ok(())
    }

    fn syntax(&self, at: usize, message: &'static str) -> CodecError {
        CodecError::Syntax {
            offset: self.offset + at as u64,
            message,
        }
    }

    fn stream(&self, kind: StrKind) -> bool {
        match kind {
            StrKind::Key => self.cfg.stream_keys,
            StrKind::Value => self.cfg.stream_strings,
        }
    }

    fn pack(&self, kind: StrKind) -> bool {
        match kind {
            StrKind::Key => self.cfg.pack_keys,
            StrKind::Value => self.cfg.pack_strings,
        }
    }

    fn open_string(&mut self, kind: StrKind) {
        self.text.clear();
        self.chunk.clear();
        if self.stream(kind) {
            self.out.push_back(match kind {
                StrKind::Key => Token::StartKey,
                StrKind::Value => Token::StartString,
            });
        }
        self.mode = Mode::Str(kind);
    }

    fn flush_chunk(&mut self, number: bool) {
        if self.chunk.is_empty() {
            return;
        }
        let fragment = std::mem::take(&mut self.chunk);
        self.out.push_back(if number {
            Token::NumberChunk(fragment)
        } else {
            Token::StringChunk(fragment)
        });
    }

    fn push_char(&mut self, kind: StrKind, c: char) {
        if self.stream(kind) {
            self.chunk.push(c);
            if self.chunk.len() >= self.cfg.chunk_size {
                self.flush_chunk(false);
            }
        }
        if self.pack(kind) {
            self.text.push(c);
        }
    }

    fn close_string(&mut self, kind: StrKind) {
        if self.stream(kind) {
            self.flush_chunk(false);
            self.out.push_back(match kind {
                StrKind::Key => Token::EndKey,
                StrKind::Value => Token::EndString,
            });
        }
        if self.pack(kind) {
            let text = std::mem::take(&mut self.text);
            self.out.push_back(match kind {
                StrKind::Key => Token::KeyValue(text),
                StrKind::Value => Token::StringValue(text),
            });
        }
        self.mode = match kind {
            StrKind::Key => Mode::Colon,
            StrKind::Value => Mode::AfterValue,
        };
    }

    fn open_number(&mut self) {
        self.text.clear();
        self.chunk.clear();
        if self.cfg.stream_numbers {
            self.out.push_back(Token::StartNumber);
        }
    }

    fn num_push(&mut self, b: u8) {
        if self.cfg.stream_numbers {
            self.chunk.push(b as char);
            if self.chunk.len() >= self.cfg.chunk_size {
                self.flush_chunk(true);
            }
        }
        if self.cfg.pack_numbers {
            self.text.push(b as char);
        }
    }

    fn end_number(&mut self) {
        if self.cfg.stream_numbers {
            self.flush_chunk(true);
            self.out.push_back(Token::EndNumber);
        }
        if self.cfg.pack_numbers {
            self.out.push_back(Token::NumberValue(std::mem::take(&mut self.text)));
        }
    }

    fn begin_value(&mut self, b: u8, at: usize) -> Result<(), CodecError> {
        match b {
            b'{' => {
                self.containers.push(Container::Object);
                self.out.push_back(Token::StartObject);
                self.mode = Mode::KeyFirst;
            }
            b'[' => {
                self.containers.push(Container::Array);
                self.out.push_back(Token::StartArray);
                self.mode = Mode::ArrayFirst;
            }
            b'"' => self.open_string(StrKind::Value),
            b'-' => {
                self.open_number();
                self.num_push(b);
                self.mode = Mode::Number(NumState::Sign);
            }
            b'0' => {
                self.open_number();
                self.num_push(b);
                self.mode = Mode::Number(NumState::Zero);
            }
            b'1'..=b'9' => {
                self.open_number();
                self.num_push(b);
                self.mode = Mode::Number(NumState::Int);
            }
            b't' => self.mode = Mode::Literal { lit: Lit::True, matched: 1 },
            b'f' => self.mode = Mode::Literal { lit: Lit::False, matched: 1 },
            b'n' => self.mode = Mode::Literal { lit: Lit::Null, matched: 1 },
            _ => return Err(self.syntax(at, "expected a value")),
        }
        Ok(())
    }

    fn close_container(&mut self, expect: Container, at: usize) -> Result<(), CodecError> {
        match self.containers.pop() {
            Some(container) if container == expect => {
                self.out.push_back(match expect {
                    Container::Object => Token::EndObject,
                    Container::Array => Token::EndArray,
                });
                self.mode = Mode::AfterValue;
                Ok(())
            }
            _ => Err(self.syntax(at, "mismatched container close")),
        }
    }

    fn scan(&mut self) -> Result<(), CodecError> {
        let len = self.pending.len();
        let mut i = 0;

        while i < len {
            let b = self.pending[i];
            match self.mode {
                Mode::Str(kind) => {
                    let rest = &self.pending[i..];
                    let stop = memchr::memchr2(b'"', b'\\', rest).unwrap_or(rest.len());
                    if let Some(ctl) = rest[..stop].iter().position(|&b| b < 0x20) {
                        return Err(self.syntax(i + ctl, "control character in string"));
                    }
                    let (valid, complete) = match std::str::from_utf8(&rest[..stop]) {
                        Ok(_) => (stop, true),
                        // An incomplete character at the very end of the
                        // available input; wait for the next chunk.
                        Err(e) if e.error_len().is_none() && stop == rest.len() => {
                            (e.valid_up_to(), false)
                        }
                        Err(e) => {
                            let at = i + e.valid_up_to();
                            return Err(CodecError::Utf8 {
                                offset: self.offset + at as u64,
                            });
                        }
                    };
                    if valid > 0 {
                        let run = std::str::from_utf8(&self.pending[i..i + valid])
                            .expect("validated utf-8 run");
                        let stream = match kind {
                            StrKind::Key => self.cfg.stream_keys,
                            StrKind::Value => self.cfg.stream_strings,
                        };
                        let pack = match kind {
                            StrKind::Key => self.cfg.pack_keys,
                            StrKind::Value => self.cfg.pack_strings,
                        };
                        if stream {
                            for c in run.chars() {
                                self.chunk.push(c);
                                if self.chunk.len() >= self.cfg.chunk_size {
                                    self.out.push_back(Token::StringChunk(std::mem::take(
                                        &mut self.chunk,
                                    )));
                                }
                            }
                        }
                        if pack {
                            self.text.push_str(run);
                        }
                        i += valid;
                    }
                    if !complete {
                        break;
                    }
                    if i < len {
                        match self.pending[i] {
                            b'"' => {
                                i += 1;
                                self.close_string(kind);
                            }
                            b'\\' => {
                                i += 1;
                                self.mode = Mode::Esc(kind);
                            }
                            _ => unreachable!("memchr stops at a terminator"),
                        }
                    }
                }

                Mode::Esc(kind) => {
                    i += 1;
                    match b {
                        b'"' => self.push_char(kind, '"'),
                        b'\\' => self.push_char(kind, '\\'),
                        b'/' => self.push_char(kind, '/'),
                        b'b' => self.push_char(kind, '\u{0008}'),
                        b'f' => self.push_char(kind, '\u{000c}'),
                        b'n' => self.push_char(kind, '\n'),
                        b'r' => self.push_char(kind, '\r'),
                        b't' => self.push_char(kind, '\t'),
                        b'u' => {
                            self.mode = Mode::Unicode {
                                kind,
                                high: None,
                                acc: 0,
                                digits: 0,
                            };
                            continue;
                        }
                        _ => return Err(self.syntax(i - 1, "invalid escape")),
                    }
                    self.mode = Mode::Str(kind);
                }

                Mode::Unicode {
                    kind,
                    high,
                    acc,
                    digits,
                } => {
                    let digit = match b {
                        b'0'..=b'9' => b - b'0',
                        b'a'..=b'f' => b - b'a' + 10,
                        b'A'..=b'F' => b - b'A' + 10,
                        _ => return Err(self.syntax(i, "invalid unicode escape")),
                    };
                    i += 1;
                    let acc = (acc << 4) | digit as u16;
                    if digits < 3 {
                        self.mode = Mode::Unicode {
                            kind,
                            high,
                            acc,
                            digits: digits + 1,
                        };
                        continue;
                    }
                    match high {
                        None if (0xd800..=0xdbff).contains(&acc) => {
                            self.mode = Mode::SurrogateBackslash { kind, high: acc };
                        }
                        None if (0xdc00..=0xdfff).contains(&acc) => {
                            return Err(self.syntax(i.saturating_sub(4), "unpaired low surrogate"));
                        }
                        None => {
                            let c = char::from_u32(acc as u32).expect("not a surrogate");
                            self.push_char(kind, c);
                            self.mode = Mode::Str(kind);
                        }
                        Some(high) if (0xdc00..=0xdfff).contains(&acc) => {
                            let c = 0x10000
                                + (((high as u32) - 0xd800) << 10)
                                + ((acc as u32) - 0xdc00);
                            let c = char::from_u32(c).expect("valid surrogate pair");
                            self.push_char(kind, c);
                            self.mode = Mode::Str(kind);
                        }
                        Some(_) => {
                            return Err(self.syntax(i.saturating_sub(4), "unpaired high surrogate"))
                        }
                    }
                }

                Mode::SurrogateBackslash { kind, high } => {
                    if b != b'\\' {
                        return Err(self.syntax(i, "unpaired high surrogate"));
                    }
                    i += 1;
                    self.mode = Mode::SurrogateU { kind, high };
                }

                Mode::SurrogateU { kind, high } => {
                    if b != b'u' {
                        return Err(self.syntax(i, "unpaired high surrogate"));
                    }
                    i += 1;
                    self.mode = Mode::Unicode {
                        kind,
                        high: Some(high),
                        acc: 0,
                        digits: 0,
                    };
                }

                Mode::Number(state) => match state.step(b) {
                    Some(next) => {
                        self.num_push(b);
                        self.mode = Mode::Number(next);
                        i += 1;
                    }
                    None => {
                        if !state.terminal() {
                            return Err(self.syntax(i, "malformed number"));
                        }
                        self.end_number();
                        self.mode = Mode::AfterValue;
                        // Reprocess the delimiter.
                    }
                },

                Mode::Literal { lit, matched } => {
                    let text = lit.text();
                    if b != text[matched as usize] {
                        return Err(self.syntax(i, "invalid literal"));
                    }
                    i += 1;
                    if matched as usize + 1 == text.len() {
                        self.out.push_back(lit.token());
                        self.mode = Mode::AfterValue;
                    } else {
                        self.mode = Mode::Literal {
                            lit,
                            matched: matched + 1,
                        };
                    }
                }

                Mode::Value
                | Mode::ArrayFirst
                | Mode::KeyFirst
                | Mode::Key
                | Mode::Colon
                | Mode::AfterValue => {
                    if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                        i += 1;
                        continue;
                    }
                    match self.mode {
                        Mode::Value => {
                            self.begin_value(b, i)?;
                            i += 1;
                        }
                        Mode::ArrayFirst => {
                            if b == b']' {
                                self.close_container(Container::Array, i)?;
                            } else {
                                self.begin_value(b, i)?;
                            }
                            i += 1;
                        }
                        Mode::KeyFirst => {
                            if b == b'}' {
                                self.close_container(Container::Object, i)?;
                            } else if b == b'"' {
                                self.open_string(StrKind::Key);
                            } else {
                                return Err(self.syntax(i, "expected a key"));
                            }
                            i += 1;
                        }
                        Mode::Key => {
                            if b != b'"' {
                                return Err(self.syntax(i, "expected a key"));
                            }
                            self.open_string(StrKind::Key);
                            i += 1;
                        }
                        Mode::Colon => {
                            if b != b':' {
                                return Err(self.syntax(i, "expected ':'"));
                            }
                            self.mode = Mode::Value;
                            i += 1;
                        }
                        Mode::AfterValue => match b {
                            b',' => {
                                self.mode = match self.containers.last() {
                                    Some(Container::Object) => Mode::Key,
                                    Some(Container::Array) => Mode::Value,
                                    None => {
                                        return Err(self.syntax(i, "unexpected ',' at root"))
                                    }
                                };
                                i += 1;
                            }
                            b'}' => {
                                self.close_container(Container::Object, i)?;
                                i += 1;
                            }
                            b']' => {
                                self.close_container(Container::Array, i)?;
                                i += 1;
                            }
                            _ => {
                                if self.containers.is_empty() {
                                    // The next of several concatenated root
                                    // values.
                                    self.begin_value(b, i)?;
                                    i += 1;
                                } else {
                                    return Err(self.syntax(i, "expected ',' or a close"));
                                }
                            }
                        },
                        _ => unreachable!(),
                    }
                }
            }
        }

        self.offset += i as u64;
        self.pending.drain(..i);
        Ok(())
    }
}

/// Lex a complete in-memory document.
pub fn lex_slice(bytes: &[u8], config: LexerConfig) -> Result<Vec<Token>, CodecError> {
    let mut lexer = Lexer::new(config);
    lexer.push(bytes)?;
    lexer.finish()?;
    Ok(lexer.out.into_iter().collect())
}

/// Lift the lexer onto a stream of byte chunks.
pub fn lex<S, B, E>(input: S, config: LexerConfig) -> impl Stream<Item = Result<Token, E>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: From<CodecError> + Send + 'static,
{
    coroutines::try_coroutine(move |mut co| async move {
        let mut lexer = Lexer::new(config);
        let mut input = std::pin::pin!(input);
        let mut count = 0u64;
        while let Some(chunk) = input.next().await {
            let chunk = chunk?;
            lexer.push(chunk.as_ref()).map_err(E::from)?;
            while let Some(token) = lexer.pop() {
                count += 1;
                co.yield_(token).await;
            }
        }
        lexer.finish().map_err(E::from)?;
        while let Some(token) = lexer.pop() {
            count += 1;
            co.yield_(token).await;
        }
        tracing::debug!(tokens = count, "lexed input to completion");
        Ok(())
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn packed(input: &str) -> Vec<Token> {
        lex_slice(input.as_bytes(), LexerConfig::packed()).unwrap()
    }

    #[test]
    fn lexes_scalars_and_containers() {
        assert_eq!(
            packed(r#"{"a":[1,true,null,"x"],"b":-2.5e3}"#),
            vec![
                Token::StartObject,
                Token::KeyValue("a".to_string()),
                Token::StartArray,
                Token::NumberValue("1".to_string()),
                Token::True,
                Token::Null,
                Token::StringValue("x".to_string()),
                Token::EndArray,
                Token::KeyValue("b".to_string()),
                Token::NumberValue("-2.5e3".to_string()),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn default_profile_emits_both_forms() {
        let out = lex_slice(br#"{"k":"v"}"#, LexerConfig::default()).unwrap();
        assert_eq!(
            out,
            vec![
                Token::StartObject,
                Token::StartKey,
                Token::StringChunk("k".to_string()),
                Token::EndKey,
                Token::KeyValue("k".to_string()),
                Token::StartString,
                Token::StringChunk("v".to_string()),
                Token::EndString,
                Token::StringValue("v".to_string()),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn big_string_profile_streams_strings_only() {
        let out = lex_slice(br#"{"k":"v","n":7}"#, LexerConfig::big_string()).unwrap();
        assert_eq!(
            out,
            vec![
                Token::StartObject,
                Token::KeyValue("k".to_string()),
                Token::StartString,
                Token::StringChunk("v".to_string()),
                Token::EndString,
                Token::KeyValue("n".to_string()),
                Token::NumberValue("7".to_string()),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn long_strings_fragment_at_chunk_size() {
        let cfg = LexerConfig {
            chunk_size: 4,
            ..LexerConfig::big_string()
        };
        let out = lex_slice(br#""abcdefghij""#, cfg).unwrap();
        assert_eq!(
            out,
            vec![
                Token::StartString,
                Token::StringChunk("abcd".to_string()),
                Token::StringChunk("efgh".to_string()),
                Token::StringChunk("ij".to_string()),
                Token::EndString,
            ]
        );
    }

    #[test]
    fn escapes_decode() {
        let out = packed(r#""a\"b\\c\/d\n\tA😀""#);
        assert_eq!(
            out,
            vec![Token::StringValue("a\"b\\c/d\n\tA\u{1F600}".to_string())]
        );
    }

    #[test]
    fn chunk_boundaries_split_anywhere() {
        // Byte-at-a-time delivery across escapes, surrogate pairs, and
        // multi-byte UTF-8.
        let input = "{\"k\u{00e9}y\":\"caf\u{00e9} \\uD83D\\uDE00\",\"n\":[1.5e-3,{}]}".as_bytes();
        let mut lexer = Lexer::new(LexerConfig::packed());
        for b in input {
            lexer.push(std::slice::from_ref(b)).unwrap();
        }
        lexer.finish().unwrap();
        let out: Vec<Token> = lexer.out.into_iter().collect();
        assert_eq!(
            out,
            vec![
                Token::StartObject,
                Token::KeyValue("k\u{00e9}y".to_string()),
                Token::StringValue("caf\u{00e9} \u{1F600}".to_string()),
                Token::KeyValue("n".to_string()),
                Token::StartArray,
                Token::NumberValue("1.5e-3".to_string()),
                Token::StartObject,
                Token::EndObject,
                Token::EndArray,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn concatenated_root_values() {
        assert_eq!(
            packed("1 {\"a\":2}\n[3] \"x\" true"),
            vec![
                Token::NumberValue("1".to_string()),
                Token::StartObject,
                Token::KeyValue("a".to_string()),
                Token::NumberValue("2".to_string()),
                Token::EndObject,
                Token::StartArray,
                Token::NumberValue("3".to_string()),
                Token::EndArray,
                Token::StringValue("x".to_string()),
                Token::True,
            ]
        );
    }

    #[test]
    fn root_number_ends_at_eof() {
        assert_eq!(packed("42"), vec![Token::NumberValue("42".to_string())]);
        assert_eq!(packed("4.5"), vec![Token::NumberValue("4.5".to_string())]);
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        let err = lex_slice(b"{\"a\" 1}", LexerConfig::packed()).unwrap_err();
        match err {
            CodecError::Syntax { offset, .. } => assert_eq!(offset, 5),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            lex_slice(b"[1,]", LexerConfig::packed()).unwrap_err(),
            CodecError::Syntax { .. }
        ));
        assert!(matches!(
            lex_slice(b"{\"a\":01}", LexerConfig::packed()).unwrap_err(),
            CodecError::Syntax { .. }
        ));
        assert!(matches!(
            lex_slice(b"tru", LexerConfig::packed()).unwrap_err(),
            CodecError::UnexpectedEof
        ));
        assert!(matches!(
            lex_slice(br#""\uD800x""#, LexerConfig::packed()).unwrap_err(),
            CodecError::Syntax { .. }
        ));
    }

    #[test]
    fn truncated_input_is_eof() {
        assert!(matches!(
            lex_slice(b"[1, 2", LexerConfig::packed()).unwrap_err(),
            CodecError::UnexpectedEof
        ));
        assert!(matches!(
            lex_slice(br#""abc"#, LexerConfig::packed()).unwrap_err(),
            CodecError::UnexpectedEof
        ));
    }
}
