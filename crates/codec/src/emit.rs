use crate::CodecError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokens::Token;

#[derive(Debug, Clone, Default)]
pub struct EmitterConfig {
    /// Wrap all root values in one top-level array, e.g. when the pipeline
    /// emits a sequence of objects that should land as a JSON array.
    pub wrap_array: bool,
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object { entries: usize },
    Array { items: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Streaming {
    Key,
    String,
    Number,
}

/// Renders a token stream back to JSON text. Accepts any mix of streamed
/// and packed forms; a packed token that duplicates a just-ended streamed
/// form is skipped, so both-form streams do not double-print. Synthetic
/// tokens are dropped; `Finish` finalizes the output.
pub struct Emitter {
    cfg: EmitterConfig,
    stack: Vec<Frame>,
    root_count: usize,
    wrap_opened: bool,
    streaming: Option<Streaming>,
    skip: Option<Streaming>,
    finished: bool,
}

impl Emitter {
    pub fn new(config: EmitterConfig) -> Emitter {
        Emitter {
            cfg: config,
            stack: Vec::new(),
            root_count: 0,
            wrap_opened: false,
            streaming: None,
            skip: None,
            finished: false,
        }
    }

    /// Append the text for one token to `out`.
    pub fn write(&mut self, token: &Token, out: &mut Vec<u8>) -> Result<(), CodecError> {
        if matches!(token, Token::Finish) {
            self.finish(out);
            return Ok(());
        }
        if token.is_synthetic() {
            return Ok(());
        }
        let skip = self.skip.take();

        match token {
            Token::StartObject => {
                self.pre_value(out);
                out.push(b'{');
                self.stack.push(Frame::Object { entries: 0 });
            }
            Token::EndObject => match self.stack.pop() {
                Some(Frame::Object { .. }) => out.push(b'}'),
                _ => return Err(CodecError::Emit("object close without open")),
            },
            Token::StartArray => {
                self.pre_value(out);
                out.push(b'[');
                self.stack.push(Frame::Array { items: 0 });
            }
            Token::EndArray => match self.stack.pop() {
                Some(Frame::Array { .. }) => out.push(b']'),
                _ => return Err(CodecError::Emit("array close without open")),
            },

            Token::StartKey => {
                self.pre_key(out)?;
                out.push(b'"');
                self.streaming = Some(Streaming::Key);
            }
            Token::EndKey => {
                if self.streaming.take() != Some(Streaming::Key) {
                    return Err(CodecError::Emit("key end without start"));
                }
                out.extend_from_slice(b"\":");
                self.skip = Some(Streaming::Key);
            }
            Token::KeyValue(key) => {
                if skip != Some(Streaming::Key) {
                    self.pre_key(out)?;
                    out.push(b'"');
                    escape_into(key, out);
                    out.extend_from_slice(b"\":");
                }
            }

            Token::StartString => {
                self.pre_value(out);
                out.push(b'"');
                self.streaming = Some(Streaming::String);
            }
            Token::EndString => {
                if self.streaming.take() != Some(Streaming::String) {
                    return Err(CodecError::Emit("string end without start"));
                }
                out.push(b'"');
                self.skip = Some(Streaming::String);
            }
            Token::StringValue(text) => {
                if skip != Some(Streaming::String) {
                    self.pre_value(out);
                    out.push(b'"');
                    escape_into(text, out);
                    out.push(b'"');
                }
            }

            Token::StartNumber => {
                self.pre_value(out);
                self.streaming = Some(Streaming::Number);
            }
            Token::EndNumber => {
                if self.streaming.take() != Some(Streaming::Number) {
                    return Err(CodecError::Emit("number end without start"));
                }
                self.skip = Some(Streaming::Number);
            }
            Token::NumberValue(text) => {
                if skip != Some(Streaming::Number) {
                    self.pre_value(out);
                    out.extend_from_slice(text.as_bytes());
                }
            }

            Token::StringChunk(chunk) => match self.streaming {
                Some(Streaming::Key | Streaming::String) => escape_into(chunk, out),
                _ => return Err(CodecError::Emit("string chunk outside of key or string")),
            },
            Token::NumberChunk(chunk) => match self.streaming {
                Some(Streaming::Number) => out.extend_from_slice(chunk.as_bytes()),
                _ => return Err(CodecError::Emit("number chunk outside of number")),
            },

            Token::True => {
                self.pre_value(out);
                out.extend_from_slice(b"true");
            }
            Token::False => {
                self.pre_value(out);
                out.extend_from_slice(b"false");
            }
            Token::Null => {
                self.pre_value(out);
                out.extend_from_slice(b"null");
            }

            Token::PackedEntry(_)
            | Token::SparseKeyStart(_)
            | Token::SparseKeyEnd(_)
            | Token::SparseValueStart(_)
            | Token::SparseValueEnd(_)
            | Token::Finish => unreachable!("synthetic tokens are handled above"),
        }
        Ok(())
    }

    /// Close the optional wrapping array. Idempotent; also triggered by a
    /// `Finish` token.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.finished {
            return;
        }
        if self.cfg.wrap_array {
            if !self.wrap_opened {
                out.push(b'[');
            }
            out.push(b']');
        }
        self.finished = true;
    }

    /// Separator and bookkeeping ahead of a value in the current context.
    fn pre_value(&mut self, out: &mut Vec<u8>) {
        match self.stack.last_mut() {
            Some(Frame::Array { items }) => {
                if *items > 0 {
                    out.push(b',');
                }
                *items += 1;
            }
            // Inside an object the separator work happened at the key.
            Some(Frame::Object { .. }) => (),
            None => {
                if self.cfg.wrap_array {
                    if self.wrap_opened {
                        out.push(b',');
                    } else {
                        out.push(b'[');
                        self.wrap_opened = true;
                    }
                } else if self.root_count > 0 {
                    // Concatenated root values need some separator.
                    out.push(b'\n');
                }
                self.root_count += 1;
            }
        }
    }

    fn pre_key(&mut self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match self.stack.last_mut() {
            Some(Frame::Object { entries }) => {
                if *entries > 0 {
                    out.push(b',');
                }
                *entries += 1;
                Ok(())
            }
            _ => Err(CodecError::Emit("key outside of object")),
        }
    }
}

fn escape_into(text: &str, out: &mut Vec<u8>) {
    for c in text.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{000c}' => out.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

/// Render a complete token sequence to text.
pub fn emit_slice<'a, I>(tokens: I, config: EmitterConfig) -> Result<Vec<u8>, CodecError>
where
    I: IntoIterator<Item = &'a Token>,
{
    let mut emitter = Emitter::new(config);
    let mut out = Vec::new();
    for token in tokens {
        emitter.write(token, &mut out)?;
    }
    emitter.finish(&mut out);
    Ok(out)
}

/// Lift the emitter onto a token stream, producing byte chunks of roughly
/// `buffer_size` bytes.
pub fn emit_bytes<S, E>(
    input: S,
    config: EmitterConfig,
    buffer_size: usize,
) -> impl Stream<Item = Result<Bytes, E>> + Send
where
    S: Stream<Item = Result<Token, E>> + Send + 'static,
    E: From<CodecError> + Send + 'static,
{
    coroutines::try_coroutine(move |mut co| async move {
        let mut emitter = Emitter::new(config);
        let mut input = std::pin::pin!(input);
        let mut buf = Vec::new();
        while let Some(next) = input.next().await {
            let token = next?;
            emitter.write(&token, &mut buf).map_err(E::from)?;
            if buf.len() >= buffer_size {
                co.yield_(Bytes::from(std::mem::take(&mut buf))).await;
            }
        }
        emitter.finish(&mut buf);
        if !buf.is_empty() {
            co.yield_(Bytes::from(buf)).await;
        }
        Ok(())
    })
}
