//! Bit-exact bridges between JSON text and token streams: an incremental
//! lexer resumable at arbitrary byte-chunk boundaries, and an emitter that
//! renders a token stream back to JSON text.
//!
//! Both sides share a configurable profile for which forms keys, strings,
//! and numbers take (streamed, packed, or both); booleans and null are
//! always packed. `tokens → emit → lex → tokens` is the identity for
//! streams produced under the same profile.

mod emit;
mod lex;

pub use emit::{emit_bytes, emit_slice, Emitter, EmitterConfig};
pub use lex::{lex, lex_slice, Lexer, LexerConfig};

/// Errors raised at the text boundary. Unlike the in-process transformers,
/// the lexer faces raw outside bytes and must reject malformed input
/// instead of panicking.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON at byte {offset}: {message}")]
    Syntax { offset: u64, message: &'static str },

    #[error("invalid UTF-8 at byte {offset}")]
    Utf8 { offset: u64 },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid token sequence in emitter: {0}")]
    Emit(&'static str),
}
