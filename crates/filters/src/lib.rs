//! Token-level filters over streaming JSON.
//!
//! Each filter consumes a `futures::Stream` of [`tokens::Token`] results and
//! produces another, preserving the relative order of every token it
//! forwards. Filters communicate solely through tokens; synthetic tokens
//! they do not own pass through unchanged, so multiple instances compose in
//! one pipeline without interfering.

mod inject;
mod matcher;
mod omit;
mod pack;
mod select;
mod sieve;
mod transform;

pub use inject::{
    channel_value, computed_value, constant_value, inject_entry, stream_value, InjectEntry,
    ValueFactory, ValueTokens,
};
pub use matcher::{KeyMatcher, MatchSet};
pub use omit::{omit_entry, OmitEntry};
pub use pack::{pack_entry, PackEntry};
pub use select::{select_entry, SelectEntry};
pub use sieve::{object_sieve, ObjectSieve, ValueMatcher};
pub use transform::{transform, TokenTransform};

use tokens::Token;

/// A heap-allocated token stream, the common currency of filter pipelines.
pub type BoxTokenStream<E> = futures::stream::BoxStream<'static, Result<Token, E>>;

/// Error type raised by the filters in this crate. Pipelines with a wider
/// error type admit these through a `From` conversion.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("malformed token stream: {0}")]
    Malformed(&'static str),

    #[error("value token stream is not readable")]
    UnreadableValueStream,

    #[error("backpressure deadlock: value token stream high water mark reached")]
    BackpressureDeadlock,

    #[error("value token stream factory failed: {0}")]
    Factory(#[source] Box<dyn std::error::Error + Send + Sync>),
}
