use crate::FilterError;
use futures::{Stream, StreamExt};
use tokens::Token;

/// The seam between a filter's sequential state machine and the stream
/// pipeline. Implementations consume one token at a time and append any
/// number of output tokens; the lifting in [`transform`] delivers those
/// outputs downstream one pull at a time.
pub trait TokenTransform: Send {
    fn advance(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), FilterError>;

    /// Called once after the upstream ends, for trailing output or
    /// truncation detection.
    fn finish(&mut self, out: &mut Vec<Token>) -> Result<(), FilterError> {
        let _ = out;
        Ok(())
    }
}

/// Lift a [`TokenTransform`] onto a token stream. Output tokens are yielded
/// under downstream backpressure: however many tokens one input inflates
/// into, the consumer's polls set the pace.
pub fn transform<S, E, T>(input: S, mut transform: T) -> impl Stream<Item = Result<Token, E>> + Send
where
    S: Stream<Item = Result<Token, E>> + Send + 'static,
    E: From<FilterError> + Send + 'static,
    T: TokenTransform + 'static,
{
    coroutines::try_coroutine(move |mut co| async move {
        let mut input = std::pin::pin!(input);
        let mut out = Vec::new();
        while let Some(next) = input.next().await {
            let token = next?;
            transform.advance(token, &mut out).map_err(E::from)?;
            co.yield_all(out.drain(..)).await;
        }
        transform.finish(&mut out).map_err(E::from)?;
        co.yield_all(out.drain(..)).await;
        Ok(())
    })
}
