use crate::{omit_entry, FilterError, KeyMatcher, MatchSet, OmitEntry};
use futures::stream::BoxStream;
use futures::StreamExt;
use regex::Regex;
use std::sync::Arc;
use tokens::{tokenize_value, DepthTracker, StackKeyTracker, Step, Token};

/// Configuration for [`inject_entry`].
#[derive(Debug)]
pub struct InjectEntry {
    key: String,
    injection_point: Option<KeyMatcher>,
    separator: String,
    auto_omit_injection_key: bool,
    stream_keys: bool,
    pack_keys: bool,
}

impl InjectEntry {
    pub fn new(key: impl Into<String>) -> InjectEntry {
        InjectEntry {
            key: key.into(),
            injection_point: None,
            separator: ".".to_string(),
            auto_omit_injection_key: true,
            stream_keys: true,
            pack_keys: true,
        }
    }

    /// Match objects by the key path they sit under. Without an injection
    /// point, every root object matches.
    pub fn injection_point(mut self, matcher: impl Into<KeyMatcher>) -> InjectEntry {
        self.injection_point = Some(matcher.into());
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> InjectEntry {
        self.separator = separator.into();
        self
    }

    /// Remove any pre-existing entry under the injected key ahead of the
    /// injection. Defaults to true.
    pub fn auto_omit_injection_key(mut self, omit: bool) -> InjectEntry {
        self.auto_omit_injection_key = omit;
        self
    }

    pub fn stream_keys(mut self, stream: bool) -> InjectEntry {
        self.stream_keys = stream;
        self
    }

    pub fn pack_keys(mut self, pack: bool) -> InjectEntry {
        self.pack_keys = pack;
        self
    }

    fn key_tokens(&self) -> Vec<Token> {
        let mut out = Vec::new();
        // A key must be emitted somehow.
        if self.stream_keys || !self.pack_keys {
            out.push(Token::StartKey);
            out.push(Token::StringChunk(self.key.clone()));
            out.push(Token::EndKey);
        }
        if self.pack_keys {
            out.push(Token::KeyValue(self.key.clone()));
        }
        out
    }

    /// The composed pattern for `auto_omit_injection_key`: the injection
    /// point, the separator, and the injected key.
    fn omit_pattern(&self) -> Regex {
        let sep = regex::escape(&self.separator);
        let key = regex::escape(&self.key);
        let pattern = match &self.injection_point {
            // Root objects sit either bare or under the outermost array.
            None => format!("^(?:\\d+{sep})?{key}$"),
            Some(KeyMatcher::Literal(literal)) => {
                format!("^{}{sep}{key}$", regex::escape(literal))
            }
            Some(KeyMatcher::Pattern(point)) => {
                format!("(?:{}){sep}{key}$", point.as_str())
            }
        };
        Regex::new(&pattern).expect("injection point composes into a valid pattern")
    }
}

/// A per-object producer of the injected value's tokens. While the matched
/// object is open, it observes every token the transformer forwards, so the
/// value may be computed from the object's own entries; at the object's end
/// it is drained to completion before `EndObject` is emitted.
pub trait ValueTokens: Send {
    fn observe(&mut self, _token: &Token) -> Result<(), FilterError> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<BoxStream<'static, Result<Token, FilterError>>, FilterError>;
}

/// Invoked once per matched object to prepare that object's value source.
pub type ValueFactory = Box<dyn FnMut() -> Result<Box<dyn ValueTokens>, FilterError> + Send>;

/// A factory for a value known up front; the surrounding object is ignored.
pub fn constant_value(value: serde_json::Value) -> ValueFactory {
    struct Constant(serde_json::Value);
    impl ValueTokens for Constant {
        fn finish(
            self: Box<Self>,
        ) -> Result<BoxStream<'static, Result<Token, FilterError>>, FilterError> {
            let mut out = Vec::new();
            tokenize_value(&self.0, &mut out);
            Ok(futures::stream::iter(out.into_iter().map(Ok)).boxed())
        }
    }
    Box::new(move || Ok(Box::new(Constant(value.clone()))))
}

/// A factory whose value is computed from the tokens observed while the
/// matched object was open.
pub fn computed_value<F>(compute: F) -> ValueFactory
where
    F: Fn(&[Token]) -> Result<serde_json::Value, FilterError> + Send + Sync + 'static,
{
    struct Computed {
        observed: Vec<Token>,
        compute: Arc<dyn Fn(&[Token]) -> Result<serde_json::Value, FilterError> + Send + Sync>,
    }
    impl ValueTokens for Computed {
        fn observe(&mut self, token: &Token) -> Result<(), FilterError> {
            self.observed.push(token.clone());
            Ok(())
        }
        fn finish(
            self: Box<Self>,
        ) -> Result<BoxStream<'static, Result<Token, FilterError>>, FilterError> {
            let value = (self.compute)(&self.observed)?;
            let mut out = Vec::new();
            tokenize_value(&value, &mut out);
            Ok(futures::stream::iter(out.into_iter().map(Ok)).boxed())
        }
    }

    let compute = Arc::new(compute);
    Box::new(move || {
        Ok(Box::new(Computed {
            observed: Vec::new(),
            compute: compute.clone(),
        }))
    })
}

/// A factory over an arbitrary stream maker. Returning `None` surfaces as
/// an unreadable-value-stream error at injection time.
pub fn stream_value<F>(make: F) -> ValueFactory
where
    F: Fn() -> Option<BoxStream<'static, Result<Token, FilterError>>> + Send + Sync + 'static,
{
    struct FromStream(Option<BoxStream<'static, Result<Token, FilterError>>>);
    impl ValueTokens for FromStream {
        fn finish(
            self: Box<Self>,
        ) -> Result<BoxStream<'static, Result<Token, FilterError>>, FilterError> {
            self.0.ok_or(FilterError::UnreadableValueStream)
        }
    }
    Box::new(move || Ok(Box::new(FromStream(make()))))
}

/// A factory backed by a bounded channel: observed tokens are written into
/// the channel, and `build` turns the read side into the value's token
/// stream. If the channel fills before the object ends and the drain
/// begins, injection fails with a backpressure deadlock error.
pub fn channel_value<B>(capacity: usize, build: B) -> ValueFactory
where
    B: Fn(futures::channel::mpsc::Receiver<Token>) -> BoxStream<'static, Result<Token, FilterError>>
        + Send
        + Sync
        + 'static,
{
    struct Channel {
        tx: futures::channel::mpsc::Sender<Token>,
        stream: BoxStream<'static, Result<Token, FilterError>>,
    }
    impl ValueTokens for Channel {
        fn observe(&mut self, token: &Token) -> Result<(), FilterError> {
            match self.tx.try_send(token.clone()) {
                Ok(()) => Ok(()),
                Err(error) if error.is_full() => Err(FilterError::BackpressureDeadlock),
                // The builder stream dropped its read side; it has seen
                // all the context it wants.
                Err(_) => Ok(()),
            }
        }
        fn finish(
            mut self: Box<Self>,
        ) -> Result<BoxStream<'static, Result<Token, FilterError>>, FilterError> {
            self.tx.close_channel();
            Ok(self.stream)
        }
    }

    let build = Arc::new(build);
    Box::new(move || {
        let (tx, rx) = futures::channel::mpsc::channel(capacity);
        let stream = build(rx);
        Ok(Box::new(Channel { tx, stream }))
    })
}

/// Inserts a `key: value` entry into every matching object, immediately
/// before its `EndObject`. The value's tokens come from a per-object
/// [`ValueTokens`] source created by the factory and are driven downstream
/// under the pipeline's backpressure before the object is allowed to close.
pub fn inject_entry<S, E>(
    input: S,
    config: InjectEntry,
    factory: ValueFactory,
) -> BoxStream<'static, Result<Token, E>>
where
    S: futures::Stream<Item = Result<Token, E>> + Send + 'static,
    E: From<FilterError> + Send + 'static,
{
    if config.auto_omit_injection_key {
        let matchers = MatchSet::one(KeyMatcher::Pattern(config.omit_pattern()))
            .with_separator(config.separator.clone());
        let omitted = omit_entry(input, OmitEntry::new(matchers));
        inject_inner(omitted.boxed(), config, factory)
    } else {
        inject_inner(input.boxed(), config, factory)
    }
}

fn inject_inner<E>(
    mut input: BoxStream<'static, Result<Token, E>>,
    cfg: InjectEntry,
    mut factory: ValueFactory,
) -> BoxStream<'static, Result<Token, E>>
where
    E: From<FilterError> + Send + 'static,
{
    coroutines::try_coroutine(move |mut co| async move {
        let mut keys = StackKeyTracker::new();
        let mut depth = DepthTracker::new();
        // Innermost-last stack of open matched objects and their sources.
        let mut active: Vec<(usize, Box<dyn ValueTokens>)> = Vec::new();

        while let Some(next) = input.next().await {
            let token = next?;

            if token.is_synthetic() {
                for (_, source) in active.iter_mut() {
                    source.observe(&token).map_err(E::from)?;
                }
                co.yield_(token).await;
                continue;
            }

            keys.update(&token);
            depth.update(&token);

            match &token {
                Token::StartObject => {
                    let stack = keys.stack();
                    // The object's own path, dropping the Pending head its
                    // open just pushed.
                    let container = &stack[..stack.len() - 1];
                    let matched = match &cfg.injection_point {
                        None => {
                            container.is_empty()
                                || (container.len() == 1
                                    && matches!(container[0], Step::Index(_)))
                        }
                        Some(matcher) => {
                            matcher.matches(&tokens::joined(container, &cfg.separator))
                        }
                    };
                    if matched {
                        tracing::debug!(
                            path = %tokens::JoinedPath { steps: container, separator: &cfg.separator },
                            "injection point opened"
                        );
                        let source = factory().map_err(E::from)?;
                        active.push((depth.depth(), source));
                    }
                }
                Token::EndObject => {
                    if active.last().map(|(d, _)| *d) == Some(depth.depth() + 1) {
                        let (_, source) = active.pop().expect("checked non-empty");
                        co.yield_all(cfg.key_tokens()).await;
                        let value = source.finish().map_err(E::from)?;
                        co.yield_stream(value).await.map_err(E::from)?;
                    }
                }
                _ => (),
            }

            for (_, source) in active.iter_mut() {
                source.observe(&token).map_err(E::from)?;
            }
            co.yield_(token).await;
        }

        if !active.is_empty() {
            // Teardown drops the live sources.
            return Err(E::from(FilterError::Malformed(
                "stream ended inside an object pending injection",
            )));
        }
        Ok(())
    })
    .boxed()
}
