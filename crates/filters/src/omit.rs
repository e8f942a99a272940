use crate::{pack_entry, FilterError, MatchSet, PackEntry};
use futures::{Stream, TryStreamExt};
use tokens::{OwnerId, Token};

/// Configuration for [`omit_entry`].
#[derive(Debug)]
pub struct OmitEntry {
    matchers: MatchSet,
}

impl OmitEntry {
    pub fn new(matchers: MatchSet) -> OmitEntry {
        OmitEntry { matchers }
    }
}

/// Drops every entry whose key path matches, leaving all other tokens in
/// their original order.
///
/// Built from [`pack_entry`] in sparse, discard-components mode with a
/// private owner, followed by a pass that removes exactly the four owned
/// bracket tokens.
pub fn omit_entry<S, E>(input: S, config: OmitEntry) -> impl Stream<Item = Result<Token, E>> + Send
where
    S: Stream<Item = Result<Token, E>> + Send + 'static,
    E: From<FilterError> + Send + 'static,
{
    let owner = OwnerId::next();
    let packed = pack_entry(
        input,
        PackEntry::new(config.matchers)
            .sparse(true)
            .discard_component_tokens(true)
            .owner(owner),
    );
    packed.try_filter(move |token| {
        let owned = matches!(
            token,
            Token::SparseKeyStart(e)
            | Token::SparseKeyEnd(e)
            | Token::SparseValueStart(e)
            | Token::SparseValueEnd(e) if e.owner == Some(owner)
        );
        futures::future::ready(!owned)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::test::run;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokens::tokenize_value;

    fn omit(tokens: Vec<Token>, matchers: MatchSet) -> Vec<Token> {
        run(tokens, |input| {
            omit_entry(input, OmitEntry::new(matchers)).boxed()
        })
        .unwrap()
    }

    #[test]
    fn removes_the_matched_entry_entirely() {
        let mut input = Vec::new();
        tokenize_value(&json!({"a": 1, "b": "two", "c": 3, "d": false}), &mut input);

        let mut expect = Vec::new();
        tokenize_value(&json!({"b": "two", "c": 3, "d": false}), &mut expect);

        assert_eq!(omit(input, MatchSet::one("a")), expect);
    }

    #[test]
    fn removes_nested_entries_by_path() {
        let mut input = Vec::new();
        tokenize_value(&json!({"a": {"b": 1, "c": 2}, "b": 3}), &mut input);

        let mut expect = Vec::new();
        tokenize_value(&json!({"a": {"c": 2}, "b": 3}), &mut expect);

        assert_eq!(omit(input, MatchSet::one("a.b")), expect);
    }

    #[test]
    fn removes_streamed_form_entries() {
        let input = vec![
            Token::StartObject,
            Token::StartKey,
            Token::StringChunk("gone".to_string()),
            Token::EndKey,
            Token::StartString,
            Token::StringChunk("big".to_string()),
            Token::EndString,
            Token::StringValue("big".to_string()),
            Token::KeyValue("kept".to_string()),
            Token::True,
            Token::EndObject,
        ];
        let expect = vec![
            Token::StartObject,
            Token::KeyValue("kept".to_string()),
            Token::True,
            Token::EndObject,
        ];
        assert_eq!(omit(input, MatchSet::one("gone")), expect);
    }

    #[test]
    fn non_matching_input_is_untouched() {
        let mut input = Vec::new();
        tokenize_value(&json!([{"x": 1}, {"y": 2}]), &mut input);
        assert_eq!(omit(input.clone(), MatchSet::one("z")), input);
    }
}
