//! End-to-end pipeline scenarios: JSON text through the lexer, one or more
//! filters, and back out through the emitter.

use codec::{emit_slice, lex_slice, EmitterConfig, LexerConfig};
use filters::{
    constant_value, inject_entry, object_sieve, omit_entry, pack_entry, select_entry, FilterError,
    InjectEntry, MatchSet, ObjectSieve, OmitEntry, PackEntry, SelectEntry, ValueMatcher,
};
use futures::{SinkExt, StreamExt, TryStreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokens::Token;

#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

fn tokens_of(text: &[u8], config: LexerConfig) -> Vec<Token> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    lex_slice(text, config).unwrap()
}

fn input_stream(
    tokens: Vec<Token>,
) -> futures::stream::BoxStream<'static, Result<Token, PipelineError>> {
    futures::stream::iter(tokens.into_iter().map(Ok)).boxed()
}

fn text_of(tokens: &[Token]) -> String {
    String::from_utf8(emit_slice(tokens, EmitterConfig::default()).unwrap()).unwrap()
}

#[tokio::test]
async fn inject_children_into_each_object() {
    let input = tokens_of(
        br#"[{"name":"object-1"},{"name":"object-2"}]"#,
        LexerConfig::packed(),
    );
    let out: Vec<Token> = inject_entry(
        input_stream(input),
        InjectEntry::new("children").stream_keys(false),
        constant_value(json!(["c1", {"name": "c2"}, 3, false])),
    )
    .try_collect()
    .await
    .unwrap();

    assert_eq!(
        text_of(&out),
        r#"[{"name":"object-1","children":["c1",{"name":"c2"},3,false]},{"name":"object-2","children":["c1",{"name":"c2"},3,false]}]"#
    );
}

#[tokio::test]
async fn sieve_keeps_one_of_five_root_objects() {
    let text = concat!(
        r#"{"name":"object-1"} {"name":"object-2"} {"name":"object-3"}"#,
        " ",
        r#"{"name":"object-4"} {"name":"object-5"}"#
    );
    let input = tokens_of(text.as_bytes(), LexerConfig::packed());
    let out: Vec<Token> = object_sieve(
        input_stream(input),
        ObjectSieve::new([("name", ValueMatcher::Equal(json!("object-3")))]),
    )
    .try_collect()
    .await
    .unwrap();

    assert_eq!(text_of(&out), r#"{"name":"object-3"}"#);
}

#[tokio::test]
async fn omit_drops_one_entry() {
    let input = tokens_of(br#"{"a":1,"b":"two","c":3,"d":false}"#, LexerConfig::packed());
    let out: Vec<Token> = omit_entry(input_stream(input), OmitEntry::new(MatchSet::one("a")))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(text_of(&out), r#"{"b":"two","c":3,"d":false}"#);
}

#[tokio::test]
async fn pack_surfaces_a_deep_entry_without_disturbing_the_stream() {
    let input = tokens_of(
        br#"{"a":{"b":{"c":{"d":{"e":"deep"}}}}}"#,
        LexerConfig::big_string(),
    );
    let out: Vec<Token> = pack_entry(
        input_stream(input.clone()),
        PackEntry::new(MatchSet::one("a.b.c.d.e")),
    )
    .try_collect()
    .await
    .unwrap();

    // The synthetic sits immediately after the EndString of "deep".
    let at = out
        .iter()
        .position(|t| matches!(t, Token::PackedEntry(_)))
        .unwrap();
    assert_eq!(out[at - 1], Token::EndString);
    let Token::PackedEntry(entry) = &out[at] else {
        unreachable!()
    };
    assert_eq!(entry.key, "e");
    assert_eq!(entry.value, json!("deep"));
    assert_eq!(
        tokens::joined(&entry.stack, "."),
        "a.b.c.d.e"
    );

    let mut rest = out.clone();
    rest.remove(at);
    assert_eq!(rest, input);
}

#[test]
fn mixed_form_tokens_assemble_once() {
    let input = tokens_of(br#"{"name":"object-3"}"#, LexerConfig::default());
    let mut asm = tokens::FullAssembler::new();
    for (i, token) in input.iter().enumerate() {
        asm.consume(token);
        assert_eq!(asm.done(), i + 1 == input.len(), "done after token {i}");
    }
    assert_eq!(asm.current(), &json!({"name": "object-3"}));
}

// A large inflation driven through a consumer holding one token at a time
// finishes, in order, with every injected entry present.
#[tokio::test]
async fn injection_survives_a_single_token_consumer() {
    let mut text = Vec::new();
    text.push(b'[');
    for i in 0..100 {
        if i > 0 {
            text.push(b',');
        }
        let padding = "x".repeat(512);
        text.extend_from_slice(
            format!(r#"{{"id":{i},"padding":"{padding}"}}"#).as_bytes(),
        );
    }
    text.push(b']');

    let input = tokens_of(&text, LexerConfig::big_string());
    let injected = inject_entry(
        input_stream(input),
        InjectEntry::new("children").stream_keys(false),
        constant_value(json!(["c1", "c2", "c3"])),
    );

    let (tx, rx) = futures::channel::mpsc::channel::<Result<Token, PipelineError>>(1);
    let pump = tokio::spawn(async move {
        let mut injected = std::pin::pin!(injected);
        let mut tx = tx;
        while let Some(item) = injected.next().await {
            tx.send(item).await.expect("receiver lives");
        }
    });

    let out: Vec<Token> = rx.try_collect().await.unwrap();
    pump.await.unwrap();

    let injected_keys = out
        .iter()
        .filter(|t| matches!(t, Token::KeyValue(k) if k == "children"))
        .count();
    assert_eq!(injected_keys, 100);

    let mut asm = tokens::FullAssembler::new();
    for token in &out {
        asm.consume(token);
    }
    assert!(asm.done());
    let values = asm.current().as_array().unwrap();
    assert_eq!(values.len(), 100);
    for (i, value) in values.iter().enumerate() {
        assert_eq!(value["id"], json!(i));
        assert_eq!(value["children"], json!(["c1", "c2", "c3"]));
    }
}

// Page envelope -> select the "value" array -> sieve the objects -> rewrap.
#[tokio::test]
async fn composed_pipeline_selects_sieves_and_rewraps() {
    let page = json!({
        "@odata.context": "https://example.test/$metadata#lists",
        "value": [
            {"displayName": "groceries", "wellknownListName": "none"},
            {"displayName": "defaults", "wellknownListName": "defaultList"},
            {"displayName": "errands", "wellknownListName": "none"}
        ]
    });
    let input = tokens_of(page.to_string().as_bytes(), LexerConfig::packed());

    let selected = select_entry(
        input_stream(input),
        SelectEntry::new(MatchSet::one("value")),
    );
    let sieved = object_sieve(
        selected,
        ObjectSieve::new([(
            "wellknownListName",
            ValueMatcher::Equal(json!("none")),
        )]),
    );
    let out: Vec<Token> = sieved.try_collect().await.unwrap();

    let text = emit_slice(&out, EmitterConfig { wrap_array: true }).unwrap();
    assert_eq!(
        String::from_utf8(text).unwrap(),
        r#"[{"displayName":"groceries","wellknownListName":"none"},{"displayName":"errands","wellknownListName":"none"}]"#
    );
}
