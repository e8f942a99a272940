//! End-to-end text ↔ token properties: re-lexing emitted text under the
//! same profile reproduces the token sequence exactly, and assembly of the
//! lexed tokens reproduces the parsed value.

use codec::{emit_bytes, emit_slice, lex, lex_slice, EmitterConfig, LexerConfig};
use futures::TryStreamExt;
use tokens::FullAssembler;

const FIXTURES: &[&str] = &[
    r#"{"name":"object-1","children":["c1",{"name":"c2"},3,false]}"#,
    r#"[{"a":{"b":{"c":{"d":{"e":"deep"}}}}},null,-3.5e-2,"café 😀"]"#,
    r#"{"empty_obj":{},"empty_arr":[],"zero":0,"big":18446744073709551615}"#,
    "1 2 \"three\" [4] {\"five\":6}",
    r#""just a string""#,
];

fn profiles() -> Vec<LexerConfig> {
    vec![
        LexerConfig::packed(),
        LexerConfig::big_string(),
        LexerConfig::default(),
        LexerConfig {
            chunk_size: 3,
            ..LexerConfig::default()
        },
    ]
}

#[test]
fn emit_then_lex_is_identity_on_tokens() {
    for fixture in FIXTURES {
        for config in profiles() {
            let tokens = lex_slice(fixture.as_bytes(), config.clone()).unwrap();
            let text = emit_slice(&tokens, EmitterConfig::default()).unwrap();
            let relexed = lex_slice(&text, config.clone()).unwrap();
            assert_eq!(tokens, relexed, "fixture {fixture:?}");
        }
    }
}

#[test]
fn assembly_matches_serde() {
    for fixture in FIXTURES {
        for config in profiles() {
            let tokens = lex_slice(fixture.as_bytes(), config).unwrap();
            let mut asm = FullAssembler::new();
            let mut values = Vec::new();
            for token in &tokens {
                if asm.consume(token) {
                    values.push(asm.current().clone());
                }
            }

            let expect: Vec<serde_json::Value> =
                serde_json::Deserializer::from_str(fixture)
                    .into_iter()
                    .collect::<Result<_, _>>()
                    .unwrap();
            assert_eq!(values, expect, "fixture {fixture:?}");
        }
    }
}

#[tokio::test]
async fn streaming_adapters_round_trip() {
    let fixture = br#"[{"n":"object-1"},{"n":"object-2"}]"#;
    // Deliver input in 3-byte chunks.
    let chunks: Vec<Result<Vec<u8>, codec::CodecError>> = fixture
        .chunks(3)
        .map(|c| Ok(c.to_vec()))
        .collect();

    let tokens = lex(futures::stream::iter(chunks), LexerConfig::big_string());
    let bytes = emit_bytes(tokens, EmitterConfig::default(), 8);
    let out: Vec<bytes::Bytes> = bytes.try_collect().await.unwrap();
    let text: Vec<u8> = out.into_iter().flatten().collect();
    assert_eq!(text, fixture.as_slice());
}
