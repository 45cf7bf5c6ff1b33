//! Property-based tests for envelope normalization

use super::*;
use proptest::prelude::*;
use serde_json::json;

fn arb_message() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.,!?'\"\\n{}]{0,80}"
}

fn arb_function_call() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z]{1,30}")
}

fn arb_fence() -> impl Strategy<Value = (String, String)> {
    prop_oneof![
        Just((String::new(), String::new())),
        Just(("```\n".to_string(), "\n```".to_string())),
        Just(("```json\n".to_string(), "\n```".to_string())),
        Just(("  ```JSON  \n".to_string(), "\n```\n".to_string())),
    ]
}

proptest! {
    #[test]
    fn fenced_envelope_round_trips(
        message in arb_message(),
        used in any::<bool>(),
        call in arb_function_call(),
        (open, close) in arb_fence(),
    ) {
        let body = json!({
            "message": message,
            "function_call_used": used,
            "function_call": call,
        });
        let raw = format!("{open}{body}{close}");

        let envelope = normalize(&raw);
        prop_assert_eq!(&envelope.message, &message);
        prop_assert_eq!(envelope.function_call_used, used);
        let expected_call = if used { call } else { None };
        prop_assert_eq!(envelope.function_call, expected_call);
    }

    #[test]
    fn unused_flag_always_clears_function_call(message in arb_message(), call in "[a-z]{1,20}") {
        let raw = json!({
            "message": message,
            "function_call_used": false,
            "function_call": call,
        })
        .to_string();
        prop_assert_eq!(normalize(&raw).function_call, None);
    }

    #[test]
    fn truncated_json_falls_back_verbatim(message in "[a-zA-Z0-9 ]{0,40}", cut in 0usize..1000) {
        let full = json!({
            "message": message,
            "function_call_used": false,
            "function_call": null,
        })
        .to_string();
        // Every proper prefix of an object is unterminated.
        let truncated: String = full.chars().take(cut % full.len()).collect();

        prop_assert_eq!(
            parse(&truncated),
            Normalized::Malformed(truncated.clone())
        );
    }

    #[test]
    fn prose_falls_back_verbatim(text in "[a-zA-Z][a-zA-Z ,.!?]{0,100}") {
        let envelope = normalize(&text);
        prop_assert_eq!(envelope, ResponseEnvelope::text(text));
    }
}
