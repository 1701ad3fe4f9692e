//! Unit tests for ga-llm.

use std::time::Duration;

use crate::case::PromptCase;
use crate::client::LlmClient;
use crate::parse::{cascade, is_negative, last_capture, scan};
use crate::provider::{ApiKeys, Provider, ProviderConfig, ScriptedProvider};

fn scripted(provider: ScriptedProvider) -> LlmClient {
    LlmClient::new(Provider::Scripted(provider)).with_retry(3, Duration::ZERO)
}

// ── Parsing ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod parsing {
    use super::*;

    #[test]
    fn cascade_tries_patterns_in_order() {
        let patterns = cascade(&[r"评分[:： ]+(\d{1,2})", r"(\d{1,2})"]);
        assert_eq!(last_capture("评分: 7", &patterns).as_deref(), Some("7"));
        assert_eq!(last_capture("我给 9 分", &patterns).as_deref(), Some("9"));
        assert_eq!(last_capture("没有数字", &patterns), None);
    }

    #[test]
    fn bold_markers_are_stripped() {
        let patterns = cascade(&[r"(\d{1,2}):00"]);
        assert_eq!(last_capture("**7:00** 起床", &patterns).as_deref(), Some("7"));
    }

    #[test]
    fn multi_group_rows() {
        let patterns = cascade(&[r"\[(\d{1,2}:\d{2})\] (.*)"]);
        let rows = scan("[6:00] 起床\n[7:00] 吃早餐", &patterns);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["6:00".to_string(), "起床".to_string()]);
        assert_eq!(rows[1][1], "吃早餐");
    }

    #[test]
    fn invalid_patterns_are_skipped_not_fatal() {
        let patterns = cascade(&[r"([unclosed", r"(\d+)"]);
        assert_eq!(patterns.len(), 1);
        assert_eq!(last_capture("42", &patterns).as_deref(), Some("42"));
    }

    #[test]
    fn negative_tokens() {
        assert!(is_negative("No, they are busy"));
        assert!(is_negative("否"));
        assert!(is_negative("不需要"));
        assert!(!is_negative("Yes 当然"));
    }
}

// ── Client retry/failsafe behavior ────────────────────────────────────────────

#[cfg(test)]
mod client {
    use super::*;

    fn number_case(failsafe: u32) -> PromptCase<u32> {
        let patterns = cascade(&[r"(\d{1,2})"]);
        PromptCase::new("给出一个数字", failsafe, move |response| {
            last_capture(response, &patterns).and_then(|s| s.parse().ok())
        })
    }

    #[test]
    fn parses_scripted_response() {
        let mut client = scripted(ScriptedProvider::default().rule("数字", "答案是 7"));
        assert_eq!(client.completion(number_case(1), "poignancy_event"), 7);
        let stats = client.stats("poignancy_event");
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.requests, 1);
    }

    #[test]
    fn unparseable_response_falls_back_after_one_retry() {
        let mut client = scripted(ScriptedProvider::default().rule("数字", "无可奉告"));
        assert_eq!(client.completion(number_case(6), "wake_up"), 6);
        let stats = client.stats("wake_up");
        // One initial attempt plus exactly one parse retry.
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes, 0);
    }

    #[test]
    fn per_case_retry_override_wins() {
        let mut client = scripted(ScriptedProvider::default());
        let case = number_case(3).with_retry(1);
        assert_eq!(client.completion(case, "describe_emoji"), 3);
        assert_eq!(client.stats("describe_emoji").requests, 1);
    }

    #[test]
    fn consumable_rules_sequence_responses() {
        let provider = ScriptedProvider::default()
            .rule_n("数字", "1", 2)
            .rule("数字", "9");
        let mut client = scripted(provider);
        assert_eq!(client.completion(number_case(0), "t"), 1);
        assert_eq!(client.completion(number_case(0), "t"), 1);
        assert_eq!(client.completion(number_case(0), "t"), 9);
    }

    #[test]
    fn total_row_aggregates_callers() {
        let mut client = scripted(ScriptedProvider::default().rule("数字", "5"));
        client.completion(number_case(0), "a");
        client.completion(number_case(0), "b");
        let summary = client.get_summary();
        assert_eq!(summary.rows["total"], "S:2,F:0/R:2");
        assert!(summary.rows.contains_key("a"));
        assert!(summary.rows.contains_key("b"));
    }

    #[test]
    fn meta_responses_hold_last_call_raw_text() {
        let mut client = scripted(ScriptedProvider::default().rule("数字", "答案是 7"));
        client.completion(number_case(0), "t");
        assert_eq!(client.meta_responses(), ["答案是 7"]);
    }

    #[test]
    fn disabled_client_goes_straight_to_failsafe() {
        let mut client = scripted(ScriptedProvider::default().rule("数字", "7"));
        client.disable();
        assert_eq!(client.completion(number_case(42), "t"), 42);
        assert_eq!(client.stats("t").requests, 0);
    }
}

// ── Provider construction ─────────────────────────────────────────────────────

#[cfg(test)]
mod providers {
    use super::*;

    fn config(kind: &str) -> ProviderConfig {
        serde_json::from_value(serde_json::json!({
            "type": kind,
            "model": "glm-4-flash",
        }))
        .unwrap()
    }

    #[test]
    fn missing_key_is_a_startup_error() {
        let keys = ApiKeys::default();
        assert!(Provider::from_config(&config("zhipuai"), &keys).is_err());
        assert!(Provider::from_config(&config("openai"), &keys).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let keys = ApiKeys::default();
        let err = Provider::from_config(&config("frontier-9000"), &keys);
        assert!(err.is_err());
    }

    #[test]
    fn usable_reflects_key_presence() {
        let mut keys = ApiKeys::default();
        assert!(!Provider::usable("zhipuai", &keys));
        keys.insert("ZHIPUAI_API_KEY".into(), "k".into());
        assert!(Provider::usable("zhipuai", &keys));
        assert!(Provider::usable("ollama", &keys));
        assert!(Provider::usable("scripted", &keys));
    }

    #[test]
    fn capability_checks_by_model_family() {
        let mut keys = ApiKeys::default();
        keys.insert("ZHIPUAI_API_KEY".into(), "k".into());
        let provider = Provider::from_config(&config("zhipuai"), &keys).unwrap();
        assert!(provider.supports("glm-4-flash"));
        assert!(provider.supports("embedding-2"));
        assert!(!provider.supports("gpt-4o"));
    }

    #[test]
    fn scripted_embeddings_are_deterministic() {
        let provider = Provider::Scripted(ScriptedProvider::default());
        let a = provider.embed("对话 乙").unwrap();
        let b = provider.embed("对话 乙").unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
