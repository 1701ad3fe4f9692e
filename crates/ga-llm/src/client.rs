//! The retrying completion client.
//!
//! One client per agent: usage statistics are tagged by the call site
//! (`wake_up`, `schedule_daily`, …) and surfaced in the per-step summary
//! log, so a glance shows which prompts are burning retries.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::case::PromptCase;
use crate::provider::Provider;

const DEFAULT_RETRY: u32 = 10;
const DEFAULT_RETRY_SLEEP: Duration = Duration::from_secs(5);
/// A response that fails the prompt's parser is retried once, then the
/// failsafe wins.
const MAX_PARSE_RETRIES: u32 = 1;

/// Per-caller request accounting.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
}

impl std::fmt::Display for CallStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S:{},F:{}/R:{}", self.successes, self.failures, self.requests)
    }
}

/// Snapshot of a client's usage for the step log.
#[derive(Clone, Debug)]
pub struct LlmSummary {
    pub model: String,
    pub rows: BTreeMap<String, String>,
}

// ── LlmClient ─────────────────────────────────────────────────────────────────

/// Retrying wrapper around a [`Provider`].
///
/// `completion` never fails from the caller's point of view: transient
/// errors are retried with a fixed sleep, unparseable responses get one more
/// chance, and exhaustion returns the case's failsafe.
pub struct LlmClient {
    provider: Provider,
    retry: u32,
    retry_sleep: Duration,
    stats: BTreeMap<String, CallStats>,
    meta_responses: Vec<String>,
    enabled: bool,
}

impl LlmClient {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            retry: DEFAULT_RETRY,
            retry_sleep: DEFAULT_RETRY_SLEEP,
            stats: BTreeMap::new(),
            meta_responses: Vec::new(),
            enabled: true,
        }
    }

    /// Tighten the retry budget (tests run with `retry=1`, zero sleep).
    pub fn with_retry(mut self, retry: u32, sleep: Duration) -> Self {
        self.retry = retry.max(1);
        self.retry_sleep = sleep;
        self
    }

    pub fn is_available(&self) -> bool {
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Raw responses of the most recent `completion` call, for debug dumps.
    pub fn meta_responses(&self) -> &[String] {
        &self.meta_responses
    }

    // ── Completion ────────────────────────────────────────────────────────

    /// Run a prompt case to a value.  Always returns; the failsafe is the
    /// floor.
    pub fn completion<T>(&mut self, case: PromptCase<T>, caller: &str) -> T {
        self.meta_responses.clear();
        if !self.enabled {
            self.bump(caller, |s| s.failures += 1);
            return case.failsafe;
        }

        let budget = case.retry.unwrap_or(self.retry).max(1);
        let mut parse_failures = 0u32;

        for attempt in 0..budget {
            self.bump(caller, |s| s.requests += 1);
            match self.provider.complete(&case.prompt) {
                Ok(response) => {
                    self.meta_responses.push(response.clone());
                    match case.parse(&response) {
                        Some(value) => {
                            self.bump(caller, |s| s.successes += 1);
                            return value;
                        }
                        None => {
                            parse_failures += 1;
                            debug!(caller, attempt, "response failed the prompt parser");
                            if parse_failures > MAX_PARSE_RETRIES {
                                break;
                            }
                        }
                    }
                }
                Err(err) if err.is_transient() => {
                    warn!(caller, attempt, %err, "transient llm error, backing off");
                    std::thread::sleep(self.retry_sleep);
                }
                Err(err) => {
                    warn!(caller, %err, "permanent llm error, using failsafe");
                    break;
                }
            }
        }

        self.bump(caller, |s| s.failures += 1);
        warn!(caller, "llm call exhausted, returning failsafe");
        case.failsafe
    }

    fn bump(&mut self, caller: &str, apply: impl Fn(&mut CallStats)) {
        apply(self.stats.entry("total".to_string()).or_default());
        apply(self.stats.entry(caller.to_string()).or_default());
    }

    // ── Reporting ─────────────────────────────────────────────────────────

    pub fn stats(&self, caller: &str) -> CallStats {
        self.stats.get(caller).copied().unwrap_or_default()
    }

    pub fn get_summary(&self) -> LlmSummary {
        LlmSummary {
            model: self.provider.model().to_string(),
            rows: self
                .stats
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        }
    }
}
