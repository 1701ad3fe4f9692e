//! The unit of work handed to the client: a prompt, a typed parser, and the
//! value to fall back on when everything fails.

/// A prepared LLM call.
///
/// The parser returns `None` when the response doesn't match the prompt's
/// expected shape; the client treats that as one retryable condition before
/// surrendering to `failsafe`.
pub struct PromptCase<T> {
    pub prompt: String,
    pub failsafe: T,
    /// Per-case retry override (e.g. emoji decoration is not worth ten
    /// round-trips).
    pub retry: Option<u32>,
    parser: Box<dyn Fn(&str) -> Option<T> + Send>,
}

impl<T> PromptCase<T> {
    pub fn new(
        prompt: impl Into<String>,
        failsafe: T,
        parser: impl Fn(&str) -> Option<T> + Send + 'static,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            failsafe,
            retry: None,
            parser: Box::new(parser),
        }
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Run the parser against a raw response.
    pub fn parse(&self, response: &str) -> Option<T> {
        (self.parser)(response)
    }
}
