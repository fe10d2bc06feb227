//! User-Agent based bot classification.
//!
//! Classification is advisory: verdicts are logged, counted and attached to
//! the request as a [`BotVerdict`]. Nothing is blocked here.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};
use regex::RegexSet;

use crate::observability::metrics;

/// Case-insensitive patterns for common crawlers and HTTP tooling.
pub const DEFAULT_BOT_PATTERNS: &[&str] = &[
    r"(?i)bot\b",
    r"(?i)crawl",
    r"(?i)spider",
    r"(?i)slurp",
    r"(?i)headless",
    r"(?i)^curl/",
    r"(?i)^wget/",
    r"(?i)python-requests",
    r"(?i)go-http-client",
    r"(?i)scrapy",
];

/// Outcome of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotVerdict {
    pub is_bot: bool,
    /// Pattern or rule that matched.
    pub reason: Option<String>,
}

impl BotVerdict {
    fn human() -> Self {
        Self { is_bot: false, reason: None }
    }

    fn bot(reason: impl Into<String>) -> Self {
        Self { is_bot: true, reason: Some(reason.into()) }
    }
}

pub trait BotDetector: Send + Sync {
    fn classify(&self, user_agent: Option<&str>) -> BotVerdict;
}

/// Matches the User-Agent against a [`RegexSet`].
///
/// A missing or empty User-Agent counts as a bot.
#[derive(Debug, Clone)]
pub struct PatternBotDetector {
    patterns: RegexSet,
}

impl PatternBotDetector {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }
}

impl Default for PatternBotDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_PATTERNS).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Default bot patterns failed to compile");
            Self { patterns: RegexSet::empty() }
        })
    }
}

impl BotDetector for PatternBotDetector {
    fn classify(&self, user_agent: Option<&str>) -> BotVerdict {
        let ua = match user_agent.map(str::trim) {
            Some(ua) if !ua.is_empty() => ua,
            _ => return BotVerdict::bot("missing user agent"),
        };

        match self.patterns.matches(ua).iter().next() {
            Some(index) => BotVerdict::bot(self.patterns.patterns()[index].clone()),
            None => BotVerdict::human(),
        }
    }
}

/// Classify the request and attach the [`BotVerdict`].
pub async fn bot_detection_middleware(
    State(detector): State<Arc<dyn BotDetector>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_agent = req.headers().get(USER_AGENT).and_then(|v| v.to_str().ok());
    let verdict = detector.classify(user_agent);

    if verdict.is_bot {
        tracing::debug!(
            reason = verdict.reason.as_deref().unwrap_or_default(),
            path = %req.uri().path(),
            "Bot-like request"
        );
        metrics::record_bot_request();
    }

    req.extensions_mut().insert(verdict);
    next.run(req).await
}
