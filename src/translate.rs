//! Translation provider client with rate limiting and credential failover.
//!
//! Requests go to `POST {base}/translate?to={lang}[&from={lang}]` with a
//! `[{"Text": ...}]` body. A sliding one-minute character window throttles
//! outgoing requests; calls that would exceed the configured budget are
//! delayed, never rejected. When the primary credential fails with an
//! unauthorized, quota-exceeded, or rate-limited error, a configured
//! fallback credential is tried once before the error surfaces.
//!
//! Each attempt classifies into a tagged [`Attempt`] outcome so the failover
//! decision is a plain match on the first attempt's classification. The HTTP
//! exchange itself sits behind the [`TranslateTransport`] trait; tests drive
//! the policy with a scripted transport.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::TranslationConfig;
use crate::error::{Error, Result};

/// Environment variable holding the primary subscription key.
pub const PRIMARY_KEY_ENV: &str = "SEMDEX_TRANSLATOR_KEY";
/// Environment variable holding the optional fallback subscription key.
pub const FALLBACK_KEY_ENV: &str = "SEMDEX_TRANSLATOR_FALLBACK_KEY";

/// Trailing duration of the rate-limit window.
const WINDOW: Duration = Duration::from_secs(60);
/// Safety margin added when sleeping past the oldest observation's expiry.
const WINDOW_MARGIN: Duration = Duration::from_millis(50);

/// A subscription key for the translation provider.
#[derive(Debug, Clone)]
pub struct Credential {
    pub key: String,
}

/// An upstream failure with its HTTP status and best-effort message.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub status: u16,
    pub message: String,
}

/// Classified outcome of a single request attempt.
#[derive(Debug, Clone)]
pub enum Attempt {
    Success(String),
    /// Unauthorized (401), quota-exceeded (403), or rate-limited (429);
    /// eligible for one retry with the fallback credential.
    Retryable(ProviderFailure),
    /// Everything else, including transport failures; propagates immediately.
    Fatal(ProviderFailure),
}

/// The single-attempt HTTP exchange against one credential.
#[async_trait]
pub trait TranslateTransport: Send + Sync {
    async fn send(
        &self,
        credential: &Credential,
        text: &str,
        to: &str,
        from: Option<&str>,
    ) -> Attempt;
}

/// Rate-limited, failover-capable translation client.
pub struct TranslationClient {
    primary: Credential,
    fallback: Option<Credential>,
    window: CharWindow,
    transport: Box<dyn TranslateTransport>,
}

impl TranslationClient {
    /// Build a client from configuration.
    ///
    /// Reads the primary key from [`PRIMARY_KEY_ENV`] (required) and the
    /// fallback key from [`FALLBACK_KEY_ENV`] (optional).
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let key = std::env::var(PRIMARY_KEY_ENV).map_err(|_| {
            Error::Validation(format!("{} environment variable not set", PRIMARY_KEY_ENV))
        })?;
        let fallback = std::env::var(FALLBACK_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .map(|key| Credential { key });

        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(
            config,
            Credential { key },
            fallback,
            Box::new(transport),
        ))
    }

    /// Build a client with explicit credentials and transport.
    pub fn with_transport(
        config: &TranslationConfig,
        primary: Credential,
        fallback: Option<Credential>,
        transport: Box<dyn TranslateTransport>,
    ) -> Self {
        Self {
            primary,
            fallback,
            window: CharWindow::new(config.chars_per_minute),
            transport,
        }
    }

    /// Translate `text` into language `to`, optionally hinting the source
    /// language.
    ///
    /// Waits for rate-limit window capacity before sending. The request's
    /// character count is recorded into the window only after a successful
    /// send.
    pub async fn translate(&self, text: &str, to: &str, from: Option<&str>) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::Validation("text to translate is empty".to_string()));
        }

        let chars = text.chars().count();
        self.window.acquire(chars).await;

        let primary_failure = match self.transport.send(&self.primary, text, to, from).await {
            Attempt::Success(translated) => {
                self.window.record(chars);
                return Ok(translated);
            }
            Attempt::Fatal(failure) => return Err(provider_error(failure)),
            Attempt::Retryable(failure) => failure,
        };

        let fallback = match &self.fallback {
            Some(credential) => credential,
            None => {
                let hint = retry_hint(primary_failure.status, Utc::now());
                return Err(Error::Provider {
                    provider: "translation",
                    status: primary_failure.status,
                    message: format!("{}; {}", primary_failure.message, hint),
                });
            }
        };

        match self.transport.send(fallback, text, to, from).await {
            Attempt::Success(translated) => {
                self.window.record(chars);
                Ok(translated)
            }
            Attempt::Fatal(failure) => Err(provider_error(failure)),
            Attempt::Retryable(fallback_failure) => Err(combined_error(
                &primary_failure,
                &fallback_failure,
                Utc::now(),
            )),
        }
    }
}

fn provider_error(failure: ProviderFailure) -> Error {
    Error::Provider {
        provider: "translation",
        status: failure.status,
        message: failure.message,
    }
}

/// Both credentials failed with failover-eligible errors. Reports both
/// statuses/messages plus a retry hint for the worse of the two.
fn combined_error(
    primary: &ProviderFailure,
    fallback: &ProviderFailure,
    now: DateTime<Utc>,
) -> Error {
    let hint = retry_hint(primary.status.max(fallback.status), now);
    Error::Provider {
        provider: "translation",
        status: primary.status,
        message: format!(
            "primary credential failed with status {}: {}; fallback credential failed with status {}: {}; {}",
            primary.status, primary.message, fallback.status, fallback.message, hint
        ),
    }
}

/// Human-readable next-retry or quota-reset hint for an eligible failure.
fn retry_hint(status: u16, now: DateTime<Utc>) -> String {
    match status {
        403 => format!(
            "quota resets {}",
            next_quota_reset(now).format("%Y-%m-%dT%H:%M:%SZ")
        ),
        429 => "rate limited, retry after the current one-minute window".to_string(),
        _ => "verify the credential before retrying".to_string(),
    }
}

/// First day of the following calendar month, UTC.
fn next_quota_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
}

/// Map an HTTP status and message into a classified attempt outcome.
fn classify_failure(status: u16, message: String) -> Attempt {
    let failure = ProviderFailure { status, message };
    match status {
        401 | 403 | 429 => Attempt::Retryable(failure),
        _ => Attempt::Fatal(failure),
    }
}

// ============ Sliding character window ============

/// Sliding one-minute window of `(timestamp, character count)` observations.
///
/// The mutex is held only for window accounting, never across a network
/// call. Waiting happens outside the lock via `tokio::time::sleep`.
struct CharWindow {
    budget: usize,
    entries: Mutex<VecDeque<(Instant, usize)>>,
}

impl CharWindow {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Block (non-busy) until `chars` fits into the window's remaining
    /// budget. A request larger than the whole budget is admitted once the
    /// window is empty rather than delayed forever.
    async fn acquire(&self, chars: usize) {
        loop {
            let wait = {
                let mut entries = self.entries.lock().unwrap();
                let now = Instant::now();
                while entries
                    .front()
                    .map_or(false, |&(at, _)| now - at >= WINDOW)
                {
                    entries.pop_front();
                }

                let used: usize = entries.iter().map(|&(_, n)| n).sum();
                if used + chars <= self.budget {
                    None
                } else {
                    match entries.front() {
                        Some(&(oldest, _)) => {
                            Some(WINDOW.saturating_sub(now - oldest) + WINDOW_MARGIN)
                        }
                        None => None,
                    }
                }
            };

            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Record a successfully sent request's character count.
    fn record(&self, chars: usize) {
        self.entries
            .lock()
            .unwrap()
            .push_back((Instant::now(), chars));
    }

    #[cfg(test)]
    fn chars_in_window(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        let now = Instant::now();
        entries
            .iter()
            .filter(|&&(at, _)| now - at < WINDOW)
            .map(|&(_, n)| n)
            .sum()
    }
}

// ============ HTTP transport ============

/// Transport calling the real translation endpoint.
pub struct HttpTransport {
    url: String,
    region: Option<String>,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            client,
        })
    }
}

#[async_trait]
impl TranslateTransport for HttpTransport {
    async fn send(
        &self,
        credential: &Credential,
        text: &str,
        to: &str,
        from: Option<&str>,
    ) -> Attempt {
        let mut request = self
            .client
            .post(format!("{}/translate", self.url))
            .query(&[("to", to)]);
        if let Some(from) = from {
            request = request.query(&[("from", from)]);
        }
        request = request
            .header("Ocp-Apim-Subscription-Key", &credential.key)
            .header("Content-Type", "application/json");
        if let Some(ref region) = self.region {
            request = request.header("Ocp-Apim-Subscription-Region", region);
        }

        let response = match request
            .json(&serde_json::json!([{ "Text": text }]))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Fatal(ProviderFailure {
                    status: 0,
                    message: format!("transport error: {}", e),
                })
            }
        };

        let status = response.status();
        if status.is_success() {
            let json: serde_json::Value = match response.json().await {
                Ok(json) => json,
                Err(e) => {
                    return Attempt::Fatal(ProviderFailure {
                        status: status.as_u16(),
                        message: format!("invalid response body: {}", e),
                    })
                }
            };
            return match parse_translation(&json) {
                Some(translated) => Attempt::Success(translated),
                None => Attempt::Fatal(ProviderFailure {
                    status: status.as_u16(),
                    message: "response is missing the translations array".to_string(),
                }),
            };
        }

        let body = response.text().await.unwrap_or_default();
        classify_failure(status.as_u16(), parse_error_body(&body))
    }
}

/// Extract `[0].translations[0].text` from a provider response.
fn parse_translation(json: &serde_json::Value) -> Option<String> {
    json.get(0)?
        .get("translations")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

/// Best-effort parse of a `{"error":{"code","message"}}` body; falls back to
/// the raw body text.
fn parse_error_body(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    if let Some(error) = parsed.as_ref().and_then(|v| v.get("error")) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return match error.get("code") {
            Some(code) => format!("{} (code {})", message, code),
            None => message.to_string(),
        };
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config() -> TranslationConfig {
        TranslationConfig {
            chars_per_minute: 100,
            ..TranslationConfig::default()
        }
    }

    /// Transport answering from a fixed per-credential script.
    struct ScriptedTransport {
        responses: HashMap<String, Attempt>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<(&str, Attempt)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_keys(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslateTransport for ScriptedTransport {
        async fn send(
            &self,
            credential: &Credential,
            _text: &str,
            _to: &str,
            _from: Option<&str>,
        ) -> Attempt {
            self.calls.lock().unwrap().push(credential.key.clone());
            self.responses
                .get(&credential.key)
                .cloned()
                .unwrap_or_else(|| {
                    Attempt::Fatal(ProviderFailure {
                        status: 0,
                        message: "unscripted credential".to_string(),
                    })
                })
        }
    }

    fn rate_limited() -> Attempt {
        classify_failure(429, "too many requests".to_string())
    }

    fn quota_exceeded() -> Attempt {
        classify_failure(403, "quota exceeded".to_string())
    }

    fn client_with(
        primary: Attempt,
        fallback: Option<Attempt>,
    ) -> (TranslationClient, std::sync::Arc<ScriptedTransport>) {
        let mut responses = vec![("primary", primary)];
        if let Some(f) = fallback.clone() {
            responses.push(("fallback", f));
        }
        let transport = std::sync::Arc::new(ScriptedTransport::new(responses));
        let client = TranslationClient::with_transport(
            &test_config(),
            Credential {
                key: "primary".to_string(),
            },
            fallback.map(|_| Credential {
                key: "fallback".to_string(),
            }),
            Box::new(SharedTransport(transport.clone())),
        );
        (client, transport)
    }

    /// Arc wrapper so the test keeps a handle on the scripted transport.
    struct SharedTransport(std::sync::Arc<ScriptedTransport>);

    #[async_trait]
    impl TranslateTransport for SharedTransport {
        async fn send(
            &self,
            credential: &Credential,
            text: &str,
            to: &str,
            from: Option<&str>,
        ) -> Attempt {
            self.0.send(credential, text, to, from).await
        }
    }

    #[tokio::test]
    async fn test_failover_uses_fallback_on_rate_limit() {
        let (client, transport) = client_with(
            rate_limited(),
            Some(Attempt::Success("ahoj světe".to_string())),
        );

        let translated = client.translate("hello world", "cs", Some("en")).await;
        assert_eq!(translated.unwrap(), "ahoj světe");
        assert_eq!(transport.call_keys(), vec!["primary", "fallback"]);
    }

    #[tokio::test]
    async fn test_no_fallback_fails_without_second_attempt() {
        let (client, transport) = client_with(rate_limited(), None);

        let err = client.translate("hello", "cs", None).await.unwrap_err();
        match err {
            Error::Provider { status, .. } => assert_eq!(status, 429),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.call_keys(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_fatal_error_skips_fallback() {
        let bad_request = classify_failure(400, "malformed request".to_string());
        let (client, transport) =
            client_with(bad_request, Some(Attempt::Success("unused".to_string())));

        let err = client.translate("hello", "cs", None).await.unwrap_err();
        match err {
            Error::Provider { status, .. } => assert_eq!(status, 400),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.call_keys(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_both_credentials_failing_reports_both() {
        let (client, transport) = client_with(rate_limited(), Some(quota_exceeded()));

        let err = client.translate("hello", "cs", None).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("status 429"), "missing primary: {message}");
        assert!(message.contains("status 403"), "missing fallback: {message}");
        assert!(message.contains("quota resets"), "missing hint: {message}");
        assert_eq!(transport.call_keys(), vec!["primary", "fallback"]);
    }

    #[tokio::test]
    async fn test_empty_text_is_validation_error() {
        let (client, transport) = client_with(Attempt::Success("unused".to_string()), None);

        let err = client.translate("   \n", "cs", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(transport.call_keys().is_empty());
    }

    #[tokio::test]
    async fn test_success_records_characters() {
        let (client, _) = client_with(Attempt::Success("ahoj".to_string()), None);

        client.translate("hello", "cs", None).await.unwrap();
        assert_eq!(client.window.chars_in_window(), 5);
    }

    #[tokio::test]
    async fn test_failure_records_nothing() {
        let (client, _) = client_with(rate_limited(), None);

        let _ = client.translate("hello", "cs", None).await;
        assert_eq!(client.window.chars_in_window(), 0);
    }

    #[test]
    fn test_classify_eligible_statuses() {
        for status in [401u16, 403, 429] {
            assert!(matches!(
                classify_failure(status, String::new()),
                Attempt::Retryable(_)
            ));
        }
        for status in [400u16, 404, 500, 503] {
            assert!(matches!(
                classify_failure(status, String::new()),
                Attempt::Fatal(_)
            ));
        }
    }

    #[test]
    fn test_next_quota_reset_mid_year() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap();
        let reset = next_quota_reset(now);
        assert_eq!(reset, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_quota_reset_december_rolls_over() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let reset = next_quota_reset(now);
        assert_eq!(reset, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_translation() {
        let json = serde_json::json!([{"translations": [{"text": "ahoj", "to": "cs"}]}]);
        assert_eq!(parse_translation(&json).unwrap(), "ahoj");
    }

    #[test]
    fn test_parse_error_body_shapes() {
        let structured = r#"{"error":{"code":403001,"message":"quota exceeded"}}"#;
        assert_eq!(parse_error_body(structured), "quota exceeded (code 403001)");
        assert_eq!(parse_error_body("gateway timeout"), "gateway timeout");
    }

    // ---- window accounting (paused clock) ----

    #[tokio::test(start_paused = true)]
    async fn test_window_admits_within_budget() {
        let window = CharWindow::new(100);
        let start = Instant::now();
        window.acquire(60).await;
        window.record(60);
        window.acquire(40).await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_delays_until_capacity_frees() {
        let window = CharWindow::new(100);
        window.acquire(80).await;
        window.record(80);

        let start = Instant::now();
        window.acquire(30).await;
        let waited = Instant::now() - start;
        assert!(waited >= WINDOW, "waited only {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_forgets_expired_entries() {
        let window = CharWindow::new(100);
        window.record(100);
        tokio::time::sleep(WINDOW + Duration::from_secs(1)).await;

        let start = Instant::now();
        window.acquire(100).await;
        assert_eq!(Instant::now(), start);
        assert_eq!(window.chars_in_window(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_request_admitted_when_idle() {
        let window = CharWindow::new(10);
        let start = Instant::now();
        window.acquire(50).await;
        assert_eq!(Instant::now(), start);
    }
}
