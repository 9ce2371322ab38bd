//! Rate-limiter behavior observed through the public translation client API.
//!
//! Runs under paused tokio time, so the one-minute window advances instantly
//! while preserving the ordering the limiter enforces.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

use semdex::config::TranslationConfig;
use semdex::translate::{Attempt, Credential, TranslateTransport, TranslationClient};

const WINDOW: Duration = Duration::from_secs(60);

/// Transport that always succeeds and records when each request was sent.
#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<(Instant, usize)>>,
}

struct Shared(Arc<RecordingTransport>);

#[async_trait]
impl TranslateTransport for Shared {
    async fn send(
        &self,
        _credential: &Credential,
        text: &str,
        _to: &str,
        _from: Option<&str>,
    ) -> Attempt {
        self.0
            .calls
            .lock()
            .unwrap()
            .push((Instant::now(), text.chars().count()));
        Attempt::Success(text.to_string())
    }
}

fn client_with_budget(
    chars_per_minute: usize,
) -> (TranslationClient, Arc<RecordingTransport>) {
    let config = TranslationConfig {
        chars_per_minute,
        ..TranslationConfig::default()
    };
    let transport = Arc::new(RecordingTransport::default());
    let client = TranslationClient::with_transport(
        &config,
        Credential {
            key: "primary".to_string(),
        },
        None,
        Box::new(Shared(transport.clone())),
    );
    (client, transport)
}

#[tokio::test(start_paused = true)]
async fn trailing_window_sum_never_exceeds_budget() {
    let (client, transport) = client_with_budget(100);

    let text = "x".repeat(30);
    for _ in 0..8 {
        client.translate(&text, "cs", None).await.unwrap();
    }

    let calls = transport.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 8, "calls are delayed, never rejected");

    for (i, &(at, _)) in calls.iter().enumerate() {
        let window_sum: usize = calls[..=i]
            .iter()
            .filter(|&&(sent, _)| at - sent < WINDOW)
            .map(|&(_, chars)| chars)
            .sum();
        assert!(
            window_sum <= 100,
            "trailing window holds {} chars at call {}",
            window_sum,
            i
        );
    }
}

#[tokio::test(start_paused = true)]
async fn calls_over_budget_are_delayed_into_later_windows() {
    let (client, _) = client_with_budget(100);

    // Three 30-char requests fit one window; eight need at least three.
    let start = Instant::now();
    let text = "x".repeat(30);
    for _ in 0..8 {
        client.translate(&text, "cs", None).await.unwrap();
    }

    let elapsed = Instant::now() - start;
    assert!(
        elapsed >= 2 * WINDOW,
        "eight requests completed after only {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn calls_within_budget_are_not_delayed() {
    let (client, _) = client_with_budget(100);

    let start = Instant::now();
    client.translate("hello", "cs", None).await.unwrap();
    client.translate("world", "cs", None).await.unwrap();
    assert_eq!(Instant::now(), start);
}
