use std::future::Future;

use tokio::time::{sleep, timeout};

use crate::{ClientOptions, MetrikaError, Result};

/// Runs `attempt` until it succeeds, fails terminally, or `max_attempts` is
/// exhausted.
///
/// Each attempt is raced against `timeout_ms`; when the deadline wins the
/// attempt future is dropped, which cancels the in-flight request. Attempts
/// never overlap: the next one starts only after the previous outcome and
/// its backoff sleep.
pub(crate) async fn with_retry<T, F, Fut>(options: &ClientOptions, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt_number = 1u32;
    loop {
        let outcome = match timeout(options.timeout(), attempt(attempt_number)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(MetrikaError::Timeout {
                timeout_ms: options.timeout_ms,
            }),
        };

        let last_error = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !last_error.is_retryable() || attempt_number >= options.max_attempts {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt = attempt_number, error = %last_error, "request failed");
            return Err(last_error);
        }

        let delay = options.delay_after(attempt_number);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt = attempt_number,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "retrying request"
        );

        sleep(delay).await;
        attempt_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use serde_json::{json, Value};
    use tokio::time::Instant;

    use super::with_retry;
    use crate::{ClientOptions, MetrikaError, Result};

    enum Step {
        Respond(Result<Value>),
        Hang,
    }

    /// Scripted attempt source that records when each attempt started.
    #[derive(Clone)]
    struct Script {
        steps: Arc<Mutex<VecDeque<Step>>>,
        started: Arc<Mutex<Vec<(u32, Instant)>>>,
    }

    impl Script {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Arc::new(Mutex::new(steps.into())),
                started: Arc::new(Mutex::new(Vec::new())),
            }
        }

        async fn attempt(&self, number: u32) -> Result<Value> {
            self.started
                .lock()
                .expect("start log mutex must not be poisoned")
                .push((number, Instant::now()));
            let step = self
                .steps
                .lock()
                .expect("step queue mutex must not be poisoned")
                .pop_front()
                .expect("script ran out of steps");
            match step {
                Step::Respond(result) => result,
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    unreachable!("hanging attempt must be cancelled by the deadline")
                }
            }
        }

        fn calls(&self) -> usize {
            self.started.lock().expect("poisoned").len()
        }

        fn start_offsets(&self, origin: Instant) -> Vec<Duration> {
            self.started
                .lock()
                .expect("poisoned")
                .iter()
                .map(|(_, at)| at.duration_since(origin))
                .collect()
        }
    }

    fn http(status: u16) -> Step {
        Step::Respond(Err(MetrikaError::Http {
            status,
            body: format!("status {status}"),
        }))
    }

    fn ok(body: Value) -> Step {
        Step::Respond(Ok(body))
    }

    fn options(max_attempts: u32) -> ClientOptions {
        ClientOptions {
            timeout_ms: 5_000,
            max_attempts,
            retry_delay_ms: 1_000,
        }
    }

    async fn run(opts: &ClientOptions, script: &Script) -> Result<Value> {
        with_retry(opts, |n| {
            let script = script.clone();
            async move { script.attempt(n).await }
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_unavailable_responses() {
        let script = Script::new(vec![http(503), http(503), ok(json!({"data": 42}))]);
        let origin = Instant::now();

        let result = run(&options(3), &script).await.expect("third attempt succeeds");

        assert_eq!(result, json!({"data": 42}));
        assert_eq!(script.calls(), 3);
        assert_eq!(
            script.start_offsets(origin),
            vec![
                Duration::ZERO,
                Duration::from_millis(1_000),
                Duration::from_millis(3_000),
            ]
        );
        assert_eq!(origin.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_returns_last_error() {
        for k in 1..=4u32 {
            let mut steps: Vec<Step> = (1..k).map(|_| http(500)).collect();
            steps.push(http(502));
            let script = Script::new(steps);

            let err = run(&options(k), &script).await.expect_err("all attempts fail");

            assert_eq!(script.calls(), k as usize);
            assert!(matches!(err, MetrikaError::Http { status: 502, .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_final_attempt_uses_every_attempt() {
        for k in 1..=4u32 {
            let mut steps: Vec<Step> = (1..k).map(|_| http(500)).collect();
            steps.push(ok(json!({"k": k})));
            let script = Script::new(steps);

            let result = run(&options(k), &script).await.expect("last attempt succeeds");

            assert_eq!(script.calls(), k as usize);
            assert_eq!(result, json!({"k": k}));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_status_is_not_retried() {
        let script = Script::new(vec![http(404)]);
        let origin = Instant::now();

        let err = run(&options(5), &script).await.expect_err("404 is terminal");

        assert!(matches!(err, MetrikaError::Http { status: 404, .. }));
        assert_eq!(script.calls(), 1);
        assert_eq!(origin.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_not_retried() {
        let script = Script::new(vec![Step::Respond(Err(MetrikaError::MalformedResponse(
            "expected value at line 1 column 1".to_owned(),
        )))]);

        let err = run(&options(3), &script).await.expect_err("malformed body is terminal");

        assert!(matches!(err, MetrikaError::MalformedResponse(_)));
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_retried_like_a_server_error() {
        let script = Script::new(vec![Step::Hang, ok(json!({"ok": true}))]);
        let opts = ClientOptions {
            timeout_ms: 200,
            max_attempts: 2,
            retry_delay_ms: 1_000,
        };
        let origin = Instant::now();

        let result = run(&opts, &script).await.expect("second attempt succeeds");

        assert_eq!(result, json!({"ok": true}));
        assert_eq!(
            script.start_offsets(origin),
            vec![Duration::ZERO, Duration::from_millis(1_200)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_timeouts_surface_timeout_error() {
        let script = Script::new(vec![Step::Hang, Step::Hang]);
        let opts = ClientOptions {
            timeout_ms: 50,
            max_attempts: 2,
            retry_delay_ms: 10,
        };

        let err = run(&opts, &script).await.expect_err("both attempts time out");

        assert!(matches!(err, MetrikaError::Timeout { timeout_ms: 50 }));
        assert_eq!(script.calls(), 2);
    }
}
