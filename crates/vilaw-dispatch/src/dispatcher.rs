use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use vilaw_core::{VilawError, VilawResult};

use crate::config::RateLimitSpec;
use crate::invoker::BackendInvoker;
use crate::pool::CredentialPool;
use crate::usage::{UsageRecord, UsageSnapshot};

/// Configures how the dispatcher handles a pool where every credential is
/// erroring (as opposed to over quota).
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchPolicy {
    /// `None`: treat all-credentials-erroring like quota exhaustion — wait
    /// one window and retry, forever. `Some(n)`: surface
    /// [`VilawError::AllCredentialsFailing`] after `n` consecutive sweeps in
    /// which every credential failed.
    pub max_error_sweeps: Option<u32>,
}

/// Mutable dispatcher state: the sticky credential index and one usage
/// record per credential, in pool order.
///
/// Guarded by a single async mutex; the check-admission-and-reserve step is
/// one critical section, and the lock is never held across an invocation or
/// a window wait.
struct DispatcherState {
    current: usize,
    usage: Vec<UsageRecord>,
}

/// The quota-aware request dispatcher.
///
/// Sits in front of every call to the inference backend: tracks per-credential
/// consumption against the backend's published per-window limits, decides
/// admission, fails over between credentials on error or exhaustion, and
/// blocks-and-retries when the whole pool is saturated. Under quota pressure
/// [`Dispatcher::query`] blocks rather than erroring; only configuration
/// problems (checked at construction) and an optional caller deadline cross
/// this boundary as errors.
///
/// One dispatcher exists per configured backend/model pair; several may
/// coexist independently.
pub struct Dispatcher {
    pool: CredentialPool,
    spec: RateLimitSpec,
    invoker: Arc<dyn BackendInvoker>,
    policy: DispatchPolicy,
    state: Mutex<DispatcherState>,
}

impl Dispatcher {
    /// Build a dispatcher over `pool`, accounting against `spec`.
    pub fn new(pool: CredentialPool, spec: RateLimitSpec, invoker: Arc<dyn BackendInvoker>) -> Self {
        let now = Instant::now();
        let usage = (0..pool.len()).map(|_| UsageRecord::new(now)).collect();
        Self {
            pool,
            spec,
            invoker,
            policy: DispatchPolicy::default(),
            state: Mutex::new(DispatcherState { current: 0, usage }),
        }
    }

    /// Replace the error-sweep policy. Chainable builder method.
    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The rate-limit spec this dispatcher accounts against.
    pub fn spec(&self) -> &RateLimitSpec {
        &self.spec
    }

    /// Read-only usage counters, one per credential in pool order.
    pub async fn usage(&self) -> Vec<UsageSnapshot> {
        let state = self.state.lock().await;
        state.usage.iter().map(UsageRecord::snapshot).collect()
    }

    /// The sticky credential index the next call will try first.
    pub async fn current_index(&self) -> usize {
        self.state.lock().await.current
    }

    /// Answer `prompt` through the first admissible credential.
    ///
    /// Blocks (awaits) while the pool is saturated; never errors for quota
    /// pressure. Per-credential invocation failures are absorbed by
    /// rotation and, with the default policy, by waiting; they surface
    /// only when [`DispatchPolicy::max_error_sweeps`] bounds them.
    pub async fn query(&self, prompt: &str) -> VilawResult<String> {
        self.query_inner(prompt).await
    }

    /// Like [`Dispatcher::query`], but gives up once `deadline` has elapsed,
    /// turning indefinite waiting into [`VilawError::Timeout`].
    pub async fn query_with_deadline(
        &self,
        prompt: &str,
        deadline: Duration,
    ) -> VilawResult<String> {
        match tokio::time::timeout(deadline, self.query_inner(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(VilawError::Timeout(format!(
                "no completion within {deadline:?}"
            ))),
        }
    }

    async fn query_inner(&self, prompt: &str) -> VilawResult<String> {
        let pool_len = self.pool.len();
        let mut consecutive_failures = 0usize;
        let mut error_sweeps = 0u32;
        let mut last_error: Option<VilawError> = None;

        loop {
            // One selection sweep: up to pool_len admission checks starting
            // at the sticky index. Admission reserves the request slot in
            // the same critical section, so two concurrent callers can
            // never both pass against one nearly-exhausted window.
            let admitted = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let mut admitted = None;
                for _ in 0..pool_len {
                    let index = state.current;
                    if state.usage[index].admit(&self.spec, now) {
                        state.usage[index].reserve_request();
                        admitted = Some(index);
                        break;
                    }
                    debug!(credential = index, "credential over quota, rotating");
                    state.current = (state.current + 1) % pool_len;
                }
                admitted
            };

            let Some(index) = admitted else {
                // Every credential denied in one sweep: wait out the current
                // credential's window, then retry from the top.
                self.wait_for_current_window("quota").await;
                consecutive_failures = 0;
                error_sweeps = 0;
                continue;
            };

            let credential = self.pool.get(index).clone();
            match self.invoker.invoke(&credential, prompt).await {
                Ok(completion) => {
                    // The request slot was reserved at admission; only the
                    // reported token usage is left to record. The sticky
                    // index stays on the credential that just worked.
                    let mut state = self.state.lock().await;
                    state.usage[index].record_tokens(completion.total_tokens);
                    debug!(
                        credential = index,
                        tokens = completion.total_tokens,
                        "completion recorded"
                    );
                    return Ok(completion.text);
                }
                Err(err) => {
                    warn!(
                        credential = index,
                        error = %err,
                        "backend invocation failed, rotating credential"
                    );
                    {
                        let mut state = self.state.lock().await;
                        state.usage[index].release_request();
                        state.current = (state.current + 1) % pool_len;
                    }
                    consecutive_failures += 1;
                    last_error = Some(err);

                    if consecutive_failures >= pool_len {
                        // Exhausted by errors rather than by quota. Same
                        // wait-and-retry path, distinguished only in the
                        // logs, unless the policy bounds it.
                        consecutive_failures = 0;
                        error_sweeps += 1;
                        if let Some(max) = self.policy.max_error_sweeps {
                            if error_sweeps >= max {
                                let detail = last_error
                                    .take()
                                    .map(|e| e.to_string())
                                    .unwrap_or_else(|| "no error detail".to_string());
                                return Err(VilawError::AllCredentialsFailing(detail));
                            }
                        }
                        self.wait_for_current_window("errors").await;
                    }
                }
            }
        }
    }

    /// Sleep until the current credential's window elapses, then reset its
    /// usage optimistically and return.
    ///
    /// Deliberately conservative: other credentials' windows may reset
    /// sooner, but only the current one is consulted. The state lock is not
    /// held while sleeping, so a deadline wrapping this wait can abort it
    /// and other callers are unaffected.
    async fn wait_for_current_window(&self, reason: &'static str) {
        let (index, wait) = {
            let state = self.state.lock().await;
            let index = state.current;
            let wait = state.usage[index].time_until_reset(&self.spec, Instant::now());
            (index, wait)
        };
        warn!(
            credential = index,
            wait_secs = wait.as_secs(),
            reason,
            "credential pool exhausted, waiting for window reset"
        );
        sleep(wait).await;

        let mut state = self.state.lock().await;
        let index = state.current;
        state.usage[index].reset(Instant::now());
    }
}
