//! Per-host-class throttling and rate-limit backoff.
//!
//! A [`HostGate`] is the single arbiter of request timing for one
//! [`HostClass`]. The delay is a property of the host class, not of the
//! caller: the gate's mutex is held while sleeping, so concurrent callers
//! queue behind each other and the class never exceeds its request rate.

use canvass_core::FetchConfig;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Logical upstream service sharing one rate-limit budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClass {
    /// Election results and candidate pages (Wikipedia)
    Wiki,
    /// Candidate profile pages (Ballotpedia)
    Profile,
    /// Web search
    Search,
}

impl HostClass {
    /// Every host class, in gate construction order.
    pub const ALL: [Self; 3] = [Self::Wiki, Self::Profile, Self::Search];

    /// Stable name used in logs and errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wiki => "wiki-source",
            Self::Profile => "profile-source",
            Self::Search => "search-source",
        }
    }
}

impl fmt::Display for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing rules for one host class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPolicy {
    /// Minimum interval between successive dispatches
    pub min_delay: Duration,
    /// Whether a 429 triggers backoff-and-retry instead of failing
    pub backs_off: bool,
    /// Wait applied after the n-th consecutive rate-limit signal
    pub backoff_schedule: Vec<Duration>,
    /// Rate-limit signals tolerated before surfacing `RateLimited`
    pub max_rate_limit_retries: u32,
}

impl HostPolicy {
    /// A plain throttle with no rate-limit backoff.
    #[must_use]
    pub fn throttle(min_delay: Duration) -> Self {
        Self {
            min_delay,
            backs_off: false,
            backoff_schedule: Vec::new(),
            max_rate_limit_retries: 0,
        }
    }

    /// A throttle that backs off on rate-limit signals.
    #[must_use]
    pub fn with_backoff(min_delay: Duration, schedule: Vec<Duration>, max_retries: u32) -> Self {
        Self {
            min_delay,
            backs_off: true,
            backoff_schedule: schedule,
            max_rate_limit_retries: max_retries,
        }
    }

    /// Policy for `class` derived from the fetch configuration.
    #[must_use]
    pub fn for_class(class: HostClass, config: &FetchConfig) -> Self {
        match class {
            HostClass::Wiki => Self::throttle(Duration::from_millis(config.wiki_delay_ms)),
            HostClass::Profile => Self::throttle(Duration::from_millis(config.profile_delay_ms)),
            HostClass::Search => Self::with_backoff(
                Duration::from_millis(config.search_delay_ms),
                config.backoff_schedule(),
                config.max_rate_limit_retries,
            ),
        }
    }

    fn backoff_for(&self, consecutive: u32) -> Duration {
        let idx = usize::try_from(consecutive.saturating_sub(1)).unwrap_or(usize::MAX);
        self.backoff_schedule
            .get(idx)
            .or_else(|| self.backoff_schedule.last())
            .copied()
            .unwrap_or_default()
    }
}

/// What a caller should do after reporting a rate-limit signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Retry; the gate will hold the next dispatch for `wait`
    Retry {
        /// Backoff applied before the next dispatch
        wait: Duration,
        /// Consecutive rate-limit count for the class
        attempt: u32,
    },
    /// Retry budget exhausted
    GiveUp {
        /// Consecutive rate-limit count that exhausted the budget
        attempts: u32,
    },
}

#[derive(Debug, Default)]
struct GateState {
    last_dispatch: Option<Instant>,
    backoff_until: Option<Instant>,
    consecutive_limits: u32,
}

/// Mutex-guarded throttle and backoff state for one host class.
#[derive(Debug)]
pub struct HostGate {
    class: HostClass,
    policy: HostPolicy,
    state: Mutex<GateState>,
}

impl HostGate {
    /// Create a gate with no dispatch history.
    #[must_use]
    pub fn new(class: HostClass, policy: HostPolicy) -> Self {
        Self {
            class,
            policy,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Host class this gate arbitrates.
    #[must_use]
    pub fn class(&self) -> HostClass {
        self.class
    }

    /// Timing rules in force.
    #[must_use]
    pub fn policy(&self) -> &HostPolicy {
        &self.policy
    }

    /// Wait until this class may dispatch, then record the dispatch.
    ///
    /// Honors both the minimum delay since the previous dispatch and any
    /// pending rate-limit backoff.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let mut ready = now;
        if let Some(last) = state.last_dispatch {
            ready = ready.max(last + self.policy.min_delay);
        }
        if let Some(until) = state.backoff_until {
            ready = ready.max(until);
        }

        if ready > now {
            debug!(host = %self.class, wait_ms = (ready - now).as_millis(), "Throttling request");
            tokio::time::sleep_until(ready).await;
        }

        state.last_dispatch = Some(Instant::now());
    }

    /// Report a rate-limit signal and learn whether to retry.
    ///
    /// The consecutive count is shared by every caller of this class, so
    /// concurrent workers escalate one backoff instead of running their own.
    pub async fn record_rate_limit(&self) -> RateLimitDecision {
        let mut state = self.state.lock().await;
        state.consecutive_limits += 1;
        let attempts = state.consecutive_limits;

        if !self.policy.backs_off || attempts > self.policy.max_rate_limit_retries {
            state.consecutive_limits = 0;
            state.backoff_until = None;
            warn!(host = %self.class, attempts, "Rate limit retries exhausted");
            return RateLimitDecision::GiveUp { attempts };
        }

        let wait = self.policy.backoff_for(attempts);
        state.backoff_until = Some(Instant::now() + wait);
        warn!(
            host = %self.class,
            attempt = attempts,
            max = self.policy.max_rate_limit_retries,
            wait_secs = wait.as_secs_f64(),
            "Rate limited, backing off"
        );
        RateLimitDecision::Retry {
            wait,
            attempt: attempts,
        }
    }

    /// Report a successful response, clearing any backoff.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_limits = 0;
        state.backoff_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn search_policy() -> HostPolicy {
        HostPolicy::with_backoff(
            Duration::from_millis(3000),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
            ],
            3,
        )
    }

    #[test]
    fn test_policy_from_config() {
        let config = FetchConfig::default();
        let wiki = HostPolicy::for_class(HostClass::Wiki, &config);
        assert_eq!(wiki.min_delay, Duration::from_millis(500));
        assert!(!wiki.backs_off);

        let profile = HostPolicy::for_class(HostClass::Profile, &config);
        assert_eq!(profile.min_delay, Duration::from_millis(1500));

        let search = HostPolicy::for_class(HostClass::Search, &config);
        assert_eq!(search, search_policy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_enforces_min_delay() {
        let gate = HostGate::new(HostClass::Wiki, HostPolicy::throttle(Duration::from_millis(500)));

        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));

        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));

        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_throttle() {
        let gate = Arc::new(HostGate::new(
            HostClass::Profile,
            HostPolicy::throttle(Duration::from_millis(1500)),
        ));

        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("acquire task");
        }

        // Four dispatches need three full intervals between them.
        assert!(start.elapsed() >= Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_then_give_up() {
        let gate = HostGate::new(HostClass::Search, search_policy());

        let mut waits = Vec::new();
        for _ in 0..3 {
            match gate.record_rate_limit().await {
                RateLimitDecision::Retry { wait, .. } => waits.push(wait.as_secs()),
                RateLimitDecision::GiveUp { .. } => panic!("gave up too early"),
            }
        }
        assert_eq!(waits, vec![30, 60, 120]);

        assert_eq!(
            gate.record_rate_limit().await,
            RateLimitDecision::GiveUp { attempts: 4 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_out_backoff() {
        let gate = HostGate::new(HostClass::Search, search_policy());
        gate.acquire().await;

        let start = Instant::now();
        gate.record_rate_limit().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_backoff() {
        let gate = HostGate::new(HostClass::Search, search_policy());
        gate.record_rate_limit().await;
        gate.record_rate_limit().await;
        gate.record_success().await;

        assert_eq!(
            gate.record_rate_limit().await,
            RateLimitDecision::Retry {
                wait: Duration::from_secs(30),
                attempt: 1
            }
        );
    }

    #[tokio::test]
    async fn test_throttle_only_class_never_retries() {
        let gate = HostGate::new(HostClass::Wiki, HostPolicy::throttle(Duration::ZERO));
        assert!(matches!(
            gate.record_rate_limit().await,
            RateLimitDecision::GiveUp { attempts: 1 }
        ));
    }
}
