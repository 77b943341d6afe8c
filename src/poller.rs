//! Price polling
//!
//! One poller per instrument fetches the quote endpoint on a fixed cadence.
//! An in-flight guard keeps fetches from overlapping, and the first success
//! opens the desk's trading latch.

use crate::desk::TradingDesk;
use crate::quote::QuoteSource;
use crate::types::Instrument;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What a single poll attempt did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    /// Fetched a value that differed and was stored
    Refreshed(f64),
    /// Fetched the same value; nothing written
    Unchanged(f64),
    /// Fetch or parse failed; the last price stands
    Failed,
    /// A previous fetch was still outstanding; no request made
    InFlight,
}

/// Periodic quote fetcher for one desk
pub struct PricePoller {
    desk: Arc<TradingDesk>,
    source: Arc<dyn QuoteSource>,
    period: Duration,
    in_flight: AtomicBool,
}

impl PricePoller {
    pub fn new(desk: Arc<TradingDesk>, source: Arc<dyn QuoteSource>, period: Duration) -> Self {
        Self {
            desk,
            source,
            period,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn instrument(&self) -> &Instrument {
        self.desk.instrument()
    }

    /// One poll attempt. Skips without issuing a request when a fetch is
    /// already outstanding; skipped attempts are not queued.
    pub async fn poll_once(&self) -> PollOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!(instrument = %self.desk.instrument(), "Fetch already in flight, skipping");
            return PollOutcome::InFlight;
        }

        let outcome = match self.source.latest_price(self.desk.instrument()).await {
            Ok(value) => {
                let changed = self.desk.apply_price(value);
                self.desk.enable_trading();
                if changed {
                    info!(
                        instrument = %self.desk.instrument(),
                        source = self.source.name(),
                        price = value,
                        "🔄 Price refreshed"
                    );
                    PollOutcome::Refreshed(value)
                } else {
                    debug!(instrument = %self.desk.instrument(), price = value, "Price unchanged");
                    PollOutcome::Unchanged(value)
                }
            }
            Err(e) => {
                warn!(
                    instrument = %self.desk.instrument(),
                    source = self.source.name(),
                    error = %e,
                    "Quote fetch failed, keeping last price"
                );
                PollOutcome::Failed
            }
        };

        self.in_flight.store(false, Ordering::Release);
        outcome
    }

    /// Poll forever on the configured cadence. The first tick fires
    /// immediately so a fresh session is not stuck on cached state.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}

/// A running poller plus its task handle
pub struct PollerHandle {
    poller: Arc<PricePoller>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Request an immediate out-of-schedule poll. Goes through the same
    /// in-flight guard as the timer, so it can never double-fetch.
    pub async fn refresh_now(&self) -> PollOutcome {
        self.poller.poll_once().await
    }

    pub fn instrument(&self) -> &Instrument {
        self.poller.instrument()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn abort(&self) {
        self.task.abort();
    }
}

/// Owns at most one polling task per instrument
#[derive(Default)]
pub struct PollerRegistry {
    pollers: RwLock<HashMap<Instrument, Arc<PollerHandle>>>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling for a desk's instrument, or hand back the poller
    /// already running for it. Must be called from a tokio runtime.
    pub fn spawn(
        &self,
        desk: Arc<TradingDesk>,
        source: Arc<dyn QuoteSource>,
        period: Duration,
    ) -> Arc<PollerHandle> {
        let instrument = desk.instrument().clone();
        let mut pollers = self.pollers.write().unwrap();

        if let Some(existing) = pollers.get(&instrument) {
            if !existing.is_finished() {
                debug!(instrument = %instrument, "Poller already running, reusing");
                return existing.clone();
            }
        }

        let poller = Arc::new(PricePoller::new(desk, source, period));
        let task = tokio::spawn(poller.clone().run());
        let handle = Arc::new(PollerHandle { poller, task });
        pollers.insert(instrument.clone(), handle.clone());
        info!(
            instrument = %instrument,
            period_ms = period.as_millis() as u64,
            "⏱️ Price poller started"
        );
        handle
    }

    pub fn len(&self) -> usize {
        self.pollers.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pollers.read().unwrap().is_empty()
    }

    pub fn contains(&self, instrument: &Instrument) -> bool {
        self.pollers.read().unwrap().contains_key(instrument)
    }

    /// Stop every polling task
    pub fn shutdown(&self) {
        let mut pollers = self.pollers.write().unwrap();
        for (instrument, handle) in pollers.drain() {
            handle.abort();
            info!(instrument = %instrument, "Price poller stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::PortfolioSeeds;
    use crate::quote::QuoteError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<f64, QuoteError>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<f64, QuoteError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(responses: Vec<Result<f64, QuoteError>>, gate: Arc<Notify>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                gate: Some(gate),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn latest_price(&self, _instrument: &Instrument) -> Result<f64, QuoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(QuoteError::Malformed("exhausted".to_string())))
        }
    }

    fn desk() -> Arc<TradingDesk> {
        Arc::new(TradingDesk::new(
            Instrument::new("ACME"),
            PortfolioSeeds::default(),
            Arc::new(MemoryStore::new()),
        ))
    }

    #[tokio::test]
    async fn test_first_success_opens_the_latch() {
        let desk = desk();
        let source = Arc::new(ScriptedSource::new(vec![
            Err(QuoteError::Malformed("oops".to_string())),
            Ok(522.0),
            Ok(530.5),
        ]));
        let poller = PricePoller::new(desk.clone(), source, Duration::from_millis(10));

        assert_eq!(poller.poll_once().await, PollOutcome::Failed);
        assert!(!desk.trading_enabled());

        // Same value as the seed: no write, but the latch still opens.
        assert_eq!(poller.poll_once().await, PollOutcome::Unchanged(522.0));
        assert!(desk.trading_enabled());

        assert_eq!(poller.poll_once().await, PollOutcome::Refreshed(530.5));
        assert_eq!(desk.price(), 530.5);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_price_and_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let desk = Arc::new(TradingDesk::new(
            Instrument::new("ACME"),
            PortfolioSeeds::default(),
            store.clone(),
        ));
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(530.5),
            Err(QuoteError::Malformed("not-a-number".to_string())),
        ]));
        let poller = PricePoller::new(desk.clone(), source, Duration::from_millis(10));

        poller.poll_once().await;
        let writes = store.write_count();

        assert_eq!(poller.poll_once().await, PollOutcome::Failed);
        assert_eq!(desk.price(), 530.5);
        assert!(desk.trading_enabled());
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_overlapping_poll_skips_without_fetching() {
        let desk = desk();
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::gated(vec![Ok(530.5)], gate.clone()));
        let poller = Arc::new(PricePoller::new(
            desk,
            source.clone(),
            Duration::from_millis(10),
        ));

        let first = tokio::spawn({
            let poller = poller.clone();
            async move { poller.poll_once().await }
        });

        // Let the first poll take the in-flight flag and park on the gate.
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(poller.poll_once().await, PollOutcome::InFlight);
        assert_eq!(source.calls(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), PollOutcome::Refreshed(530.5));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_registry_reuses_running_poller() {
        let registry = PollerRegistry::new();
        let desk = desk();
        let source: Arc<dyn QuoteSource> = Arc::new(ScriptedSource::new(vec![Ok(530.5)]));

        let first = registry.spawn(desk.clone(), source.clone(), Duration::from_secs(60));
        let second = registry.spawn(desk, source, Duration::from_secs(60));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(first.instrument() == &Instrument::new("ACME"));

        registry.shutdown();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_now_polls_out_of_schedule() {
        let registry = PollerRegistry::new();
        let desk = desk();
        let source: Arc<dyn QuoteSource> =
            Arc::new(ScriptedSource::new(vec![Ok(522.0), Ok(531.0)]));
        let handle = registry.spawn(desk.clone(), source, Duration::from_secs(60));

        // The scheduled first poll opens the latch; wait for it to land.
        while !desk.trading_enabled() {
            tokio::task::yield_now().await;
        }

        assert_eq!(handle.refresh_now().await, PollOutcome::Refreshed(531.0));
        assert_eq!(desk.price(), 531.0);

        registry.shutdown();
    }
}
