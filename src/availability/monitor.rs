use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::availability::state::{AvailabilityEvent, AvailabilityState, Transition, WakeRecord};
use crate::clock::Clock;
use crate::config::{CHANNEL_CAPACITY, WAKE_UP_KEY};
use crate::store::{SharedStore, StoreChange, WriterId};
use crate::types::HealthResult;

/// Remaining-seconds marks that get a log line once per waking episode.
const PROGRESS_MARKS: [u64; 3] = [30, 10, 5];

/// Published after every dispatch that changed something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorUpdate {
    pub state: AvailabilityState,
    pub transition: Option<Transition>,
}

struct Inner {
    state: AvailabilityState,
    marks_logged: BTreeSet<u64>,
}

/// Owns the availability state of one process and mirrors it to the shared
/// store. Transitions are serialized by a single lock around `apply`.
pub struct AvailabilityMonitor {
    inner: Mutex<Inner>,
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    writer: WriterId,
    updates: broadcast::Sender<MonitorUpdate>,
}

impl AvailabilityMonitor {
    /// Build a monitor, restoring a still-running wake window from the store.
    /// An expired or malformed record is removed.
    pub fn new(store: Arc<dyn SharedStore>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let writer = WriterId::new();
        let state = restore(store.as_ref(), clock.as_ref(), writer);
        let (updates, _) = broadcast::channel(CHANNEL_CAPACITY);

        Arc::new(Self {
            inner: Mutex::new(Inner {
                state,
                marks_logged: BTreeSet::new(),
            }),
            store,
            clock,
            writer,
            updates,
        })
    }

    pub fn state(&self) -> AvailabilityState {
        self.lock().state.clone()
    }

    pub fn writer(&self) -> WriterId {
        self.writer
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.lock().state.remaining_secs(self.clock.now_ms())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorUpdate> {
        self.updates.subscribe()
    }

    pub fn dispatch(&self, event: AvailabilityEvent) -> Option<Transition> {
        let mut inner = self.lock();
        let before = inner.state.clone();
        let transition = inner.state.apply(&event);

        if let AvailabilityEvent::Tick { now_ms } = event {
            log_progress(&mut inner, now_ms);
        }
        if !inner.state.is_waking_up {
            inner.marks_logged.clear();
        }

        // The shared record is only written by local decisions; adopting a
        // foreign record never writes it back. A process without a backend
        // leaves the record to processes that have one.
        let from_store = matches!(event, AvailabilityEvent::SharedRecordChanged { .. });
        let writes = !from_store && !inner.state.fallback_only;
        if writes && before.record() != inner.state.record() {
            self.persist(inner.state.record());
        }

        if let Some(t) = transition {
            log_transition(t, &inner.state);
        }
        if transition.is_some() || before != inner.state {
            let _ = self.updates.send(MonitorUpdate {
                state: inner.state.clone(),
                transition,
            });
        }
        transition
    }

    pub fn tick(&self) -> Option<Transition> {
        self.dispatch(AvailabilityEvent::Tick {
            now_ms: self.clock.now_ms(),
        })
    }

    pub fn report_probe(&self, result: &HealthResult) -> Option<Transition> {
        self.dispatch(AvailabilityEvent::ProbeCompleted {
            healthy: result.is_healthy,
            at_ms: self.clock.now_ms(),
        })
    }

    pub fn reset(&self) {
        self.dispatch(AvailabilityEvent::Reset);
    }

    /// React to a store notification. Own writes and other keys are ignored;
    /// everything else is recomputed from the shared start time.
    pub fn handle_store_change(&self, change: &StoreChange) -> Option<Transition> {
        if change.key != WAKE_UP_KEY || !change.is_foreign_to(self.writer) {
            return None;
        }
        let record = match change.new_value.as_deref() {
            None => None,
            Some(raw) => self.parse_or_clear(raw),
        };
        self.dispatch(AvailabilityEvent::SharedRecordChanged {
            record,
            now_ms: self.clock.now_ms(),
        })
    }

    /// Re-read the shared record, e.g. after missing notifications.
    pub fn resync(&self) -> Option<Transition> {
        let record = self
            .store
            .get(WAKE_UP_KEY)
            .and_then(|raw| self.parse_or_clear(&raw));
        self.dispatch(AvailabilityEvent::SharedRecordChanged {
            record,
            now_ms: self.clock.now_ms(),
        })
    }

    /// Follow store notifications until the task is aborted or the store goes away.
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut rx = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        monitor.handle_store_change(&change);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "store notifications lagged, re-reading wake-up record");
                        monitor.resync();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn parse_or_clear(&self, raw: &str) -> Option<WakeRecord> {
        match serde_json::from_str::<WakeRecord>(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("malformed wake-up record, clearing it: {e}");
                if let Err(e) = self.store.remove(WAKE_UP_KEY, self.writer) {
                    warn!("failed to clear wake-up record: {e}");
                }
                None
            }
        }
    }

    fn persist(&self, record: Option<WakeRecord>) {
        let result = match record {
            Some(record) => serde_json::to_string(&record)
                .map_err(Into::into)
                .and_then(|json| self.store.set(WAKE_UP_KEY, &json, self.writer)),
            None => self.store.remove(WAKE_UP_KEY, self.writer),
        };
        if let Err(e) = result {
            warn!("failed to persist wake-up state: {e}");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn restore(store: &dyn SharedStore, clock: &dyn Clock, writer: WriterId) -> AvailabilityState {
    let mut state = AvailabilityState::default();
    let Some(raw) = store.get(WAKE_UP_KEY) else {
        return state;
    };

    match serde_json::from_str::<WakeRecord>(&raw) {
        Ok(record) => {
            let now_ms = clock.now_ms();
            state.apply(&AvailabilityEvent::SharedRecordChanged {
                record: Some(record),
                now_ms,
            });
            if state.is_waking_up {
                info!(
                    remaining_secs = state.remaining_secs(now_ms),
                    "restored running wake-up window"
                );
                return state;
            }
            debug!("stored wake-up window already over, clearing it");
        }
        Err(e) => warn!("malformed wake-up record, clearing it: {e}"),
    }
    if let Err(e) = store.remove(WAKE_UP_KEY, writer) {
        warn!("failed to clear wake-up record: {e}");
    }
    state
}

fn log_progress(inner: &mut Inner, now_ms: u64) {
    if !inner.state.is_waking_up {
        return;
    }
    let remaining = inner.state.remaining_secs(now_ms);
    if PROGRESS_MARKS.contains(&remaining) && inner.marks_logged.insert(remaining) {
        info!(remaining_secs = remaining, "wake-up progress: {remaining} seconds remaining");
    }
}

fn log_transition(transition: Transition, state: &AvailabilityState) {
    match transition {
        Transition::EnteredWaking { started_at } => {
            info!(started_at, "backend is sleeping, starting wake-up countdown")
        }
        Transition::Recovered => info!("backend woke up early, leaving wake-up mode"),
        Transition::WindowElapsed => info!("wake-up countdown complete, reload requested"),
        Transition::Synced => debug!(
            phase = %state.phase(),
            started_at = ?state.wake_up_started_at,
            "adopted wake-up state from another process"
        ),
        Transition::Reset => debug!("wake-up state reset"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::availability::state::Phase;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    const T0: u64 = 1_700_000_000_000;

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>) {
        (MemoryStore::new(), Arc::new(ManualClock::new(T0)))
    }

    fn write_record(store: &MemoryStore, start: u64) {
        let json = format!(r#"{{"isWakingUp":true,"wakeUpStartTime":{start}}}"#);
        store.set(WAKE_UP_KEY, &json, WriterId::new()).unwrap();
    }

    #[test]
    fn entering_waking_writes_shared_record_and_exit_removes_it() {
        let (store, clock) = setup();
        let monitor = AvailabilityMonitor::new(store.clone(), clock.clone());

        monitor.report_probe(&HealthResult::unhealthy("down"));
        let raw = store.get(WAKE_UP_KEY).expect("record written");
        let record: WakeRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.wake_up_start_time, Some(T0));

        clock.advance(Duration::from_secs(60));
        assert_eq!(monitor.tick(), Some(Transition::WindowElapsed));
        assert!(store.get(WAKE_UP_KEY).is_none());
    }

    #[test]
    fn unhealthy_unhealthy_healthy_recovers_on_healthy() {
        let (store, clock) = setup();
        let monitor = AvailabilityMonitor::new(store.clone(), clock.clone());

        monitor.report_probe(&HealthResult::unhealthy("down"));
        clock.advance(Duration::from_secs(15));
        monitor.tick();
        assert_eq!(monitor.report_probe(&HealthResult::unhealthy("still down")), None);
        assert_eq!(monitor.state().wake_up_started_at, Some(T0));

        clock.advance(Duration::from_secs(15));
        assert_eq!(
            monitor.report_probe(&HealthResult::healthy("up")),
            Some(Transition::Recovered)
        );
        assert_eq!(monitor.state().phase(), Phase::Idle);
        assert!(store.get(WAKE_UP_KEY).is_none());
    }

    #[test]
    fn restore_expired_record_yields_idle_and_clears_store() {
        let (store, clock) = setup();
        write_record(&store, T0 - 70_000);

        let monitor = AvailabilityMonitor::new(store.clone(), clock);
        let state = monitor.state();
        assert!(!state.is_waking_up);
        assert!(!state.is_using_fallback_data);
        assert!(store.get(WAKE_UP_KEY).is_none());
    }

    #[test]
    fn restore_recent_record_resumes_countdown() {
        let (store, clock) = setup();
        write_record(&store, T0 - 10_000);

        let monitor = AvailabilityMonitor::new(store.clone(), clock);
        let state = monitor.state();
        assert!(state.is_waking_up);
        assert!(state.is_using_fallback_data);
        assert_eq!(monitor.remaining_secs(), 50);
        assert!(store.get(WAKE_UP_KEY).is_some());
    }

    #[test]
    fn restore_malformed_record_is_cleared() {
        let (store, clock) = setup();
        store.set(WAKE_UP_KEY, "{not json", WriterId::new()).unwrap();

        let monitor = AvailabilityMonitor::new(store.clone(), clock);
        assert_eq!(monitor.state(), AvailabilityState::default());
        assert!(store.get(WAKE_UP_KEY).is_none());
    }

    #[test]
    fn foreign_change_is_adopted_and_own_change_ignored() {
        let (store, clock) = setup();
        let monitor = AvailabilityMonitor::new(store.clone(), clock.clone());

        let own = StoreChange {
            key: WAKE_UP_KEY.to_string(),
            new_value: None,
            origin: Some(monitor.writer()),
        };
        assert_eq!(monitor.handle_store_change(&own), None);

        let foreign = StoreChange {
            key: WAKE_UP_KEY.to_string(),
            new_value: Some(format!(r#"{{"isWakingUp":true,"wakeUpStartTime":{}}}"#, T0 - 5_000)),
            origin: None,
        };
        assert_eq!(monitor.handle_store_change(&foreign), Some(Transition::Synced));
        assert_eq!(monitor.remaining_secs(), 55);
    }

    #[test]
    fn malformed_foreign_change_is_treated_as_absent() {
        let (store, clock) = setup();
        let monitor = AvailabilityMonitor::new(store.clone(), clock);
        monitor.report_probe(&HealthResult::unhealthy("down"));

        store.set(WAKE_UP_KEY, "garbage", WriterId::new()).unwrap();
        let change = StoreChange {
            key: WAKE_UP_KEY.to_string(),
            new_value: Some("garbage".to_string()),
            origin: None,
        };
        assert_eq!(monitor.handle_store_change(&change), Some(Transition::Synced));
        assert!(!monitor.state().is_waking_up);
        assert!(store.get(WAKE_UP_KEY).is_none());
    }

    #[test]
    fn fallback_only_ignores_shared_record_and_keeps_it() {
        let (store, clock) = setup();
        write_record(&store, T0 - 10_000);
        let monitor = AvailabilityMonitor::new(store.clone(), clock.clone());
        assert!(monitor.state().is_waking_up);

        monitor.dispatch(AvailabilityEvent::FallbackOnly);
        assert!(!monitor.state().is_waking_up);
        assert!(monitor.state().is_using_fallback_data);
        // Still there for processes that do have a backend.
        assert!(store.get(WAKE_UP_KEY).is_some());

        let foreign = StoreChange {
            key: WAKE_UP_KEY.to_string(),
            new_value: Some(format!(r#"{{"isWakingUp":true,"wakeUpStartTime":{T0}}}"#)),
            origin: None,
        };
        assert_eq!(monitor.handle_store_change(&foreign), None);
        monitor.report_probe(&HealthResult::unhealthy("down"));
        clock.advance(Duration::from_secs(60));
        monitor.tick();
        monitor.reset();

        let state = monitor.state();
        assert!(!state.is_waking_up);
        assert!(state.is_using_fallback_data);
    }

    #[test]
    fn subscribers_receive_updates() {
        let (store, clock) = setup();
        let monitor = AvailabilityMonitor::new(store, clock);
        let mut rx = monitor.subscribe();

        monitor.report_probe(&HealthResult::unhealthy("down"));
        let update = rx.try_recv().expect("expected update");
        assert_eq!(update.transition, Some(Transition::EnteredWaking { started_at: T0 }));
        assert!(update.state.is_waking_up);

        // A tick that changes nothing publishes nothing.
        monitor.tick();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn two_monitors_on_one_store_converge() {
        let (store, clock) = setup();
        let tab_a = AvailabilityMonitor::new(store.clone(), clock.clone());
        let tab_b = AvailabilityMonitor::new(store.clone(), clock.clone());
        let sync_a = tab_a.spawn_sync();
        let sync_b = tab_b.spawn_sync();
        let mut b_updates = tab_b.subscribe();

        clock.advance(Duration::from_secs(3));
        tab_a.report_probe(&HealthResult::unhealthy("down"));

        let update = tokio::time::timeout(Duration::from_secs(1), b_updates.recv())
            .await
            .expect("tab b notified")
            .expect("channel open");
        assert_eq!(update.transition, Some(Transition::Synced));

        clock.advance(Duration::from_millis(7_300));
        assert_eq!(tab_a.remaining_secs(), tab_b.remaining_secs());
        assert_eq!(tab_b.state().wake_up_started_at, Some(T0 + 3_000));

        // A later write by b (last writer wins) moves a as well.
        tab_b.reset();
        clock.advance(Duration::from_secs(1));
        tab_b.report_probe(&HealthResult::unhealthy("down again"));
        let expected = Some(clock.now_ms());
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while tab_a.state().wake_up_started_at != expected {
            assert!(tokio::time::Instant::now() < deadline, "tab a never converged");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(tab_a.remaining_secs(), tab_b.remaining_secs());

        sync_a.abort();
        sync_b.abort();
    }
}
