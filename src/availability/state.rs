use serde::{Deserialize, Serialize};

use crate::availability::messages::{message_at, WAKE_MESSAGES};
use crate::config::{MESSAGE_ROTATION_SECS, WAKE_WINDOW_SECS};

pub const WAKE_WINDOW_MS: u64 = WAKE_WINDOW_SECS * 1_000;
const ROTATION_MS: u64 = MESSAGE_ROTATION_SECS * 1_000;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Backend assumed healthy.
    Idle,
    /// Countdown running, fallback data in use.
    Waking,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Waking => write!(f, "waking"),
        }
    }
}

/// Process-wide availability state. `wake_up_started_at` is `Some` exactly
/// when `is_waking_up` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityState {
    pub is_waking_up: bool,
    /// Epoch milliseconds at which the wake window started.
    pub wake_up_started_at: Option<u64>,
    pub is_using_fallback_data: bool,
    pub current_message: String,
    pub message_index: usize,
    /// No backend configured. Sticky: probes and shared records are ignored
    /// and fallback data stays on.
    pub fallback_only: bool,
}

/// The shared-store record. Only the canonical fields are persisted; every
/// derived value is recomputed from `wake_up_start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WakeRecord {
    pub is_waking_up: bool,
    pub wake_up_start_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityEvent {
    /// A health probe finished (a probe that failed outright is unhealthy).
    ProbeCompleted { healthy: bool, at_ms: u64 },
    /// Countdown timer fired.
    Tick { now_ms: u64 },
    /// Another process wrote (or removed) the shared record.
    SharedRecordChanged { record: Option<WakeRecord>, now_ms: u64 },
    /// No backend configured: sample data for good, never waking.
    FallbackOnly,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    EnteredWaking { started_at: u64 },
    /// A probe succeeded inside the window; live data can be fetched right away.
    Recovered,
    /// The window ran out; the page should reload to fetch live data.
    WindowElapsed,
    /// Local state replaced by the shared record.
    Synced,
    Reset,
}

impl AvailabilityState {
    pub fn phase(&self) -> Phase {
        if self.is_waking_up {
            Phase::Waking
        } else {
            Phase::Idle
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.wake_up_started_at
            .map_or(0, |start| now_ms.saturating_sub(start))
    }

    /// `max(0, window − elapsed)`; the full window when idle.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        if !self.is_waking_up {
            return WAKE_WINDOW_MS;
        }
        WAKE_WINDOW_MS.saturating_sub(self.elapsed_ms(now_ms))
    }

    /// Whole seconds left, rounded up: 60 − floor(elapsed seconds).
    pub fn remaining_secs(&self, now_ms: u64) -> u64 {
        self.remaining_ms(now_ms).div_ceil(1_000)
    }

    /// Shared-store snapshot of this state; None means "remove the record".
    pub fn record(&self) -> Option<WakeRecord> {
        self.is_waking_up.then_some(WakeRecord {
            is_waking_up: true,
            wake_up_start_time: self.wake_up_started_at,
        })
    }

    /// Apply one event. All mutation goes through here.
    pub fn apply(&mut self, event: &AvailabilityEvent) -> Option<Transition> {
        match *event {
            AvailabilityEvent::ProbeCompleted { .. } if self.fallback_only => None,
            AvailabilityEvent::ProbeCompleted { healthy: false, at_ms } => {
                if self.is_waking_up {
                    return None;
                }
                self.enter_waking(at_ms);
                Some(Transition::EnteredWaking { started_at: at_ms })
            }
            AvailabilityEvent::ProbeCompleted { healthy: true, .. } => {
                if !self.is_waking_up {
                    return None;
                }
                self.clear();
                Some(Transition::Recovered)
            }
            AvailabilityEvent::Tick { now_ms } => {
                if !self.is_waking_up {
                    return None;
                }
                if self.elapsed_ms(now_ms) >= WAKE_WINDOW_MS {
                    self.clear();
                    return Some(Transition::WindowElapsed);
                }
                self.rotate_message(now_ms);
                None
            }
            AvailabilityEvent::SharedRecordChanged { record, now_ms } => {
                self.adopt(record, now_ms)
            }
            AvailabilityEvent::FallbackOnly => {
                let was_waking = self.is_waking_up;
                self.fallback_only = true;
                self.clear();
                was_waking.then_some(Transition::Reset)
            }
            AvailabilityEvent::Reset => {
                self.clear();
                Some(Transition::Reset)
            }
        }
    }

    fn adopt(&mut self, record: Option<WakeRecord>, now_ms: u64) -> Option<Transition> {
        if self.fallback_only {
            return None;
        }
        // A start in the future (writer clock ahead of ours) is clamped to now,
        // so the window never outlasts 60 s of local time.
        let start = record
            .filter(|r| r.is_waking_up)
            .and_then(|r| r.wake_up_start_time)
            .map(|start| start.min(now_ms))
            .filter(|start| now_ms - start < WAKE_WINDOW_MS);

        match start {
            Some(start) if self.wake_up_started_at == Some(start) => None,
            Some(start) => {
                self.enter_waking(start);
                self.rotate_message(now_ms);
                Some(Transition::Synced)
            }
            None if self.is_waking_up => {
                self.clear();
                Some(Transition::Synced)
            }
            None => None,
        }
    }

    fn enter_waking(&mut self, started_at: u64) {
        self.is_waking_up = true;
        self.wake_up_started_at = Some(started_at);
        self.is_using_fallback_data = true;
        self.message_index = 0;
        self.current_message = message_at(0).to_string();
    }

    /// Message index is derived from elapsed time, so a process that missed
    /// ticks lands on the same message as one that did not.
    fn rotate_message(&mut self, now_ms: u64) {
        let index = (self.elapsed_ms(now_ms) / ROTATION_MS) as usize % WAKE_MESSAGES.len();
        if index != self.message_index || self.current_message.is_empty() {
            self.message_index = index;
            self.current_message = message_at(index).to_string();
        }
    }

    /// Back to idle. Fallback-only mode survives.
    fn clear(&mut self) {
        let fallback_only = self.fallback_only;
        *self = AvailabilityState {
            fallback_only,
            is_using_fallback_data: fallback_only,
            ..AvailabilityState::default()
        };
    }
}

/// Format seconds as `MM:SS`.
pub fn format_countdown(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn probe(healthy: bool, at_ms: u64) -> AvailabilityEvent {
        AvailabilityEvent::ProbeCompleted { healthy, at_ms }
    }

    fn tick(now_ms: u64) -> AvailabilityEvent {
        AvailabilityEvent::Tick { now_ms }
    }

    fn waking_record(start: u64) -> Option<WakeRecord> {
        Some(WakeRecord {
            is_waking_up: true,
            wake_up_start_time: Some(start),
        })
    }

    #[test]
    fn unhealthy_probe_enters_waking() {
        let mut s = AvailabilityState::default();
        let t = s.apply(&probe(false, T0));

        assert_eq!(t, Some(Transition::EnteredWaking { started_at: T0 }));
        assert_eq!(s.phase(), Phase::Waking);
        assert_eq!(s.wake_up_started_at, Some(T0));
        assert!(s.is_using_fallback_data);
        assert_eq!(s.message_index, 0);
        assert_eq!(s.current_message, WAKE_MESSAGES[0]);
        assert_eq!(s.remaining_secs(T0), 60);
    }

    #[test]
    fn healthy_probe_recovers_before_window_ends() {
        let mut s = AvailabilityState::default();
        assert!(s.apply(&probe(false, T0)).is_some());
        // Second failure keeps the first start time.
        assert_eq!(s.apply(&probe(false, T0 + 4_000)), None);
        assert_eq!(s.wake_up_started_at, Some(T0));

        s.apply(&tick(T0 + 12_000));
        assert_eq!(s.apply(&probe(true, T0 + 12_500)), Some(Transition::Recovered));
        assert_eq!(s, AvailabilityState::default());
    }

    #[test]
    fn healthy_probe_while_idle_is_a_no_op() {
        let mut s = AvailabilityState::default();
        assert_eq!(s.apply(&probe(true, T0)), None);
        assert_eq!(s, AvailabilityState::default());
    }

    #[test]
    fn window_elapses_exactly_at_sixty_seconds_with_irregular_ticks() {
        let mut s = AvailabilityState::default();
        s.apply(&probe(false, T0));

        let steps = [37u64, 1_903, 250, 9_999, 13, 20_000, 17_777, 10_020];
        let mut now = T0;
        for step in steps {
            now += step;
            assert!(now - T0 < WAKE_WINDOW_MS);
            assert_eq!(s.apply(&tick(now)), None, "still waking at +{}ms", now - T0);
        }
        assert_eq!(now - T0, WAKE_WINDOW_MS - 1);
        assert_eq!(s.remaining_secs(now), 1);

        assert_eq!(s.apply(&tick(now + 1)), Some(Transition::WindowElapsed));
        assert!(!s.is_waking_up);
        assert!(s.wake_up_started_at.is_none());
        assert!(!s.is_using_fallback_data);
    }

    #[test]
    fn late_tick_after_suspension_still_expires() {
        let mut s = AvailabilityState::default();
        s.apply(&probe(false, T0));
        assert_eq!(s.apply(&tick(T0 + 3_600_000)), Some(Transition::WindowElapsed));
    }

    #[test]
    fn message_index_follows_elapsed_time() {
        let mut s = AvailabilityState::default();
        s.apply(&probe(false, T0));

        let mut now = T0;
        while now < T0 + 59_900 {
            now += 100;
            s.apply(&tick(now));
            let t = (now - T0) / 1_000;
            let expected = (t / MESSAGE_ROTATION_SECS) as usize % WAKE_MESSAGES.len();
            assert_eq!(s.message_index, expected, "at {}ms", now - T0);
            assert_eq!(s.current_message, WAKE_MESSAGES[expected]);
        }
    }

    #[test]
    fn shared_record_is_adopted_and_recomputed() {
        let mut s = AvailabilityState::default();
        let now = T0 + 10_000;
        let t = s.apply(&AvailabilityEvent::SharedRecordChanged {
            record: waking_record(T0),
            now_ms: now,
        });

        assert_eq!(t, Some(Transition::Synced));
        assert!(s.is_waking_up);
        assert_eq!(s.remaining_secs(now), 50);
        assert_eq!(s.message_index, 2);

        // Same start again is not a transition.
        let again = s.apply(&AvailabilityEvent::SharedRecordChanged {
            record: waking_record(T0),
            now_ms: now + 100,
        });
        assert_eq!(again, None);
    }

    #[test]
    fn expired_or_removed_record_returns_to_idle() {
        let mut s = AvailabilityState::default();
        s.apply(&probe(false, T0));

        let t = s.apply(&AvailabilityEvent::SharedRecordChanged {
            record: waking_record(T0 - 70_000),
            now_ms: T0,
        });
        assert_eq!(t, Some(Transition::Synced));
        assert!(!s.is_waking_up);

        s.apply(&probe(false, T0));
        let t = s.apply(&AvailabilityEvent::SharedRecordChanged {
            record: None,
            now_ms: T0 + 1,
        });
        assert_eq!(t, Some(Transition::Synced));
        assert_eq!(s, AvailabilityState::default());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut s = AvailabilityState::default();
        s.apply(&probe(false, T0));
        assert_eq!(s.apply(&AvailabilityEvent::Reset), Some(Transition::Reset));
        assert_eq!(s.apply(&AvailabilityEvent::Reset), Some(Transition::Reset));
        assert_eq!(s, AvailabilityState::default());
    }

    #[test]
    fn fallback_only_mode_is_sticky() {
        let mut s = AvailabilityState::default();
        s.apply(&AvailabilityEvent::SharedRecordChanged {
            record: waking_record(T0 - 10_000),
            now_ms: T0,
        });
        assert!(s.is_waking_up);

        assert_eq!(s.apply(&AvailabilityEvent::FallbackOnly), Some(Transition::Reset));
        assert!(!s.is_waking_up);
        assert!(s.is_using_fallback_data);
        assert!(s.record().is_none());

        assert_eq!(s.apply(&probe(false, T0)), None);
        assert_eq!(s.apply(&probe(true, T0)), None);
        let adopted = s.apply(&AvailabilityEvent::SharedRecordChanged {
            record: waking_record(T0),
            now_ms: T0 + 1_000,
        });
        assert_eq!(adopted, None);
        assert_eq!(s.apply(&tick(T0 + 120_000)), None);
        assert_eq!(s.apply(&AvailabilityEvent::Reset), Some(Transition::Reset));

        assert!(!s.is_waking_up);
        assert!(s.is_using_fallback_data);
        assert!(s.fallback_only);
    }

    #[test]
    fn future_start_time_is_clamped_to_now() {
        let mut s = AvailabilityState::default();
        let t = s.apply(&AvailabilityEvent::SharedRecordChanged {
            record: waking_record(T0 + 30_000),
            now_ms: T0,
        });
        assert_eq!(t, Some(Transition::Synced));
        assert_eq!(s.wake_up_started_at, Some(T0));
        assert_eq!(s.remaining_secs(T0), 60);

        assert_eq!(s.apply(&tick(T0 + 59_999)), None);
        assert_eq!(s.apply(&tick(T0 + 60_000)), Some(Transition::WindowElapsed));
    }

    #[test]
    fn record_mirrors_canonical_fields() {
        let mut s = AvailabilityState::default();
        assert!(s.record().is_none());
        s.apply(&probe(false, T0));
        assert_eq!(s.record(), waking_record(T0));

        let json = serde_json::to_string(&s.record().unwrap()).unwrap();
        assert_eq!(json, format!(r#"{{"isWakingUp":true,"wakeUpStartTime":{T0}}}"#));
    }

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(60), "01:00");
        assert_eq!(format_countdown(59), "00:59");
        assert_eq!(format_countdown(5), "00:05");
        assert_eq!(format_countdown(0), "00:00");
    }
}
