use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::availability::monitor::AvailabilityMonitor;
use crate::availability::state::{AvailabilityEvent, Transition};
use crate::config::MonitorTimings;
use crate::remote::HealthProber;

/// Drives an `AvailabilityMonitor`: countdown ticks, deferred and periodic
/// health probes, and store sync.
pub struct AvailabilityRunner {
    monitor: Arc<AvailabilityMonitor>,
    prober: Arc<HealthProber>,
    timings: MonitorTimings,
}

/// Owns the runner's tasks. Dropping it cancels them.
pub struct RunnerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl RunnerHandle {
    /// Cancel every timer and wait for the tasks to finish.
    pub async fn shutdown(mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        for t in &tasks {
            t.abort();
        }
        join_all(tasks).await;
        debug!("availability runner stopped");
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        for t in &self.tasks {
            t.abort();
        }
    }
}

impl AvailabilityRunner {
    pub fn new(
        monitor: Arc<AvailabilityMonitor>,
        prober: Arc<HealthProber>,
        timings: MonitorTimings,
    ) -> Self {
        Self {
            monitor,
            prober,
            timings,
        }
    }

    pub fn spawn(self) -> RunnerHandle {
        let mut tasks = vec![self.monitor.spawn_sync(), self.spawn_countdown()];

        if self.prober.client().is_configured() {
            tasks.push(self.spawn_health_loop());
        } else {
            info!("no backend configured, serving sample data");
            self.monitor.dispatch(AvailabilityEvent::FallbackOnly);
        }
        RunnerHandle { tasks }
    }

    fn spawn_countdown(&self) -> JoinHandle<()> {
        let monitor = Arc::clone(&self.monitor);
        let period = self.timings.tick;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            // A suspended process catches up on the next tick; skipped ticks
            // are not replayed.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                monitor.tick();
            }
        })
    }

    fn spawn_health_loop(&self) -> JoinHandle<()> {
        let monitor = Arc::clone(&self.monitor);
        let prober = Arc::clone(&self.prober);
        let timings = self.timings;
        tokio::spawn(async move {
            sleep(timings.initial_check_delay).await;

            // A restored waking window already knows the backend is down.
            if monitor.state().is_waking_up {
                debug!("wake-up window restored, skipping initial health check");
            } else {
                check(&monitor, &prober).await;
            }

            let start = Instant::now() + timings.recheck_interval;
            let mut recheck = interval_at(start, timings.recheck_interval);
            recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                recheck.tick().await;
                check(&monitor, &prober).await;
            }
        })
    }
}

async fn check(monitor: &Arc<AvailabilityMonitor>, prober: &Arc<HealthProber>) {
    let result = prober.probe().await;
    if let Some(Transition::EnteredWaking { .. }) = monitor.report_probe(&result) {
        let prober = Arc::clone(prober);
        // Fire and forget; not tracked by the handle.
        tokio::spawn(async move { prober.nudge().await });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    use super::*;
    use crate::availability::state::Phase;
    use crate::availability::MonitorUpdate;
    use crate::clock::{Clock, ManualClock, SystemClock};
    use crate::config::WAKE_UP_KEY;
    use crate::remote::probe::NUDGE_QUERY;
    use crate::remote::BackendClient;
    use crate::store::{MemoryStore, SharedStore, WriterId};

    struct Backend {
        healthy: AtomicBool,
        checks: AtomicUsize,
        nudges: AtomicUsize,
    }

    async fn serve(backend: Arc<Backend>) -> String {
        let router = Router::new().route(
            "/api/health",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let backend = Arc::clone(&backend);
                async move {
                    if params.get(NUDGE_QUERY.0).map(String::as_str) == Some(NUDGE_QUERY.1) {
                        backend.nudges.fetch_add(1, Ordering::SeqCst);
                    } else {
                        backend.checks.fetch_add(1, Ordering::SeqCst);
                    }
                    if backend.healthy.load(Ordering::SeqCst) {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Configured client whose health loop never gets past its initial delay.
    fn idle_prober(clock: Arc<dyn Clock>) -> Arc<HealthProber> {
        let client = BackendClient::new(Some("http://127.0.0.1:9".to_string())).unwrap();
        HealthProber::new(client, clock)
    }

    fn quiet() -> MonitorTimings {
        MonitorTimings {
            initial_check_delay: Duration::from_secs(3_600),
            ..fast()
        }
    }

    fn fast() -> MonitorTimings {
        MonitorTimings {
            tick: Duration::from_millis(10),
            initial_check_delay: Duration::from_millis(20),
            recheck_interval: Duration::from_millis(100),
        }
    }

    async fn wait_for<F>(rx: &mut tokio::sync::broadcast::Receiver<MonitorUpdate>, pred: F) -> MonitorUpdate
    where
        F: Fn(&MonitorUpdate) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let update = rx.recv().await.expect("monitor alive");
                if pred(&update) {
                    return update;
                }
            }
        })
        .await
        .expect("expected update")
    }

    #[tokio::test]
    async fn sleeping_backend_enters_waking_then_recovers() {
        let backend = Arc::new(Backend {
            healthy: AtomicBool::new(false),
            checks: AtomicUsize::new(0),
            nudges: AtomicUsize::new(0),
        });
        let base = serve(Arc::clone(&backend)).await;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let client = BackendClient::new(Some(base)).unwrap();
        let prober = HealthProber::new(client, Arc::clone(&clock));
        let monitor = AvailabilityMonitor::new(MemoryStore::new(), clock);
        let mut rx = monitor.subscribe();

        let handle = AvailabilityRunner::new(Arc::clone(&monitor), prober, fast()).spawn();

        let update = wait_for(&mut rx, |u| {
            matches!(u.transition, Some(Transition::EnteredWaking { .. }))
        })
        .await;
        assert!(update.state.is_using_fallback_data);

        backend.healthy.store(true, Ordering::SeqCst);
        wait_for(&mut rx, |u| u.transition == Some(Transition::Recovered)).await;
        assert_eq!(monitor.state().phase(), Phase::Idle);

        handle.shutdown().await;
        // Nudge is spawned; give it a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(backend.checks.load(Ordering::SeqCst) >= 2);
        assert_eq!(backend.nudges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unconfigured_backend_never_probes_or_wakes() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let client = BackendClient::new(None).unwrap();
        let prober = HealthProber::new(client, Arc::clone(&clock));
        let monitor = AvailabilityMonitor::new(MemoryStore::new(), clock);

        let handle = AvailabilityRunner::new(Arc::clone(&monitor), Arc::clone(&prober), fast()).spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let state = monitor.state();
        assert!(state.is_using_fallback_data);
        assert!(!state.is_waking_up);
        assert!(prober.last_status().is_none());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn unconfigured_backend_ignores_left_over_wake_record() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = MemoryStore::new();
        let leftover = format!(r#"{{"isWakingUp":true,"wakeUpStartTime":{}}}"#, 1_000_000 - 10_000);
        store.set(WAKE_UP_KEY, &leftover, WriterId::new()).unwrap();

        let prober = HealthProber::new(BackendClient::new(None).unwrap(), clock.clone());
        let monitor = AvailabilityMonitor::new(store.clone(), clock.clone());
        let handle = AvailabilityRunner::new(Arc::clone(&monitor), prober, fast()).spawn();

        let state = monitor.state();
        assert!(!state.is_waking_up);
        assert!(state.is_using_fallback_data);

        clock.advance(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = monitor.state();
        assert!(!state.is_waking_up);
        assert!(state.is_using_fallback_data);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn countdown_elapses_without_further_probes() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let prober = idle_prober(clock.clone());
        let monitor = AvailabilityMonitor::new(MemoryStore::new(), clock.clone());
        let mut rx = monitor.subscribe();

        monitor.report_probe(&crate::types::HealthResult::unhealthy("down"));
        let handle = AvailabilityRunner::new(Arc::clone(&monitor), prober, quiet()).spawn();

        clock.advance(Duration::from_secs(59));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.state().is_waking_up);

        clock.advance(Duration::from_secs(1));
        wait_for(&mut rx, |u| u.transition == Some(Transition::WindowElapsed)).await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_ticking() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let prober = idle_prober(clock.clone());
        let monitor = AvailabilityMonitor::new(MemoryStore::new(), clock.clone());
        monitor.report_probe(&crate::types::HealthResult::unhealthy("down"));

        let handle = AvailabilityRunner::new(Arc::clone(&monitor), prober, quiet()).spawn();
        handle.shutdown().await;

        clock.advance(Duration::from_secs(120));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Nobody ticked, so the window is still nominally open.
        assert!(monitor.state().is_waking_up);
    }
}
