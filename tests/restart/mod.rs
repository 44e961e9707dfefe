//! State handed from one process to its successor through the snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadman::ClientStatus;
use deadman::NotificationDispatcher;
use deadman::NotificationSender;
use deadman::ProcessSignal;
use deadman::Result;
use deadman::ShutdownCoordinator;
use deadman::WatchdogLoop;
use parking_lot::Mutex;
use tempfile::tempdir;
use tokio::sync::watch;

use crate::commons::build_store;
use crate::commons::load_config;
use crate::commons::manual_clock;
use crate::enable_logger;

#[derive(Default)]
struct TitleLog {
    titles: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationSender for TitleLog {
    async fn send(
        &self,
        title: &str,
        _body: &str,
        _destinations: &[String],
    ) -> Result<()> {
        self.titles.lock().push(title.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_throttle_survives_graceful_restart() {
    enable_logger();
    let dir = tempdir().unwrap();
    let config = load_config(dir.path(), &["log://ops".to_string()]);
    let clock = manual_clock();
    let log = Arc::new(TitleLog::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        log.clone(),
        config.notify.destinations.clone(),
    ));

    // First process: backup goes silent and gets reported
    let first = build_store(&clock, &config);
    clock.advance(Duration::from_secs(6 * 60));
    WatchdogLoop::from_config("backup", &config, first.clone(), dispatcher.clone())
        .check()
        .unwrap()
        .dispatched
        .unwrap()
        .await
        .unwrap();
    first.reset_heartbeat("prometheus").unwrap();

    let (graceful_tx, _graceful_rx) = watch::channel(());
    let coordinator = ShutdownCoordinator::new(first.clone(), dispatcher.clone(), graceful_tx);
    assert_eq!(coordinator.handle(ProcessSignal::Terminate), Some(0));
    assert!(config.watch.snapshot_file.exists());

    // Successor on the same boot, ten minutes later
    clock.advance(Duration::from_secs(10 * 60));
    let second = build_store(&clock, &config);
    assert!(!config.watch.snapshot_file.exists());

    let backup = WatchdogLoop::from_config("backup", &config, second.clone(), dispatcher.clone());
    let prometheus = WatchdogLoop::from_config("prometheus", &config, second.clone(), dispatcher);

    // Recovered heartbeats are old, but the successor watches for a full
    // down_interval before alarming.
    assert_eq!(backup.check().unwrap().status, ClientStatus::Up);
    assert_eq!(prometheus.check().unwrap().status, ClientStatus::Up);

    clock.advance(Duration::from_secs(5 * 60 + 1));
    prometheus.check().unwrap().dispatched.unwrap().await.unwrap();
    let outcome = backup.check().unwrap();
    assert_eq!(outcome.status, ClientStatus::Down);
    // Notified by the previous process 15 minutes ago
    assert!(outcome.dispatched.is_none());

    clock.advance(Duration::from_secs(60 * 60));
    backup.check().unwrap().dispatched.unwrap().await.unwrap();
    assert!(prometheus.check().unwrap().dispatched.is_none());

    assert_eq!(
        *log.titles.lock(),
        vec![
            "**Nightly backup is down!**".to_string(),
            "**Prometheus is down!**".to_string(),
            "**Nightly backup is down!**".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_interrupt_loses_state() {
    enable_logger();
    let dir = tempdir().unwrap();
    let config = load_config(dir.path(), &["log://ops".to_string()]);
    let clock = manual_clock();
    let log = Arc::new(TitleLog::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(log.clone(), vec![]));

    let first = build_store(&clock, &config);
    first.reset_heartbeat("backup").unwrap();
    let (graceful_tx, _graceful_rx) = watch::channel(());
    let coordinator = ShutdownCoordinator::new(first, dispatcher, graceful_tx);
    assert_eq!(coordinator.handle(ProcessSignal::Interrupt), Some(0));

    assert!(!config.watch.snapshot_file.exists());
    clock.advance(Duration::from_secs(1));
    let second = build_store(&clock, &config);
    // Seeded at startup again, so there is no real heartbeat to show
    assert_eq!(second.last_alert_wall_time("backup").unwrap(), None);
}
