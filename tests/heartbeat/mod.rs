//! Heartbeats over HTTP, silence detection and webhook delivery, wired the
//! way the binary wires them.

use std::sync::Arc;
use std::time::Duration;

use deadman::routes;
use deadman::ChannelSender;
use deadman::ClientStatus;
use deadman::NotificationDispatcher;
use deadman::ServerContext;
use deadman::WatchdogLoop;
use tempfile::tempdir;
use tokio::time::timeout;

use crate::commons::build_store;
use crate::commons::load_config;
use crate::commons::manual_clock;
use crate::commons::start_webhook;
use crate::enable_logger;

#[tokio::test]
async fn test_silent_client_is_reported_to_webhook() {
    enable_logger();
    let dir = tempdir().unwrap();
    let (hook_addr, mut hook_rx) = start_webhook();
    let config = load_config(dir.path(), &[format!("http://{}/hook", hook_addr)]);

    let clock = manual_clock();
    let store = build_store(&clock, &config);
    let sender = Arc::new(ChannelSender::new(config.notify.send_timeout).unwrap());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        sender,
        config.notify.destinations.clone(),
    ));
    let ctx = Arc::new(ServerContext::new(&config, store.clone()));
    let (api_addr, server) = warp::serve(routes(ctx)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    let http = reqwest::Client::new();

    // Heartbeat at t = 1m
    clock.advance(Duration::from_secs(60));
    let response = http
        .post(format!(
            "http://{}/alive?clientid=prometheus&key=clientkey1",
            api_addr
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Success!");

    let watchdog = WatchdogLoop::from_config("prometheus", &config, store.clone(), dispatcher);

    clock.advance(Duration::from_secs(3 * 60));
    assert_eq!(watchdog.check().unwrap().status, ClientStatus::Up);

    clock.advance(Duration::from_secs(150));
    let outcome = watchdog.check().unwrap();
    assert_eq!(outcome.status, ClientStatus::Down);
    outcome.dispatched.unwrap().await.unwrap();

    let payload = timeout(Duration::from_secs(5), hook_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload["title"], "**Prometheus is down!**");
    let body = payload["body"].as_str().unwrap();
    assert!(body.contains("\"Prometheus\" (prometheus)"));
    assert!(body.contains("since 2024-06-01T12:01:00Z."));

    // Throttled until repeat_interval elapses
    clock.advance(Duration::from_secs(30 * 60));
    assert!(watchdog.check().unwrap().dispatched.is_none());

    // Back up after a fresh heartbeat
    let response = http
        .post(format!(
            "http://{}/alive?clientid=prometheus&key=clientkey1",
            api_addr
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(watchdog.check().unwrap().status, ClientStatus::Up);
}

#[tokio::test]
async fn test_rejected_heartbeats_leave_state_untouched() {
    enable_logger();
    let dir = tempdir().unwrap();
    let config = load_config(dir.path(), &["log://ops".to_string()]);
    let clock = manual_clock();
    let store = build_store(&clock, &config);
    let api = routes(Arc::new(ServerContext::new(&config, store.clone())));
    clock.advance(Duration::from_secs(30));

    for (path, status) in [
        ("/alive?clientid=prometheus&key=bad", 401),
        ("/alive?clientid=prometheus", 400),
        ("/alive?clientid=grafana", 404),
    ] {
        let response = warp::test::request()
            .method("POST")
            .path(path)
            .reply(&api)
            .await;
        assert_eq!(response.status(), status, "{}", path);
    }
    assert_eq!(store.last_alert_wall_time("prometheus").unwrap(), None);

    // The keyless client only needs its id
    let response = warp::test::request()
        .method("POST")
        .path("/alive?clientid=backup")
        .reply(&api)
        .await;
    assert_eq!(response.status(), 200);
    assert!(store.last_alert_wall_time("backup").unwrap().is_some());
}
