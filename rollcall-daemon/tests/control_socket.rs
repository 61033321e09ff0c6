//! Full daemon lifecycle over a real Unix socket in a temporary home.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rollcall_daemon::paths::socket_path;
use rollcall_daemon::{request_status, request_stop, request_sync, run, PassRunner};
use rollcall_sync::{last_pass, PassReport};
use tempfile::TempDir;

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl PassRunner for Counting {
    fn run_pass(&self) -> PassReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PassReport::aborted(Utc::now(), "directory offline")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_sync_and_stop_over_socket() {
    let home = TempDir::new().expect("home");
    let home_path = home.path().to_path_buf();
    let runner = Arc::new(Counting::default());

    let daemon = tokio::spawn(run(
        home_path.clone(),
        runner.clone(),
        Duration::from_secs(3600),
    ));

    let h = home_path.clone();
    let status = tokio::task::spawn_blocking(move || request_status(&h))
        .await
        .expect("join")
        .expect("status");
    assert_eq!(status["running"], true);
    assert_eq!(status["interval_secs"], 3600);
    let mut keys: Vec<&str> = status
        .as_object()
        .expect("status object")
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        [
            "interval_secs",
            "last_pass",
            "pass_in_flight",
            "running",
            "socket",
            "started_at_unix"
        ]
    );

    let h = home_path.clone();
    let synced = tokio::task::spawn_blocking(move || request_sync(&h))
        .await
        .expect("join")
        .expect("sync");
    let outcome = synced["outcome"].as_str().expect("outcome");
    assert!(outcome == "ran" || outcome == "skipped", "got: {synced}");

    let h = home_path.clone();
    tokio::task::spawn_blocking(move || request_stop(&h))
        .await
        .expect("join")
        .expect("stop");

    tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon exits after stop")
        .expect("join")
        .expect("clean shutdown");

    assert!(runner.calls.load(Ordering::SeqCst) >= 1);
    assert!(last_pass::load_at(&home_path).expect("load").is_some());
    assert!(!socket_path(&home_path).exists());
}
