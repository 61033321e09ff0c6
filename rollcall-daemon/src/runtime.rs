use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;

use rollcall_core::Config;
use rollcall_sync::{last_pass, PassReport, PassStatus};

use crate::context::{PassRunner, SyncContext};
use crate::error::{io_err, DaemonError};
use crate::paths::{rollcall_root, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};

pub const SKIPPED_ALREADY_RUNNING: &str = "already running";

/// Result of asking for a pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    Ran { source: String, report: PassReport },
    Skipped { source: String, reason: String },
}

/// Scheduler state shared by the timer and socket tasks.
pub struct PassState {
    in_flight: AtomicBool,
    last: RwLock<Option<PassReport>>,
    started_at_unix: u64,
}

impl PassState {
    pub fn new(last: Option<PassReport>) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            last: RwLock::new(last),
            started_at_unix: unix_seconds_now(),
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn last_pass(&self) -> Option<PassReport> {
        self.last.read().await.clone()
    }
}

/// Holds the in-flight flag; clears it on drop, including on panic.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Connect to both services, then run the daemon on a fresh runtime until
/// it is stopped.
pub fn start_blocking(home: &Path, config: &Config) -> Result<(), DaemonError> {
    init_tracing();
    let context = SyncContext::connect(config)?;
    let ready = context.ready_info();
    tracing::info!(
        bot = %ready.bot,
        guild = %ready.guild,
        interval_secs = config.interval.as_secs(),
        "daemon starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), Arc::new(context), config.interval))
}

/// Run the scheduler, control socket, and signal handler until shutdown.
pub async fn run<R: PassRunner>(
    home: PathBuf,
    runner: Arc<R>,
    period: Duration,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let previous = match last_pass::load_at(&home) {
        Ok(previous) => previous,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable last-pass record");
            None
        }
    };
    let state = Arc::new(PassState::new(previous));
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let home = home.clone();
        let runner = runner.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = scheduler_task(home, runner, state, period, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let home = home.clone();
        let runner = runner.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(home, runner, state, period, shutdown.clone(), shutdown_rx)
                    .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (scheduler_result, socket_result, signal_result) =
        tokio::join!(scheduler_handle, socket_handle, signal_handle);

    handle_join("scheduler", scheduler_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

/// One pass right away, then one per `period`. Ticks missed while a pass
/// runs are dropped.
async fn scheduler_task<R: PassRunner>(
    home: PathBuf,
    runner: Arc<R>,
    state: Arc<PassState>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                if let Err(err) = trigger_pass(&home, &runner, &state, "schedule").await {
                    tracing::error!(error = %err, "scheduled pass did not complete");
                }
            }
        }
    }

    Ok(())
}

/// Run a pass unless one is already in flight.
///
/// Step failures live inside the returned report; `Err` only means the
/// blocking task itself died.
async fn trigger_pass<R: PassRunner>(
    home: &Path,
    runner: &Arc<R>,
    state: &PassState,
    source: &'static str,
) -> Result<PassOutcome, DaemonError> {
    let Some(_guard) = InFlight::acquire(&state.in_flight) else {
        tracing::info!(source, "pass skipped: {SKIPPED_ALREADY_RUNNING}");
        return Ok(PassOutcome::Skipped {
            source: source.to_string(),
            reason: SKIPPED_ALREADY_RUNNING.to_string(),
        });
    };

    let runner = runner.clone();
    let store_home = home.to_path_buf();
    let report = tokio::task::spawn_blocking(move || {
        let report = runner.run_pass();
        if let Err(err) = last_pass::save_at(&store_home, &report) {
            tracing::warn!(error = %err, "failed to record last pass");
        }
        report
    })
    .await
    .map_err(|err| DaemonError::Protocol(format!("pass task join error: {err}")))?;

    if report.status == PassStatus::Complete {
        tracing::info!(
            source,
            roles = report.roles,
            members = report.members,
            duration_ms = report.duration_ms(),
            "pass complete",
        );
    } else {
        tracing::warn!(
            source,
            status = %report.status,
            failed_steps = report.failed_steps().count(),
            "pass finished with failures",
        );
    }

    *state.last.write().await = Some(report.clone());
    Ok(PassOutcome::Ran {
        source: source.to_string(),
        report,
    })
}

async fn socket_server_task<R: PassRunner>(
    home: PathBuf,
    runner: Arc<R>,
    state: Arc<PassState>,
    period: Duration,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "control socket listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let runner = runner.clone();
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, runner, state, period, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client<R: PassRunner>(
    stream: UnixStream,
    home: PathBuf,
    runner: Arc<R>,
    state: Arc<PassState>,
    period: Duration,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "status" => DaemonResponse::ok(build_status_payload(&home, &state, period).await),
            "sync" => match trigger_pass(&home, &runner, &state, "socket").await {
                Ok(outcome) => DaemonResponse::ok(json!(outcome)),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(home: &Path, state: &PassState, period: Duration) -> Value {
    json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "interval_secs": period.as_secs(),
        "pass_in_flight": state.in_flight(),
        "last_pass": state.last_pass().await,
        "socket": socket_path(home).display().to_string(),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = rollcall_root(home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_string(response)?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the `fmt` subscriber on stderr; `RUST_LOG` overrides the `info`
/// default.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Barrier, Mutex};

    use chrono::Utc;
    use rollcall_core::{DirectorySnapshot, DirectorySource, Member, RoleName};
    use rollcall_sync::{pipeline, MemorySheet, SheetLayout};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingRunner {
        calls: AtomicUsize,
    }

    impl PassRunner for CountingRunner {
        fn run_pass(&self) -> PassReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            PassReport::aborted(Utc::now(), "directory offline")
        }
    }

    struct GatedRunner {
        started: Barrier,
        release: Barrier,
        calls: AtomicUsize,
    }

    impl PassRunner for GatedRunner {
        fn run_pass(&self) -> PassReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.wait();
            self.release.wait();
            PassReport::aborted(Utc::now(), "released")
        }
    }

    struct Fixed(DirectorySnapshot);

    impl DirectorySource for Fixed {
        type Error = Infallible;

        fn fetch_roles(&self) -> Result<Vec<RoleName>, Infallible> {
            Ok(self.0.roles.clone())
        }

        fn fetch_members(&self) -> Result<Vec<Member>, Infallible> {
            Ok(self.0.members.clone())
        }
    }

    struct SheetRunner {
        directory: Fixed,
        sheet: Mutex<MemorySheet>,
    }

    impl PassRunner for SheetRunner {
        fn run_pass(&self) -> PassReport {
            let mut sheet = self.sheet.lock().expect("sheet lock");
            pipeline::run_pass(
                &self.directory,
                &mut *sheet,
                &SheetLayout::default(),
                chrono_tz::America::New_York,
            )
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn scheduler_runs_immediately_then_every_period() {
        let home = TempDir::new().expect("home");
        let runner = Arc::new(CountingRunner::default());
        let state = Arc::new(PassState::new(None));
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        let task = tokio::spawn(scheduler_task(
            home.path().to_path_buf(),
            runner.clone(),
            state.clone(),
            Duration::from_secs(60),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown_tx.send(()).expect("shutdown");
        task.await.expect("join").expect("scheduler");

        // t = 0, 60, 120
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
        assert!(state.last_pass().await.is_some());
    }

    #[tokio::test]
    async fn pass_is_skipped_while_one_is_in_flight() {
        let home = TempDir::new().expect("home");
        let runner = Arc::new(CountingRunner::default());
        let state = PassState::new(None);
        state.in_flight.store(true, Ordering::Release);

        let outcome = trigger_pass(home.path(), &runner, &state, "socket")
            .await
            .expect("trigger");

        assert!(matches!(
            outcome,
            PassOutcome::Skipped { ref reason, .. } if reason == SKIPPED_ALREADY_RUNNING
        ));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
        assert!(last_pass::load_at(home.path()).expect("load").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_request_does_not_start_second_pass() {
        let home = TempDir::new().expect("home");
        let runner = Arc::new(GatedRunner {
            started: Barrier::new(2),
            release: Barrier::new(2),
            calls: AtomicUsize::new(0),
        });
        let state = Arc::new(PassState::new(None));

        let first = {
            let home = home.path().to_path_buf();
            let runner = runner.clone();
            let state = state.clone();
            tokio::spawn(async move { trigger_pass(&home, &runner, &state, "schedule").await })
        };

        let gate = runner.clone();
        tokio::task::spawn_blocking(move || gate.started.wait())
            .await
            .expect("started");
        assert!(state.in_flight());

        let second = trigger_pass(home.path(), &runner, &state, "socket")
            .await
            .expect("second");
        assert!(matches!(second, PassOutcome::Skipped { .. }));

        let gate = runner.clone();
        tokio::task::spawn_blocking(move || gate.release.wait())
            .await
            .expect("released");
        let first = first.await.expect("join").expect("first");

        assert!(matches!(first, PassOutcome::Ran { .. }));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        assert!(!state.in_flight());
    }

    #[tokio::test]
    async fn failed_header_step_is_recorded_not_raised() {
        let home = TempDir::new().expect("home");
        let runner = Arc::new(SheetRunner {
            directory: Fixed(DirectorySnapshot {
                roles: vec![RoleName::from("Admin"), RoleName::from("Member")],
                members: vec![Member::new("Alice", Some("Al"), &["Member"])],
            }),
            sheet: Mutex::new(MemorySheet::new().fail_writes_to(SheetLayout::HEADER_RANGE)),
        });
        let state = PassState::new(None);

        let outcome = trigger_pass(home.path(), &runner, &state, "schedule")
            .await
            .expect("a partial pass is not an error");

        let PassOutcome::Ran { report, .. } = outcome else {
            panic!("pass should have run");
        };
        assert_eq!(report.status, PassStatus::Partial);
        assert!(report.stamp.is_some());
        assert!(!state.in_flight());

        let stored = last_pass::load_at(home.path()).expect("load").expect("stored");
        assert_eq!(stored, report);
    }

    #[tokio::test]
    async fn socket_client_serves_status_errors_and_stop() {
        let home = TempDir::new().expect("home");
        let runner = Arc::new(CountingRunner::default());
        let state = Arc::new(PassState::new(None));
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let (client, server) = UnixStream::pair().expect("pair");

        let server_task = tokio::spawn(handle_socket_client(
            server,
            home.path().to_path_buf(),
            runner,
            state,
            Duration::from_secs(3600),
            shutdown_tx,
        ));

        let (read, mut write) = client.into_split();
        let mut lines = BufReader::new(read).lines();

        let status = exchange(&mut write, &mut lines, "{\"cmd\":\"status\"}").await;
        assert_eq!(status["ok"], json!(true));
        assert_eq!(status["data"]["running"], json!(true));
        assert_eq!(status["data"]["interval_secs"], json!(3600));
        assert_eq!(status["data"]["last_pass"], Value::Null);

        let unknown = exchange(&mut write, &mut lines, "{\"cmd\":\"launch\"}").await;
        assert_eq!(unknown["ok"], json!(false));
        assert_eq!(unknown["error"], json!("unknown command 'launch'"));

        let invalid = exchange(&mut write, &mut lines, "not json").await;
        assert_eq!(invalid["ok"], json!(false));

        let stop = exchange(&mut write, &mut lines, "{\"cmd\":\"stop\"}").await;
        assert_eq!(stop["data"]["stopping"], json!(true));

        shutdown_rx.recv().await.expect("shutdown signal");
        server_task.await.expect("join").expect("client handler");
    }

    async fn exchange(
        write: &mut OwnedWriteHalf,
        lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
        request: &str,
    ) -> Value {
        write
            .write_all(format!("{request}\n").as_bytes())
            .await
            .expect("write");
        let line = lines.next_line().await.expect("read").expect("line");
        serde_json::from_str(&line).expect("json")
    }

    #[test]
    fn in_flight_flag_clears_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _held = InFlight::acquire(&flag).expect("first acquire");
            assert!(InFlight::acquire(&flag).is_none());
        }
        assert!(InFlight::acquire(&flag).is_some());
    }
}
