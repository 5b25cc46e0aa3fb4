use std::{
    f32::consts::TAU,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch, Mutex},
};
use tracing::{debug, info, warn};

use mochi_common::{
    Buzzer, Clock, DataPayload, Device, DeviceSettings, Display, EnvironmentSensor, Frame,
    HistoryPayload, LocalTime, MochiController, Reading, RuntimeConfig, SensorError, TouchInput,
};

type HostDevice = Device<HostClock, SimulatedSensor, SimulatedTouch, LogDisplay, LogBuzzer>;

/// Requests from the HTTP side, applied by the control loop between iterations.
#[derive(Debug)]
enum Command {
    Reload(DeviceSettings),
    EnterUpdating,
    LeaveUpdating,
}

/// What the API can see of the loop. Replaced wholesale after every iteration.
#[derive(Debug, Clone)]
struct Snapshot {
    data: DataPayload,
    history: HistoryPayload,
    settings: DeviceSettings,
}

impl Snapshot {
    fn capture(device: &HostDevice) -> Self {
        let clock = device.clock();
        let controller = device.controller();
        Self {
            data: controller.data_payload(clock.now_ms(), clock.now_local().as_ref()),
            history: controller.history_payload(),
            settings: controller.settings().clone(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    touch: Arc<AtomicBool>,
    store: AppStore,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct Accepted {
    accepted: bool,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });

    let clock = HostClock::new(&runtime.settings.timezone);
    let controller =
        MochiController::new(runtime.controller.clone(), runtime.settings, clock.now_ms());
    let touch = Arc::new(AtomicBool::new(false));
    let device = Device::new(
        controller,
        clock,
        SimulatedSensor::new(),
        SimulatedTouch(touch.clone()),
        LogDisplay,
        LogBuzzer,
    );

    let (snapshot_tx, snapshots) = watch::channel(Snapshot::capture(&device));
    let (commands, command_rx) = mpsc::unbounded_channel();

    thread::Builder::new()
        .name("mochi-loop".to_string())
        .spawn(move || control_loop(device, command_rx, snapshot_tx))
        .context("failed to spawn control loop thread")?;

    let app_state = AppState {
        commands,
        snapshots,
        touch,
        store,
    };

    let app = Router::new()
        .route("/api/data", get(handle_get_data))
        .route("/api/history", get(handle_get_history))
        .route(
            "/api/settings",
            get(handle_get_settings).put(handle_put_settings),
        )
        .route("/api/update/begin", post(handle_update_begin))
        .route("/api/update/end", post(handle_update_end))
        .route("/api/touch", post(handle_touch))
        .with_state(app_state);

    let port = std::env::var("MOCHI_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind mochi server at {addr}"))?;

    info!("mochi listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn control_loop(
    mut device: HostDevice,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<Snapshot>,
) {
    device.start();

    loop {
        while let Ok(command) = commands.try_recv() {
            apply_command(&mut device, command);
        }

        device.step();
        snapshots.send_replace(Snapshot::capture(&device));
        device.idle();
    }
}

fn apply_command(device: &mut HostDevice, command: Command) {
    match command {
        Command::Reload(settings) => {
            device.clock_mut().set_timezone(&settings.timezone);
            device.controller_mut().reload_settings(settings);
        }
        Command::EnterUpdating => {
            device.controller_mut().enter_updating();
        }
        Command::LeaveUpdating => {
            device.controller_mut().leave_updating();
        }
    }
}

async fn handle_get_data(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.snapshots.borrow().data.clone())
}

async fn handle_get_history(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.snapshots.borrow().history.clone())
}

async fn handle_get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.snapshots.borrow().settings.clone())
}

async fn handle_put_settings(
    State(state): State<AppState>,
    Json(settings): Json<DeviceSettings>,
) -> impl IntoResponse {
    let settings = match settings.checked() {
        Ok(settings) => settings,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    if settings.timezone.parse::<Tz>().is_err() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid timezone value");
    }

    if let Err(err) = state.store.save_settings(&settings).await {
        warn!("failed to persist settings update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    if state.commands.send(Command::Reload(settings.clone())).is_err() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Control loop is not running");
    }

    Json(settings).into_response()
}

async fn handle_update_begin(State(state): State<AppState>) -> impl IntoResponse {
    send_command(&state, Command::EnterUpdating)
}

async fn handle_update_end(State(state): State<AppState>) -> impl IntoResponse {
    send_command(&state, Command::LeaveUpdating)
}

async fn handle_touch(State(state): State<AppState>) -> impl IntoResponse {
    state.touch.store(true, Ordering::Relaxed);
    (StatusCode::ACCEPTED, Json(Accepted { accepted: true })).into_response()
}

fn send_command(state: &AppState, command: Command) -> axum::response::Response {
    match state.commands.send(command) {
        Ok(()) => (StatusCode::ACCEPTED, Json(Accepted { accepted: true })).into_response(),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, "Control loop is not running"),
    }
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("MOCHI_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.mochi"));

        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(RuntimeConfig::from_json(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.runtime_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, runtime.to_json()?)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Replaces only the user settings; controller timing stays as stored.
    async fn save_settings(&self, settings: &DeviceSettings) -> anyhow::Result<()> {
        let mut runtime = self.load_runtime_config().await?;
        runtime.settings = settings.clone();
        self.save_runtime_config(&runtime).await
    }
}

struct HostClock {
    timezone: Option<Tz>,
}

impl HostClock {
    fn new(timezone: &str) -> Self {
        let mut clock = Self { timezone: None };
        clock.set_timezone(timezone);
        clock
    }

    fn set_timezone(&mut self, timezone: &str) {
        self.timezone = timezone.parse::<Tz>().ok();
        if self.timezone.is_none() {
            warn!("unknown timezone '{timezone}', wall-clock features disabled");
        }
    }

    fn now_local(&self) -> Option<DateTime<FixedOffset>> {
        let tz = self.timezone?;
        let local = Utc::now().with_timezone(&tz);
        Some(local.with_timezone(&local.offset().fix()))
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        monotonic_ms()
    }

    fn local_time(&self) -> Option<LocalTime> {
        self.now_local().as_ref().map(LocalTime::from_chrono)
    }

    fn sleep_ms(&mut self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Slow synthetic weather: one full swing every ten minutes, crossing both default
/// thresholds.
struct SimulatedSensor {
    started: Instant,
}

impl SimulatedSensor {
    const PERIOD_SECS: f32 = 600.0;

    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl EnvironmentSensor for SimulatedSensor {
    fn read_environment(&mut self) -> Result<Reading, SensorError> {
        let phase = (self.started.elapsed().as_secs_f32() / Self::PERIOD_SECS) * TAU;
        Ok(Reading {
            temperature_c: 24.0 + 8.0 * phase.sin(),
            humidity_pct: 45.0 + 10.0 * phase.cos(),
            pressure_hpa: 1013.0 + 2.0 * (phase * 0.5).sin(),
        })
    }
}

/// A press posted through the API is seen by exactly one loop iteration.
struct SimulatedTouch(Arc<AtomicBool>);

impl TouchInput for SimulatedTouch {
    fn is_touch_active(&mut self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

struct LogDisplay;

impl Display for LogDisplay {
    fn render(&mut self, frame: &Frame) {
        info!(
            "display: {} ({} shapes)",
            frame.caption(),
            frame.shapes.len()
        );
    }

    fn set_power(&mut self, on: bool) {
        info!("display power {}", if on { "on" } else { "off" });
    }
}

struct LogBuzzer;

impl Buzzer for LogBuzzer {
    fn pulse(&mut self, duration_ms: u32) {
        debug!("buzzer pulse {duration_ms} ms");
        thread::sleep(Duration::from_millis(u64::from(duration_ms)));
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
