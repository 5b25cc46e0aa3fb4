use core::convert::TryInto;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::{mpsc, Arc, Mutex, OnceLock},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use embedded_svc::{
    http::{Headers, Method},
    io::{Read, Write},
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    gpio::PinDriver,
    i2c::{I2cConfig, I2cDriver},
    units::FromValueType,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::server::{Configuration as HttpConfiguration, EspHttpServer},
    log::EspLogger,
    nvs::{EspDefaultNvsPartition, EspNvs},
    sntp::{EspSntp, SyncStatus},
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};
use serde::Serialize;

use mochi_common::{
    Clock, DataPayload, Device, DeviceSettings, HistoryPayload, LocalTime, MochiController,
    RuntimeConfig,
};

use crate::board::{ClimateSensors, GpioBuzzer, GpioTouch, OledPanel};

const NVS_NAMESPACE: &str = "mochi";
const NVS_RUNTIME_KEY: &str = "runtime_json";
const NVS_WIFI_SSID_KEY: &str = "wifi_ssid";
const NVS_WIFI_PASS_KEY: &str = "wifi_pass";
const MAX_HTTP_BODY: usize = 2048;
const WATCHDOG_TIMEOUT_SEC: u32 = 30;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const I2C_BAUD_KHZ: u32 = 400;

type EspDevice = Device<EspClock, ClimateSensors, GpioTouch, OledPanel, GpioBuzzer>;

#[derive(Debug)]
enum Command {
    Reload(DeviceSettings),
    EnterUpdating,
    LeaveUpdating,
}

#[derive(Debug, Clone)]
struct Snapshot {
    data: DataPayload,
    history: HistoryPayload,
    settings: DeviceSettings,
}

impl Snapshot {
    fn capture(device: &EspDevice) -> Self {
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
struct NvsStore {
    partition: EspDefaultNvsPartition,
    lock: Arc<Mutex<()>>,
}

struct WifiCredentials {
    ssid: String,
    pass: String,
}

#[derive(Debug, Serialize)]
struct Accepted {
    accepted: bool,
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let nvs_store = NvsStore {
        partition: nvs_partition.clone(),
        lock: Arc::new(Mutex::new(())),
    };

    let runtime = nvs_store.load_runtime_config().unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    info!(
        "NVS config loaded: name=`{}`, timezone=`{}`",
        runtime.settings.device_name, runtime.settings.timezone
    );

    let peripherals = Peripherals::take()?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &I2cConfig::new().baudrate(I2C_BAUD_KHZ.kHz().into()),
    )
    .context("failed to open I2C bus")?;
    let bus = Rc::new(RefCell::new(i2c));

    let panel = OledPanel::new(bus.clone())?;
    let sensors = ClimateSensors::new(bus)?;
    let touch = GpioTouch(PinDriver::input(peripherals.pins.gpio7.downgrade_input())?);
    let buzzer = GpioBuzzer(PinDriver::output(
        peripherals.pins.gpio6.downgrade_output(),
    )?);

    let credentials = nvs_store.load_wifi_credentials().unwrap_or_else(|err| {
        warn!("failed to load wifi credentials from NVS: {err:#}");
        None
    });
    let wifi = match credentials {
        Some(credentials) => {
            connect_wifi(peripherals.modem, sys_loop, nvs_partition, &credentials)?
        }
        None => {
            warn!("wifi credentials missing; running offline without time sync");
            None
        }
    };

    let sntp = match wifi {
        Some(_) => Some(EspSntp::new_default().context("failed to start SNTP")?),
        None => None,
    };

    let clock = EspClock::new(&runtime.settings.timezone, sntp);
    let controller = MochiController::new(
        runtime.controller.clone(),
        runtime.settings.clone(),
        clock.now_ms(),
    );
    let mut device = Device::new(controller, clock, sensors, touch, panel, buzzer);
    device.start();

    let snapshot = Arc::new(Mutex::new(Snapshot::capture(&device)));
    let (commands, command_rx) = mpsc::channel();
    let _server = match wifi {
        Some(_) => Some(create_http_server(snapshot.clone(), commands, nvs_store)?),
        None => None,
    };
    // Keep the station alive for the program lifetime.
    let _wifi = wifi;

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    loop {
        feed_watchdog();

        while let Ok(command) = command_rx.try_recv() {
            apply_command(&mut device, command);
        }

        device.step();
        match snapshot.lock() {
            Ok(mut shared) => *shared = Snapshot::capture(&device),
            Err(_) => warn!("snapshot lock poisoned"),
        }
        device.idle();
    }
}

fn apply_command(device: &mut EspDevice, command: Command) {
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

fn create_http_server(
    snapshot: Arc<Mutex<Snapshot>>,
    commands: mpsc::Sender<Command>,
    nvs_store: NvsStore,
) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: 10 * 1024,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    {
        let snapshot = snapshot.clone();
        server.fn_handler("/api/data", Method::Get, move |req| {
            let data = read_snapshot(&snapshot)?.data;
            write_json(req, 200, &data)
        })?;
    }

    {
        let snapshot = snapshot.clone();
        server.fn_handler("/api/history", Method::Get, move |req| {
            let history = read_snapshot(&snapshot)?.history;
            write_json(req, 200, &history)
        })?;
    }

    {
        let snapshot = snapshot.clone();
        server.fn_handler("/api/settings", Method::Get, move |req| {
            let settings = read_snapshot(&snapshot)?.settings;
            write_json(req, 200, &settings)
        })?;
    }

    {
        let commands = commands.clone();
        server.fn_handler("/api/settings", Method::Put, move |mut req| {
            let body = read_request_body(&mut req)?;
            let Ok(settings) = serde_json::from_slice::<DeviceSettings>(&body) else {
                return write_error(req, 400, "Invalid settings payload");
            };

            let settings = match settings.checked() {
                Ok(settings) => settings,
                Err(err) => return write_error(req, 400, &err.to_string()),
            };
            if settings.timezone.parse::<Tz>().is_err() {
                return write_error(req, 400, "Invalid timezone value");
            }

            if let Err(err) = nvs_store.save_settings(&settings) {
                warn!("failed to persist settings update: {err:#}");
                return write_error(req, 500, "Failed to persist runtime settings");
            }
            if commands.send(Command::Reload(settings.clone())).is_err() {
                return write_error(req, 503, "Control loop is not running");
            }

            write_json(req, 200, &settings)
        })?;
    }

    {
        let commands = commands.clone();
        server.fn_handler("/api/update/begin", Method::Post, move |req| {
            send_command(req, &commands, Command::EnterUpdating)
        })?;
    }

    server.fn_handler("/api/update/end", Method::Post, move |req| {
        send_command(req, &commands, Command::LeaveUpdating)
    })?;

    info!("http server started");
    Ok(server)
}

type HttpRequest<'a, 'b> =
    esp_idf_svc::http::server::Request<&'a mut esp_idf_svc::http::server::EspHttpConnection<'b>>;

fn read_snapshot(snapshot: &Arc<Mutex<Snapshot>>) -> anyhow::Result<Snapshot> {
    snapshot
        .lock()
        .map(|shared| shared.clone())
        .map_err(|_| anyhow!("snapshot lock poisoned"))
}

fn send_command(
    req: HttpRequest<'_, '_>,
    commands: &mpsc::Sender<Command>,
    command: Command,
) -> anyhow::Result<()> {
    match commands.send(command) {
        Ok(()) => write_json(req, 202, &Accepted { accepted: true }),
        Err(_) => write_error(req, 503, "Control loop is not running"),
    }
}

fn read_request_body(req: &mut HttpRequest<'_, '_>) -> anyhow::Result<Vec<u8>> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len > MAX_HTTP_BODY {
        return Err(anyhow!("request body too large"));
    }

    let mut body = vec![0_u8; len];
    if len > 0 {
        req.read_exact(&mut body)?;
    }
    Ok(body)
}

fn write_json<T: Serialize>(
    req: HttpRequest<'_, '_>,
    status_code: u16,
    payload: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(payload)?;
    req.into_response(
        status_code,
        None,
        &[("Content-Type", "application/json; charset=utf-8")],
    )?
    .write_all(&body)?;
    Ok(())
}

fn write_error(req: HttpRequest<'_, '_>, status_code: u16, message: &str) -> anyhow::Result<()> {
    write_json(req, status_code, &serde_json::json!({ "error": message }))
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    credentials: &WifiCredentials,
) -> anyhow::Result<Option<EspWifi<'static>>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if credentials.pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: credentials
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: credentials
            .pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", credentials.ssid);

    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        let result = wifi.connect().and_then(|()| wifi.wait_netif_up());
        match result {
            Ok(()) => {
                info!("wifi connected and netif up on attempt {attempt}");
                return Ok(Some(esp_wifi));
            }
            Err(err) => warn!("wifi connect failed on attempt {attempt}: {err:#}"),
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    warn!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed; running offline");
    let _ = wifi.disconnect();
    let _ = wifi.stop();
    Ok(None)
}

impl NvsStore {
    fn open(&self) -> anyhow::Result<EspNvs<esp_idf_svc::nvs::NvsDefault>> {
        Ok(EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?)
    }

    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("nvs lock poisoned"))?;
        let nvs = self.open()?;
        let mut buffer = vec![0_u8; 2048];

        match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
            Some(value) => Ok(RuntimeConfig::from_json(value.as_bytes())?),
            None => Ok(RuntimeConfig::default()),
        }
    }

    fn save_settings(&self, settings: &DeviceSettings) -> anyhow::Result<()> {
        let mut runtime = self.load_runtime_config()?;
        runtime.settings = settings.clone();

        let _guard = self.lock.lock().map_err(|_| anyhow!("nvs lock poisoned"))?;
        let mut nvs = self.open()?;
        let payload = String::from_utf8(runtime.to_json()?)?;
        nvs.set_str(NVS_RUNTIME_KEY, &payload)?;
        Ok(())
    }

    /// Stored credentials win; build-time `WIFI_SSID`/`WIFI_PASS` are the fallback.
    fn load_wifi_credentials(&self) -> anyhow::Result<Option<WifiCredentials>> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("nvs lock poisoned"))?;
        let nvs = self.open()?;
        let mut ssid_buf = [0_u8; 64];
        let mut pass_buf = [0_u8; 96];

        let ssid = nvs
            .get_str(NVS_WIFI_SSID_KEY, &mut ssid_buf)?
            .map(str::to_string)
            .or_else(|| option_env!("WIFI_SSID").map(str::to_string))
            .unwrap_or_default();
        let pass = nvs
            .get_str(NVS_WIFI_PASS_KEY, &mut pass_buf)?
            .map(str::to_string)
            .or_else(|| option_env!("WIFI_PASS").map(str::to_string))
            .unwrap_or_default();

        if ssid.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(WifiCredentials { ssid, pass }))
    }
}

/// Monotonic time from boot; wall-clock time only after the first SNTP sync.
struct EspClock {
    timezone: Option<Tz>,
    sntp: Option<EspSntp<'static>>,
    synced: Cell<bool>,
}

impl EspClock {
    fn new(timezone: &str, sntp: Option<EspSntp<'static>>) -> Self {
        let mut clock = Self {
            timezone: None,
            sntp,
            synced: Cell::new(false),
        };
        clock.set_timezone(timezone);
        clock
    }

    fn set_timezone(&mut self, timezone: &str) {
        self.timezone = timezone.parse::<Tz>().ok();
        if self.timezone.is_none() {
            warn!("unknown timezone `{timezone}`, wall-clock features disabled");
        }
    }

    fn is_synced(&self) -> bool {
        if !self.synced.get() {
            let completed = self
                .sntp
                .as_ref()
                .is_some_and(|sntp| sntp.get_sync_status() == SyncStatus::Completed);
            if completed {
                info!("SNTP time synchronised");
                self.synced.set(true);
            }
        }
        self.synced.get()
    }

    fn now_local(&self) -> Option<DateTime<FixedOffset>> {
        if !self.is_synced() {
            return None;
        }
        let tz = self.timezone?;
        let local = Utc::now().with_timezone(&tz);
        Some(local.with_timezone(&local.offset().fix()))
    }
}

impl Clock for EspClock {
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

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
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
