#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

extern crate alloc;

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    Blocking,
    clock::CpuClock,
    delay::Delay,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    peripherals::LPWR,
    rtc_cntl::{SocResetReason, reset_reason, wakeup_cause},
    spi::master::Spi,
    system::Cpu,
    time::Rate,
    timer::timg::TimerGroup,
};
use log::{LevelFilter, info, warn};
use skycast_core::{
    battery::{self, BatteryAction},
    clock::{Clock, LocalTime},
    config::RefreshConfig,
    cycle::{self, CycleError},
    state::{self, PersistentState, StateStore},
    status,
    weather::{AirQuality, OneCall},
};
use skycast_hal_esp32s3::{
    battery::BatteryMonitor,
    clock::SyncedClock,
    network::{LinkHandle, WifiConfig},
    panel::{Panel, PanelFrame, WeatherView, low_battery_notice},
    storage::FlashStateStore,
};
use static_cell::StaticCell;

use fetch::WeatherEndpoints;

#[path = "main/fetch.rs"]
mod fetch;
#[path = "main/net.rs"]
mod net;
#[path = "main/net_time.rs"]
mod net_time;
#[path = "main/power.rs"]
mod power;

const PANEL_SPI_HZ: u32 = 4_000_000;

const CITY: &str = "New York, New York";
const LAT: &str = "40.7128";
const LON: &str = "-74.0060";
const OWM_ENDPOINT: &str = "api.openweathermap.org";
const NTP_SERVERS: [&str; 2] = ["us.pool.ntp.org", "time.nist.gov"];
/// Fixed local offset; DST shifts land with the next firmware build.
const UTC_OFFSET_SECONDS: i32 = -5 * 3600;

const REFRESH_CONFIG: RefreshConfig = RefreshConfig {
    sleep_duration_minutes: 30,
    bed_hour: 0,
    wake_hour: 0,
    low_battery_volts: 3.30,
    very_low_battery_volts: 3.20,
    critical_battery_volts: 3.10,
    low_battery_sleep_minutes: 60,
    very_low_battery_sleep_minutes: 120,
    error_sleep_divisor: 3,
    max_error_retries: 3,
};

const WIFI_SSID: &str = env!(
    "SKYCAST_WIFI_SSID",
    "Set SKYCAST_WIFI_SSID in your environment before building/flashing."
);
const WIFI_PASSWORD: &str = env!(
    "SKYCAST_WIFI_PASSWORD",
    "Set SKYCAST_WIFI_PASSWORD in your environment before building/flashing."
);
const OWM_API_KEY: &str = env!(
    "SKYCAST_OWM_API_KEY",
    "Set SKYCAST_OWM_API_KEY in your environment before building/flashing."
);

const WIFI_CONFIG: WifiConfig = WifiConfig::new(WIFI_SSID, WIFI_PASSWORD);
const ENDPOINTS: WeatherEndpoints = WeatherEndpoints {
    endpoint: OWM_ENDPOINT,
    lat: LAT,
    lon: LON,
    api_key: OWM_API_KEY,
};

static LINK: LinkHandle = LinkHandle::new();
static NET_RESOURCES: StaticCell<embassy_net::StackResources<4>> = StaticCell::new();
static PANEL_FRAME: StaticCell<PanelFrame> = StaticCell::new();

type PanelSpi = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, Delay>;
type BoardPanel = Panel<PanelSpi, Input<'static>, Output<'static>, Output<'static>, Delay>;

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Last resort when the clock never synced this cycle: schedule from the
/// midnight baseline, which degrades to one full interval of sleep.
fn now_or_stale(clock: &mut SyncedClock) -> LocalTime {
    match clock.now() {
        Ok(now) => now,
        Err(err) => {
            warn!("clock unavailable ({:?}); scheduling from stale time", err);
            LocalTime::new(0, 0, 0)
        }
    }
}

fn persist_state(store: &mut Option<FlashStateStore>, state: &PersistentState) {
    if let Some(store) = store.as_mut()
        && let Err(err) = store.save(state)
    {
        warn!("state save failed: {:?}", err);
    }
}

/// Terminal path for a cycle that could not complete a full render.
fn end_cycle_with_failure(
    err: CycleError,
    now: LocalTime,
    state: &mut PersistentState,
    store: &mut Option<FlashStateStore>,
    panel: &mut Option<BoardPanel>,
    delay: &mut Delay,
    lpwr: LPWR<'static>,
) -> ! {
    info!("cycle failed: {:?} (consecutive_errors={})", err, state.consecutive_errors);

    let (plan, seconds) = cycle::plan_after_failure(state, now, &REFRESH_CONFIG);
    persist_state(store, state);

    // Shortened retries sleep without disturbing the panel; the error screen
    // appears once the retry bound is spent.
    if plan.renders_error_screen()
        && let Some(panel) = panel.as_mut()
    {
        let detail = err.detail();
        if let Err(panel_err) = panel.render_notice(err.icon(), err.title(), &detail, delay) {
            warn!("error screen render failed: {:?}", panel_err);
        }
        let _ = panel.power_off(delay);
    }

    power::sleep_for(lpwr, seconds);
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: skycast starting");

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);
    let boot_reset_reason = reset_reason(Cpu::ProCpu);
    let boot_wakeup_cause = wakeup_cause();
    let woke_from_deep_sleep = boot_reset_reason == Some(SocResetReason::CoreDeepSleep);
    info!(
        "boot reset_reason={:?} wakeup_cause={:?} timer_wake={}",
        boot_reset_reason, boot_wakeup_cause, woke_from_deep_sleep
    );

    // esp-radio requires an allocator; so does the weather response buffer.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 131072);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let lpwr = peripherals.LPWR;
    let mut delay = Delay::new();

    // Panel wiring used by this board:
    // SCK=GPIO12, MOSI=GPIO11, CS=GPIO10, DC=GPIO9, RST=GPIO46, BUSY=GPIO3
    info!("panel pins: SCK=12 MOSI=11 CS=10 DC=9 RST=46 BUSY=3; bat ADC=GPIO4");
    let spi_config = esp_hal::spi::master::Config::default()
        .with_frequency(Rate::from_hz(PANEL_SPI_HZ))
        .with_mode(esp_hal::spi::Mode::_0);
    let mut panel: Option<BoardPanel> = match Spi::new(peripherals.SPI2, spi_config) {
        Ok(spi) => {
            let spi = spi
                .with_sck(peripherals.GPIO12)
                .with_mosi(peripherals.GPIO11);
            let cs = Output::new(peripherals.GPIO10, Level::High, OutputConfig::default());
            let dc = Output::new(peripherals.GPIO9, Level::Low, OutputConfig::default());
            let rst = Output::new(peripherals.GPIO46, Level::High, OutputConfig::default());
            let busy = Input::new(
                peripherals.GPIO3,
                InputConfig::default().with_pull(Pull::None),
            );

            match ExclusiveDevice::new(spi, cs, Delay::new()) {
                Ok(spi_device) => {
                    let frame = PANEL_FRAME.init(PanelFrame::default());
                    match Panel::new(spi_device, busy, dc, rst, frame, &mut delay) {
                        Ok(panel) => Some(panel),
                        Err(err) => {
                            warn!("panel init failed: {:?}", err);
                            None
                        }
                    }
                }
                Err(_) => {
                    warn!("panel spi device unavailable");
                    None
                }
            }
        }
        Err(err) => {
            warn!("panel spi init failed: {:?}", err);
            None
        }
    };

    let mut store = match FlashStateStore::new() {
        Ok(store) => Some(store),
        Err(err) => {
            warn!("state storage unavailable ({:?}); latch and error count are volatile", err);
            None
        }
    };
    let loaded_state = match store.as_mut() {
        Some(store) => state::load_or_default(store),
        None => PersistentState::default(),
    };
    let mut persistent = loaded_state;
    info!(
        "persisted state: low_battery_latched={} consecutive_errors={}",
        persistent.low_battery_latched, persistent.consecutive_errors
    );

    // Battery guard runs before anything that costs real power.
    let mut battery_monitor = BatteryMonitor::new(peripherals.ADC1, peripherals.GPIO4);
    let battery_volts = match battery_monitor.read_volts() {
        Ok(volts) => {
            info!("battery voltage: {:.2}V", volts);
            Some(volts)
        }
        Err(err) => {
            warn!("battery read failed: {:?}; skipping battery guard", err);
            None
        }
    };

    if let Some(volts) = battery_volts {
        let action = battery::assess(volts, &mut persistent, &REFRESH_CONFIG);
        if persistent != loaded_state {
            persist_state(&mut store, &persistent);
        }

        match action {
            BatteryAction::Normal => {}
            BatteryAction::WarnThenSleep { minutes } => {
                info!("low battery ({:.2}V); warning then {}min sleep", volts, minutes);
                if let Some(panel) = panel.as_mut() {
                    let (icon, title, detail) = low_battery_notice();
                    if let Err(err) = panel.render_notice(icon, title, detail, &mut delay) {
                        warn!("battery warning render failed: {:?}", err);
                    }
                    let _ = panel.power_off(&mut delay);
                }
                power::sleep_for(lpwr, u64::from(minutes) * 60);
            }
            BatteryAction::SleepSilently { minutes } => {
                info!("battery still low ({:.2}V); {}min sleep", volts, minutes);
                power::sleep_for(lpwr, u64::from(minutes) * 60);
            }
            BatteryAction::Hibernate { warn } => {
                info!("critically low battery ({:.2}V)", volts);
                if warn && let Some(panel) = panel.as_mut() {
                    let (icon, title, detail) = low_battery_notice();
                    if let Err(err) = panel.render_notice(icon, title, detail, &mut delay) {
                        warn!("battery warning render failed: {:?}", err);
                    }
                    let _ = panel.power_off(&mut delay);
                }
                power::hibernate(lpwr);
            }
        }
    }

    // Network phase. A dead radio is a cycle failure like any other, never a
    // reason to boot-loop.
    let mut clock = SyncedClock::new(UTC_OFFSET_SECONDS);

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            warn!("esp-radio init failed: {:?}", err);
            let now = now_or_stale(&mut clock);
            end_cycle_with_failure(
                CycleError::WifiConnect,
                now,
                &mut persistent,
                &mut store,
                &mut panel,
                &mut delay,
                lpwr,
            );
        }
    };

    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                warn!("wifi peripheral init failed: {:?}", err);
                let now = now_or_stale(&mut clock);
                end_cycle_with_failure(
                    CycleError::WifiConnect,
                    now,
                    &mut persistent,
                    &mut store,
                    &mut panel,
                    &mut delay,
                    lpwr,
                );
            }
        };

    let stack_config = embassy_net::Config::dhcpv4(Default::default());
    let (stack, mut net_runner) = embassy_net::new(
        interfaces.sta,
        stack_config,
        NET_RESOURCES.init(embassy_net::StackResources::<4>::new()),
        0x5C1C_A575_0000_0001,
    );

    let cycle_future = async {
        let fetched: Result<(OneCall, AirQuality), CycleError> = async {
            net::join(&mut wifi_controller, stack, WIFI_CONFIG, &LINK).await?;

            let epoch = net_time::query_unix_time(stack, &NTP_SERVERS).await?;
            clock.set_epoch(epoch);

            let one_call = fetch::fetch_one_call(stack, &ENDPOINTS).await?;
            let air = fetch::fetch_air_quality(stack, &ENDPOINTS).await?;
            Ok((one_call, air))
        }
        .await;

        // The RSSI survives the teardown below; snapshot it first.
        let link = LINK.snapshot();

        // Wi-Fi is no longer needed either way, and must be down before
        // deep sleep.
        net::shutdown(&mut wifi_controller, &LINK).await;

        match fetched {
            Ok((one_call, air)) => {
                let now = now_or_stale(&mut clock);
                let stamp = status::format_clock(now.hour, now.minute);

                if let Some(panel) = panel.as_mut() {
                    let view = WeatherView {
                        one_call: &one_call,
                        air,
                        city: CITY,
                        refresh_stamp: &stamp,
                        rssi_dbm: link.rssi_dbm,
                        battery_volts: battery_volts.unwrap_or(0.0),
                        status_note: if battery_volts.is_none() {
                            "Battery sense fault"
                        } else {
                            ""
                        },
                    };
                    if let Err(err) = panel.render_weather(&view, &mut delay) {
                        warn!("weather render failed: {:?}", err);
                    }
                    let _ = panel.power_off(&mut delay);
                }

                let (counter_changed, seconds) =
                    cycle::plan_after_success(&mut persistent, now, &REFRESH_CONFIG);
                if counter_changed {
                    info!("cleared consecutive error count");
                }
                persist_state(&mut store, &persistent);
                power::sleep_for(lpwr, seconds)
            }
            Err(err) => {
                let now = now_or_stale(&mut clock);
                end_cycle_with_failure(
                    err,
                    now,
                    &mut persistent,
                    &mut store,
                    &mut panel,
                    &mut delay,
                    lpwr,
                )
            }
        }
    };

    // The network runner never returns and every cycle path ends in deep
    // sleep, so neither side of this select completes normally.
    match select(net_runner.run(), cycle_future).await {
        Either::First(never) => never,
        Either::Second(never) => never,
    }
}
