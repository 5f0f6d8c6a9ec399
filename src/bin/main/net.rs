use embassy_net::Stack;
use embassy_time::{Duration, WithTimeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use log::info;
use skycast_core::cycle::CycleError;
use skycast_hal_esp32s3::network::{LinkHandle, WifiConfig};

const JOIN_TIMEOUT_SECS: u64 = 15;
const DHCP_TIMEOUT_SECS: u64 = 15;
const SCAN_MAX_RESULTS: usize = 16;

/// One-shot Wi-Fi bring-up: join the configured network and wait for DHCP,
/// publishing link state and RSSI through `link`. There is no retry loop
/// here; a failed join ends the cycle and the recovery policy decides when
/// to try again.
pub(super) async fn join(
    controller: &mut WifiController<'_>,
    stack: Stack<'_>,
    config: WifiConfig,
    link: &'static LinkHandle,
) -> Result<(), CycleError> {
    link.mark_joining();

    let client_config = ClientConfig::default()
        .with_ssid(config.ssid.into())
        .with_password(config.password.into());
    controller
        .set_config(&ModeConfig::Client(client_config))
        .map_err(|_| CycleError::WifiConnect)?;

    controller
        .start_async()
        .await
        .map_err(|_| CycleError::WifiConnect)?;

    let join_result = controller
        .connect_async()
        .with_timeout(Duration::from_secs(JOIN_TIMEOUT_SECS))
        .await;

    let joined = matches!(join_result, Ok(Ok(())));
    if !joined {
        info!("wifi join failed: {:?}", join_result);
        let err = if ssid_visible(controller, config.ssid).await {
            CycleError::WifiConnect
        } else {
            CycleError::SsidNotFound
        };
        link.mark_down();
        return Err(err);
    }

    if stack
        .wait_config_up()
        .with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS))
        .await
        .is_err()
    {
        info!("dhcp timeout");
        link.mark_down();
        return Err(CycleError::WifiConnect);
    }

    let rssi = current_rssi(controller);
    link.mark_up(rssi, stack.config_v4().is_some());
    info!("wifi connected, rssi={}dBm", rssi);
    Ok(())
}

/// Tear the radio down before sleeping; a live Wi-Fi driver blocks deep
/// sleep.
pub(super) async fn shutdown(controller: &mut WifiController<'_>, link: &'static LinkHandle) {
    let _ = controller.disconnect_async().await;
    let _ = controller.stop_async().await;
    link.mark_down();
}

/// A network that is simply not on the air gets its own error screen; a
/// quick scan after a failed join tells that apart from a bad join.
async fn ssid_visible(controller: &mut WifiController<'_>, ssid: &str) -> bool {
    match controller.scan_n_async(SCAN_MAX_RESULTS).await {
        Ok(access_points) => access_points.iter().any(|ap| ap.ssid.as_str() == ssid),
        Err(err) => {
            info!("post-join scan failed: {:?}", err);
            // Can't tell; report the generic join failure.
            true
        }
    }
}

fn current_rssi(controller: &mut WifiController<'_>) -> i8 {
    match controller.rssi() {
        Ok(rssi) => rssi.clamp(i32::from(i8::MIN), 0) as i8,
        Err(_) => i8::MIN,
    }
}
