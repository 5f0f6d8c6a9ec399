use core::fmt::Write as _;

use alloc::vec;
use embassy_net::Stack;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use heapless::String;
use log::info;
use reqwless::client::HttpClient;
use reqwless::request::Method;
use skycast_core::cycle::CycleError;
use skycast_core::weather::{self, AirQuality, OneCall, ParseError};

/// One Call with minutely/alerts excluded still runs tens of kilobytes.
const RX_BUFFER_BYTES: usize = 32 * 1024;
const URL_BYTES: usize = 224;

const TCP_SOCKETS: usize = 1;
const TCP_BUFFER_BYTES: usize = 4096;

/// Where the weather comes from.
#[derive(Clone, Copy, Debug)]
pub(super) struct WeatherEndpoints {
    pub endpoint: &'static str,
    pub lat: &'static str,
    pub lon: &'static str,
    pub api_key: &'static str,
}

impl WeatherEndpoints {
    fn one_call_url(&self) -> String<URL_BYTES> {
        let mut url = String::new();
        let _ = write!(
            url,
            "http://{}/data/3.0/onecall?lat={}&lon={}&units=metric&exclude=minutely,alerts&appid={}",
            self.endpoint, self.lat, self.lon, self.api_key
        );
        url
    }

    fn air_pollution_url(&self) -> String<URL_BYTES> {
        let mut url = String::new();
        let _ = write!(
            url,
            "http://{}/data/2.5/air_pollution?lat={}&lon={}&appid={}",
            self.endpoint, self.lat, self.lon, self.api_key
        );
        url
    }
}

pub(super) async fn fetch_one_call(
    stack: Stack<'_>,
    endpoints: &WeatherEndpoints,
) -> Result<OneCall, CycleError> {
    let url = endpoints.one_call_url();
    get_json(
        stack,
        &url,
        "one call",
        |status| CycleError::OneCallApi { status },
        weather::parse_one_call,
    )
    .await
}

pub(super) async fn fetch_air_quality(
    stack: Stack<'_>,
    endpoints: &WeatherEndpoints,
) -> Result<AirQuality, CycleError> {
    let url = endpoints.air_pollution_url();
    get_json(
        stack,
        &url,
        "air pollution",
        |status| CycleError::AirPollutionApi { status },
        weather::parse_air_quality,
    )
    .await
}

/// GET `url` and parse the body in place, while the receive buffer is still
/// alive. Transport failures surface as status 0; an unparseable 200 keeps
/// the 200 so the error screen points at the upstream API.
async fn get_json<T>(
    stack: Stack<'_>,
    url: &str,
    label: &'static str,
    err_for_status: impl Fn(u16) -> CycleError + Copy,
    parse: impl FnOnce(&[u8]) -> Result<T, ParseError>,
) -> Result<T, CycleError> {
    let tcp_state: TcpClientState<TCP_SOCKETS, TCP_BUFFER_BYTES, TCP_BUFFER_BYTES> =
        TcpClientState::new();
    let tcp_client = TcpClient::new(stack, &tcp_state);
    let dns = DnsSocket::new(stack);
    let mut http = HttpClient::new(&tcp_client, &dns);

    let mut rx_buf = vec![0u8; RX_BUFFER_BYTES];

    let mut request = http
        .request(Method::GET, url)
        .await
        .map_err(|_| err_for_status(0))?;
    let response = request
        .send(&mut rx_buf)
        .await
        .map_err(|_| err_for_status(0))?;

    let status = response.status;
    if !status.is_successful() {
        info!("{} request -> http {}", label, status.0);
        return Err(err_for_status(status.0));
    }

    let body = response
        .body()
        .read_to_end()
        .await
        .map_err(|_| err_for_status(0))?;

    parse(body).map_err(|err| {
        info!("{} response unparseable: {:?}", label, err);
        err_for_status(200)
    })
}
