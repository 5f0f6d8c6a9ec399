use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_time::Duration;
use log::info;
use skycast_core::cycle::CycleError;
use sntpc::{NtpContext, NtpTimestampGenerator};

const NTP_PORT: u16 = 123;
const NTP_PACKET_SIZE: usize = 48;
const NTP_TO_UNIX_OFFSET: u32 = 2_208_988_800;
const QUERY_TIMEOUT_SECS: u64 = 5;

/// Query the configured NTP servers in order; first answer wins. Returns
/// unix-epoch seconds (UTC).
pub(super) async fn query_unix_time(
    stack: Stack<'_>,
    servers: &[&str],
) -> Result<i64, CycleError> {
    for server in servers {
        match query_server(stack, server).await {
            Ok(epoch) => {
                info!("sntp: {} answered, epoch={}", server, epoch);
                return Ok(epoch);
            }
            Err(()) => {
                info!("sntp: {} did not answer", server);
            }
        }
    }
    Err(CycleError::TimeSync)
}

async fn query_server(stack: Stack<'_>, server: &str) -> Result<i64, ()> {
    let addrs = stack
        .dns_query(server, DnsQueryType::A)
        .await
        .map_err(|_| ())?;
    let addr = *addrs.first().ok_or(())?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0u8; NTP_PACKET_SIZE];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0u8; NTP_PACKET_SIZE];

    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| ())?;

    let context = NtpContext::new(MonotonicTimestampGen::default());
    let query = sntpc::get_time(core::net::SocketAddr::from((addr, NTP_PORT)), &socket, context);
    let result = embassy_time::with_timeout(Duration::from_secs(QUERY_TIMEOUT_SECS), query)
        .await
        .map_err(|_| ())?
        .map_err(|_| ())?;

    Ok(i64::from(result.sec()) - i64::from(NTP_TO_UNIX_OFFSET))
}

/// SNTP only needs a send-side timestamp with stable forward motion; the
/// monotonic timer serves, even though it does not know the wall time.
#[derive(Clone, Copy)]
struct MonotonicTimestampGen {
    now: embassy_time::Instant,
}

impl Default for MonotonicTimestampGen {
    fn default() -> Self {
        Self {
            now: embassy_time::Instant::from_ticks(0),
        }
    }
}

impl NtpTimestampGenerator for MonotonicTimestampGen {
    fn init(&mut self) {
        self.now = embassy_time::Instant::now();
    }

    fn timestamp_sec(&self) -> u64 {
        self.now.as_secs()
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        (self.now.as_micros() % 1_000_000) as u32
    }
}
