//! Data-channel management for FTP transfers.
//!
//! Supports four modes (RFC 959 + RFC 2428):
//! - **PASV** — server opens a port, client connects
//! - **EPSV** — extended passive (IPv6-ready)
//! - **PORT** — client opens a port, tells server
//! - **EPRT** — extended active (IPv6-ready)
//!
//! Active modes only bind here; the server connects after the transfer
//! command has been sent, so [`DataChannel::establish`] is called then.

use crate::error::{FtpError, FtpResult};
use crate::protocol::FtpCodec;
use crate::types::DataChannelMode;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").expect("static regex");
    static ref EPSV_RE: Regex = Regex::new(r"\|\|\|(\d+)\|").expect("static regex");
}

/// A data channel negotiated but not necessarily connected yet.
pub enum DataChannel {
    /// Passive modes: already connected to the server.
    Connected(TcpStream),
    /// Active modes: waiting for the server to connect back.
    Listening {
        listener: TcpListener,
        timeout: Duration,
    },
}

impl DataChannel {
    /// The connected data stream; accepts the server's connection for
    /// active modes.
    pub async fn establish(self) -> FtpResult<TcpStream> {
        match self {
            DataChannel::Connected(tcp) => Ok(tcp),
            DataChannel::Listening { listener, timeout: dur } => {
                let (tcp, peer) = timeout(dur, listener.accept())
                    .await
                    .map_err(|_| FtpError::data_channel("Active data accept timed out"))?
                    .map_err(|e| FtpError::data_channel(format!("Active data accept: {}", e)))?;
                log::trace!("data connection from {}", peer);
                Ok(tcp)
            }
        }
    }
}

/// Negotiate a data channel according to the configured mode.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    mode: DataChannelMode,
    host: &str,
    data_timeout: Duration,
    active_bind: Option<&str>,
) -> FtpResult<DataChannel> {
    match mode {
        DataChannelMode::Passive => Ok(DataChannel::Connected(open_pasv(codec, data_timeout).await?)),
        DataChannelMode::ExtendedPassive => {
            Ok(DataChannel::Connected(open_epsv(codec, host, data_timeout).await?))
        }
        DataChannelMode::Active => open_port(codec, active_bind, data_timeout).await,
        DataChannelMode::ExtendedActive => open_eprt(codec, active_bind, data_timeout).await,
    }
}

// ─── PASV ────────────────────────────────────────────────────────────

/// Issue `PASV`, parse the response, connect to the returned address.
///
/// Response format: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
async fn open_pasv(codec: &mut FtpCodec, data_timeout: Duration) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("PASV").await?;
    let addr = parse_pasv_response(&resp.text())?;
    let tcp = timeout(data_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FtpError::data_channel("PASV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("PASV data connect: {}", e)))?;
    Ok(tcp)
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

// ─── EPSV ────────────────────────────────────────────────────────────

/// Issue `EPSV`, parse port, connect to the *same host* on that port.
///
/// Response format: `229 Entering Extended Passive Mode (|||port|)`
async fn open_epsv(
    codec: &mut FtpCodec,
    host: &str,
    data_timeout: Duration,
) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("EPSV").await?;
    let port = parse_epsv_response(&resp.text())?;
    let addr = format!("{}:{}", host, port);
    let tcp = timeout(data_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::data_channel("EPSV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("EPSV data connect: {}", e)))?;
    Ok(tcp)
}

fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}

// ─── PORT / EPRT ─────────────────────────────────────────────────────

async fn bind_active(bind_addr: Option<&str>, cmd: &str) -> FtpResult<(TcpListener, SocketAddr)> {
    let bind = bind_addr.unwrap_or("0.0.0.0");
    let listener = TcpListener::bind(format!("{}:0", bind))
        .await
        .map_err(|e| FtpError::data_channel(format!("{} bind: {}", cmd, e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpError::data_channel(format!("{} local_addr: {}", cmd, e)))?;
    Ok((listener, local))
}

/// Bind a local TCP listener and tell the server via `PORT`.
async fn open_port(
    codec: &mut FtpCodec,
    bind_addr: Option<&str>,
    data_timeout: Duration,
) -> FtpResult<DataChannel> {
    let (listener, local) = bind_active(bind_addr, "PORT").await?;
    let octets = match local.ip() {
        IpAddr::V4(v4) => v4.octets(),
        _ => return Err(FtpError::data_channel("PORT requires IPv4")),
    };
    let port = local.port();
    let cmd = format!(
        "PORT {},{},{},{},{},{}",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        port / 256,
        port % 256
    );
    codec.expect_ok(&cmd).await?;
    Ok(DataChannel::Listening {
        listener,
        timeout: data_timeout,
    })
}

/// Bind a local listener and tell the server via `EPRT`.
///
/// Command format: `EPRT |1|ip|port|` (1 = IPv4, 2 = IPv6)
async fn open_eprt(
    codec: &mut FtpCodec,
    bind_addr: Option<&str>,
    data_timeout: Duration,
) -> FtpResult<DataChannel> {
    let (listener, local) = bind_active(bind_addr, "EPRT").await?;
    let af = match local.ip() {
        IpAddr::V4(_) => 1,
        IpAddr::V6(_) => 2,
    };
    let cmd = format!("EPRT |{}|{}|{}|", af, local.ip(), local.port());
    codec.expect_ok(&cmd).await?;
    Ok(DataChannel::Listening {
        listener,
        timeout: data_timeout,
    })
}
