//! TCP transport: establishes the FTP control connection.

use crate::error::{FtpError, FtpResult};
use crate::protocol::FtpCodec;
use crate::types::{FtpConnectionConfig, FtpResponse};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Establish the control connection and return a ready-to-use codec
/// **plus** the server welcome banner.
pub async fn connect(config: &FtpConnectionConfig) -> FtpResult<(FtpCodec, FtpResponse)> {
    if config.host.is_empty() {
        return Err(FtpError::invalid_config("FTP host is not set"));
    }
    let addr = config.address();
    let dur = Duration::from_secs(config.connect_timeout_sec);

    let tcp = timeout(dur, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();

    let mut codec = FtpCodec::new(tcp);
    let banner = timeout(dur, codec.read_response())
        .await
        .map_err(|_| FtpError::timeout(format!("No welcome banner from {}", addr)))??;
    if !banner.is_completion() {
        return Err(FtpError::from_reply(banner.code, &banner.text()));
    }
    Ok((codec, banner))
}
