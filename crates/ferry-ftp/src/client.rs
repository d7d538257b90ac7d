//! Stateful FTP client: owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → authenticate → FEAT/SYST/PWD probing →
//! set TYPE → optionally CWD.
//!
//! Every reply read through the client is kept as `last_reply`, so callers
//! can check the outcome of the most recent exchange after a multi-step
//! operation.

use crate::connection;
use crate::engine::ListParseEngine;
use crate::error::{FtpError, FtpErrorKind, FtpResult};
use crate::parser;
use crate::protocol::FtpCodec;
use crate::transfer::{self, DataChannel};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use uuid::Uuid;

/// A connected FTP client session.
pub struct FtpClient {
    pub id: String,
    codec: FtpCodec,
    config: FtpConnectionConfig,
    features: ServerFeatures,
    system_type: Option<String>,
    last_reply: Option<FtpResponse>,
    /// A transfer command whose completion reply has not been read yet.
    pending_command: bool,
    connected: bool,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl std::fmt::Debug for FtpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpClient")
            .field("id", &self.id)
            .field("host", &self.config.host)
            .field("connected", &self.connected)
            .field("pending_command", &self.pending_command)
            .finish()
    }
}

impl FtpClient {
    /// Establish a new FTP session.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        let id = Uuid::new_v4().to_string();
        let (mut codec, banner) = connection::connect(&config).await?;
        log::debug!("[{}] connected to {}: {}", id, config.address(), banner.text());

        // ── Authenticate ─────────────────────────────────────────
        let user_resp = codec.execute(&format!("USER {}", config.username)).await?;
        if user_resp.code == 331 {
            let pass_resp = codec.execute(&format!("PASS {}", config.password)).await?;
            if !pass_resp.is_completion() {
                return Err(FtpError::auth_failed(format!("Login failed: {}", pass_resp.text()))
                    .with_code(pass_resp.code));
            }
        } else if !user_resp.is_completion() {
            return Err(FtpError::auth_failed(format!("USER rejected: {}", user_resp.text()))
                .with_code(user_resp.code));
        }

        // ── FEAT ─────────────────────────────────────────────────
        let features = Self::probe_features(&mut codec).await;

        if config.utf8 && features.utf8 {
            let _ = codec.execute("OPTS UTF8 ON").await;
        }

        // ── SYST ─────────────────────────────────────────────────
        let system_type = match codec.execute("SYST").await {
            Ok(r) if r.is_completion() => Some(r.text().trim_start_matches("215 ").to_string()),
            _ => None,
        };

        // ── TYPE ─────────────────────────────────────────────────
        codec.expect_ok(config.transfer_type.command()).await?;

        // ── Initial CWD ──────────────────────────────────────────
        if let Some(ref dir) = config.working_dir {
            codec
                .expect_ok(&format!("CWD {}", dir))
                .await
                .map_err(|e| FtpError {
                    message: format!("Initial CWD to '{}' failed: {}", dir, e.message),
                    ..e
                })?;
        }

        let now = Utc::now();
        Ok(Self {
            id,
            codec,
            config,
            features,
            system_type,
            last_reply: None,
            pending_command: false,
            connected: true,
            connected_at: now,
            last_activity: now,
        })
    }

    async fn probe_features(codec: &mut FtpCodec) -> ServerFeatures {
        let resp = match codec.execute("FEAT").await {
            Ok(r) if r.is_completion() => r,
            _ => return ServerFeatures::default(),
        };

        let raw: Vec<String> = resp
            .lines
            .iter()
            .skip(1) // "211-Features:"
            .filter(|l| !l.starts_with("211"))
            .map(|l| l.trim().to_uppercase())
            .collect();

        let has = |feat: &str| raw.iter().any(|l| l.starts_with(feat));

        ServerFeatures {
            mlsd: has("MLSD"),
            size: has("SIZE"),
            mdtm: has("MDTM"),
            utf8: has("UTF8"),
            epsv: has("EPSV"),
            eprt: has("EPRT"),
            raw_features: raw,
        }
    }

    // ─── Command plumbing ────────────────────────────────────────

    /// Send a command, record and return its reply.
    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        if self.pending_command {
            return Err(FtpError::protocol_error(format!(
                "Cannot send '{}' while a transfer is in progress",
                cmd.split_whitespace().next().unwrap_or(cmd)
            )));
        }
        let result = self.codec.execute(cmd).await;
        self.record(result)
    }

    /// Send a command and fail unless the reply is 2xx.
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }

    async fn read_reply(&mut self) -> FtpResult<FtpResponse> {
        let result = self.codec.read_response().await;
        self.record(result)
    }

    fn record(&mut self, result: FtpResult<FtpResponse>) -> FtpResult<FtpResponse> {
        match result {
            Ok(resp) => {
                self.last_reply = Some(resp.clone());
                self.last_activity = Utc::now();
                Ok(resp)
            }
            Err(e) => {
                if matches!(e.kind, FtpErrorKind::Disconnected | FtpErrorKind::IoError) {
                    self.connected = false;
                }
                Err(e)
            }
        }
    }

    pub fn last_reply(&self) -> Option<&FtpResponse> {
        self.last_reply.as_ref()
    }

    pub fn last_reply_code(&self) -> Option<u16> {
        self.last_reply.as_ref().map(|r| r.code)
    }

    // ─── PWD / CWD / CDUP ───────────────────────────────────────

    pub async fn pwd(&mut self) -> FtpResult<String> {
        let resp = self.expect_ok("PWD").await?;
        parse_pwd(&resp.text())
    }

    /// `CWD path`; `Ok(false)` when the server refuses.
    pub async fn change_working_directory(&mut self, path: &str) -> FtpResult<bool> {
        let resp = self.execute(&format!("CWD {}", path)).await?;
        Ok(resp.is_completion())
    }

    /// `CDUP`; `Ok(false)` when the server refuses.
    pub async fn change_to_parent_directory(&mut self) -> FtpResult<bool> {
        let resp = self.execute("CDUP").await?;
        Ok(resp.is_completion())
    }

    pub async fn noop(&mut self) -> FtpResult<()> {
        self.expect_ok("NOOP").await?;
        Ok(())
    }

    // ─── Data channel helper ─────────────────────────────────────

    async fn open_data_channel(&mut self) -> FtpResult<DataChannel> {
        if self.pending_command {
            return Err(FtpError::protocol_error(
                "Cannot open a data channel while a transfer is in progress",
            ));
        }
        let host = self
            .codec
            .peer_host()
            .unwrap_or_else(|| self.config.host.clone());
        let data_timeout = self.data_timeout();
        transfer::open_data_channel(
            &mut self.codec,
            self.config.data_channel_mode,
            &host,
            data_timeout,
            self.config.active_bind_address.as_deref(),
        )
        .await
    }

    /// Send a transfer command and connect its data stream. Fails unless
    /// the server answers 1xx.
    async fn start_transfer(&mut self, cmd: &str) -> FtpResult<TcpStream> {
        let channel = self.open_data_channel().await?;
        let resp = self.execute(cmd).await?;
        if !resp.is_preliminary() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        channel.establish().await
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.config.data_timeout_sec)
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// `LIST [path]` collected into a string. With `require_completion` a
    /// final reply other than 2xx is an error; otherwise it is only recorded
    /// as the last reply.
    async fn retrieve_listing(&mut self, path: Option<&str>, require_completion: bool) -> FtpResult<String> {
        let cmd = match path {
            Some(p) => format!("LIST {}", p),
            None => "LIST".to_string(),
        };
        let mut data = self.start_transfer(&cmd).await?;
        let mut buf = Vec::new();
        let read = timeout(self.data_timeout(), data.read_to_end(&mut buf)).await;
        drop(data);
        match read {
            Ok(r) => {
                r?;
            }
            Err(_) => return Err(FtpError::timeout("LIST data transfer timed out")),
        }

        let done = timeout(self.data_timeout(), self.read_reply())
            .await
            .map_err(|_| FtpError::timeout("No reply after LIST"))??;
        if require_completion && !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Parsed listing of `path` (a directory, or a single file).
    pub async fn list_files(&mut self, path: &str) -> FtpResult<Vec<FtpEntry>> {
        let raw = self.retrieve_listing(Some(path), true).await?;
        Ok(parser::parse_listing(&raw))
    }

    /// Paged listing of the current working directory. The transfer's final
    /// reply is left in [`last_reply`](Self::last_reply) for the caller to
    /// check.
    pub async fn initiate_list_parsing(&mut self) -> FtpResult<ListParseEngine> {
        let raw = self.retrieve_listing(None, false).await?;
        Ok(ListParseEngine::parse(&raw))
    }

    // ─── RETR ────────────────────────────────────────────────────

    /// Start downloading `path`; the returned stream carries the file
    /// bytes. [`complete_pending_command`](Self::complete_pending_command)
    /// must be called once the stream is done with.
    pub async fn retrieve_file_stream(&mut self, path: &str) -> FtpResult<TcpStream> {
        let stream = self.start_transfer(&format!("RETR {}", path)).await?;
        self.pending_command = true;
        Ok(stream)
    }

    /// Read the completion reply of the transfer in flight. Fails unless it
    /// is 2xx.
    pub async fn complete_pending_command(&mut self) -> FtpResult<()> {
        if !self.pending_command {
            return Ok(());
        }
        self.pending_command = false;
        let resp = timeout(self.data_timeout(), self.read_reply())
            .await
            .map_err(|_| {
                self.connected = false;
                FtpError::timeout("Timed out waiting for transfer completion")
            })??;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(())
    }

    pub fn has_pending_command(&self) -> bool {
        self.pending_command
    }

    // ─── SIZE / MDTM ────────────────────────────────────────────

    /// Size of a remote file (RFC 3659 SIZE).
    pub async fn size(&mut self, path: &str) -> FtpResult<u64> {
        let resp = self.expect_ok(&format!("SIZE {}", path)).await?;
        let text = resp.text();
        text.split_whitespace()
            .nth(1)
            .and_then(|n| n.trim().parse::<u64>().ok())
            .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse SIZE: {}", text)))
    }

    /// Modification time of a remote file (RFC 3659 MDTM).
    pub async fn mdtm(&mut self, path: &str) -> FtpResult<DateTime<Utc>> {
        let resp = self.expect_ok(&format!("MDTM {}", path)).await?;
        let text = resp.text();
        text.split_whitespace()
            .nth(1)
            .and_then(parser::parse_mlsd_time)
            .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse MDTM: {}", text)))
    }

    // ─── QUIT ────────────────────────────────────────────────────

    /// Gracefully close the session.
    pub async fn quit(&mut self) -> FtpResult<()> {
        if self.connected && !self.pending_command {
            let _ = self.codec.execute("QUIT").await;
        }
        self.connected = false;
        Ok(())
    }

    // ─── Utility ─────────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn features(&self) -> &ServerFeatures {
        &self.features
    }

    pub fn system_type(&self) -> Option<&str> {
        self.system_type.as_deref()
    }

    pub fn config(&self) -> &FtpConnectionConfig {
        &self.config
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Parse `257 "/some/path"` into the path string. Doubled quotes inside
/// the name are unescaped (RFC 959 appendix II).
fn parse_pwd(text: &str) -> FtpResult<String> {
    let err = || FtpError::protocol_error(format!("Cannot parse PWD: {}", text));
    let start = text.find('"').ok_or_else(err)?;
    let mut out = String::new();
    let mut chars = text[start + 1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else {
                return Ok(out);
            }
        } else {
            out.push(c);
        }
    }
    Err(err())
}
