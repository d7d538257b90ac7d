//! # ferry-ftp
//!
//! FTP connector for ferry: an RFC 959 client over plain TCP, a pool of
//! sessions, and the read/list commands built on them.
//!
//! - **Client** — control codec, login, PASV/EPSV/PORT/EPRT data channels
//! - **Parser** — MLSD, Unix `ls -l` and Windows/IIS listings
//! - **Pool** — exclusive checkout, idle reuse, keepalive maintenance
//! - **Commands** — read (lazily streamed over a dedicated session) and
//!   paged, optionally recursive, list

pub mod client;
pub mod command;
pub mod connection;
pub mod connector;
pub mod engine;
pub mod error;
pub mod file_system;
pub mod input_stream;
pub mod parser;
pub mod pool;
pub mod protocol;
pub mod transfer;
pub mod types;

pub use client::FtpClient;
pub use command::{FtpListCommand, FtpReadCommand, FTP_LIST_PAGE_SIZE};
pub use connector::FtpConnector;
pub use engine::ListParseEngine;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use file_system::FtpFileSystem;
pub use input_stream::FtpInputStream;
pub use pool::{spawn_pool_maintenance, ConnectionHandle, FtpConnectionPool};
pub use types::*;
