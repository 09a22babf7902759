use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::upsert::{CreateLayout, DEFAULT_STORE_TIMEOUT, LockPolicy};

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_CREDENTIALS: &str = "credentials.json";

/// How the HTTP surface is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Http,
    /// PEM certificate chain and private key.
    Https { cert: PathBuf, key: PathBuf },
}

/// How requests to the Sheets API are authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetsCredentials {
    /// Service-account key file; access tokens are minted and refreshed from it.
    ServiceAccount(PathBuf),
    /// A fixed bearer token, used as-is until it expires.
    AccessToken(String),
}

/// Where tracking records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Google Sheets v4 values API.
    Sheets {
        spreadsheet_id: String,
        base_url: String,
        credentials: SheetsCredentials,
    },
    /// Process-local rows, lost on exit.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub bind: SocketAddr,
    pub transport: Transport,
    pub store: StoreBackend,
    pub store_timeout: Duration,
    pub create_layout: CreateLayout,
    pub lock_policy: LockPolicy,
    pub static_dir: PathBuf,
}

impl TrackerConfig {
    /// Read the configuration from `TRACKER_*` environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `TRACKER_BIND` | `0.0.0.0:3000` |
    /// | `TRACKER_TLS_CERT`, `TRACKER_TLS_KEY` | unset (plain HTTP) |
    /// | `TRACKER_STORE` | `sheets` (`memory` for dry runs) |
    /// | `TRACKER_SPREADSHEET_ID` | required for `sheets` |
    /// | `TRACKER_SHEETS_URL` | `https://sheets.googleapis.com` |
    /// | `TRACKER_CREDENTIALS` | `credentials.json` (service-account key) |
    /// | `TRACKER_ACCESS_TOKEN` | unset; overrides `TRACKER_CREDENTIALS` |
    /// | `TRACKER_STORE_TIMEOUT_SECS` | `30` |
    /// | `TRACKER_CREATE_LAYOUT` | `legacy` (or `aligned`) |
    /// | `TRACKER_LOCKING` | `none` (or `per-identifier`) |
    /// | `TRACKER_STATIC_DIR` | `public` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TrackerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_text = var("TRACKER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_text.parse().map_err(|_| ConfigError::Invalid {
            key: "TRACKER_BIND",
            value: bind_text.clone(),
        })?;

        let transport = match (var("TRACKER_TLS_CERT"), var("TRACKER_TLS_KEY")) {
            (None, None) => Transport::Http,
            (Some(cert), Some(key)) => Transport::Https {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            },
            (Some(_), None) => return Err(ConfigError::Missing("TRACKER_TLS_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("TRACKER_TLS_CERT")),
        };

        let store = match var("TRACKER_STORE").as_deref().unwrap_or("sheets") {
            "sheets" => StoreBackend::Sheets {
                spreadsheet_id: var("TRACKER_SPREADSHEET_ID")
                    .ok_or(ConfigError::Missing("TRACKER_SPREADSHEET_ID"))?,
                base_url: var("TRACKER_SHEETS_URL")
                    .unwrap_or_else(|| DEFAULT_SHEETS_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                credentials: match var("TRACKER_ACCESS_TOKEN") {
                    Some(token) => SheetsCredentials::AccessToken(token),
                    None => SheetsCredentials::ServiceAccount(PathBuf::from(
                        var("TRACKER_CREDENTIALS").unwrap_or_else(|| DEFAULT_CREDENTIALS.to_string()),
                    )),
                },
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "TRACKER_STORE",
                    value: other.to_string(),
                });
            }
        };

        let store_timeout = match var("TRACKER_STORE_TIMEOUT_SECS") {
            None => DEFAULT_STORE_TIMEOUT,
            Some(text) => match text.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "TRACKER_STORE_TIMEOUT_SECS",
                        value: text,
                    });
                }
            },
        };

        let create_layout = match var("TRACKER_CREATE_LAYOUT") {
            None => CreateLayout::default(),
            Some(text) => CreateLayout::parse(&text).ok_or(ConfigError::Invalid {
                key: "TRACKER_CREATE_LAYOUT",
                value: text,
            })?,
        };

        let lock_policy = match var("TRACKER_LOCKING") {
            None => LockPolicy::default(),
            Some(text) => LockPolicy::parse(&text).ok_or(ConfigError::Invalid {
                key: "TRACKER_LOCKING",
                value: text,
            })?,
        };

        let static_dir = PathBuf::from(
            var("TRACKER_STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
        );

        Ok(TrackerConfig {
            bind,
            transport,
            store,
            store_timeout,
            create_layout,
            lock_policy,
            static_dir,
        })
    }
}
