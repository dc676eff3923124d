use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Command line of the `siptrace` binary.
///
/// Every flag is optional; a flag that is given overrides the matching value
/// of the configuration file.
#[derive(Parser, Debug, Clone)]
#[command(name = "siptrace")]
#[command(version)]
#[command(about = "SIP to gRPC gateway dashboard backend with protocol tracing")]
pub struct Args {
    /// TOML configuration file
    ///
    /// # Command Line
    /// Use `--config <PATH>` to set this value from the CLI
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Port the HTTP API listens on
    ///
    /// # Command Line
    /// Use `--port <PORT>` to set this value from the CLI
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Address the HTTP API binds to
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Directory receiving the capture files
    ///
    /// Falls back to the `SIPTRACE_LOGS_DIR` environment variable, then to the
    /// configuration file.
    #[arg(long, env = "SIPTRACE_LOGS_DIR")]
    pub logs_dir: Option<PathBuf>,
}

/// Application configuration structure that defines all runtime parameters.
///
/// # Fields Overview
///
/// - `server`: where the HTTP API listens
/// - `trace`: where capture files go
/// - `sip`: SIP endpoint used when fabricating the gateway exchange
/// - `grpc`: gRPC endpoint used when fabricating the gateway exchange
///
/// # Example file
///
/// ```toml
/// [server]
/// port = 8080
///
/// [trace]
/// logs_dir = "/var/lib/siptrace"
///
/// [grpc]
/// host = "10.0.0.5"
/// service = "voice.Transcriber"
/// ```
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub trace: TraceConfig,
    pub sip: SipConfig,
    pub grpc: GrpcConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the effective configuration: file (or defaults), then CLI flags.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => {
                info!("Importing configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        if let Some(port) = args.port {
            config.server.port = port;
        }
        if let Some(addr) = &args.bind_address {
            config.server.bind_address = addr.clone();
        }
        if let Some(dir) = &args.logs_dir {
            config.trace.logs_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sip.port == 0 {
            return Err(ConfigError::BadPort("sip.port must not be 0".into()));
        }
        if self.grpc.port == 0 {
            return Err(ConfigError::BadPort("grpc.port must not be 0".into()));
        }
        Ok(())
    }
}
