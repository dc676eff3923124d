use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Directory the capture files are written to; created on demand.
    pub logs_dir: PathBuf,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
        }
    }
}

/// SIP side of the simulated gateway.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    pub host: String,
    pub port: u16,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 5060,
        }
    }
}

/// gRPC backend of the simulated gateway.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    pub host: String,
    pub port: u16,
    pub service: String,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 50051,
            service: String::from("gateway.AudioService"),
        }
    }
}
