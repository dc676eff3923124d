use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadPort(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadPort(e) => write!(f, "Port error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Faults raised by the capture file writer and reader.
///
/// Only file open/write/read problems and malformed container contents are
/// represented here; deciding whether they are fatal is left to the caller.
#[derive(Debug)]
pub enum CaptureError {
    CreateFailed(PathBuf, std::io::Error),
    WriteFailed(PathBuf, std::io::Error),
    ReadFailed(PathBuf, std::io::Error),
    BadMagic(u32),
    Truncated(usize),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::CreateFailed(p, e) => {
                write!(f, "Failed to create capture file {}: {}", p.display(), e)
            }
            CaptureError::WriteFailed(p, e) => {
                write!(f, "Failed to write capture file {}: {}", p.display(), e)
            }
            CaptureError::ReadFailed(p, e) => {
                write!(f, "Failed to read capture file {}: {}", p.display(), e)
            }
            CaptureError::BadMagic(m) => write!(f, "Unknown capture magic number {:#010x}", m),
            CaptureError::Truncated(off) => write!(f, "Capture file truncated at offset {}", off),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::CreateFailed(_, e)
            | CaptureError::WriteFailed(_, e)
            | CaptureError::ReadFailed(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Internal frame synthesis faults. These never reach a caller of
/// `synthesize`, which answers them with the fallback frame.
#[derive(Debug)]
pub enum FrameError {
    Encoding(serde_json::Error),
    PayloadTooLarge(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Encoding(e) => write!(f, "Payload encoding failed: {}", e),
            FrameError::PayloadTooLarge(n) => {
                write!(f, "Payload of {} bytes does not fit an IPv4 datagram", n)
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::Encoding(err)
    }
}

#[derive(Debug)]
pub enum TraceError {
    LogsDirectory(PathBuf, std::io::Error),
    CaptureFile(CaptureError),
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::LogsDirectory(p, e) => {
                write!(f, "Unable to prepare logs directory {}: {}", p.display(), e)
            }
            TraceError::CaptureFile(e) => write!(f, "Trace file error: {}", e),
        }
    }
}

impl std::error::Error for TraceError {}

impl From<CaptureError> for TraceError {
    fn from(err: CaptureError) -> Self {
        TraceError::CaptureFile(err)
    }
}

#[derive(Debug)]
pub enum WebError {
    InvalidAddress(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::InvalidAddress(e) => write!(f, "Invalid listen address: {}", e),
        }
    }
}

impl std::error::Error for WebError {}
