//! pcap container writer and reader.
//!
//! The pcap format is simple enough to write by hand. Every container field
//! is written in host byte order; readers detect the order from the magic.
//!
//! Useful resources:
//! * https://wiki.wireshark.org/Development/LibpcapFileFormat
//! * https://www.tcpdump.org/linktypes.html

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::error_handling::types::CaptureError;

pub const MAGIC: u32 = 0xa1b2_c3d4;
pub const VERSION_MAJOR: u16 = 2;
pub const VERSION_MINOR: u16 = 4;
pub const THISZONE: i32 = 0;
pub const SIGFIGS: u32 = 0;
pub const SNAPLEN: u32 = 65535;
pub const LINKTYPE_ETHERNET: u32 = 1;

pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    pub magic: u32,
    pub version_major: u16,
    pub version_minor: u16,
    pub thiszone: i32,
    pub sigfigs: u32,
    pub snaplen: u32,
    pub linktype: u32,
}

impl Default for GlobalHeader {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            thiszone: THISZONE,
            sigfigs: SIGFIGS,
            snaplen: SNAPLEN,
            linktype: LINKTYPE_ETHERNET,
        }
    }
}

impl GlobalHeader {
    pub fn to_bytes(&self) -> [u8; GLOBAL_HEADER_LEN] {
        let mut b = [0u8; GLOBAL_HEADER_LEN];
        b[0..4].copy_from_slice(&self.magic.to_ne_bytes());
        b[4..6].copy_from_slice(&self.version_major.to_ne_bytes());
        b[6..8].copy_from_slice(&self.version_minor.to_ne_bytes());
        b[8..12].copy_from_slice(&self.thiszone.to_ne_bytes());
        b[12..16].copy_from_slice(&self.sigfigs.to_ne_bytes());
        b[16..20].copy_from_slice(&self.snaplen.to_ne_bytes());
        b[20..24].copy_from_slice(&self.linktype.to_ne_bytes());
        b
    }
}

/// One record read back from a container file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub captured_len: u32,
    pub original_len: u32,
    pub data: Vec<u8>,
}

/// A capture file on disk.
///
/// Holds nothing but the path: every append opens the file, writes one
/// complete record and closes it again, so readers can copy the file at any
/// time between appends.
#[derive(Debug, Clone)]
pub struct CaptureFile {
    path: PathBuf,
}

impl CaptureFile {
    /// Create (or truncate) the file and write the global header.
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self, CaptureError> {
        let file = Self { path: path.into() };
        file.write_header()?;
        Ok(file)
    }

    /// Refer to an existing capture file without touching it.
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_header(&self) -> Result<(), CaptureError> {
        let mut f = File::create(&self.path)
            .map_err(|e| CaptureError::CreateFailed(self.path.clone(), e))?;
        f.write_all(&GlobalHeader::default().to_bytes())
            .map_err(|e| CaptureError::WriteFailed(self.path.clone(), e))?;
        debug!("Wrote capture header to {}", self.path.display());
        Ok(())
    }

    /// Append one record. If the file has gone missing, a fresh global header
    /// is written first; records lost with the old file stay lost.
    pub fn append_record(&self, data: &[u8], timestamp: DateTime<Utc>) -> Result<(), CaptureError> {
        if !self.path.exists() {
            warn!(
                "Trace file {} not found, creating new header",
                self.path.display()
            );
            self.write_header()?;
        }

        // TODO: u32 seconds overflow in 2106; pcapng would lift that limit.
        let sec = timestamp.timestamp() as u32;
        let usec = timestamp.timestamp_subsec_micros().min(999_999);
        let len = data.len() as u32;

        let mut record = Vec::with_capacity(RECORD_HEADER_LEN + data.len());
        record.extend_from_slice(&sec.to_ne_bytes());
        record.extend_from_slice(&usec.to_ne_bytes());
        record.extend_from_slice(&len.to_ne_bytes());
        record.extend_from_slice(&len.to_ne_bytes());
        record.extend_from_slice(data);

        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| CaptureError::WriteFailed(self.path.clone(), e))?;
        f.write_all(&record)
            .map_err(|e| CaptureError::WriteFailed(self.path.clone(), e))?;
        Ok(())
    }
}

fn ne_u32(b: &[u8], off: usize) -> u32 {
    u32::from_ne_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

fn ne_u16(b: &[u8], off: usize) -> u16 {
    u16::from_ne_bytes([b[off], b[off + 1]])
}

/// Parse a capture file written in host byte order.
pub fn read_capture<P: AsRef<Path>>(
    path: P,
) -> Result<(GlobalHeader, Vec<CapturedRecord>), CaptureError> {
    let path = path.as_ref();
    let buf = std::fs::read(path).map_err(|e| CaptureError::ReadFailed(path.to_path_buf(), e))?;
    parse_capture(&buf)
}

pub fn parse_capture(buf: &[u8]) -> Result<(GlobalHeader, Vec<CapturedRecord>), CaptureError> {
    if buf.len() < GLOBAL_HEADER_LEN {
        return Err(CaptureError::Truncated(0));
    }
    let header = GlobalHeader {
        magic: ne_u32(buf, 0),
        version_major: ne_u16(buf, 4),
        version_minor: ne_u16(buf, 6),
        thiszone: ne_u32(buf, 8) as i32,
        sigfigs: ne_u32(buf, 12),
        snaplen: ne_u32(buf, 16),
        linktype: ne_u32(buf, 20),
    };
    if header.magic != MAGIC {
        return Err(CaptureError::BadMagic(header.magic));
    }

    let mut records = Vec::new();
    let mut off = GLOBAL_HEADER_LEN;
    while off < buf.len() {
        if buf.len() - off < RECORD_HEADER_LEN {
            return Err(CaptureError::Truncated(off));
        }
        let captured_len = ne_u32(buf, off + 8);
        let start = off + RECORD_HEADER_LEN;
        let end = start + captured_len as usize;
        if end > buf.len() {
            return Err(CaptureError::Truncated(off));
        }
        records.push(CapturedRecord {
            ts_sec: ne_u32(buf, off),
            ts_usec: ne_u32(buf, off + 4),
            captured_len,
            original_len: ne_u32(buf, off + 12),
            data: buf[start..end].to_vec(),
        });
        off = end;
    }
    Ok((header, records))
}
