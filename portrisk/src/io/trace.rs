// SPDX-License-Identifier: AGPL-3.0-or-later
//! Binary posterior-trace files.
//!
//! # Format (little-endian)
//!
//! ```text
//! magic     8 bytes  "PRTRACE\0"
//! version   u32      1
//! n_params  u32
//! n_chains  u32
//! n_draws   u32
//! names     n_params × (u32 byte length, UTF-8 bytes)
//! values    n_chains × n_draws × n_params f64, chain-major
//! ```
//!
//! The decoder checks the payload length against the header before
//! allocating, so truncated or hostile input fails with
//! [`Error::TraceFormat`] rather than a large allocation.

use crate::bayes::trace::Trace;
use crate::error::{Error, Result};
use std::path::Path;

const MAGIC: &[u8; 8] = b"PRTRACE\0";
const VERSION: u32 = 1;

/// Serialize a trace.
#[must_use]
pub fn encode(trace: &Trace) -> Vec<u8> {
    let names_len: usize = trace.names().iter().map(|n| 4 + n.len()).sum();
    let mut out = Vec::with_capacity(24 + names_len + trace.values().len() * 8);
    out.extend_from_slice(MAGIC);
    for v in [VERSION, to_u32(trace.n_params()), to_u32(trace.n_chains()), to_u32(trace.n_draws())] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for name in trace.names() {
        out.extend_from_slice(&to_u32(name.len()).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }
    for v in trace.values() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| Error::TraceFormat(format!("truncated at byte {}", self.pos)))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Parse a trace from bytes.
///
/// # Errors
///
/// Returns [`Error::TraceFormat`] on a bad magic, unsupported version,
/// truncated payload, trailing bytes, or non-UTF-8 parameter name.
pub fn decode(data: &[u8]) -> Result<Trace> {
    let mut cur = Cursor { data, pos: 0 };
    if cur.take(8)? != MAGIC {
        return Err(Error::TraceFormat("bad magic".into()));
    }
    let version = cur.u32()?;
    if version != VERSION {
        return Err(Error::TraceFormat(format!("unsupported version {version}")));
    }
    let n_params = cur.u32()? as usize;
    let n_chains = cur.u32()? as usize;
    let n_draws = cur.u32()? as usize;

    // Every name needs at least its 4-byte length prefix.
    if n_params.saturating_mul(4) > cur.remaining() {
        return Err(Error::TraceFormat(format!("{n_params} names do not fit")));
    }
    let mut names = Vec::with_capacity(n_params);
    for _ in 0..n_params {
        let len = cur.u32()? as usize;
        let bytes = cur.take(len)?;
        let name = std::str::from_utf8(bytes)
            .map_err(|e| Error::TraceFormat(format!("parameter name: {e}")))?;
        names.push(name.to_string());
    }

    let n_values = n_chains
        .checked_mul(n_draws)
        .and_then(|n| n.checked_mul(n_params))
        .ok_or_else(|| Error::TraceFormat("value count overflows".into()))?;
    let expected = n_values
        .checked_mul(8)
        .ok_or_else(|| Error::TraceFormat("value count overflows".into()))?;
    if cur.remaining() != expected {
        return Err(Error::TraceFormat(format!(
            "expected {expected} value bytes, found {}",
            cur.remaining()
        )));
    }
    let values = cur
        .take(expected)?
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();
    Trace::new(names, n_chains, n_draws, values).map_err(|e| Error::TraceFormat(e.to_string()))
}

/// Write a trace file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn write_trace(path: &Path, trace: &Trace) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, encode(trace)).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(
        path = %path.display(),
        params = trace.n_params(),
        chains = trace.n_chains(),
        draws = trace.n_draws(),
        "wrote posterior trace"
    );
    Ok(())
}

/// Read a trace file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read or
/// [`Error::TraceFormat`] if it is malformed.
pub fn read_trace(path: &Path) -> Result<Trace> {
    let data = std::fs::read(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    decode(&data)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_trace() -> Trace {
        Trace::new(
            vec!["beta[0]".into(), "sigma".into()],
            2,
            3,
            vec![0.1, 1.0, 0.2, 1.1, 0.3, 1.2, -0.1, 0.9, -0.2, 0.8, -0.3, 0.7],
        )
        .unwrap()
    }

    #[test]
    fn file_roundtrip_preserves_bits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("psma.trace");
        let trace = small_trace();
        write_trace(&path, &trace).unwrap();
        let back = read_trace(&path).unwrap();
        assert_eq!(back.names(), trace.names());
        assert_eq!((back.n_chains(), back.n_draws()), (2, 3));
        for (a, b) in back.values().iter().zip(trace.values()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn rejects_bad_magic_and_truncation() {
        let mut bytes = encode(&small_trace());
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode(&bytes[..10]).is_err());
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(Error::TraceFormat(_))));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = encode(&small_trace());
        bytes.push(0);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn huge_header_does_not_allocate() {
        let mut bytes = MAGIC.to_vec();
        for v in [VERSION, u32::MAX, u32::MAX, u32::MAX] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert!(decode(&bytes).is_err());
    }
}
