//! JSON/CBOR (de)serialization utilities for transport objects.
//!
//! String/value helpers for in-process use plus path-based read/write with
//! extension auto-detection (`.json` / `.cbor`, case-insensitive; writes
//! default to JSON for unknown extensions). Decode failures of every
//! flavor surface as [`Error::MalformedInput`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize to a compact JSON string.
///
/// # Errors
/// [`Error::MalformedInput`] if the value cannot be represented.
pub fn to_json_string<T: Serialize>(v: &T) -> Result<String> {
    serde_json::to_string(v).map_err(|e| Error::MalformedInput(e.to_string()))
}

/// Deserialize from a JSON string.
///
/// # Errors
/// [`Error::MalformedInput`] on structurally invalid input.
pub fn from_json_str<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| Error::MalformedInput(e.to_string()))
}

/// Serialize to a `serde_json::Value` (the `todict` analogue).
///
/// # Errors
/// [`Error::MalformedInput`] if the value cannot be represented.
pub fn to_json_value<T: Serialize>(v: &T) -> Result<serde_json::Value> {
    serde_json::to_value(v).map_err(|e| Error::MalformedInput(e.to_string()))
}

/// Deserialize from a `serde_json::Value` (the `fromdict` analogue).
///
/// # Errors
/// [`Error::MalformedInput`] on structurally invalid input.
pub fn from_json_value<T: DeserializeOwned>(v: serde_json::Value) -> Result<T> {
    serde_json::from_value(v).map_err(|e| Error::MalformedInput(e.to_string()))
}

/// Read a value from a **JSON** file.
///
/// # Errors
/// [`Error::Io`] on filesystem failure, [`Error::MalformedInput`] on bad
/// content.
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let f = File::open(path.as_ref())?;
    let rdr = BufReader::new(f);
    serde_json::from_reader(rdr).map_err(|e| Error::MalformedInput(e.to_string()))
}

/// Write a value to a **JSON** file (pretty).
///
/// # Errors
/// [`Error::Io`] on filesystem failure.
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let f = File::create(path.as_ref())?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, v).map_err(|e| Error::MalformedInput(e.to_string()))?;
    w.flush()?;
    Ok(())
}

/// Read a value from a **CBOR** file.
///
/// # Errors
/// [`Error::Io`] on filesystem failure, [`Error::MalformedInput`] on bad
/// content.
pub fn read_cbor<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let f = File::open(path.as_ref())?;
    let mut rdr = BufReader::new(f);
    ciborium::de::from_reader(&mut rdr).map_err(|e| Error::MalformedInput(e.to_string()))
}

/// Write a value to a **CBOR** file.
///
/// # Errors
/// [`Error::Io`] on filesystem failure.
pub fn write_cbor<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let f = File::create(path.as_ref())?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(v, &mut w).map_err(|e| Error::MalformedInput(e.to_string()))?;
    w.flush()?;
    Ok(())
}

/// Auto-detect read by extension.
///
/// # Errors
/// [`Error::MalformedInput`] for unsupported or missing extensions and for
/// bad content; [`Error::Io`] on filesystem failure.
pub fn read_auto<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_json(path),
        Some("cbor") => read_cbor(path),
        Some(other) => Err(Error::MalformedInput(format!(
            "unsupported extension: {other} (expected .json or .cbor)"
        ))),
        None => Err(Error::MalformedInput(
            "path has no extension (expected .json or .cbor)".into(),
        )),
    }
}

/// Auto-detect write (defaults to JSON if unknown or missing).
///
/// # Errors
/// [`Error::Io`] on filesystem failure.
pub fn write_auto<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_cbor(path, v),
        _ => write_json(path, v),
    }
}

#[inline]
fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
