//! Save state (quick save / quick load) for the core.
//!
//! Captures the full register set to a file using bincode serialization
//! with deflate compression. The frontend saves with F5 and loads with F9.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "CAST"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Variant          |  u8 (0 = plain, 1 = sandbox, 2 = test pattern)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode CoreState
//! +------------------+
//! ```

use std::path::{Path, PathBuf};

use crate::config::Variant;
use crate::error::StateError;
use crate::CoreState;

/// Magic bytes identifying a save state file.
const MAGIC: &[u8; 4] = b"CAST";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
/// Header length: magic + version + variant.
const HEADER_LEN: usize = 9;

/// Serialize and compress `state` into the file format.
pub fn encode(state: &CoreState) -> Result<Vec<u8>, StateError> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(state.app.variant().id());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Parse the file format, verifying magic, version and variant.
pub fn decode(data: &[u8], expected: Variant) -> Result<CoreState, StateError> {
    if data.len() < HEADER_LEN {
        return Err(StateError::TooSmall);
    }
    if &data[0..4] != MAGIC {
        return Err(StateError::BadMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(StateError::Version { found: version, expected: FORMAT_VERSION });
    }
    let variant = data[8];
    if variant != expected.id() {
        return Err(StateError::Variant {
            saved: Variant::from_id(variant).map_or("?", Variant::name).to_string(),
            current: expected.name().to_string(),
        });
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| StateError::Decompress(format!("{:?}", e)))?;
    Ok(bincode::deserialize(&decompressed)?)
}

/// Save state to file with header and deflate compression.
pub fn save_to_file(state: &CoreState, path: &Path) -> Result<(), StateError> {
    let out = encode(state)?;
    std::fs::write(path, &out)?;
    log::info!("saved state at tick {} to {}", state.tick, path.display());
    Ok(())
}

/// Load state from file for a system running `expected`.
pub fn load_from_file(path: &Path, expected: Variant) -> Result<CoreState, StateError> {
    let data = std::fs::read(path)?;
    let state = decode(&data, expected)?;
    log::info!("loaded state at tick {} from {}", state.tick, path.display());
    Ok(state)
}

/// Derive the save state path from a config path, or the variant name when
/// running on defaults. `rule.json` → `rule.state`
pub fn state_path(config_path: Option<&Path>, variant: Variant) -> PathBuf {
    match config_path {
        Some(p) => p.with_extension("state"),
        None => PathBuf::from(format!("{}.state", variant.name())),
    }
}
