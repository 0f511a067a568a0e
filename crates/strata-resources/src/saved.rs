// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! On-disk format of saved resources.
//!
//! ```text
//! +-------+------------------+------------------------+---------------+
//! | STRS  | header length    | bincode ResourceMetadata | payload ...  |
//! | 4 B   | u32 little-endian| header length bytes      | rest of file |
//! +-------+------------------+------------------------+---------------+
//! ```
//!
//! The header can be read on its own, which is how dependencies are
//! discovered without decoding the payload.
//!
//! When the header records [`CompressionMethod::Lz4`], the payload is the
//! uncompressed length as a little-endian `u32` followed by one LZ4 block.

use crate::error::{ManagerError, Result};
use bincode::config::{self, Configuration};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use strata_core::resource::{CompressionMethod, ResourceMetadata};

const MAGIC: [u8; 4] = *b"STRS";
const CONFIG: Configuration = config::standard();
/// Upper bound of the LZ4 expansion ratio.
const LZ4_MAX_RATIO: usize = 255;

/// A decoded saved file.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedResource {
    /// The header.
    pub metadata: ResourceMetadata,
    /// The encoded resource, as produced by its serialization facet, already
    /// decompressed.
    pub payload: Vec<u8>,
}

/// Encodes a header and its payload into the saved format.
///
/// The payload is compressed with the method recorded in `metadata`.
pub fn encode_saved(metadata: &ResourceMetadata, payload: &[u8]) -> Result<Vec<u8>> {
    let header = bincode::serde::encode_to_vec(metadata, CONFIG)?;
    let header_len = u32::try_from(header.len()).map_err(|_| too_large("resource header"))?;
    let payload = match metadata.compression {
        CompressionMethod::None => payload.to_vec(),
        CompressionMethod::Lz4 => {
            let len = u32::try_from(payload.len()).map_err(|_| too_large("compressed payload"))?;
            let mut block = len.to_le_bytes().to_vec();
            block.extend_from_slice(&lz4_flex::compress(payload));
            block
        }
    };

    let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + header.len() + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&header_len.to_le_bytes());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn too_large(what: &str) -> ManagerError {
    ManagerError::Io(std::io::Error::new(
        ErrorKind::InvalidData,
        format!("{what} too large"),
    ))
}

/// Writes a saved resource to `path`, creating parent directories.
pub fn write_saved(path: &Path, metadata: &ResourceMetadata, payload: &[u8]) -> Result<()> {
    let bytes = encode_saved(metadata, payload)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Reads only the header of the saved resource at `path`.
pub fn read_header(path: &Path) -> Result<ResourceMetadata> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = read_header_bytes(&mut reader, path)?;
    decode_header(&header)
}

/// Reads the header and payload of the saved resource at `path`.
pub fn read_saved(path: &Path) -> Result<SavedResource> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = read_header_bytes(&mut reader, path)?;
    let metadata = decode_header(&header)?;
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    let payload = match metadata.compression {
        CompressionMethod::None => payload,
        CompressionMethod::Lz4 => decompress(&payload, path)?,
    };
    Ok(SavedResource { metadata, payload })
}

fn decompress(bytes: &[u8], path: &Path) -> Result<Vec<u8>> {
    let invalid = || ManagerError::InvalidFile(path.to_path_buf());
    let (len, block) = bytes.split_first_chunk::<4>().ok_or_else(invalid)?;
    let len = u32::from_le_bytes(*len) as usize;
    if len > block.len().saturating_mul(LZ4_MAX_RATIO) {
        return Err(invalid());
    }
    let payload = lz4_flex::decompress(block, len).map_err(|err| {
        log::error!("Corrupt compressed payload in '{}': {err}", path.display());
        invalid()
    })?;
    if payload.len() != len {
        return Err(invalid());
    }
    Ok(payload)
}

fn read_header_bytes(reader: &mut impl Read, path: &Path) -> Result<Vec<u8>> {
    let invalid = |err: std::io::Error| {
        if err.kind() == ErrorKind::UnexpectedEof {
            ManagerError::InvalidFile(path.to_path_buf())
        } else {
            ManagerError::Io(err)
        }
    };

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(invalid)?;
    if magic != MAGIC {
        return Err(ManagerError::InvalidFile(path.to_path_buf()));
    }

    let mut len = [0u8; 4];
    reader.read_exact(&mut len).map_err(invalid)?;
    let len = u32::from_le_bytes(len);
    let mut header = Vec::new();
    reader.by_ref().take(u64::from(len)).read_to_end(&mut header)?;
    if header.len() != len as usize {
        return Err(ManagerError::InvalidFile(path.to_path_buf()));
    }
    Ok(header)
}

fn decode_header(bytes: &[u8]) -> Result<ResourceMetadata> {
    let (metadata, _) = bincode::serde::decode_from_slice(bytes, CONFIG)?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ResourceUUID;
    use tempfile::tempdir;

    fn font_metadata() -> ResourceMetadata {
        let mut metadata = ResourceMetadata::new(ResourceUUID::new_v5("font"), "ui font", "font");
        metadata.dependencies = vec![ResourceUUID::new_v5("page0"), ResourceUUID::new_v5("page1")];
        metadata
    }

    #[test]
    fn test_header_is_readable_without_payload() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested/font.res");
        write_saved(&path, &font_metadata(), b"glyphs").expect("written");

        assert_eq!(read_header(&path).expect("header"), font_metadata());
        let saved = read_saved(&path).expect("saved");
        assert_eq!(saved.payload, b"glyphs");
        assert_eq!(saved.metadata.dependencies.len(), 2);
    }

    #[test]
    fn test_foreign_files_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello world").expect("written");
        assert!(matches!(read_header(&path), Err(ManagerError::InvalidFile(_))));

        let truncated = dir.path().join("truncated.res");
        let bytes = encode_saved(&font_metadata(), b"").expect("encoded");
        std::fs::write(&truncated, &bytes[..bytes.len() - 3]).expect("written");
        assert!(matches!(read_header(&truncated), Err(ManagerError::InvalidFile(_))));
    }

    #[test]
    fn test_oversized_header_length_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("huge.res");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(b"short");
        std::fs::write(&path, bytes).expect("written");

        assert!(matches!(read_header(&path), Err(ManagerError::InvalidFile(_))));
    }

    #[test]
    fn test_compressed_payload_is_restored() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("font.res");
        let mut metadata = font_metadata();
        metadata.compression = CompressionMethod::Lz4;
        let payload = b"glyph ".repeat(200);
        write_saved(&path, &metadata, &payload).expect("written");

        assert!(std::fs::metadata(&path).expect("stat").len() < payload.len() as u64);
        let saved = read_saved(&path).expect("saved");
        assert_eq!(saved.metadata.compression, CompressionMethod::Lz4);
        assert_eq!(saved.payload, payload);
    }

    #[test]
    fn test_corrupt_compressed_payload_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("font.res");
        let mut metadata = font_metadata();
        metadata.compression = CompressionMethod::Lz4;
        let mut bytes = encode_saved(&metadata, &b"glyph ".repeat(200)).expect("encoded");
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, bytes).expect("written");

        assert!(matches!(read_saved(&path), Err(ManagerError::InvalidFile(_))));
    }
}
