//! Compressed asset container
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ ContainerHeader (16 bytes)                    │
//! │   format_type, format_version,                │
//! │   number_of_compressed_bytes,                 │
//! │   number_of_decompressed_bytes                │
//! ├──────────────────────────────────────────────┤
//! │ Deflate stream (number_of_compressed_bytes)   │
//! └──────────────────────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytemuck::{Pod, Zeroable};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::ids::StringId;
use crate::FormatError;

/// Fixed-size container header
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ContainerHeader {
    pub format_type: StringId,
    pub format_version: u32,
    pub number_of_compressed_bytes: u32,
    pub number_of_decompressed_bytes: u32,
}

impl ContainerHeader {
    /// Header size in bytes
    pub const SIZE: usize = core::mem::size_of::<Self>();
}

/// Compress a finished buffer into a container
pub fn compress(format_type: StringId, format_version: u32, data: &[u8]) -> Result<Vec<u8>, FormatError> {
    let number_of_decompressed_bytes = u32::try_from(data.len()).map_err(|_| FormatError::TooLarge(data.len()))?;

    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let header = ContainerHeader {
        format_type,
        format_version,
        number_of_compressed_bytes: u32::try_from(compressed.len()).map_err(|_| FormatError::TooLarge(compressed.len()))?,
        number_of_decompressed_bytes,
    };

    let mut output = Vec::with_capacity(ContainerHeader::SIZE + compressed.len());
    output.extend_from_slice(bytemuck::bytes_of(&header));
    output.extend_from_slice(&compressed);

    log::trace!(
        "Compressed {} bytes into {} bytes (format {}, version {})",
        data.len(),
        compressed.len(),
        format_type,
        format_version
    );
    Ok(output)
}

/// Read and check the container header
pub fn read_header(bytes: &[u8], format_type: StringId, format_version: u32) -> Result<ContainerHeader, FormatError> {
    if bytes.len() < ContainerHeader::SIZE {
        return Err(FormatError::Truncated {
            needed: ContainerHeader::SIZE,
            available: bytes.len(),
        });
    }
    let header: ContainerHeader = bytemuck::pod_read_unaligned(&bytes[..ContainerHeader::SIZE]);

    if header.format_type != format_type {
        return Err(FormatError::FormatTypeMismatch {
            expected: format_type,
            found: header.format_type,
        });
    }
    if header.format_version != format_version {
        return Err(FormatError::VersionMismatch {
            expected: format_version,
            found: header.format_version,
        });
    }
    Ok(header)
}

/// Decompress a container, rejecting foreign formats and other versions
pub fn decompress(bytes: &[u8], format_type: StringId, format_version: u32) -> Result<Vec<u8>, FormatError> {
    let header = read_header(bytes, format_type, format_version)?;

    let payload = &bytes[ContainerHeader::SIZE..];
    let compressed_len = header.number_of_compressed_bytes as usize;
    if payload.len() != compressed_len {
        return Err(FormatError::SizeMismatch {
            expected: compressed_len,
            found: payload.len(),
        });
    }

    // The declared size is untrusted: grow from a bounded guess and stop one byte past it
    let expected = header.number_of_decompressed_bytes as usize;
    let mut output = Vec::with_capacity(expected.min(payload.len().saturating_mul(4)));
    DeflateDecoder::new(payload)
        .take(expected as u64 + 1)
        .read_to_end(&mut output)?;

    if output.len() != expected {
        return Err(FormatError::SizeMismatch {
            expected,
            found: output.len(),
        });
    }
    Ok(output)
}
