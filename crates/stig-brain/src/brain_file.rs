//! Binary persistence of policy networks.
//!
//! # Format
//!
//! All integers and floats are little-endian.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "STGB"
//! 4       1     format version (1)
//! 5       3     reserved, zero
//! 8       4     input_size  (u32, non-zero)
//! 12      4     hidden_size (u32, non-zero)
//! 16      4·N   parameters (f32) in canonical order: W1, B1, W2T, B2T, W2S, B2S
//! ```
//!
//! `N` is fully determined by the two sizes, so the file length is checked
//! exactly. Values are stored bit-for-bit, so loading a saved network yields
//! an identical network.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::network::{self, PolicyNetwork};

const MAGIC: [u8; 4] = *b"STGB";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 16;
const PARAMETER_SIZE: usize = size_of::<f32>();

/// Serialized brain data does not match the expected layout.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CorruptBrainError {
    #[display("brain data too short: {actual} bytes, need at least {min}")]
    TooShort { actual: usize, min: usize },
    #[display("invalid brain magic {found:02x?}")]
    InvalidMagic { found: [u8; 4] },
    #[display("unsupported brain format version {found}")]
    UnsupportedVersion { found: u8 },
    #[display("reserved brain header bytes are not zero")]
    ReservedNonZero,
    #[display("invalid network shape {input_size}x{hidden_size}")]
    InvalidShape { input_size: u32, hidden_size: u32 },
    #[display("brain data length mismatch: expected {expected} bytes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[display("non-finite value at parameter #{index}")]
    NonFiniteParameter { index: usize },
}

/// Reading or writing a brain file failed.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BrainFileError {
    #[display("failed to access brain file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("corrupt brain file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: CorruptBrainError,
    },
}

impl PolicyNetwork {
    /// Serializes the network into the brain file format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_SIZE + self.parameters().count() * PARAMETER_SIZE);
        bytes.extend_from_slice(&MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&[0; 3]);
        // sizes are checked to fit in u32 on construction
        #[expect(clippy::cast_possible_truncation)]
        let sizes = [self.input_size() as u32, self.hidden_size() as u32];
        for size in sizes {
            bytes.extend_from_slice(&size.to_le_bytes());
        }
        for value in self.parameters() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Parses a network from the brain file format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorruptBrainError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CorruptBrainError::TooShort {
                actual: bytes.len(),
                min: HEADER_SIZE,
            });
        }

        let found = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if found != MAGIC {
            return Err(CorruptBrainError::InvalidMagic { found });
        }
        if bytes[4] != VERSION {
            return Err(CorruptBrainError::UnsupportedVersion { found: bytes[4] });
        }
        if bytes[5..8].iter().any(|&b| b != 0) {
            return Err(CorruptBrainError::ReservedNonZero);
        }

        let input_size = read_u32_le(bytes, 8);
        let hidden_size = read_u32_le(bytes, 12);
        let invalid_shape = CorruptBrainError::InvalidShape {
            input_size,
            hidden_size,
        };
        let (Ok(inputs), Ok(hidden)) = (usize::try_from(input_size), usize::try_from(hidden_size))
        else {
            return Err(invalid_shape);
        };
        if inputs == 0 || hidden == 0 {
            return Err(invalid_shape);
        }
        let Some(expected) = network::parameter_count(inputs, hidden)
            .and_then(|n| n.checked_mul(PARAMETER_SIZE))
            .and_then(|n| n.checked_add(HEADER_SIZE))
        else {
            return Err(invalid_shape);
        };
        if bytes.len() != expected {
            return Err(CorruptBrainError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let parameters = bytes[HEADER_SIZE..]
            .chunks_exact(PARAMETER_SIZE)
            .enumerate()
            .map(|(index, chunk)| {
                let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(CorruptBrainError::NonFiniteParameter { index })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        PolicyNetwork::from_parameters(inputs, hidden, &parameters).ok_or(invalid_shape)
    }

    /// CRC-32 of the serialized network.
    ///
    /// Identifies a saved brain without storing it, e.g. to pair it with
    /// metadata kept in another file.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        crc32(&self.to_bytes())
    }

    /// Writes the network to `path`, replacing any existing file.
    pub fn save<P>(&self, path: P) -> Result<(), BrainFileError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()).map_err(|source| BrainFileError::Io {
            path: path.to_owned(),
            source,
        })
    }

    /// Reads a network previously written by [`save`](Self::save).
    pub fn load<P>(path: P) -> Result<Self, BrainFileError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| BrainFileError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_bytes(&bytes).map_err(|source| BrainFileError::Corrupt {
            path: path.to_owned(),
            source,
        })
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// CRC-32 (IEEE, reflected polynomial `0xEDB88320`).
fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
