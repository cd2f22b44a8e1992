// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! On-disk layout of the derangement cache.
//!
//! Little-endian throughout. The file is a 64-byte header followed by three
//! payload sections:
//!
//! ```text
//! offset  size  field
//! 0       4     magic = "LRCC"
//! 4       4     version (u32, currently 1)
//! 8       4     n (u32)
//! 12      4     count = D(n) (u32)
//! 16      4     offset_derangements (u32)
//! 20      4     offset_signs (u32)
//! 24      4     offset_pv_index (u32)
//! 28      4     crc32 of payload (u32)
//! 32      32    reserved (zero)
//! 64      …     derangements: count × n bytes (values 1..n)
//!               signs: count × 1 byte (int8, ±1)
//!               position_value_index: n×n bitmasks of ceil(count/8) bytes,
//!               row-major (position, value) order, bit i = derangement i
//! ```
//!
//! The CRC32 (IEEE, reflected) covers every byte from offset 64 to EOF.
//! Loaders must treat *any* mismatch — magic, version, dimensions, section
//! offsets, lengths, checksum, out-of-range cell values — as corruption.
//! Corruption is recoverable (the cache is derived data and is rebuilt);
//! only real I/O failures propagate.
//!
//! Version policy: the 32 reserved bytes leave room for future sections
//! (compressed rows, wider indices). Such additions must bump `VERSION`;
//! this loader refuses anything but version 1 rather than migrating.

use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"LRCC";
pub const VERSION: u32 = 1;
pub const HEADER_LEN: usize = 64;

/// Ways a cache file can fail validation. All of them mean "rebuild".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic (not a derangement cache)")]
    BadMagic,
    #[error("unsupported cache version {0}")]
    BadVersion(u32),
    #[error("cache is for n={found}, expected n={expected}")]
    DimensionMismatch { expected: u32, found: u32 },
    #[error("derangement count {found} does not match D(n)={expected}")]
    CountMismatch { expected: u32, found: u32 },
    #[error("file truncated or section offsets inconsistent")]
    Truncated,
    #[error("payload checksum mismatch (stored {stored:08x}, computed {computed:08x})")]
    BadChecksum { stored: u32, computed: u32 },
    #[error("payload contains out-of-range cell or sign bytes")]
    BadPayload,
}

/// Decoded payload sections, still in file representation.
#[derive(Debug, PartialEq)]
pub struct RawSections {
    pub n: usize,
    pub count: usize,
    /// count × n cell bytes.
    pub rows: Vec<u8>,
    /// count sign bytes, each +1 or −1.
    pub signs: Vec<i8>,
    /// n × n bitmasks of `mask_bytes(count)` bytes each, (p, v) row-major.
    pub pv_index: Vec<u8>,
}

/// Bytes per stored bitmask over `count` derangement indices.
#[inline]
pub fn mask_bytes(count: usize) -> usize {
    count.div_ceil(8)
}

/// CRC32 (IEEE 802.3, reflected, init all-ones) over `data`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &b in data {
        crc ^= b as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

/// Serialize a cache to its file representation.
///
/// `pv_index` must already be in file layout (see [`RawSections::pv_index`]).
pub fn encode(n: usize, count: usize, rows: &[u8], signs: &[i8], pv_index: &[u8]) -> Vec<u8> {
    debug_assert_eq!(rows.len(), count * n);
    debug_assert_eq!(signs.len(), count);
    debug_assert_eq!(pv_index.len(), n * n * mask_bytes(count));

    let offset_derangements = HEADER_LEN;
    let offset_signs = offset_derangements + rows.len();
    let offset_pv_index = offset_signs + signs.len();
    let total = offset_pv_index + pv_index.len();

    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&(n as u32).to_le_bytes());
    bytes.extend_from_slice(&(count as u32).to_le_bytes());
    bytes.extend_from_slice(&(offset_derangements as u32).to_le_bytes());
    bytes.extend_from_slice(&(offset_signs as u32).to_le_bytes());
    bytes.extend_from_slice(&(offset_pv_index as u32).to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes()); // crc patched below
    bytes.resize(HEADER_LEN, 0); // reserved

    bytes.extend_from_slice(rows);
    for &s in signs {
        bytes.push(s as u8);
    }
    bytes.extend_from_slice(pv_index);

    let crc = crc32(&bytes[HEADER_LEN..]);
    bytes[28..32].copy_from_slice(&crc.to_le_bytes());
    bytes
}

/// Parse and fully validate a cache file for dimension `n`.
///
/// `expected_count` is D(n), recomputed by the caller; a file whose header
/// disagrees is corrupt no matter what its checksum says.
pub fn decode(bytes: &[u8], n: usize, expected_count: usize) -> Result<RawSections, FormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(FormatError::Truncated);
    }
    if bytes[0..4] != MAGIC {
        return Err(FormatError::BadMagic);
    }
    let version = read_u32(bytes, 4);
    if version != VERSION {
        return Err(FormatError::BadVersion(version));
    }
    let file_n = read_u32(bytes, 8);
    if file_n as usize != n {
        return Err(FormatError::DimensionMismatch {
            expected: n as u32,
            found: file_n,
        });
    }
    let count = read_u32(bytes, 12) as usize;
    if count != expected_count {
        return Err(FormatError::CountMismatch {
            expected: expected_count as u32,
            found: count as u32,
        });
    }

    let offset_derangements = read_u32(bytes, 16) as usize;
    let offset_signs = read_u32(bytes, 20) as usize;
    let offset_pv_index = read_u32(bytes, 24) as usize;
    let pv_len = n * n * mask_bytes(count);
    let expected_total = HEADER_LEN + count * n + count + pv_len;
    if offset_derangements != HEADER_LEN
        || offset_signs != offset_derangements + count * n
        || offset_pv_index != offset_signs + count
        || bytes.len() != expected_total
    {
        return Err(FormatError::Truncated);
    }

    let stored = read_u32(bytes, 28);
    let computed = crc32(&bytes[HEADER_LEN..]);
    if stored != computed {
        return Err(FormatError::BadChecksum { stored, computed });
    }

    let rows = bytes[offset_derangements..offset_signs].to_vec();
    if rows.iter().any(|&c| c == 0 || c as usize > n) {
        return Err(FormatError::BadPayload);
    }
    let signs: Vec<i8> = bytes[offset_signs..offset_pv_index]
        .iter()
        .map(|&b| b as i8)
        .collect();
    if signs.iter().any(|&s| s != 1 && s != -1) {
        return Err(FormatError::BadPayload);
    }
    let pv_index = bytes[offset_pv_index..].to_vec();

    Ok(RawSections {
        n,
        count,
        rows,
        signs,
        pv_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_vectors() {
        // Standard check value for the IEEE polynomial.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    fn sample() -> (usize, usize, Vec<u8>, Vec<i8>, Vec<u8>) {
        // n=3: derangements [2,3,1] and [3,1,2], both sign +1.
        let n = 3;
        let count = 2;
        let rows = vec![2, 3, 1, 3, 1, 2];
        let signs = vec![1i8, 1];
        let mut pv = vec![0u8; n * n * mask_bytes(count)];
        // (pos 0, value 2) -> index 0; (pos 0, value 3) -> index 1; etc.
        let set = |pv: &mut Vec<u8>, pos: usize, value: usize, idx: usize| {
            pv[(pos * n + value - 1) * mask_bytes(count) + idx / 8] |= 1 << (idx % 8);
        };
        for (idx, row) in [[2u8, 3, 1], [3, 1, 2]].iter().enumerate() {
            for (pos, &v) in row.iter().enumerate() {
                set(&mut pv, pos, v as usize, idx);
            }
        }
        (n, count, rows, signs, pv)
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let (n, count, rows, signs, pv) = sample();
        let bytes = encode(n, count, &rows, &signs, &pv);
        assert_eq!(&bytes[0..4], b"LRCC");
        let sections = decode(&bytes, n, count).unwrap();
        assert_eq!(sections.rows, rows);
        assert_eq!(sections.signs, signs);
        assert_eq!(sections.pv_index, pv);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let (n, count, rows, signs, pv) = sample();
        let mut bytes = encode(n, count, &rows, &signs, &pv);
        bytes[0] = b'X';
        assert_eq!(decode(&bytes, n, count), Err(FormatError::BadMagic));
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let (n, count, rows, signs, pv) = sample();
        let mut bytes = encode(n, count, &rows, &signs, &pv);
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(decode(&bytes, n, count), Err(FormatError::BadVersion(2)));
    }

    #[test]
    fn test_decode_rejects_wrong_dimension() {
        let (n, count, rows, signs, pv) = sample();
        let bytes = encode(n, count, &rows, &signs, &pv);
        assert!(matches!(
            decode(&bytes, n + 1, count),
            Err(FormatError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_detects_payload_corruption() {
        let (n, count, rows, signs, pv) = sample();
        let clean = encode(n, count, &rows, &signs, &pv);
        // Flip one bit anywhere in the payload: checksum must catch it.
        for offset in [HEADER_LEN, HEADER_LEN + 3, clean.len() - 1] {
            let mut bytes = clean.clone();
            bytes[offset] ^= 0x40;
            assert!(
                matches!(decode(&bytes, n, count), Err(FormatError::BadChecksum { .. })),
                "corruption at {} not detected",
                offset
            );
        }
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let (n, count, rows, signs, pv) = sample();
        let bytes = encode(n, count, &rows, &signs, &pv);
        assert_eq!(
            decode(&bytes[..bytes.len() - 1], n, count),
            Err(FormatError::Truncated)
        );
        assert_eq!(decode(&bytes[..10], n, count), Err(FormatError::Truncated));
    }
}
