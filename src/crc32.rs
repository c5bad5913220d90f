//! Table-driven CRC-32 (reflected polynomial `0xEDB88320`, as used by zlib
//! and PNG).
//!
//! The lookup table is built on first use and shared read-only for the rest
//! of the process.
//!
//! ```
//! assert_eq!(linker::crc32::checksum(""), 0);
//! assert_eq!(
//!     linker::crc32::checksum("The quick brown fox jumps over the lazy dog"),
//!     0x414f_a339
//! );
//! ```

use std::sync::OnceLock;

static TABLE: OnceLock<[u32; 256]> = OnceLock::new();

/// Computes the 256-entry lookup table for [`CRC32_POLYNOMIAL`](crate::constants::CRC32_POLYNOMIAL).
#[must_use]
pub fn build_table() -> [u32; 256] {
    let mut table = [0_u32; 256];
    for (n, entry) in (0_u32..).zip(table.iter_mut()) {
        let mut c = n;
        for _ in 0..8 {
            c = if c & 1 == 1 {
                (c >> 1) ^ crate::constants::CRC32_POLYNOMIAL
            } else {
                c >> 1
            };
        }
        *entry = c;
    }
    table
}

fn table() -> &'static [u32; 256] {
    TABLE.get_or_init(build_table)
}

/// CRC-32 of the UTF-8 bytes of `input`.
#[must_use]
pub fn checksum(input: &str) -> u32 {
    checksum_bytes(input.as_bytes())
}

/// CRC-32 of an arbitrary byte slice.
#[must_use]
pub fn checksum_bytes(data: &[u8]) -> u32 {
    let table = table();
    let crc = data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        table[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    });
    crc ^ 0xFFFF_FFFF
}
