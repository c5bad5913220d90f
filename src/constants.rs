//! Fixed values of the linker wire protocol.

/// The only protocol version this crate emits and accepts.
pub const VERSION: u32 = 1;

/// Separator between every segment of a linker value, and between the parts
/// of the checksum payload.
pub const DELIMITER: &str = "*";

/// Minute offsets tried when verifying a checksum: the current bucket and the
/// one before it.
pub const CHECKSUM_OFFSETS: [i64; 2] = [0, 1];

/// Reflected CRC-32 polynomial.
pub const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// Leading labels ignored when comparing two hostnames for friendliness.
pub const FRIENDLY_PREFIXES: [&str; 3] = ["www.", "m.", "amp."];
