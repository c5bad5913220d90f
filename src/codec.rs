//! Create and parse linker values.
//!
//! A linker value has the shape `version*checksum*key1*value1*key2*value2...`.
//! Values are base64url-encoded without padding, keys must match
//! `^[A-Za-z0-9\-_.]+$`, and the checksum is the base-36 CRC-32 of
//! `fingerprint*minute*key1*value1...`. Verification accepts the current
//! minute and the one before it.
//!
//! ```
//! use linker::{Codec, Environment, FixedClock, IdMap};
//!
//! let env = Environment::new("Mozilla/5.0", -540, "ja-JP");
//! let codec = Codec::with_clock(env, FixedClock(1_500_000_000_000));
//! let ids = IdMap::from([("cid", "123"), ("gclid", "abc")]);
//!
//! let value = codec.create_linker(1, &ids);
//! assert_eq!(value, "1*i2qiy1*cid*MTIz*gclid*YWJj");
//! assert_eq!(codec.parse_linker(&value), Some(ids));
//! ```

use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;

use crate::clock::{Clock, SystemClock};
use crate::constants::{CHECKSUM_OFFSETS, DELIMITER, VERSION};
use crate::fingerprint::Environment;
use crate::ids::IdMap;

/// The ways a linker value, or one of its pairs, can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Fewer than four `*`-separated segments.
    TooShort,
    /// A key without a value.
    OddSegmentCount,
    /// The version segment is not a number or not a supported version.
    UnsupportedVersion,
    /// The checksum matches neither the current nor the previous minute.
    ChecksumMismatch,
    /// A key contains characters outside `[A-Za-z0-9\-_.]`, or is empty.
    InvalidKey,
    /// A value is not base64url or does not decode to UTF-8.
    InvalidValue,
    /// An empty linker name or id was requested.
    EmptyArgument,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooShort => write!(f, "linker value has too few segments"),
            Self::OddSegmentCount => write!(f, "linker value has an unpaired key"),
            Self::UnsupportedVersion => write!(f, "unsupported linker version"),
            Self::ChecksumMismatch => write!(f, "linker checksum mismatch"),
            Self::InvalidKey => write!(f, "invalid linker key"),
            Self::InvalidValue => write!(f, "invalid linker value encoding"),
            Self::EmptyArgument => write!(f, "linker name and id must not be empty"),
        }
    }
}

impl std::error::Error for Error {}

/// Creates and verifies linker values for one environment.
#[derive(Debug, Clone)]
pub struct Codec<C = SystemClock> {
    environment: Environment,
    clock: C,
}

impl Codec<SystemClock> {
    /// A codec reading the wall clock.
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self::with_clock(environment, SystemClock)
    }
}

impl<C: Clock> Codec<C> {
    pub fn with_clock(environment: Environment, clock: C) -> Self {
        Self { environment, clock }
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Builds the linker value for `ids`.
    ///
    /// Pairs with invalid keys are left out. An empty string is returned when
    /// no pair survives, in which case no linker parameter should be attached.
    #[must_use]
    pub fn create_linker(&self, version: u32, ids: &IdMap) -> String {
        let serialized = serialize(ids);
        if serialized.is_empty() {
            return String::new();
        }
        let checksum = self.checksum(&serialized, 0);
        format!("{version}{DELIMITER}{checksum}{DELIMITER}{serialized}")
    }

    /// Like [`try_parse_linker`](Self::try_parse_linker), but logs the
    /// rejection and returns `None`.
    #[must_use]
    pub fn parse_linker(&self, value: &str) -> Option<IdMap> {
        match self.try_parse_linker(value) {
            Ok(ids) => Some(ids),
            Err(Error::ChecksumMismatch) => {
                tracing::error!("Linker value {value:?} rejected: {}", Error::ChecksumMismatch);
                None
            }
            Err(e) => {
                tracing::debug!("Rejected linker value {value:?}: {e}");
                None
            }
        }
    }

    /// Verifies the format, version and checksum of `value` and returns its
    /// pairs.
    ///
    /// Pairs whose key or value is malformed are dropped without failing the
    /// whole value, so the result may be empty.
    ///
    /// # Errors
    ///
    /// [`Error::TooShort`], [`Error::OddSegmentCount`] and
    /// [`Error::UnsupportedVersion`] for malformed values;
    /// [`Error::ChecksumMismatch`] if the checksum was computed for another
    /// environment, other content, or more than a minute ago.
    pub fn try_parse_linker(&self, value: &str) -> Result<IdMap, Error> {
        let segments: Vec<&str> = value.split(DELIMITER).collect();
        if segments.len() < 4 {
            return Err(Error::TooShort);
        }
        if segments.len() % 2 != 0 {
            return Err(Error::OddSegmentCount);
        }
        if segments[0].parse::<u32>() != Ok(VERSION) {
            return Err(Error::UnsupportedVersion);
        }
        let checksum = segments[1];
        let serialized = segments[2..].join(DELIMITER);
        if !CHECKSUM_OFFSETS
            .iter()
            .any(|&offset| self.checksum(&serialized, offset) == checksum)
        {
            return Err(Error::ChecksumMismatch);
        }
        Ok(deserialize(&serialized))
    }

    /// Base-36 CRC-32 of `fingerprint*minute*serialized`, for the minute
    /// `offset` minutes before now.
    #[must_use]
    pub fn checksum(&self, serialized: &str, offset: i64) -> String {
        let minute = crate::clock::minute_bucket(&self.clock, offset);
        let payload = format!(
            "{}{DELIMITER}{minute}{DELIMITER}{serialized}",
            self.environment.fingerprint()
        );
        to_base36(crate::crc32::checksum(&payload))
    }
}

#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// `key1*value1*key2*value2...` for every pair with a valid key.
#[must_use]
pub fn serialize(ids: &IdMap) -> String {
    let mut segments = Vec::with_capacity(ids.len() * 2);
    for (key, value) in ids.iter() {
        if !is_valid_key(key) {
            tracing::warn!("{}: {key:?}, value ignored", Error::InvalidKey);
            continue;
        }
        segments.push(key.to_owned());
        segments.push(BASE64_URL_SAFE_NO_PAD.encode(value));
    }
    segments.join(DELIMITER)
}

/// Inverse of [`serialize`]. Pairs with an invalid key or value are dropped;
/// a trailing unpaired key is ignored.
#[must_use]
pub fn deserialize(serialized: &str) -> IdMap {
    let segments: Vec<&str> = serialized.split(DELIMITER).collect();
    let mut ids = IdMap::new();
    for pair in segments.chunks_exact(2) {
        let (key, value) = (pair[0], pair[1]);
        if !is_valid_key(key) {
            tracing::warn!("{}: {key:?}, value ignored", Error::InvalidKey);
            continue;
        }
        match decode_value(value) {
            Ok(decoded) => {
                ids.insert(key, decoded);
            }
            Err(e) => tracing::warn!("Dropping linker key {key:?}: {e}"),
        }
    }
    ids
}

// Trailing `=` or `.` padding from other encoders is tolerated.
fn decode_value(value: &str) -> Result<String, Error> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(value.trim_end_matches(&['=', '.'][..]))
        .map_err(|_| Error::InvalidValue)?;
    String::from_utf8(bytes).map_err(|_| Error::InvalidValue)
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut digits = Vec::with_capacity(7);
    loop {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    digits.iter().rev().map(|&d| char::from(d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use proptest::prelude::*;

    const NOW: u64 = 1_500_000_000_000;
    const MINUTE: u64 = crate::constants::MILLIS_PER_MINUTE;

    fn env() -> Environment {
        Environment::new("Mozilla/5.0", -540, "ja-JP")
    }

    fn codec_at(millis: u64) -> Codec<FixedClock> {
        Codec::with_clock(env(), FixedClock(millis))
    }

    fn ids() -> IdMap {
        IdMap::from([("cid", "123"), ("gclid", "abc")])
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_095_738_169), "i4dgzd");
        assert_eq!(to_base36(u32::MAX), "1z141z3");
    }

    #[test]
    fn test_valid_key() {
        assert!(is_valid_key("cid"));
        assert!(is_valid_key("_ga-1.x"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("bad key!"));
        assert!(!is_valid_key("a*b"));
        assert!(!is_valid_key("ключ"));
    }

    #[test]
    fn test_create_linker() {
        let codec = codec_at(NOW);
        assert_eq!(codec.create_linker(1, &ids()), "1*i2qiy1*cid*MTIz*gclid*YWJj");
        assert_eq!(codec.checksum("cid*MTIz*gclid*YWJj", 1), "1jp2wvt");
        // idempotent within a minute bucket
        assert_eq!(
            codec_at(NOW + MINUTE - 1).create_linker(1, &ids()),
            codec.create_linker(1, &ids())
        );
    }

    #[test]
    fn test_create_linker_filters_keys() {
        let codec = codec_at(NOW);
        let ids = IdMap::from([("bad key!", "x"), ("good_key", "y")]);
        let value = codec.create_linker(1, &ids);
        assert!(value.ends_with("*good_key*eQ"));
        assert_eq!(value.split('*').count(), 4);
        assert_eq!(
            codec.parse_linker(&value),
            Some(IdMap::from([("good_key", "y")]))
        );

        assert_eq!(codec.create_linker(1, &IdMap::new()), "");
        assert_eq!(codec.create_linker(1, &IdMap::from([("a b", "c")])), "");
    }

    #[test]
    fn test_parse_linker_skips_invalid_pairs() {
        let codec = codec_at(NOW);
        assert_eq!(
            codec.parse_linker("1*dhd195*bad key!*eA*good_key*eQ"),
            Some(IdMap::from([("good_key", "y")]))
        );

        let serialized = "cid*MTIz*bad*%%%*latin*_w";
        let value = format!("1*{}*{serialized}", codec.checksum(serialized, 0));
        assert_eq!(
            codec.try_parse_linker(&value),
            Ok(IdMap::from([("cid", "123")]))
        );

        let serialized = "a b*MTIz";
        let value = format!("1*{}*{serialized}", codec.checksum(serialized, 0));
        assert_eq!(codec.try_parse_linker(&value), Ok(IdMap::new()));
    }

    #[test]
    fn test_parse_linker_padding() {
        let codec = codec_at(NOW);
        for serialized in ["cid*MTIzNA==", "cid*MTIzNA.."] {
            let value = format!("1*{}*{serialized}", codec.checksum(serialized, 0));
            assert_eq!(
                codec.parse_linker(&value),
                Some(IdMap::from([("cid", "1234")]))
            );
        }
    }

    #[test]
    fn test_format_errors() {
        let codec = codec_at(NOW);
        assert_eq!(codec.try_parse_linker(""), Err(Error::TooShort));
        assert_eq!(codec.try_parse_linker("1*abc*key"), Err(Error::TooShort));
        assert_eq!(
            codec.try_parse_linker("1*abc*key*val*key2"),
            Err(Error::OddSegmentCount)
        );
        assert_eq!(
            codec.try_parse_linker("2*abc*key*val"),
            Err(Error::UnsupportedVersion)
        );
        assert_eq!(
            codec.try_parse_linker("x*i2qiy1*cid*MTIz*gclid*YWJj"),
            Err(Error::UnsupportedVersion)
        );
        assert_eq!(codec.parse_linker("1*abc*key"), None);
        assert_eq!(codec.parse_linker("2*abc*key*val"), None);
    }

    #[test]
    fn test_checksum_mismatch() {
        let codec = codec_at(NOW);
        assert_eq!(
            codec.try_parse_linker("1*i2qiy2*cid*MTIz*gclid*YWJj"),
            Err(Error::ChecksumMismatch)
        );
        // value tampered with
        assert_eq!(
            codec.try_parse_linker("1*i2qiy1*cid*MTI0*gclid*YWJj"),
            Err(Error::ChecksumMismatch)
        );
        // another environment
        let other = Codec::with_clock(
            Environment::new("Mozilla/5.0", 0, "ja-JP"),
            FixedClock(NOW),
        );
        assert_eq!(other.parse_linker("1*i2qiy1*cid*MTIz*gclid*YWJj"), None);
    }

    #[test]
    fn test_time_tolerance() {
        let value = codec_at(NOW).create_linker(1, &ids());
        assert_eq!(codec_at(NOW).parse_linker(&value), Some(ids()));
        assert_eq!(codec_at(NOW + MINUTE).parse_linker(&value), Some(ids()));
        assert_eq!(
            codec_at(NOW + 2 * MINUTE - 1).parse_linker(&value),
            Some(ids())
        );
        assert_eq!(
            codec_at(NOW + 2 * MINUTE).try_parse_linker(&value),
            Err(Error::ChecksumMismatch)
        );
        assert_eq!(codec_at(NOW + 10 * MINUTE).parse_linker(&value), None);
        // a decoder whose clock is behind the encoder's is not tolerated
        assert_eq!(
            codec_at(NOW - 1).try_parse_linker(&value),
            Err(Error::ChecksumMismatch)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: if cfg!(miri) { 8 } else { 64 },
            ..ProptestConfig::default()
        })]

        #[test]
        fn proptest_round_trip(
            pairs in prop::collection::btree_map("[A-Za-z0-9._-]{1,12}", ".*", 1..6),
            millis in 0..u64::from(u32::MAX) * 1000,
        ) {
            let ids: IdMap = pairs.into_iter().collect();
            let codec = codec_at(millis);
            let value = codec.create_linker(1, &ids);
            prop_assert_eq!(value.split('*').count(), 2 + 2 * ids.len());
            prop_assert_eq!(codec.parse_linker(&value), Some(ids.clone()));
            prop_assert_eq!(codec_at(millis + MINUTE).parse_linker(&value), Some(ids));
        }

        #[test]
        fn proptest_tampered_checksum_rejected(
            pairs in prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,16}", 1..4),
            position in any::<prop::sample::Index>(),
            replacement in any::<prop::sample::Index>(),
        ) {
            const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
            let ids: IdMap = pairs.into_iter().collect();
            let codec = codec_at(NOW);
            let value = codec.create_linker(1, &ids);
            let mut segments: Vec<String> = value.split('*').map(str::to_owned).collect();

            let mut checksum = segments[1].clone().into_bytes();
            let i = position.index(checksum.len());
            let original = checksum[i];
            let mut j = replacement.index(DIGITS.len());
            if DIGITS[j] == original {
                j = (j + 1) % DIGITS.len();
            }
            checksum[i] = DIGITS[j];
            segments[1] = String::from_utf8(checksum).unwrap();

            prop_assert_eq!(codec.parse_linker(&segments.join("*")), None);
        }
    }
}
