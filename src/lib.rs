//! `linker` carries a small set of identifiers, such as an analytics client
//! id, from one document to another through a single URL query parameter.
//! The encoding is URL-safe and checksummed, and a value is only accepted by
//! the same browsing environment within about two minutes of its creation.
//!
//! # Create a linker value
//! ```
//! use linker::{Codec, Environment, FixedClock, IdMap};
//!
//! let env = Environment::new("Mozilla/5.0", -540, "ja-JP");
//! let codec = Codec::with_clock(env, FixedClock(1_500_000_000_000));
//! let ids = IdMap::from([("cid", "123"), ("gclid", "abc")]);
//! assert_eq!(codec.create_linker(1, &ids), "1*i2qiy1*cid*MTIz*gclid*YWJj");
//! ```
//!
//! # Read it back on the destination page
//!
//! A minute later the value still verifies; after that it is rejected.
//! ```
//! use linker::{Codec, Environment, FixedClock, LinkerReader};
//!
//! let env = Environment::new("Mozilla/5.0", -540, "ja-JP");
//! let query = "?_linker=1*i2qiy1*cid*MTIz*gclid*YWJj";
//!
//! let codec = Codec::with_clock(env.clone(), FixedClock(1_500_000_060_000));
//! let reader = LinkerReader::new(query, codec);
//! assert_eq!(reader.get("_linker", "cid").as_deref(), Some("123"));
//!
//! let codec = Codec::with_clock(env, FixedClock(1_500_000_120_000));
//! let reader = LinkerReader::new(query, codec);
//! assert_eq!(reader.get("_linker", "cid"), None);
//! ```

pub mod clock;
pub mod codec;
pub mod constants;
pub mod crc32;
pub mod destination;
pub mod fingerprint;
pub mod ids;
pub mod reader;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::codec::{Codec, Error};
pub use self::fingerprint::Environment;
pub use self::ids::IdMap;
pub use self::reader::{LinkerReader, QuerySource};
