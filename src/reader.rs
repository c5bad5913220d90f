//! Read linker values out of the current document's query string.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::clock::{Clock, SystemClock};
use crate::codec::{Codec, Error};
use crate::ids::IdMap;

/// Supplies the raw query string of the current document, with or without
/// the leading `?`.
pub trait QuerySource {
    fn query(&self) -> String;
}

impl QuerySource for String {
    fn query(&self) -> String {
        self.clone()
    }
}

impl QuerySource for &str {
    fn query(&self) -> String {
        (*self).to_owned()
    }
}

/// Looks up ids carried by linker parameters of the current document.
///
/// Each parameter name is read and verified at most once; later lookups for
/// the same name are served from memory, including a failed verification.
///
/// ```
/// use linker::{Codec, Environment, FixedClock, LinkerReader};
///
/// let codec = Codec::with_clock(
///     Environment::new("Mozilla/5.0", -540, "ja-JP"),
///     FixedClock(1_500_000_000_000),
/// );
/// let reader = LinkerReader::new("?_linker=1*i2qiy1*cid*MTIz*gclid*YWJj&a=b", codec);
/// assert_eq!(reader.get("_linker", "cid").as_deref(), Some("123"));
/// assert_eq!(reader.get("_linker", "nope"), None);
/// assert_eq!(reader.get("a", "cid"), None);
/// ```
pub struct LinkerReader<Q, C = SystemClock> {
    source: Q,
    codec: Codec<C>,
    cache: Mutex<HashMap<String, Option<IdMap>>>,
}

impl<Q: QuerySource, C: Clock> LinkerReader<Q, C> {
    pub fn new(source: Q, codec: Codec<C>) -> Self {
        Self {
            source,
            codec,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The value stored under `id` in the linker parameter `name`, if the
    /// parameter is present and verifies.
    #[must_use]
    pub fn get(&self, name: &str, id: &str) -> Option<String> {
        match self.try_get(name, id) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("LinkerReader::get({name:?}, {id:?}): {e}");
                None
            }
        }
    }

    /// # Errors
    ///
    /// [`Error::EmptyArgument`] if `name` or `id` is empty.
    pub fn try_get(&self, name: &str, id: &str) -> Result<Option<String>, Error> {
        if name.is_empty() || id.is_empty() {
            return Err(Error::EmptyArgument);
        }
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let ids = cache
            .entry(name.to_owned())
            .or_insert_with(|| self.read(name));
        Ok(ids.as_ref().and_then(|ids| ids.get(id)).map(str::to_owned))
    }

    fn read(&self, name: &str) -> Option<IdMap> {
        let query = self.source.query();
        let Some(value) = find_param(&query, name) else {
            tracing::debug!("No linker parameter {name:?} in query");
            return None;
        };
        self.codec.parse_linker(&value)
    }
}

/// The decoded value of the first `name` parameter in `query`.
#[must_use]
pub fn find_param(query: &str, name: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
