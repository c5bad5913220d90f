//! Decide which outgoing URLs get a linker parameter, and append it.
//!
//! ```
//! use linker::destination::{decorate, LinkerConfig, Page};
//! use linker::{Codec, Environment, FixedClock};
//!
//! let config: LinkerConfig = serde_json::from_str(
//!     r#"{
//!         "ids": {"cid": "123"},
//!         "enabled": true,
//!         "proxyOnly": false,
//!         "destinationDomains": ["*.example.org"]
//!     }"#,
//! )
//! .unwrap();
//! let page = Page::new("publisher.com", "publisher.com", "publisher.com");
//! let codec = Codec::with_clock(Environment::default(), FixedClock(0));
//!
//! let url = decorate(&codec, "https://shop.example.org/cart", "_linker", &config, &page)
//!     .unwrap();
//! assert!(url.starts_with("https://shop.example.org/cart?_linker=1*"));
//! let url = decorate(&codec, "https://elsewhere.net/", "_linker", &config, &page).unwrap();
//! assert_eq!(url, "https://elsewhere.net/");
//! ```

use url::Url;

use crate::clock::Clock;
use crate::codec::Codec;
use crate::constants::{FRIENDLY_PREFIXES, VERSION};
use crate::ids::IdMap;

/// One named linker, as found in an analytics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkerConfig {
    pub ids: IdMap,
    pub enabled: bool,
    /// Hostnames, possibly with `*` wildcards, that receive the parameter.
    /// When absent, hostnames friendly with the page's canonical or source
    /// hostname do.
    pub destination_domains: Option<Vec<String>>,
    pub same_domain_enabled: bool,
    /// Only decorate from proxy origins. Absent means `true`.
    pub proxy_only: Option<bool>,
}

impl LinkerConfig {
    #[must_use]
    pub fn is_proxy_only(&self) -> bool {
        self.proxy_only.unwrap_or(true)
    }
}

/// Hostnames describing the document doing the linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub hostname: String,
    pub canonical_hostname: String,
    pub source_hostname: String,
    /// The cookie scope of the page, when known. Without configured
    /// destination domains, it and all of its subdomains receive the
    /// parameter.
    pub highest_available_domain: Option<String>,
    /// Whether the page is served from a proxy (cache) origin.
    pub is_proxy_origin: bool,
}

impl Page {
    pub fn new(
        hostname: impl Into<String>,
        canonical_hostname: impl Into<String>,
        source_hostname: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            canonical_hostname: canonical_hostname.into(),
            source_hostname: source_hostname.into(),
            highest_available_domain: None,
            is_proxy_origin: false,
        }
    }

    #[must_use]
    pub fn with_highest_available_domain(mut self, domain: impl Into<String>) -> Self {
        self.highest_available_domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_proxy_origin(mut self, is_proxy_origin: bool) -> Self {
        self.is_proxy_origin = is_proxy_origin;
        self
    }
}

/// Appends `name=<linker value>` to `url` when `config` applies to it.
///
/// The URL is returned unchanged when the config is disabled, is proxy-only
/// and the page is not on a proxy origin, the URL is not http(s), its host is
/// not a destination, it already carries a `name` parameter, or no id
/// survives serialization. Ids with empty values are left out. Apart from the
/// appended parameter, the URL is returned exactly as given.
///
/// # Errors
///
/// If the config applies to the page but `url` is not an absolute URL.
pub fn decorate<C: Clock>(
    codec: &Codec<C>,
    url: &str,
    name: &str,
    config: &LinkerConfig,
    page: &Page,
) -> Result<String, url::ParseError> {
    if !config.enabled {
        tracing::info!("linker config for {name} is not enabled and will be ignored");
        return Ok(url.to_owned());
    }
    if config.is_proxy_only() && !page.is_proxy_origin {
        return Ok(url.to_owned());
    }
    let parsed = Url::parse(url)?;
    if !is_protocol_match(&parsed) {
        return Ok(url.to_owned());
    }
    let Some(hostname) = parsed.host_str() else {
        return Ok(url.to_owned());
    };
    if !is_domain_match(hostname, page, config) {
        return Ok(url.to_owned());
    }
    if parsed.query_pairs().any(|(key, _)| key == name) {
        return Ok(url.to_owned());
    }

    let ids: IdMap = config.ids.iter().filter(|(_, v)| !v.is_empty()).collect();
    let value = codec.create_linker(VERSION, &ids);
    if value.is_empty() {
        return Ok(url.to_owned());
    }
    Ok(append_param(url, name, &value))
}

// Inserts before any fragment, leaving the rest of `url` untouched.
fn append_param(url: &str, name: &str, value: &str) -> String {
    let (base, fragment) = url.split_at(url.find('#').unwrap_or(url.len()));
    let separator = match base.find('?') {
        None => "?",
        Some(i) if i == base.len() - 1 => "",
        Some(_) => "&",
    };
    let pair = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(name, value)
        .finish();
    format!("{base}{separator}{pair}{fragment}")
}

#[must_use]
pub fn is_protocol_match(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

pub fn is_domain_match(hostname: &str, page: &Page, config: &LinkerConfig) -> bool {
    if !config.same_domain_enabled && hostname == page.hostname {
        return false;
    }
    if let Some(domains) = &config.destination_domains {
        return destination_domains_match(domains, hostname);
    }
    let friendly_canonical = are_friendly_domains(&page.canonical_hostname, hostname);
    match &page.highest_available_domain {
        Some(domain) => {
            destination_domains_match(&[domain.clone(), format!("*{domain}")], hostname)
                || friendly_canonical
        }
        None => are_friendly_domains(&page.source_hostname, hostname) || friendly_canonical,
    }
}

fn destination_domains_match(domains: &[String], hostname: &str) -> bool {
    domains.iter().any(|domain| {
        domain == hostname || (domain.contains('*') && is_wildcard_match(hostname, domain))
    })
}

/// Whether `hostname` matches `pattern` in full, where each `*` stands for
/// any run of characters.
///
/// `*.foo.com` matches `amp.foo.com`, and `*.foo.com*` matches
/// `amp.foo.com.uk`.
#[must_use]
pub fn is_wildcard_match(hostname: &str, pattern: &str) -> bool {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    match regex::Regex::new(&format!("^{escaped}$")) {
        Ok(re) => re.is_match(hostname),
        Err(e) => {
            tracing::warn!("Unusable destination domain {pattern:?}: {e}");
            false
        }
    }
}

/// Equal once leading `www.`, `m.` and `amp.` labels are stripped.
#[must_use]
pub fn are_friendly_domains(a: &str, b: &str) -> bool {
    base_domain(a) == base_domain(b)
}

fn base_domain(mut domain: &str) -> &str {
    while let Some(rest) = FRIENDLY_PREFIXES
        .iter()
        .find_map(|prefix| domain.strip_prefix(prefix))
    {
        domain = rest;
    }
    domain
}
