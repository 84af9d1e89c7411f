// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL → host key mapping.
//!
//! The host key decides which pool a task lands in, and therefore which
//! politeness and concurrency limits it shares.

use serde::{Deserialize, Serialize};
use url::{Host, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    /// Full host name: `a.example.com` and `b.example.com` are distinct
    #[default]
    Host,
    /// Registrable domain per the public suffix list: `a.example.com` and
    /// `b.example.com` share a key, `alice.github.io` and `bob.github.io` don't
    Domain,
}

impl std::fmt::Display for GroupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupMode::Host => write!(f, "host"),
            GroupMode::Domain => write!(f, "domain"),
        }
    }
}

/// Host key for a parsed URL, or `None` if the URL has no host.
pub fn host_key(url: &Url, mode: GroupMode) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.');
            if domain.is_empty() {
                return None;
            }
            Some(match mode {
                GroupMode::Host => domain.to_string(),
                GroupMode::Domain => registrable_domain(domain).to_string(),
            })
        }
        // IP literals have no domain structure to collapse
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(format!("[{}]", addr)),
    }
}

/// Host key for a URL string; `None` if it does not parse or has no host.
pub fn host_key_of(url: &str, mode: GroupMode) -> Option<String> {
    Url::parse(url).ok().and_then(|u| host_key(&u, mode))
}

/// Public suffix plus one label. A host that is itself a public suffix, or
/// that the list cannot place (`localhost`), keys as itself.
fn registrable_domain(domain: &str) -> &str {
    psl::domain_str(domain).unwrap_or(domain)
}

/// Reverse the label order of a host (`www.example.com` → `com.example.www`)
/// so that hosts of one domain sort next to each other in reports.
pub fn reverse_host(host: &str) -> String {
    host.split('.').rev().collect::<Vec<_>>().join(".")
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
