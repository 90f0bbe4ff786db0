use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexSet;

use crate::config::SubjectAlternativeNames;

use super::host::{HostKind, IpSan, classify_host};

/// Names observed on live traffic that the next leaf must cover.
///
/// Append-only and insertion ordered. Shared by reference between the TLS
/// layer (writer) and the certificate manager (reader of snapshots).
#[derive(Debug, Default)]
pub struct SanAccumulator {
    state: Mutex<SanState>,
}

#[derive(Debug, Default)]
struct SanState {
    domains: IndexSet<String>,
    ips: IndexSet<IpSan>,
}

/// Point-in-time view of the accumulator plus the primary common name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectIdentity {
    pub common_name: String,
    pub alt_domains: Vec<String>,
    pub alt_ips: Vec<IpSan>,
}

impl SubjectIdentity {
    /// dNSName entries in issuance order: the common name first, then every
    /// alternative domain not equal to it.
    pub fn dns_names(&self) -> Vec<&str> {
        let common_name = self.common_name.trim();
        let mut names = Vec::with_capacity(self.alt_domains.len() + 1);
        if !common_name.is_empty() {
            names.push(common_name);
        }
        for domain in &self.alt_domains {
            if domain != common_name {
                names.push(domain.as_str());
            }
        }
        names
    }
}

impl SanAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(names: &SubjectAlternativeNames) -> Self {
        let accumulator = Self::new();
        for host in names.domains.iter().chain(names.ips.iter()) {
            accumulator.add_host(host);
        }
        accumulator
    }

    /// Registers `host` (optionally `host:port`). Returns `true` when the
    /// name was not seen before.
    pub fn add_host(&self, host: &str) -> bool {
        let Some(kind) = classify_host(host) else {
            return false;
        };
        let mut state = self.lock();
        let inserted = match kind {
            HostKind::Ip(ip) => state.ips.insert(ip),
            HostKind::Dns(name) => state.domains.insert(name),
        };
        if inserted {
            tracing::debug!(host, "registered subject alternative name");
        }
        inserted
    }

    pub fn domains(&self) -> Vec<String> {
        self.lock().domains.iter().cloned().collect()
    }

    pub fn ips(&self) -> Vec<IpSan> {
        self.lock().ips.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let state = self.lock();
        state.domains.len() + state.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self, common_name: &str) -> SubjectIdentity {
        let state = self.lock();
        SubjectIdentity {
            common_name: common_name.to_string(),
            alt_domains: state.domains.iter().cloned().collect(),
            alt_ips: state.ips.iter().cloned().collect(),
        }
    }

    // Sets only ever grow, so a panicked writer cannot leave them inconsistent.
    fn lock(&self) -> MutexGuard<'_, SanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
