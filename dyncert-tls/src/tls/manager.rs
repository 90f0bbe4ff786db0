use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

use crate::config::CertificateConfig;
use crate::san::SanAccumulator;

use super::ca::CertificateAuthority;
use super::cert::issue_leaf_certificate;
use super::provider::init_crypto;
use super::store::{CertificateStore, PemMaterial};
use super::types::{ActiveCertificateHandle, CertificateError, TlsError};

type SuffixSource = Box<dyn Fn() -> String + Send + Sync>;

/// Issues leaf certificates on demand and publishes the active pair.
///
/// `regenerate` is the only writer and runs under one lock end to end.
/// Readers go through an atomically swapped handle and never block.
pub struct DynamicCertificateManager {
    config: CertificateConfig,
    authority: CertificateAuthority,
    store: CertificateStore,
    sans: Arc<SanAccumulator>,
    regeneration: Mutex<Option<Outcome>>,
    completed: AtomicU64,
    active: ArcSwapOption<ActiveCertificateHandle>,
    suffix: SuffixSource,
}

#[derive(Debug)]
enum Outcome {
    Published {
        handle: Arc<ActiveCertificateHandle>,
        san_count: usize,
    },
    Failed(CertificateError),
}

impl fmt::Debug for DynamicCertificateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCertificateManager")
            .field("common_name", &self.config.common_name)
            .field("active", &self.active.load_full())
            .finish_non_exhaustive()
    }
}

impl DynamicCertificateManager {
    pub fn new(config: CertificateConfig, sans: Arc<SanAccumulator>) -> Result<Self, TlsError> {
        config.validate()?;
        init_crypto();
        Ok(Self {
            authority: CertificateAuthority::new(config.clone()),
            store: CertificateStore::new(config.pem_directory.clone()),
            config,
            sans,
            regeneration: Mutex::new(None),
            completed: AtomicU64::new(0),
            active: ArcSwapOption::empty(),
            suffix: Box::new(|| uuid::Uuid::new_v4().to_string()),
        })
    }

    /// Replaces the source of the unique suffix appended to leaf file names.
    pub fn with_suffix_source(
        mut self,
        suffix: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.suffix = Box::new(suffix);
        self
    }

    pub fn config(&self) -> &CertificateConfig {
        &self.config
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    pub fn authority(&self) -> &CertificateAuthority {
        &self.authority
    }

    pub fn subject_alternative_names(&self) -> &Arc<SanAccumulator> {
        &self.sans
    }

    /// Registers a host seen by the TLS layer for inclusion in the next leaf.
    pub fn add_host(&self, host: &str) -> bool {
        self.sans.add_host(host)
    }

    /// Issues, persists and publishes a new leaf certificate.
    ///
    /// A caller that waited on an in-flight regeneration whose snapshot
    /// already covered every name it could have seen reuses that outcome.
    /// On failure the previous handle stays published.
    pub fn regenerate(&self) -> Result<Arc<ActiveCertificateHandle>, CertificateError> {
        let san_count = self.sans.len();
        let observed = self.completed.load(Ordering::Acquire);

        let mut last = self
            .regeneration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.completed.load(Ordering::Acquire) != observed {
            match &*last {
                Some(Outcome::Published {
                    handle,
                    san_count: covered,
                }) if *covered >= san_count => return Ok(Arc::clone(handle)),
                Some(Outcome::Failed(err)) => return Err(err.clone()),
                _ => {}
            }
        }

        let result = self.regenerate_locked();
        *last = Some(match &result {
            Ok((handle, covered)) => Outcome::Published {
                handle: Arc::clone(handle),
                san_count: *covered,
            },
            Err(err) => {
                tracing::error!(error = %err, "exception while refreshing certificates");
                Outcome::Failed(err.clone())
            }
        });
        self.completed.fetch_add(1, Ordering::Release);
        result.map(|(handle, _)| handle)
    }

    fn regenerate_locked(
        &self,
    ) -> Result<(Arc<ActiveCertificateHandle>, usize), CertificateError> {
        let ca = self
            .authority
            .obtain_root_material(&self.store)
            .map_err(CertificateError::Bootstrap)?;

        let identity = self.sans.snapshot(&self.config.common_name);
        let san_count = identity.alt_domains.len() + identity.alt_ips.len();
        let leaf = issue_leaf_certificate(
            &identity,
            &ca,
            self.config.leaf_key_size,
            &self.config.subject,
        )
        .map_err(CertificateError::Regeneration)?;

        let suffix = (self.suffix)();
        let cert_path = self
            .store
            .save(
                PemMaterial::Certificate(&leaf.certificate),
                &format!("{}{suffix}.pem", self.config.leaf_certificate_name),
                true,
            )
            .map_err(CertificateError::Regeneration)?;
        let key_path = self
            .store
            .save(
                PemMaterial::PrivateKey(&leaf.private_key),
                &format!("{}{suffix}.pem", self.config.leaf_private_key_name),
                true,
            )
            .map_err(CertificateError::Regeneration)?;

        let handle = Arc::new(ActiveCertificateHandle {
            cert_path,
            key_path,
        });
        self.active.store(Some(Arc::clone(&handle)));
        tracing::info!(
            certificate = %handle.cert_path.display(),
            private_key = %handle.key_path.display(),
            dns_names = identity.dns_names().len(),
            ip_addresses = identity.alt_ips.len(),
            "published dynamic TLS certificate"
        );
        Ok((handle, san_count))
    }

    /// Currently published paths, if any.
    pub fn handle(&self) -> Option<Arc<ActiveCertificateHandle>> {
        self.active.load_full()
    }

    /// Decodes the published certificate from disk. Failure here is fatal:
    /// there is no fallback once a handle has been published.
    pub fn current_certificate(&self) -> Result<X509, TlsError> {
        let handle = self.require_handle()?;
        CertificateStore::load_certificate(&handle.cert_path)
    }

    /// Decodes the published private key from disk.
    pub fn current_private_key(&self) -> Result<PKey<Private>, TlsError> {
        let handle = self.require_handle()?;
        CertificateStore::load_private_key(&handle.key_path)
    }

    /// Root certificate for export into client trust stores.
    pub fn ca_certificate(&self) -> Result<X509, CertificateError> {
        self.authority
            .obtain_root_material(&self.store)
            .map(|ca| ca.certificate)
            .map_err(CertificateError::Bootstrap)
    }

    pub fn is_ready(&self) -> bool {
        self.active
            .load_full()
            .is_some_and(|handle| CertificateStore::probe(&handle.cert_path))
    }

    fn require_handle(&self) -> Result<Arc<ActiveCertificateHandle>, TlsError> {
        self.active.load_full().ok_or_else(|| {
            TlsError::configuration("no dynamic certificate published yet; regenerate first")
        })
    }
}
