use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use thiserror::Error;

/// Root key and self-signed certificate used to sign every leaf.
pub struct CaMaterial {
    pub private_key: PKey<Private>,
    pub certificate: X509,
}

impl fmt::Debug for CaMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaMaterial")
            .field("subject", &self.certificate.subject_name())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaMaterialPaths {
    pub cert_path: PathBuf,
    pub public_key_path: PathBuf,
    pub key_path: PathBuf,
}

/// Freshly issued leaf certificate together with the key pair it certifies.
pub struct LeafCertificate {
    pub certificate: X509,
    pub private_key: PKey<Private>,
}

impl fmt::Debug for LeafCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafCertificate")
            .field("subject", &self.certificate.subject_name())
            .finish_non_exhaustive()
    }
}

/// Paths of the currently published leaf pair. Always swapped as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCertificateHandle {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsErrorKind {
    Configuration,
    Crypto,
    Persistence,
    Parse,
}

impl TlsErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration error",
            Self::Crypto => "crypto operation error",
            Self::Persistence => "persistence error",
            Self::Parse => "parse error",
        }
    }
}

impl fmt::Display for TlsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloning shares the underlying cause, so every copy reports the same
/// source chain.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TlsError {
    pub kind: TlsErrorKind,
    pub message: String,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl TlsError {
    pub fn new(kind: TlsErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: TlsErrorKind,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        let source: Arc<dyn StdError + Send + Sync + 'static> = Arc::new(source);
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(TlsErrorKind::Configuration, message)
    }

    pub fn crypto(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::with_source(TlsErrorKind::Crypto, message, source)
    }

    pub fn persistence(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(TlsErrorKind::Persistence, message, source)
    }

    pub fn parse(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::with_source(TlsErrorKind::Parse, message, source)
    }
}

/// Failure category seen by the TLS layer.
///
/// `Bootstrap` means no CA is available and the caller must abort.
/// `Regeneration` means the previously published certificate is still active
/// and the caller may retry later.
#[derive(Debug, Clone, Error)]
pub enum CertificateError {
    #[error("certificate authority bootstrap failed: {0}")]
    Bootstrap(#[source] TlsError),
    #[error("leaf certificate regeneration failed: {0}")]
    Regeneration(#[source] TlsError),
}

impl CertificateError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bootstrap(_))
    }

    pub fn kind(&self) -> TlsErrorKind {
        match self {
            Self::Bootstrap(err) | Self::Regeneration(err) => err.kind,
        }
    }
}
