use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::x509::{X509, X509Ref};

use crate::config::{configured_pem_directory, stable_directory};

use super::types::{TlsError, TlsErrorKind};

/// Something that can be written as a PEM file.
#[derive(Clone, Copy)]
pub enum PemMaterial<'a> {
    Certificate(&'a X509Ref),
    /// Public half of the given key, as SubjectPublicKeyInfo.
    PublicKey(&'a PKeyRef<Private>),
    /// PKCS#8 `PRIVATE KEY` block.
    PrivateKey(&'a PKeyRef<Private>),
}

impl PemMaterial<'_> {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Certificate(_) => "X509 certificate",
            Self::PublicKey(_) => "public key",
            Self::PrivateKey(_) => "private key",
        }
    }

    fn to_pem(self) -> Result<Vec<u8>, TlsError> {
        let encoded = match self {
            Self::Certificate(cert) => cert.to_pem(),
            Self::PublicKey(key) => key.public_key_to_pem(),
            Self::PrivateKey(key) => key.private_key_to_pem_pkcs8(),
        };
        encoded.map_err(|err| {
            TlsError::crypto(format!("failed to PEM encode {}", self.describe()), err)
        })
    }
}

/// PEM persistence for keys and certificates.
///
/// Files saved as ephemeral are removed, best effort, when the store is
/// dropped. Stable files are never removed.
#[derive(Debug)]
pub struct CertificateStore {
    pem_directory: String,
    ephemeral: Mutex<Vec<PathBuf>>,
}

impl CertificateStore {
    /// `pem_directory` is re-checked on every save; when it is blank or
    /// missing, files go to the process temp directory instead. Stable files
    /// keep their logical name there, ephemeral ones get a random one.
    pub fn new(pem_directory: impl Into<String>) -> Self {
        Self {
            pem_directory: pem_directory.into(),
            ephemeral: Mutex::new(Vec::new()),
        }
    }

    pub fn save(
        &self,
        material: PemMaterial<'_>,
        logical_name: &str,
        ephemeral: bool,
    ) -> Result<PathBuf, TlsError> {
        let pem = material.to_pem()?;
        let path = match configured_pem_directory(&self.pem_directory) {
            Some(dir) => write_in_directory(&dir, logical_name, &pem, material)?,
            None if ephemeral => write_temp_file(logical_name, &pem)?,
            None => write_in_directory(
                &stable_directory(&self.pem_directory),
                logical_name,
                &pem,
                material,
            )?,
        };
        tracing::debug!(
            path = %path.display(),
            "created dynamic TLS certificate {} PEM file",
            material.describe()
        );
        if ephemeral {
            self.ephemeral
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(path.clone());
        }
        Ok(path)
    }

    pub fn load_certificate(path: impl AsRef<Path>) -> Result<X509, TlsError> {
        let path = path.as_ref();
        let raw = read_file(path)?;
        X509::from_pem(&raw).map_err(|err| {
            TlsError::parse(
                format!("exception reading X509 from PEM file {}", path.display()),
                err,
            )
        })
    }

    /// Strips the PEM armor, base64-decodes the body and parses it as PKCS#8.
    pub fn load_private_key(path: impl AsRef<Path>) -> Result<PKey<Private>, TlsError> {
        let path = path.as_ref();
        let raw = read_file(path)?;
        let text = String::from_utf8(raw).map_err(|err| {
            TlsError::parse(
                format!("private key PEM file {} is not text", path.display()),
                err,
            )
        })?;
        let body: String = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let der = STANDARD.decode(body.as_bytes()).map_err(|err| {
            TlsError::parse(
                format!("exception reading private key from PEM file {}", path.display()),
                err,
            )
        })?;
        PKey::private_key_from_pkcs8(&der).map_err(|err| {
            TlsError::parse(
                format!("exception reading private key from PEM file {}", path.display()),
                err,
            )
        })
    }

    pub fn load_public_key(path: impl AsRef<Path>) -> Result<PKey<Public>, TlsError> {
        let path = path.as_ref();
        let raw = read_file(path)?;
        PKey::public_key_from_pem(&raw).map_err(|err| {
            TlsError::parse(
                format!("exception reading public key from PEM file {}", path.display()),
                err,
            )
        })
    }

    /// Readiness check only: `true` when `path` holds a parseable certificate.
    pub fn probe(path: impl AsRef<Path>) -> bool {
        Self::load_certificate(path).is_ok()
    }

    pub fn ephemeral_files(&self) -> Vec<PathBuf> {
        self.ephemeral
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for CertificateStore {
    fn drop(&mut self) {
        let paths = std::mem::take(
            self.ephemeral
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to remove ephemeral PEM file");
                }
            }
        }
    }
}

fn write_in_directory(
    dir: &Path,
    logical_name: &str,
    pem: &[u8],
    material: PemMaterial<'_>,
) -> Result<PathBuf, TlsError> {
    let path = dir.join(logical_name);
    if path.exists() {
        if let Err(err) = fs::remove_file(&path) {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to delete dynamic TLS certificate {} PEM file prior to creating new version",
                material.describe()
            );
        }
    }
    let mut file = File::create(&path).map_err(|err| {
        TlsError::persistence(format!("failed to create {}", path.display()), err)
    })?;
    write_durably(&mut file, pem, &path)?;
    Ok(path)
}

fn write_temp_file(logical_name: &str, pem: &[u8]) -> Result<PathBuf, TlsError> {
    let (prefix, suffix) = match logical_name.strip_suffix(".pem") {
        Some(stem) => (stem, ".pem"),
        None => (logical_name, ""),
    };
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()
        .map_err(|err| {
            TlsError::persistence(format!("failed to create temp file for {logical_name}"), err)
        })?;
    let temp_path = file.path().to_path_buf();
    write_durably(file.as_file_mut(), pem, &temp_path)?;
    let (_, path) = file.keep().map_err(|err| {
        TlsError::persistence(format!("failed to keep temp file for {logical_name}"), err)
    })?;
    Ok(path)
}

fn write_durably(file: &mut File, pem: &[u8], path: &Path) -> Result<(), TlsError> {
    file.write_all(pem)
        .and_then(|()| file.sync_all())
        .map_err(|err| TlsError::persistence(format!("failed to write {}", path.display()), err))
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|err| {
        TlsError::with_source(
            TlsErrorKind::Persistence,
            format!("failed to read {}", path.display()),
            err,
        )
    })
}
