use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::{
    CA_CERTIFICATE_FILENAME, CA_PRIVATE_KEY_FILENAME, CA_PUBLIC_KEY_FILENAME, CertificateConfig,
    DistinguishedNameConfig,
};

use super::cert::{CertificateTemplate, Validity, build_name, crypto_err, sign_certificate, verify_certificate};
use super::extensions::root_extensions;
use super::keys::generate_key_pair;
use super::provider::init_crypto;
use super::store::{CertificateStore, PemMaterial};
use super::types::{CaMaterial, CaMaterialPaths, TlsError};

/// Generates a self-signed root and checks its own signature before
/// returning it.
pub fn generate_ca(key_size: u32, dn: &DistinguishedNameConfig) -> Result<CaMaterial, TlsError> {
    let private_key = generate_key_pair(key_size)?;
    let name = build_name(&dn.ca_common_name, dn)?;
    let template = CertificateTemplate {
        issuer: &name,
        subject: &name,
        public_key: &private_key,
        validity: Validity::starting_at(Utc::now()),
    };
    let certificate = sign_certificate(template, root_extensions, &private_key)?;
    verify_certificate(&certificate, &private_key)?;
    Ok(CaMaterial {
        private_key,
        certificate,
    })
}

pub fn write_ca(store: &CertificateStore, material: &CaMaterial) -> Result<CaMaterialPaths, TlsError> {
    let cert_path = store.save(
        PemMaterial::Certificate(&material.certificate),
        CA_CERTIFICATE_FILENAME,
        false,
    )?;
    let public_key_path = store.save(
        PemMaterial::PublicKey(&material.private_key),
        CA_PUBLIC_KEY_FILENAME,
        false,
    )?;
    let key_path = store.save(
        PemMaterial::PrivateKey(&material.private_key),
        CA_PRIVATE_KEY_FILENAME,
        false,
    )?;
    Ok(CaMaterialPaths {
        cert_path,
        public_key_path,
        key_path,
    })
}

pub fn load_ca(cert_path: &Path, key_path: &Path) -> Result<CaMaterial, TlsError> {
    let certificate = CertificateStore::load_certificate(cert_path)?;
    let private_key = CertificateStore::load_private_key(key_path)?;
    let public_key = certificate
        .public_key()
        .map_err(crypto_err("failed to read CA public key"))?;
    if !public_key.public_eq(&private_key) {
        return Err(TlsError::configuration(format!(
            "CA certificate {} does not match private key {}",
            cert_path.display(),
            key_path.display()
        )));
    }
    Ok(CaMaterial {
        private_key,
        certificate,
    })
}

/// Source of the root CA: loads it when its files exist, generates and
/// persists it once otherwise.
#[derive(Debug)]
pub struct CertificateAuthority {
    config: CertificateConfig,
}

impl CertificateAuthority {
    pub fn new(config: CertificateConfig) -> Self {
        Self { config }
    }

    /// Returns the root key and certificate. Explicitly configured CA paths
    /// must load; otherwise the fixed file names in the PEM directory, or in
    /// the temp directory when none is configured, are reused when present.
    pub fn obtain_root_material(&self, store: &CertificateStore) -> Result<CaMaterial, TlsError> {
        init_crypto();
        if let (Some(cert), Some(key)) = (
            &self.config.ca_certificate_path,
            &self.config.ca_private_key_path,
        ) {
            return load_ca(Path::new(cert), Path::new(key));
        }

        if let Some((cert_path, key_path)) = self.existing_paths() {
            let material = load_ca(&cert_path, &key_path)?;
            tracing::debug!(path = %cert_path.display(), "loaded certificate authority");
            return Ok(material);
        }

        let (material, _) = self.build_and_save(store)?;
        Ok(material)
    }

    /// Generates a new root unconditionally and persists it as stable files,
    /// replacing any CA files with the fixed names.
    pub fn build_and_save(
        &self,
        store: &CertificateStore,
    ) -> Result<(CaMaterial, CaMaterialPaths), TlsError> {
        init_crypto();
        let material = generate_ca(self.config.ca_key_size, &self.config.subject)?;
        let paths = write_ca(store, &material)?;
        tracing::info!(
            certificate = %paths.cert_path.display(),
            private_key = %paths.key_path.display(),
            "generated certificate authority"
        );
        Ok((material, paths))
    }

    /// Certificate and key paths the next `obtain_root_material` would load,
    /// if any.
    pub fn existing_paths(&self) -> Option<(PathBuf, PathBuf)> {
        if let (Some(cert), Some(key)) = (
            &self.config.ca_certificate_path,
            &self.config.ca_private_key_path,
        ) {
            return Some((PathBuf::from(cert), PathBuf::from(key)));
        }
        let (cert, key) = self.config.ca_paths();
        (cert.is_file() && key.is_file()).then_some((cert, key))
    }
}
