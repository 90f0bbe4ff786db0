mod config;
mod san;
mod tls;
#[cfg(test)]
mod store_test;

pub use config::{
    CA_CERTIFICATE_FILENAME, CA_PRIVATE_KEY_FILENAME, CA_PUBLIC_KEY_FILENAME, CertificateConfig,
    DistinguishedNameConfig, SubjectAlternativeNames, configured_pem_directory, stable_directory,
};

pub use san::{HostKind, IpMask, IpSan, SanAccumulator, SubjectIdentity, classify_host, strip_port};

pub use tls::{
    ActiveCertificateHandle, CaMaterial, CaMaterialPaths, CertificateAuthority, CertificateError,
    CertificateStore, CertificateTemplate, DEFAULT_KEY_SIZE, DynamicCertificateManager,
    LeafCertificate, MIN_KEY_SIZE, PemMaterial, TlsError, TlsErrorKind, Validity, build_name,
    generate_ca, generate_key_pair, init_crypto, issue_leaf_certificate, leaf_extensions, load_ca,
    random_serial, root_extensions, sign_certificate, verify_certificate, write_ca,
};
