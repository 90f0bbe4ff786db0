use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName, SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Extension, X509Ref};

use crate::san::SubjectIdentity;

use super::types::TlsError;

/// Extensions for the self-signed root. The builder must already carry the
/// root public key, since the subject key identifier is hashed from it.
pub fn root_extensions(builder: &X509Builder) -> Result<Vec<X509Extension>, TlsError> {
    let context = builder.x509v3_context(None, None);
    let subject_key_identifier = SubjectKeyIdentifier::new()
        .build(&context)
        .map_err(|err| TlsError::crypto("failed to build subjectKeyIdentifier", err))?;

    let basic_constraints = BasicConstraints::new()
        .critical()
        .ca()
        .build()
        .map_err(|err| TlsError::crypto("failed to build basicConstraints", err))?;

    let key_usage = KeyUsage::new()
        .critical()
        .key_cert_sign()
        .digital_signature()
        .key_encipherment()
        .data_encipherment()
        .crl_sign()
        .build()
        .map_err(|err| TlsError::crypto("failed to build keyUsage", err))?;

    let extended_key_usage = ExtendedKeyUsage::new()
        .server_auth()
        .client_auth()
        .other("anyExtendedKeyUsage")
        .build()
        .map_err(|err| TlsError::crypto("failed to build extendedKeyUsage", err))?;

    Ok(vec![
        subject_key_identifier,
        basic_constraints,
        key_usage,
        extended_key_usage,
    ])
}

/// Extensions for a leaf signed by `issuer`. The subjectAltName extension is
/// left out entirely when the identity yields no names.
pub fn leaf_extensions(
    builder: &X509Builder,
    issuer: &X509Ref,
    identity: &SubjectIdentity,
) -> Result<Vec<X509Extension>, TlsError> {
    let context = builder.x509v3_context(Some(issuer), None);
    let mut extensions = Vec::with_capacity(3);

    extensions.push(
        SubjectKeyIdentifier::new()
            .build(&context)
            .map_err(|err| TlsError::crypto("failed to build subjectKeyIdentifier", err))?,
    );
    extensions.push(
        BasicConstraints::new()
            .build()
            .map_err(|err| TlsError::crypto("failed to build basicConstraints", err))?,
    );

    let dns_names = identity.dns_names();
    if !dns_names.is_empty() || !identity.alt_ips.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for name in &dns_names {
            san.dns(name);
        }
        for ip in &identity.alt_ips {
            san.ip(&ip.address.to_string());
        }
        extensions.push(
            san.build(&context)
                .map_err(|err| TlsError::crypto("failed to build subjectAltName", err))?,
        );
    }

    Ok(extensions)
}
