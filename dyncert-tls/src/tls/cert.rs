use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::{HasPublic, PKeyRef, Private};
use openssl::x509::{X509, X509Builder, X509Extension, X509Name, X509NameBuilder, X509NameRef, X509Ref};
use rand::Rng;

use crate::config::DistinguishedNameConfig;
use crate::san::SubjectIdentity;

use super::extensions::leaf_extensions;
use super::keys::generate_key_pair;
use super::types::{CaMaterial, LeafCertificate, TlsError, TlsErrorKind};

const NOT_BEFORE_BACKDATE_DAYS: i64 = 1;
const VALIDITY_YEARS: i64 = 100;

/// Validity bounds fixed at the moment of issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl Validity {
    /// One day before `issued_at` until one hundred years after it.
    pub fn starting_at(issued_at: DateTime<Utc>) -> Self {
        Self {
            not_before: issued_at - Duration::days(NOT_BEFORE_BACKDATE_DAYS),
            not_after: issued_at + Duration::days(365 * VALIDITY_YEARS),
        }
    }
}

/// Identity and key material for one certificate to be signed.
pub struct CertificateTemplate<'a> {
    pub issuer: &'a X509NameRef,
    pub subject: &'a X509NameRef,
    pub public_key: &'a PKeyRef<Private>,
    pub validity: Validity,
}

/// Builds the subject/issuer name from the fixed DN fields, varying only
/// the common name. A blank common name is left out.
pub fn build_name(common_name: &str, dn: &DistinguishedNameConfig) -> Result<X509Name, TlsError> {
    let mut name = X509NameBuilder::new().map_err(crypto_err("failed to create X509 name"))?;
    let fields = [
        ("CN", common_name),
        ("O", dn.organization.as_str()),
        ("L", dn.locality.as_str()),
        ("ST", dn.state.as_str()),
        ("C", dn.country.as_str()),
    ];
    for (field, value) in fields {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        name.append_entry_by_text(field, value).map_err(|err| {
            TlsError::crypto(format!("invalid distinguished name field {field}={value}"), err)
        })?;
    }
    Ok(name.build())
}

/// Positive serial drawn from the 31-bit range `[1, i32::MAX)`.
pub fn random_serial() -> Result<BigNum, TlsError> {
    let serial: u32 = rand::thread_rng().gen_range(1..i32::MAX as u32);
    BigNum::from_u32(serial).map_err(crypto_err("failed to build serial number"))
}

/// Assembles a v3 certificate from `template`, appends the extensions
/// produced by `extensions` and signs it with SHA-256-with-RSA.
///
/// `extensions` runs after the public key is set so that key-derived
/// extensions can read it from the builder.
pub fn sign_certificate<F>(
    template: CertificateTemplate<'_>,
    extensions: F,
    signing_key: &PKeyRef<Private>,
) -> Result<X509, TlsError>
where
    F: FnOnce(&X509Builder) -> Result<Vec<X509Extension>, TlsError>,
{
    let mut builder = X509::builder().map_err(crypto_err("failed to create X509 builder"))?;
    builder
        .set_version(2)
        .map_err(crypto_err("failed to set certificate version"))?;

    let serial = random_serial()?
        .to_asn1_integer()
        .map_err(crypto_err("failed to encode serial number"))?;
    builder
        .set_serial_number(&serial)
        .map_err(crypto_err("failed to set serial number"))?;
    builder
        .set_issuer_name(template.issuer)
        .map_err(crypto_err("failed to set issuer name"))?;
    builder
        .set_subject_name(template.subject)
        .map_err(crypto_err("failed to set subject name"))?;
    builder
        .set_pubkey(template.public_key)
        .map_err(crypto_err("failed to set public key"))?;

    let not_before = Asn1Time::from_unix(template.validity.not_before.timestamp())
        .map_err(crypto_err("failed to encode notBefore"))?;
    let not_after = Asn1Time::from_unix(template.validity.not_after.timestamp())
        .map_err(crypto_err("failed to encode notAfter"))?;
    builder
        .set_not_before(&not_before)
        .map_err(crypto_err("failed to set notBefore"))?;
    builder
        .set_not_after(&not_after)
        .map_err(crypto_err("failed to set notAfter"))?;

    for extension in extensions(&builder)? {
        builder
            .append_extension(extension)
            .map_err(crypto_err("failed to append extension"))?;
    }

    builder
        .sign(signing_key, MessageDigest::sha256())
        .map_err(crypto_err("failed to sign certificate"))?;
    Ok(builder.build())
}

/// Fails unless "now" lies within the validity window of `cert` and its
/// signature verifies against `issuer_key`.
pub fn verify_certificate<T: HasPublic>(
    cert: &X509Ref,
    issuer_key: &PKeyRef<T>,
) -> Result<(), TlsError> {
    let now = Asn1Time::days_from_now(0).map_err(crypto_err("failed to read current time"))?;
    let started = now
        .compare(cert.not_before())
        .map_err(crypto_err("failed to compare notBefore"))?;
    let expired = now
        .compare(cert.not_after())
        .map_err(crypto_err("failed to compare notAfter"))?;
    if started == Ordering::Less || expired == Ordering::Greater {
        return Err(TlsError::new(
            TlsErrorKind::Crypto,
            format!(
                "certificate is not valid now: notBefore={} notAfter={}",
                cert.not_before(),
                cert.not_after()
            ),
        ));
    }

    let verified = cert
        .verify(issuer_key)
        .map_err(crypto_err("failed to verify certificate signature"))?;
    if !verified {
        return Err(TlsError::new(
            TlsErrorKind::Crypto,
            "certificate signature does not verify against issuer public key",
        ));
    }
    Ok(())
}

/// Issues a leaf for `identity` under `ca` with a freshly generated key.
pub fn issue_leaf_certificate(
    identity: &SubjectIdentity,
    ca: &CaMaterial,
    key_size: u32,
    dn: &DistinguishedNameConfig,
) -> Result<LeafCertificate, TlsError> {
    let private_key = generate_key_pair(key_size)?;
    let subject = build_name(&identity.common_name, dn)?;
    let template = CertificateTemplate {
        issuer: ca.certificate.subject_name(),
        subject: &subject,
        public_key: &private_key,
        validity: Validity::starting_at(Utc::now()),
    };

    let certificate = sign_certificate(
        template,
        |builder| leaf_extensions(builder, &ca.certificate, identity),
        &ca.private_key,
    )?;

    let ca_public_key = ca
        .certificate
        .public_key()
        .map_err(crypto_err("failed to read CA public key"))?;
    verify_certificate(&certificate, &ca_public_key)?;

    Ok(LeafCertificate {
        certificate,
        private_key,
    })
}

pub(crate) fn crypto_err(context: &'static str) -> impl FnOnce(ErrorStack) -> TlsError {
    move |err| TlsError::crypto(context, err)
}
