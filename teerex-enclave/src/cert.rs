//! A minimal self-signed X.509 certificate generator for P-384 ECDSA keys.
//!
//! Real Nitro/SGX deployments chain a leaf certificate up to a hardware
//! vendor's root CA; off hardware this provider runs in the same "debug
//! mode" AWS Nitro itself supports, where the attestation document's
//! certificate is self-signed rather than chained to the production AWS
//! root (see DESIGN.md). This module hand-rolls the small DER subset a
//! self-signed leaf needs rather than pulling in a general-purpose X.509
//! builder crate, reusing `yasna` (already a dependency for ASN.1 work in
//! `teerex-verify`).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use num_bigint::BigUint;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P384_SHA384_FIXED_SIGNING};
use yasna::models::ObjectIdentifier;
use yasna::Tag;

const OID_EC_PUBLIC_KEY: &[u64] = &[1, 2, 840, 10045, 2, 1];
const OID_SECP384R1: &[u64] = &[1, 3, 132, 0, 34];
const OID_ECDSA_WITH_SHA384: &[u64] = &[1, 2, 840, 10045, 4, 3, 3];
const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];

const VALIDITY_WINDOW: Duration = Duration::from_secs(3600);

/// A self-signed certificate plus the keypair that signed it.
pub struct SelfSignedCert {
    pub cert_der: Vec<u8>,
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl SelfSignedCert {
    /// Generate a fresh P-384 keypair and a self-signed certificate over it,
    /// valid from now for one hour (this enclave instance's lifetime).
    pub fn generate(common_name: &str) -> anyhow::Result<Self> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, &rng)
            .map_err(|_| anyhow::anyhow!("failed to generate P-384 keypair"))?;
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &ECDSA_P384_SHA384_FIXED_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .map_err(|_| anyhow::anyhow!("failed to load generated P-384 keypair"))?;

        let now = SystemTime::now();
        let not_before = now;
        let not_after = now + VALIDITY_WINDOW;

        let tbs = encode_tbs_certificate(common_name, key_pair.public_key().as_ref(), not_before, not_after);
        let signature = key_pair
            .sign(&rng, &tbs)
            .map_err(|_| anyhow::anyhow!("failed to sign self-signed certificate"))?;
        let signature_der = fixed_to_asn1_der(signature.as_ref());

        let cert_der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_der(&tbs);
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_ECDSA_WITH_SHA384));
                });
                writer.next().write_bitvec_bytes(&signature_der, signature_der.len() * 8);
            });
        });

        Ok(Self {
            cert_der,
            key_pair,
            rng,
        })
    }

    pub fn public_key_point(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    /// Sign `message` with this certificate's private key, fixed-length r||s.
    pub fn sign(&self, message: &[u8]) -> anyhow::Result<Vec<u8>> {
        let sig = self
            .key_pair
            .sign(&self.rng, message)
            .map_err(|_| anyhow::anyhow!("signing failed"))?;
        Ok(sig.as_ref().to_vec())
    }

    /// Sign `message`, ASN.1-DER-encoded as X.509/webpki's ECDSA signature
    /// verifiers expect (not COSE's usual raw r||s).
    pub fn sign_der(&self, message: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(fixed_to_asn1_der(&self.sign(message)?))
    }

    pub fn to_pem(&self) -> String {
        let body = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            &self.cert_der,
        );
        let mut out = String::from("-----BEGIN CERTIFICATE-----\n");
        for chunk in body.as_bytes().chunks(64) {
            out.push_str(std::str::from_utf8(chunk).unwrap());
            out.push('\n');
        }
        out.push_str("-----END CERTIFICATE-----\n");
        out
    }
}

fn write_name(writer: yasna::DERWriter, common_name: &str) {
    writer.write_sequence(|writer| {
        writer.next().write_set(|writer| {
            writer.next().write_sequence(|writer| {
                writer.next().write_oid(&ObjectIdentifier::from_slice(OID_COMMON_NAME));
                writer.next().write_utf8_string(common_name);
            });
        });
    });
}

fn write_utc_time(writer: yasna::DERWriter, t: SystemTime) {
    let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let (y, mo, d, h, mi, s) = civil_from_unix(secs as i64);
    let year2 = (y % 100) as u8;
    let s = format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}Z",
        year2, mo, d, h, mi, s
    );
    let mut der = vec![0x17u8, s.len() as u8];
    der.extend_from_slice(s.as_bytes());
    writer.write_der(&der);
}

/// Civil calendar conversion (Howard Hinnant's days_from_civil, inverted),
/// used only to format certificate validity timestamps without pulling in a
/// datetime crate for three integer fields.
fn civil_from_unix(unix_secs: i64) -> (i64, u32, u32, u32, u32, u32) {
    let days = unix_secs.div_euclid(86400);
    let rem_secs = unix_secs.rem_euclid(86400);
    let (h, mi, s) = (rem_secs / 3600, (rem_secs % 3600) / 60, rem_secs % 60);

    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };

    (y, m, d, h as u32, mi as u32, s as u32)
}

fn encode_tbs_certificate(
    common_name: &str,
    public_key_point: &[u8],
    not_before: SystemTime,
    not_after: SystemTime,
) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            // version [0] EXPLICIT INTEGER { v3(2) }
            writer.next().write_tagged(Tag::context(0), |writer| {
                writer.write_i64(2);
            });
            // serialNumber
            writer.next().write_biguint(&BigUint::from(1u8));
            // signature AlgorithmIdentifier
            writer.next().write_sequence(|writer| {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(OID_ECDSA_WITH_SHA384));
            });
            // issuer
            write_name(writer.next(), common_name);
            // validity
            writer.next().write_sequence(|writer| {
                write_utc_time(writer.next(), not_before);
                write_utc_time(writer.next(), not_after);
            });
            // subject (self-signed: same as issuer)
            write_name(writer.next(), common_name);
            // subjectPublicKeyInfo
            writer.next().write_sequence(|writer| {
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_EC_PUBLIC_KEY));
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_SECP384R1));
                });
                writer
                    .next()
                    .write_bitvec_bytes(public_key_point, public_key_point.len() * 8);
            });
            // extensions [3] EXPLICIT SEQUENCE OF Extension. webpki's parser
            // enforces this wrapper is present for every v3 cert (it treats
            // the subjectAltName extension as mandatory even though a cert
            // used only via `verify_is_valid_tls_server_cert`, with no
            // hostname check, never has its contents inspected); a
            // non-critical basicConstraints with `cA: FALSE` lets this same
            // certificate also parse as its own `TrustAnchor`.
            writer.next().write_tagged(Tag::context(3), |writer| {
                writer.write_sequence(|writer| {
                    writer.next().write_sequence(|writer| {
                        writer
                            .next()
                            .write_oid(&ObjectIdentifier::from_slice(OID_BASIC_CONSTRAINTS));
                        let basic_constraints = yasna::construct_der(|writer| {
                            writer.write_sequence(|_writer| {
                                // cA defaults to FALSE when absent (RFC 5280 §4.2.1.9).
                            });
                        });
                        writer.next().write_bytes(&basic_constraints);
                    });
                });
            });
        });
    })
}

/// Wrap a fixed-length ECDSA r||s signature into ASN.1 DER `SEQUENCE { r, s }`,
/// as X.509 `signatureValue` requires.
pub(crate) fn fixed_to_asn1_der(fixed: &[u8]) -> Vec<u8> {
    let half = fixed.len() / 2;
    let r = BigUint::from_bytes_be(&fixed[..half]);
    let s = BigUint::from_bytes_be(&fixed[half..]);
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_biguint(&r);
            writer.next().write_biguint(&s);
        });
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn self_signed_cert_is_parseable_der() {
        let cert = SelfSignedCert::generate("teerex-nitro-debug").unwrap();
        assert!(!cert.cert_der.is_empty());
        assert!(cert.to_pem().starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn self_signed_cert_passes_webpki_self_verification() {
        let cert = SelfSignedCert::generate("teerex-nitro-debug").unwrap();
        let anchor = webpki::TrustAnchor::try_from_cert_der(&cert.cert_der).unwrap();
        let leaf = webpki::EndEntityCert::try_from(cert.cert_der.as_slice()).unwrap();
        let anchors = [anchor];
        let time = webpki::Time::try_from(SystemTime::now()).unwrap();
        leaf.verify_is_valid_tls_server_cert(
            &[&webpki::ECDSA_P384_SHA384],
            &webpki::TlsServerTrustAnchors(&anchors),
            &[],
            time,
        )
        .unwrap();
    }
}
