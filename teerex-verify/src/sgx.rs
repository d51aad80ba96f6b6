//! Verification for `sgx` mode: either a remote-appraisal JWT (spec
//! §4.6 "sgx") or, when no appraisal endpoint is configured, a local DCAP
//! quote chain check grounded on the same approach the platform's
//! SGX attestation verifier uses (Intel PCK chain, QE report, attestation
//! key signature).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dcap_ql::quote::{Qe3CertDataPckCertChain, Quote, Quote3SignatureEcdsaP256};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{DecodingKey, Validation};
use num_bigint::BigUint;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use teerex_core::{AttestationArtifact, PublicKey};
use webpki::{EndEntityCert, Time, TlsServerTrustAnchors, TrustAnchor};

use crate::config::{MeasurementSlot, VerifierConfig};
use crate::error::{AttestError, InvalidReason};

/// `(measurement_enclave, measurement_signer, report_data, iat_unix_secs)`.
type QuoteClaims = (Vec<u8>, Vec<u8>, Vec<u8>, u64);

#[derive(Deserialize)]
struct AppraisalClaims {
    iat: u64,
    #[serde(with = "hex_bytes")]
    measurement_enclave: Vec<u8>,
    #[serde(with = "hex_bytes")]
    measurement_signer: Vec<u8>,
    #[serde(with = "hex_bytes")]
    report_data: Vec<u8>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex_decode(&s).map_err(serde::de::Error::custom)
    }

    fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".into());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&s[i..i + 2], 16)
                    .map_err(|e| e.to_string())
            })
            .collect()
    }
}

pub async fn verify(
    artifact: &AttestationArtifact,
    config: &VerifierConfig,
    http: &reqwest::Client,
) -> Result<PublicKey, AttestError> {
    let AttestationArtifact::Sgx { public_key, quote } = artifact else {
        unreachable!("dispatched only for ServerMode::Sgx");
    };

    let claimed = PublicKey::from_armored(public_key)
        .map_err(|_| AttestError::Invalid(InvalidReason::Encoding))?;
    let expected_hash = Sha256::digest(claimed.armored().as_bytes());

    let claims = match &config.appraisal_endpoint {
        Some(endpoint) => {
            verify_via_appraisal(quote, endpoint, config, http).await?
        }
        None => verify_via_local_dcap(quote, config)?,
    };

    check_claims(&claims, &expected_hash, config)?;

    Ok(claimed)
}

/// The policy checks shared by both the remote-appraisal and local-DCAP
/// paths: freshness, measurement pinning, and the public-key binding in
/// `report_data` (spec §4.6(sgx) steps c-f).
fn check_claims(
    claims: &QuoteClaims,
    expected_hash: &[u8],
    config: &VerifierConfig,
) -> Result<(), AttestError> {
    let (measurement_enclave, measurement_signer, report_data, iat) = claims;

    let age = SystemTime::now()
        .duration_since(UNIX_EPOCH + Duration::from_secs(*iat))
        .map_err(|_| AttestError::Invalid(InvalidReason::Expired))?;
    if age > config.freshness_budget() {
        return Err(AttestError::Invalid(InvalidReason::Expired));
    }

    if let Some(expected) = config
        .expected_measurements
        .get(&MeasurementSlot::Named("enclave"))
    {
        if expected.as_slice() != measurement_enclave.as_slice() {
            return Err(AttestError::MeasurementMismatch);
        }
    }
    if let Some(expected) = config
        .expected_measurements
        .get(&MeasurementSlot::Named("signer"))
    {
        if expected.as_slice() != measurement_signer.as_slice() {
            return Err(AttestError::MeasurementMismatch);
        }
    }

    if report_data.len() < 32 || report_data[..32] != *expected_hash {
        return Err(AttestError::Invalid(InvalidReason::ReportDataMismatch));
    }

    Ok(())
}

async fn verify_via_appraisal(
    quote: &[u8],
    endpoint: &str,
    config: &VerifierConfig,
    http: &reqwest::Client,
) -> Result<QuoteClaims, AttestError> {
    use base64::Engine as _;

    let mut req = http
        .post(endpoint)
        .json(&serde_json::json!({ "quote": base64::engine::general_purpose::STANDARD.encode(quote) }));
    if let Some(key) = &config.appraisal_api_key {
        req = req.bearer_auth(key.expose_secret());
    }

    let resp = req
        .send()
        .await
        .map_err(|e| AttestError::Unavailable(e.into()))?;
    let jwt: String = resp
        .json::<serde_json::Value>()
        .await
        .map_err(|e| AttestError::Unavailable(e.into()))?
        .get("token")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or(AttestError::Invalid(InvalidReason::Jwt))?;

    let jwks_url = format!("{endpoint}/.well-known/jwks.json");
    let jwks: JwkSet = http
        .get(&jwks_url)
        .send()
        .await
        .map_err(|e| AttestError::Unavailable(e.into()))?
        .json()
        .await
        .map_err(|e| AttestError::Unavailable(e.into()))?;

    let header = jsonwebtoken::decode_header(&jwt)
        .map_err(|_| AttestError::Invalid(InvalidReason::Jwt))?;
    let kid = header.kid.ok_or(AttestError::Invalid(InvalidReason::Jwt))?;
    let jwk = jwks
        .find(&kid)
        .ok_or(AttestError::Invalid(InvalidReason::Jwt))?;
    let decoding_key = DecodingKey::from_jwk(jwk)
        .map_err(|_| AttestError::Invalid(InvalidReason::Jwt))?;

    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;

    let claims = jsonwebtoken::decode::<AppraisalClaims>(
        &jwt,
        &decoding_key,
        &validation,
    )
    .map_err(|_| AttestError::Invalid(InvalidReason::Jwt))?
    .claims;

    Ok((
        claims.measurement_enclave,
        claims.measurement_signer,
        claims.report_data,
        claims.iat,
    ))
}

/// Local DCAP fallback: parse the quote, verify the PCK cert chain against
/// the configured vendor root, the QE report signature, and the attestation
/// key's signature over the quote header + application enclave report.
fn verify_via_local_dcap(
    quote_bytes: &[u8],
    config: &VerifierConfig,
) -> Result<QuoteClaims, AttestError> {
    let quote = Quote::parse(quote_bytes)
        .map_err(|_| AttestError::Invalid(InvalidReason::Encoding))?;

    let sig = quote
        .signature::<Quote3SignatureEcdsaP256>()
        .map_err(|_| AttestError::Invalid(InvalidReason::Encoding))?;

    let cert_chain_pem = sig
        .certification_data::<Qe3CertDataPckCertChain>()
        .map_err(|_| AttestError::Invalid(InvalidReason::Encoding))?
        .certs;
    if cert_chain_pem.len() != 3 {
        return Err(AttestError::Invalid(InvalidReason::ChainFailed));
    }

    let pck_cert_der = pem_to_der(&cert_chain_pem[0])?;
    let pck_platform_cert_der = pem_to_der(&cert_chain_pem[1])?;

    // Trust root comes from our own configuration, never from the quote's
    // own embedded chain (an attacker controls everything in the quote).
    let root_pem = config
        .vendor_root_ca_pem
        .as_deref()
        .ok_or(AttestError::Invalid(InvalidReason::ChainFailed))?;
    let root_der = pem_to_der(root_pem)?;

    let trust_anchor = TrustAnchor::try_from_cert_der(&root_der)
        .map_err(|_| AttestError::Invalid(InvalidReason::ChainFailed))?;
    let trust_anchors = [trust_anchor];

    let pck_cert = EndEntityCert::try_from(pck_cert_der.as_slice())
        .map_err(|_| AttestError::Invalid(InvalidReason::ChainFailed))?;
    let now = Time::try_from(SystemTime::now())
        .map_err(|_| AttestError::Invalid(InvalidReason::ChainFailed))?;
    static SIG_ALGS: &[&webpki::SignatureAlgorithm] =
        &[&webpki::ECDSA_P256_SHA256];
    pck_cert
        .verify_is_valid_tls_server_cert(
            SIG_ALGS,
            &TlsServerTrustAnchors(&trust_anchors),
            &[&pck_platform_cert_der],
            now,
        )
        .map_err(|_| AttestError::Invalid(InvalidReason::ChainFailed))?;

    let qe3_sig_der = ecdsa_fixed_to_der(sig.qe3_signature())
        .map_err(|_| AttestError::Invalid(InvalidReason::Signature))?;
    pck_cert
        .verify_signature(
            &webpki::ECDSA_P256_SHA256,
            sig.qe3_report(),
            &qe3_sig_der,
        )
        .map_err(|_| AttestError::Invalid(InvalidReason::Signature))?;

    let qe3_report = report_from_truncated(sig.qe3_report())?;
    let expected_qe_reportdata = Sha256::digest(
        [sig.attestation_public_key(), sig.authentication_data()].concat(),
    );
    if qe3_report.reportdata[..32] != expected_qe_reportdata[..] {
        return Err(AttestError::Invalid(InvalidReason::Signature));
    }

    let attestation_key = read_attestation_pk(sig.attestation_public_key())
        .map_err(|_| AttestError::Invalid(InvalidReason::Signature))?;
    if quote_bytes.len() < 432 {
        return Err(AttestError::Invalid(InvalidReason::Encoding));
    }
    attestation_key
        .verify(&quote_bytes[..432], sig.signature())
        .map_err(|_| AttestError::Invalid(InvalidReason::Signature))?;

    let report = report_from_truncated(quote.report_body())?;
    let iat = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    Ok((
        report.mrenclave.to_vec(),
        report.mrsigner.to_vec(),
        report.reportdata.to_vec(),
        iat,
    ))
}

/// The serialized [`sgx_isa::Report`] in a Quote has its `keyid` and `mac`
/// fields stripped. Pad it back out before deserializing.
fn report_from_truncated(bytes: &[u8]) -> Result<sgx_isa::Report, AttestError> {
    use sgx_isa::Report;
    if bytes.len() != Report::TRUNCATED_SIZE {
        return Err(AttestError::Invalid(InvalidReason::Encoding));
    }
    let mut unpadded = vec![0u8; Report::UNPADDED_SIZE];
    unpadded[..Report::TRUNCATED_SIZE].copy_from_slice(bytes);
    Report::try_copy_from(&unpadded)
        .ok_or(AttestError::Invalid(InvalidReason::Encoding))
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>, AttestError> {
    use base64::Engine as _;
    let body: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("");
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|_| AttestError::Invalid(InvalidReason::Encoding))
}

fn ecdsa_fixed_to_der(sig: &[u8]) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(sig.len() % 2 == 0, "odd-length signature");
    let (r, s) = sig.split_at(sig.len() / 2);
    let r = BigUint::from_bytes_be(r);
    let s = BigUint::from_bytes_be(s);
    Ok(yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_biguint(&r);
            writer.next().write_biguint(&s);
        })
    }))
}

fn read_attestation_pk(
    bytes: &[u8],
) -> anyhow::Result<ring::signature::UnparsedPublicKey<[u8; 65]>> {
    anyhow::ensure!(bytes.len() == 64, "attestation pubkey must be 64 bytes");
    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(bytes);
    Ok(ring::signature::UnparsedPublicKey::new(
        &ring::signature::ECDSA_P256_SHA256_FIXED,
        uncompressed,
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn report_data_mismatch_is_rejected() {
        let mut report_data = vec![0u8; 64];
        report_data[..32].copy_from_slice(&Sha256::digest(b"K'"));
        let claims = (vec![], vec![], report_data, now_secs());
        let expected_hash = Sha256::digest(b"K");

        assert!(matches!(
            check_claims(&claims, &expected_hash, &VerifierConfig::default()),
            Err(AttestError::Invalid(InvalidReason::ReportDataMismatch))
        ));
    }

    #[test]
    fn report_data_match_is_accepted() {
        let expected_hash = Sha256::digest(b"K");
        let mut report_data = vec![0u8; 64];
        report_data[..32].copy_from_slice(&expected_hash);
        let claims = (vec![], vec![], report_data, now_secs());

        assert!(check_claims(&claims, &expected_hash, &VerifierConfig::default()).is_ok());
    }

    #[test]
    fn measurement_mismatch_is_rejected() {
        let expected_hash = Sha256::digest(b"K");
        let mut report_data = vec![0u8; 64];
        report_data[..32].copy_from_slice(&expected_hash);
        let claims = (vec![0xbbu8; 32], vec![], report_data, now_secs());

        let mut config = VerifierConfig::default();
        config.expected_measurements.insert(
            MeasurementSlot::Named("enclave"),
            vec![0xaau8; 32],
        );

        assert!(matches!(
            check_claims(&claims, &expected_hash, &config),
            Err(AttestError::MeasurementMismatch)
        ));
    }
}
