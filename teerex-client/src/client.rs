//! The Remote Prover Client (spec §4.7): negotiate attestation, verify it,
//! encrypt the witness to the attested key, `POST /prove`, retry on
//! transport faults.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use teerex_core::{AttestationArtifact, ChonkProof, ErrorResponse, Nonce, PublicKey};
use teerex_verify::VerifierConfig;

use crate::backoff;
use crate::error::ClientError;
use crate::witness::ExecutionSteps;

/// Matches spec §4.7 step 5: "retry up to 2 times on transport errors".
const RETRIES: usize = 2;
/// Matches spec §4.7 step 5 and the server's own handling timeout.
pub const PROVE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

struct CachedAttestation {
    artifact: AttestationArtifact,
    public_key: PublicKey,
    fetched_at: Instant,
}

/// Talks to one TEE-Rex prove service over HTTP.
pub struct ProverClient {
    http: reqwest::Client,
    base_url: String,
    verifier: VerifierConfig,
    cache: Mutex<Option<CachedAttestation>>,
}

#[derive(Serialize)]
struct ProveRequestBody {
    data: String,
}

#[derive(Deserialize)]
struct ProveResponseBody {
    proof: String,
}

impl ProverClient {
    pub fn new(base_url: impl Into<String>, verifier: VerifierConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROVE_TIMEOUT)
            .build()
            .expect("reqwest client with sane defaults always builds");
        Self {
            http,
            base_url: base_url.into(),
            verifier,
            cache: Mutex::new(None),
        }
    }

    /// Construct over a caller-supplied `reqwest::Client` (e.g. one with
    /// custom TLS config or a short timeout for tests).
    pub fn from_client(base_url: impl Into<String>, verifier: VerifierConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            verifier,
            cache: Mutex::new(None),
        }
    }

    /// `GET /attestation`, `Verify(artifact, config) -> publicKey` (spec
    /// §4.7 steps 1-2). Reuses a cached, still-fresh result unless
    /// `force_refresh` is set or the cache was invalidated by a prior
    /// verification failure.
    pub async fn attested_public_key(
        &self,
        nonce: Option<&Nonce>,
        force_refresh: bool,
    ) -> Result<PublicKey, ClientError> {
        if !force_refresh {
            if let Some(cached) = self.fresh_cached_entry() {
                return Ok(cached);
            }
        }

        let artifact = self.fetch_attestation(nonce).await?;
        let verify_result =
            teerex_verify::verify(&artifact, &self.verifier, nonce, &self.http).await;

        match verify_result {
            Ok(public_key) => {
                *self.cache.lock().unwrap() = Some(CachedAttestation {
                    artifact,
                    public_key: public_key.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(public_key)
            }
            Err(e) => {
                // Verification failed: drop any stale cache entry so the
                // next call re-fetches and re-verifies rather than quietly
                // serving a public key this attempt just rejected.
                *self.cache.lock().unwrap() = None;
                Err(e.into())
            }
        }
    }

    fn fresh_cached_entry(&self) -> Option<PublicKey> {
        let cache = self.cache.lock().unwrap();
        let cached = cache.as_ref()?;
        if cached.fetched_at.elapsed() <= self.verifier.max_age() {
            Some(cached.public_key.clone())
        } else {
            None
        }
    }

    /// The server mode of the last successfully attested-to artifact, if
    /// any is still cached.
    pub fn cached_mode(&self) -> Option<teerex_core::ServerMode> {
        self.cache.lock().unwrap().as_ref().map(|c| c.artifact.mode())
    }

    /// Full `remote` proving round trip (spec §4.7): attest, serialize the
    /// witness per the server's mode, encrypt, `POST /prove`, retry on
    /// transport faults.
    pub async fn prove(&self, steps: &ExecutionSteps) -> Result<ChonkProof, ClientError> {
        let public_key = self.attested_public_key(None, false).await?;
        let mode = self
            .cached_mode()
            .expect("attested_public_key always populates the cache on success");

        let payload = steps
            .encode(mode)
            .map_err(ClientError::Decode)?;
        let envelope = teerex_core::envelope::encrypt(&payload, &public_key);

        self.send_prove_with_retries(&envelope).await
    }

    async fn send_prove_with_retries(&self, envelope: &[u8]) -> Result<ChonkProof, ClientError> {
        let data = base64::engine::general_purpose::STANDARD.encode(envelope);
        let body = ProveRequestBody { data };

        let mut backoffs = backoff::get_backoff_iter();
        let max_attempts = RETRIES + 1;
        let mut last_err = None;

        for attempt in 0..max_attempts {
            match self.send_prove_once(&body).await {
                Ok(proof) => return Ok(proof),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    tracing::warn!(attempt, error = %e, "prove request failed, retrying");
                    tokio::time::sleep(backoffs.next().unwrap()).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.expect("loop returns Ok or Err before exhausting attempts"))
    }

    async fn send_prove_once(&self, body: &ProveRequestBody) -> Result<ChonkProof, ClientError> {
        let url = format!("{}/prove", self.base_url);
        let resp = self.http.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let body: ErrorResponse = resp.json().await?;
            return Err(ClientError::Server(body));
        }

        let body: ProveResponseBody = resp.json().await?;
        let proof_bytes = base64::engine::general_purpose::STANDARD
            .decode(&body.proof)
            .map_err(|e| ClientError::Decode(e.into()))?;
        ChonkProof::from_bytes(&proof_bytes).map_err(|e| ClientError::Decode(e.into()))
    }

    async fn fetch_attestation(&self, nonce: Option<&Nonce>) -> Result<AttestationArtifact, ClientError> {
        let url = format!("{}/attestation", self.base_url);
        let mut req = self.http.get(&url);
        if let Some(n) = nonce {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&n.0);
            req = req.query(&[("nonce", encoded)]);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let body: ErrorResponse = resp.json().await?;
            return Err(ClientError::Server(body));
        }

        resp.json().await.map_err(ClientError::from)
    }
}
