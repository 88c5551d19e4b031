use anyhow::Result;
use ark_crypto_primitives::signature::SignatureScheme;
use ark_serialize::CanonicalDeserialize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DOMAIN_TAG: &[u8] = b"headsup/transcript/v1";

/// Builder for canonical signing transcripts.
pub struct TranscriptBuilder {
    buffer: Vec<u8>,
}

impl TranscriptBuilder {
    pub fn new(kind: &'static str) -> Self {
        let mut buffer = Vec::with_capacity(128);
        buffer.extend_from_slice(DOMAIN_TAG);
        buffer.extend_from_slice(&(kind.len() as u16).to_be_bytes());
        buffer.extend_from_slice(kind.as_bytes());
        Self { buffer }
    }

    pub fn append_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn append_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn append_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Values that can be signed into a canonical transcript.
pub trait Signable {
    /// Logical kind string used for domain separation.
    fn domain_kind(&self) -> &'static str;

    /// Append this value's canonical representation into the transcript builder.
    fn write_transcript(&self, builder: &mut TranscriptBuilder);

    /// Obtain canonical signing bytes.
    fn to_signing_bytes(&self) -> Vec<u8> {
        let mut builder = TranscriptBuilder::new(self.domain_kind());
        self.write_transcript(&mut builder);
        builder.finish()
    }
}

/// A signed envelope carrying a signable value, its signature, and the exact
/// transcript bytes that were signed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithSignature<Sig, T>
where
    T: Signable,
{
    pub value: T,
    pub signature: Sig,
    /// Canonical bytes used for signing/verification.
    pub transcript: Vec<u8>,
}

impl<Sig, T> WithSignature<Sig, T>
where
    T: Signable,
{
    /// Build a signed envelope using a provided SignatureScheme.
    pub fn new<S, R>(
        value: T,
        params: &S::Parameters,
        sk: &S::SecretKey,
        rng: &mut R,
    ) -> Result<Self>
    where
        S: SignatureScheme<Signature = Sig>,
        R: rand::Rng,
    {
        let transcript = value.to_signing_bytes();
        let signature = S::sign(params, sk, &transcript, rng)
            .map_err(|e| anyhow::anyhow!("signature error: {e}"))?;

        Ok(WithSignature {
            value,
            signature,
            transcript,
        })
    }

    /// Verify this signature against the provided public parameters and key.
    pub fn verify<S>(&self, params: &S::Parameters, pk: &S::PublicKey) -> Result<bool>
    where
        S: SignatureScheme<Signature = Sig>,
    {
        S::verify(params, pk, &self.transcript, &self.signature)
            .map_err(|e| anyhow::anyhow!("signature error: {e}"))
    }
}

/// Object-safe seam the engines use to check a submitted signature against a
/// candidate public key. Implementations decide the concrete scheme.
pub trait SignatureValidator: Send + Sync {
    fn verify(&self, public_key: &[u8], transcript: &[u8], signature: &[u8]) -> bool;
}

/// Validator backed by any arkworks `SignatureScheme`; keys and signatures
/// travel as compressed canonical bytes.
pub struct SchemeValidator<S: SignatureScheme> {
    parameters: S::Parameters,
}

impl<S: SignatureScheme> SchemeValidator<S> {
    pub fn new(parameters: S::Parameters) -> Self {
        Self { parameters }
    }
}

impl<S> SignatureValidator for SchemeValidator<S>
where
    S: SignatureScheme + Send + Sync,
    S::Parameters: Send + Sync,
    S::PublicKey: CanonicalDeserialize,
    S::Signature: CanonicalDeserialize,
{
    fn verify(&self, public_key: &[u8], transcript: &[u8], signature: &[u8]) -> bool {
        let Ok(pk) = S::PublicKey::deserialize_compressed(public_key) else {
            return false;
        };
        let Ok(sig) = S::Signature::deserialize_compressed(signature) else {
            return false;
        };
        S::verify(&self.parameters, &pk, transcript, &sig).unwrap_or(false)
    }
}

/// Development validator: a signature is the SHA-256 of the public key and the
/// transcript. Binds signer identity without real key material; used by the
/// test harnesses.
#[derive(Debug, Default)]
pub struct TranscriptSignatureValidator;

impl TranscriptSignatureValidator {
    pub fn sign(public_key: &[u8], transcript: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_TAG);
        hasher.update(public_key);
        hasher.update(transcript);
        hasher.finalize().to_vec()
    }
}

impl SignatureValidator for TranscriptSignatureValidator {
    fn verify(&self, public_key: &[u8], transcript: &[u8], signature: &[u8]) -> bool {
        Self::sign(public_key, transcript) == signature
    }
}

impl Signable for u64 {
    fn domain_kind(&self) -> &'static str {
        "primitive/u64_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(*self);
    }
}
