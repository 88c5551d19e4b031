//! Commutative card masking over BN254 and the pairing check that lets any
//! observer verify a disclosed unmasking against the discloser's public key.
//!
//! Convention, fixed as part of the protocol contract: masking multiplies a
//! G1 card point by the secret scalar, unmasking multiplies by its modular
//! inverse, and a claimed unmasking `y` of a stored point `u` under the G2
//! verification key `pk = g2 * sk` is correct iff `e(u, g2) == e(y, pk)`
//! (equivalently `u == y * sk`). Both sides of the equality use only public
//! data; the helper's secret key is never revealed.

use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, PrimeGroup};
use ark_ff::{Field, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use thiserror::Error;
use zeroize::Zeroize;

const LOG_TARGET: &str = "headsup_channel::masking";

/// G1 point carrying a (possibly multiply-masked) card.
pub type CardPoint = G1Projective;

/// G2 verification key for a party's masking secret.
pub type VerifyingKey = G2Projective;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskingError {
    #[error("malformed point encoding: {0}")]
    MalformedPoint(&'static str),
    #[error("masking secret must be a nonzero scalar")]
    ZeroSecret,
}

/// A party's masking secret. Zeroed on drop.
pub struct MaskingSecret {
    scalar: Fr,
}

impl MaskingSecret {
    pub fn from_scalar(scalar: Fr) -> Result<Self, MaskingError> {
        if scalar.is_zero() {
            return Err(MaskingError::ZeroSecret);
        }
        Ok(Self { scalar })
    }

    pub fn random<R: rand::Rng>(rng: &mut R) -> Self {
        loop {
            let scalar = Fr::rand(rng);
            if !scalar.is_zero() {
                return Self { scalar };
            }
        }
    }

    /// The G2 verification key `g2 * sk` published alongside this secret.
    pub fn verifying_key(&self) -> VerifyingKey {
        G2Projective::generator() * self.scalar
    }
}

impl Zeroize for MaskingSecret {
    fn zeroize(&mut self) {
        self.scalar = Fr::zero();
    }
}

impl Drop for MaskingSecret {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Add one masking layer: `point * sk`. Commutative across parties since
/// scalar multiplication commutes.
pub fn mask(point: &CardPoint, secret: &MaskingSecret) -> CardPoint {
    *point * secret.scalar
}

/// Remove one masking layer: `point * sk^-1`.
pub fn unmask_layer(point: &CardPoint, secret: &MaskingSecret) -> CardPoint {
    let inverse = secret
        .scalar
        .inverse()
        .unwrap_or_else(|| unreachable!("secret is nonzero by construction"));
    *point * inverse
}

/// Check that `opened` is the correct single-layer unmasking of `stored`
/// under the helper key `pk`: `e(stored, g2) == e(opened, pk)`.
///
/// A mismatch is a plain `false`; the caller decides whether that rejects a
/// submission or merely marks a reveal invalid.
pub fn verify_partial_decrypt(
    stored: &CardPoint,
    opened: &CardPoint,
    helper_key: &VerifyingKey,
) -> bool {
    let lhs = Bn254::pairing(stored.into_affine(), G2Affine::generator());
    let rhs = Bn254::pairing(opened.into_affine(), helper_key.into_affine());
    let ok = lhs == rhs;
    if !ok {
        tracing::debug!(target: LOG_TARGET, "pairing check failed for claimed unmasking");
    }
    ok
}

/// Serialize a G1 point to its compressed canonical form.
pub fn encode_g1(point: &CardPoint) -> Vec<u8> {
    let mut buf = Vec::new();
    point
        .into_affine()
        .serialize_compressed(&mut buf)
        .unwrap_or_else(|_| unreachable!("compressed G1 serialization is infallible"));
    buf
}

/// Parse a compressed G1 encoding, rejecting wrong lengths and off-curve or
/// non-subgroup data before any pairing is attempted.
pub fn decode_g1(bytes: &[u8]) -> Result<CardPoint, MaskingError> {
    if bytes.len() != G1Affine::generator().compressed_size() {
        return Err(MaskingError::MalformedPoint("wrong byte length"));
    }
    let affine = G1Affine::deserialize_compressed(bytes)
        .map_err(|_| MaskingError::MalformedPoint("not a curve point"))?;
    Ok(affine.into_group())
}

/// Serialize a G2 verification key to its compressed canonical form.
pub fn encode_g2(point: &VerifyingKey) -> Vec<u8> {
    let mut buf = Vec::new();
    point
        .into_affine()
        .serialize_compressed(&mut buf)
        .unwrap_or_else(|_| unreachable!("compressed G2 serialization is infallible"));
    buf
}

/// Parse a compressed G2 encoding with the same guards as [`decode_g1`].
pub fn decode_g2(bytes: &[u8]) -> Result<VerifyingKey, MaskingError> {
    if bytes.len() != G2Affine::generator().compressed_size() {
        return Err(MaskingError::MalformedPoint("wrong byte length"));
    }
    let affine = G2Affine::deserialize_compressed(bytes)
        .map_err(|_| MaskingError::MalformedPoint("not a curve point"))?;
    Ok(affine.into_group())
}
