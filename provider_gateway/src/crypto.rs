//! Signature scheme used to authorize requests.
//!
//! Identities are 20-byte account addresses (0x-prefixed hex, compared
//! case-insensitively). Messages are signed with the Ethereum personal-sign
//! convention: the keccak-256 digest of the prefixed text is signed with a
//! recoverable secp256k1 signature, and verification recovers the signer
//! address from the 65-byte r||s||v signature.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use tiny_keccak::{Hasher, Keccak};

use crate::errors::{GatewayError, GatewayResult};

const PERSONAL_SIGN_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Keccak-256 digest.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Digest of a text message under the personal-sign convention.
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("{}{}{}", PERSONAL_SIGN_PREFIX, message.len(), message);
    keccak256(prefixed.as_bytes())
}

/// Derive the 0x-prefixed account address from a public key.
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    let uncompressed = public_key.serialize_uncompressed();
    // Skip the 0x04 tag byte, keep the trailing 20 bytes of the digest.
    let digest = keccak256(&uncompressed[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

fn decode_signature(signature: &str) -> GatewayResult<(RecoveryId, [u8; 64])> {
    let raw = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|e| GatewayError::InvalidSignature(format!("signature is not hex: {}", e)))?;
    if raw.len() != 65 {
        return Err(GatewayError::InvalidSignature(format!(
            "signature must be 65 bytes, got {}",
            raw.len()
        )));
    }

    // v is transmitted as 27/28 by wallets; tolerate the raw 0/1 form too.
    let v = match raw[64] {
        27 | 28 => i32::from(raw[64] - 27),
        0 | 1 => i32::from(raw[64]),
        other => {
            return Err(GatewayError::InvalidSignature(format!(
                "invalid recovery id {}",
                other
            )))
        }
    };
    let recovery_id = RecoveryId::from_i32(v)
        .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;

    let mut compact = [0u8; 64];
    compact.copy_from_slice(&raw[..64]);
    Ok((recovery_id, compact))
}

/// Recover the signer address of a personal-sign signature over `message`.
pub fn recover_signer(message: &str, signature: &str) -> GatewayResult<String> {
    let (recovery_id, compact) = decode_signature(signature)?;
    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;

    let digest = Message::from_digest(personal_message_hash(message));
    let secp = Secp256k1::new();
    let public_key = secp
        .recover_ecdsa(&digest, &recoverable)
        .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;

    Ok(address_from_public_key(&public_key))
}

/// Pure signature check against a claimed identity.
///
/// The signed text is the concatenation of the semantic fields the caller
/// authorizes plus the current nonce for that identity. Verification has no
/// side effects; advancing the nonce is the caller's responsibility.
pub fn verify_signature(
    signer_address: &str,
    signature: &str,
    original_msg: &str,
    nonce: u64,
) -> GatewayResult<()> {
    let message = format!("{}{}", original_msg, nonce);
    let recovered = recover_signer(&message, signature)?;

    if recovered.to_lowercase() == signer_address.to_lowercase() {
        return Ok(());
    }

    Err(GatewayError::InvalidSignature(format!(
        "signature {} of message {} does not match address {}",
        signature, original_msg, signer_address
    )))
}

/// The gateway's own signing credential.
///
/// Used to countersign compute payloads forwarded to the cluster and to
/// re-sign result requests on the caller's behalf.
pub struct ProviderWallet {
    secret_key: SecretKey,
    address: String,
}

impl ProviderWallet {
    /// Build a wallet from a hex-encoded secp256k1 secret key.
    pub fn from_private_key(private_key: &str) -> GatewayResult<Self> {
        let raw = hex::decode(private_key.trim_start_matches("0x"))
            .map_err(|e| GatewayError::MalformedRequest(format!("invalid private key: {}", e)))?;
        let secret_key = SecretKey::from_slice(&raw)
            .map_err(|e| GatewayError::MalformedRequest(format!("invalid private key: {}", e)))?;

        let secp = Secp256k1::new();
        let address = address_from_public_key(&secret_key.public_key(&secp));
        Ok(Self {
            secret_key,
            address,
        })
    }

    /// The gateway's account address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a text message, returning the 65-byte signature as 0x hex.
    pub fn sign_message(&self, message: &str) -> String {
        let digest = Message::from_digest(personal_message_hash(message));
        let secp = Secp256k1::new();
        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&digest, &self.secret_key)
            .serialize_compact();

        let mut raw = [0u8; 65];
        raw[..64].copy_from_slice(&compact);
        raw[64] = (recovery_id.to_i32() as u8) + 27;
        format!("0x{}", hex::encode(raw))
    }
}
