//! Ledger accounts backed by secp256k1 keys
//!
//! An [`Account`] owns a private key and can sign; a [`PublicAccount`] is the
//! shareable half (public key and address) that transactions refer to.

use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fmt;
use thiserror::Error;

use super::hash::{base58check, sha256};

/// Version byte prefixed to account addresses
pub const ADDRESS_VERSION: u8 = 0x00;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Public identity of an account, safe to embed in transactions
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicAccount {
    /// Compressed public key (hex)
    pub public_key: String,
    /// Base58Check address derived from the public key
    pub address: String,
}

impl PublicAccount {
    /// Build from a hex public key, deriving the address
    pub fn from_public_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let public_key = public_key_from_hex(hex_key)?;
        Ok(Self {
            public_key: hex::encode(public_key.serialize()),
            address: public_key_to_address(&public_key),
        })
    }

    /// Verify a signature made by this account over `message_hash`
    pub fn verify(&self, message_hash: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let public_key = public_key_from_hex(&self.public_key)?;
        verify_signature(&public_key, message_hash, signature)
    }
}

impl fmt::Display for PublicAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// An account whose private key is held by this process
#[derive(Clone)]
pub struct Account {
    secret_key: SecretKey,
    public: PublicAccount,
}

impl Account {
    /// Generate a new random account
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, _) = secp.generate_keypair(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    /// Create an account from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public: PublicAccount {
                public_key: hex::encode(public_key.serialize()),
                address: public_key_to_address(&public_key),
            },
        }
    }

    /// Create an account from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Compressed public key (hex)
    pub fn public_key_hex(&self) -> &str {
        &self.public.public_key
    }

    pub fn address(&self) -> &str {
        &self.public.address
    }

    pub fn public_account(&self) -> &PublicAccount {
        &self.public
    }

    /// Sign a message hash with the private key
    pub fn sign(&self, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_message(&self.secret_key, message_hash)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret key
        f.debug_struct("Account")
            .field("address", &self.public.address)
            .field("public_key", &self.public.public_key)
            .finish()
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
    }
}

impl Eq for Account {}

/// Convert a public key to an account address
///
/// Address = Base58Check(version || RIPEMD160(SHA256(pubkey)))
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let sha256_hash = sha256(&public_key.serialize());

    let mut ripemd = Ripemd160::new();
    ripemd.update(&sha256_hash);
    let ripemd_hash = ripemd.finalize();

    let mut payload = vec![ADDRESS_VERSION];
    payload.extend_from_slice(&ripemd_hash);
    base58check(&payload)
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a message hash with a secret key
///
/// Inputs that are not already 32 bytes are hashed first.
pub fn sign_message(secret_key: &SecretKey, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::new();
    let message = to_message(message_hash)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_compact().to_vec())
}

/// Verify a compact signature against a public key
pub fn verify_signature(
    public_key: &PublicKey,
    message_hash: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let message = to_message(message_hash)?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    Ok(secp.verify_ecdsa(&message, &sig, public_key).is_ok())
}

fn to_message(message_hash: &[u8]) -> Result<Message, KeyError> {
    let digest = if message_hash.len() == 32 {
        message_hash.to_vec()
    } else {
        sha256(message_hash)
    };
    Ok(Message::from_digest_slice(&digest)?)
}
