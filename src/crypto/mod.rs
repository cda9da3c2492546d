//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing and Base58Check encoding
//! - secp256k1 accounts, signing and verification

pub mod hash;
pub mod keys;

pub use hash::{base58check, sha256, sha256_hex, sha256_parts};
pub use keys::{
    public_key_from_hex, public_key_to_address, sign_message, verify_signature, Account,
    KeyError, PublicAccount,
};
