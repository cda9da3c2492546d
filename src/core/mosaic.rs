//! Asset (mosaic) definitions
//!
//! A mosaic is created in two steps that travel together in one aggregate:
//! a definition fixing its properties, then a supply change minting units.

use crate::core::fee::Amount;
use crate::crypto::{sha256_parts, PublicAccount};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Mutable properties of a mosaic
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MosaicFlags: u8 {
        /// Owner can change the supply after creation
        const SUPPLY_MUTABLE = 0x01;
        /// Holders can transfer to accounts other than the owner
        const TRANSFERABLE = 0x02;
    }
}

/// Identifier derived from the owner and a nonce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MosaicId(pub u64);

impl MosaicId {
    /// First 8 bytes of SHA-256(nonce || owner public key), top bit cleared
    pub fn from_nonce_and_owner(nonce: u32, owner: &PublicAccount) -> Self {
        let hash = sha256_parts(&[&nonce.to_le_bytes(), owner.public_key.as_bytes()]);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash[..8]);
        Self(u64::from_le_bytes(bytes) & 0x7FFF_FFFF_FFFF_FFFF)
    }
}

impl fmt::Display for MosaicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicProperties {
    pub flags: MosaicFlags,
    pub divisibility: u8,
    /// Lifetime in blocks, 0 for no expiry
    pub duration: u64,
}

impl Default for MosaicProperties {
    fn default() -> Self {
        Self {
            flags: MosaicFlags::SUPPLY_MUTABLE | MosaicFlags::TRANSFERABLE,
            divisibility: 0,
            duration: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicDefinition {
    pub nonce: u32,
    pub mosaic_id: MosaicId,
    pub properties: MosaicProperties,
}

impl MosaicDefinition {
    pub fn new(nonce: u32, owner: &PublicAccount, properties: MosaicProperties) -> Self {
        Self {
            nonce,
            mosaic_id: MosaicId::from_nonce_and_owner(nonce, owner),
            properties,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyDirection {
    Increase,
    Decrease,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicSupplyChange {
    pub mosaic_id: MosaicId,
    pub direction: SupplyDirection,
    pub delta: Amount,
}
