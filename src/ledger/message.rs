//! Wire messages for the ledger RPC
//!
//! Frames are `MAGIC (4) | length (4, big endian) | JSON`. Every request
//! carries an id that the node echoes back in its response.

use crate::core::{CosignatureTransaction, SignedTransaction, TxHash};
use crate::ledger::{AccountInfo, Announcement, AssetId, TransactionStatus};
use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

/// Magic bytes for message framing
pub const MAGIC: [u8; 4] = [0x4C, 0x44, 0x47, 0x52]; // "LDGR"

/// Frames larger than this are refused
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcRequest {
    ResolveNamespace { name: String },
    AccountInfo { address: String },
    Announce(SignedTransaction),
    AnnounceBonded(SignedTransaction),
    AnnounceCosignature(CosignatureTransaction),
    TransactionStatus { hash: TxHash },
}

impl RpcRequest {
    /// Get request type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            RpcRequest::ResolveNamespace { .. } => "ResolveNamespace",
            RpcRequest::AccountInfo { .. } => "AccountInfo",
            RpcRequest::Announce(_) => "Announce",
            RpcRequest::AnnounceBonded(_) => "AnnounceBonded",
            RpcRequest::AnnounceCosignature(_) => "AnnounceCosignature",
            RpcRequest::TransactionStatus { .. } => "TransactionStatus",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcResponse {
    AssetId(AssetId),
    AccountInfo(AccountInfo),
    Accepted(Announcement),
    Rejected { hash: TxHash, reason: String },
    Status(TransactionStatus),
    NotFound(String),
    Error(String),
}

/// A request or response tagged with its correlation id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    pub body: T,
}

/// Length-prefixed JSON codec; encodes `E`, decodes `D`
pub struct RpcCodec<E, D> {
    _marker: PhantomData<(E, D)>,
}

impl<E, D> RpcCodec<E, D> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E, D> Default for RpcCodec<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Serialize, D> Encoder<Envelope<E>> for RpcCodec<E, D> {
    type Error = io::Error;

    fn encode(&mut self, item: Envelope<E>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = serde_json::to_vec(&item)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        if data.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds limit", data.len()),
            ));
        }

        dst.reserve(8 + data.len());
        dst.put_slice(&MAGIC);
        dst.put_u32(data.len() as u32);
        dst.put_slice(&data);

        Ok(())
    }
}

impl<E, D: DeserializeOwned> Decoder for RpcCodec<E, D> {
    type Item = Envelope<D>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 8 {
            return Ok(None);
        }

        if src[..4] != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid magic bytes",
            ));
        }

        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds limit", len),
            ));
        }

        if src.len() < 8 + len {
            src.reserve(8 + len - src.len());
            return Ok(None);
        }

        src.advance(8);
        let data = src.split_to(len);

        let envelope = serde_json::from_slice(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        Ok(Some(envelope))
    }
}

/// Codec used by the client side
pub type ClientCodec = RpcCodec<RpcRequest, RpcResponse>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_roundtrip() {
        let mut client: ClientCodec = RpcCodec::new();
        let mut server: RpcCodec<RpcResponse, RpcRequest> = RpcCodec::new();
        let hash = TxHash::digest(b"tx");

        let mut buf = BytesMut::new();
        client
            .encode(
                Envelope {
                    id: 7,
                    body: RpcRequest::TransactionStatus { hash: hash.clone() },
                },
                &mut buf,
            )
            .unwrap();

        let decoded = server.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.id, 7);
        match decoded.body {
            RpcRequest::TransactionStatus { hash: h } => assert_eq!(h, hash),
            other => panic!("Wrong request type: {}", other.type_name()),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut encoder: RpcCodec<RpcResponse, RpcRequest> = RpcCodec::new();
        let mut decoder: ClientCodec = RpcCodec::new();

        let mut full = BytesMut::new();
        encoder
            .encode(
                Envelope {
                    id: 1,
                    body: RpcResponse::AssetId(AssetId(42)),
                },
                &mut full,
            )
            .unwrap();

        let mut partial = BytesMut::from(&full[..full.len() - 3]);
        assert!(decoder.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[full.len() - 3..]);
        let decoded = decoder.decode(&mut partial).unwrap().unwrap();
        assert!(matches!(decoded.body, RpcResponse::AssetId(AssetId(42))));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut decoder: ClientCodec = RpcCodec::new();
        let mut buf = BytesMut::from(&b"XXXX\x00\x00\x00\x01{"[..]);
        assert!(decoder.decode(&mut buf).is_err());
    }
}
