//! TCP client for a ledger node
//!
//! One request is in flight at a time; the connection is opened lazily and
//! dropped after any transport error so the next call reconnects.

use crate::core::{CosignatureTransaction, SignedTransaction, TxHash};
use crate::ledger::message::{ClientCodec, Envelope, RpcCodec, RpcRequest, RpcResponse};
use crate::ledger::{
    AccountInfo, Announcement, AssetId, LedgerClient, LedgerError, TransactionStatus,
};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

/// Default time allowed for one request/response exchange
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type Connection = Framed<TcpStream, ClientCodec>;

/// Ledger client speaking framed JSON-RPC over one TCP connection
pub struct RpcClient {
    endpoint: String,
    request_timeout: Duration,
    connection: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client for `host:port`; no connection is made yet
    pub fn new(endpoint: &str) -> Result<Self, LedgerError> {
        Ok(Self {
            endpoint: validate_endpoint(endpoint)?,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connection: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Set the time allowed for each request/response exchange
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get the node address this client talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, request: RpcRequest) -> Result<RpcResponse, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = request.type_name();
        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            let stream = tokio::time::timeout(
                self.request_timeout,
                TcpStream::connect(&self.endpoint),
            )
            .await
            .map_err(|_| LedgerError::Timeout(self.request_timeout))?
            .map_err(|e| LedgerError::ConnectionFailed(format!("{}: {}", self.endpoint, e)))?;

            log::debug!("Connected to ledger node {}", self.endpoint);
            *guard = Some(Framed::new(stream, RpcCodec::new()));
        }

        let Some(framed) = guard.as_mut() else {
            return Err(LedgerError::ConnectionFailed(self.endpoint.clone()));
        };

        let exchange = async {
            framed
                .send(Envelope { id, body: request })
                .await
                .map_err(LedgerError::IoError)?;
            match framed.next().await {
                Some(Ok(envelope)) => Ok::<_, LedgerError>(envelope),
                Some(Err(e)) => Err(LedgerError::IoError(e)),
                None => Err(LedgerError::ConnectionFailed(
                    "connection closed by node".to_string(),
                )),
            }
        };

        let result = match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.request_timeout)),
        };

        let envelope = match result {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("{} request to {} failed: {}", name, self.endpoint, e);
                *guard = None;
                return Err(e);
            }
        };

        if envelope.id != id {
            *guard = None;
            return Err(LedgerError::Protocol(format!(
                "response id {} does not match request id {}",
                envelope.id, id
            )));
        }

        log::trace!("{} request {} answered", name, id);
        Ok(envelope.body)
    }

    async fn call_announce(&self, request: RpcRequest) -> Result<Announcement, LedgerError> {
        match self.call(request).await? {
            RpcResponse::Accepted(announcement) => Ok(announcement),
            RpcResponse::Rejected { hash, reason } => Err(LedgerError::Rejected { hash, reason }),
            other => Err(unexpected(other)),
        }
    }
}

impl LedgerClient for RpcClient {
    async fn resolve_namespace(&self, name: &str) -> Result<AssetId, LedgerError> {
        let request = RpcRequest::ResolveNamespace {
            name: name.to_string(),
        };
        match self.call(request).await? {
            RpcResponse::AssetId(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, LedgerError> {
        let request = RpcRequest::AccountInfo {
            address: address.to_string(),
        };
        match self.call(request).await? {
            RpcResponse::AccountInfo(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    async fn announce(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError> {
        self.call_announce(RpcRequest::Announce(tx.clone())).await
    }

    async fn announce_bonded(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError> {
        self.call_announce(RpcRequest::AnnounceBonded(tx.clone()))
            .await
    }

    async fn announce_cosignature(
        &self,
        tx: &CosignatureTransaction,
    ) -> Result<Announcement, LedgerError> {
        self.call_announce(RpcRequest::AnnounceCosignature(tx.clone()))
            .await
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TransactionStatus, LedgerError> {
        let request = RpcRequest::TransactionStatus { hash: hash.clone() };
        match self.call(request).await? {
            RpcResponse::Status(status) => Ok(status),
            // Nodes answer unknown hashes with NotFound
            RpcResponse::NotFound(_) => Ok(TransactionStatus::Unknown),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: RpcResponse) -> LedgerError {
    match response {
        RpcResponse::NotFound(what) => LedgerError::NotFound(what),
        RpcResponse::Error(message) => LedgerError::Protocol(message),
        other => LedgerError::Protocol(format!("unexpected response: {:?}", other)),
    }
}

/// Accepts `host:port` with an optional `tcp://` prefix
pub fn validate_endpoint(endpoint: &str) -> Result<String, LedgerError> {
    let trimmed = endpoint.trim();
    let address = trimmed.strip_prefix("tcp://").unwrap_or(trimmed);

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| LedgerError::InvalidEndpoint(endpoint.to_string()))?;

    if host.is_empty() || host.contains('/') || port.parse::<u16>().is_err() {
        return Err(LedgerError::InvalidEndpoint(endpoint.to_string()));
    }

    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Amount;
    use crate::ledger::message::RpcCodec;
    use crate::ledger::AssetHolding;
    use tokio::net::TcpListener;

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(validate_endpoint("127.0.0.1:7900").unwrap(), "127.0.0.1:7900");
        assert_eq!(
            validate_endpoint("tcp://node.example:7900").unwrap(),
            "node.example:7900"
        );
        assert!(validate_endpoint("https://api.example.io").is_err());
        assert!(validate_endpoint("localhost").is_err());
        assert!(validate_endpoint(":7900").is_err());
        assert!(validate_endpoint("host:99999").is_err());
    }

    /// Minimal node answering a fixed number of requests
    async fn spawn_node(requests: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let codec: RpcCodec<RpcResponse, RpcRequest> = RpcCodec::new();
            let mut framed = Framed::new(stream, codec);

            for _ in 0..requests {
                let Some(Ok(envelope)) = framed.next().await else {
                    break;
                };
                let body = match envelope.body {
                    RpcRequest::ResolveNamespace { .. } => RpcResponse::AssetId(AssetId(9)),
                    RpcRequest::AccountInfo { address } => {
                        RpcResponse::AccountInfo(AccountInfo {
                            address,
                            holdings: vec![AssetHolding {
                                asset_id: AssetId(9),
                                amount: Amount(1234),
                            }],
                        })
                    }
                    RpcRequest::TransactionStatus { .. } => {
                        RpcResponse::NotFound("hash".to_string())
                    }
                    RpcRequest::Announce(tx) => RpcResponse::Rejected {
                        hash: tx.hash,
                        reason: "Failure_Core_Insufficient_Balance".to_string(),
                    },
                    _ => RpcResponse::Error("unsupported".to_string()),
                };
                framed
                    .send(Envelope {
                        id: envelope.id,
                        body,
                    })
                    .await
                    .unwrap();
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_reads_over_tcp() {
        let addr = spawn_node(3).await;
        let client = RpcClient::new(&addr).unwrap();

        assert_eq!(client.resolve_namespace("prx.xpx").await.unwrap(), AssetId(9));

        let info = client.account_info("addr-1").await.unwrap();
        assert_eq!(info.address, "addr-1");
        assert_eq!(info.balance_of(AssetId(9)), Amount(1234));

        let hash = TxHash::digest(b"x");
        assert_eq!(
            client.transaction_status(&hash).await.unwrap(),
            TransactionStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_rejection_surfaces_reason() {
        use crate::core::{sign_transaction, TransactionBuilder};
        use crate::crypto::Account;

        let addr = spawn_node(1).await;
        let client = RpcClient::new(&addr).unwrap();

        let account = Account::generate();
        let lock = TransactionBuilder::default()
            .lock_funds(&TxHash::digest(b"agg"));
        let signed = sign_transaction(&lock, &account).unwrap();

        match client.announce(&signed).await {
            Err(LedgerError::Rejected { hash, reason }) => {
                assert_eq!(hash, signed.hash);
                assert!(reason.contains("Insufficient"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = RpcClient::new(&addr)
            .unwrap()
            .with_request_timeout(Duration::from_secs(2));
        let err = client.resolve_namespace("prx.xpx").await.unwrap_err();
        assert!(err.is_transient());
    }
}
