//! NetworkSink - request/response calls over TCP
//!
//! Every call opens a connection, writes one length-prefixed request frame
//! (u32 big-endian length, then the payload) and reads one reply frame.

use bytes::{BufMut, BytesMut};
use contracts::{BatchSink, CallId, CancellationToken, ContractError, LogDigest, WorkItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

/// Serialization format for frame payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Remote endpoint
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Largest reply frame accepted
    pub max_frame_size: usize,
    /// Bound on one complete call (connect, request, reply)
    pub timeout: Duration,
    /// Application id sent with every request
    pub app_id: String,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>, app_id: &str) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_frame_size = params
            .get("max_frame_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(16 * 1024 * 1024);

        let timeout = params
            .get("timeout_secs")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            addr,
            format,
            max_frame_size,
            timeout,
            app_id: app_id.to_string(),
        })
    }
}

/// Request frame payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub app_id: String,
    pub recipients: Vec<String>,
    pub digests: Vec<LogDigest>,
    pub log_ids: Vec<String>,
}

/// Reply frame payload: exactly one of `call_id` / `error` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReply {
    pub call_id: Option<String>,
    pub error: Option<String>,
}

/// Encode a payload into a length-prefixed frame
pub fn encode_frame<T: Serialize>(format: NetworkFormat, value: &T) -> Result<BytesMut, String> {
    let payload = match format {
        NetworkFormat::Json => serde_json::to_vec(value).map_err(|e| format!("json error: {}", e))?,
        NetworkFormat::Bincode => {
            bincode::serialize(value).map_err(|e| format!("bincode error: {}", e))?
        }
    };
    let len = u32::try_from(payload.len()).map_err(|_| "frame too large".to_string())?;

    let mut frame = BytesMut::with_capacity(4 + payload.len());
    frame.put_u32(len);
    frame.put_slice(&payload);
    Ok(frame)
}

/// Decode a frame payload (without the length prefix)
pub fn decode_payload<T: for<'de> Deserialize<'de>>(
    format: NetworkFormat,
    payload: &[u8],
) -> Result<T, String> {
    match format {
        NetworkFormat::Json => {
            serde_json::from_slice(payload).map_err(|e| format!("json error: {}", e))
        }
        NetworkFormat::Bincode => {
            bincode::deserialize(payload).map_err(|e| format!("bincode error: {}", e))
        }
    }
}

/// Read one length-prefixed frame, rejecting frames over `max_len`
pub async fn read_frame(stream: &mut TcpStream, max_len: usize) -> std::io::Result<Vec<u8>> {
    let len = stream.read_u32().await? as usize;
    if len > max_len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit of {max_len}"),
        ));
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Sink that calls a remote endpoint over TCP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
}

impl NetworkSink {
    /// Create a new NetworkSink
    pub fn new(name: impl Into<String>, config: NetworkSinkConfig) -> Self {
        let name = name.into();
        debug!(
            sink = %name,
            target = %config.addr,
            format = ?config.format,
            "NetworkSink configured"
        );
        Self { name, config }
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
        app_id: &str,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params, app_id)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Ok(Self::new(name, config))
    }

    fn build_request(&self, chunk: &[WorkItem]) -> CallRequest {
        CallRequest {
            app_id: self.config.app_id.clone(),
            recipients: chunk.iter().map(|item| item.recipient.clone()).collect(),
            digests: chunk.iter().map(|item| item.digest).collect(),
            log_ids: chunk.iter().map(|item| item.log_id.clone()).collect(),
        }
    }

    async fn exchange(&self, request: &CallRequest) -> Result<CallId, ContractError> {
        let frame = encode_frame(self.config.format, request)
            .map_err(|e| ContractError::sink_call(&self.name, e))?;

        let mut stream = TcpStream::connect(self.config.addr)
            .await
            .map_err(|e| ContractError::sink_connection(&self.name, e.to_string()))?;

        stream
            .write_all(&frame)
            .await
            .map_err(|e| ContractError::sink_connection(&self.name, e.to_string()))?;

        let payload = read_frame(&mut stream, self.config.max_frame_size)
            .await
            .map_err(|e| ContractError::sink_connection(&self.name, e.to_string()))?;

        let reply: CallReply = decode_payload(self.config.format, &payload)
            .map_err(|e| ContractError::sink_call(&self.name, e))?;

        match (reply.call_id, reply.error) {
            (_, Some(error)) => Err(ContractError::sink_call(&self.name, error)),
            (Some(call_id), None) => Ok(CallId::from(call_id)),
            (None, None) => Err(ContractError::sink_call(
                &self.name,
                "reply carries neither call_id nor error",
            )),
        }
    }
}

impl BatchSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_call",
        skip(self, chunk, cancel),
        fields(sink = %self.name, chunk_len = chunk.len())
    )]
    async fn call(
        &self,
        chunk: &[WorkItem],
        cancel: &CancellationToken,
    ) -> Result<CallId, ContractError> {
        let request = self.build_request(chunk);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(sink = %self.name, "Call cancelled, remote outcome unknown");
                Err(ContractError::cancelled(&self.name))
            }
            outcome = tokio::time::timeout(self.config.timeout, self.exchange(&request)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(ContractError::sink_call(
                        &self.name,
                        format!("call timed out after {:?}", self.config.timeout),
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn item(id: &str) -> WorkItem {
        WorkItem {
            recipient: "0xabc".to_string(),
            digest: LogDigest::from_log_id(id).unwrap(),
            log_id: id.to_string(),
            timestamp: None,
        }
    }

    async fn serve_once(
        format: NetworkFormat,
        reply: CallReply,
    ) -> (SocketAddr, tokio::task::JoinHandle<CallRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let payload = read_frame(&mut stream, 1 << 20).await.unwrap();
            let request: CallRequest = decode_payload(format, &payload).unwrap();
            let frame = encode_frame(format, &reply).unwrap();
            stream.write_all(&frame).await.unwrap();
            request
        });
        (addr, handle)
    }

    fn config(addr: SocketAddr, format: NetworkFormat) -> NetworkSinkConfig {
        NetworkSinkConfig {
            addr,
            format,
            max_frame_size: 1 << 20,
            timeout: Duration::from_secs(5),
            app_id: "Klok".to_string(),
        }
    }

    #[tokio::test]
    async fn test_network_sink_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "bincode".to_string());

        let config = NetworkSinkConfig::from_params(&params, "Klok").unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, NetworkFormat::Bincode);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_network_sink_config_rejects_missing_addr() {
        assert!(NetworkSinkConfig::from_params(&HashMap::new(), "Klok").is_err());
    }

    #[tokio::test]
    async fn test_network_sink_json_round_trip_with_server() {
        let reply = CallReply {
            call_id: Some("0xfeed".to_string()),
            error: None,
        };
        let (addr, server) = serve_once(NetworkFormat::Json, reply).await;

        let sink = NetworkSink::new("net", config(addr, NetworkFormat::Json));
        let cancel = CancellationToken::new();
        let id = sink.call(&[item("a"), item("b")], &cancel).await.unwrap();
        assert_eq!(id.as_str(), "0xfeed");

        let request = server.await.unwrap();
        assert_eq!(request.log_ids, vec!["a", "b"]);
        assert_eq!(request.app_id, "Klok");
    }

    #[tokio::test]
    async fn test_network_sink_bincode_remote_rejection() {
        let reply = CallReply {
            call_id: None,
            error: Some("execution reverted".to_string()),
        };
        let (addr, server) = serve_once(NetworkFormat::Bincode, reply).await;

        let sink = NetworkSink::new("net", config(addr, NetworkFormat::Bincode));
        let cancel = CancellationToken::new();
        let err = sink.call(&[item("a")], &cancel).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkCall { .. }));
        assert!(err.to_string().contains("execution reverted"));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_network_sink_cancelled_while_waiting_for_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept but never reply
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let sink = NetworkSink::new("net", config(addr, NetworkFormat::Json));
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = sink.call(&[item("a")], &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        server.abort();
    }
}
