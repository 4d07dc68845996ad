//! Sink implementations
//!
//! Contains LogSink, FileSink, NetworkSink and the `AnySink` wrapper built
//! from configuration.

mod file;
mod log;
mod network;

pub use self::file::{FileSink, FileSinkConfig, LedgerEntry};
pub use self::log::LogSink;
pub use self::network::{
    decode_payload, encode_frame, read_frame, CallReply, CallRequest, NetworkFormat, NetworkSink,
    NetworkSinkConfig,
};

use contracts::{BatchSink, CallId, CancellationToken, ContractError, WorkItem};

/// Any configured sink
pub enum AnySink {
    Log(LogSink),
    File(FileSink),
    Network(NetworkSink),
}

impl BatchSink for AnySink {
    fn name(&self) -> &str {
        match self {
            Self::Log(sink) => sink.name(),
            Self::File(sink) => sink.name(),
            Self::Network(sink) => sink.name(),
        }
    }

    async fn call(
        &self,
        chunk: &[WorkItem],
        cancel: &CancellationToken,
    ) -> Result<CallId, ContractError> {
        match self {
            Self::Log(sink) => sink.call(chunk, cancel).await,
            Self::File(sink) => sink.call(chunk, cancel).await,
            Self::Network(sink) => sink.call(chunk, cancel).await,
        }
    }
}
