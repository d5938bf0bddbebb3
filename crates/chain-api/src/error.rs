use thiserror::Error;

/// Failures reported by a chain adapter or fee estimator.
///
/// The variants mirror the wallet-level taxonomy so that the orchestration
/// layer can translate them without inspecting message text.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("token id is required for this token standard")]
    MissingTokenId,

    #[error("partition is required for partitioned token transfers")]
    MissingPartition,

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("network timeout: {0}")]
    NetworkTimeout(String),

    /// The node refused the transaction. Carries the node's own reason.
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transaction build failed: {0}")]
    Build(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("malformed data: {0}")]
    Decode(String),
}

/// Failures talking to a node endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    /// A JSON-RPC error object, verbatim.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => ChainError::NetworkTimeout(msg),
            TransportError::Decode(msg) => ChainError::Decode(msg),
            other => ChainError::Transport(other.to_string()),
        }
    }
}

impl TransportError {
    /// Converts a transport failure during a broadcast call.
    ///
    /// Rejections the node reports (RPC error objects, 4xx bodies) keep the
    /// node's message verbatim; anything mentioning insufficient balance is
    /// classified as such by the node's own wording.
    pub fn into_broadcast_error(self) -> ChainError {
        let reason = match self {
            TransportError::Rpc { message, .. } => message,
            TransportError::Http { status, body } if (400..500).contains(&status) => body,
            other => return other.into(),
        };
        if is_insufficient_funds(&reason) {
            ChainError::InsufficientFunds(reason)
        } else {
            ChainError::BroadcastRejected(reason)
        }
    }
}

/// Recognizes the node wording for an underfunded sender.
pub fn is_insufficient_funds(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    lower.contains("insufficient funds")
        || lower.contains("insufficient balance")
        || lower.contains("insufficientfunds")
        || lower.contains("notenoughbalance")
        || lower.contains("tecunfunded")
        || lower.contains("insufficient fee")
}
