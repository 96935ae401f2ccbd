use thiserror::Error;

/// Errors that can occur when talking to a Neo4j Arrow service
#[derive(Debug, Error)]
pub enum ClientError {
    /// gRPC call failed
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    /// gRPC transport error
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Configuration error (missing env vars, invalid URIs, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A CypherMessage field does not fit its 16-bit length prefix.
    /// Raised before any bytes are packed.
    #[error("Field `{field}` is {len} bytes, exceeds the 65535 byte limit")]
    FieldTooLong { field: &'static str, len: usize },

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server reported a job status string this client does not know
    #[error("Unrecognized job status `{0}`")]
    UnknownStatus(String),

    /// Ticket bytes did not decode as a serialized ticket
    #[error("Malformed ticket: {0}")]
    MalformedTicket(#[from] prost::DecodeError),

    /// An action produced no response messages
    #[error("Empty response to action `{0}`")]
    EmptyActionResponse(String),

    /// A stream frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A batch or table failed construction-time validation
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Type alias for Results using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;
