//! Client for the Neo4j Arrow bulk-data service.
//!
//! Callers submit a job description, receive an opaque ticket, poll job
//! status until data is ready, then stream row batches in or out keyed by
//! that ticket.
//!
//! Module organization:
//! - `job`: typed job descriptions and their wire encoding
//! - `status`: the job status state machine
//! - `ticket`: opaque ticket tokens and their normalization
//! - `batch`: the tabular data model and transfer accounting
//! - `transport`: the RPC contract and its gRPC implementation
//! - `client`: the client tying submission, polling, and streaming together

pub mod batch;
pub mod client;
pub mod error;
pub mod job;
pub mod status;
pub mod ticket;
pub mod transport;

// Re-exports for convenience
pub use batch::{Column, DataType, Field, RowBatch, Schema, Table, TransferResult};
pub use client::{Neo4jArrowClient, POLL_INTERVAL, PUT_CHUNK_SIZE};
pub use error::{ClientError, Result};
pub use job::{
    GdsReadOptions, GdsWriteNodesOptions, GdsWriteRelationshipsOptions, JobSpec, KhopOptions,
    DEFAULT_DATABASE,
};
pub use status::JobStatus;
pub use ticket::{Ticket, TicketLike};
pub use transport::grpc::{BasicAuth, FlightGrpcTransport};
pub use transport::{BatchStream, BatchWriter, FlightTransport};
