//! RPC transport contract consumed by the client.
//!
//! The client core only needs the generic action/get/put primitives; they
//! are expressed as a trait so the gRPC implementation and test mocks are
//! interchangeable.
//!
//! Structure:
//! - `grpc.rs`: tonic implementation over the Flight service
//! - `framing.rs`: row batch / schema conversion to wire frames

pub mod framing;
pub mod grpc;

use futures::stream::BoxStream;

use super::batch::{RowBatch, Schema};
use super::error::Result;

/// Response bodies of one action call, lazily produced.
pub type ActionStream = BoxStream<'static, Result<Vec<u8>>>;

/// Row batches of one read stream: finite, lazily produced, consumed once.
/// Dropping the stream releases the underlying transport stream.
pub type BatchStream = BoxStream<'static, Result<RowBatch>>;

/// The action/get/put primitives of the bulk-data service.
///
/// Tickets cross this boundary only in their wire representation
/// (serialized bytes); see [`crate::ticket::TicketLike`].
#[allow(async_fn_in_trait)]
pub trait FlightTransport {
    type Writer: BatchWriter;

    /// Submit a named action and return its response bodies.
    async fn do_action(&self, action: &str, body: Vec<u8>) -> Result<ActionStream>;

    /// Open the read stream associated with a serialized ticket.
    async fn do_get(&self, ticket_wire: &[u8]) -> Result<BatchStream>;

    /// Open a write stream to the descriptor derived from a serialized
    /// ticket. All batches share the given schema.
    async fn do_put(&self, descriptor: Vec<u8>, schema: Schema) -> Result<Self::Writer>;
}

/// Handle for one open write stream. Batches are written strictly in
/// order; the stream ends when the writer is closed or dropped.
#[allow(async_fn_in_trait)]
pub trait BatchWriter {
    async fn write_batch(&mut self, batch: &RowBatch, app_metadata: &[u8]) -> Result<()>;

    /// Finish the stream and surface any server-side failure.
    async fn close(self) -> Result<()>;
}
