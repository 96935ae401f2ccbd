//! Client for the Neo4j Arrow bulk-data service.
//!
//! One logical thread of control per call: submit a job, poll its status,
//! then stream batches in or out under the returned ticket. The only
//! suspension point is the bounded status poll.

use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::time::{sleep, Instant};

use super::batch::{RowBatch, Schema, Table, TransferResult};
use super::error::{ClientError, Result};
use super::job::{
    GdsReadOptions, GdsWriteNodesOptions, GdsWriteRelationshipsOptions, JobSpec, KhopOptions,
    ACTION_INFO, ACTION_JOB_STATUS,
};
use super::status::JobStatus;
use super::ticket::{Ticket, TicketLike};
use super::transport::grpc::{BasicAuth, FlightGrpcTransport};
use super::transport::{BatchStream, BatchWriter, FlightTransport};

/// Rows per chunk when writing a whole table.
pub const PUT_CHUNK_SIZE: usize = 8192;

/// Fixed delay between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A client for interacting with a remote Neo4j Arrow service. Useful for
/// working with large datasets, retrieving bulk data, and async batch jobs.
pub struct Neo4jArrowClient<T> {
    transport: T,
}

impl Neo4jArrowClient<FlightGrpcTransport> {
    /// Connect over gRPC with basic authentication.
    pub async fn connect(endpoint: impl Into<String>, auth: BasicAuth) -> Result<Self> {
        Ok(Self::new(FlightGrpcTransport::connect(endpoint, auth).await?))
    }

    /// Connect using the `NEO4J_ARROW_*` environment variables.
    pub async fn from_env() -> Result<Self> {
        Ok(Self::new(FlightGrpcTransport::from_env().await?))
    }
}

impl<T: FlightTransport> Neo4jArrowClient<T> {
    pub fn new(transport: T) -> Self {
        Neo4jArrowClient { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit an action and read exactly its first response body.
    async fn first_action_body(&self, action: &'static str, payload: Vec<u8>) -> Result<Vec<u8>> {
        let mut results = self.transport.do_action(action, payload).await?;
        match results.next().await {
            Some(body) => body,
            None => Err(ClientError::EmptyActionResponse(action.to_string())),
        }
    }

    /// Get info on the server: a JSON capability document, opaque beyond
    /// the top-level decode.
    pub async fn info(&self) -> Result<Value> {
        let body = self.first_action_body(ACTION_INFO, Vec::new()).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Attempt to ticket the given job.
    pub async fn submit(&self, job: &JobSpec) -> Result<Ticket> {
        let (action, payload) = job.encode()?.into_parts();
        let body = self.first_action_body(action, payload).await?;
        Ticket::deserialize(&body)
    }

    /// Submit a Cypher job with optional parameters. Returns a ticket.
    pub async fn cypher(
        &self,
        query: impl Into<String>,
        database: impl Into<String>,
        params: Value,
    ) -> Result<Ticket> {
        self.submit(&JobSpec::Cypher {
            query: query.into(),
            database: database.into(),
            params,
        })
        .await
    }

    /// Submit a GDS job for streaming node properties. Returns a ticket.
    pub async fn gds_nodes(
        &self,
        graph: impl Into<String>,
        options: GdsReadOptions,
    ) -> Result<Ticket> {
        self.submit(&JobSpec::GdsNodes {
            graph: graph.into(),
            options,
        })
        .await
    }

    /// Submit a GDS job for streaming relationship properties. Returns a
    /// ticket.
    pub async fn gds_relationships(
        &self,
        graph: impl Into<String>,
        options: GdsReadOptions,
    ) -> Result<Ticket> {
        self.submit(&JobSpec::GdsRelationships {
            graph: graph.into(),
            options,
        })
        .await
    }

    /// Experimental k-hop job support.
    pub async fn khop(&self, graph: impl Into<String>, options: KhopOptions) -> Result<Ticket> {
        self.submit(&JobSpec::Khop {
            graph: graph.into(),
            options,
        })
        .await
    }

    /// Submit a GDS write job for creating nodes and node properties.
    pub async fn gds_write_nodes(
        &self,
        graph: impl Into<String>,
        options: GdsWriteNodesOptions,
    ) -> Result<Ticket> {
        self.submit(&JobSpec::GdsWriteNodes {
            graph: graph.into(),
            options,
        })
        .await
    }

    /// Submit a GDS write job for creating relationships and their
    /// properties.
    pub async fn gds_write_relationships(
        &self,
        graph: impl Into<String>,
        options: GdsWriteRelationshipsOptions,
    ) -> Result<Ticket> {
        self.submit(&JobSpec::GdsWriteRelationships {
            graph: graph.into(),
            options,
        })
        .await
    }

    /// Check job status for a ticket.
    pub async fn status(&self, ticket: impl TicketLike) -> Result<JobStatus> {
        self.status_wire(&ticket.to_wire()).await
    }

    async fn status_wire(&self, wire: &[u8]) -> Result<JobStatus> {
        let body = self
            .first_action_body(ACTION_JOB_STATUS, wire.to_vec())
            .await?;
        let text = String::from_utf8(body)
            .map_err(|e| ClientError::Decode(format!("status body is not UTF-8: {}", e)))?;
        JobStatus::from_wire(&text)
    }

    /// Block until the job reaches `target`, polling once per second.
    ///
    /// Returns `false` when the budget runs out, never an error: a status
    /// query failure usually means the job is not registered on the server
    /// yet, so it is logged and retried instead of aborting the wait. The
    /// wait does not fast-fail when the job reaches `ERROR`; callers who
    /// want that check [`status`](Self::status) themselves.
    pub async fn wait_for_job(
        &self,
        ticket: impl TicketLike,
        target: JobStatus,
        timeout: Duration,
    ) -> bool {
        self.wait_for_wire(&ticket.to_wire(), target, timeout).await
    }

    async fn wait_for_wire(&self, wire: &[u8], target: JobStatus, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match self.status_wire(wire).await {
                Ok(status) if status == target => return true,
                Ok(_) => {}
                Err(e) => eprintln!("no job (yet?): {}", e),
            }
            sleep(POLL_INTERVAL).await;
        }
        false
    }

    /// Read the stream associated with the given ticket.
    ///
    /// Waits up to `timeout` for the job to start producing, as pacing
    /// only: a timed-out wait does not abort the read. The stream is
    /// finite, lazily produced, and consumed once; a second read against
    /// the same ticket is a new request and is not guaranteed to return
    /// the same data.
    pub async fn stream(&self, ticket: impl TicketLike, timeout: Duration) -> Result<BatchStream> {
        let wire = ticket.to_wire();
        self.wait_for_wire(&wire, JobStatus::Producing, timeout).await;
        self.transport.do_get(&wire).await
    }

    /// Write a whole table to the server in 8192-row chunks.
    ///
    /// The returned accounting comes from the input table's own row and
    /// byte counts. Failures propagate; they are never collapsed into a
    /// zero-valued result.
    pub async fn put_stream(&self, ticket: impl TicketLike, table: &Table) -> Result<TransferResult> {
        let mut writer = self
            .transport
            .do_put(ticket.to_wire(), table.schema().clone())
            .await?;
        for batch in table.chunks(PUT_CHUNK_SIZE) {
            // On error the writer is dropped here, closing the stream.
            writer.write_batch(&batch, &[]).await?;
        }
        writer.close().await?;

        Ok(TransferResult {
            rows: table.num_rows() as u64,
            bytes: table.byte_size() as u64,
        })
    }

    /// Write a stream using a batch producer.
    ///
    /// Every `(batch, metadata)` pair shares `schema` and is written in
    /// order. Like whole-table mode, the result counts rows and bytes.
    pub async fn put_stream_batches<S>(
        &self,
        ticket: impl TicketLike,
        schema: Schema,
        batches: S,
    ) -> Result<TransferResult>
    where
        S: Stream<Item = (RowBatch, Vec<u8>)>,
    {
        let mut writer = self.transport.do_put(ticket.to_wire(), schema).await?;

        futures::pin_mut!(batches);
        let mut result = TransferResult::default();
        let mut count = 0u64;
        while let Some((batch, metadata)) = batches.next().await {
            writer.write_batch(&batch, &metadata).await?;
            result.rows += batch.num_rows() as u64;
            result.bytes += batch.byte_size() as u64;
            count += 1;
        }
        writer.close().await?;

        eprintln!("wrote {} batches, {} bytes", count, result.bytes);
        Ok(result)
    }
}
