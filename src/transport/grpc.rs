//! tonic implementation of the transport contract.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::StreamExt;
use prost::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig};
use tonic::{Request, Status};

use super::framing;
use super::{ActionStream, BatchStream, BatchWriter, FlightTransport};
use crate::batch::{RowBatch, Schema};
use crate::error::{ClientError, Result};

// Include the generated protobuf code
#[allow(dead_code, unused_imports, clippy::enum_variant_names)]
pub mod proto {
    tonic::include_proto!("arrow.flight.protocol");
}

use proto::flight_service_client::FlightServiceClient;

/// Type alias for the authenticated Flight service client
pub type AuthFlightServiceClient =
    FlightServiceClient<tonic::service::interceptor::InterceptedService<Channel, AuthInterceptor>>;

const ENV_HOST: &str = "NEO4J_ARROW_HOST";
const ENV_PORT: &str = "NEO4J_ARROW_PORT";
const ENV_TLS: &str = "NEO4J_ARROW_TLS";
const ENV_USER: &str = "NEO4J_ARROW_USER";
const ENV_PASSWORD: &str = "NEO4J_ARROW_PASSWORD";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: &str = "9999";

/// Basic-auth credentials for the service.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        BasicAuth {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Interceptor that adds basic authorization to all requests.
///
/// Built once at connect time and shared read-only across every call made
/// through the transport.
#[derive(Clone, Debug)]
pub struct AuthInterceptor {
    header: MetadataValue<tonic::metadata::Ascii>,
}

impl AuthInterceptor {
    fn new(auth: &BasicAuth) -> Result<Self> {
        let token = BASE64.encode(format!("{}:{}", auth.user, auth.password));
        let header = format!("Basic {}", token)
            .parse()
            .map_err(|e| ClientError::Auth(format!("Invalid credentials: {}", e)))?;

        Ok(AuthInterceptor { header })
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert("authorization", self.header.clone());
        Ok(request)
    }
}

/// gRPC transport to one Flight endpoint.
#[derive(Debug)]
pub struct FlightGrpcTransport {
    channel: Channel,
    interceptor: AuthInterceptor,
}

impl FlightGrpcTransport {
    /// Connect to the given endpoint. TLS is configured for `https://`
    /// endpoints only.
    pub async fn connect(endpoint: impl Into<String>, auth: BasicAuth) -> Result<Self> {
        let endpoint = endpoint.into();
        let use_tls = endpoint.starts_with("https://");

        let mut channel_builder = Channel::from_shared(endpoint.clone())
            .map_err(|e| ClientError::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        if use_tls {
            let tls = ClientTlsConfig::new();
            channel_builder = channel_builder.tls_config(tls).map_err(|e| {
                ClientError::Config(format!("Failed to configure TLS for '{}': {}", endpoint, e))
            })?;
        }

        let channel = channel_builder.connect().await.map_err(|e| {
            ClientError::Connection(format!("Failed to connect to '{}': {}", endpoint, e))
        })?;

        let interceptor = AuthInterceptor::new(&auth)?;
        Ok(FlightGrpcTransport {
            channel,
            interceptor,
        })
    }

    /// Connect using environment variables.
    ///
    /// `NEO4J_ARROW_USER` and `NEO4J_ARROW_PASSWORD` are required;
    /// `NEO4J_ARROW_HOST` (default `localhost`), `NEO4J_ARROW_PORT`
    /// (default `9999`), and `NEO4J_ARROW_TLS` are optional.
    pub async fn from_env() -> Result<Self> {
        let host = std::env::var(ENV_HOST).unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = std::env::var(ENV_PORT).unwrap_or_else(|_| DEFAULT_PORT.to_string());
        let tls = std::env::var(ENV_TLS)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let user = std::env::var(ENV_USER).map_err(|_| {
            ClientError::Config(format!("{} environment variable not set", ENV_USER))
        })?;
        let password = std::env::var(ENV_PASSWORD).map_err(|_| {
            ClientError::Config(format!("{} environment variable not set", ENV_PASSWORD))
        })?;

        let scheme = if tls { "https" } else { "http" };
        Self::connect(
            format!("{}://{}:{}", scheme, host, port),
            BasicAuth::new(user, password),
        )
        .await
    }

    /// Get an authenticated Flight client over the shared channel.
    fn flight_client(&self) -> AuthFlightServiceClient {
        FlightServiceClient::with_interceptor(self.channel.clone(), self.interceptor.clone())
    }

    /// List all actions available on the server.
    pub async fn list_actions(&self) -> Result<Vec<proto::ActionType>> {
        let mut client = self.flight_client();
        let mut stream = client
            .list_actions(Request::new(proto::Empty {}))
            .await?
            .into_inner();

        let mut actions = Vec::new();
        while let Some(action) = stream.message().await? {
            actions.push(action);
        }
        Ok(actions)
    }

    /// List all known flights. (No filtering support yet.)
    pub async fn list_flights(&self) -> Result<Vec<proto::FlightInfo>> {
        let mut client = self.flight_client();
        let mut stream = client
            .list_flights(Request::new(proto::Criteria::default()))
            .await?
            .into_inner();

        let mut flights = Vec::new();
        while let Some(flight) = stream.message().await? {
            flights.push(flight);
        }
        Ok(flights)
    }
}

impl FlightTransport for FlightGrpcTransport {
    type Writer = GrpcBatchWriter;

    async fn do_action(&self, action: &str, body: Vec<u8>) -> Result<ActionStream> {
        let mut client = self.flight_client();
        let request = Request::new(proto::Action {
            r#type: action.to_string(),
            body,
        });
        let stream = client.do_action(request).await?.into_inner();
        Ok(stream
            .map(|result| match result {
                Ok(result) => Ok(result.body),
                Err(status) => Err(ClientError::from(status)),
            })
            .boxed())
    }

    async fn do_get(&self, ticket_wire: &[u8]) -> Result<BatchStream> {
        let ticket = proto::Ticket::decode(ticket_wire)?;
        let mut client = self.flight_client();
        let mut stream = client.do_get(Request::new(ticket)).await?.into_inner();

        // The stream opens with a schema frame covering every batch after it.
        let first = stream.message().await?.ok_or_else(|| {
            ClientError::Decode("read stream ended before a schema frame".into())
        })?;
        let schema = framing::decode_schema(&first)?;

        Ok(stream
            .map(move |frame| match frame {
                Ok(frame) => framing::decode_batch(&schema, &frame),
                Err(status) => Err(ClientError::from(status)),
            })
            .boxed())
    }

    async fn do_put(&self, descriptor: Vec<u8>, schema: Schema) -> Result<GrpcBatchWriter> {
        let (tx, rx) = mpsc::channel(16);
        tx.send(framing::schema_frame(Some(descriptor), &schema)?)
            .await
            .map_err(|_| ClientError::Other("put stream closed before opening".into()))?;

        // tonic pulls the request stream, so the call runs on its own task
        // while the writer pushes frames through the channel.
        let mut client = self.flight_client();
        let handle =
            tokio::spawn(async move { client.do_put(ReceiverStream::new(rx)).await });

        Ok(GrpcBatchWriter { tx, handle })
    }
}

/// One open put stream. Dropping the writer closes the channel and with it
/// the request stream, so the transport stream is released on every exit
/// path.
pub struct GrpcBatchWriter {
    tx: mpsc::Sender<proto::FlightData>,
    handle: JoinHandle<std::result::Result<tonic::Response<tonic::Streaming<proto::PutResult>>, Status>>,
}

impl BatchWriter for GrpcBatchWriter {
    async fn write_batch(&mut self, batch: &RowBatch, app_metadata: &[u8]) -> Result<()> {
        self.tx
            .send(framing::batch_frame(batch, app_metadata))
            .await
            .map_err(|_| ClientError::Other("put stream closed by the server".into()))
    }

    async fn close(self) -> Result<()> {
        drop(self.tx);
        let response = self
            .handle
            .await
            .map_err(|e| ClientError::Other(format!("put task failed: {}", e)))??;

        // Drain acknowledgements so server-side failures surface here.
        let mut results = response.into_inner();
        while results.message().await?.is_some() {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interceptor_sets_basic_auth_header() {
        let mut interceptor =
            AuthInterceptor::new(&BasicAuth::new("user", "pass")).unwrap();
        let request = interceptor.call(Request::new(())).unwrap();
        let header = request.metadata().get("authorization").unwrap();
        // base64("user:pass")
        assert_eq!(header.to_str().unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_invalid_endpoint_is_a_config_error() {
        let result = tokio::runtime::Runtime::new().unwrap().block_on(
            FlightGrpcTransport::connect("not a uri", BasicAuth::new("u", "p")),
        );
        assert!(matches!(result.unwrap_err(), ClientError::Config(_)));
    }
}
