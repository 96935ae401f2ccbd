//! Job descriptions and their wire encoding.
//!
//! Every job kind is one variant of [`JobSpec`]; encoding turns a spec into
//! an `(action, payload)` pair. Cypher jobs use a fixed binary layout,
//! everything else is a single UTF-8 JSON object.

use serde_json::{Map, Value};

use super::error::{ClientError, Result};

// Action names understood by the server.
pub(crate) const ACTION_CYPHER_READ: &str = "cypherRead";
pub(crate) const ACTION_GDS_READ: &str = "gds.read";
pub(crate) const ACTION_GDS_WRITE_NODES: &str = "gds.write.nodes";
pub(crate) const ACTION_GDS_WRITE_RELS: &str = "gds.write.relationships";
pub(crate) const ACTION_JOB_STATUS: &str = "jobStatus";
pub(crate) const ACTION_INFO: &str = "info";

/// Database targeted when a spec does not name one.
pub const DEFAULT_DATABASE: &str = "neo4j";

/// Options shared by the GDS node and relationship read jobs.
///
/// `Default` builds fresh empty sequences per call; there is no shared
/// default instance to leak state across calls.
#[derive(Debug, Clone)]
pub struct GdsReadOptions {
    pub database: String,
    pub node_id: String,
    /// Property names to stream, in order.
    pub properties: Vec<String>,
    /// Server-side filter specs, passed through opaquely.
    pub filters: Vec<Value>,
    /// Merged into the params object last: its keys override the defaults,
    /// including reserved ones such as `type`, `graph`, and `db`. This is
    /// documented behavior, kept for compatibility; do not rely on it
    /// being desirable.
    pub extra: Map<String, Value>,
}

impl Default for GdsReadOptions {
    fn default() -> Self {
        GdsReadOptions {
            database: DEFAULT_DATABASE.to_string(),
            node_id: String::new(),
            properties: Vec::new(),
            filters: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Options for the experimental k-hop job.
#[derive(Debug, Clone)]
pub struct KhopOptions {
    pub database: String,
    pub node_id: String,
    /// Field carrying the relationship type; becomes the single entry of
    /// the `properties` list.
    pub rel_property: String,
    /// Same override semantics as [`GdsReadOptions::extra`].
    pub extra: Map<String, Value>,
}

impl Default for KhopOptions {
    fn default() -> Self {
        KhopOptions {
            database: DEFAULT_DATABASE.to_string(),
            node_id: String::new(),
            rel_property: "_type_".to_string(),
            extra: Map::new(),
        }
    }
}

/// Options for GDS node write jobs.
#[derive(Debug, Clone)]
pub struct GdsWriteNodesOptions {
    pub database: String,
    pub id_field: String,
    pub labels_field: String,
}

impl Default for GdsWriteNodesOptions {
    fn default() -> Self {
        GdsWriteNodesOptions {
            database: DEFAULT_DATABASE.to_string(),
            id_field: "_node_id_".to_string(),
            labels_field: "_labels_".to_string(),
        }
    }
}

/// Options for GDS relationship write jobs.
#[derive(Debug, Clone)]
pub struct GdsWriteRelationshipsOptions {
    pub database: String,
    pub source_field: String,
    pub target_field: String,
    pub type_field: String,
}

impl Default for GdsWriteRelationshipsOptions {
    fn default() -> Self {
        GdsWriteRelationshipsOptions {
            database: DEFAULT_DATABASE.to_string(),
            source_field: "_source_id_".to_string(),
            target_field: "_target_id_".to_string(),
            type_field: "_type_".to_string(),
        }
    }
}

/// A typed description of one server-side job.
#[derive(Debug, Clone)]
pub enum JobSpec {
    /// Read the results of a Cypher query.
    Cypher {
        query: String,
        database: String,
        /// Query parameters, serialized as a JSON object.
        params: Value,
    },
    /// Stream node properties from an in-memory GDS graph.
    GdsNodes {
        graph: String,
        options: GdsReadOptions,
    },
    /// Stream relationship properties from an in-memory GDS graph.
    GdsRelationships {
        graph: String,
        options: GdsReadOptions,
    },
    /// Experimental k-hop expansion job. Submitted under the `gds.read`
    /// action, like the reads.
    Khop { graph: String, options: KhopOptions },
    /// Create nodes and node properties from an uploaded stream.
    GdsWriteNodes {
        graph: String,
        options: GdsWriteNodesOptions,
    },
    /// Create relationships and their properties from an uploaded stream.
    GdsWriteRelationships {
        graph: String,
        options: GdsWriteRelationshipsOptions,
    },
}

impl JobSpec {
    /// The action name this job is submitted under.
    pub fn action(&self) -> &'static str {
        match self {
            JobSpec::Cypher { .. } => ACTION_CYPHER_READ,
            JobSpec::GdsNodes { .. } | JobSpec::GdsRelationships { .. } | JobSpec::Khop { .. } => {
                ACTION_GDS_READ
            }
            JobSpec::GdsWriteNodes { .. } => ACTION_GDS_WRITE_NODES,
            JobSpec::GdsWriteRelationships { .. } => ACTION_GDS_WRITE_RELS,
        }
    }

    /// Produce the wire-ready request for this job.
    pub fn encode(&self) -> Result<JobRequest> {
        let payload = match self {
            JobSpec::Cypher {
                query,
                database,
                params,
            } => {
                let params_bytes = serde_json::to_vec(params)?;
                encode_cypher_message(query, database, &params_bytes)?
            }
            JobSpec::GdsNodes { graph, options } => {
                serde_json::to_vec(&gds_read_params(graph, "node", options))?
            }
            JobSpec::GdsRelationships { graph, options } => {
                serde_json::to_vec(&gds_read_params(graph, "relationship", options))?
            }
            JobSpec::Khop { graph, options } => {
                let mut params = Map::new();
                params.insert("db".into(), Value::String(options.database.clone()));
                params.insert("graph".into(), Value::String(graph.clone()));
                params.insert("node_id".into(), Value::String(options.node_id.clone()));
                params.insert("type".into(), Value::String("khop".into()));
                params.insert(
                    "properties".into(),
                    Value::Array(vec![Value::String(options.rel_property.clone())]),
                );
                params.insert("filters".into(), Value::Array(Vec::new()));
                // Extension keys win, reserved ones included.
                for (key, value) in &options.extra {
                    params.insert(key.clone(), value.clone());
                }
                serde_json::to_vec(&Value::Object(params))?
            }
            JobSpec::GdsWriteNodes { graph, options } => {
                let mut params = Map::new();
                params.insert("db".into(), Value::String(options.database.clone()));
                params.insert("graph".into(), Value::String(graph.clone()));
                params.insert("idField".into(), Value::String(options.id_field.clone()));
                params.insert(
                    "labelsField".into(),
                    Value::String(options.labels_field.clone()),
                );
                serde_json::to_vec(&Value::Object(params))?
            }
            JobSpec::GdsWriteRelationships { graph, options } => {
                let mut params = Map::new();
                params.insert("db".into(), Value::String(options.database.clone()));
                params.insert("graph".into(), Value::String(graph.clone()));
                params.insert(
                    "sourceField".into(),
                    Value::String(options.source_field.clone()),
                );
                params.insert(
                    "targetField".into(),
                    Value::String(options.target_field.clone()),
                );
                params.insert("typeField".into(), Value::String(options.type_field.clone()));
                serde_json::to_vec(&Value::Object(params))?
            }
        };

        Ok(JobRequest {
            action: self.action(),
            payload,
        })
    }
}

/// Build the params object for a GDS read job. The extension map is merged
/// last, so its keys override the defaults.
fn gds_read_params(graph: &str, entity_type: &str, options: &GdsReadOptions) -> Value {
    let mut params = Map::new();
    params.insert("db".into(), Value::String(options.database.clone()));
    params.insert("graph".into(), Value::String(graph.to_string()));
    params.insert("type".into(), Value::String(entity_type.to_string()));
    params.insert("node_id".into(), Value::String(options.node_id.clone()));
    params.insert(
        "properties".into(),
        Value::Array(
            options
                .properties
                .iter()
                .map(|p| Value::String(p.clone()))
                .collect(),
        ),
    );
    params.insert("filters".into(), Value::Array(options.filters.clone()));
    for (key, value) in &options.extra {
        params.insert(key.clone(), value.clone());
    }
    Value::Object(params)
}

/// A wire-ready request: action name plus payload bytes. Immutable once
/// encoded.
#[derive(Debug, Clone)]
pub struct JobRequest {
    action: &'static str,
    payload: Vec<u8>,
}

impl JobRequest {
    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (&'static str, Vec<u8>) {
        (self.action, self.payload)
    }
}

/// Encode the CypherMessage layout: three fields, each a big-endian `u16`
/// length immediately followed by that many raw bytes, in the order query,
/// database, params JSON. Every length is validated before any bytes are
/// packed.
pub fn encode_cypher_message(query: &str, database: &str, params_json: &[u8]) -> Result<Vec<u8>> {
    let fields: [(&'static str, &[u8]); 3] = [
        ("query", query.as_bytes()),
        ("database", database.as_bytes()),
        ("params", params_json),
    ];
    for (field, bytes) in fields {
        if bytes.len() > u16::MAX as usize {
            return Err(ClientError::FieldTooLong {
                field,
                len: bytes.len(),
            });
        }
    }

    let mut buffer = Vec::with_capacity(6 + fields.iter().map(|(_, b)| b.len()).sum::<usize>());
    for (_, bytes) in fields {
        buffer.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        buffer.extend_from_slice(bytes);
    }
    Ok(buffer)
}

/// Decode a CypherMessage back into its query, database, and params fields.
pub fn decode_cypher_message(buffer: &[u8]) -> Result<(String, String, String)> {
    let mut offset = 0;
    let mut next = |name: &str| -> Result<String> {
        let end = offset + 2;
        if buffer.len() < end {
            return Err(ClientError::Decode(format!(
                "truncated CypherMessage: missing length of `{name}`"
            )));
        }
        let len = u16::from_be_bytes([buffer[offset], buffer[offset + 1]]) as usize;
        offset = end;
        if buffer.len() < offset + len {
            return Err(ClientError::Decode(format!(
                "truncated CypherMessage: `{name}` shorter than its declared length"
            )));
        }
        let field = std::str::from_utf8(&buffer[offset..offset + len])
            .map_err(|e| ClientError::Decode(format!("`{}` is not UTF-8: {}", name, e)))?
            .to_string();
        offset += len;
        Ok(field)
    };

    let query = next("query")?;
    let database = next("database")?;
    let params = next("params")?;
    if offset != buffer.len() {
        return Err(ClientError::Decode(format!(
            "CypherMessage has {} trailing bytes",
            buffer.len() - offset
        )));
    }
    Ok((query, database, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cypher_message_layout() {
        let query = "MATCH (n) RETURN n";
        let params = serde_json::to_vec(&json!({"limit": 10})).unwrap();
        let buffer = encode_cypher_message(query, "neo4j", &params).unwrap();

        // u16 BE length of the query, then the query bytes
        assert_eq!(&buffer[..2], &(query.len() as u16).to_be_bytes());
        assert_eq!(&buffer[2..2 + query.len()], query.as_bytes());

        // then u16(5) + "neo4j"
        let mut offset = 2 + query.len();
        assert_eq!(&buffer[offset..offset + 2], &5u16.to_be_bytes());
        offset += 2;
        assert_eq!(&buffer[offset..offset + 5], b"neo4j");
        offset += 5;

        // then u16 length + the exact params JSON bytes, nothing after
        assert_eq!(
            &buffer[offset..offset + 2],
            &(params.len() as u16).to_be_bytes()
        );
        offset += 2;
        assert_eq!(&buffer[offset..], params.as_slice());
    }

    #[test]
    fn test_cypher_message_round_trip() {
        let params = serde_json::to_string(&json!({"skip": 5, "name": "Ada"})).unwrap();
        let buffer =
            encode_cypher_message("MATCH (n:Person) RETURN n.name", "movies", params.as_bytes())
                .unwrap();
        let (query, database, decoded_params) = decode_cypher_message(&buffer).unwrap();
        assert_eq!(query, "MATCH (n:Person) RETURN n.name");
        assert_eq!(database, "movies");
        assert_eq!(decoded_params, params);
    }

    #[test]
    fn test_field_over_length_limit_rejected_before_packing() {
        let long = "a".repeat(65536);
        let err = encode_cypher_message(&long, "neo4j", b"{}").unwrap_err();
        assert!(matches!(
            err,
            ClientError::FieldTooLong {
                field: "query",
                len: 65536
            }
        ));

        let err = encode_cypher_message("RETURN 1", &long, b"{}").unwrap_err();
        assert!(matches!(err, ClientError::FieldTooLong { field: "database", .. }));
    }

    #[test]
    fn test_field_at_length_limit_accepted() {
        let max = "a".repeat(65535);
        let buffer = encode_cypher_message(&max, "neo4j", b"{}").unwrap();
        let (query, _, _) = decode_cypher_message(&buffer).unwrap();
        assert_eq!(query, max);
    }

    #[test]
    fn test_truncated_message_rejected() {
        let buffer = encode_cypher_message("RETURN 1", "neo4j", b"{}").unwrap();
        assert!(decode_cypher_message(&buffer[..buffer.len() - 1]).is_err());
        assert!(decode_cypher_message(&buffer[..3]).is_err());
    }

    fn params_of(spec: &JobSpec) -> Value {
        let request = spec.encode().unwrap();
        serde_json::from_slice(request.payload()).unwrap()
    }

    #[test]
    fn test_gds_nodes_defaults() {
        let spec = JobSpec::GdsNodes {
            graph: "mygraph".into(),
            options: GdsReadOptions::default(),
        };
        assert_eq!(spec.action(), "gds.read");
        let params = params_of(&spec);
        assert_eq!(params["db"], "neo4j");
        assert_eq!(params["graph"], "mygraph");
        assert_eq!(params["type"], "node");
        assert_eq!(params["node_id"], "");
        assert_eq!(params["properties"], json!([]));
        assert_eq!(params["filters"], json!([]));
    }

    #[test]
    fn test_gds_relationships_type() {
        let spec = JobSpec::GdsRelationships {
            graph: "g".into(),
            options: GdsReadOptions {
                properties: vec!["weight".into()],
                ..Default::default()
            },
        };
        let params = params_of(&spec);
        assert_eq!(params["type"], "relationship");
        assert_eq!(params["properties"], json!(["weight"]));
    }

    #[test]
    fn test_extension_map_overrides_reserved_keys() {
        let mut extra = Map::new();
        extra.insert("type".into(), json!("relationship"));
        extra.insert("concurrency".into(), json!(4));
        let spec = JobSpec::GdsNodes {
            graph: "g".into(),
            options: GdsReadOptions {
                extra,
                ..Default::default()
            },
        };
        let params = params_of(&spec);
        assert_eq!(params["type"], "relationship");
        assert_eq!(params["concurrency"], 4);
    }

    #[test]
    fn test_khop_shape() {
        let spec = JobSpec::Khop {
            graph: "g".into(),
            options: KhopOptions::default(),
        };
        assert_eq!(spec.action(), "gds.read");
        let params = params_of(&spec);
        assert_eq!(params["type"], "khop");
        assert_eq!(params["properties"], json!(["_type_"]));
        assert_eq!(params["filters"], json!([]));
    }

    #[test]
    fn test_khop_extension_override() {
        let mut extra = Map::new();
        extra.insert("graph".into(), json!("other"));
        let spec = JobSpec::Khop {
            graph: "g".into(),
            options: KhopOptions {
                extra,
                ..Default::default()
            },
        };
        assert_eq!(params_of(&spec)["graph"], "other");
    }

    #[test]
    fn test_gds_write_nodes_payload() {
        let spec = JobSpec::GdsWriteNodes {
            graph: "g".into(),
            options: GdsWriteNodesOptions::default(),
        };
        assert_eq!(spec.action(), "gds.write.nodes");
        let params = params_of(&spec);
        assert_eq!(
            params,
            json!({
                "db": "neo4j",
                "graph": "g",
                "idField": "_node_id_",
                "labelsField": "_labels_",
            })
        );
    }

    #[test]
    fn test_gds_write_relationships_payload() {
        let spec = JobSpec::GdsWriteRelationships {
            graph: "g".into(),
            options: GdsWriteRelationshipsOptions::default(),
        };
        assert_eq!(spec.action(), "gds.write.relationships");
        let params = params_of(&spec);
        assert_eq!(
            params,
            json!({
                "db": "neo4j",
                "graph": "g",
                "sourceField": "_source_id_",
                "targetField": "_target_id_",
                "typeField": "_type_",
            })
        );
    }
}
