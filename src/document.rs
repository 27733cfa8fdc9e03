//! JSON configuration document model
//!
//! Parses raw text into the validated in-memory shape
//! `{ "mcpServers": { name: { command, args, env? } } }` and serializes it
//! back to pretty-printed JSON for human-editable round trips. Leaf
//! dependency of the store and the synchronization engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::client::SERVERS_KEY;
use crate::error::{EngineError, EngineResult};

/// One server invocation: command, arguments, optional environment.
///
/// Structural shape only; whether the command actually exists or the
/// arguments make sense is the client's problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// Validated configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub servers: BTreeMap<String, ServerSpec>,
    normalized: bool,
}

impl Document {
    /// Document with an empty server map.
    pub fn empty() -> Self {
        Document {
            servers: BTreeMap::new(),
            normalized: false,
        }
    }

    pub fn from_servers(servers: BTreeMap<String, ServerSpec>) -> Self {
        Document {
            servers,
            normalized: false,
        }
    }

    /// True iff the server map has zero entries.
    pub fn is_effectively_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// True when `parse` had to substitute an empty map for a missing or
    /// non-object server-map field.
    pub fn was_normalized(&self) -> bool {
        self.normalized
    }
}

/// Serialized form. Only recognized fields go over this shape.
#[derive(Serialize)]
struct Wire<'a> {
    #[serde(rename = "mcpServers")]
    servers: &'a BTreeMap<String, ServerSpec>,
}

/// Parse raw text into a [`Document`].
///
/// Fails when the text is not valid JSON, when the top-level value is not an
/// object, or when a server entry is structurally malformed. A missing or
/// non-object `mcpServers` field does not fail: the map is normalized to
/// empty and the document is flagged, so callers can decide whether that is
/// notable.
pub fn parse(text: &str) -> EngineResult<Document> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| EngineError::Parse(e.to_string()))?;

    let Value::Object(mut top) = value else {
        return Err(EngineError::Parse(
            "top-level value is not an object".to_string(),
        ));
    };

    match top.remove(SERVERS_KEY) {
        Some(Value::Object(raw)) => {
            let mut servers = BTreeMap::new();
            for (name, spec) in raw {
                let spec: ServerSpec = serde_json::from_value(spec)
                    .map_err(|e| EngineError::Parse(format!("server '{name}': {e}")))?;
                servers.insert(name, spec);
            }
            Ok(Document {
                servers,
                normalized: false,
            })
        }
        // Absent or wrong-typed server map: normalize to empty rather than fail.
        Some(_) | None => Ok(Document {
            servers: BTreeMap::new(),
            normalized: true,
        }),
    }
}

/// Serialize a [`Document`] to pretty-printed JSON.
///
/// The server-map field is always present (an empty object when there are no
/// servers). Only recognized fields are emitted; top-level keys the parser
/// does not model are dropped.
pub fn serialize(doc: &Document) -> EngineResult<String> {
    serde_json::to_string_pretty(&Wire {
        servers: &doc.servers,
    })
    .map_err(|e| EngineError::Internal(format!("serialize failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(command: &str, args: &[&str]) -> ServerSpec {
        ServerSpec {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: None,
        }
    }

    #[test]
    fn test_parse_basic() {
        let doc = parse(r#"{"mcpServers":{"files":{"command":"npx","args":["-y","files"]}}}"#)
            .unwrap();
        assert_eq!(doc.servers.len(), 1);
        assert_eq!(doc.servers["files"], spec("npx", &["-y", "files"]));
        assert!(!doc.was_normalized());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse("not json").unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn test_parse_top_level_not_object() {
        let err = parse(r#"["mcpServers"]"#).unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn test_parse_missing_server_map_normalizes() {
        let doc = parse(r#"{"somethingElse": 1}"#).unwrap();
        assert!(doc.is_effectively_empty());
        assert!(doc.was_normalized());
    }

    #[test]
    fn test_parse_non_object_server_map_normalizes() {
        let doc = parse(r#"{"mcpServers": "oops"}"#).unwrap();
        assert!(doc.is_effectively_empty());
        assert!(doc.was_normalized());
    }

    #[test]
    fn test_parse_malformed_entry_fails() {
        let err = parse(r#"{"mcpServers":{"bad":{"args":[]}}}"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad"), "error should name the entry: {msg}");
    }

    #[test]
    fn test_parse_missing_args_defaults_empty() {
        let doc = parse(r#"{"mcpServers":{"s":{"command":"x"}}}"#).unwrap();
        assert!(doc.servers["s"].args.is_empty());
    }

    #[test]
    fn test_serialize_empty_document_keeps_server_map() {
        let text = serialize(&Document::empty()).unwrap();
        assert!(text.contains("\"mcpServers\""));
        let doc = parse(&text).unwrap();
        assert!(doc.is_effectively_empty());
        assert!(!doc.was_normalized());
    }

    #[test]
    fn test_round_trip() {
        let mut servers = BTreeMap::new();
        servers.insert("files".to_string(), spec("npx", &["-y", "files"]));
        servers.insert(
            "db".to_string(),
            ServerSpec {
                command: "uvx".to_string(),
                args: vec!["db-server".to_string()],
                env: Some(BTreeMap::from([(
                    "DB_URL".to_string(),
                    "sqlite:///tmp/x.db".to_string(),
                )])),
            },
        );
        let doc = Document::from_servers(servers);

        let round_tripped = parse(&serialize(&doc).unwrap()).unwrap();
        assert_eq!(round_tripped, doc);
    }

    #[test]
    fn test_serialize_drops_unrecognized_top_level_keys() {
        let doc = parse(r#"{"mcpServers":{},"theme":"dark"}"#).unwrap();
        let text = serialize(&doc).unwrap();
        assert!(!text.contains("theme"));
    }

    #[test]
    fn test_is_effectively_empty() {
        assert!(Document::empty().is_effectively_empty());
        let doc = parse(r#"{"mcpServers":{"s":{"command":"x","args":[]}}}"#).unwrap();
        assert!(!doc.is_effectively_empty());
    }
}
