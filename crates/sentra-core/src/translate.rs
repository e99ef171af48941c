//! Inter-agent message translation
//!
//! Agents on different transports exchange messages through a canonical
//! form: sniff the source protocol, parse into `CanonicalMessage`, build
//! for the target. Conversions that cannot carry a field record a warning
//! instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Message is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Could not recognize the source protocol")]
    UnrecognizedProtocol,
    #[error("Malformed {0} message: {1}")]
    Malformed(&'static str, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireProtocol {
    JsonRpc,
    Rest,
    Websocket,
    Graphql,
}

impl WireProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonRpc => "json_rpc",
            Self::Rest => "rest",
            Self::Websocket => "websocket",
            Self::Graphql => "graphql",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json_rpc" | "jsonrpc" => Some(Self::JsonRpc),
            "rest" | "rest_http" | "http" => Some(Self::Rest),
            "websocket" | "ws" => Some(Self::Websocket),
            "graphql" => Some(Self::Graphql),
            _ => None,
        }
    }
}

/// Protocol-neutral message form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    /// Operation name, dot-separated (e.g. "fraud.scan")
    pub operation: String,
    pub payload: Value,
    pub correlation_id: Option<String>,
}

/// Result of a translation, including lossy-conversion warnings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub from: WireProtocol,
    pub to: WireProtocol,
    pub output: Value,
    pub warnings: Vec<String>,
}

/// Sniff the wire protocol of a JSON message.
pub fn detect(message: &Value) -> Option<WireProtocol> {
    let obj = message.as_object()?;
    if obj.get("jsonrpc").and_then(Value::as_str) == Some("2.0") {
        return Some(WireProtocol::JsonRpc);
    }
    if obj.contains_key("query") || obj.contains_key("mutation") {
        return Some(WireProtocol::Graphql);
    }
    if obj.contains_key("type") && obj.contains_key("channel") {
        return Some(WireProtocol::Websocket);
    }
    if obj.contains_key("method") || obj.contains_key("path") || obj.contains_key("body") {
        return Some(WireProtocol::Rest);
    }
    None
}

/// Parse a message of a known protocol into canonical form.
pub fn parse(message: &Value, protocol: WireProtocol) -> Result<CanonicalMessage, TranslateError> {
    match protocol {
        WireProtocol::JsonRpc => {
            let method = message
                .get("method")
                .and_then(Value::as_str)
                .ok_or_else(|| TranslateError::Malformed("json_rpc", "missing method".into()))?;
            Ok(CanonicalMessage {
                operation: method.to_string(),
                payload: message.get("params").cloned().unwrap_or(json!({})),
                correlation_id: id_as_string(message.get("id")),
            })
        }
        WireProtocol::Rest => {
            let path = message
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("/");
            let operation = path.trim_matches('/').replace('/', ".");
            if operation.is_empty() {
                return Err(TranslateError::Malformed("rest", "empty path".into()));
            }
            Ok(CanonicalMessage {
                operation,
                payload: message.get("body").cloned().unwrap_or(json!({})),
                correlation_id: id_as_string(message.get("request_id")),
            })
        }
        WireProtocol::Websocket => {
            let kind = message
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| TranslateError::Malformed("websocket", "missing type".into()))?;
            Ok(CanonicalMessage {
                operation: kind.to_string(),
                payload: message.get("payload").cloned().unwrap_or(json!({})),
                correlation_id: id_as_string(message.get("id")),
            })
        }
        WireProtocol::Graphql => {
            let query = message
                .get("query")
                .or_else(|| message.get("mutation"))
                .and_then(Value::as_str)
                .ok_or_else(|| TranslateError::Malformed("graphql", "missing query".into()))?;
            let operation = extract_graphql_field(query)
                .ok_or_else(|| TranslateError::Malformed("graphql", "no selection field".into()))?;
            Ok(CanonicalMessage {
                operation,
                payload: message.get("variables").cloned().unwrap_or(json!({})),
                correlation_id: id_as_string(message.get("operationName")),
            })
        }
    }
}

/// Render a canonical message in the target protocol.
pub fn build(canonical: &CanonicalMessage, target: WireProtocol) -> (Value, Vec<String>) {
    let mut warnings = Vec::new();
    let output = match target {
        WireProtocol::JsonRpc => {
            let mut msg = json!({
                "jsonrpc": "2.0",
                "method": canonical.operation,
                "params": canonical.payload,
            });
            if let Some(id) = &canonical.correlation_id {
                msg["id"] = json!(id);
            } else {
                warnings.push("json_rpc notification emitted without an id".to_string());
            }
            msg
        }
        WireProtocol::Rest => {
            let path = format!("/{}", canonical.operation.replace('.', "/"));
            let mut msg = json!({
                "method": "POST",
                "path": path,
                "body": canonical.payload,
            });
            if let Some(id) = &canonical.correlation_id {
                msg["request_id"] = json!(id);
            }
            msg
        }
        WireProtocol::Websocket => {
            let mut msg = json!({
                "type": canonical.operation,
                "channel": "agents",
                "payload": canonical.payload,
            });
            if let Some(id) = &canonical.correlation_id {
                msg["id"] = json!(id);
            }
            warnings.push("websocket channel defaulted to 'agents'".to_string());
            msg
        }
        WireProtocol::Graphql => {
            let field = canonical.operation.replace('.', "_");
            if canonical.operation.contains('.') {
                warnings.push(format!(
                    "graphql field name flattened from '{}'",
                    canonical.operation
                ));
            }
            json!({
                "query": format!("mutation {{ {}(input: $input) }}", field),
                "variables": { "input": canonical.payload },
            })
        }
    };
    (output, warnings)
}

/// End-to-end translation: detect, parse, build.
pub fn translate(message: &Value, target: WireProtocol) -> Result<Translation, TranslateError> {
    let from = detect(message).ok_or(TranslateError::UnrecognizedProtocol)?;
    translate_from(message, from, target)
}

/// Translate a raw wire string (e.g. a websocket frame body).
pub fn translate_str(message: &str, target: WireProtocol) -> Result<Translation, TranslateError> {
    let value: Value =
        serde_json::from_str(message).map_err(|e| TranslateError::InvalidJson(e.to_string()))?;
    translate(&value, target)
}

/// Translation with an explicit source protocol.
pub fn translate_from(
    message: &Value,
    from: WireProtocol,
    target: WireProtocol,
) -> Result<Translation, TranslateError> {
    let canonical = parse(message, from)?;
    let (output, warnings) = build(&canonical, target);
    Ok(Translation {
        from,
        to: target,
        output,
        warnings,
    })
}

fn id_as_string(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// First selection field of the first operation in a GraphQL document.
fn extract_graphql_field(query: &str) -> Option<String> {
    let body_start = query.find('{')? + 1;
    let body = &query[body_start..];
    let field: String = body
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if field.is_empty() {
        None
    } else {
        Some(field)
    }
}
