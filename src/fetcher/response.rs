use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::TradingPair;

/// Decode a DexScreener pairs body, possibly wrapped by a relay.
///
/// Accepted shapes:
/// - `{"schemaVersion": "...", "pairs": [...]}` passed straight through
/// - `{"contents": "<stringified body>"}` from wrapping relays
///
/// `pairs: null` is an empty result. Pairs that fail to decode are skipped.
pub fn decode_pairs_body(body: &str) -> Result<Vec<TradingPair>> {
    let value: Value = serde_json::from_str(body)?;
    let value = unwrap_relay(value)?;
    pairs_from_value(&value)
}

fn is_dexscreener_body(v: &Value) -> bool {
    v.get("pairs").is_some() || v.get("schemaVersion").is_some()
}

fn unwrap_relay(v: Value) -> Result<Value> {
    if is_dexscreener_body(&v) {
        return Ok(v);
    }

    let inner = match v.get("contents") {
        Some(Value::String(s)) => serde_json::from_str::<Value>(s)?,
        Some(obj @ Value::Object(_)) => obj.clone(),
        Some(Value::Null) | None => {
            return Err(AppError::UnexpectedBody(
                "neither a pairs body nor a relay envelope".to_string(),
            ))
        }
        Some(other) => {
            return Err(AppError::UnexpectedBody(format!(
                "relay contents of unexpected type: {}",
                json_type(other)
            )))
        }
    };

    if is_dexscreener_body(&inner) {
        Ok(inner)
    } else {
        Err(AppError::UnexpectedBody("relay contents is not a pairs body".to_string()))
    }
}

fn pairs_from_value(v: &Value) -> Result<Vec<TradingPair>> {
    let items = match v.get("pairs") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(AppError::UnexpectedBody(format!(
                "pairs is {}, expected array",
                json_type(other)
            )))
        }
    };

    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<TradingPair>(item.clone()) {
            Ok(pair) => pairs.push(pair),
            Err(e) => {
                let addr = item.get("pairAddress").and_then(|a| a.as_str()).unwrap_or("?");
                debug!(pair_address = %addr, "skipping undecodable pair: {e}");
            }
        }
    }
    Ok(pairs)
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
