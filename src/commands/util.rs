use nu_plugin::EvaluatedCall;
use nu_protocol::{LabeledError, PipelineData, Record, Signature, Span, SyntaxShape, Value};

use crate::algo::dataset::{Dataset, GroupId};
use crate::ops;

/// Flags shared by every query command.
pub fn with_source_flags(sig: Signature) -> Signature {
    sig.named(
        "groups",
        SyntaxShape::List(Box::new(SyntaxShape::Int)),
        "Selected scout group ids (default: all groups)",
        Some('g'),
    )
    .named(
        "data",
        SyntaxShape::Filepath,
        "Dataset JSON file, used when nothing is piped in",
        Some('d'),
    )
}

/// The dataset for a call: piped input if any, else `--data`, else the
/// configured default.
pub fn dataset_from_call(call: &EvaluatedCall, input: PipelineData) -> Result<Dataset, LabeledError> {
    let value = input.into_value(call.head)?;
    if !matches!(value, Value::Nothing { .. }) {
        return Ok(Dataset::from_value(&nu_to_json(&value)));
    }
    let path: Option<String> = call.get_flag("data")?;
    ops::resolve_dataset(path.as_deref()).map_err(|e| LabeledError::new(e.to_string()))
}

pub fn groups_flag(call: &EvaluatedCall) -> Result<Option<Vec<GroupId>>, LabeledError> {
    Ok(call.get_flag::<Vec<i64>>("groups")?)
}

/// Convert a serde_json::Value to a nu_protocol::Value
pub fn json_to_nu(val: &serde_json::Value, span: Span) -> Value {
    match val {
        serde_json::Value::Null => Value::nothing(span),
        serde_json::Value::Bool(b) => Value::bool(*b, span),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::int(i, span)
            } else if let Some(f) = n.as_f64() {
                Value::float(f, span)
            } else {
                Value::string(n.to_string(), span)
            }
        }
        serde_json::Value::String(s) => Value::string(s, span),
        serde_json::Value::Array(arr) => {
            Value::list(arr.iter().map(|v| json_to_nu(v, span)).collect(), span)
        }
        serde_json::Value::Object(map) => {
            let mut record = Record::new();
            for (k, v) in map {
                record.push(k, json_to_nu(v, span));
            }
            Value::record(record, span)
        }
    }
}

/// Convert a nu_protocol::Value to a serde_json::Value. Values with no JSON
/// counterpart (dates, durations, ...) become their string form.
pub fn nu_to_json(val: &Value) -> serde_json::Value {
    match val {
        Value::Nothing { .. } => serde_json::Value::Null,
        Value::Bool { val, .. } => serde_json::Value::Bool(*val),
        Value::Int { val, .. } => serde_json::Value::from(*val),
        Value::Float { val, .. } => serde_json::Number::from_f64(*val)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String { val, .. } => serde_json::Value::String(val.clone()),
        Value::List { vals, .. } => serde_json::Value::Array(vals.iter().map(nu_to_json).collect()),
        Value::Record { val, .. } => serde_json::Value::Object(
            val.iter()
                .map(|(k, v)| (k.clone(), nu_to_json(v)))
                .collect(),
        ),
        other => other
            .coerce_string()
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}

/// Wrap an op result for the pipeline.
pub fn output(result: &serde_json::Value, span: Span) -> PipelineData {
    PipelineData::Value(json_to_nu(result, span), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_nu_json_keeps_structure() {
        let span = Span::test_data();
        let original = json!({
            "villages": [{"id": 1, "name": "Byn", "scoutGroups": [{"id": 2, "num_participants": 3.5}]}],
            "flag": true,
            "none": null
        });
        assert_eq!(nu_to_json(&json_to_nu(&original, span)), original);
    }
}
