//! Conversion between JSON records and DynamoDB attribute values, and
//! update-expression building.

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use vending_core::fields;
use vending_provisioning::ports::{RecordUpdate, UpdateMode};

/// Stored item shape.
pub type Item = HashMap<String, AttributeValue>;

/// JSON value to attribute value.
#[must_use]
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

/// JSON object to item.
#[must_use]
pub fn to_item(record: &Map<String, Value>) -> Item {
    record
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

/// Attribute value to JSON. Numbers that do not fit a JSON number stay strings.
#[must_use]
pub fn from_attribute(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => n
            .parse::<Number>()
            .map_or_else(|_| Value::String(n.clone()), Value::Number),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(items.iter().map(from_attribute).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_attribute(v)))
                .collect(),
        ),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| from_attribute(&AttributeValue::N(n.clone())))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// Item to JSON object.
#[must_use]
pub fn from_item(item: &Item) -> Map<String, Value> {
    item.iter()
        .map(|(k, v)| (k.clone(), from_attribute(v)))
        .collect()
}

/// A `SET` expression with its placeholder maps.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Build the `SET` expression for an update. The key attribute is never
/// written. Returns `None` when nothing remains to set.
#[must_use]
pub fn update_expression(update: &RecordUpdate) -> Option<UpdateExpression> {
    let mut clauses = Vec::new();
    let mut names = HashMap::new();
    let mut values = HashMap::new();

    for (i, assignment) in update
        .iter()
        .filter(|a| a.field != fields::ACCOUNT_EMAIL)
        .enumerate()
    {
        let name = format!("#f{i}");
        let value = format!(":v{i}");
        clauses.push(match assignment.mode {
            UpdateMode::Overwrite => format!("{name} = {value}"),
            UpdateMode::IfAbsent => format!("{name} = if_not_exists({name}, {value})"),
        });
        names.insert(name, assignment.field.clone());
        values.insert(value, to_attribute(&assignment.value));
    }

    if clauses.is_empty() {
        return None;
    }
    Some(UpdateExpression {
        expression: format!("SET {}", clauses.join(", ")),
        names,
        values,
    })
}
