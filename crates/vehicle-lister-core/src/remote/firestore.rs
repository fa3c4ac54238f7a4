//! Wire format helpers for the Firestore REST `runQuery` endpoint.
//!
//! Documents come back with every field wrapped in a typed value
//! (`{"integerValue": "42"}`, `{"stringValue": "BMW"}`, ...). `decode_fields`
//! unwraps them into plain JSON so the catalog models can deserialize with serde.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};

use super::RemoteError;

/// Maximum number of values Firestore accepts for an `IN` filter.
pub const MAX_IN_VALUES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        }
    }
}

/// Builder for the `structuredQuery` request body.
#[derive(Debug, Clone)]
pub struct StructuredQuery {
    collection: String,
    filter: Option<Value>,
    order_by: Vec<(String, Direction)>,
    limit: Option<u32>,
}

impl StructuredQuery {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filter: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    fn field_filter(mut self, field: &str, op: &str, value: Value) -> Self {
        self.filter = Some(json!({
            "fieldFilter": {
                "field": { "fieldPath": field },
                "op": op,
                "value": value,
            }
        }));
        self
    }

    pub fn where_eq(self, field: &str, value: Value) -> Self {
        self.field_filter(field, "EQUAL", value)
    }

    pub fn where_gte(self, field: &str, value: Value) -> Self {
        self.field_filter(field, "GREATER_THAN_OR_EQUAL", value)
    }

    pub fn where_in(self, field: &str, values: Vec<Value>) -> Self {
        self.field_filter(field, "IN", json!({ "arrayValue": { "values": values } }))
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_body(&self) -> Value {
        let mut query = Map::new();
        query.insert("from".into(), json!([{ "collectionId": self.collection }]));
        if let Some(ref filter) = self.filter {
            query.insert("where".into(), filter.clone());
        }
        if !self.order_by.is_empty() {
            let orders: Vec<Value> = self
                .order_by
                .iter()
                .map(|(field, dir)| json!({ "field": { "fieldPath": field }, "direction": dir.as_str() }))
                .collect();
            query.insert("orderBy".into(), Value::Array(orders));
        }
        if let Some(limit) = self.limit {
            query.insert("limit".into(), json!(limit));
        }
        json!({ "structuredQuery": Value::Object(query) })
    }
}

pub fn integer_value(v: i64) -> Value {
    // Firestore encodes 64-bit integers as strings
    json!({ "integerValue": v.to_string() })
}

pub fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

/// One element of the `runQuery` response array. Elements without a
/// `document` only carry progress metadata (e.g. an empty result's readTime).
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Decode a `runQuery` response body into catalog records.
pub fn decode_documents<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, RemoteError> {
    let items: Vec<RunQueryItem> = serde_json::from_str(body)
        .map_err(|e| RemoteError::InvalidResponse(format!("runQuery body: {}", e)))?;

    items
        .into_iter()
        .filter_map(|item| item.document)
        .map(|doc| {
            let plain = decode_fields(doc.fields)?;
            serde_json::from_value(plain)
                .map_err(|e| RemoteError::InvalidResponse(format!("document shape: {}", e)))
        })
        .collect()
}

fn decode_fields(fields: Map<String, Value>) -> Result<Value, RemoteError> {
    let mut out = Map::with_capacity(fields.len());
    for (name, typed) in fields {
        out.insert(name, decode_value(typed)?);
    }
    Ok(Value::Object(out))
}

fn decode_value(typed: Value) -> Result<Value, RemoteError> {
    let Value::Object(wrapper) = typed else {
        return Err(RemoteError::InvalidResponse("typed value is not an object".into()));
    };
    let Some((kind, inner)) = wrapper.into_iter().next() else {
        return Err(RemoteError::InvalidResponse("empty typed value".into()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" => Ok(inner),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner),
        "integerValue" => {
            let parsed = match &inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| RemoteError::InvalidResponse(format!("bad integerValue {}", inner)))
        }
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values.clone(),
                _ => Vec::new(),
            };
            values
                .into_iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => decode_fields(fields.clone()),
            _ => Ok(Value::Object(Map::new())),
        },
        other => Err(RemoteError::InvalidResponse(format!("unsupported value type {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Car;

    #[test]
    fn test_query_body_shape() {
        let body = StructuredQuery::collection("cars")
            .where_gte("carIndex", integer_value(1234))
            .order_by("carIndex", Direction::Ascending)
            .limit(1)
            .to_body();

        let q = &body["structuredQuery"];
        assert_eq!(q["from"][0]["collectionId"], "cars");
        assert_eq!(q["where"]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(q["where"]["fieldFilter"]["value"]["integerValue"], "1234");
        assert_eq!(q["orderBy"][0]["direction"], "ASCENDING");
        assert_eq!(q["limit"], 1);
    }

    #[test]
    fn test_in_filter_wraps_array() {
        let body = StructuredQuery::collection("chassis")
            .where_in("chassisIndex", vec![integer_value(1), integer_value(2)])
            .to_body();
        let values = &body["structuredQuery"]["where"]["fieldFilter"]["value"]["arrayValue"]["values"];
        assert_eq!(values.as_array().map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_decode_car_document() {
        let body = r#"[{
            "document": {
                "name": "projects/p/databases/(default)/documents/cars/abc",
                "fields": {
                    "carIndex": {"integerValue": "9001"},
                    "chassisIndex": {"integerValue": "412"},
                    "brand": {"stringValue": "BMW"},
                    "chassis": {"stringValue": "3 Series (E46)"},
                    "engine": {"stringValue": "330i"},
                    "engineCode": {"stringValue": "M54B30"},
                    "year": {"stringValue": "2000/06 - 2005/12 E46"},
                    "kw": {"integerValue": "170"},
                    "hp": {"stringValue": "231"},
                    "fuel": {"stringValue": "Petrol"}
                }
            },
            "readTime": "2024-01-01T00:00:00Z"
        }]"#;

        let cars: Vec<Car> = decode_documents(body).unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(cars[0].car_index, 9001);
        assert_eq!(cars[0].kw, "170");
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let body = r#"[{"readTime": "2024-01-01T00:00:00Z"}]"#;
        let cars: Vec<Car> = decode_documents(body).unwrap();
        assert!(cars.is_empty());
    }

    #[test]
    fn test_garbage_is_invalid_response() {
        let result: Result<Vec<Car>, _> = decode_documents("<html>");
        assert!(matches!(result, Err(RemoteError::InvalidResponse(_))));
    }
}
