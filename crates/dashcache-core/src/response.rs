//! Backend response model for the range-query API.
//!
//! Only the pieces the cache reasons about are typed (status, result type,
//! series labels and samples). Every other field is kept in an `extra` map
//! and timestamps keep their JSON number form, so a decoded response
//! re-encodes without losing fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

pub const STATUS_SUCCESS: &str = "success";

/// Top-level response envelope: `{status, data, errorType?, error?, warnings?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryData>,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// Fields not modelled above, e.g. `infos`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType")]
    pub result_type: ResultType,
    pub result: QueryResult,
    /// e.g. `stats`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Matrix,
    Vector,
    Scalar,
    String,
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matrix => write!(f, "matrix"),
            Self::Vector => write!(f, "vector"),
            Self::Scalar => write!(f, "scalar"),
            Self::String => write!(f, "string"),
        }
    }
}

/// `matrix` and `vector` results are lists of series; `scalar` and `string`
/// results are a bare sample, kept as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Series(Vec<Series>),
    Other(serde_json::Value),
}

/// One labeled series. The label map is the series identity; a `BTreeMap`
/// makes equality independent of label order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Sample>>,
    /// Instant-vector sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Sample>,
    /// e.g. native `histograms`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A `[timestamp, value]` pair. The timestamp stays a JSON number so
/// integer timestamps re-encode as integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample(pub Number, pub SampleValue);

/// Sample values arrive as strings (`"1.5"`, `"NaN"`, `"+Inf"`); numbers are
/// accepted for backends that send them unquoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Text(String),
    Number(Number),
}

impl Sample {
    /// A text-valued sample. A non-finite timestamp becomes zero.
    pub fn new(timestamp: f64, value: impl Into<String>) -> Self {
        let timestamp = Number::from_f64(timestamp).unwrap_or_else(|| Number::from(0));
        Self(timestamp, SampleValue::Text(value.into()))
    }

    pub fn timestamp(&self) -> f64 {
        self.0.as_f64().unwrap_or(0.0)
    }

    /// Timestamp truncated to whole seconds.
    pub fn second(&self) -> i64 {
        self.0
            .as_i64()
            .unwrap_or_else(|| self.timestamp().trunc() as i64)
    }
}

impl Series {
    pub fn matrix(metric: BTreeMap<String, String>, values: Vec<Sample>) -> Self {
        Self {
            metric,
            values: Some(values),
            value: None,
            extra: Map::new(),
        }
    }

    /// Range samples, empty for instant-vector series.
    pub fn samples(&self) -> &[Sample] {
        self.values.as_deref().unwrap_or(&[])
    }
}

impl PromResponse {
    /// A successful matrix response.
    pub fn matrix(series: Vec<Series>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            data: Some(QueryData {
                result_type: ResultType::Matrix,
                result: QueryResult::Series(series),
                extra: Map::new(),
            }),
            error_type: None,
            error: None,
            warnings: None,
            extra: Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    pub fn result_type(&self) -> Option<ResultType> {
        self.data.as_ref().map(|d| d.result_type)
    }

    pub fn is_matrix(&self) -> bool {
        self.result_type() == Some(ResultType::Matrix)
    }

    pub fn series(&self) -> &[Series] {
        match &self.data {
            Some(QueryData {
                result: QueryResult::Series(series),
                ..
            }) => series,
            _ => &[],
        }
    }

    pub fn series_mut(&mut self) -> Option<&mut Vec<Series>> {
        match &mut self.data {
            Some(QueryData {
                result: QueryResult::Series(series),
                ..
            }) => Some(series),
            _ => None,
        }
    }

    pub fn into_series(self) -> Option<Vec<Series>> {
        match self.data {
            Some(QueryData {
                result: QueryResult::Series(series),
                ..
            }) => Some(series),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_matrix() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {"metric": {"__name__": "up", "job": "prometheus"},
                     "values": [[1435781430.781, "1"], [1435781445.781, "1"]]}
                ]
            }
        }"#;
        let resp: PromResponse = serde_json::from_str(body).unwrap();
        assert!(resp.is_success());
        assert!(resp.is_matrix());
        let series = resp.series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].metric["job"], "prometheus");
        assert_eq!(series[0].samples()[1].second(), 1435781445);
        assert_eq!(series[0].samples()[0].1, SampleValue::Text("1".into()));
    }

    #[test]
    fn test_decode_vector_scalar_and_error() {
        let vector: PromResponse = serde_json::from_str(
            r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"job":"a"},"value":[10,"3"]}]}}"#,
        )
        .unwrap();
        assert_eq!(vector.result_type(), Some(ResultType::Vector));
        assert!(vector.series()[0].value.is_some());
        assert!(vector.series()[0].samples().is_empty());

        let scalar: PromResponse = serde_json::from_str(
            r#"{"status":"success","data":{"resultType":"scalar","result":[1435781451.781,"1"]}}"#,
        )
        .unwrap();
        assert!(matches!(
            scalar.data.as_ref().unwrap().result,
            QueryResult::Other(_)
        ));
        assert!(scalar.series().is_empty());

        let error: PromResponse = serde_json::from_str(
            r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#,
        )
        .unwrap();
        assert!(!error.is_success());
        assert_eq!(error.result_type(), None);
        assert_eq!(error.error_type.as_deref(), Some("bad_data"));
    }

    #[test]
    fn test_label_order_does_not_affect_identity() {
        let a: Series =
            serde_json::from_str(r#"{"metric":{"job":"a","instance":"x"},"values":[]}"#).unwrap();
        let b: Series =
            serde_json::from_str(r#"{"metric":{"instance":"x","job":"a"},"values":[]}"#).unwrap();
        assert_eq!(a.metric, b.metric);
    }

    #[test]
    fn test_unmodelled_fields_round_trip() {
        let body = json!({
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [{
                    "metric": {"job": "a"},
                    "values": [[300, "1"], [360.5, "2"]],
                    "histograms": [[420, {"count": "3", "sum": "1.5"}]]
                }],
                "stats": {"timings": {"evalTotalTime": 0.01}}
            },
            "infos": ["x"],
            "warnings": ["w"]
        });
        let resp: PromResponse = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(resp.extra["infos"], json!(["x"]));
        assert_eq!(resp.series()[0].samples()[0].second(), 300);
        assert_eq!(serde_json::to_value(&resp).unwrap(), body);
        assert!(serde_json::to_string(&resp).unwrap().contains("[300,\"1\"]"));
    }

    #[test]
    fn test_reencode_keeps_wire_shape() {
        let mut metric = BTreeMap::new();
        metric.insert("job".to_string(), "a".to_string());
        let resp = PromResponse::matrix(vec![Series::matrix(metric, vec![Sample::new(10.0, "1")])]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["data"]["resultType"], "matrix");
        assert_eq!(json["data"]["result"][0]["values"][0][1], "1");
        assert!(json.get("errorType").is_none());
        assert!(json["data"]["result"][0].get("value").is_none());
    }
}
