use crate::*;
use serde::ser::SerializeMap;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::io::BufRead;

const TIMESTAMP: &str = "@timestamp";

/// A single measurement of a time series.
///
/// The JSON form is flat: labels as strings, values as numbers and the
/// timestamp (seconds) under `@timestamp`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Point {
    pub labels: HashMap<String, String>,
    pub values: HashMap<String, f32>,
    pub timestamp: i64,
}

impl Point {
    /// Lowercase hex SHA-256 of the timestamp and the label values in label
    /// order, used for deduplication
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp.to_string().as_bytes());
        for key in self.labels.keys().sorted() {
            hasher.update(self.labels[key].as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl Serialize for Point {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.labels.len() + self.values.len()))?;
        map.serialize_entry(TIMESTAMP, &self.timestamp)?;
        for (label, value) in self.labels.iter().sorted() {
            map.serialize_entry(label, value)?;
        }
        for (name, value) in self.values.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl TryFrom<Map<String, Value>> for Point {
    type Error = NetError;

    fn try_from(raw: Map<String, Value>) -> NetResult<Self> {
        let mut point = Point::default();
        for (key, value) in raw {
            if key == TIMESTAMP {
                point.timestamp = value
                    .as_i64()
                    .or_else(|| value.as_f64().map(|t| t as i64))
                    .ok_or_else(|| NetError::MalformedPoint(format!("{} is not a number", TIMESTAMP)))?;
                continue;
            }
            match value {
                Value::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        point.values.insert(key, v as f32);
                    }
                }
                Value::String(s) => {
                    point.labels.insert(key, s);
                }
                _ => {}
            }
        }
        Ok(point)
    }
}

/// Reads a whitespace separated table, one point per line. Column `i` becomes
/// the value `value-i`; timestamps are consecutive seconds starting at
/// 777808800.
pub fn points_from_table<R: BufRead>(reader: R) -> NetResult<Vec<Point>> {
    let mut timestamp = 777_808_800i64;
    let mut points = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut values = HashMap::new();
        for (i, raw) in line.split_whitespace().enumerate() {
            let value: f32 = raw.parse().map_err(|_| {
                NetError::MalformedPoint(format!("line {}: {:?} is not a number", n + 1, raw))
            })?;
            values.insert(format!("value-{}", i), value);
        }
        points.push(Point {
            labels: HashMap::new(),
            values,
            timestamp,
        });
        timestamp += 1;
    }
    Ok(points)
}
