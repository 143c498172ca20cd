//! Canonical JSON serialization
//!
//! Object keys are sorted at every level and the output is pretty-printed
//! with a 2-space indent and no trailing newline. Equal payloads always
//! produce byte-identical text, whatever order their keys were inserted
//! in, so the VCS content hash doubles as the change detector.
//!
//! Sorting is done here rather than relying on `serde_json::Map` being a
//! `BTreeMap`: the `preserve_order` feature can be switched on by any other
//! crate in the dependency graph.

use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Indentation used for archive files
const INDENT: &[u8] = b"  ";

/// Serialize any payload to its canonical text form
pub fn to_canonical_string<T: Serialize + ?Sized>(payload: &T) -> Result<String> {
    let value = serde_json::to_value(payload)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    SortedValue(&value).serialize(&mut serializer)?;

    String::from_utf8(buf)
        .map_err(|e| Error::Other(format!("Canonical JSON is not valid UTF-8: {}", e)))
}

/// Borrowed view of a JSON value that serializes object keys in order
struct SortedValue<'a>(&'a Value);

impl Serialize for SortedValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &SortedValue(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&SortedValue(item))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}
