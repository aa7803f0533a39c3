use crate::finite::Finite;
use crate::record::{Level, LogRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field-name prefix that routes a field into the tagged (`dd`) group.
pub const RESERVED_PREFIX: &str = "dd.";

/// Top-level key of the group holding prefixed fields, prefix stripped.
pub const TAGGED_KEY: &str = "dd";

/// Top-level key of the group holding every other field.
pub const CUSTOM_KEY: &str = "custom";

/// `strftime` pattern of the `timestamp` key, always rendered in UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Error returned by [`DataModelFormatter::format`].
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to encode log record as JSON: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Fields of a record split into the two output groups.
///
/// Both maps borrow keys and values from the source mapping, which is left
/// untouched.
#[derive(Debug, PartialEq)]
pub struct Partitioned<'a, V> {
    pub tagged: BTreeMap<&'a str, &'a V>,
    pub custom: BTreeMap<&'a str, &'a V>,
}

/// Route every field into exactly one group in a single pass.
///
/// Keys starting with [`RESERVED_PREFIX`] go to `tagged` with the prefix
/// stripped; all others go to `custom` unchanged.
pub fn partition<V>(fields: &BTreeMap<String, V>) -> Partitioned<'_, V> {
    let mut tagged = BTreeMap::new();
    let mut custom = BTreeMap::new();

    for (key, value) in fields {
        match key.strip_prefix(RESERVED_PREFIX) {
            Some(stripped) => {
                tagged.insert(stripped, value);
            }
            None => {
                custom.insert(key.as_str(), value);
            }
        }
    }

    Partitioned { tagged, custom }
}

#[derive(Serialize)]
struct Reshaped<'a, V> {
    #[serde(rename = "dd", skip_serializing_if = "BTreeMap::is_empty")]
    tagged: BTreeMap<&'a str, &'a V>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    custom: BTreeMap<&'a str, &'a V>,
    timestamp: String,
    message: &'a str,
    level: Level,
}

/// Reshapes a [`LogRecord`] into the JSON data model:
///
/// ```json
/// {"dd":{"trace_id":"1234"},"custom":{"user_id":"123"},
///  "timestamp":"2024-11-28T14:00:00.000Z","message":"Test message","level":"info"}
/// ```
///
/// `dd` and `custom` are omitted when empty. The formatter holds no state and
/// can be shared freely between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataModelFormatter;

impl DataModelFormatter {
    pub fn new() -> Self {
        DataModelFormatter
    }

    /// Serialize `record` into JSON bytes without a trailing newline.
    ///
    /// **Errors**
    /// - [`FormatError::Encoding`] if a field value cannot be represented as
    ///   JSON, including NaN and infinite floats. No partial output is
    ///   returned in that case.
    pub fn format<V: Serialize>(&self, record: &LogRecord<V>) -> Result<Vec<u8>, FormatError> {
        // serde_json never escapes HTML characters, so `<`, `>` and `&` are
        // written as-is.
        Ok(serde_json::to_vec(&Finite(&self.reshape(record)))?)
    }

    /// Same as [`DataModelFormatter::format`] but returns the JSON as a `String`.
    pub fn format_to_string<V: Serialize>(
        &self,
        record: &LogRecord<V>,
    ) -> Result<String, FormatError> {
        Ok(serde_json::to_string(&Finite(&self.reshape(record)))?)
    }

    fn reshape<'a, V>(&self, record: &'a LogRecord<V>) -> Reshaped<'a, V> {
        let Partitioned { tagged, custom } = partition(&record.fields);

        Reshaped {
            tagged,
            custom,
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            message: &record.message,
            level: record.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde::ser::Error as _;
    use serde_json::{json, Value};

    fn record(fields: &[(&str, &str)]) -> LogRecord {
        let ts = Utc.with_ymd_and_hms(2024, 11, 28, 14, 0, 0).unwrap();
        LogRecord::new(Level::Info, ts, "Test message").with_fields(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string()))),
        )
    }

    fn format_value(record: &LogRecord) -> Value {
        let bytes = DataModelFormatter::new().format(record).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const DD_FIELDS: [(&str, &str); 4] = [
        ("dd.trace_id", "1234"),
        ("dd.span_id", "12345678"),
        ("dd.service", "test-service"),
        ("dd.version", "1.0.0"),
    ];

    #[test]
    fn standard_dd_fields() {
        let output = format_value(&record(&DD_FIELDS));

        assert_eq!(
            output,
            json!({
                "dd": {
                    "trace_id": "1234",
                    "span_id": "12345678",
                    "service": "test-service",
                    "version": "1.0.0",
                },
                "timestamp": "2024-11-28T14:00:00.000Z",
                "message": "Test message",
                "level": "info",
            })
        );
    }

    #[test]
    fn custom_fields_only() {
        let output = format_value(&record(&[("user_id", "123")]));

        assert_eq!(
            output,
            json!({
                "custom": { "user_id": "123" },
                "timestamp": "2024-11-28T14:00:00.000Z",
                "message": "Test message",
                "level": "info",
            })
        );
        assert!(output.get(TAGGED_KEY).is_none());
    }

    #[test]
    fn mixed_fields_fill_both_groups() {
        let mut fields = DD_FIELDS.to_vec();
        fields.push(("user_id", "123"));
        fields.push(("request_type", "api"));

        let output = format_value(&record(&fields));

        assert_eq!(
            output,
            json!({
                "dd": {
                    "trace_id": "1234",
                    "span_id": "12345678",
                    "service": "test-service",
                    "version": "1.0.0",
                },
                "custom": {
                    "user_id": "123",
                    "request_type": "api",
                },
                "timestamp": "2024-11-28T14:00:00.000Z",
                "message": "Test message",
                "level": "info",
            })
        );
    }

    #[test]
    fn no_fields_emits_core_keys_only() {
        let output = format_value(&record(&[]));
        let obj = output.as_object().unwrap();

        assert_eq!(obj.len(), 3);
        assert!(!obj.contains_key(TAGGED_KEY));
        assert!(!obj.contains_key(CUSTOM_KEY));
    }

    #[test]
    fn timestamp_keeps_milliseconds_in_utc() {
        let ts = Utc.timestamp_millis_opt(1_732_802_400_123).unwrap();
        let rec: LogRecord = LogRecord::new(Level::Warn, ts, "m");

        let output = format_value(&rec);
        assert_eq!(output["timestamp"], "2024-11-28T14:00:00.123Z");
        assert_eq!(output["level"], "warn");
    }

    #[test]
    fn html_is_not_escaped() {
        let rec = record(&[("html", "<b>a & b</b>")]);
        let bytes = DataModelFormatter::new().format(&rec).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("<b>a & b</b>"));
        assert!(!text.contains("\\u003c"));
    }

    #[test]
    fn group_named_keys_are_routed_like_any_other_field() {
        let output = format_value(&record(&[("dd", "x"), ("custom", "y"), ("dd.", "z")]));

        assert_eq!(output["custom"], json!({ "dd": "x", "custom": "y" }));
        assert_eq!(output["dd"], json!({ "": "z" }));
    }

    #[test]
    fn format_leaves_source_fields_untouched() {
        let rec = record(&DD_FIELDS);
        let before = rec.fields.clone();

        DataModelFormatter::new().format(&rec).unwrap();
        assert_eq!(rec.fields, before);
    }

    #[test]
    fn partition_strips_prefix_only_for_tagged() {
        let rec = record(&[("dd.trace_id", "1"), ("user_id", "2")]);
        let parts = partition(&rec.fields);

        assert_eq!(parts.tagged.keys().copied().collect::<Vec<_>>(), ["trace_id"]);
        assert_eq!(parts.custom.keys().copied().collect::<Vec<_>>(), ["user_id"]);
    }

    #[test]
    fn non_string_values_are_preserved() {
        let ts = Utc.with_ymd_and_hms(2024, 11, 28, 14, 0, 0).unwrap();
        let rec = LogRecord::new(Level::Error, ts, "boom")
            .with_field("dd.attempt", json!(3))
            .with_field("ok", json!(false))
            .with_field("nested", json!({ "a": [1, 2] }));

        let output = format_value(&rec);
        assert_eq!(output["dd"]["attempt"], 3);
        assert_eq!(output["custom"]["ok"], false);
        assert_eq!(output["custom"]["nested"], json!({ "a": [1, 2] }));
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("value cannot be encoded"))
        }
    }

    #[test]
    fn nan_field_is_an_encoding_failure() {
        let rec = LogRecord::new(Level::Info, Utc::now(), "m").with_field("ratio", f64::NAN);

        let err = DataModelFormatter::new().format(&rec).unwrap_err();
        assert!(matches!(err, FormatError::Encoding(_)));
        assert!(err.to_string().contains("unsupported value: NaN"));
    }

    #[test]
    fn infinite_tagged_field_is_an_encoding_failure() {
        let rec = LogRecord::new(Level::Info, Utc::now(), "m")
            .with_field("ratio", 0.5)
            .with_field("dd.inf", f64::INFINITY);

        let err = DataModelFormatter::new().format(&rec).unwrap_err();
        assert!(matches!(err, FormatError::Encoding(_)));
        assert!(DataModelFormatter::new().format_to_string(&rec).is_err());
    }

    #[test]
    fn finite_floats_are_kept() {
        let rec = LogRecord::new(Level::Info, Utc::now(), "m").with_field("ratio", 0.25);

        let text = DataModelFormatter::new().format_to_string(&rec).unwrap();
        let output: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(output["custom"]["ratio"], 0.25);
    }

    #[test]
    fn encoding_failure_is_returned() {
        let rec = LogRecord::new(Level::Info, Utc::now(), "m").with_field("bad", Unencodable);

        let err = DataModelFormatter::new().format(&rec).unwrap_err();
        assert!(matches!(err, FormatError::Encoding(_)));
        assert!(err.to_string().contains("value cannot be encoded"));
    }
}
