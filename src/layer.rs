use crate::formatter::DataModelFormatter;
use crate::record::LogRecord;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` event formatter that writes each event as one line
/// of the `dd`/`custom` JSON data model produced by [`DataModelFormatter`].
///
/// Event fields become record fields; the `message` field becomes the record
/// message. When the subscriber formats span fields with
/// [`JsonFields`](tracing_subscriber::fmt::format::JsonFields), fields of all
/// enclosing spans are merged in as well, outermost first, and event fields
/// win over span fields of the same name.
///
/// If a record cannot be encoded (for example a NaN float field) nothing is
/// written and `fmt::Error` is returned to the subscriber.
#[derive(Debug, Clone, Copy)]
pub struct DataModelFormat {
    formatter: DataModelFormatter,
    span_fields: bool,
}

impl Default for DataModelFormat {
    fn default() -> Self {
        Self {
            formatter: DataModelFormatter::new(),
            span_fields: true,
        }
    }
}

impl DataModelFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle merging of span fields into each event's record.
    pub fn with_span_fields(mut self, enabled: bool) -> Self {
        self.span_fields = enabled;
        self
    }

    fn collect_span_fields<S, N>(
        ctx: &FmtContext<'_, S, N>,
        fields: &mut BTreeMap<String, FieldValue>,
    ) where
        S: Subscriber + for<'a> LookupSpan<'a>,
        N: for<'a> FormatFields<'a> + 'static,
    {
        let Some(scope) = ctx.event_scope() else {
            return;
        };

        for span in scope.from_root() {
            let ext = span.extensions();
            let Some(formatted) = ext.get::<FormattedFields<N>>() else {
                continue;
            };
            // Spans without fields, or formatted by a non-JSON field
            // formatter, don't parse as an object and are skipped.
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&formatted.fields) {
                fields.extend(map.into_iter().map(|(k, v)| (k, FieldValue::Json(v))));
            }
        }
    }
}

impl<S, N> FormatEvent<S, N> for DataModelFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = BTreeMap::new();
        if self.span_fields {
            Self::collect_span_fields(ctx, &mut fields);
        }

        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Utc::now(),
            level: (*event.metadata().level()).into(),
            message: message.unwrap_or_default(),
            fields,
        };

        let line = self.formatter.format_to_string(&record).map_err(|_| fmt::Error)?;
        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}

/// Value of a field collected from a `tracing` event or span.
///
/// Floats are kept raw rather than converted to [`Value`], which would turn
/// NaN and infinities into `null`; the formatter rejects those instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Json(Value),
}

use tracing::field::{Field, Visit};

/// Collects event fields, keeping `message` apart.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, FieldValue>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), FieldValue::Json(value));
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        let json = match i64::try_from(value) {
            Ok(v) => Value::from(v),
            Err(_) => match u64::try_from(value) {
                Ok(v) => Value::from(v),
                Err(_) => Value::String(value.to_string()),
            },
        };
        self.insert(field, json);
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        let json = match u64::try_from(value) {
            Ok(v) => Value::from(v),
            Err(_) => Value::String(value.to_string()),
        };
        self.insert(field, json);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), FieldValue::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // `info!("text {}", x)` records the message as `fmt::Arguments`.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}
