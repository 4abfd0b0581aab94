use std::collections::HashMap;
use std::io;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::{format::Writer, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Span fields shown in their own column by the pretty formatter
const COMMAND_FIELD: &str = "command";
const BUCKET_FIELD: &str = "bucket";

/// Fields recorded on a span, kept in the span's extensions
#[derive(Debug, Clone, Default)]
pub struct SpanFields {
    pub raw_fields: HashMap<String, String>,
}

impl SpanFields {
    fn add_field(&mut self, name: &str, value: String) {
        self.raw_fields.insert(name.to_string(), value);
    }
}

#[derive(Default)]
struct SpanFieldCollector {
    fields: SpanFields,
}

impl Visit for SpanFieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let formatted_value = format!("{:?}", value).trim_matches('"').to_string();
        self.fields.add_field(field.name(), formatted_value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.add_field(field.name(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.add_field(field.name(), value.to_string());
    }
}

/// Stores span fields so the formatters can show them next to every event of the span.
pub struct FieldCollectorLayer;

impl<S> Layer<S> for FieldCollectorLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };

        let mut collector = SpanFieldCollector::default();
        attrs.record(&mut collector);
        span.extensions_mut().insert(collector.fields);
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };

        let mut extensions = span.extensions_mut();
        let existing = extensions.remove::<SpanFields>().unwrap_or_default();

        let mut collector = SpanFieldCollector { fields: existing };
        values.record(&mut collector);
        extensions.insert(collector.fields);
    }
}

/// Fields of every span enclosing the event, outermost first so inner spans win.
fn scope_fields<S, N>(ctx: &FmtContext<'_, S, N>) -> HashMap<String, String>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let mut fields = HashMap::new();
    if let Some(scope) = ctx.event_scope() {
        for span in scope.from_root() {
            if let Some(span_fields) = span.extensions().get::<SpanFields>() {
                fields.extend(span_fields.raw_fields.clone());
            }
        }
    }
    fields
}

// Pretty formatter is formatted for console readability
pub struct PrettyFormatter;

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let now = Utc::now().format("%y-%m-%d %H:%M:%S").to_string();

        let ts_color = "\x1b[96m"; // Bright Cyan
        let level_color = match *meta.level() {
            Level::TRACE => "\x1b[90m",
            Level::DEBUG => "\x1b[34m",
            Level::INFO => "\x1b[32m",
            Level::WARN => "\x1b[33m",
            Level::ERROR => "\x1b[31m",
        };
        let msg_color = "\x1b[97m"; // Bright White
        let column_color = "\x1b[92m"; // Bright Green
        let field_color = "\x1b[90m"; // Dark Grey
        let reset = "\x1b[0m";

        let span_fields = scope_fields(ctx);
        let command = span_fields.get(COMMAND_FIELD).map(String::as_str).unwrap_or("-");
        let bucket = span_fields.get(BUCKET_FIELD).map(String::as_str).unwrap_or("-");

        let mut visitor = FieldExtractor::default();
        event.record(&mut visitor);

        // Timestamp | Level | Command | Bucket | Message (fields)
        write!(writer, "{}{}{} ", ts_color, now, reset)?;
        write!(writer, "{}|{} ", field_color, reset)?;
        write!(writer, "{}{:<5}{} ", level_color, *meta.level(), reset)?;
        write!(writer, "{}|{} ", field_color, reset)?;
        write!(writer, "{}{:<22}{} ", column_color, command, reset)?;
        write!(writer, "{}|{} ", field_color, reset)?;
        write!(writer, "{}{:<16}{} ", column_color, bucket, reset)?;
        write!(writer, "{}|{} ", field_color, reset)?;
        write!(writer, "{}{}{}", msg_color, visitor.message, reset)?;

        if !visitor.fields.is_empty() {
            write!(writer, " ({}{}{})", field_color, visitor.fields.join(", "), reset)?;
        }

        writeln!(writer)
    }
}

// Visitor to extract message and format fields
#[derive(Default)]
struct FieldExtractor {
    message: String,
    fields: Vec<String>,
}

impl Visit for FieldExtractor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let formatted_value = format!("{:?}", value).trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = formatted_value;
        } else {
            self.fields.push(format!("{}={}", field.name(), formatted_value));
        }
    }
}

// JSON formatter for structured logs, one object per line
pub struct JsonEventFormatter;

#[derive(Default)]
struct JsonFieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for JsonFieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let v = format!("{:?}", value).trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = Some(v);
        } else {
            self.fields.insert(field.name().to_string(), Value::String(v));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let ts = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut root = Map::new();
        root.insert("timestamp".to_string(), Value::String(ts));
        root.insert("level".to_string(), Value::String(meta.level().to_string()));
        root.insert("target".to_string(), Value::String(meta.target().to_string()));
        if let Some(file) = meta.file() {
            root.insert("filename".to_string(), Value::String(file.to_string()));
        }
        if let Some(line) = meta.line() {
            root.insert("line_number".to_string(), Value::from(line));
        }
        if let Some(message) = visitor.message.take() {
            root.insert("message".to_string(), Value::String(message));
        }

        // Event fields take precedence over span fields with the same name
        let mut all_fields: Map<String, Value> =
            scope_fields(ctx).into_iter().map(|(key, value)| (key, Value::String(value))).collect();
        all_fields.extend(visitor.fields);
        if let Some(span) = ctx.lookup_current() {
            all_fields.insert("span_name".to_string(), Value::String(span.metadata().name().to_string()));
        }
        if !all_fields.is_empty() {
            root.insert("fields".to_string(), Value::Object(all_fields));
        }

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Initialize the tracing subscriber with
/// - PrettyFormatter for console readability (when LOG_FORMAT != "json")
/// - JsonEventFormatter for json logging (when LOG_FORMAT = "json")
///
/// Logs go to stderr, stdout is reserved for step results.
/// This will also install color_eyre to report errors returned from `main`.
pub fn init_logging() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Read from `RUST_LOG` environment variable, with fallback to default
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::builder().with_default_directive(Level::WARN.into()).parse("s3_executor=info"))?;

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let fmt_layer = fmt::layer().with_writer(io::stderr).with_target(true).with_file(true).with_line_number(true);

    let fmt_layer = if log_format == "json" {
        fmt_layer.event_format(JsonEventFormatter).boxed()
    } else {
        fmt_layer.event_format(PrettyFormatter).boxed()
    };

    let subscriber =
        Registry::default().with(env_filter).with(FieldCollectorLayer).with(fmt_layer).with(ErrorLayer::default());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
