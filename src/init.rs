use crate::env::{env_var, LOG_DATA_MODEL_FILTER_ENV, LOG_DATA_MODEL_OUTPUT_ENV, RUST_LOG_ENV};
use crate::layer::DataModelFormat;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Registry};

/// Stream the formatted lines are written to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Output {
    #[default]
    Stdout,
    Stderr,
}

impl Output {
    /// `stderr` (any case) selects [`Output::Stderr`]; anything else is stdout.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("stderr") {
            Output::Stderr
        } else {
            Output::Stdout
        }
    }
}

/// Конфигурация слоя логирования.
///
/// **Поля**
/// - `filter`: директивы `EnvFilter`, например `info,my_crate=debug`.
/// - `include_span_fields`: если `true`, поля всех родительских span’ов
///   попадают в запись вместе с полями события.
/// - `output`: поток, в который пишутся JSON‑строки.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub filter: String,
    pub include_span_fields: bool,
    pub output: Output,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            include_span_fields: true,
            output: Output::Stdout,
        }
    }
}

impl LayerConfig {
    /// Build a config from the process environment.
    ///
    /// The filter comes from `LOG_DATA_MODEL_FILTER`, then `RUST_LOG`, then
    /// defaults to `info`. `LOG_DATA_MODEL_OUTPUT=stderr` switches the output.
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    /// Same as [`LayerConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let filter = lookup(LOG_DATA_MODEL_FILTER_ENV)
            .or_else(|| lookup(RUST_LOG_ENV))
            .unwrap_or(defaults.filter);
        let output = lookup(LOG_DATA_MODEL_OUTPUT_ENV)
            .map(|v| Output::parse(&v))
            .unwrap_or(defaults.output);

        Self {
            filter,
            output,
            ..defaults
        }
    }
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid log filter directive: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to set global tracing subscriber: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// `fmt` layer type returned by [`layer`].
pub type DataModelLayer<S, W = BoxMakeWriter> =
    tracing_subscriber::fmt::Layer<S, JsonFields, DataModelFormat, W>;

/// Build a `fmt` layer that writes events in the data model format.
///
/// Span fields are formatted with [`JsonFields`] so [`DataModelFormat`] can
/// merge them into each record. Use this to compose the formatter into an
/// existing registry; [`init_tracing_with_config`] does it for you.
pub fn layer<S>(config: &LayerConfig) -> DataModelLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let writer = match config.output {
        Output::Stdout => BoxMakeWriter::new(std::io::stdout),
        Output::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    layer_with_writer(config, writer)
}

/// Same as [`layer`] but writes to `make_writer`, ignoring `config.output`.
///
/// Events that fail to encode are dropped without a trace in the output;
/// `tracing-subscriber`'s plaintext "Unable to format" notice would break
/// the one-JSON-object-per-line stream.
pub fn layer_with_writer<S, W>(config: &LayerConfig, make_writer: W) -> DataModelLayer<S, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + 'static,
{
    tracing_subscriber::fmt::layer()
        .fmt_fields(JsonFields::new())
        .event_format(DataModelFormat::new().with_span_fields(config.include_span_fields))
        .with_writer(make_writer)
        .log_internal_errors(false)
}

/// Initialize the global `tracing` subscriber using [`LayerConfig`].
///
/// **Effects**
///
/// Installs a [`Registry`] with an [`EnvFilter`] built from
/// `config.filter` and the [`layer`] as the global default subscriber.
///
/// **Errors**
/// - [`InitError::Filter`] if `config.filter` is not a valid directive list.
/// - [`InitError::AlreadySet`] if a global subscriber was installed before.
pub fn init_tracing_with_config(config: LayerConfig) -> Result<(), InitError> {
    let filter = EnvFilter::try_new(&config.filter)?;
    let subscriber = Registry::default().with(filter).with(layer(&config));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize tracing from environment variables.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::from_env`]. This is the recommended entrypoint for
/// typical services.
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with_config(LayerConfig::from_env())
}
