use tracing::{error, info, warn};

use tracing_data_model::init::{init_tracing_with_config, LayerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // `LOG_DATA_MODEL_FILTER=debug cargo run --example basic` overrides the filter.
    init_tracing_with_config(LayerConfig::from_env())?;

    info!(
        dd.trace_id = "1234",
        dd.span_id = "12345678",
        dd.service = "test-service",
        dd.version = "1.0.0",
        "Test message"
    );

    warn!(user_id = "123", request_type = "api", "slow request");

    error!(
        dd.trace_id = "1234",
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    Ok(())
}
