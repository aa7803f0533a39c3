use tracing::{info, info_span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use tracing_data_model::init::{layer, LayerConfig, Output};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LayerConfig {
        output: Output::Stderr,
        ..LayerConfig::default()
    };

    // Compose the formatter into a registry built by the application.
    Registry::default()
        .with(EnvFilter::try_new(&config.filter)?)
        .with(layer(&config))
        .try_init()?;

    let request = info_span!("request", dd.trace_id = "abc123", dd.service = "checkout");
    let _guard = request.enter();

    for order_id in 1..=3 {
        info!(order_id, "order processed");
    }

    Ok(())
}
