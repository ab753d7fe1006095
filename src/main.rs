// The library does all the work; this binary only wires a network from a
// spec file and reports its shape. Try:
//   RUST_LOG=debug cargo run -- network.json
use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;

use lamina_nn::{Network, NetworkSpec};

fn main() -> ExitCode {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(format().with_target(false).without_time())
        .init();

    let Some(path) = env::args().nth(1) else {
        error!("usage: lamina-nn <network-spec.json>");
        return ExitCode::FAILURE;
    };

    match summarize(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(path = %path, "{e}");
            ExitCode::FAILURE
        }
    }
}

fn summarize(path: &str) -> lamina_nn::Result<()> {
    let spec = NetworkSpec::load_json(path)?;
    let network = Network::new(&spec)?;

    info!(name = %network.name, optimizer = ?network.config().optimizer, "Loaded network");
    for (i, layer) in network.layers().iter().enumerate() {
        let shape = layer.output_shape();
        info!(
            index = i,
            kind = layer.name(),
            channels = shape.channels,
            map_size = shape.map_size,
            parameters = layer.data_size(),
            "Layer"
        );
    }
    info!(parameters = network.data_sizes().iter().sum::<usize>(), "Total");
    Ok(())
}
