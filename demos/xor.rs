use lamina_nn::{Network, NetworkConfig, Optimizer};
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

fn main() -> lamina_nn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .without_time()
        .init();

    let config = NetworkConfig {
        optimizer: Optimizer::momentum(),
        learning_rate: Some(0.3),
        seed: Some(7),
        ..NetworkConfig::default()
    };
    let mut network = Network::from_sizes(&[2, 3, 1], config)?;
    network.set_training(true);

    let inputs = [[1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]];
    let targets = [[1.0], [0.0], [1.0], [0.0]];
    let epochs = 5000;

    for epoch in 0..epochs {
        let mut loss = 0.0;
        for (input, target) in inputs.iter().zip(&targets) {
            network.forward(input)?;
            loss += network.cost(target);
            network.backward(target)?;
            network.apply_accumulated_gradients();
            network.reset_accumulated_gradients();
        }
        if epoch % 500 == 0 {
            info!(epoch, loss = loss / inputs.len() as f64, "Training");
        }
    }

    network.set_training(false);
    for input in &inputs {
        let output = network.forward(input)?;
        info!(?input, output = %format!("{:.4}", output[0]), "Prediction");
    }
    Ok(())
}
