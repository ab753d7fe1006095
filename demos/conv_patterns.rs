// Teaches a small conv -> pool -> fully-connected network to tell horizontal
// bars from vertical bars on a 6x6 grid.
use lamina_nn::{
    ActivationFunction, CostFunction, LayerSpec, Network, NetworkConfig, NetworkSpec, Optimizer,
};
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

const SIDE: usize = 6;

fn bar(index: usize, horizontal: bool) -> Vec<f64> {
    let mut grid = vec![0.0; SIDE * SIDE];
    for i in 0..SIDE {
        let cell = if horizontal { index * SIDE + i } else { i * SIDE + index };
        grid[cell] = 1.0;
    }
    grid
}

fn main() -> lamina_nn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .without_time()
        .init();

    let spec = NetworkSpec::new(
        "bars",
        [
            LayerSpec::input_volume(1, SIDE),
            LayerSpec::convolutional(2).with_activation(ActivationFunction::ReLU),
            LayerSpec::pooling(2),
            LayerSpec::fully_connected(2).with_activation(ActivationFunction::Softmax),
        ],
    )
    .with_config(NetworkConfig {
        optimizer: Optimizer::adam(),
        cost: CostFunction::CrossEntropy,
        mini_batch_size: 4,
        seed: Some(11),
        ..NetworkConfig::default()
    });
    let mut network = Network::new(&spec)?;
    network.set_training(true);

    let mut samples: Vec<(Vec<f64>, Vec<f64>)> = (0..SIDE)
        .flat_map(|i| [(bar(i, true), vec![1.0, 0.0]), (bar(i, false), vec![0.0, 1.0])])
        .collect();
    let mut rng = StdRng::seed_from_u64(3);
    let batch = spec.config.mini_batch_size;

    for epoch in 0..200 {
        samples.shuffle(&mut rng);
        let mut loss = 0.0;
        for chunk in samples.chunks(batch) {
            for (input, target) in chunk {
                network.forward(input)?;
                loss += network.cost(target);
                network.backward(target)?;
            }
            network.apply_accumulated_gradients();
            network.reset_accumulated_gradients();
        }
        if epoch % 20 == 0 {
            info!(epoch, loss = loss / samples.len() as f64, "Training");
        }
    }

    network.set_training(false);
    let mut correct = 0;
    for (input, target) in &samples {
        let output = network.forward(input)?;
        let predicted = if output[0] > output[1] { 0 } else { 1 };
        let expected = if target[0] > target[1] { 0 } else { 1 };
        if predicted == expected {
            correct += 1;
        }
    }
    info!(correct, total = samples.len(), "Evaluation");
    Ok(())
}
