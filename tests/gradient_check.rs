// Accumulated gradients against central finite differences of
// `0.5 * Σ (target - output)²` on an identity output layer.
//
// Accumulators hold the descent direction, so they should equal -dL/dθ.

use approx::assert_abs_diff_eq;
use lamina_nn::{
    ActivationFunction, ComputeBackend, Layer, LayerSpec, Network, NetworkConfig, NetworkSpec,
    ParameterAddress,
};

const STEP: f64 = 1e-6;

fn loss(network: &mut Network, input: &[f64], target: &[f64]) -> f64 {
    let output = network.forward(input).unwrap();
    0.5 * target.iter().zip(&output).map(|(t, o)| (t - o) * (t - o)).sum::<f64>()
}

fn accumulated(network: &Network, layer: usize, unit: usize, element: usize) -> f64 {
    match &network.layers()[layer] {
        Layer::FullyConnected(fc) => {
            let neuron = &fc.neurons[unit];
            if element == 0 { neuron.delta_bias } else { neuron.delta_weights[element - 1] }
        }
        Layer::Convolutional(conv) => {
            let filter = &conv.filters[unit];
            if element == 0 {
                filter.delta_bias
            } else {
                filter.delta_weights.iter().flatten().flatten().nth(element - 1).copied().unwrap()
            }
        }
        other => panic!("{} has no parameters", other.name()),
    }
}

fn check(spec: &NetworkSpec, input: &[f64], target: &[f64]) {
    let mut network = Network::new(spec).unwrap();
    network.forward(input).unwrap();
    network.backward(target).unwrap();

    for layer in 1..network.layers().len() {
        let units = network.layers()[layer].unit_count();
        let elements = network.layers()[layer].unit_size();
        for unit in 0..units {
            for element in 0..elements {
                let address = ParameterAddress::new(layer, unit, element);
                let original = network.parameter(address).unwrap();

                let mut probe = network.clone();
                probe.set_parameter(address, original + STEP).unwrap();
                let plus = loss(&mut probe, input, target);
                probe.set_parameter(address, original - STEP).unwrap();
                let minus = loss(&mut probe, input, target);

                let numeric = -(plus - minus) / (2.0 * STEP);
                assert_abs_diff_eq!(accumulated(&network, layer, unit, element), numeric, epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn fully_connected_gradients() {
    let spec = NetworkSpec::new(
        "mlp",
        [
            LayerSpec::input(3),
            LayerSpec::fully_connected(4).with_activation(ActivationFunction::Tanh),
            LayerSpec::fully_connected(3),
            LayerSpec::fully_connected(2).with_activation(ActivationFunction::Identity),
        ],
    )
    .with_config(NetworkConfig { seed: Some(41), ..NetworkConfig::default() });
    check(&spec, &[0.2, -0.7, 0.4], &[0.3, -0.1]);
}

#[test]
fn convolution_and_pooling_gradients() {
    let spec = NetworkSpec::new(
        "cnn",
        [
            LayerSpec::input_volume(2, 5),
            LayerSpec::convolutional(2),
            LayerSpec::Convolutional {
                filter_count: 2,
                filter_size: 2,
                zero_padding: Some(0),
                stride: 1,
                activation: Some(ActivationFunction::Tanh),
            },
            LayerSpec::pooling(2),
            LayerSpec::fully_connected(2).with_activation(ActivationFunction::Identity),
        ],
    )
    .with_config(NetworkConfig { seed: Some(42), ..NetworkConfig::default() });

    let input: Vec<f64> = (0..50).map(|i| ((i * 7 % 11) as f64 / 11.0) - 0.4).collect();
    check(&spec, &input, &[0.5, -0.5]);
}
