// Update rules, regularization, max-norm and dropout, driven through the
// public network API.

use approx::assert_relative_eq;
use lamina_nn::backend::{ComputeBackend, ParameterAddress};
use lamina_nn::{
    ActivationFunction, CostFunction, Layer, LayerSpec, Network, NetworkConfig, NetworkSpec,
    Optimizer,
};

fn config(seed: u64) -> NetworkConfig {
    NetworkConfig { seed: Some(seed), ..NetworkConfig::default() }
}

fn set_delta_weights(network: &mut Network, layer: usize, deltas: &[f64]) {
    match &mut network.layers_mut()[layer] {
        Layer::FullyConnected(fc) => fc.neurons[0].delta_weights.copy_from_slice(deltas),
        other => panic!("expected a fully-connected layer, got {}", other.name()),
    }
}

#[test]
fn identical_weights_and_input_give_identical_outputs() {
    let spec = NetworkSpec::new(
        "determinism",
        [
            LayerSpec::input_volume(1, 5),
            LayerSpec::convolutional(2),
            LayerSpec::fully_connected(3),
        ],
    )
    .with_config(config(21));
    let mut a = Network::new(&spec).unwrap();
    let mut b = Network::new(&spec).unwrap();
    assert_eq!(a.export_flat(), b.export_flat());

    let input: Vec<f64> = (0..25).map(|i| (i as f64 * 0.37).sin()).collect();
    let first = a.forward(&input).unwrap();
    assert_eq!(first, a.forward(&input).unwrap());
    assert_eq!(first, b.forward(&input).unwrap());

    a.set_training(true);
    assert_eq!(first, a.forward(&input).unwrap());
}

#[test]
fn l2_penalty_is_accumulated_per_weight() {
    let config = NetworkConfig { l2: 0.001, mini_batch_size: 1, ..config(22) };
    let mut network = Network::from_sizes(&[1, 1], config).unwrap();
    network.set_parameter(ParameterAddress::new(1, 0, 1), 0.25).unwrap();
    set_delta_weights(&mut network, 1, &[0.5]);

    network.apply_accumulated_gradients();

    let penalties = network.take_penalties();
    assert_eq!(penalties.l2, 0.5 * 0.001 * 0.25 * 0.25);
    assert_eq!(penalties.l1, 0.0);
    assert_eq!(network.take_penalties().l2, 0.0);
}

#[test]
fn regularized_update_uses_the_penalized_gradient() {
    let config = NetworkConfig {
        l1: 0.01,
        l2: 0.001,
        mini_batch_size: 2,
        learning_rate: Some(0.1),
        ..config(23)
    };
    let mut network = Network::from_sizes(&[1, 1], config).unwrap();
    network.set_parameter(ParameterAddress::new(1, 0, 1), 0.25).unwrap();
    set_delta_weights(&mut network, 1, &[0.5]);

    network.apply_accumulated_gradients();

    let gradient = (0.5 + 0.001 * 0.25 + 0.01) / 2.0;
    let weight = network.parameter(ParameterAddress::new(1, 0, 1)).unwrap();
    assert_relative_eq!(weight, 0.25 + 0.1 * gradient, epsilon = 1e-12);
}

fn max_norm_network(cap: f64) -> Network {
    let config = NetworkConfig { max_norm: Some(cap), learning_rate: Some(0.0), ..config(24) };
    let mut network = Network::from_sizes(&[2, 1], config).unwrap();
    network.set_parameter(ParameterAddress::new(1, 0, 1), 2.0).unwrap();
    network.set_parameter(ParameterAddress::new(1, 0, 2), 2.0).unwrap();
    network
}

#[test]
fn max_norm_rescales_to_the_cap() {
    let mut network = max_norm_network(1.0);
    network.apply_accumulated_gradients();
    for element in 1..=2 {
        let w = network.parameter(ParameterAddress::new(1, 0, element)).unwrap();
        assert_relative_eq!(w, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
    }
}

#[test]
fn max_norm_leaves_small_weights_alone() {
    let mut network = max_norm_network(1000.0);
    network.apply_accumulated_gradients();
    for element in 1..=2 {
        assert_eq!(network.parameter(ParameterAddress::new(1, 0, element)).unwrap(), 2.0);
    }
}

/// The output layer is exempt: its activations are compared against the
/// target, so dropping them would discard the error signal itself.
#[test]
fn zero_keep_probability_drops_every_hidden_neuron() {
    let config = NetworkConfig { dropout: 0.0, ..config(25) };
    let mut network = Network::from_sizes(&[3, 4, 2], config).unwrap();
    network.set_training(true);
    let before = network.export_flat();

    network.forward(&[0.3, -0.6, 0.9]).unwrap();
    match &network.layers()[1] {
        Layer::FullyConnected(fc) => {
            assert!(fc.neurons.iter().all(|n| n.dropped && n.activation == 0.0));
        }
        other => panic!("expected a fully-connected layer, got {}", other.name()),
    }

    network.backward(&[1.0, 0.0]).unwrap();
    match &network.layers()[1] {
        Layer::FullyConnected(fc) => {
            for neuron in &fc.neurons {
                assert!(neuron.delta_weights.iter().all(|&d| d == 0.0));
                assert_eq!(neuron.delta_bias, 0.0);
            }
        }
        other => panic!("expected a fully-connected layer, got {}", other.name()),
    }

    network.apply_accumulated_gradients();
    let after = network.export_flat();
    let hidden = network.data_sizes()[0];
    assert_eq!(&after[..hidden], &before[..hidden]);
}

#[test]
fn dropout_is_inactive_outside_training() {
    let config = NetworkConfig { dropout: 0.0, ..config(26) };
    let mut network = Network::from_sizes(&[3, 4, 2], config).unwrap();
    network.forward(&[0.3, -0.6, 0.9]).unwrap();
    match &network.layers()[1] {
        Layer::FullyConnected(fc) => assert!(fc.neurons.iter().all(|n| !n.dropped)),
        other => panic!("expected a fully-connected layer, got {}", other.name()),
    }
}

#[test]
fn evaluation_output_ignores_keep_probability() {
    let input = [0.3, -0.6, 0.9];
    let mut halved = Network::from_sizes(&[3, 4, 2], NetworkConfig { dropout: 0.5, ..config(26) }).unwrap();
    let mut full = Network::from_sizes(&[3, 4, 2], NetworkConfig { dropout: 1.0, ..config(26) }).unwrap();
    assert_eq!(halved.forward(&input).unwrap(), full.forward(&input).unwrap());
}

fn conv_dropout_network(seed: u64) -> Network {
    let spec = NetworkSpec::new(
        "conv-dropout",
        [
            LayerSpec::input_volume(1, 4),
            LayerSpec::convolutional(2),
            LayerSpec::fully_connected(2),
        ],
    )
    .with_config(NetworkConfig { dropout: 0.0, ..config(seed) });
    Network::new(&spec).unwrap()
}

#[test]
fn zero_keep_probability_drops_every_conv_cell() {
    let mut network = conv_dropout_network(30);
    network.set_training(true);
    let input: Vec<f64> = (0..16).map(|i| i as f64 / 16.0 - 0.4).collect();

    network.forward(&input).unwrap();
    match &network.layers()[1] {
        Layer::Convolutional(conv) => {
            for filter in &conv.filters {
                assert!(filter.activation_map.iter().flatten().all(|&a| a == 0.0));
                assert!(filter.dropout_map.iter().flatten().all(|&dropped| dropped));
            }
        }
        other => panic!("expected a convolutional layer, got {}", other.name()),
    }

    network.backward(&[1.0, 0.0]).unwrap();
    match &network.layers()[1] {
        Layer::Convolutional(conv) => {
            for filter in &conv.filters {
                assert!(filter.delta_weights.iter().flatten().flatten().all(|&d| d == 0.0));
                assert_eq!(filter.delta_bias, 0.0);
            }
        }
        other => panic!("expected a convolutional layer, got {}", other.name()),
    }
}

#[test]
fn conv_dropout_is_inactive_outside_training() {
    let mut network = conv_dropout_network(31);
    network.forward(&[0.5; 16]).unwrap();
    match &network.layers()[1] {
        Layer::Convolutional(conv) => {
            for filter in &conv.filters {
                assert!(filter.dropout_map.iter().flatten().all(|&dropped| !dropped));
            }
        }
        other => panic!("expected a convolutional layer, got {}", other.name()),
    }
}

#[test]
fn mismatched_lengths_are_fitted_not_rejected() {
    let mut network = Network::from_sizes(&[3, 2, 2], config(32)).unwrap();

    let short = network.forward(&[0.1]).unwrap();
    assert_eq!(short, network.forward(&[0.1, 0.0, 0.0]).unwrap());

    let long = network.forward(&[0.1, 0.2, 0.3, 9.0]).unwrap();
    assert_eq!(long, network.forward(&[0.1, 0.2, 0.3]).unwrap());

    assert!(network.backward(&[1.0]).is_ok());
    assert!(network.backward(&[1.0, 0.0, 5.0]).is_ok());
}

fn cost_after_training(optimizer: Optimizer) -> (f64, f64) {
    let config = NetworkConfig { optimizer, ..config(27) };
    let mut network = Network::from_sizes(&[1, 1], config).unwrap();
    network.set_parameter(ParameterAddress::bias(1, 0), 0.0).unwrap();
    network.set_parameter(ParameterAddress::new(1, 0, 1), 0.0).unwrap();

    let (input, target) = ([1.0], [0.9]);
    network.forward(&input).unwrap();
    let initial = network.cost(&target);

    for _ in 0..200 {
        network.forward(&input).unwrap();
        network.backward(&target).unwrap();
        network.apply_accumulated_gradients();
        network.reset_accumulated_gradients();
    }
    network.forward(&input).unwrap();
    (initial, network.cost(&target))
}

#[test]
fn every_optimizer_reduces_the_cost() {
    let optimizers = [
        Optimizer::Sgd,
        Optimizer::momentum(),
        Optimizer::Gain,
        Optimizer::Adagrad,
        Optimizer::rmsprop(),
        Optimizer::adam(),
        Optimizer::adadelta(),
    ];
    for optimizer in optimizers {
        let (initial, last) = cost_after_training(optimizer);
        assert!(last < initial, "{optimizer:?}: cost went from {initial} to {last}");
    }
}

#[test]
fn update_step_counts_applied_batches() {
    let mut network = Network::from_sizes(&[2, 2, 1], config(28)).unwrap();
    assert_eq!(network.update_step(), 0);
    for _ in 0..3 {
        network.forward(&[0.1, 0.2]).unwrap();
        network.backward(&[1.0]).unwrap();
        network.apply_accumulated_gradients();
        network.reset_accumulated_gradients();
    }
    assert_eq!(network.update_step(), 3);
}

#[test]
fn softmax_output_with_cross_entropy_learns_a_class() {
    let spec = NetworkSpec::new(
        "softmax",
        [
            LayerSpec::input(2),
            LayerSpec::fully_connected(4),
            LayerSpec::fully_connected(3).with_activation(ActivationFunction::Softmax),
        ],
    )
    .with_config(NetworkConfig { cost: CostFunction::CrossEntropy, ..config(29) });
    let mut network = Network::new(&spec).unwrap();

    let output = network.forward(&[0.5, -0.5]).unwrap();
    assert_relative_eq!(output.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

    let target = [0.0, 1.0, 0.0];
    let initial = network.cost(&target);
    for _ in 0..50 {
        network.forward(&[0.5, -0.5]).unwrap();
        network.backward(&target).unwrap();
        network.apply_accumulated_gradients();
        network.reset_accumulated_gradients();
    }
    network.forward(&[0.5, -0.5]).unwrap();
    assert!(network.cost(&target) < initial);
}
