//! Feedforward network engine for flightnet agents.
//!
//! This crate contains everything an agent needs to turn a sensor reading into
//! an action, plus the single operator used to evolve it:
//!
//! - [`Topology`] - Fixed layer sizes (inputs, hidden layers, outputs)
//! - [`WeightTensor`] / [`BiasTensor`] - Shape-carrying parameter tensors
//! - [`Network`] - `tanh` feedforward evaluator owning its tensors and activation buffer
//! - [`mutation`] - Uniform perturbation with clamping (the evolutionary operator)
//!
//! # Architecture
//!
//! ```text
//! sensor vector (f32 per ray, optionally the last action)
//!     ↓ Network::calculate
//! output activations
//!     ↓ Network::highest_output_index
//! action index
//! ```
//!
//! Networks never share weight buffers. Evolution produces a new
//! [`WeightTensor`] from a base tensor and hands it to a network, so a champion
//! tensor can be copied into many agents without aliasing.
//!
//! # Example
//!
//! ```
//! use flightnet_network::{Network, Topology, mutation};
//! use rand::SeedableRng as _;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let topology = Topology::new(6, [5], 3).unwrap();
//!
//! let champion = Network::new(topology.clone(), None, false, &mut rng).unwrap();
//! let child_weights = mutation::perturb(champion.weights(), 0.25, &mut rng);
//! let mut child = Network::new(topology, Some(child_weights), false, &mut rng).unwrap();
//!
//! child.calculate(&[1.0, 2.0, 3.0, 2.0, 1.0, 0.0]).unwrap();
//! println!("chosen output: {}", child.highest_output_index());
//! ```
//!
//! # Current Limitations
//!
//! - **Fixed activation**: every neuron uses `tanh`, including the output layer
//! - **Multiplicative bias**: biases scale the weighted sum instead of shifting it
//! - **Weights only**: perturbation applies to weights; biases stay as created

pub use self::{network::*, tensor::*, topology::*};

pub mod mutation;
mod network;
mod tensor;
mod topology;

/// Invalid layer sizes.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum TopologyError {
    #[display("input layer must have at least one neuron")]
    EmptyInputLayer,
    #[display("hidden layer {index} must have at least one neuron")]
    EmptyHiddenLayer { index: usize },
    #[display("output layer must have at least one neuron")]
    EmptyOutputLayer,
    #[display("layers are too large to hold their connection weights in memory")]
    TooManyWeights,
}

/// A tensor whose shape does not match the expected topology.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ShapeError {
    #[display("weights built for topology {found}, expected {expected}")]
    Topology { expected: Topology, found: Topology },
    #[display("expected {expected} weight layers, found {found}")]
    LayerCount { expected: usize, found: usize },
    #[display("layer {layer}: expected {expected} neurons, found {found}")]
    NeuronCount {
        layer: usize,
        expected: usize,
        found: usize,
    },
    #[display("layer {layer} neuron {neuron}: expected {expected} weights, found {found}")]
    SourceCount {
        layer: usize,
        neuron: usize,
        expected: usize,
        found: usize,
    },
}

/// A sensor vector whose length differs from the network's input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("network expects {expected} inputs, got {actual}")]
pub struct InputLengthError {
    pub expected: usize,
    pub actual: usize,
}
