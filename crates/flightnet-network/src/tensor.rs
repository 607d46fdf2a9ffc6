//! Shape-carrying weight and bias tensors.
//!
//! Both tensors store their values in a flat buffer and keep the [`Topology`]
//! they were built for. Weights are addressed as `(layer, neuron, source)` and
//! biases as `(layer, neuron)`, where `layer` counts from the input layer, so
//! valid layers are `1..topology.layer_count()`.
//!
//! # Equality
//!
//! [`WeightTensor`] equality is structural: two tensors are equal when their
//! topologies are equal and every weight has the same bit pattern. Hashing uses
//! the same definition, so tensors can be used as map keys and `Eq` holds even
//! though the values are floats.

use std::hash::{Hash, Hasher};

use rand::Rng;

use crate::{ShapeError, Topology};

/// Position of a single weight inside a [`WeightTensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightIndex {
    /// Layer the weight feeds into (`1..layer_count`).
    pub layer: usize,
    /// Neuron within `layer`.
    pub neuron: usize,
    /// Neuron within `layer - 1` the weight reads from.
    pub source: usize,
}

/// Connection weights of a feedforward network.
///
/// The shape is fixed by the topology: layer `l` holds `layer_size(l)` neurons,
/// each with `layer_size(l - 1)` weights.
#[derive(Debug, Clone)]
pub struct WeightTensor {
    topology: Topology,
    values: Vec<f32>,
}

impl PartialEq for WeightTensor {
    fn eq(&self, other: &Self) -> bool {
        self.topology == other.topology
            && self.values.len() == other.values.len()
            && std::iter::zip(&self.values, &other.values).all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for WeightTensor {}

impl Hash for WeightTensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.topology.hash(state);
        for value in &self.values {
            value.to_bits().hash(state);
        }
    }
}

impl WeightTensor {
    /// Builds a tensor by calling `f` for every weight position in storage order.
    ///
    /// Storage order is layer by layer, neuron by neuron, source by source.
    ///
    /// # Examples
    ///
    /// ```
    /// use flightnet_network::{Topology, WeightTensor};
    ///
    /// let topology = Topology::new(2, [2], 1).unwrap();
    /// let tensor = WeightTensor::from_fn(topology, |idx| idx.source as f32);
    /// assert_eq!(tensor.neuron(1, 0), &[0.0, 1.0]);
    /// assert_eq!(tensor.neuron(2, 0), &[0.0, 1.0]);
    /// ```
    pub fn from_fn<F>(topology: Topology, mut f: F) -> Self
    where
        F: FnMut(WeightIndex) -> f32,
    {
        let mut values = Vec::with_capacity(topology.weight_count());
        for layer in 1..topology.layer_count() {
            for neuron in 0..topology.layer_size(layer) {
                for source in 0..topology.layer_size(layer - 1) {
                    values.push(f(WeightIndex {
                        layer,
                        neuron,
                        source,
                    }));
                }
            }
        }
        Self { topology, values }
    }

    /// Creates a tensor with every weight drawn uniformly from `[-variance, variance]`.
    pub fn random<R>(topology: Topology, rng: &mut R, variance: f32) -> Self
    where
        R: Rng + ?Sized,
    {
        Self::from_fn(topology, |_| rng.random_range(-variance..=variance))
    }

    /// Builds a tensor from nested `layer → neuron → source` vectors.
    ///
    /// The outer vector holds the non-input layers only, so `layers[0]` feeds
    /// layer 1. Every dimension is checked against `topology`.
    pub fn from_layers(topology: Topology, layers: &[Vec<Vec<f32>>]) -> Result<Self, ShapeError> {
        let expected_layers = topology.layer_count() - 1;
        if layers.len() != expected_layers {
            return Err(ShapeError::LayerCount {
                expected: expected_layers,
                found: layers.len(),
            });
        }

        for (i, neurons) in layers.iter().enumerate() {
            let layer = i + 1;
            let expected_neurons = topology.layer_size(layer);
            if neurons.len() != expected_neurons {
                return Err(ShapeError::NeuronCount {
                    layer,
                    expected: expected_neurons,
                    found: neurons.len(),
                });
            }
            let expected_sources = topology.layer_size(layer - 1);
            for (neuron, weights) in neurons.iter().enumerate() {
                if weights.len() != expected_sources {
                    return Err(ShapeError::SourceCount {
                        layer,
                        neuron,
                        expected: expected_sources,
                        found: weights.len(),
                    });
                }
            }
        }

        let values = layers.iter().flatten().flatten().copied().collect();
        Ok(Self { topology, values })
    }

    /// Returns the weights as nested `layer → neuron → source` vectors.
    ///
    /// This is the inverse of [`WeightTensor::from_layers`].
    #[must_use]
    pub fn to_layers(&self) -> Vec<Vec<Vec<f32>>> {
        (1..self.topology.layer_count())
            .map(|layer| {
                (0..self.topology.layer_size(layer))
                    .map(|neuron| self.neuron(layer, neuron).to_vec())
                    .collect()
            })
            .collect()
    }

    /// Returns the topology this tensor was built for.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Returns all weights in storage order.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the incoming weights of `neuron` in `layer`.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is `0` or out of range, or `neuron` is out of range.
    #[must_use]
    pub fn neuron(&self, layer: usize, neuron: usize) -> &[f32] {
        assert!(layer > 0, "the input layer has no incoming weights");
        let sources = self.topology.layer_size(layer - 1);
        assert!(neuron < self.topology.layer_size(layer));
        let start = self.topology.weight_offset(layer) + neuron * sources;
        &self.values[start..start + sources]
    }

    /// Returns the weight at `index`, or `None` if it is outside the shape.
    #[must_use]
    pub fn get(&self, index: WeightIndex) -> Option<f32> {
        let WeightIndex {
            layer,
            neuron,
            source,
        } = index;
        if layer == 0 || layer >= self.topology.layer_count() {
            return None;
        }
        if neuron >= self.topology.layer_size(layer) || source >= self.topology.layer_size(layer - 1)
        {
            return None;
        }
        Some(self.neuron(layer, neuron)[source])
    }

    /// Returns a tensor of the same shape with `f` applied to every weight.
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: FnMut(f32) -> f32,
    {
        Self {
            topology: self.topology.clone(),
            values: self.values.iter().copied().map(f).collect(),
        }
    }
}

/// Per-neuron bias multipliers for every non-input layer.
///
/// A bias scales the weighted sum of its neuron before activation. An all-ones
/// tensor therefore leaves the network unbiased.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasTensor {
    topology: Topology,
    values: Vec<f32>,
}

impl BiasTensor {
    /// Creates a tensor with every bias set to `1.0`.
    #[must_use]
    pub fn ones(topology: Topology) -> Self {
        let values = vec![1.0; topology.bias_count()];
        Self { topology, values }
    }

    /// Creates a tensor with every bias drawn uniformly from `[-variance, variance]`.
    pub fn random<R>(topology: Topology, rng: &mut R, variance: f32) -> Self
    where
        R: Rng + ?Sized,
    {
        let values = (0..topology.bias_count())
            .map(|_| rng.random_range(-variance..=variance))
            .collect();
        Self { topology, values }
    }

    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Returns the biases of `layer` (`1..layer_count`).
    #[must_use]
    pub fn layer(&self, layer: usize) -> &[f32] {
        assert!(layer > 0, "the input layer has no biases");
        let start = self.topology.bias_offset(layer);
        &self.values[start..start + self.topology.layer_size(layer)]
    }
}
