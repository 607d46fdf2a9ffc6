use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TopologyError;

/// Layer shapes of a fully connected feedforward network.
///
/// A topology is the input layer size, zero or more hidden layer sizes, and the
/// output layer size. Layers are indexed from the input layer (`0`) to the
/// output layer (`layer_count() - 1`); every layer after the input layer is
/// fully connected to the one before it.
///
/// The shape never changes once a network is created, so tensors carry their
/// topology and compare it before comparing values.
///
/// # Example
///
/// ```
/// use flightnet_network::Topology;
///
/// let topology = Topology::new(6, [5], 3).unwrap();
/// assert_eq!(topology.layer_count(), 3);
/// assert_eq!(topology.weight_count(), 6 * 5 + 5 * 3);
/// assert_eq!(topology.to_string(), "6-5-3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTopology")]
pub struct Topology {
    inputs: usize,
    hidden: Vec<usize>,
    outputs: usize,
}

#[derive(Deserialize)]
struct RawTopology {
    inputs: usize,
    #[serde(default)]
    hidden: Vec<usize>,
    outputs: usize,
}

impl TryFrom<RawTopology> for Topology {
    type Error = TopologyError;

    fn try_from(raw: RawTopology) -> Result<Self, Self::Error> {
        Self::new(raw.inputs, raw.hidden, raw.outputs)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sizes = self.layer_sizes();
        if let Some(first) = sizes.next() {
            write!(f, "{first}")?;
        }
        for size in sizes {
            write!(f, "-{size}")?;
        }
        Ok(())
    }
}

impl Topology {
    /// Creates a topology from its layer sizes.
    ///
    /// Every layer must contain at least one neuron, and the weight buffer of
    /// the whole network must be addressable, so weight counts and offsets
    /// never overflow.
    pub fn new<H>(inputs: usize, hidden: H, outputs: usize) -> Result<Self, TopologyError>
    where
        H: Into<Vec<usize>>,
    {
        let hidden = hidden.into();
        if inputs == 0 {
            return Err(TopologyError::EmptyInputLayer);
        }
        if let Some(index) = hidden.iter().position(|&size| size == 0) {
            return Err(TopologyError::EmptyHiddenLayer { index });
        }
        if outputs == 0 {
            return Err(TopologyError::EmptyOutputLayer);
        }
        let topology = Self {
            inputs,
            hidden,
            outputs,
        };
        let max_weights = isize::MAX.unsigned_abs() / size_of::<f32>();
        match topology.checked_weight_count() {
            Some(count) if count <= max_weights => Ok(topology),
            _ => Err(TopologyError::TooManyWeights),
        }
    }

    fn checked_weight_count(&self) -> Option<usize> {
        let sizes = self.layer_sizes().collect::<Vec<_>>();
        sizes.windows(2).try_fold(0_usize, |total, pair| {
            pair[0].checked_mul(pair[1])?.checked_add(total)
        })
    }

    /// Returns the number of input neurons.
    #[must_use]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Returns the sizes of the hidden layers, in order.
    #[must_use]
    pub fn hidden(&self) -> &[usize] {
        &self.hidden
    }

    /// Returns the number of output neurons.
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    /// Returns the number of layers including the input and output layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.hidden.len() + 2
    }

    /// Returns the number of neurons in `layer`.
    ///
    /// # Panics
    ///
    /// Panics if `layer >= self.layer_count()`.
    #[must_use]
    pub fn layer_size(&self, layer: usize) -> usize {
        match layer {
            0 => self.inputs,
            l if l <= self.hidden.len() => self.hidden[l - 1],
            l if l == self.hidden.len() + 1 => self.outputs,
            _ => panic!(
                "layer index {layer} out of range for {} layers",
                self.layer_count()
            ),
        }
    }

    /// Returns the sizes of all layers from input to output.
    pub fn layer_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.inputs)
            .chain(self.hidden.iter().copied())
            .chain(std::iter::once(self.outputs))
    }

    /// Returns the total number of connection weights.
    #[must_use]
    pub fn weight_count(&self) -> usize {
        (1..self.layer_count())
            .map(|layer| self.layer_size(layer) * self.layer_size(layer - 1))
            .sum()
    }

    /// Returns the number of neurons outside the input layer (one bias each).
    #[must_use]
    pub fn bias_count(&self) -> usize {
        self.layer_sizes().skip(1).sum()
    }

    /// Offset of the first weight feeding `layer` in a flat weight buffer.
    pub(crate) fn weight_offset(&self, layer: usize) -> usize {
        (1..layer)
            .map(|l| self.layer_size(l) * self.layer_size(l - 1))
            .sum()
    }

    /// Offset of the first bias of `layer` in a flat bias buffer.
    pub(crate) fn bias_offset(&self, layer: usize) -> usize {
        (1..layer).map(|l| self.layer_size(l)).sum()
    }
}
