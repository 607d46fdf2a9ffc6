use rand::Rng;

use crate::{BiasTensor, InputLengthError, ShapeError, Topology, WeightTensor, mutation};

/// Range random weights and biases are drawn from.
const INIT_VARIANCE: f32 = 1.0;

/// A feedforward network with `tanh` activations.
///
/// The network owns its weights, its biases, and a scratch buffer holding the
/// activation of every neuron from the most recent [`Network::calculate`]
/// call. Evaluation is deterministic: the same weights and inputs always
/// produce the same activations.
///
/// # Activation
///
/// For every non-input layer `l` and neuron `n`:
///
/// ```text
/// a[l][n] = tanh(bias[l][n] * Σ_k a[l-1][k] * w[l][n][k])
/// ```
///
/// The bias multiplies the weighted sum rather than being added to it. Trained
/// weights depend on this formulation, so it must not be changed to the usual
/// additive bias.
///
/// # Example
///
/// ```
/// use flightnet_network::{Network, Topology};
/// use rand::SeedableRng as _;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let topology = Topology::new(6, [5], 3).unwrap();
/// let mut network = Network::new(topology, None, false, &mut rng).unwrap();
///
/// network.calculate(&[22.0, 15.5, 22.0, 9.0, 3.5, 0.0]).unwrap();
/// let action = network.highest_output_index();
/// assert!(action < 3);
/// ```
#[derive(Debug, Clone)]
pub struct Network {
    weights: WeightTensor,
    biases: BiasTensor,
    activations: Vec<Vec<f32>>,
}

impl Network {
    /// Creates a network.
    ///
    /// Without `initial_weights`, every weight is drawn uniformly from
    /// `[-1, 1]`. Biases are all `1.0` (no bias) unless `use_bias` is set, in
    /// which case each is drawn uniformly from `[-1, 1]`.
    ///
    /// Fails if `initial_weights` was built for a different topology.
    pub fn new<R>(
        topology: Topology,
        initial_weights: Option<WeightTensor>,
        use_bias: bool,
        rng: &mut R,
    ) -> Result<Self, ShapeError>
    where
        R: Rng + ?Sized,
    {
        let biases = if use_bias {
            BiasTensor::random(topology.clone(), rng, INIT_VARIANCE)
        } else {
            BiasTensor::ones(topology.clone())
        };
        let weights = match initial_weights {
            Some(weights) => {
                check_topology(&topology, &weights)?;
                weights
            }
            None => WeightTensor::random(topology.clone(), rng, INIT_VARIANCE),
        };
        let activations = topology.layer_sizes().map(|size| vec![0.0; size]).collect();
        Ok(Self {
            weights,
            biases,
            activations,
        })
    }

    #[must_use]
    pub fn topology(&self) -> &Topology {
        self.weights.topology()
    }

    #[must_use]
    pub fn weights(&self) -> &WeightTensor {
        &self.weights
    }

    #[must_use]
    pub fn biases(&self) -> &BiasTensor {
        &self.biases
    }

    /// Replaces the weights wholesale.
    pub fn set_weights(&mut self, weights: WeightTensor) -> Result<(), ShapeError> {
        check_topology(self.topology(), &weights)?;
        self.weights = weights;
        Ok(())
    }

    /// Replaces the weights with fresh random weights in `[-1, 1]`.
    pub fn reset_weights<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.weights = WeightTensor::random(self.topology().clone(), rng, INIT_VARIANCE);
    }

    /// Returns a perturbed copy of `base` for this network's topology.
    ///
    /// See [`mutation::perturb`].
    pub fn mutate<R>(
        &self,
        base: &WeightTensor,
        variance: f32,
        rng: &mut R,
    ) -> Result<WeightTensor, ShapeError>
    where
        R: Rng + ?Sized,
    {
        check_topology(self.topology(), base)?;
        Ok(mutation::perturb(base, variance, rng))
    }

    /// Replaces the weights with a perturbed copy of themselves.
    pub fn vary_weights<R>(&mut self, variance: f32, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.weights = mutation::perturb(&self.weights, variance, rng);
    }

    /// Runs a forward pass, overwriting the activation buffer.
    ///
    /// Inputs are copied into the input layer unchanged.
    pub fn calculate(&mut self, inputs: &[f32]) -> Result<(), InputLengthError> {
        let expected = self.topology().inputs();
        if inputs.len() != expected {
            return Err(InputLengthError {
                expected,
                actual: inputs.len(),
            });
        }

        self.activations[0].copy_from_slice(inputs);
        for layer in 1..self.activations.len() {
            let (before, after) = self.activations.split_at_mut(layer);
            let previous = &before[layer - 1];
            let biases = self.biases.layer(layer);
            for (neuron, activation) in after[0].iter_mut().enumerate() {
                let weighted_sum = std::iter::zip(previous, self.weights.neuron(layer, neuron))
                    .map(|(a, w)| a * w)
                    .sum::<f32>();
                *activation = (biases[neuron] * weighted_sum).tanh();
            }
        }
        Ok(())
    }

    /// Returns the activations of every layer from the last calculation.
    #[must_use]
    pub fn activations(&self) -> &[Vec<f32>] {
        &self.activations
    }

    /// Returns the output layer activations from the last calculation.
    #[must_use]
    pub fn outputs(&self) -> &[f32] {
        &self.activations[self.activations.len() - 1]
    }

    /// Returns the index of the strongest output neuron.
    ///
    /// See [`highest_index`] for tie-breaking.
    #[must_use]
    pub fn highest_output_index(&self) -> usize {
        highest_index(self.outputs())
    }
}

/// Returns the index of the greatest value, preferring the lowest index on ties.
///
/// The scan starts from `f32::MIN` at index 0 and only moves on a strictly
/// greater value, so the first maximum wins. An empty slice (or one holding
/// only NaN) yields `0`.
///
/// ```
/// use flightnet_network::highest_index;
///
/// assert_eq!(highest_index(&[0.3, 0.3, 0.1]), 0);
/// assert_eq!(highest_index(&[0.1, 0.5, 0.5]), 1);
/// ```
#[must_use]
pub fn highest_index(values: &[f32]) -> usize {
    let mut highest_index = 0;
    let mut highest_value = f32::MIN;
    for (index, &value) in values.iter().enumerate() {
        if value > highest_value {
            highest_value = value;
            highest_index = index;
        }
    }
    highest_index
}

fn check_topology(expected: &Topology, weights: &WeightTensor) -> Result<(), ShapeError> {
    if weights.topology() != expected {
        return Err(ShapeError::Topology {
            expected: expected.clone(),
            found: weights.topology().clone(),
        });
    }
    Ok(())
}
