use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::Matrix;

/// A fully-connected layer
///
/// Weights are `[inputs, neurons]`, biases `[1, neurons]`. The weight
/// gradient is held in the transposed `[neurons, inputs]` orientation it
/// falls out of backpropagation in; the optimizer transposes it back when
/// updating (see [`optim::Adam`](super::optim::Adam)).
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub n_inputs: usize,
    pub n_neurons: usize,

    pub weights: Matrix,
    pub biases: Matrix,

    /// Adam first/second moment estimates, empty until the first update
    pub weight_momentums: Matrix,
    pub weight_cache: Matrix,
    pub bias_momentums: Matrix,
    pub bias_cache: Matrix,

    pub weight_regularizer_l1: f64,
    pub weight_regularizer_l2: f64,
    pub bias_regularizer_l1: f64,
    pub bias_regularizer_l2: f64,

    inputs: Matrix,

    /// Gradient w.r.t. weights, transposed: `[neurons, inputs]`
    pub dweights: Matrix,
    pub dbiases: Matrix,
    pub dinputs: Matrix,
}

impl DenseLayer {
    /// Build a layer with He-initialized weights and biases of 0.1
    pub fn new(
        n_inputs: usize,
        n_neurons: usize,
        weight_regularizer_l1: f64,
        weight_regularizer_l2: f64,
        bias_regularizer_l1: f64,
        bias_regularizer_l2: f64,
        rng: &mut impl Rng,
    ) -> Self {
        let he = Normal::new(0.0, 1.0).expect("unit normal is well-formed");
        let scale = (2.0 / n_inputs as f64).sqrt();
        let weights = Matrix::from_fn(n_inputs, n_neurons, |_, _| he.sample(rng) * scale);

        Self {
            n_inputs,
            n_neurons,
            weights,
            biases: Matrix::filled(1, n_neurons, 0.1),
            weight_momentums: Matrix::default(),
            weight_cache: Matrix::default(),
            bias_momentums: Matrix::default(),
            bias_cache: Matrix::default(),
            weight_regularizer_l1,
            weight_regularizer_l2,
            bias_regularizer_l1,
            bias_regularizer_l2,
            inputs: Matrix::default(),
            dweights: Matrix::default(),
            dbiases: Matrix::default(),
            dinputs: Matrix::default(),
        }
    }

    /// Forward pass: `inputs * W + b`, broadcasting the bias over rows
    ///
    /// Caches `inputs` for the backward pass.
    ///
    /// **Panics** if `inputs.cols() != n_inputs`
    pub fn forward(&mut self, inputs: &Matrix) -> Matrix {
        assert_eq!(
            inputs.cols(),
            self.weights.rows(),
            "layer input width {} does not match weight rows {}",
            inputs.cols(),
            self.weights.rows()
        );
        self.inputs = inputs.clone();
        let mut output = inputs.dot(&self.weights);
        output.add_row_broadcast(&self.biases);
        output
    }

    /// Backward pass from the gradient on this layer's output
    ///
    /// Populates `dweights` (transposed), `dbiases`, and `dinputs`, folding
    /// in L1/L2 regularization gradients and clipping the parameter
    /// gradients element-wise to `[-1, 1]`.
    ///
    /// **Panics** if `dvalues.cols() != n_neurons`
    pub fn backward(&mut self, dvalues: &Matrix) {
        assert_eq!(
            dvalues.cols(),
            self.n_neurons,
            "gradient width {} does not match layer neurons {}",
            dvalues.cols(),
            self.n_neurons
        );

        self.dweights = dvalues.transpose().dot(&self.inputs);
        self.dbiases = dvalues.col_sums();

        if self.weight_regularizer_l1 > 0.0 {
            let mut term = self.weights.signum();
            term.scale(self.weight_regularizer_l1);
            self.dweights.add_assign(&term.transpose());
        }
        if self.weight_regularizer_l2 > 0.0 {
            let mut term = self.weights.clone();
            term.scale(2.0 * self.weight_regularizer_l2);
            self.dweights.add_assign(&term.transpose());
        }
        if self.bias_regularizer_l1 > 0.0 {
            let mut term = self.biases.signum();
            term.scale(self.bias_regularizer_l1);
            self.dbiases.add_assign(&term);
        }
        if self.bias_regularizer_l2 > 0.0 {
            let mut term = self.biases.clone();
            term.scale(2.0 * self.bias_regularizer_l2);
            self.dbiases.add_assign(&term);
        }

        self.dinputs = dvalues.dot(&self.weights.transpose());

        self.dweights.clamp(-1.0, 1.0);
        self.dbiases.clamp(-1.0, 1.0);
    }

    /// Redraw every weight and bias uniformly in `[0, 1)`
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        self.weights = Matrix::from_fn(self.n_inputs, self.n_neurons, |_, _| rng.gen::<f64>());
        self.biases = Matrix::from_fn(1, self.n_neurons, |_, _| rng.gen::<f64>());
    }

    /// True when weights, biases, and any allocated Adam state are all finite
    pub fn parameters_finite(&self) -> bool {
        self.weights.is_finite()
            && self.biases.is_finite()
            && self.weight_momentums.is_finite()
            && self.weight_cache.is_finite()
            && self.bias_momentums.is_finite()
            && self.bias_cache.is_finite()
    }
}
