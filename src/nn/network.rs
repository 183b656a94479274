use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use log::warn;
use rand::Rng;
use thiserror::Error;

use super::loss::{huber_loss, huber_loss_gradient, regularization_loss};
use super::optim::{Adam, AdamParams};
use super::{DenseLayer, LeakyRelu, Matrix, Role};

const HUBER_DELTA: f64 = 1.0;

/// Weight L2 penalty on the input layer
const INPUT_WEIGHT_L2: f64 = 1e-4;
/// Weight L2 penalty on hidden and output layers
const DEEP_WEIGHT_L2: f64 = 5e-5;

/// Numeric failure inside a network: a forward output or a post-update
/// parameter probe found NaN/Inf
///
/// Not recoverable; the top-level policy is log-and-abort.
#[derive(Debug, Error)]
pub enum NnError {
    #[error("non-finite values detected in {context}\n{dump}")]
    NonFinite { context: String, dump: String },
}

impl NnError {
    pub(crate) fn non_finite(context: &str, matrix: &Matrix) -> Self {
        Self::NonFinite {
            context: context.to_string(),
            dump: matrix.to_string(),
        }
    }
}

/// Structural dimensions of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSpec {
    pub input_dim: usize,
    pub output_dim: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub batch_size: usize,
}

impl NetworkSpec {
    /// Input width of layer `i`
    pub(crate) fn layer_in(&self, i: usize) -> usize {
        if i == 0 {
            self.input_dim
        } else {
            self.hidden_dim
        }
    }

    /// Output width of layer `i`
    pub(crate) fn layer_out(&self, i: usize) -> usize {
        if i == self.num_layers - 1 {
            self.output_dim
        } else {
            self.hidden_dim
        }
    }
}

/// Append-only loss log, one total-loss value per line
///
/// Only the trainable roles ([`Role::DqnOnline`], [`Role::RndPredictor`])
/// carry one. The file is truncated when attached and flushed after every
/// line so a crash never loses the training curve.
#[derive(Debug)]
struct LossLog {
    file: File,
}

impl LossLog {
    fn create(dir: &Path, name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let file = File::create(dir.join(name))?;
        Ok(Self { file })
    }

    fn append(&mut self, loss: f64) -> io::Result<()> {
        writeln!(self.file, "{}", loss)?;
        self.file.flush()
    }
}

/// A dense feed-forward network: `num_layers` layers interleaved with
/// leaky-rectified activations, no activation after the output layer
///
/// The external data convention is column-major with the batch along the
/// second axis: a flat input of length `input_dim * batch` holds `batch`
/// consecutive feature vectors, and outputs come back the same way.
#[derive(Debug)]
pub struct Network {
    layers: Vec<DenseLayer>,
    activations: Vec<LeakyRelu>,
    optimizer: Adam,
    spec: NetworkSpec,
    role: Role,
    loss_log: Option<LossLog>,
}

impl Network {
    /// Build a freshly He-initialized network
    ///
    /// **Panics** if `num_layers < 3` or `hidden_dim < 1`
    pub fn new(spec: NetworkSpec, role: Role, params: &AdamParams, rng: &mut impl Rng) -> Self {
        assert!(spec.num_layers >= 3, "a network needs at least 3 layers");
        assert!(spec.hidden_dim >= 1, "hidden dimension must be at least 1");

        let mut layers = Vec::with_capacity(spec.num_layers);
        for i in 0..spec.num_layers {
            let l2 = if i == 0 { INPUT_WEIGHT_L2 } else { DEEP_WEIGHT_L2 };
            layers.push(DenseLayer::new(
                spec.layer_in(i),
                spec.layer_out(i),
                0.0,
                l2,
                0.0,
                0.0,
                rng,
            ));
        }
        let activations = vec![LeakyRelu::default(); spec.num_layers - 1];

        for layer in &layers {
            assert!(
                layer.parameters_finite(),
                "freshly initialized layer contains non-finite parameters"
            );
        }

        Self {
            layers,
            activations,
            optimizer: Adam::from_params(params),
            spec,
            role,
            loss_log: None,
        }
    }

    pub fn spec(&self) -> NetworkSpec {
        self.spec
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    /// Open (truncating) this network's loss log under `dir`
    ///
    /// A no-op for the target roles, which never log.
    pub fn attach_loss_log(&mut self, dir: &Path) -> io::Result<()> {
        if let Some(name) = self.role.loss_log_name() {
            self.loss_log = Some(LossLog::create(dir, name)?);
        }
        Ok(())
    }

    /// Forward a column-major `[input_dim, batch]` block, producing a
    /// column-major `[output_dim, batch]` block
    ///
    /// **Panics** if `input.len() != input_dim * batch`
    pub fn predict(&mut self, input: &[f64], batch: usize) -> Result<Vec<f64>, NnError> {
        let output = self.forward(input, batch)?;
        Ok(output.as_slice().to_vec())
    }

    /// One optimization step toward a column-major target block, returning
    /// the total (Huber + regularization) loss
    ///
    /// The batch size is the one the network was configured with.
    ///
    /// **Panics** on input or target length mismatch
    pub fn train(&mut self, input: &[f64], target: &[f64]) -> Result<f64, NnError> {
        let batch = self.spec.batch_size;
        assert_eq!(
            target.len(),
            self.spec.output_dim * batch,
            "target length does not cover the batch"
        );

        let output = self.forward(input, batch)?;
        let expected = Matrix::from_vec(batch, self.spec.output_dim, target.to_vec());

        let data_loss = huber_loss(&output, &expected, HUBER_DELTA);
        let reg_loss: f64 = self.layers.iter().map(regularization_loss).sum();
        let total_loss = data_loss + reg_loss;

        if let Some(log) = &mut self.loss_log {
            if let Err(e) = log.append(total_loss) {
                warn!("loss log write failed: {}", e);
            }
        }

        let d_loss = huber_loss_gradient(&output, &expected, HUBER_DELTA);
        let last = self.layers.len() - 1;
        self.layers[last].backward(&d_loss);
        for i in (0..last).rev() {
            let upstream = self.layers[i + 1].dinputs.clone();
            let d_act = self.activations[i].backward(&upstream);
            self.layers[i].backward(&d_act);
        }

        self.optimizer.pre_update_params();
        for layer in &mut self.layers {
            self.optimizer.update(layer)?;
        }

        Ok(total_loss)
    }

    fn forward(&mut self, input: &[f64], batch: usize) -> Result<Matrix, NnError> {
        assert_eq!(
            input.len(),
            self.spec.input_dim * batch,
            "input length does not cover the batch"
        );

        // A column-major [input_dim, batch] flat block has the same layout
        // as the row-major [batch, input_dim] matrix the layers consume.
        let mut x = Matrix::from_vec(batch, self.spec.input_dim, input.to_vec());
        let last = self.layers.len() - 1;
        for i in 0..last {
            let pre = self.layers[i].forward(&x);
            x = self.activations[i].forward(&pre);
        }
        let output = self.layers[last].forward(&x);

        if output.has_nan() || output.has_inf() {
            return Err(NnError::non_finite("network output", &output));
        }
        Ok(output)
    }

    /// Persist this network into `dir` (see [`io`](super::io))
    pub fn save(&self, dir: &Path) -> Result<(), super::io::ModelIoError> {
        super::io::save_model(self, dir)
    }

    /// Redraw every weight and bias uniformly in `[0, 1)`
    ///
    /// Used once at creation to roll a fresh RND target embedding.
    pub fn randomize_weights(&mut self, rng: &mut impl Rng) {
        for layer in &mut self.layers {
            layer.randomize(rng);
        }
    }

    /// Hard update: deep-copy `src`'s layers and optimizer state
    ///
    /// The role tag and loss log of `self` are kept. Until either network
    /// trains again, both produce element-wise identical predictions.
    ///
    /// **Panics** if the two networks' dimensions differ
    pub fn hard_update_from(&mut self, src: &Network) {
        assert_eq!(
            (
                self.spec.input_dim,
                self.spec.output_dim,
                self.spec.hidden_dim,
                self.spec.num_layers
            ),
            (
                src.spec.input_dim,
                src.spec.output_dim,
                src.spec.hidden_dim,
                src.spec.num_layers
            ),
            "hard update across mismatched architectures"
        );
        self.layers = src.layers.clone();
        self.activations = src.activations.clone();
        self.optimizer = src.optimizer.clone();
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn spec(input: usize, output: usize) -> NetworkSpec {
        NetworkSpec {
            input_dim: input,
            output_dim: output,
            hidden_dim: 16,
            num_layers: 3,
            batch_size: 4,
        }
    }

    fn network(role: Role, seed: u64) -> Network {
        let mut rng = StdRng::seed_from_u64(seed);
        Network::new(spec(6, 4), role, &AdamParams::default(), &mut rng)
    }

    #[test]
    #[should_panic]
    fn rejects_too_few_layers() {
        let mut rng = StdRng::seed_from_u64(0);
        let bad = NetworkSpec {
            num_layers: 2,
            ..spec(6, 4)
        };
        Network::new(bad, Role::DqnOnline, &AdamParams::default(), &mut rng);
    }

    #[test]
    fn predict_keeps_the_column_major_convention() {
        let mut net = network(Role::DqnOnline, 1);
        let batch = 3;
        let input: Vec<f64> = (0..6 * batch).map(|i| i as f64 * 0.1).collect();

        let out = net.predict(&input, batch).unwrap();
        assert_eq!(out.len(), 4 * batch);

        // Each sample's output must match a batch-of-one prediction of the
        // same feature vector.
        for i in 0..batch {
            let single = net.predict(&input[i * 6..(i + 1) * 6], 1).unwrap();
            assert_eq!(&out[i * 4..(i + 1) * 4], single.as_slice());
        }
    }

    #[test]
    fn train_keeps_every_parameter_finite() {
        let mut net = network(Role::DqnTarget, 2);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..25 {
            let input: Vec<f64> = (0..6 * 4).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let target: Vec<f64> = (0..4 * 4).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let loss = net.train(&input, &target).unwrap();
            assert!(loss.is_finite());
        }

        for layer in net.layers() {
            assert!(layer.parameters_finite());
        }
    }

    #[test]
    fn hard_update_makes_predictions_identical() {
        let mut online = network(Role::DqnOnline, 4);
        let mut target = network(Role::DqnTarget, 5);
        target.hard_update_from(&online);

        let mut rng = StdRng::seed_from_u64(6);
        let input: Vec<f64> = (0..6 * 3).map(|_| rng.gen_range(-2.0..2.0)).collect();

        let a = online.predict(&input, 3).unwrap();
        let b = target.predict(&input, 3).unwrap();
        let max_diff = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0_f64, f64::max);
        assert_eq!(max_diff, 0.0, "copied network diverged before training");
    }

    #[test]
    fn randomize_weights_lands_in_unit_interval() {
        let mut net = network(Role::RndTarget, 7);
        let mut rng = StdRng::seed_from_u64(8);
        net.randomize_weights(&mut rng);

        for layer in net.layers() {
            for &w in layer.weights.as_slice().iter().chain(layer.biases.as_slice()) {
                assert!((0.0..1.0).contains(&w));
            }
        }
    }

    #[test]
    fn loss_log_records_one_line_per_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut net = network(Role::DqnOnline, 9);
        net.attach_loss_log(dir.path()).unwrap();

        let input = vec![0.1; 6 * 4];
        let target = vec![0.0; 4 * 4];
        net.train(&input, &target).unwrap();
        net.train(&input, &target).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("online_system.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(line.parse::<f64>().is_ok(), "line is a bare decimal");
        }
    }

    #[test]
    fn target_roles_never_open_a_loss_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut net = network(Role::RndTarget, 10);
        net.attach_loss_log(dir.path()).unwrap();

        let input = vec![0.1; 6 * 4];
        let target = vec![0.0; 4 * 4];
        net.train(&input, &target).unwrap();

        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
