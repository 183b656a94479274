use super::{DenseLayer, Matrix};

/// Mean squared error over all elements
///
/// **Panics** on shape mismatch
pub fn mse_loss(predictions: &Matrix, targets: &Matrix) -> f64 {
    let diff = predictions.sub(targets);
    diff.square().sum() / diff.n_elems() as f64
}

/// Gradient of [`mse_loss`] w.r.t. the predictions: `2 * (pred - target) / n`
pub fn mse_loss_gradient(predictions: &Matrix, targets: &Matrix) -> Matrix {
    let mut diff = predictions.sub(targets);
    let n = diff.n_elems() as f64;
    diff.scale(2.0 / n);
    diff
}

/// Huber loss, mean over all elements
///
/// Per element, with `d = pred - target`: `d^2 / 2` for `|d| <= delta`,
/// `delta * (|d| - delta / 2)` otherwise.
pub fn huber_loss(predictions: &Matrix, targets: &Matrix, delta: f64) -> f64 {
    let diff = predictions.sub(targets);
    let total = diff
        .as_slice()
        .iter()
        .map(|&d| {
            if d.abs() <= delta {
                0.5 * d * d
            } else {
                delta * (d.abs() - 0.5 * delta)
            }
        })
        .sum::<f64>();
    total / diff.n_elems() as f64
}

/// Gradient of [`huber_loss`] w.r.t. the predictions
///
/// `d` inside the quadratic zone, `delta * sign(d)` outside it. Continuous
/// at `|d| == delta`.
pub fn huber_loss_gradient(predictions: &Matrix, targets: &Matrix, delta: f64) -> Matrix {
    let mut diff = predictions.sub(targets);
    diff.apply(|d| {
        if d.abs() <= delta {
            d
        } else {
            delta * d.signum()
        }
    });
    diff
}

/// L1/L2 penalty of one layer's parameters
///
/// Reported alongside the data loss; the optimizer sees the regularized
/// gradient instead (see [`DenseLayer::backward`]).
pub fn regularization_loss(layer: &DenseLayer) -> f64 {
    let mut loss = 0.0;

    if layer.weight_regularizer_l1 > 0.0 {
        loss += layer.weight_regularizer_l1 * layer.weights.abs().sum();
    }
    if layer.weight_regularizer_l2 > 0.0 {
        loss += layer.weight_regularizer_l2 * layer.weights.square().sum();
    }
    if layer.bias_regularizer_l1 > 0.0 {
        loss += layer.bias_regularizer_l1 * layer.biases.abs().sum();
    }
    if layer.bias_regularizer_l2 > 0.0 {
        loss += layer.bias_regularizer_l2 * layer.biases.square().sum();
    }

    loss
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_loss_functional() {
        let pred = Matrix::from_vec(1, 2, vec![1.0, 3.0]);
        let target = Matrix::from_vec(1, 2, vec![0.0, 1.0]);

        assert_eq!(mse_loss(&pred, &target), (1.0 + 4.0) / 2.0);

        let grad = mse_loss_gradient(&pred, &target);
        assert_eq!(grad.as_slice(), [1.0, 2.0]);
    }

    #[test]
    fn huber_is_quadratic_inside_delta_and_linear_outside() {
        let pred = Matrix::from_vec(1, 2, vec![0.5, 3.0]);
        let target = Matrix::zeros(1, 2);

        let expected = (0.5 * 0.25 + 1.0 * (3.0 - 0.5)) / 2.0;
        assert!((huber_loss(&pred, &target, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn huber_gradient_magnitude_saturates_at_delta() {
        let pred = Matrix::from_vec(1, 4, vec![0.5, -0.5, 3.0, -3.0]);
        let target = Matrix::zeros(1, 4);

        let grad = huber_loss_gradient(&pred, &target, 1.0);
        assert_eq!(grad.as_slice(), [0.5, -0.5, 1.0, -1.0]);
    }

    #[test]
    fn huber_gradient_is_continuous_at_delta() {
        let delta = 1.0;
        let below = Matrix::from_vec(1, 1, vec![delta - 1e-9]);
        let above = Matrix::from_vec(1, 1, vec![delta + 1e-9]);
        let target = Matrix::zeros(1, 1);

        let g_below = huber_loss_gradient(&below, &target, delta).as_slice()[0];
        let g_above = huber_loss_gradient(&above, &target, delta).as_slice()[0];
        assert!((g_below - g_above).abs() < 1e-8);
    }
}
