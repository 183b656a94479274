//! Binary model persistence
//!
//! A model directory holds one `nn_info.bin` header (six little-endian
//! u32s: input, output, hidden, layer count, batch size, role tag) and four
//! files per layer: weights, biases, and two legacy velocity slots kept for
//! format compatibility. Matrix files carry a `u32 rows; u32 cols;` header
//! followed by `rows * cols` little-endian f64s in column-major order.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::info;
use rand::Rng;
use thiserror::Error;

use super::optim::AdamParams;
use super::{Matrix, Network, NetworkSpec, Role};

#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("model I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a model directory (missing nn_info.bin)", path.display())]
    MissingInfo { path: PathBuf },

    #[error("invalid role tag {tag} in {}", path.display())]
    InvalidRole { tag: u32, path: PathBuf },

    #[error("model in {} has role {found:?}, expected {expected:?}", path.display())]
    RoleMismatch {
        path: PathBuf,
        found: Role,
        expected: Role,
    },

    #[error(
        "matrix in {} has shape {rows}x{cols}, expected {expected_rows}x{expected_cols}",
        path.display()
    )]
    ShapeMismatch {
        path: PathBuf,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("non-finite values in {}", path.display())]
    NonFinite { path: PathBuf },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ModelIoError + '_ {
    move |source| ModelIoError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Persist a network into `dir`, creating it if needed
///
/// The legacy velocity files are written zero-filled; Adam moments are not
/// part of the on-disk format.
pub fn save_model(network: &Network, dir: &Path) -> Result<(), ModelIoError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let spec = network.spec();
    let info_path = dir.join("nn_info.bin");
    let mut out = BufWriter::new(File::create(&info_path).map_err(io_err(&info_path))?);
    for value in [
        spec.input_dim as u32,
        spec.output_dim as u32,
        spec.hidden_dim as u32,
        spec.num_layers as u32,
        spec.batch_size as u32,
        network.role().tag(),
    ] {
        out.write_all(&value.to_le_bytes()).map_err(io_err(&info_path))?;
    }
    out.flush().map_err(io_err(&info_path))?;

    for (i, layer) in network.layers().iter().enumerate() {
        let prefix = dir.join(format!("layer{}", i));
        write_matrix(&with_suffix(&prefix, "_weights.bin"), &layer.weights)?;
        write_matrix(&with_suffix(&prefix, "_biases.bin"), &layer.biases)?;

        let zero_w = Matrix::zeros(layer.weights.rows(), layer.weights.cols());
        let zero_b = Matrix::zeros(1, layer.biases.cols());
        write_matrix(&with_suffix(&prefix, "_velocity_weights.bin"), &zero_w)?;
        write_matrix(&with_suffix(&prefix, "_velocity_biases.bin"), &zero_b)?;
    }

    info!("saved {:?} model to {}", network.role(), dir.display());
    Ok(())
}

/// Load a network from `dir`
///
/// The header's dimensions drive allocation; `params` supplies the
/// optimizer hyperparameters configured for the stored role. A role tag
/// that differs from `expected` is refused. Velocity files are validated
/// finite and discarded.
pub fn load_model(
    dir: &Path,
    expected: Role,
    params: &AdamParams,
    rng: &mut impl Rng,
) -> Result<Network, ModelIoError> {
    let info_path = dir.join("nn_info.bin");
    if !info_path.is_file() {
        return Err(ModelIoError::MissingInfo {
            path: dir.to_path_buf(),
        });
    }

    let mut input = BufReader::new(File::open(&info_path).map_err(io_err(&info_path))?);
    let mut header = [0u32; 6];
    for value in &mut header {
        *value = read_u32(&mut input, &info_path)?;
    }
    let [input_dim, output_dim, hidden_dim, num_layers, batch_size, role_tag] = header;

    let role = Role::from_tag(role_tag).ok_or(ModelIoError::InvalidRole {
        tag: role_tag,
        path: info_path.clone(),
    })?;
    if role != expected {
        return Err(ModelIoError::RoleMismatch {
            path: dir.to_path_buf(),
            found: role,
            expected,
        });
    }

    let spec = NetworkSpec {
        input_dim: input_dim as usize,
        output_dim: output_dim as usize,
        hidden_dim: hidden_dim as usize,
        num_layers: num_layers as usize,
        batch_size: batch_size as usize,
    };
    let mut network = Network::new(spec, role, params, rng);

    for i in 0..spec.num_layers {
        let prefix = dir.join(format!("layer{}", i));
        let (in_dim, out_dim) = (spec.layer_in(i), spec.layer_out(i));

        let weights = read_matrix(&with_suffix(&prefix, "_weights.bin"), in_dim, out_dim)?;
        let biases = read_matrix(&with_suffix(&prefix, "_biases.bin"), 1, out_dim)?;

        // Legacy SGD slots: any finite content is accepted and dropped.
        read_matrix(&with_suffix(&prefix, "_velocity_weights.bin"), in_dim, out_dim)?;
        read_matrix(&with_suffix(&prefix, "_velocity_biases.bin"), 1, out_dim)?;

        let layer = &mut network.layers_mut()[i];
        layer.weights = weights;
        layer.biases = biases;
    }

    info!("loaded {:?} model from {}", role, dir.display());
    Ok(network)
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix
        .file_name()
        .expect("layer prefix has a file name")
        .to_os_string();
    name.push(suffix);
    prefix.with_file_name(name)
}

fn write_matrix(path: &Path, matrix: &Matrix) -> Result<(), ModelIoError> {
    let mut out = BufWriter::new(File::create(path).map_err(io_err(path))?);
    out.write_all(&(matrix.rows() as u32).to_le_bytes())
        .map_err(io_err(path))?;
    out.write_all(&(matrix.cols() as u32).to_le_bytes())
        .map_err(io_err(path))?;
    for c in 0..matrix.cols() {
        for r in 0..matrix.rows() {
            out.write_all(&matrix[(r, c)].to_le_bytes())
                .map_err(io_err(path))?;
        }
    }
    out.flush().map_err(io_err(path))
}

fn read_matrix(
    path: &Path,
    expected_rows: usize,
    expected_cols: usize,
) -> Result<Matrix, ModelIoError> {
    let mut input = BufReader::new(File::open(path).map_err(io_err(path))?);
    let rows = read_u32(&mut input, path)? as usize;
    let cols = read_u32(&mut input, path)? as usize;
    if rows != expected_rows || cols != expected_cols {
        return Err(ModelIoError::ShapeMismatch {
            path: path.to_path_buf(),
            rows,
            cols,
            expected_rows,
            expected_cols,
        });
    }

    let mut matrix = Matrix::zeros(rows, cols);
    let mut buf = [0u8; 8];
    for c in 0..cols {
        for r in 0..rows {
            input.read_exact(&mut buf).map_err(io_err(path))?;
            matrix[(r, c)] = f64::from_le_bytes(buf);
        }
    }

    if !matrix.is_finite() {
        return Err(ModelIoError::NonFinite {
            path: path.to_path_buf(),
        });
    }
    Ok(matrix)
}

fn read_u32(input: &mut impl Read, path: &Path) -> Result<u32, ModelIoError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf).map_err(io_err(path))?;
    Ok(u32::from_le_bytes(buf))
}
