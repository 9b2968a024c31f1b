//! Flat text serialization for numeric arrays.
//!
//! Arrays are stored one number per line as
//! `[ndim, shape..., flattened data...]` with the data flattened in
//! **column-major** order. Values are written with eight fractional
//! digits.
//!
//! This layer is deliberately dumb: it knows shapes and numbers, nothing
//! about models. [`crate::changepoint::models::bcpm::ChangePointModel`]
//! and the containers in [`crate::changepoint::core::data`] build their
//! file formats on top of it.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ShapeBuilder};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::changepoint::errors::PersistError;

fn write_lines(path: &Path, values: impl Iterator<Item = f64>) -> Result<(), PersistError> {
    let mut file = fs::File::create(path)?;
    for v in values {
        writeln!(file, "{v:.8}")?;
    }
    Ok(())
}

fn read_lines(path: &Path) -> Result<Vec<f64>, PersistError> {
    let text = fs::read_to_string(path)?;
    let mut values = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let v: f64 =
            trimmed.parse().map_err(|_| PersistError::Parse { line: i + 1 })?;
        if !v.is_finite() {
            return Err(PersistError::Parse { line: i + 1 });
        }
        values.push(v);
    }
    Ok(values)
}

fn header_usize(v: f64) -> Result<usize, PersistError> {
    if v < 0.0 || v.fract().abs() > 1e-9 {
        return Err(PersistError::BadHeader { reason: "shape entries must be nonnegative integers" });
    }
    Ok(v as usize)
}

/// Write a 1-D array as `[1, len, data...]`.
pub fn write_vector(path: &Path, x: ArrayView1<f64>) -> Result<(), PersistError> {
    let header = [1.0, x.len() as f64];
    write_lines(path, header.into_iter().chain(x.iter().copied()))
}

/// Write a 2-D array as `[2, rows, cols, data...]` with the data in
/// column-major order.
pub fn write_matrix(path: &Path, x: ArrayView2<f64>) -> Result<(), PersistError> {
    let header = [2.0, x.nrows() as f64, x.ncols() as f64];
    let data = x.columns().into_iter().flat_map(|col| col.to_vec());
    write_lines(path, header.into_iter().chain(data))
}

/// Read a 1-D array written by [`write_vector`].
pub fn read_vector(path: &Path) -> Result<Array1<f64>, PersistError> {
    let values = read_lines(path)?;
    if values.is_empty() {
        return Err(PersistError::BadHeader { reason: "file is empty" });
    }
    if header_usize(values[0])? != 1 {
        return Err(PersistError::BadHeader { reason: "expected a 1-D array (ndim = 1)" });
    }
    if values.len() < 2 {
        return Err(PersistError::BadHeader { reason: "missing length entry" });
    }
    let len = header_usize(values[1])?;
    let data = &values[2..];
    if data.len() != len {
        return Err(PersistError::ShapeMismatch { expected: len, actual: data.len() });
    }
    Ok(Array1::from_vec(data.to_vec()))
}

/// Read a 2-D array written by [`write_matrix`].
pub fn read_matrix(path: &Path) -> Result<Array2<f64>, PersistError> {
    let values = read_lines(path)?;
    if values.is_empty() {
        return Err(PersistError::BadHeader { reason: "file is empty" });
    }
    if header_usize(values[0])? != 2 {
        return Err(PersistError::BadHeader { reason: "expected a 2-D array (ndim = 2)" });
    }
    if values.len() < 3 {
        return Err(PersistError::BadHeader { reason: "missing shape entries" });
    }
    let rows = header_usize(values[1])?;
    let cols = header_usize(values[2])?;
    let data = &values[3..];
    if data.len() != rows * cols {
        return Err(PersistError::ShapeMismatch { expected: rows * cols, actual: data.len() });
    }
    // Data is column-major on disk.
    Array2::from_shape_vec((rows, cols).f(), data.to_vec())
        .map_err(|_| PersistError::BadHeader { reason: "shape does not match data" })
        .map(|arr| arr.as_standard_layout().to_owned())
}
