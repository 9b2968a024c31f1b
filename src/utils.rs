#[cfg(feature = "python-bindings")]
use ndarray::{Array1, Array2};

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1, PyReadonlyArray2,
};

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64",
        )
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Convert any 1-D float64 array-like into an owned `Array1<f64>`.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_vector<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<Array1<f64>> {
    let arr = extract_f64_array(py, raw_data)?;
    let slice = arr.as_slice().map_err(|_| {
        PyValueError::new_err("expected a contiguous 1-D float64 array or sequence")
    })?;
    Ok(Array1::from(slice.to_vec()))
}

/// Convert any 2-D float64 array-like (numpy array, pandas DataFrame, or
/// nested sequence of equal-length rows) into an owned `Array2<f64>`.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(
    _py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<Array2<f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro.as_array().to_owned());
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(frame_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(frame_ro.as_array().to_owned());
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 2-D numpy.ndarray, pandas.DataFrame, or sequence of float64 rows",
        )
    })?;
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, |row| row.len());
    let mut out = Array2::zeros((nrows, ncols));
    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(PyValueError::new_err("observation rows must all have the same length"));
        }
        for (j, &value) in row.iter().enumerate() {
            out[(i, j)] = value;
        }
    }
    Ok(out)
}
