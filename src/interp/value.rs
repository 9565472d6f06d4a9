use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InterpError;
use crate::ir::IrType;

/// A dense matrix of doubles, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

/// Largest number of cells a single matrix may hold (512 MiB of doubles).
pub const MAX_CELLS: usize = 1 << 26;

/// Number of cells in a `rows x cols` matrix, or `MatrixTooLarge` when the
/// product overflows or exceeds [`MAX_CELLS`].
pub fn cell_count(rows: usize, cols: usize) -> Result<usize, InterpError> {
    rows.checked_mul(cols)
        .filter(|&n| n <= MAX_CELLS)
        .ok_or(InterpError::MatrixTooLarge {
            rows,
            cols,
            limit: MAX_CELLS,
        })
}

impl Matrix {
    /// An `rows x cols` matrix with every cell set to `value`. The shape
    /// must already be known to be within [`MAX_CELLS`].
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Like [`Matrix::filled`] for shapes that come from program values.
    pub fn try_filled(rows: usize, cols: usize, value: f64) -> Result<Self, InterpError> {
        let n = cell_count(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            data: vec![value; n],
        })
    }

    /// Builds a matrix from row-major data. Returns `None` if the length
    /// does not match the shape.
    pub fn from_rows(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (rows.checked_mul(cols) == Some(data.len())).then_some(Self { rows, cols, data })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// 0-based cell access.
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    pub fn transpose(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                data.push(self.get(r, c));
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "matrix<{}x{}>[", self.rows, self.cols)?;
        for r in 0..self.rows {
            if r > 0 {
                write!(f, "; ")?;
            }
            for c in 0..self.cols {
                if c > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.get(r, c))?;
            }
        }
        write!(f, "]")
    }
}

/// A runtime value produced or consumed by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Bool(bool),
    Matrix(Matrix),
}

impl Value {
    pub fn ty(&self) -> IrType {
        match self {
            Value::Scalar(_) => IrType::Scalar,
            Value::Bool(_) => IrType::Bool,
            Value::Matrix(_) => IrType::Matrix,
        }
    }

    pub fn as_scalar(&self) -> Result<f64, InterpError> {
        match self {
            Value::Scalar(x) => Ok(*x),
            other => Err(InterpError::TypeError {
                detail: format!("expected a scalar, found a {}", other.ty()),
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool, InterpError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(InterpError::TypeError {
                detail: format!("expected a bool, found a {}", other.ty()),
            }),
        }
    }

    pub fn as_matrix(&self) -> Result<&Matrix, InterpError> {
        match self {
            Value::Matrix(m) => Ok(m),
            other => Err(InterpError::TypeError {
                detail: format!("expected a matrix, found a {}", other.ty()),
            }),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Value::Matrix(m)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Matrix(m) => write!(f, "{}", m),
        }
    }
}
