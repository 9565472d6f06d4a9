//! Result files.
//!
//! A result file is a JSON document holding a matrix's shape and its
//! non-zero cells as 1-based `[row, col, value]` triples. Absent cells are 0.
//! JSON has no infinities or NaN, so those cells are written as the strings
//! `"Infinity"`, `"-Infinity"` and `"NaN"`.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OutputError;
use crate::interp::{Matrix, Value};

#[derive(Debug, Serialize, Deserialize)]
struct ResultFile {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

/// One stored cell: 1-based row, 1-based column, value.
#[derive(Debug, Serialize, Deserialize)]
struct Cell(usize, usize, CellValue);

/// A cell value that survives a JSON round trip bit for bit, including the
/// non-finite values and the sign of zero.
#[derive(Debug, Clone, Copy)]
struct CellValue(f64);

impl Serialize for CellValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let v = self.0;
        if v.is_nan() {
            serializer.serialize_str("NaN")
        } else if v == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else if v == f64::NEG_INFINITY {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_f64(v)
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct CellValueVisitor;

        impl<'de> serde::de::Visitor<'de> for CellValueVisitor {
            type Value = CellValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number, \"Infinity\", \"-Infinity\" or \"NaN\"")
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<CellValue, E> {
                Ok(CellValue(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<CellValue, E> {
                Ok(CellValue(v as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<CellValue, E> {
                Ok(CellValue(v as f64))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<CellValue, E> {
                match v {
                    "NaN" => Ok(CellValue(f64::NAN)),
                    "Infinity" => Ok(CellValue(f64::INFINITY)),
                    "-Infinity" => Ok(CellValue(f64::NEG_INFINITY)),
                    other => Err(E::invalid_value(serde::de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(CellValueVisitor)
    }
}

impl From<&Matrix> for ResultFile {
    fn from(m: &Matrix) -> Self {
        let mut cells = Vec::new();
        for r in 0..m.rows {
            for c in 0..m.cols {
                let v = m.get(r, c);
                // Positive zero is the implicit fill; `-0.0` is stored.
                if v.to_bits() != 0 {
                    cells.push(Cell(r + 1, c + 1, CellValue(v)));
                }
            }
        }
        Self {
            rows: m.rows,
            cols: m.cols,
            cells,
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn invalid_data(path: &Path, detail: String) -> OutputError {
    io_error(
        path,
        std::io::Error::new(std::io::ErrorKind::InvalidData, detail),
    )
}

fn format_error(path: &Path, source: serde_json::Error) -> OutputError {
    OutputError::Format {
        path: path.display().to_string(),
        source,
    }
}

/// Writes `m` to `path`, replacing any existing file.
pub fn write_matrix(path: &Path, m: &Matrix) -> Result<(), OutputError> {
    let doc = ResultFile::from(m);
    let text = serde_json::to_string_pretty(&doc).map_err(|e| format_error(path, e))?;
    fs::write(path, text).map_err(|e| io_error(path, e))?;
    tracing::debug!(path = %path.display(), rows = m.rows, cols = m.cols, "wrote result file");
    Ok(())
}

/// Writes a named output value. Scalars are written as 1x1 matrices.
pub fn write_value(path: &Path, name: &str, value: &Value) -> Result<(), OutputError> {
    match value {
        Value::Matrix(m) => write_matrix(path, m),
        Value::Scalar(x) => write_matrix(path, &Matrix::filled(1, 1, *x)),
        Value::Bool(_) => Err(OutputError::NotNumeric {
            name: name.to_owned(),
            kind: value.ty().to_string(),
        }),
    }
}

pub fn read_matrix(path: &Path) -> Result<Matrix, OutputError> {
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let doc: ResultFile = serde_json::from_str(&text).map_err(|e| format_error(path, e))?;
    let mut m = Matrix::try_filled(doc.rows, doc.cols, 0.0)
        .map_err(|e| invalid_data(path, e.to_string()))?;
    for Cell(r, c, CellValue(v)) in doc.cells {
        if r == 0 || c == 0 || r > doc.rows || c > doc.cols {
            return Err(invalid_data(
                path,
                format!("cell ({}, {}) lies outside a {}x{} matrix", r, c, doc.rows, doc.cols),
            ));
        }
        m.data[(r - 1) * doc.cols + (c - 1)] = v;
    }
    Ok(m)
}

/// Reads the 1-based cell `(i, j)` of a result file. Cells outside the
/// stored shape read as 0.
pub fn read_cell(path: &Path, i: usize, j: usize) -> Result<f64, OutputError> {
    let m = read_matrix(path)?;
    if i == 0 || j == 0 || i > m.rows || j > m.cols {
        return Ok(0.0);
    }
    Ok(m.get(i - 1, j - 1))
}
