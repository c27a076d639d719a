//! Parser for the solver's plain-text matrix records.
//!
//! A matrix file holds one entry per line:
//! ```text
//! <row> <col> <re> <im> [ignored columns...]
//! ```
//! Indices are 1-based; `row` is the outgoing and `col` the incoming
//! diffraction order. Records may appear in any order, but every cell of the
//! declared matrix must be present exactly once. A `beta` file holds one
//! `<order> <re> <im>` line per diffraction order.

use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

use crate::types::ScatteringMatrix;

/// Errors while reading solver records.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("{0}")]
    Shape(String),
}

/// One `(row, col, value)` entry with 1-based indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub row: usize,
    pub col: usize,
    pub value: Complex64,
}

fn parse_index(field: &str, line: usize, what: &str) -> Result<usize, RecordError> {
    if let Ok(i) = field.parse::<usize>() {
        return Ok(i);
    }
    // Some writers emit indices as floats ("3.0")
    match field.parse::<f64>() {
        Ok(x) if x >= 0.0 && x.fract() == 0.0 => Ok(x as usize),
        _ => Err(RecordError::FormatError {
            line,
            message: format!("invalid {} index '{}'", what, field),
        }),
    }
}

fn parse_value(field: &str, line: usize, what: &str) -> Result<f64, RecordError> {
    // Fortran double-precision exponents use D instead of E
    let normalised = field.replace(['D', 'd'], "E");
    normalised
        .parse::<f64>()
        .map_err(|_| RecordError::FormatError {
            line,
            message: format!("invalid {} value '{}'", what, field),
        })
}

fn data_lines(content: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    content.lines().enumerate().filter_map(|(idx, line)| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            None
        } else {
            Some((idx + 1, line.split_whitespace().collect()))
        }
    })
}

/// Parse every matrix record in `content`.
pub fn parse_records(content: &str) -> Result<Vec<Record>, RecordError> {
    data_lines(content)
        .map(|(line, parts)| {
            if parts.len() < 4 {
                return Err(RecordError::FormatError {
                    line,
                    message: format!("expected 'row col re im', got {} fields", parts.len()),
                });
            }
            Ok(Record {
                row: parse_index(parts[0], line, "row")?,
                col: parse_index(parts[1], line, "column")?,
                value: Complex64::new(
                    parse_value(parts[2], line, "real")?,
                    parse_value(parts[3], line, "imaginary")?,
                ),
            })
        })
        .collect()
}

/// Arrange records into a dense `dim x dim` matrix.
///
/// Unlike inferring the size from the largest index, this rejects truncated,
/// oversized and duplicated records.
pub fn assemble(records: &[Record], dim: usize) -> Result<ScatteringMatrix, RecordError> {
    let mut matrix = Array2::<Complex64>::zeros((dim, dim));
    let mut seen = Array2::<bool>::from_elem((dim, dim), false);

    for r in records {
        if r.row == 0 || r.col == 0 || r.row > dim || r.col > dim {
            return Err(RecordError::Shape(format!(
                "entry ({}, {}) lies outside the declared {}x{} matrix",
                r.row, r.col, dim, dim
            )));
        }
        let (i, j) = (r.row - 1, r.col - 1);
        if seen[[i, j]] {
            return Err(RecordError::Shape(format!(
                "entry ({}, {}) appears more than once",
                r.row, r.col
            )));
        }
        seen[[i, j]] = true;
        matrix[[i, j]] = r.value;
    }

    let filled = seen.iter().filter(|&&s| s).count();
    if filled != dim * dim {
        let inferred = records.iter().map(|r| r.row.max(r.col)).max().unwrap_or(0);
        return Err(RecordError::Shape(format!(
            "only {} of {} entries present (records span {}x{}, layer declares {}x{})",
            filled,
            dim * dim,
            inferred,
            inferred,
            dim,
            dim
        )));
    }

    Ok(matrix)
}

/// Parse a `beta` file of exactly `orders` per-order $k_z$ values.
pub fn parse_k_perp(content: &str, orders: usize) -> Result<Vec<Complex64>, RecordError> {
    let mut values: Vec<Option<Complex64>> = vec![None; orders];
    for (line, parts) in data_lines(content) {
        if parts.len() < 3 {
            return Err(RecordError::FormatError {
                line,
                message: format!("expected 'order re im', got {} fields", parts.len()),
            });
        }
        let order = parse_index(parts[0], line, "order")?;
        if order == 0 || order > orders {
            return Err(RecordError::Shape(format!(
                "order {} outside the declared 1..={}",
                order, orders
            )));
        }
        let slot = &mut values[order - 1];
        if slot.is_some() {
            return Err(RecordError::Shape(format!("order {} appears more than once", order)));
        }
        *slot = Some(Complex64::new(
            parse_value(parts[1], line, "real")?,
            parse_value(parts[2], line, "imaginary")?,
        ));
    }

    let found = values.iter().filter(|v| v.is_some()).count();
    if found != orders {
        return Err(RecordError::Shape(format!(
            "only {} of {} orders present",
            found, orders
        )));
    }
    Ok(values.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BY_TWO: &str = "\
   1   1   0.5   0.0
   2   1   0.0   0.25
   1   2  -1.0   0.0
   2   2   1.5D-01   -2.0E-01
";

    #[test]
    fn test_parse_and_assemble() {
        let records = parse_records(TWO_BY_TWO).unwrap();
        assert_eq!(records.len(), 4);
        let m = assemble(&records, 2).unwrap();
        assert_eq!(m[[0, 0]], Complex64::new(0.5, 0.0));
        // row is the outgoing order, col the incoming one
        assert_eq!(m[[1, 0]], Complex64::new(0.0, 0.25));
        assert_eq!(m[[0, 1]], Complex64::new(-1.0, 0.0));
        assert!((m[[1, 1]] - Complex64::new(0.15, -0.2)).norm() < 1e-15);
    }

    #[test]
    fn test_extra_columns_and_comments_ignored() {
        let content = "# Rnet\n1 1 0.5 0.5 0.5\n\n";
        let records = parse_records(content).unwrap();
        assert_eq!(records[0].value, Complex64::new(0.5, 0.5));
    }

    #[test]
    fn test_float_indices_accepted() {
        let records = parse_records("2.0 1.0 1.0 0.0").unwrap();
        assert_eq!((records[0].row, records[0].col), (2, 1));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let records = parse_records("1 1 1.0 0.0\n").unwrap();
        let err = assemble(&records, 2).unwrap_err();
        assert!(err.to_string().contains("only 1 of 4"), "{err}");
    }

    #[test]
    fn test_oversized_and_duplicate_records_rejected() {
        let records = parse_records("3 1 1.0 0.0").unwrap();
        assert!(assemble(&records, 2).is_err());

        let records = parse_records("1 1 1.0 0.0\n1 1 2.0 0.0").unwrap();
        assert!(assemble(&records, 1).unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_bad_fields_report_line() {
        let err = parse_records("1 1 1.0 0.0\n1 x 1.0 0.0").unwrap_err();
        assert_eq!(
            err,
            RecordError::FormatError {
                line: 2,
                message: "invalid column index 'x'".into()
            }
        );
        assert!(parse_records("1 1 1.0").is_err());
    }

    #[test]
    fn test_parse_k_perp() {
        let k = parse_k_perp("2 0.0 1.5\n1 2.0 0.0\n", 2).unwrap();
        assert_eq!(k, vec![Complex64::new(2.0, 0.0), Complex64::new(0.0, 1.5)]);
        assert!(parse_k_perp("1 2.0 0.0\n", 2).is_err());
        assert!(parse_k_perp("3 2.0 0.0\n", 2).is_err());
    }
}
