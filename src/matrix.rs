use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::table::{normalize_sample_id, parse_lod, Table};

/// One matrix row: the normalized sample identifier from the FILE column
/// and its LOD scores, parallel to the matrix column order.
#[derive(Debug)]
pub struct MatrixRow {
    pub sample: String,
    pub scores: Vec<f64>,
}

impl MatrixRow {
    /// Mean absolute LOD across the row, self cell included.
    pub fn mean_abs_lod(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|s| s.abs()).sum::<f64>() / self.scores.len() as f64
    }
}

/// Square pairwise LOD matrix keyed by normalized sample identifiers.
/// Rows keep file order and columns keep header order; every row must
/// match a column and vice versa.
#[derive(Debug)]
pub struct LodMatrix {
    pub samples: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl LodMatrix {
    /// Build a LOD matrix from a loaded table. The table must carry a FILE
    /// column holding row identifiers; all other columns are score columns.
    /// Identifiers and headers are normalized, and every cell is parsed up
    /// front so a corrupt score fails the run before any output is written.
    pub fn from_table(table: &Table) -> Result<LodMatrix, AppError> {
        let file_idx = table.column_index("FILE")?;

        let samples: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != file_idx)
            .map(|(_, name)| normalize_sample_id(name).to_string())
            .collect();

        let mut column_set: HashSet<&str> = HashSet::with_capacity(samples.len());
        for column in &samples {
            if !column_set.insert(column.as_str()) {
                return Err(AppError::DuplicateColumn(column.clone()));
            }
        }

        let mut rows: Vec<MatrixRow> = Vec::with_capacity(table.rows.len());
        let mut seen: HashSet<String> = HashSet::new();
        for raw in &table.rows {
            let sample = normalize_sample_id(&raw[file_idx]).to_string();
            if !seen.insert(sample.clone()) {
                return Err(AppError::DuplicateRow(sample));
            }
            if !column_set.contains(sample.as_str()) {
                return Err(AppError::RowWithoutColumn(sample));
            }
            let context = format!("{} row {}", table.source, sample);
            let scores = raw
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != file_idx)
                .map(|(_, cell)| parse_lod(cell, &context))
                .collect::<Result<Vec<f64>, AppError>>()?;
            rows.push(MatrixRow { sample, scores });
        }

        for column in &samples {
            if !seen.contains(column) {
                return Err(AppError::ColumnWithoutRow(column.clone()));
            }
        }

        Ok(LodMatrix { samples, rows })
    }

    /// Row indices arranged in column order, so axis i of any derived
    /// square matrix refers to `samples[i]` on both sides.
    pub fn row_order(&self) -> Result<Vec<usize>, AppError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, row) in self.rows.iter().enumerate() {
            index.insert(row.sample.as_str(), i);
        }
        self.samples
            .iter()
            .map(|sample| {
                index
                    .get(sample.as_str())
                    .copied()
                    .ok_or_else(|| AppError::ColumnWithoutRow(sample.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn load_matrix(content: &str) -> Result<LodMatrix, AppError> {
        let file = create_test_file(content);
        let table = Table::from_tsv(file.path()).unwrap();
        LodMatrix::from_table(&table)
    }

    #[test]
    fn test_from_table_normalizes_headers_and_rows() {
        let matrix = load_matrix(
            "FILE\tgs://run1:A\tgs://run2:B\nbam1:A\t5\t-3\nbam2:B\t-3\t7\n",
        )
        .unwrap();
        assert_eq!(matrix.samples, vec!["A", "B"]);
        assert_eq!(matrix.rows[0].sample, "A");
        assert_eq!(matrix.rows[0].scores, vec![5.0, -3.0]);
        assert_eq!(matrix.rows[1].scores, vec![-3.0, 7.0]);
    }

    #[test]
    fn test_from_table_parses_comma_grouped_cells() {
        let matrix = load_matrix("FILE\tA\tB\nA\t1,234.5\t0\nB\t0\t2,000\n").unwrap();
        assert_eq!(matrix.rows[0].scores[0], 1234.5);
        assert_eq!(matrix.rows[1].scores[1], 2000.0);
    }

    #[test]
    fn test_from_table_requires_file_column() {
        let err = load_matrix("NAME\tA\nA\t1\n").unwrap_err();
        assert!(matches!(err, AppError::MissingColumn { .. }));
    }

    #[test]
    fn test_from_table_rejects_corrupt_cell() {
        let err = load_matrix("FILE\tA\tB\nA\t0\tnot_a_number\nB\t0\t0\n").unwrap_err();
        assert!(matches!(err, AppError::InvalidNumber { .. }));
    }

    #[test]
    fn test_from_table_rejects_duplicate_rows() {
        let err = load_matrix("FILE\tA\tB\nrun1:A\t0\t0\nrun2:A\t0\t0\n").unwrap_err();
        match err {
            AppError::DuplicateRow(sample) => assert_eq!(sample, "A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_table_rejects_duplicate_columns() {
        let err = load_matrix("FILE\trun1:A\trun2:A\nA\t0\t0\n").unwrap_err();
        match err {
            AppError::DuplicateColumn(sample) => assert_eq!(sample, "A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_table_rejects_row_without_column() {
        let err = load_matrix("FILE\tA\tB\nA\t0\t0\nC\t0\t0\n").unwrap_err();
        match err {
            AppError::RowWithoutColumn(sample) => assert_eq!(sample, "C"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_table_rejects_column_without_row() {
        let err = load_matrix("FILE\tA\tB\nA\t0\t0\n").unwrap_err();
        match err {
            AppError::ColumnWithoutRow(sample) => assert_eq!(sample, "B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_row_order_follows_columns() {
        let matrix = load_matrix("FILE\tA\tB\tC\nB\t0\t1\t0\nC\t0\t0\t1\nA\t1\t0\t0\n").unwrap();
        assert_eq!(matrix.row_order().unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_mean_abs_lod() {
        let row = MatrixRow {
            sample: "A".to_string(),
            scores: vec![3.0, -5.0, 1.0],
        };
        assert!((row.mean_abs_lod() - 3.0).abs() < 1e-12);
    }
}
