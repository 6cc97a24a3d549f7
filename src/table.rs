use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::AppError;

/// In-memory view of a tab-separated table: a header row plus data rows.
pub struct Table {
    pub source: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Load a plain tab-separated file. The first line is the header;
    /// lines whose field count differs from the header are skipped.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Table, AppError> {
        Self::load(path, false)
    }

    /// Load a metrics-style tab-separated file: '#' comment lines and
    /// blank lines are dropped before the header is taken.
    pub fn from_metrics_tsv<P: AsRef<Path>>(path: P) -> Result<Table, AppError> {
        Self::load(path, true)
    }

    fn load<P: AsRef<Path>>(path: P, skip_comments: bool) -> Result<Table, AppError> {
        let source = path.as_ref().display().to_string();
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if skip_comments && (line.starts_with('#') || line.trim().is_empty()) {
                continue;
            }
            let fields: Vec<String> = line.split('\t').map(|s| s.to_string()).collect();
            if columns.is_empty() {
                columns = fields;
            } else if fields.len() == columns.len() {
                rows.push(fields);
            }
            // Rows with the wrong field count are malformed and skipped
        }

        Ok(Table {
            source,
            columns,
            rows,
        })
    }

    /// Index of a named column
    pub fn column_index(&self, name: &str) -> Result<usize, AppError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AppError::MissingColumn {
                file: self.source.clone(),
                column: name.to_string(),
            })
    }

    /// All values of a named column, in row order
    pub fn column(&self, name: &str) -> Result<Vec<&str>, AppError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }
}

/// Strip everything up to and including the last ':' from an identifier.
/// Crosscheck writes matrix identifiers as "file:sample"; identifiers
/// without a colon are returned unchanged.
pub fn normalize_sample_id(id: &str) -> &str {
    match id.rfind(':') {
        Some(pos) => &id[pos + 1..],
        None => id,
    }
}

/// Parse a LOD score that may carry thousands-separator commas.
pub fn parse_lod(value: &str, context: &str) -> Result<f64, AppError> {
    let cleaned = value.replace(',', "");
    cleaned
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::InvalidNumber {
            value: value.to_string(),
            context: context.to_string(),
        })
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

    #[test]
    fn test_from_tsv_parses_header_and_rows() {
        let file = create_test_file("sample_id\tindividual\nS1\tInd1\nS2\tInd2\n");
        let table = Table::from_tsv(file.path()).unwrap();
        assert_eq!(table.columns, vec!["sample_id", "individual"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["S1", "Ind1"]);
    }

    #[test]
    fn test_from_tsv_skips_malformed_rows() {
        let file = create_test_file("a\tb\n1\t2\nonly_one_field\n3\t4\n5\t6\t7\n");
        let table = Table::from_tsv(file.path()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["3", "4"]);
    }

    #[test]
    fn test_from_metrics_tsv_strips_comments_and_blanks() {
        let file = create_test_file(
            "## htsjdk.samtools.metrics.StringHeader\n# CrosscheckFingerprints\n\nCLUSTER\tCLUSTER_SIZE\n1\t2\n",
        );
        let table = Table::from_metrics_tsv(file.path()).unwrap();
        assert_eq!(table.columns, vec!["CLUSTER", "CLUSTER_SIZE"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_from_tsv_keeps_comment_lines() {
        let file = create_test_file("a\tb\n#x\ty\n");
        let table = Table::from_tsv(file.path()).unwrap();
        assert_eq!(table.rows, vec![vec!["#x", "y"]]);
    }

    #[test]
    fn test_column_access() {
        let file = create_test_file("sample_id\tindividual\nS1\tInd1\nS2\tInd1\n");
        let table = Table::from_tsv(file.path()).unwrap();
        assert_eq!(table.column("individual").unwrap(), vec!["Ind1", "Ind1"]);
        let err = table.column("missing").unwrap_err();
        assert!(matches!(err, AppError::MissingColumn { .. }));
    }

    #[test]
    fn test_normalize_sample_id_strips_path_prefix() {
        assert_eq!(
            normalize_sample_id("gs://bucket/path:SAMPLE_007"),
            "SAMPLE_007"
        );
    }

    #[test]
    fn test_normalize_sample_id_takes_last_colon() {
        assert_eq!(normalize_sample_id("run1:lane2:S1"), "S1");
        assert_eq!(normalize_sample_id("file::S2"), "S2");
    }

    #[test]
    fn test_normalize_sample_id_without_colon_is_unchanged() {
        assert_eq!(normalize_sample_id("SAMPLE_007"), "SAMPLE_007");
    }

    #[test]
    fn test_parse_lod_strips_thousands_separators() {
        assert_eq!(parse_lod("1,234.5", "test").unwrap(), 1234.5);
        assert_eq!(parse_lod("-1,234,567.25", "test").unwrap(), -1234567.25);
    }

    #[test]
    fn test_parse_lod_plain_values() {
        assert_eq!(parse_lod("0", "test").unwrap(), 0.0);
        assert_eq!(parse_lod(" 5.5 ", "test").unwrap(), 5.5);
    }

    #[test]
    fn test_parse_lod_rejects_garbage() {
        let err = parse_lod("abc", "matrix row S1").unwrap_err();
        match err {
            AppError::InvalidNumber { value, context } => {
                assert_eq!(value, "abc");
                assert_eq!(context, "matrix row S1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
