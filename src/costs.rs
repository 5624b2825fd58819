use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Pricing and pacing metadata for one model
#[derive(Debug, Clone, Deserialize)]
pub struct CostEntry {
    /// Model identifier as used by the provider
    pub model_id: String,
    /// USD per 1,000 input tokens
    pub input_price_per_1k: f64,
    /// USD per 1,000 output tokens
    pub output_price_per_1k: f64,
    /// Initial inter-call delay in seconds
    pub delay_secs: u64,
}

/// Read-only per-model cost table, loaded once per Run from a
/// semicolon-delimited CSV file
#[derive(Debug, Clone)]
pub struct CostTable {
    entries: Vec<CostEntry>,
}

impl CostTable {
    pub fn new(entries: Vec<CostEntry>) -> Self {
        Self { entries }
    }

    /// Load the table from a semicolon-delimited CSV file
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_path(path)
            .with_context(|| format!("Failed to open cost table: {}", path.display()))?;

        let mut entries = Vec::new();
        for record in reader.deserialize() {
            let entry: CostEntry = record
                .with_context(|| format!("Malformed cost table row in {}", path.display()))?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Look up a model by its exact identifier
    pub fn find(&self, model_id: &str) -> Option<&CostEntry> {
        self.entries.iter().find(|entry| entry.model_id == model_id)
    }

    /// Initial inter-call delay for a model
    pub fn delay_for(&self, model_id: &str) -> Result<u64> {
        self.find(model_id)
            .map(|entry| entry.delay_secs)
            .with_context(|| format!("No cost metadata for model {model_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_CSV: &str = "\
model_id;input_price_per_1k;output_price_per_1k;delay_secs
gpt-4;0.03;0.06;1
amazon.nova-micro-v1:0;0.000035;0.00014;2
anthropic.claude-3-haiku;0.00025;0.00125;0
";

    fn write_sample() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE_CSV).unwrap();
        file
    }

    #[test]
    fn test_load_semicolon_delimited_table() {
        let file = write_sample();
        let table = CostTable::from_file(file.path()).unwrap();

        let entry = table.find("gpt-4").unwrap();
        assert_eq!(entry.input_price_per_1k, 0.03);
        assert_eq!(entry.output_price_per_1k, 0.06);
        assert_eq!(entry.delay_secs, 1);
    }

    #[test]
    fn test_delay_lookup() {
        let file = write_sample();
        let table = CostTable::from_file(file.path()).unwrap();

        assert_eq!(table.delay_for("amazon.nova-micro-v1:0").unwrap(), 2);
        assert!(table.delay_for("unknown-model").is_err());
    }

    #[test]
    fn test_unknown_model_is_none() {
        let file = write_sample();
        let table = CostTable::from_file(file.path()).unwrap();
        assert!(table.find("unknown-model").is_none());
    }

    #[test]
    fn test_missing_file() {
        let result = CostTable::from_file(Path::new("/nonexistent/costs.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_row() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "model_id;input_price_per_1k;output_price_per_1k;delay_secs\ngpt-4;not-a-number;0.06;1\n"
        )
        .unwrap();

        let result = CostTable::from_file(file.path());
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Malformed cost table row")
        );
    }
}
