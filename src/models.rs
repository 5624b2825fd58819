use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text and usage metrics returned by one model invocation
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// The generated text response
    pub text: String,
    /// Tokens consumed by the prompt
    pub input_tokens: u32,
    /// Tokens generated in the response
    pub output_tokens: u32,
    /// Total tokens for the call
    pub total_tokens: u32,
    /// Wall-clock latency of the call in milliseconds
    pub latency_ms: u64,
}

/// One fully evaluated dataset row, ready to append to a result sheet
#[derive(Debug, Clone)]
pub struct RowRecord {
    pub prova_id: String,
    pub input_id: String,
    pub gabarito: String,
    pub resposta: String,
    pub resposta_raw: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub latency_ms: u64,
}

/// Parallel result arrays, all kept at equal length by `ResultSheet::append`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultColumns {
    pub prova_id: Vec<String>,
    pub input_id: Vec<String>,
    pub gabarito: Vec<String>,
    pub respostas: Vec<String>,
    pub respostas_raw: Vec<String>,
    pub input_tokens: Vec<u32>,
    pub output_tokens: Vec<u32>,
    pub total_tokens: Vec<u32>,
    pub latency: Vec<u64>,
}

/// Everything one Run produces: descriptor, identity hash, parameters and the
/// per-row results. Persisted as a single JSON document at Run end and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSheet {
    pub model_desc: String,
    pub execution_hash: String,
    pub parameters: BTreeMap<String, String>,
    pub results: ResultColumns,
}

impl ResultSheet {
    /// Create an empty sheet for a Run
    pub fn new(
        model_desc: String,
        execution_hash: String,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            model_desc,
            execution_hash,
            parameters,
            results: ResultColumns::default(),
        }
    }

    /// Append one evaluated row, keeping all columns parallel
    pub fn append(&mut self, record: RowRecord) {
        self.results.prova_id.push(record.prova_id);
        self.results.input_id.push(record.input_id);
        self.results.gabarito.push(record.gabarito);
        self.results.respostas.push(record.resposta);
        self.results.respostas_raw.push(record.resposta_raw);
        self.results.input_tokens.push(record.input_tokens);
        self.results.output_tokens.push(record.output_tokens);
        self.results.total_tokens.push(record.total_tokens);
        self.results.latency.push(record.latency_ms);
    }

    /// Number of evaluated rows
    pub fn len(&self) -> usize {
        self.results.respostas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.respostas.is_empty()
    }

    /// Rows whose parsed answer exactly matches the gabarito
    pub fn correct_count(&self) -> usize {
        self.results
            .respostas
            .iter()
            .zip(self.results.gabarito.iter())
            .filter(|(resposta, gabarito)| resposta == gabarito)
            .count()
    }
}

/// Per-model comparison metrics derived from persisted result sheets
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedMetric {
    /// Model identifier with vendor tokens stripped for display
    pub model_id: String,
    /// Display name disambiguated by the short run-hash suffix
    pub model_name: String,
    /// Provider inferred from the model name
    pub provider: String,
    /// Percentage of correct answers
    pub accuracy: f64,
    /// USD per million tokens, input plus output
    pub cost: f64,
    /// Mean latency in milliseconds
    pub avg_latency: f64,
    /// Percentage of responses inconsistent with the expected answer shape
    pub error: f64,
    /// Composite ranking score: (accuracy^5 / 1e9) / cost
    pub efficiency_index: f64,
}
