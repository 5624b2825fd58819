use crate::costs::CostTable;
use crate::models::{AggregatedMetric, ResultSheet};
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::Path;

/// One evaluated row tagged with its model identity, the unit the
/// aggregation works over
#[derive(Debug, Clone)]
pub struct TaggedRow {
    pub model_id: String,
    pub model_name: String,
    pub gabarito: String,
    pub resposta: String,
    pub resposta_raw: String,
    pub output_tokens: u32,
    pub latency_ms: u64,
    pub correct: bool,
}

/// Load every persisted result sheet from the results directory
pub fn load_all_sheets(results_dir: &Path) -> Result<Vec<ResultSheet>> {
    let entries = std::fs::read_dir(results_dir)
        .with_context(|| format!("Failed to read results directory: {}", results_dir.display()))?;

    let mut sheets = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read result sheet: {}", path.display()))?;
        let sheet: ResultSheet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse result sheet: {}", path.display()))?;
        sheets.push(sheet);
    }

    // Directory iteration order is platform-dependent; keep runs stable
    sheets.sort_by(|a, b| {
        (&a.model_desc, &a.execution_hash).cmp(&(&b.model_desc, &b.execution_hash))
    });
    Ok(sheets)
}

/// Flatten sheets into tagged rows. The display name carries a short
/// run-hash suffix so two runs of the same model stay distinguishable.
pub fn tag_rows(sheets: &[ResultSheet]) -> Result<Vec<TaggedRow>> {
    let mut rows = Vec::new();

    for sheet in sheets {
        let results = &sheet.results;
        let count = results.respostas.len();
        if results.gabarito.len() != count
            || results.respostas_raw.len() != count
            || results.output_tokens.len() != count
            || results.latency.len() != count
        {
            bail!(
                "Result sheet {} has non-parallel arrays",
                sheet.execution_hash
            );
        }

        let short_hash: String = sheet.execution_hash.chars().take(5).collect();
        let model_name = format!("{} - {}", sheet.model_desc, short_hash);

        for index in 0..count {
            rows.push(TaggedRow {
                model_id: sheet.model_desc.clone(),
                model_name: model_name.clone(),
                gabarito: results.gabarito[index].clone(),
                resposta: results.respostas[index].clone(),
                resposta_raw: results.respostas_raw[index].clone(),
                output_tokens: results.output_tokens[index],
                latency_ms: results.latency[index],
                correct: results.respostas[index] == results.gabarito[index],
            });
        }
    }

    Ok(rows)
}

/// Fraction of each model's responses whose shape is inconsistent with the
/// expected short answer: both the parsed length and the raw length (spaces
/// removed) fall outside {6, 8}. Percentage per model, rounded to 2 decimals.
pub fn margin_of_error(rows: &[TaggedRow]) -> BTreeMap<String, f64> {
    let mut odd_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut row_counts: BTreeMap<String, usize> = BTreeMap::new();

    for row in rows {
        *row_counts.entry(row.model_name.clone()).or_insert(0) += 1;
        if answer_shape_is_odd(&row.resposta, &row.resposta_raw) {
            *odd_counts.entry(row.model_name.clone()).or_insert(0) += 1;
        }
    }

    odd_counts
        .into_iter()
        .map(|(model_name, count)| {
            let size = row_counts[&model_name];
            let percentage = round2(100.0 * count as f64 / size as f64);
            (model_name, percentage)
        })
        .collect()
}

fn answer_shape_is_odd(resposta: &str, resposta_raw: &str) -> bool {
    let parsed_len = resposta.chars().count();
    let raw_len = resposta_raw.replace(' ', "").chars().count();
    (parsed_len != 6 && parsed_len != 8) && (raw_len != 6 && raw_len != 8)
}

/// Combine tagged rows into one ranked comparison table, sorted descending
/// by efficiency index.
pub fn aggregate(
    rows: &[TaggedRow],
    costs: &CostTable,
    normalize_latency: bool,
) -> Result<Vec<AggregatedMetric>> {
    let error_margin = margin_of_error(rows);

    let mut model_names: Vec<String> = Vec::new();
    for row in rows {
        if !model_names.contains(&row.model_name) {
            model_names.push(row.model_name.clone());
        }
    }

    let mut metrics = Vec::with_capacity(model_names.len());
    for name in &model_names {
        let model_rows: Vec<&TaggedRow> =
            rows.iter().filter(|row| &row.model_name == name).collect();
        if model_rows.is_empty() {
            continue;
        }

        let uses_cot = name.contains("cot");
        let normalized_id = normalize_model_id(&model_rows[0].model_id);
        let entry = costs
            .find(&normalized_id)
            .with_context(|| format!("No cost metadata for model {normalized_id}"))?;

        // USD per million tokens in each direction, summed. Deliberately not
        // weighted by the actual token volume of the run.
        let cost = entry.input_price_per_1k * 1000.0 + entry.output_price_per_1k * 1000.0;

        let correct = model_rows.iter().filter(|row| row.correct).count();
        let accuracy = 100.0 * correct as f64 / model_rows.len() as f64;

        let avg_latency = average_latency(&model_rows, normalize_latency, uses_cot);
        let error = error_margin.get(name).copied().unwrap_or(0.0);
        let efficiency_index = accuracy.powi(5) / 1e9 / cost;

        metrics.push(AggregatedMetric {
            model_id: strip_display_tokens(&normalized_id),
            model_name: strip_display_tokens(name),
            provider: parse_provider(name),
            accuracy,
            cost,
            avg_latency,
            error,
            efficiency_index,
        });
    }

    metrics.sort_by(|a, b| {
        b.efficiency_index
            .partial_cmp(&a.efficiency_index)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(metrics)
}

/// Mean latency. When normalization is requested and the model is not a
/// chain-of-thought variant, the mean is restricted to rows with fewer than
/// 20 output tokens to keep verbose outliers out of the average.
fn average_latency(rows: &[&TaggedRow], normalize: bool, uses_cot: bool) -> f64 {
    if normalize && !uses_cot {
        let filtered: Vec<u64> = rows
            .iter()
            .filter(|row| row.output_tokens < 20)
            .map(|row| row.latency_ms)
            .collect();
        if !filtered.is_empty() {
            return filtered.iter().sum::<u64>() as f64 / filtered.len() as f64;
        }
    }

    rows.iter().map(|row| row.latency_ms).sum::<u64>() as f64 / rows.len() as f64
}

/// Undo the descriptor mangling so the id matches the cost table: dots back
/// in place, prompting-mode suffixes removed
pub fn normalize_model_id(model_id: &str) -> String {
    model_id
        .replace('_', ".")
        .replace(".zero.shot.cot", "")
        .replace(".zero.shot", "")
        .replace(".manual", "")
}

/// Remove cosmetic vendor namespace tokens for display
pub fn strip_display_tokens(name: &str) -> String {
    name.replace("us_", "")
        .replace("us.", "")
        .replace("anthropic_", "")
        .replace("amazon_", "")
        .replace("meta_", "")
        .replace("_zero_shot", "")
}

/// Classify the provider from the model name
pub fn parse_provider(model_name: &str) -> String {
    let lowered = model_name.to_lowercase();
    if lowered.contains("nova") {
        "amazon".to_string()
    } else if lowered.contains("haiku") || lowered.contains("sonnet") {
        "anthropic".to_string()
    } else if lowered.contains("llama") {
        "meta".to_string()
    } else if lowered.contains("gpt") {
        "openai".to_string()
    } else {
        "maritaca ai".to_string()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
