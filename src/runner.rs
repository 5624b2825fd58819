use crate::config::BenchConfig;
use crate::exams::{ExamKind, QuestionRow};
use crate::invoke::{InvokeRequest, ModelInvoker};
use crate::models::{ResultSheet, RowRecord};
use crate::postprocess::extract_answer;
use crate::prompt::{self, PROMPT_CHAR_LIMIT};
use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

/// Deterministic Run identity over everything that shapes its results.
/// The same inputs always produce the same hash, which is what makes
/// duplicate-run detection possible.
pub fn run_hash(
    model: &str,
    use_cot: bool,
    nsample: f64,
    config_file: &str,
    args: &BTreeMap<String, String>,
) -> String {
    let mut canonical = format!("{model}_{use_cot}_{nsample}_{config_file}_");
    for (key, value) in args {
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
        canonical.push(';');
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Descriptor string used in file names and aggregation:
/// dots become underscores, suffixed by the prompting mode.
pub fn model_descriptor(model: &str, use_cot: bool) -> String {
    let descriptor = model.replace('.', "_");
    if use_cot {
        format!("{descriptor}_zero_shot_cot")
    } else {
        format!("{descriptor}_zero_shot")
    }
}

/// Canonical storage location for a Run's result sheet
pub fn sheet_path(results_dir: &Path, hash: &str, prefix: &str, model_desc: &str) -> PathBuf {
    results_dir.join(format!("{hash}_{prefix}_{model_desc}.json"))
}

/// Outcome of the duplicate-run check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    AlreadyDone,
}

/// Presence-based idempotency check. Two processes racing to start the same
/// Run can both pass before either persists; the check is deliberately not a
/// lock.
pub fn check_existing_run(
    results_dir: &Path,
    hash: &str,
    prefix: &str,
    model_desc: &str,
) -> GateDecision {
    if sheet_path(results_dir, hash, prefix, model_desc).is_file() {
        GateDecision::AlreadyDone
    } else {
        GateDecision::Proceed
    }
}

/// Everything one Run needs to drive rows through the model: the injected
/// client, the prompt configuration and the adaptive inter-call delay.
///
/// The delay is shared across the whole Run: every failed invocation raises
/// it by one second and it never comes back down, so later rows inherit the
/// slower pace.
pub struct RunContext<'a> {
    pub invoker: &'a dyn ModelInvoker,
    pub config: &'a BenchConfig,
    pub exam: ExamKind,
    pub model_id: String,
    pub use_cot: bool,
    pub delay_secs: u64,
    pub max_attempts: u32,
}

impl RunContext<'_> {
    /// Drive every row through one model invocation, in dataset order, and
    /// append the results to the sheet. Invocation failures are retried with
    /// the growing delay; the Run only aborts on an oversized prompt or when
    /// a row exhausts `max_attempts`.
    pub async fn execute(&mut self, rows: &[QuestionRow], sheet: &mut ResultSheet) -> Result<()> {
        println!("Model = {}", sheet.model_desc);
        let bar = progress_bar(rows.len() as u64);

        for row in rows {
            let record = self.process_row(row).await?;
            sheet.append(record);
            bar.inc(1);
        }

        bar.finish();
        Ok(())
    }

    async fn process_row(&mut self, row: &QuestionRow) -> Result<RowRecord> {
        let rendered = prompt::render_prompt(
            &self.config.prompt_template,
            &row.utterance,
            &row.alternatives,
            &self.config.zero_shot_footer,
            &self.config.chain_of_thought_footer,
            self.use_cot,
            row.image_description.as_deref(),
        );

        // Fatal, checked before any invocation and never retried
        if rendered.chars().count() > PROMPT_CHAR_LIMIT {
            bail!(
                "Prompt for question {} exceeds {} characters",
                row.input_id,
                PROMPT_CHAR_LIMIT
            );
        }

        let request = InvokeRequest {
            model_id: self.model_id.clone(),
            prompt: rendered,
            system_prompt: prompt::system_prompt(&self.config.system_prompt),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut attempts = 0;
        let reply = loop {
            sleep(Duration::from_secs(self.delay_secs)).await;

            match self.invoker.invoke(&request).await {
                Ok(reply) => break reply,
                Err(error) => {
                    attempts += 1;
                    println!(
                        "Sleep = {}. Attempt {}/{}. Error = {:#}",
                        self.delay_secs, attempts, self.max_attempts, error
                    );
                    self.delay_secs += 1;

                    if attempts >= self.max_attempts {
                        return Err(error).with_context(|| {
                            format!(
                                "Giving up on question {} after {} attempts",
                                row.input_id, attempts
                            )
                        });
                    }
                }
            }
        };

        let parsed = if reply.text.is_empty() {
            String::new()
        } else {
            extract_answer(
                &reply.text,
                self.config.answer_min,
                self.config.answer_max,
                &self.config.answer_tag,
            )
        };
        let parsed = self.exam.fix_answer(parsed);

        Ok(RowRecord {
            prova_id: row.prova_id.clone(),
            input_id: row.input_id.clone(),
            gabarito: row.gabarito.clone(),
            resposta: parsed,
            resposta_raw: reply.text,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            total_tokens: reply.total_tokens,
            latency_ms: reply.latency_ms,
        })
    }
}

/// Persist a completed sheet and print its accuracy summary. Persistence is
/// all-or-nothing: nothing is written until the Run has finished every row.
pub fn save_results(results_dir: &Path, prefix: &str, sheet: &ResultSheet) -> Result<()> {
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create results directory: {}", results_dir.display()))?;

    let path = sheet_path(results_dir, &sheet.execution_hash, prefix, &sheet.model_desc);
    let json = serde_json::to_string_pretty(sheet).context("Failed to serialize result sheet")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write result sheet: {}", path.display()))?;

    println!(
        "Model {} answered {} of {} correctly",
        sheet.model_desc,
        sheet.correct_count(),
        sheet.len()
    );
    println!("Results stored to: {}", path.display());
    Ok(())
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Failed to set progress bar template")
            .progress_chars("#>-"),
    );
    bar
}
