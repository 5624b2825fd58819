use anyhow::{Context, Result};
use clap::ValueEnum;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::Path;

/// One normalized exam question, independent of the source dataset shape
#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub prova_id: String,
    pub input_id: String,
    pub utterance: String,
    pub alternatives: String,
    pub gabarito: String,
    pub image_description: Option<String>,
}

/// Supported exam datasets. Each variant owns its dataset row shape and how
/// rows are filtered and rendered into prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExamKind {
    /// Exame Nacional da Magistratura
    Enam,
    /// Exame Nacional do Ensino Médio
    Enem,
    /// Multilingual MMLU (PT-BR split)
    Mmmlu,
    /// Ordem dos Advogados do Brasil bar exam
    Oab,
}

const CHOICE_LETTERS: [&str; 5] = ["A", "B", "C", "D", "E"];

impl ExamKind {
    /// Identifier tag for the exam being scored within a Run
    pub fn prefix(&self, year: &str) -> String {
        match self {
            ExamKind::Enam => tag_with_year("enam", year),
            ExamKind::Enem => tag_with_year("enem", year),
            ExamKind::Mmmlu => "mmmlu".to_string(),
            ExamKind::Oab => tag_with_year("oab", year),
        }
    }

    /// Load and prepare all rows from a local dataset file, in file order
    pub fn load_rows(&self, path: &Path, year: &str) -> Result<Vec<QuestionRow>> {
        match self {
            ExamKind::Enam => self.load_enam(path, year),
            ExamKind::Enem => self.load_enem(path, year),
            ExamKind::Mmmlu => self.load_mmmlu(path),
            ExamKind::Oab => self.load_oab(path, year),
        }
    }

    /// Exam-specific fixup applied after the generic answer extraction
    pub fn fix_answer(&self, answer: String) -> String {
        match self {
            // ENAM models often answer "(A)"; reduce to the bare letter
            ExamKind::Enam if answer.chars().count() == 3 => {
                answer.replace('(', "").replace(')', "")
            }
            _ => answer,
        }
    }

    fn load_enam(&self, path: &Path, year: &str) -> Result<Vec<QuestionRow>> {
        let prefix = self.prefix(year);
        let rows: Vec<EnamRow> = read_json_array(path)?;

        Ok(rows
            .into_iter()
            .map(|row| QuestionRow {
                prova_id: prefix.clone(),
                input_id: row.questao_id,
                utterance: row.enunciado,
                alternatives: row.alternativas.join("\n"),
                gabarito: row.gabarito,
                image_description: None,
            })
            .collect())
    }

    fn load_enem(&self, path: &Path, _year: &str) -> Result<Vec<QuestionRow>> {
        let rows: Vec<EnemRow> = read_json_lines(path)?;

        Ok(rows
            .into_iter()
            .filter(|row| row.label != "Anulado")
            .map(|row| {
                let alternatives = letter_alternatives(&row.alternatives);
                let image_description = if row.uses_image {
                    row.description.first().cloned()
                } else {
                    None
                };
                QuestionRow {
                    prova_id: row.exam,
                    input_id: row.id,
                    utterance: row.question,
                    alternatives,
                    gabarito: row.label,
                    image_description,
                }
            })
            .collect())
    }

    fn load_mmmlu(&self, path: &Path) -> Result<Vec<QuestionRow>> {
        let rows: Vec<MmmluRow> = read_json_array(path)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let alternatives = format!(
                    "A) {}\nB) {}\nC) {}\nD) {}",
                    row.a, row.b, row.c, row.d
                );
                QuestionRow {
                    prova_id: "mmmlu".to_string(),
                    input_id: question_hash(&row.question),
                    utterance: row.question,
                    alternatives,
                    gabarito: row.answer,
                    image_description: None,
                }
            })
            .collect())
    }

    fn load_oab(&self, path: &Path, year: &str) -> Result<Vec<QuestionRow>> {
        let rows: Vec<OabRow> = read_json_array(path)?;

        Ok(rows
            .into_iter()
            .filter(|row| year.is_empty() || row.exam_year == year)
            .map(|row| {
                let alternatives = row
                    .choices
                    .label
                    .iter()
                    .zip(row.choices.text.iter())
                    .map(|(label, text)| format!("{label}) {text}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                QuestionRow {
                    prova_id: row.exam_id,
                    input_id: row.id,
                    utterance: row.question,
                    alternatives,
                    gabarito: row.answer_key,
                    image_description: None,
                }
            })
            .collect())
    }
}

/// Deterministically sample a fraction of the dataset, preserving the
/// original row order. A fraction of 1.0 or more keeps everything.
pub fn sample_rows(rows: Vec<QuestionRow>, fraction: f64) -> Vec<QuestionRow> {
    if fraction >= 1.0 || rows.is_empty() {
        return rows;
    }

    let keep = ((rows.len() as f64) * fraction).round() as usize;
    let keep = keep.min(rows.len());

    let mut rng = StdRng::seed_from_u64(1);
    let mut indices = rand::seq::index::sample(&mut rng, rows.len(), keep).into_vec();
    indices.sort_unstable();

    let mut selected = Vec::with_capacity(keep);
    let mut rows = rows.into_iter();
    let mut cursor = 0;
    for index in indices {
        if let Some(row) = rows.nth(index - cursor) {
            selected.push(row);
        }
        cursor = index + 1;
    }
    selected
}

fn tag_with_year(exam: &str, year: &str) -> String {
    if year.is_empty() {
        exam.to_string()
    } else {
        format!("{exam}_{year}")
    }
}

fn letter_alternatives(alternatives: &[String]) -> String {
    alternatives
        .iter()
        .enumerate()
        .filter_map(|(index, text)| {
            CHOICE_LETTERS
                .get(index)
                .map(|letter| format!("{letter}) {text}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stable identifier for datasets without a question id column
fn question_hash(question: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question.as_bytes());
    hex::encode(hasher.finalize())
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset JSON: {}", path.display()))
}

fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(number, line)| {
            serde_json::from_str(line).with_context(|| {
                format!("Failed to parse line {} of {}", number + 1, path.display())
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct EnamRow {
    questao_id: String,
    enunciado: String,
    alternativas: Vec<String>,
    gabarito: String,
}

#[derive(Debug, Deserialize)]
struct EnemRow {
    exam: String,
    id: String,
    question: String,
    alternatives: Vec<String>,
    label: String,
    #[serde(rename = "IU", default)]
    uses_image: bool,
    #[serde(default)]
    description: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MmmluRow {
    #[serde(rename = "Question")]
    question: String,
    #[serde(rename = "A")]
    a: String,
    #[serde(rename = "B")]
    b: String,
    #[serde(rename = "C")]
    c: String,
    #[serde(rename = "D")]
    d: String,
    #[serde(rename = "Answer")]
    answer: String,
}

#[derive(Debug, Deserialize)]
struct OabChoices {
    label: Vec<String>,
    text: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OabRow {
    exam_id: String,
    id: String,
    question: String,
    choices: OabChoices,
    #[serde(rename = "answerKey")]
    answer_key: String,
    exam_year: String,
}
