//! Retrieval evaluation
//!
//! Provides:
//! - Rule-based hit rate: the question itself appears among the retrieved question texts
//! - LLM-judged hit rate: the generation service says a retrieved passage answers it
//!
//! Both report the fraction of dataset questions with a hit; an empty
//! dataset scores 0.

use samay_common::errors::{AppError, Result};
use samay_common::llm::Generator;
use samay_common::models::PassageRecord;
use samay_search::PassageRetriever;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One dataset question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    pub question: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetRow {
    Question(String),
    Case(EvalCase),
}

impl From<DatasetRow> for EvalCase {
    fn from(row: DatasetRow) -> Self {
        match row {
            DatasetRow::Question(question) => EvalCase { question },
            DatasetRow::Case(case) => case,
        }
    }
}

/// Load a JSON array of questions (`"..."` or `{ "question": "..." }`)
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<EvalCase>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::NotFound {
        resource_type: "evaluation dataset".to_string(),
        id: format!("{} ({})", path.display(), e),
    })?;
    let rows: Vec<DatasetRow> = serde_json::from_str(&raw)?;
    Ok(rows.into_iter().map(EvalCase::from).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    RuleBased,
    LlmJudged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub method: EvaluationMethod,
    pub cases: usize,
    pub hits: usize,

    /// `hits / cases`, 0 for an empty dataset
    pub hit_rate: f64,
}

impl EvaluationReport {
    fn new(method: EvaluationMethod, cases: usize, hits: usize) -> Self {
        let hit_rate = if cases == 0 {
            0.0
        } else {
            hits as f64 / cases as f64
        };
        Self {
            method,
            cases,
            hits,
            hit_rate,
        }
    }
}

/// Measures how often retrieval surfaces the passage a question came from
pub struct RetrievalEvaluator {
    retriever: Arc<dyn PassageRetriever>,
}

impl RetrievalEvaluator {
    pub fn new(retriever: Arc<dyn PassageRetriever>) -> Self {
        Self { retriever }
    }

    /// Count a hit when the question is one of the retrieved passages' questions
    pub async fn rule_based(&self, cases: &[EvalCase]) -> Result<EvaluationReport> {
        let mut hits = 0;
        for (i, case) in cases.iter().enumerate() {
            let ranked = self.retriever.retrieve(&case.question).await?;
            let hit = ranked.records().any(|r| contains_question(r, &case.question));
            if hit {
                hits += 1;
            }
            debug!(case = i, hit, running_hits = hits, "Rule-based case scored");
        }

        let report = EvaluationReport::new(EvaluationMethod::RuleBased, cases.len(), hits);
        info!(cases = report.cases, hits, hit_rate = report.hit_rate, "Rule-based evaluation done");
        Ok(report)
    }

    /// Count a hit when the judge answers "yes" for any retrieved passage
    pub async fn llm_judged(
        &self,
        judge: &dyn Generator,
        cases: &[EvalCase],
    ) -> Result<EvaluationReport> {
        let mut hits = 0;
        for (i, case) in cases.iter().enumerate() {
            let ranked = self.retriever.retrieve(&case.question).await?;

            let mut hit = false;
            for record in ranked.records() {
                let reply = judge.generate(&judge_prompt(&case.question, &record.text)).await?;
                if is_affirmative(&reply) {
                    hit = true;
                    break;
                }
            }
            if hit {
                hits += 1;
            }
            debug!(case = i, hit, running_hits = hits, "LLM-judged case scored");
        }

        let report = EvaluationReport::new(EvaluationMethod::LlmJudged, cases.len(), hits);
        info!(cases = report.cases, hits, hit_rate = report.hit_rate, "LLM-judged evaluation done");
        Ok(report)
    }
}

/// Split passage text into `?`-terminated questions and look for an exact match
fn contains_question(record: &PassageRecord, question: &str) -> bool {
    let question = question.trim();
    record
        .text
        .split('?')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .any(|piece| format!("{piece}?") == question)
}

pub fn judge_prompt(query: &str, document: &str) -> String {
    format!(
        "Determine if the following document directly answers the query. \
Respond with \"Yes\" if it does, otherwise \"No\".\n\
Query: {query}\n\
Document: {document}\n\n\
Guidelines:\n\
- No explanation is required.\n\
- No other text is required.\n\
- Just provide yes or no\n"
    )
}

fn is_affirmative(reply: &str) -> bool {
    reply.trim().to_lowercase().trim_end_matches('.') == "yes"
}
