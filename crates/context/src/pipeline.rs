//! Answer Pipeline - flag, rewrite, retrieve, generate
//!
//! Provides:
//! - The end-to-end question answering flow over an injected retriever and generator
//! - Fixed user-facing outcomes for out-of-domain questions and empty retrieval
//! - Service failures surfaced as errors, never disguised as "no context"

use crate::flagger::{DomainFlag, DomainFlagger};
use crate::prompt::{answer_prompt, PromptContext};
use crate::rewriter::QueryRewriter;
use samay_common::config::PipelineConfig;
use samay_common::errors::Result;
use samay_common::llm::Generator;
use samay_common::metrics::{self, StageTimer};
use samay_search::PassageRetriever;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const OUT_OF_DOMAIN_MESSAGE: &str =
    "This question is not related to Bhagwad Gita or Yoga Sutras in any way. Please ask relevant questions only.";

pub const NO_CONTEXT_MESSAGE: &str =
    "No relevant context was found in the Bhagavad Gita to answer this question.";

/// Generated answer with the passages that grounded it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub answer_text: String,

    /// Passage ids in rank order
    pub cited_passage_ids: Vec<String>,

    /// Speaker label per cited passage
    pub cited_speakers: Vec<String>,

    /// Texts of the cited passages joined by newlines
    pub grounding_text: String,

    pub shlokas: Vec<String>,

    /// Query the retriever actually ran
    pub rewritten_query: String,
}

/// Result of one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered(GroundedAnswer),
    OutOfDomain,
    NoRelevantContext,
}

impl AnswerOutcome {
    /// Text shown to the user
    pub fn message(&self) -> &str {
        match self {
            AnswerOutcome::Answered(answer) => &answer.answer_text,
            AnswerOutcome::OutOfDomain => OUT_OF_DOMAIN_MESSAGE,
            AnswerOutcome::NoRelevantContext => NO_CONTEXT_MESSAGE,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AnswerOutcome::Answered(_) => "answered",
            AnswerOutcome::OutOfDomain => "out_of_domain",
            AnswerOutcome::NoRelevantContext => "no_context",
        }
    }
}

/// Question answering over a retriever and a generation service
pub struct AnswerPipeline {
    generator: Arc<dyn Generator>,
    retriever: Arc<dyn PassageRetriever>,
    flagger: DomainFlagger,
    rewriter: QueryRewriter,
    config: PipelineConfig,
}

impl AnswerPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        retriever: Arc<dyn PassageRetriever>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            flagger: DomainFlagger::new(generator.clone()),
            rewriter: QueryRewriter::new(generator.clone()),
            generator,
            retriever,
            config,
        }
    }

    /// Answer one question
    #[instrument(skip(self), fields(request_id = %Uuid::new_v4()))]
    pub async fn answer(&self, query: &str) -> Result<AnswerOutcome> {
        let timer = StageTimer::start("answer");
        let result = self.run(query).await;
        let elapsed = timer.finish();

        match &result {
            Ok(outcome) => {
                metrics::record_answer(outcome.label());
                info!(outcome = outcome.label(), elapsed_secs = elapsed, "Question handled");
            }
            Err(e) => {
                metrics::record_answer("error");
                warn!(error = %e, code = ?e.code(), "Question failed");
            }
        }
        result
    }

    async fn run(&self, query: &str) -> Result<AnswerOutcome> {
        if self.config.flag_check && self.flagger.flag(query).await? == DomainFlag::OutOfDomain {
            return Ok(AnswerOutcome::OutOfDomain);
        }

        let rewritten = if self.config.rewrite_query {
            self.rewriter.rewrite(query).await?
        } else {
            query.to_string()
        };

        let timer = StageTimer::start("retrieval");
        let ranked = self.retriever.retrieve(&rewritten).await?;
        timer.finish();

        if ranked.is_empty() {
            return Ok(AnswerOutcome::NoRelevantContext);
        }

        let context = PromptContext::from_records(ranked.records());
        let prompt = answer_prompt(query, &context);

        let timer = StageTimer::start("generation");
        let answer_text = self.generator.generate(&prompt).await?;
        timer.finish();

        Ok(AnswerOutcome::Answered(GroundedAnswer {
            answer_text: answer_text.trim().to_string(),
            cited_passage_ids: context.passage_ids,
            cited_speakers: context.speakers,
            grounding_text: context.grounding_text,
            shlokas: context.shlokas,
            rewritten_query: rewritten,
        }))
    }
}
