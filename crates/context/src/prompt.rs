//! Answer prompt assembly
//!
//! Provides:
//! - Extraction of ids, speakers, shlokas and commentary from retrieved passages
//! - The teacher-persona answer prompt

use samay_common::models::PassageRecord;
use serde::{Deserialize, Serialize};

const MISSING: &str = "N/A";

/// Grounding material pulled out of the retrieved passages, in rank order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub passage_ids: Vec<String>,

    /// One label per passage; several speakers are joined with ", "
    pub speakers: Vec<String>,

    pub shlokas: Vec<String>,

    /// Commentary of every passage, flattened
    pub purports: Vec<String>,

    /// Passage texts joined by newlines
    pub grounding_text: String,
}

impl PromptContext {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PassageRecord>,
    {
        let mut context = Self::default();
        let mut texts = Vec::new();

        for record in records {
            let metadata = &record.metadata;
            context.passage_ids.push(record.id.clone());
            context.speakers.push(metadata.speaker_label());
            context
                .shlokas
                .push(metadata.shloka.clone().unwrap_or_else(|| MISSING.to_string()));
            context
                .purports
                .extend(metadata.purport_values().into_iter().map(str::to_string));
            texts.push(record.text.as_str());
        }

        context.grounding_text = texts.join("\n");
        context
    }

    pub fn is_empty(&self) -> bool {
        self.passage_ids.is_empty()
    }
}

/// Prompt for the final answer. `question` is the user's original wording.
pub fn answer_prompt(question: &str, context: &PromptContext) -> String {
    format!(
        "\nYou are a wise and enlightened teacher of both the Bhagavad Gita and the Patanjali Yoga Sutras. \
Use the following explanations of shlokas and sutras to provide a deep, reflective, and insightful \
answer to the user's question by summarizing these in not more than 500 words.\n\n\
Context:\n{context}\n\n\
Metadata:\n\
- Verse/Sutra IDs: {ids}\n\
- Speakers: {speakers}\n\n\
Texts:\n\
- Shlokas/Sutras: {shlokas}\n\n\
Question:\n{question}\n\n\
Guidelines:\n\
- Respond as a spiritual teacher imparting timeless wisdom to a seeker.\n\
- Reference the teachings of Bhagwan Krishna, Arjuna, and Patanjali in a manner that feels like a direct and harmonious conversation.\n\
- Frame the response as a journey of understanding, integrating the core principles of both texts.\n\
- Provide explanations that are rich in spiritual, ethical, and practical wisdom.\n\
- Address the seeker with a compassionate tone, as if guiding them on a path to spiritual enlightenment.\n\
- Stay true to the teachings within the Bhagavad Gita and the Patanjali Yoga Sutras. Do not introduce outside concepts or beliefs.\n\
- If the question is unclear or cannot be answered with the given texts, respond with: \"I cannot provide an answer based on the given verses or sutras, as the teachings require a deeper understanding of one's nature and path.\"\n\
- Disclamer - If the question is not related to the Bhagavad Gita or the Patanjali Yoga Sutras or the context is not clear, respond with: \"This question is beyond the scope of the Bhagavad Gita and the Patanjali Yoga Sutras.\"\n\
- Don't use any information that is not present in the given context.\n\n\
Condensed Answer:\n",
        context = context.purports.join(","),
        ids = context.passage_ids.join(", "),
        speakers = context.speakers.join(", "),
        shlokas = context.shlokas.join(", "),
    )
}
