//! Domain flag check
//!
//! One generation call decides whether a question concerns the Bhagavad Gita
//! or the Yoga Sutras. Only a trimmed `1` counts as in domain; `0` and any
//! other reply are out of domain.

use samay_common::errors::Result;
use samay_common::llm::Generator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainFlag {
    InDomain,
    OutOfDomain,
}

impl DomainFlag {
    /// Interpret a flag reply
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim() {
            "1" => DomainFlag::InDomain,
            "0" => DomainFlag::OutOfDomain,
            other => {
                warn!(reply = other, "Unexpected domain flag reply, treating as out of domain");
                DomainFlag::OutOfDomain
            }
        }
    }

    pub fn is_in_domain(&self) -> bool {
        matches!(self, DomainFlag::InDomain)
    }
}

/// Asks the generation service whether a query is in domain
pub struct DomainFlagger {
    generator: Arc<dyn Generator>,
}

impl DomainFlagger {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub fn prompt(query: &str) -> String {
        format!(
            "You are an AI assistant with an expertise in Bhagwad Gita and Patanjali Yoga Sutras. \
You have to check whether the user query is related to these scriptures or not.\n\
User Query : {query}\n\n\
Guidelines:\n\
- If the query is not related just return 0.\n\
- If the query is related then just return 1.\n\
- No explanations needed just return the answer either 0 or 1.\n\
- Also no other text should be present in your response just provide 0 or 1 that's it.\n"
        )
    }

    pub async fn flag(&self, query: &str) -> Result<DomainFlag> {
        let reply = self.generator.generate(&Self::prompt(query)).await?;
        let flag = DomainFlag::from_reply(&reply);
        debug!(?flag, "Domain flag");
        Ok(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samay_common::llm::MockGenerator;

    #[test]
    fn test_flag_reply_parsing() {
        assert_eq!(DomainFlag::from_reply("1"), DomainFlag::InDomain);
        assert_eq!(DomainFlag::from_reply(" 1\n"), DomainFlag::InDomain);
        assert_eq!(DomainFlag::from_reply("0"), DomainFlag::OutOfDomain);
        assert_eq!(DomainFlag::from_reply("yes"), DomainFlag::OutOfDomain);
        assert_eq!(DomainFlag::from_reply("1."), DomainFlag::OutOfDomain);
        assert_eq!(DomainFlag::from_reply(""), DomainFlag::OutOfDomain);
    }

    #[tokio::test]
    async fn test_flag_sends_query() {
        let generator = MockGenerator::constant("1").into_arc();
        let flagger = DomainFlagger::new(generator.clone());

        assert!(flagger.flag("What is karma yoga?").await.unwrap().is_in_domain());
        assert!(generator.prompts()[0].contains("User Query : What is karma yoga?"));
    }
}
