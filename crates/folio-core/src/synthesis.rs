//! Iterative answer synthesis: fold ordered segments into one answer, one call each.
//!
//! Every step sees the question, the running answer, and one segment, so the prompt
//! stays bounded by a single segment no matter how many were retrieved. Steps are
//! strictly sequential and paced; a multi-step fold ends with one polish call.

use std::fmt::Write;

use folio_llm::{CompletionOptions, LlmError, LlmProvider, Pacer};
use folio_memory::document::Segment;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("completion failed at step {step} of {total}: {source}")]
    Collaborator {
        step: usize,
        total: usize,
        #[source]
        source: LlmError,
    },

    #[error("no segments to synthesize an answer from")]
    NoSegments,
}

pub struct IterativeSynthesizer<P: LlmProvider> {
    provider: P,
    pacer: Pacer,
    options: CompletionOptions,
}

impl<P: LlmProvider> IterativeSynthesizer<P> {
    #[must_use]
    pub fn new(provider: P, pacer: Pacer, options: CompletionOptions) -> Self {
        Self {
            provider,
            pacer,
            options,
        }
    }

    /// Fold `segments` in order into an answer to `question`.
    ///
    /// `history` is rendered conversation context and may be empty. With more than one
    /// segment the folded answer goes through a final polish call.
    ///
    /// # Errors
    ///
    /// Any failed call aborts the whole fold; no partial answer is returned.
    pub async fn generate_answer(
        &self,
        question: &str,
        segments: &[Segment],
        history: &str,
    ) -> Result<String, SynthesisError> {
        if segments.is_empty() {
            return Err(SynthesisError::NoSegments);
        }

        let total = segments.len() + usize::from(segments.len() > 1);
        let mut answer = String::new();

        for (i, segment) in segments.iter().enumerate() {
            let content = segment.content.as_deref().unwrap_or_default();
            let prompt = if i == 0 {
                first_step_prompt(question, content, history, segments.len())
            } else {
                revise_prompt(question, content, history, &answer, i + 1, segments.len())
            };

            self.pacer.wait(content.len()).await;
            answer = self
                .provider
                .complete(&prompt, &self.options)
                .await
                .map_err(|source| SynthesisError::Collaborator {
                    step: i + 1,
                    total,
                    source,
                })?;
            tracing::info!(
                segment = %segment.id,
                step = i + 1,
                total,
                answer_chars = answer.len(),
                "folded segment into answer"
            );
        }

        if segments.len() == 1 {
            return Ok(answer);
        }

        self.pacer.wait(answer.len()).await;
        let polished = self
            .provider
            .complete(&polish_prompt(question, &answer), &self.options)
            .await
            .map_err(|source| SynthesisError::Collaborator {
                step: total,
                total,
                source,
            })?;
        tracing::info!(total, "final answer polished");
        Ok(polished)
    }
}

fn history_block(history: &str) -> String {
    if history.trim().is_empty() {
        String::new()
    } else {
        format!("Conversation so far:\n{history}\n\n")
    }
}

fn first_step_prompt(question: &str, content: &str, history: &str, parts: usize) -> String {
    let mut prompt = history_block(history);
    let _ = write!(
        prompt,
        "Question: {question}\n\n\
         Document excerpt (part 1 of {parts}):\n{content}\n\n\
         Begin an answer to the question using only this excerpt. If the excerpt does not \
         contain what is needed, say which information would be needed to answer."
    );
    prompt
}

fn revise_prompt(
    question: &str,
    content: &str,
    history: &str,
    current: &str,
    part: usize,
    parts: usize,
) -> String {
    let mut prompt = history_block(history);
    let _ = write!(
        prompt,
        "Question: {question}\n\n\
         Current answer:\n{current}\n\n\
         Document excerpt (part {part} of {parts}):\n{content}\n\n\
         Revise or extend the current answer using only new relevant information from this \
         excerpt. Keep everything in the current answer that is still correct. If the excerpt \
         adds nothing, return the current answer unchanged."
    );
    prompt
}

fn polish_prompt(question: &str, draft: &str) -> String {
    format!(
        "Question: {question}\n\n\
         Draft answer compiled from several parts of a document:\n{draft}\n\n\
         Rewrite the draft as the final answer. Remove redundancy, keep only what is directly \
         relevant to the question, and do not introduce facts that are not in the draft."
    )
}
