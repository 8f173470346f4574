//! Validate/repair loop.
//!
//! Drives one extraction through the states
//! `Attempting -> Validating -> (Succeeded | Attempting | Exhausted)`.
//! The loop is bounded by `max_attempts`; a transport error from the client
//! ends it immediately. Partial records are never returned.

use mood_schema::{parse_record, FieldViolation, SchemaDescriptor};
use serde::de::DeserializeOwned;
use tracing::{debug, info, trace, warn};

use crate::client::ExtractionClient;
use crate::error::PipelineError;
use crate::prompt::{fingerprint, PromptComposer, PromptTask};

/// Loop state.
#[derive(Debug)]
enum LoopState<T> {
    Attempting,
    Validating { raw_output: String },
    Succeeded(T),
    Exhausted(ExtractionAttempt),
}

impl<T> LoopState<T> {
    fn name(&self) -> &'static str {
        match self {
            LoopState::Attempting => "attempting",
            LoopState::Validating { .. } => "validating",
            LoopState::Succeeded(_) => "succeeded",
            LoopState::Exhausted(_) => "exhausted",
        }
    }
}

/// One failed attempt, kept to build the next corrective clause.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    /// 1-based attempt number
    pub number: u32,
    /// Raw backend output
    pub raw_output: String,
    /// Why it was rejected
    pub violations: Vec<FieldViolation>,
}

/// A validated record and the number of attempts it took.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    pub record: T,
    pub attempts: u32,
}

/// Bounded validate/repair loop over one extraction client.
pub struct RepairLoop<'a> {
    client: &'a ExtractionClient,
    composer: &'a PromptComposer,
    max_attempts: u32,
}

impl<'a> RepairLoop<'a> {
    /// Create a loop. `max_attempts` must be at least 1.
    pub fn new(
        client: &'a ExtractionClient,
        composer: &'a PromptComposer,
        max_attempts: u32,
    ) -> Result<Self, PipelineError> {
        if max_attempts == 0 {
            return Err(PipelineError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            client,
            composer,
            max_attempts,
        })
    }

    /// Extract a record of type `T` satisfying `schema`.
    pub async fn run<T: DeserializeOwned>(
        &self,
        task: &PromptTask<'_>,
        schema: &SchemaDescriptor,
    ) -> Result<Extracted<T>, PipelineError> {
        let mut number: u32 = 1;
        let mut previous: Option<ExtractionAttempt> = None;
        let mut state = LoopState::Attempting;

        loop {
            trace!(schema = schema.name, attempt = number, state = state.name(), "Repair loop");

            state = match state {
                LoopState::Attempting => {
                    let correction = previous.as_ref().map(|a| a.violations.as_slice());
                    let request = self.composer.compose(task, schema, correction)?;
                    debug!(
                        schema = schema.name,
                        attempt = number,
                        max_attempts = self.max_attempts,
                        fingerprint = %fingerprint(&request),
                        "Sending extraction request"
                    );
                    let raw_output = self.client.extract(&request).await?;
                    LoopState::Validating { raw_output }
                }
                LoopState::Validating { raw_output } => match parse_record::<T>(schema, &raw_output) {
                    Ok(record) => LoopState::Succeeded(record),
                    Err(violations) => {
                        warn!(
                            schema = schema.name,
                            attempt = number,
                            violations = violations.len(),
                            first = %violations.first().map(|v| v.to_string()).unwrap_or_default(),
                            "Model output failed validation"
                        );
                        let attempt = ExtractionAttempt {
                            number,
                            raw_output,
                            violations,
                        };
                        if number < self.max_attempts {
                            number += 1;
                            previous = Some(attempt);
                            LoopState::Attempting
                        } else {
                            LoopState::Exhausted(attempt)
                        }
                    }
                },
                LoopState::Succeeded(record) => {
                    info!(schema = schema.name, attempts = number, "Extraction succeeded");
                    return Ok(Extracted {
                        record,
                        attempts: number,
                    });
                }
                LoopState::Exhausted(last) => {
                    warn!(schema = schema.name, attempts = last.number, "Validation attempts exhausted");
                    return Err(PipelineError::ValidationExhausted {
                        attempts: last.number,
                        last_raw_output: last.raw_output,
                        violations: last.violations,
                    });
                }
            };
        }
    }
}
