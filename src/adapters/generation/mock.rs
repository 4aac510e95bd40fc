//! Mock generation service for testing and offline runs.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::models::{DocumentType, QualityRequirements};
use crate::domain::ports::{GenerationError, GenerationOptions, GenerationService};

/// Mock response configuration.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub output: Result<String, GenerationError>,
    /// Simulated latency before answering
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: Ok(output.into()),
            delay: None,
        }
    }

    pub fn failure(error: GenerationError) -> Self {
        Self {
            output: Err(error),
            delay: None,
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub label: String,
    pub prompt: String,
    pub model: Option<String>,
}

#[derive(Default)]
struct MockState {
    fixed: HashMap<String, MockResponse>,
    queued: HashMap<String, VecDeque<MockResponse>>,
    calls: Vec<RecordedCall>,
}

/// Deterministic generation service.
///
/// Responses are chosen per request label: a queued one-shot response first,
/// then a fixed response, then a generated markdown document whose headings
/// match the requirements for the labelled document type.
#[derive(Default)]
pub struct MockGenerationService {
    state: Mutex<MockState>,
    default_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response that has no delay of its own.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Always answer `label` with `output`.
    pub fn set_response(&self, label: impl Into<String>, output: impl Into<String>) {
        self.set_mock_response(label, MockResponse::success(output));
    }

    /// Always fail `label` with a permanent error.
    pub fn fail_label(&self, label: impl Into<String>, message: impl Into<String>) {
        self.set_mock_response(
            label,
            MockResponse::failure(GenerationError::Permanent(message.into())),
        );
    }

    pub fn set_mock_response(&self, label: impl Into<String>, response: MockResponse) {
        self.state().fixed.insert(label.into(), response);
    }

    /// Answer the next request for `label` with `response`, once.
    pub fn push_response(&self, label: impl Into<String>, response: MockResponse) {
        self.state()
            .queued
            .entry(label.into())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, label: &str) -> usize {
        self.state().calls.iter().filter(|c| c.label == label).count()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, prompt: &str, options: &GenerationOptions) -> MockResponse {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            label: options.label.clone(),
            prompt: prompt.to_string(),
            model: options.model.clone(),
        });

        if let Some(response) = state
            .queued
            .get_mut(&options.label)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        if let Some(response) = state.fixed.get(&options.label) {
            return response.clone();
        }
        MockResponse::success(generated_document(&options.label))
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let response = self.next_response(prompt, options);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = response.delay.or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response.output
    }
}

const FILLER: [&str; 4] = [
    "The team will keep this part short and clear.",
    "Each point is easy to check and easy to test.",
    "We plan the work in small steps and review it each week.",
    "Users get a simple flow that works the same way every time.",
];

/// Markdown document that satisfies the heading and length checks for the
/// document type named by `label` (text before any `:`).
pub fn generated_document(label: &str) -> String {
    let type_name = label.split(':').next().unwrap_or(label);
    let Ok(doc_type) = type_name.parse::<DocumentType>() else {
        return format!("# Generated text\n\nMock output for {label}.");
    };

    let requirements = QualityRequirements::for_type(doc_type);
    let sections = requirements.section_labels();
    let words_per_section = requirements.min_words / sections.len().max(1) + 20;

    let mut doc = format!("# {}\n\n", doc_type.display_name());
    for section in &sections {
        let _ = write!(doc, "## {section}\n\n");
        let mut words = 0;
        let mut i = 0;
        while words < words_per_section {
            let sentence = FILLER[i % FILLER.len()];
            doc.push_str(sentence);
            doc.push(' ');
            words += sentence.split_whitespace().count();
            i += 1;
        }
        doc.push_str("\n\n");
    }
    doc
}
