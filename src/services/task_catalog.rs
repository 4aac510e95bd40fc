//! The fixed, profile-parameterised task descriptor sets for phases 1 and 2.

use std::collections::HashMap;
use std::fmt::Write;

use crate::domain::models::{
    default_quality_threshold, Config, DocumentType, GenerationInput, Phase, Profile,
    QualityRequirements, ResolvedDependencies, SharedInputs, TaskDescriptor,
};
use crate::domain::ports::GenerationOptions;

use DocumentType::{
    ApiDocumentation, BusinessModel, DatabaseSchema, DeveloperDocumentation, LegalCompliance,
    MarketingPlan, PmDocumentation, ProjectCharter, Requirements, SetupGuide,
    StakeholderCommunication, SupportPlaybook, TechnicalDocumentation, TestDocumentation,
    UserDocumentation, UserStories,
};

type DependencyTable = &'static [(DocumentType, &'static [DocumentType])];

const PHASE1_TEAM: DependencyTable = &[
    (Requirements, &[]),
    (ProjectCharter, &[Requirements]),
    (UserStories, &[Requirements, ProjectCharter]),
    (TechnicalDocumentation, &[Requirements, UserStories]),
    (DatabaseSchema, &[Requirements, TechnicalDocumentation]),
];

const PHASE1_INDIVIDUAL: DependencyTable = &[
    (Requirements, &[]),
    (UserStories, &[Requirements]),
    (TechnicalDocumentation, &[Requirements, UserStories]),
    (DatabaseSchema, &[Requirements, TechnicalDocumentation]),
];

const PHASE2_TEAM: DependencyTable = &[
    (ApiDocumentation, &[TechnicalDocumentation, DatabaseSchema]),
    (SetupGuide, &[TechnicalDocumentation, ApiDocumentation]),
    (DeveloperDocumentation, &[TechnicalDocumentation, ApiDocumentation]),
    (TestDocumentation, &[Requirements, TechnicalDocumentation]),
    (UserDocumentation, &[Requirements, UserStories]),
    (PmDocumentation, &[Requirements, ProjectCharter]),
    (StakeholderCommunication, &[Requirements, PmDocumentation]),
    (BusinessModel, &[Requirements, ProjectCharter]),
    (MarketingPlan, &[Requirements, BusinessModel]),
    (SupportPlaybook, &[UserDocumentation]),
    (LegalCompliance, &[Requirements, TechnicalDocumentation]),
];

const PHASE2_INDIVIDUAL: DependencyTable = &[
    (ApiDocumentation, &[TechnicalDocumentation, DatabaseSchema]),
    (SetupGuide, &[TechnicalDocumentation, ApiDocumentation]),
    (DeveloperDocumentation, &[TechnicalDocumentation, ApiDocumentation]),
    (TestDocumentation, &[Requirements, TechnicalDocumentation]),
    (UserDocumentation, &[Requirements, UserStories]),
];

/// Generation settings applied to every request of one phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptSettings {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Builds the task descriptor sets.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    phase1: PromptSettings,
    phase2: PromptSettings,
    threshold_overrides: HashMap<DocumentType, f64>,
}

impl TaskCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let settings = |phase: Phase| PromptSettings {
            model: Some(
                config
                    .generation
                    .model_for(phase.config_key())
                    .to_string(),
            ),
            max_tokens: Some(config.generation.max_tokens),
            temperature: Some(config.generation.temperature),
        };

        Self {
            phase1: settings(Phase::Foundational),
            phase2: settings(Phase::Secondary),
            threshold_overrides: config.workflow.quality_thresholds.clone(),
        }
    }

    /// Gate threshold for a document type, configuration first.
    pub fn threshold_for(&self, doc_type: DocumentType) -> Option<f64> {
        self.threshold_overrides
            .get(&doc_type)
            .copied()
            .or_else(|| default_quality_threshold(doc_type))
    }

    /// Phase-1 descriptors, all quality gated.
    pub fn phase1_tasks(&self, profile: Profile) -> Vec<TaskDescriptor> {
        let table = match profile {
            Profile::Team => PHASE1_TEAM,
            Profile::Individual => PHASE1_INDIVIDUAL,
        };
        table
            .iter()
            .map(|(output, deps)| {
                let descriptor = descriptor(*output, deps, &self.phase1);
                match self.threshold_for(*output) {
                    Some(threshold) => descriptor.with_quality_threshold(threshold),
                    None => descriptor,
                }
            })
            .collect()
    }

    /// Phase-2 descriptors. These are never gated.
    pub fn phase2_tasks(&self, profile: Profile) -> Vec<TaskDescriptor> {
        let table = match profile {
            Profile::Team => PHASE2_TEAM,
            Profile::Individual => PHASE2_INDIVIDUAL,
        };
        table
            .iter()
            .map(|(output, deps)| descriptor(*output, deps, &self.phase2))
            .collect()
    }
}

fn descriptor(
    output: DocumentType,
    deps: &[DocumentType],
    settings: &PromptSettings,
) -> TaskDescriptor {
    let settings = settings.clone();
    TaskDescriptor::new(output, deps.iter().copied(), move |resolved, shared| {
        build_input(output, resolved, shared, &settings)
    })
}

const fn role(doc_type: DocumentType) -> &'static str {
    match doc_type {
        Requirements => "a senior requirements analyst",
        ProjectCharter | PmDocumentation => "an experienced project manager",
        UserStories => "a product owner",
        TechnicalDocumentation => "a software architect",
        DatabaseSchema => "a database architect",
        ApiDocumentation => "an API designer",
        SetupGuide | DeveloperDocumentation => "a senior software engineer",
        TestDocumentation => "a QA lead",
        UserDocumentation => "a technical writer",
        StakeholderCommunication => "a communications lead",
        BusinessModel => "a business strategist",
        MarketingPlan => "a marketing strategist",
        SupportPlaybook => "a customer support lead",
        LegalCompliance => "a legal and compliance advisor",
        DocumentType::DocumentIndex
        | DocumentType::QualityReview
        | DocumentType::DeveloperBrief => "a documentation editor",
    }
}

fn build_input(
    output: DocumentType,
    resolved: &ResolvedDependencies,
    shared: &SharedInputs,
    settings: &PromptSettings,
) -> GenerationInput {
    let system = format!(
        "You are {}. Write the {} for a software project in Markdown. \
         Be complete and specific, and never truncate a section.",
        role(output),
        output.display_name()
    );

    let mut prompt = format!("Project idea:\n{}\n\n", shared.user_idea.trim());
    if !resolved.is_empty() {
        prompt.push_str("Use the following documents as context.\n\n");
        for (doc_type, artifact) in resolved {
            let _ = write!(
                prompt,
                "## {}\n\n{}\n\n",
                doc_type.display_name(),
                artifact.content.trim()
            );
        }
    }
    let sections = QualityRequirements::for_type(output).section_labels();
    let _ = write!(
        prompt,
        "Write the {}. Include these sections as headings: {}.",
        output.display_name(),
        sections.join(", ")
    );

    let options = GenerationOptions {
        system: Some(system),
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        label: output.as_str().to_string(),
    };

    GenerationInput { prompt, options }
}
