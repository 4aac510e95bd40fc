//! Document types and generated artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of document a task produces.
///
/// The output type is the unit of dependency between tasks: a task declares
/// the output types it consumes, never the ids of other tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Requirements,
    ProjectCharter,
    UserStories,
    TechnicalDocumentation,
    DatabaseSchema,
    ApiDocumentation,
    SetupGuide,
    DeveloperDocumentation,
    TestDocumentation,
    UserDocumentation,
    PmDocumentation,
    StakeholderCommunication,
    BusinessModel,
    MarketingPlan,
    SupportPlaybook,
    LegalCompliance,
    DocumentIndex,
    QualityReview,
    DeveloperBrief,
}

/// Audience level a document belongs to, used to group the final index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentLevel {
    Strategic,
    Product,
    Technical,
    CrossLevel,
}

impl DocumentLevel {
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Strategic => "Level 1: Strategic",
            Self::Product => "Level 2: Product",
            Self::Technical => "Level 3: Technical",
            Self::CrossLevel => "Cross-Level",
        }
    }
}

impl DocumentType {
    /// Every document type, in declaration order.
    pub const ALL: [Self; 19] = [
        Self::Requirements,
        Self::ProjectCharter,
        Self::UserStories,
        Self::TechnicalDocumentation,
        Self::DatabaseSchema,
        Self::ApiDocumentation,
        Self::SetupGuide,
        Self::DeveloperDocumentation,
        Self::TestDocumentation,
        Self::UserDocumentation,
        Self::PmDocumentation,
        Self::StakeholderCommunication,
        Self::BusinessModel,
        Self::MarketingPlan,
        Self::SupportPlaybook,
        Self::LegalCompliance,
        Self::DocumentIndex,
        Self::QualityReview,
        Self::DeveloperBrief,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::ProjectCharter => "project_charter",
            Self::UserStories => "user_stories",
            Self::TechnicalDocumentation => "technical_documentation",
            Self::DatabaseSchema => "database_schema",
            Self::ApiDocumentation => "api_documentation",
            Self::SetupGuide => "setup_guide",
            Self::DeveloperDocumentation => "developer_documentation",
            Self::TestDocumentation => "test_documentation",
            Self::UserDocumentation => "user_documentation",
            Self::PmDocumentation => "pm_documentation",
            Self::StakeholderCommunication => "stakeholder_communication",
            Self::BusinessModel => "business_model",
            Self::MarketingPlan => "marketing_plan",
            Self::SupportPlaybook => "support_playbook",
            Self::LegalCompliance => "legal_compliance",
            Self::DocumentIndex => "document_index",
            Self::QualityReview => "quality_review",
            Self::DeveloperBrief => "developer_brief",
        }
    }

    /// Human-readable title used in prompts and reports.
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Requirements => "Requirements Document",
            Self::ProjectCharter => "Project Charter",
            Self::UserStories => "User Stories",
            Self::TechnicalDocumentation => "Technical Specification",
            Self::DatabaseSchema => "Database Schema",
            Self::ApiDocumentation => "API Documentation",
            Self::SetupGuide => "Setup Guide",
            Self::DeveloperDocumentation => "Developer Guide",
            Self::TestDocumentation => "Test Plan",
            Self::UserDocumentation => "User Guide",
            Self::PmDocumentation => "Project Plan",
            Self::StakeholderCommunication => "Stakeholder Summary",
            Self::BusinessModel => "Business Model",
            Self::MarketingPlan => "Marketing Plan",
            Self::SupportPlaybook => "Support Playbook",
            Self::LegalCompliance => "Legal & Compliance Review",
            Self::DocumentIndex => "Document Index",
            Self::QualityReview => "Quality Review",
            Self::DeveloperBrief => "Developer Brief",
        }
    }

    pub const fn level(&self) -> DocumentLevel {
        match self {
            Self::ProjectCharter
            | Self::PmDocumentation
            | Self::StakeholderCommunication
            | Self::BusinessModel
            | Self::MarketingPlan => DocumentLevel::Strategic,
            Self::Requirements
            | Self::UserStories
            | Self::UserDocumentation
            | Self::SupportPlaybook
            | Self::LegalCompliance => DocumentLevel::Product,
            Self::TechnicalDocumentation
            | Self::DatabaseSchema
            | Self::ApiDocumentation
            | Self::SetupGuide
            | Self::DeveloperDocumentation
            | Self::TestDocumentation => DocumentLevel::Technical,
            Self::DocumentIndex | Self::QualityReview | Self::DeveloperBrief => {
                DocumentLevel::CrossLevel
            }
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown document type: {s}"))
    }
}

/// A generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub output_type: DocumentType,
    pub content: String,
    /// Score assigned by the quality gate, if the document was scored.
    pub quality_score: Option<f64>,
    /// 0 for the first pass, 1 for a quality-gate revision.
    pub revision: u32,
    pub generated_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(output_type: DocumentType, content: impl Into<String>) -> Self {
        Self {
            output_type,
            content: content.into(),
            quality_score: None,
            revision: 0,
            generated_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }

    /// Mark this artifact as the quality-gate revision of an earlier pass.
    #[must_use]
    pub const fn revised(mut self) -> Self {
        self.revision = 1;
        self
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}
