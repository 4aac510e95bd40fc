//! Quality reports, per-type requirements, and gate thresholds.

use serde::{Deserialize, Serialize};

use super::document::DocumentType;

/// Outcome of scoring one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Weighted score in [0, 100].
    pub overall_score: f64,
    pub passed: bool,
    pub detail: QualityDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDetail {
    pub word_count: WordCountCheck,
    pub sections: SectionCheck,
    pub readability: ReadabilityCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountCheck {
    pub count: usize,
    pub minimum: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCheck {
    pub required: usize,
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityCheck {
    pub score: f64,
    pub minimum: f64,
    pub passed: bool,
}

impl QualityReport {
    /// Render the report as feedback for an improvement pass.
    pub fn feedback(&self) -> String {
        let mut lines = vec![format!("Overall score: {:.1}/100", self.overall_score)];

        let words = &self.detail.word_count;
        if !words.passed {
            lines.push(format!(
                "- Too short: {} words, at least {} expected.",
                words.count, words.minimum
            ));
        }
        if !self.detail.sections.missing.is_empty() {
            lines.push(format!(
                "- Missing sections: {}.",
                self.detail.sections.missing.join(", ")
            ));
        }
        let readability = &self.detail.readability;
        if !readability.passed {
            lines.push(format!(
                "- Readability {:.1} is below the target of {:.1}; use shorter sentences and simpler words.",
                readability.score, readability.minimum
            ));
        }
        if lines.len() == 1 {
            lines.push("- All checks passed; tighten wording and add concrete detail.".to_string());
        }
        lines.join("\n")
    }
}

/// What a document of a given type must contain to score well.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityRequirements {
    pub min_words: usize,
    /// Case-insensitive, multi-line heading patterns.
    pub required_sections: &'static [&'static str],
    pub min_readability: f64,
}

const DEFAULT_SECTIONS: &[&str] = &[r"^#+\s+.*"];

impl QualityRequirements {
    pub const fn for_type(doc_type: DocumentType) -> Self {
        let (min_words, required_sections, min_readability): (usize, &'static [&'static str], f64) =
            match doc_type {
                DocumentType::Requirements => (
                    300,
                    &[
                        r"^#+\s+Project\s+Overview",
                        r"^#+\s+Core\s+Features",
                        r"^#+\s+Technical\s+Requirements",
                        r"^#+\s+User\s+Personas",
                        r"^#+\s+Business\s+Objectives",
                        r"^#+\s+Constraints",
                    ],
                    50.0,
                ),
                DocumentType::ProjectCharter => (
                    500,
                    &[
                        r"^#+\s+(Executive\s+)?Summary",
                        r"^#+\s+Project\s+Overview",
                        r"^#+\s+(Business\s+)?Objectives",
                        r"^#+\s+Scope",
                        r"^#+\s+Stakeholders",
                    ],
                    50.0,
                ),
                DocumentType::PmDocumentation => (
                    800,
                    &[
                        r"^#+\s+Project\s+Timeline",
                        r"^#+\s+Resource\s+Requirements",
                        r"^#+\s+Budget",
                        r"^#+\s+Risk",
                        r"^#+\s+Success\s+Metrics",
                    ],
                    50.0,
                ),
                DocumentType::UserStories => (
                    400,
                    &[
                        r"^#+\s+User\s+Stories",
                        r"^#+\s+(Acceptance\s+)?Criteria",
                        r"^#+\s+Epic",
                        r"^#+\s+Feature",
                    ],
                    50.0,
                ),
                DocumentType::TechnicalDocumentation => (
                    1000,
                    &[
                        r"^#+\s+System\s+Architecture",
                        r"^#+\s+Technical\s+Stack",
                        r"^#+\s+Database\s+Design",
                        r"^#+\s+API\s+Design",
                        r"^#+\s+Security",
                    ],
                    45.0,
                ),
                DocumentType::DatabaseSchema => (
                    600,
                    &[
                        r"^#+\s+Database\s+Overview",
                        r"^#+\s+(Schema|Table)",
                        r"^#+\s+(Relationship|Entity)",
                        r"^#+\s+Index",
                    ],
                    45.0,
                ),
                DocumentType::ApiDocumentation => (
                    800,
                    &[
                        r"^#+\s+API\s+Overview",
                        r"^#+\s+Authentication",
                        r"^#+\s+Endpoint",
                        r"^#+\s+(Data\s+)?Model",
                        r"^#+\s+Error",
                    ],
                    50.0,
                ),
                DocumentType::SetupGuide => (
                    600,
                    &[
                        r"^#+\s+Prerequisite",
                        r"^#+\s+Installation",
                        r"^#+\s+(Setup|Configuration)",
                        r"^#+\s+(Running|Start)",
                        r"^#+\s+Troubleshooting",
                    ],
                    60.0,
                ),
                DocumentType::DeveloperDocumentation => (
                    800,
                    &[
                        r"^#+\s+(Getting\s+)?Started",
                        r"^#+\s+(Architecture|Structure)",
                        r"^#+\s+(Development|Coding)",
                        r"^#+\s+Test",
                        r"^#+\s+Deploy",
                    ],
                    50.0,
                ),
                DocumentType::StakeholderCommunication => (
                    400,
                    &[
                        r"^#+\s+(Executive\s+)?Summary",
                        r"^#+\s+(Key\s+)?(Point|Highlight)",
                        r"^#+\s+(Impact|Benefit)",
                        r"^#+\s+(Next\s+)?Step",
                    ],
                    60.0,
                ),
                DocumentType::TestDocumentation => (
                    600,
                    &[
                        r"^#+\s+Test\s+(Strategy|Plan)",
                        r"^#+\s+Test\s+Case",
                        r"^#+\s+Test\s+Scenario",
                        r"^#+\s+(Test\s+)?Environment",
                        r"^#+\s+(Test\s+)?(Coverage|Result)",
                    ],
                    50.0,
                ),
                DocumentType::UserDocumentation => (
                    500,
                    &[
                        r"^#+\s+Introduction",
                        r"^#+\s+(Installation|Setup)",
                        r"^#+\s+(Usage|Basic|Getting\s+Started)",
                        r"^#+\s+Feature",
                        r"^#+\s+(Troubleshooting|FAQ)",
                    ],
                    65.0,
                ),
                DocumentType::BusinessModel => (
                    600,
                    &[
                        r"^#+\s+(Executive\s+)?Summary",
                        r"^#+\s+Business\s+Model",
                        r"^#+\s+(Revenue|Monetization)",
                        r"^#+\s+(Market|Target)",
                        r"^#+\s+(Competitive|Competition)",
                    ],
                    55.0,
                ),
                DocumentType::MarketingPlan => (
                    700,
                    &[
                        r"^#+\s+(Executive\s+)?Summary",
                        r"^#+\s+(Marketing\s+)?Strategy",
                        r"^#+\s+(Channel|Campaign)",
                        r"^#+\s+(Budget|Cost)",
                        r"^#+\s+(Metric|KPI|Performance)",
                    ],
                    55.0,
                ),
                DocumentType::SupportPlaybook => (
                    500,
                    &[
                        r"^#+\s+(Support|Troubleshooting)",
                        r"^#+\s+(Common|Issue)",
                        r"^#+\s+(Escalation|Process)",
                        r"^#+\s+(Resolution|Solution)",
                        r"^#+\s+(FAQ|Help)",
                    ],
                    60.0,
                ),
                DocumentType::LegalCompliance => (
                    500,
                    &[
                        r"^#+\s+(Privacy|Legal)",
                        r"^#+\s+(Compliance|Regulation)",
                        r"^#+\s+(Data\s+)?(Handling|Protection)",
                        r"^#+\s+License",
                        r"^#+\s+(Policy|Term)",
                    ],
                    45.0,
                ),
                DocumentType::DeveloperBrief => (
                    600,
                    &[
                        r"^#+\s+(Project\s+)?Overview",
                        r"^#+\s+(Architecture|Structure)",
                        r"^#+\s+(Setup|Command)",
                        r"^#+\s+(Convention|Pattern)",
                        r"^#+\s+Test",
                    ],
                    45.0,
                ),
                DocumentType::DocumentIndex | DocumentType::QualityReview => {
                    (500, DEFAULT_SECTIONS, 50.0)
                }
            };

        Self {
            min_words,
            required_sections,
            min_readability,
        }
    }
}

impl QualityRequirements {
    /// Human-readable names of the required sections, in declaration order.
    pub fn section_labels(&self) -> Vec<String> {
        self.required_sections
            .iter()
            .map(|pattern| section_label(pattern))
            .collect()
    }
}

/// Turn a heading pattern such as `^#+\s+(Executive\s+)?Summary` into `Summary`.
///
/// Optional groups are dropped and alternations keep their first branch.
pub fn section_label(pattern: &str) -> String {
    let body = pattern.trim_start_matches("^#+\\s+").replace("\\s+", " ");
    let mut label = String::new();
    let mut rest = body.as_str();

    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')').map(|c| open + c) else {
            break;
        };
        label.push_str(&rest[..open]);
        let group = &rest[open + 1..close];
        let after = &rest[close + 1..];
        if let Some(stripped) = after.strip_prefix('?') {
            rest = stripped;
        } else {
            label.push_str(group.split('|').next().unwrap_or(group));
            rest = after;
        }
    }
    label.push_str(rest);

    let label = label.replace(".*", "");
    let label = label.trim();
    if label.is_empty() {
        "Any heading".to_string()
    } else {
        label.to_string()
    }
}

/// Gate threshold used when configuration does not override it.
///
/// Returns `None` for types that are never gated.
pub const fn default_quality_threshold(doc_type: DocumentType) -> Option<f64> {
    match doc_type {
        DocumentType::Requirements => Some(80.0),
        DocumentType::ProjectCharter
        | DocumentType::UserStories
        | DocumentType::TechnicalDocumentation => Some(75.0),
        DocumentType::DatabaseSchema => Some(70.0),
        _ => None,
    }
}
