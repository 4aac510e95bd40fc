//! Rule-based scorer: length, required headings and Flesch reading ease.

use regex::RegexBuilder;

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::quality::{
    section_label, QualityDetail, ReadabilityCheck, SectionCheck, WordCountCheck,
};
use crate::domain::models::{DocumentType, QualityReport, QualityRequirements};
use crate::domain::ports::QualityScorer;

const WORD_WEIGHT: f64 = 0.3;
const SECTION_WEIGHT: f64 = 0.5;
const READABILITY_WEIGHT: f64 = 0.2;

/// Scores markdown against [`QualityRequirements::for_type`].
///
/// Overall score is 30% word count, 50% required sections and 20%
/// readability, each component capped at 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicQualityScorer;

impl HeuristicQualityScorer {
    pub const fn new() -> Self {
        Self
    }

    fn check_sections(content: &str, patterns: &[&str]) -> WorkflowResult<SectionCheck> {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for pattern in patterns {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .map_err(|e| WorkflowError::ScoringFailed(format!("bad section pattern {pattern}: {e}")))?;
            if regex.is_match(content) {
                found.push(section_label(pattern));
            } else {
                missing.push(section_label(pattern));
            }
        }
        Ok(SectionCheck {
            required: patterns.len(),
            found,
            missing,
        })
    }
}

impl QualityScorer for HeuristicQualityScorer {
    fn score(&self, content: &str, document_type: DocumentType) -> WorkflowResult<QualityReport> {
        let requirements = QualityRequirements::for_type(document_type);
        let text = plain_text(content);

        let count = text.split_whitespace().count();
        let word_count = WordCountCheck {
            count,
            minimum: requirements.min_words,
            passed: count >= requirements.min_words,
        };
        let word_score = ratio_score(count as f64, requirements.min_words as f64);

        let sections = Self::check_sections(content, requirements.required_sections)?;
        let section_score = ratio_score(sections.found.len() as f64, sections.required as f64);

        let reading_ease = flesch_reading_ease(&text);
        let readability = ReadabilityCheck {
            score: reading_ease,
            minimum: requirements.min_readability,
            passed: reading_ease >= requirements.min_readability,
        };
        let readability_score = ratio_score(reading_ease, requirements.min_readability);

        let overall = section_score.mul_add(
            SECTION_WEIGHT,
            word_score.mul_add(WORD_WEIGHT, readability_score * READABILITY_WEIGHT),
        );
        let overall_score = (overall * 10.0).round() / 10.0;

        Ok(QualityReport {
            overall_score,
            passed: word_count.passed && sections.missing.is_empty() && readability.passed,
            detail: QualityDetail {
                word_count,
                sections,
                readability,
            },
        })
    }
}

/// `actual / target` as a percentage capped at 100. A zero target scores 100.
fn ratio_score(actual: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 100.0;
    }
    (actual / target * 100.0).clamp(0.0, 100.0)
}

/// Drop code blocks and markdown markup so only prose is measured.
fn plain_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut in_code = false;
    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code || trimmed.starts_with('|') {
            continue;
        }
        let stripped = trimmed.trim_start_matches(['#', '>', '-', '*', '+']).trim();
        if stripped.is_empty() {
            out.push('\n');
            continue;
        }
        out.push_str(&stripped.replace(['*', '_', '`'], ""));
        // Headings and list items end a sentence even without punctuation.
        if trimmed.starts_with('#') || trimmed.starts_with(['-', '*', '+']) {
            out.push('.');
        }
        out.push('\n');
    }
    out
}

/// Flesch reading ease clamped to [0, 100]. Empty text scores 0.
pub fn flesch_reading_ease(text: &str) -> f64 {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphabetic))
        .count()
        .max(1);
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let words_per_sentence = words.len() as f64 / sentences as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;
    let score = 84.6f64.mul_add(-syllables_per_word, 1.015f64.mul_add(-words_per_sentence, 206.835));
    score.clamp(0.0, 100.0)
}

/// Vowel-group syllable estimate with a silent trailing `e`.
fn count_syllables(word: &str) -> usize {
    let word: String = word
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if word.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_vowel = false;
    for c in word.chars() {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }
    if word.len() > 2 && word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}
