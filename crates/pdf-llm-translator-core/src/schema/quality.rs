use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

use super::{StructuredOutput, ValidationIssue, nullable};

/// Severity of a translation problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Meaning lost or changed, content missing, wrong language
    #[serde(alias = "high")]
    Critical,
    /// Noticeable mistranslation or terminology error
    #[serde(alias = "medium")]
    Major,
    /// Style, fluency, or punctuation
    #[serde(alias = "low")]
    #[serde(other)]
    Minor,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}

/// A problem the reviewer found in a translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Block the issue refers to, if any
    #[serde(default)]
    pub block_id: Option<String>,
    pub severity: Severity,
    pub description: String,
}

/// Response of the scoring call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Overall quality, 0.0-1.0
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<QualityIssue>,
    #[serde(default)]
    pub summary: String,
}

/// Block ids the reviewer may refer to
#[derive(Debug, Clone, Default)]
pub struct QualityContext {
    pub block_ids: HashSet<String>,
}

impl QualityContext {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            block_ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl QualityAssessment {
    /// Assessment for pages with nothing to judge
    pub fn perfect(summary: impl Into<String>) -> Self {
        Self {
            score: 1.0,
            issues: Vec::new(),
            summary: summary.into(),
        }
    }

    /// Human-readable issue list fed back into a retranslation prompt
    pub fn feedback(&self) -> String {
        if self.issues.is_empty() {
            return self.summary.clone();
        }
        let mut issues: Vec<&QualityIssue> = self.issues.iter().collect();
        issues.sort_by_key(|i| i.severity);
        issues
            .into_iter()
            .map(|i| match &i.block_id {
                Some(id) => format!("- [{}] block {}: {}", i.severity, id, i.description),
                None => format!("- [{}] {}", i.severity, i.description),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

impl StructuredOutput for QualityAssessment {
    const NAME: &'static str = "quality_assessment";
    type Context = QualityContext;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "score": {
                    "type": "number",
                    "description": "Overall translation quality from 0.0 (unusable) to 1.0 (publication ready)"
                },
                "issues": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "block_id": nullable("string"),
                            "severity": { "type": "string", "enum": ["critical", "major", "minor"] },
                            "description": { "type": "string" }
                        },
                        "required": ["block_id", "severity", "description"],
                        "additionalProperties": false
                    }
                },
                "summary": { "type": "string" }
            },
            "required": ["score", "issues", "summary"],
            "additionalProperties": false
        })
    }

    fn normalize(&mut self, _ctx: &Self::Context) {
        // Percent-style answers (e.g. 85) read as 0.85
        if self.score.is_finite() && self.score > 1.0 && self.score <= 100.0 {
            self.score /= 100.0;
        }
        if self.score.is_finite() {
            self.score = self.score.clamp(0.0, 1.0);
        }

        for issue in &mut self.issues {
            issue.description = issue.description.trim().to_string();
            if issue.block_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
                issue.block_id = None;
            }
            if let Some(id) = issue.block_id.as_mut() {
                *id = id.trim().to_string();
            }
        }
        self.issues.retain(|i| !i.description.is_empty());
        self.summary = self.summary.trim().to_string();
    }

    fn validate(&self, ctx: &Self::Context) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            issues.push(ValidationIssue::new(
                "score",
                format!("{} is not a number between 0.0 and 1.0", self.score),
            ));
        }

        for (i, issue) in self.issues.iter().enumerate() {
            if let Some(id) = &issue.block_id
                && !ctx.block_ids.contains(id)
            {
                issues.push(ValidationIssue::new(
                    format!("issues[{i}].block_id"),
                    format!("'{id}' is not a block id of this page"),
                ));
            }
        }

        issues
    }
}
