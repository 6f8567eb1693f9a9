//! Pattern tables driving heuristic recovery.
//!
//! Kept as data so deployments can override them from JSON
//! (`RESUME_HEURISTICS_PATH`) and tests can use minimal tables.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_SKILLS: &[&str] = &[
    "JavaScript", "TypeScript", "Python", "Java", "C++", "C#", "Go", "Rust", "Ruby", "PHP",
    "Swift", "Kotlin",
    "React", "Next.js", "Vue", "Angular", "Node.js", "Express", "Django", "Flask", "Spring",
    "Laravel",
    "HTML", "CSS", "Tailwind", "SASS", "Bootstrap",
    "SQL", "PostgreSQL", "MySQL", "MongoDB", "Redis", "Supabase", "Firebase",
    "AWS", "GCP", "Azure", "Docker", "Kubernetes", "Terraform", "CI/CD", "Git", "GitHub",
    "Machine Learning", "Deep Learning", "TensorFlow", "PyTorch", "NLP", "LLM", "OpenAI",
    "REST", "GraphQL", "gRPC", "WebSocket",
    "Agile", "Scrum", "Jira", "Figma", "Postman",
    "Linux", "Bash", "PowerShell",
    ".NET", "Spring Boot", "FastAPI", "Svelte", "Flutter", "React Native",
    "Pandas", "NumPy", "Scikit-learn", "Spark", "Hadoop",
    "Jenkins", "CircleCI", "GitHub Actions", "Nginx", "Apache",
];

const DEFAULT_EXPERIENCE_HEADINGS: &[&str] = &[
    "PROFESSIONAL EXPERIENCE",
    "WORK HISTORY",
    "EMPLOYMENT",
    "EXPERIENCE",
];

const DEFAULT_EDUCATION_HEADINGS: &[&str] = &["EDUCATION", "ACADEMIC", "QUALIFICATIONS"];

const DEFAULT_EXPERIENCE_TERMINATORS: &[&str] = &[
    "EDUCATION",
    "SKILLS",
    "PROJECTS",
    "CERTIFICATIONS",
    "AWARDS",
    "REFERENCES",
];

const DEFAULT_EDUCATION_TERMINATORS: &[&str] = &[
    "EXPERIENCE",
    "SKILLS",
    "PROJECTS",
    "CERTIFICATIONS",
    "AWARDS",
    "REFERENCES",
];

const DEFAULT_DEGREE_MARKERS: &[&str] = &[
    r"B\.?S\.?",
    r"M\.?S\.?",
    r"B\.?A\.?",
    r"M\.?A\.?",
    r"Ph\.?D\.?",
    "Bachelor",
    "Master",
    "Associate",
    "Diploma",
    "Certificate",
];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid pattern in `{table}`: {source}")]
    Pattern {
        table: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// Serializable pattern tables. Missing keys in an override file keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicTables {
    /// Literal keywords; matched case-insensitively, reported in this order.
    pub skill_keywords: Vec<String>,
    /// Literal section headings.
    pub experience_headings: Vec<String>,
    pub experience_terminators: Vec<String>,
    pub education_headings: Vec<String>,
    pub education_terminators: Vec<String>,
    /// Regex fragments for degree levels, matched as whole words.
    pub degree_markers: Vec<String>,
}

impl Default for HeuristicTables {
    fn default() -> Self {
        Self {
            skill_keywords: owned(DEFAULT_SKILLS),
            experience_headings: owned(DEFAULT_EXPERIENCE_HEADINGS),
            experience_terminators: owned(DEFAULT_EXPERIENCE_TERMINATORS),
            education_headings: owned(DEFAULT_EDUCATION_HEADINGS),
            education_terminators: owned(DEFAULT_EDUCATION_TERMINATORS),
            degree_markers: owned(DEFAULT_DEGREE_MARKERS),
        }
    }
}

impl HeuristicTables {
    /// Reads a JSON override file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read heuristic tables from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid heuristic tables JSON in {}", path.display()))
    }

    pub fn compile(&self) -> Result<CompiledTables, TableError> {
        let mut skills: Vec<(String, Regex)> = Vec::with_capacity(self.skill_keywords.len());
        for keyword in &self.skill_keywords {
            let keyword = keyword.trim();
            if keyword.is_empty() || skills.iter().any(|(k, _)| k.eq_ignore_ascii_case(keyword)) {
                continue;
            }
            let pattern = format!("(?i){}", regex::escape(keyword));
            let regex = Regex::new(&pattern).map_err(|source| TableError::Pattern {
                table: "skill_keywords",
                source,
            })?;
            skills.push((keyword.to_string(), regex));
        }

        let degree = if self.degree_markers.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)\b(?:{})\b", self.degree_markers.join("|"));
            Some(Regex::new(&pattern).map_err(|source| TableError::Pattern {
                table: "degree_markers",
                source,
            })?)
        };

        Ok(CompiledTables {
            skills,
            experience: SectionPattern::new(
                &self.experience_headings,
                &self.experience_terminators,
                "experience_headings",
            )?,
            education: SectionPattern::new(
                &self.education_headings,
                &self.education_terminators,
                "education_headings",
            )?,
            degree,
        })
    }
}

/// Locates a section: a line ending in a heading (at most two leading words,
/// e.g. "Work Experience"), up to the next line starting with a terminator.
#[derive(Debug, Clone)]
pub struct SectionPattern {
    heading: Option<Regex>,
    terminator: Option<Regex>,
}

impl SectionPattern {
    fn new(
        headings: &[String],
        terminators: &[String],
        table: &'static str,
    ) -> Result<Self, TableError> {
        let heading = alternation(headings)
            .map(|alt| {
                Regex::new(&format!(
                    r"(?im)^[ \t]*(?:[A-Za-z&]+[ \t]+){{0,2}}(?:{alt})[ \t]*:?[ \t]*$"
                ))
            })
            .transpose()
            .map_err(|source| TableError::Pattern { table, source })?;
        let terminator = alternation(terminators)
            .map(|alt| Regex::new(&format!(r"(?im)^[ \t]*(?:{alt})")))
            .transpose()
            .map_err(|source| TableError::Pattern { table, source })?;
        Ok(Self {
            heading,
            terminator,
        })
    }

    /// The section body following the first heading, or `None` when absent.
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        let heading = self.heading.as_ref()?.find(text)?;
        let body = &text[heading.end()..];
        let body = body.strip_prefix('\n').unwrap_or(body);

        let end = self
            .terminator
            .as_ref()
            .and_then(|t| t.find(body))
            .map(|m| m.start())
            .unwrap_or(body.len());
        Some(&body[..end])
    }
}

/// Escaped, longest-first alternation of literal phrases.
fn alternation(phrases: &[String]) -> Option<String> {
    let mut phrases: Vec<&str> = phrases
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if phrases.is_empty() {
        return None;
    }
    phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
    let escaped: Vec<String> = phrases
        .iter()
        .map(|p| regex::escape(p).replace(' ', r"[ \t]+"))
        .collect();
    Some(escaped.join("|"))
}

/// Regex form of `HeuristicTables`, built once and shared.
#[derive(Debug, Clone)]
pub struct CompiledTables {
    pub(crate) skills: Vec<(String, Regex)>,
    pub(crate) experience: SectionPattern,
    pub(crate) education: SectionPattern,
    pub(crate) degree: Option<Regex>,
}

#[cfg(test)]
impl CompiledTables {
    pub fn builtin() -> Self {
        HeuristicTables::default()
            .compile()
            .expect("built-in heuristic tables compile")
    }
}
