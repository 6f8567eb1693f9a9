use serde::{Deserialize, Serialize};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const OPEN_ENDED: &str = "Present";

/// Which extraction path produced a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Ai,
    #[default]
    Heuristic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    pub start_date: String,
    /// "Present" for open-ended or unparseable ranges.
    pub end_date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub school: String,
    pub degree: String,
    pub field: String,
    pub graduation_year: String,
}

/// Why an AI attempt was abandoned in favour of the heuristic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    QuotaExceeded,
    GenericAiFailure,
}

impl DegradedReason {
    pub fn message(self) -> &'static str {
        match self {
            DegradedReason::QuotaExceeded => {
                "AI quota exceeded. Using basic fallback text extraction."
            }
            DegradedReason::GenericAiFailure => {
                "AI processing failed. Using basic fallback text extraction."
            }
        }
    }
}

/// Canonical structured resume record handed to the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResume {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Discovery order, no duplicates.
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub provenance: Provenance,
    /// AI was attempted, failed, and the heuristic result was used instead.
    pub degraded: bool,
    pub degraded_reason: Option<String>,
}

impl StructuredResume {
    /// An empty heuristic record: unknown name, the given email, nothing else.
    pub fn empty(email: &str) -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            email: email.to_string(),
            phone: None,
            skills: Vec::new(),
            experience: Vec::new(),
            education: Vec::new(),
            provenance: Provenance::Heuristic,
            degraded: false,
            degraded_reason: None,
        }
    }

    /// Marks a heuristic record as the product of a failed AI attempt.
    pub fn into_degraded(mut self, reason: DegradedReason) -> Self {
        self.provenance = Provenance::Heuristic;
        self.degraded = true;
        self.degraded_reason = Some(reason.message().to_string());
        self
    }
}
