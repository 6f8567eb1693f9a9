pub mod resume;

pub use resume::{DegradedReason, EducationEntry, ExperienceEntry, Provenance, StructuredResume};
