//! Heuristic structured-field recovery.
//!
//! Pure and total: any input string yields a record, missing data yields
//! empty fields. Entry detection is a line-oriented state machine driven by
//! weak typographic cues (capitalization, line length, date ranges, section
//! headings). It prefers missing an entry over inventing one.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::resume::OPEN_ENDED;
use crate::models::{EducationEntry, ExperienceEntry, StructuredResume};
use crate::parsing::tables::CompiledTables;

/// Only the first few non-empty lines are considered for the candidate's name.
const NAME_SCAN_LINES: usize = 5;
const COMPANY_MAX_CHARS: usize = 60;
const EDUCATION_LINE_MAX_CHARS: usize = 100;
const SCHOOL_MIN_CHARS: usize = 3;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.+-]+@[\w-]+\.[a-zA-Z]{2,}").unwrap());
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\+?1?\s?)?(\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4})").unwrap());
static NAME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+(?:[ '-][A-Za-z]+){1,3}$").unwrap());

const MONTH_OR_SEASON: &str = r"(?:(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s*|(?:spring|summer|fall|autumn|winter)\s+|\d{1,2}/)";

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({m}?(?:19|20)\d{{2}})\s*(?:[-–—]+|\bto\b)\s*({m}?(?:19|20)\d{{2}}|present|current)\b",
        m = MONTH_OR_SEASON
    ))
    .unwrap()
});
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static FIELD_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bin\s+([A-Z][A-Za-z&/\- ]*[A-Za-z])").unwrap());

/// Builds a best-effort record from plain text. Never fails.
pub fn recover_structured(
    text: &str,
    fallback_email: &str,
    tables: &CompiledTables,
) -> StructuredResume {
    let email = EMAIL
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| fallback_email.to_string());

    let phone = PHONE.find(text).map(|m| m.as_str().trim().to_string());

    let experience = tables
        .experience
        .slice(text)
        .map(recover_experience)
        .unwrap_or_default();

    let education = tables
        .education
        .slice(text)
        .map(|section| recover_education(section, tables.degree.as_ref()))
        .unwrap_or_default();

    let mut resume = StructuredResume::empty(&email);
    if let Some(name) = find_name(text) {
        resume.name = name;
    }
    resume.phone = phone;
    resume.skills = find_skills(text, tables);
    resume.experience = experience;
    resume.education = education;
    resume
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn find_name(text: &str) -> Option<String> {
    non_empty_lines(text)
        .take(NAME_SCAN_LINES)
        .find(|line| NAME_LINE.is_match(line) && !line.contains('@') && !line.contains("http"))
        .map(str::to_string)
}

/// Keywords present anywhere in the text, in table order.
fn find_skills(text: &str, tables: &CompiledTables) -> Vec<String> {
    tables
        .skills
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text))
        .map(|(keyword, _)| keyword.clone())
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Experience
// ────────────────────────────────────────────────────────────────────────────

/// What a single line contributes to the experience list.
#[derive(Debug, PartialEq)]
enum ExperienceLine {
    /// Date-only line completing the open entry.
    DatesForOpen { start: String, end: String },
    /// Starts a new entry, closing the open one.
    NewEntry {
        title: String,
        company: String,
        dates: Option<(String, String)>,
    },
    Title(String),
    Company(String),
    Description(String),
    Skip,
}

fn recover_experience(section: &str) -> Vec<ExperienceEntry> {
    let mut entries = Vec::new();
    let mut open: Option<ExperienceEntry> = None;

    for line in non_empty_lines(section) {
        match classify_experience_line(open.as_ref(), line) {
            ExperienceLine::DatesForOpen { start, end } => {
                if let Some(entry) = open.as_mut() {
                    entry.start_date = start;
                    entry.end_date = end;
                }
            }
            ExperienceLine::NewEntry {
                title,
                company,
                dates,
            } => {
                close_experience(&mut entries, open.take());
                let (start_date, end_date) = dates.unwrap_or_default();
                open = Some(ExperienceEntry {
                    title,
                    company,
                    start_date,
                    end_date,
                    description: String::new(),
                });
            }
            ExperienceLine::Title(title) => {
                if let Some(entry) = open.as_mut() {
                    entry.title = title;
                }
            }
            ExperienceLine::Company(company) => {
                if let Some(entry) = open.as_mut() {
                    entry.company = company;
                }
            }
            ExperienceLine::Description(text) => {
                if let Some(entry) = open.as_mut() {
                    if !entry.description.is_empty() {
                        entry.description.push(' ');
                    }
                    entry.description.push_str(&text);
                }
            }
            ExperienceLine::Skip => {}
        }
    }

    close_experience(&mut entries, open);
    entries
}

fn classify_experience_line(open: Option<&ExperienceEntry>, line: &str) -> ExperienceLine {
    if let Some(range) = DATE_RANGE.captures(line) {
        let start = range[1].trim().to_string();
        let end = normalize_end_date(&range[2]);
        let (title, company) = split_header(&DATE_RANGE.replace_all(line, ""));

        return match open {
            Some(entry) if entry.start_date.is_empty() && title.is_empty() => {
                ExperienceLine::DatesForOpen { start, end }
            }
            _ => ExperienceLine::NewEntry {
                title,
                company,
                dates: Some((start, end)),
            },
        };
    }

    let label = is_label(line);
    let len = line.chars().count();
    let header_sized = (4..80).contains(&len);

    match open {
        None if label && header_sized => {
            let (title, company) = split_header(line);
            ExperienceLine::NewEntry {
                title,
                company,
                dates: None,
            }
        }
        None => ExperienceLine::Skip,
        Some(entry) if entry.title.is_empty() && label => {
            ExperienceLine::Title(split_header(line).0)
        }
        Some(entry)
            if entry.company.is_empty()
                && entry.description.is_empty()
                && label
                && len < COMPANY_MAX_CHARS =>
        {
            ExperienceLine::Company(line.to_string())
        }
        Some(entry)
            if label
                && header_sized
                && (!entry.start_date.is_empty() || !entry.description.is_empty()) =>
        {
            let (title, company) = split_header(line);
            ExperienceLine::NewEntry {
                title,
                company,
                dates: None,
            }
        }
        Some(_) => ExperienceLine::Description(line.to_string()),
    }
}

fn close_experience(entries: &mut Vec<ExperienceEntry>, entry: Option<ExperienceEntry>) {
    let Some(mut entry) = entry else {
        return;
    };
    if entry.title.is_empty() {
        return;
    }
    if entry.end_date.is_empty() {
        entry.end_date = OPEN_ENDED.to_string();
    }
    entries.push(entry);
}

/// Capitalized and not a sentence: a plausible title or company line.
fn is_label(line: &str) -> bool {
    line.chars().next().is_some_and(char::is_uppercase) && !line.ends_with('.')
}

/// Splits "Title | Company | ..." (or comma-delimited) into title and company.
fn split_header(line: &str) -> (String, String) {
    let mut parts = line
        .split(['|', ','])
        .map(|part| part.trim_matches(|c: char| c.is_whitespace() || "-–—()".contains(c)));
    let title = parts.next().unwrap_or_default().to_string();
    let company = parts.find(|p| !p.is_empty()).unwrap_or_default().to_string();
    (title, company)
}

fn normalize_end_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("present") || raw.eq_ignore_ascii_case("current")
    {
        OPEN_ENDED.to_string()
    } else {
        raw.to_string()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Education
// ────────────────────────────────────────────────────────────────────────────

fn recover_education(section: &str, degree: Option<&Regex>) -> Vec<EducationEntry> {
    let mut entries = Vec::new();
    let mut open: Option<EducationEntry> = None;

    for line in non_empty_lines(section) {
        // Last year on the line: in "2012 - 2016" the graduation year is the end of the range.
        let year = YEAR.find_iter(line).last().map(|m| m.as_str().to_string());
        let has_degree = degree.is_some_and(|re| re.is_match(line));
        let len = line.chars().count();

        // A dated line with no degree completes the open entry ("Degree" then
        // "School, 2016") instead of opening a new one.
        if !has_degree {
            if let (Some(entry), Some(year)) = (open.as_mut(), year.as_ref()) {
                if entry.graduation_year.is_empty() {
                    entry.graduation_year = year.clone();
                    if entry.school.is_empty() {
                        entry.school = school_without_dates(line);
                    }
                    continue;
                }
            }
        }

        if has_degree || (year.is_some() && len < EDUCATION_LINE_MAX_CHARS) {
            close_education(&mut entries, open.take());
            open = Some(EducationEntry {
                school: String::new(),
                degree: line.to_string(),
                field: FIELD_CLAUSE
                    .captures(line)
                    .map(|c| c[1].trim().to_string())
                    .unwrap_or_default(),
                graduation_year: year.unwrap_or_default(),
            });
        } else if let Some(entry) = open.as_mut() {
            if entry.school.is_empty() && len >= SCHOOL_MIN_CHARS {
                entry.school = line.to_string();
            }
        }
    }

    close_education(&mut entries, open);
    entries
}

fn close_education(entries: &mut Vec<EducationEntry>, entry: Option<EducationEntry>) {
    if let Some(entry) = entry {
        if !entry.school.is_empty() || !entry.degree.is_empty() {
            entries.push(entry);
        }
    }
}

/// "State University, 2016 - 2020" -> "State University"; "" when nothing remains.
fn school_without_dates(line: &str) -> String {
    let stripped = DATE_RANGE.replace_all(line, "");
    let stripped = YEAR.replace_all(&stripped, "");
    let (school, _) = split_header(&stripped);
    if school.chars().count() >= SCHOOL_MIN_CHARS {
        school
    } else {
        String::new()
    }
}
