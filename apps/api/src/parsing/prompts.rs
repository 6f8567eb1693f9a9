// Resume parsing LLM prompt templates.
// All prompts for the parsing module are defined here.

pub const RESUME_PARSE_SYSTEM: &str = "\
You are an expert ATS (Applicant Tracking System) resume parser. \
Your job is to extract highly structured data from a raw resume text.
Rules:
1. Extract ALL work experience (jobs, internships, freelance) into the \"experience\" array. Do not miss any past roles.
2. Extract ALL educational history (degrees, universities, certifications) into the \"education\" array.
3. Keep descriptions detailed but formatted as a single string.
4. If a field is not found, use null or an empty string/array.
5. Return valid JSON only, exactly matching the requested format.";

pub const RESUME_PARSE_PROMPT: &str = r#"Parse the following RESUME text and return a JSON object with the structure given below.

RESUME TEXT:
{resume_text}"#;

pub const RESUME_SCHEMA: &str = r#"{
  "name": "Full name exactly as written",
  "email": "Email address",
  "phone": "Phone number",
  "skills": ["Every skill, tool, language, or framework mentioned"],
  "experience": [
    {
      "company": "Company Name",
      "title": "Job Title",
      "start_date": "Start Date (e.g., Jan 2020 or 2020)",
      "end_date": "End Date (e.g., Present, Dec 2023)",
      "description": "Full description of responsibilities and achievements"
    }
  ],
  "education": [
    {
      "school": "University or School Name",
      "degree": "Degree Level (e.g., Bachelor of Science)",
      "field": "Major or Field of Study",
      "graduation_year": "Year of Graduation"
    }
  ]
}"#;
