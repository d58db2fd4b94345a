//! Prompt construction for generator requests.
//!
//! Builds the system prompt with schema context and the per-request user
//! message carrying the target operation.

use crate::llm::types::Message;
use crate::safety::DeclaredIntent;

/// Schema used when the configuration does not provide one.
pub const DEFAULT_SCHEMA_HINT: &str = r#"TABLE: PATIENT
- patient_id (primary key)
- first_name
- last_name
- age
- gender
- address

TABLE: M_MEDICATION
- medication_id (primary key)
- name
- dosage
- manufacturer

TABLE: PATIENT_MEDICATION
- patient_id (foreign key references PATIENT)
- medication_id (foreign key references M_MEDICATION)
- start_date
- end_date
- dosage_instructions

TABLE: M_ICD
- icd_id (primary key)
- code
- description

TABLE: PATIENT_ICD
- patient_id (foreign key references PATIENT)
- icd_id (foreign key references M_ICD)
- diagnosis_date
- doctor_name
- notes"#;

/// System prompt template for the SQL generator.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are an expert SQL developer working with a PostgreSQL database.
Only use the following tables and columns when generating SQL:

{schema}

Rules:
1. Generate only one SQL statement per request.
2. Use proper JOINs based on foreign key relationships.
3. Prefer readable column aliases.
4. Do not invent tables or columns outside these.
5. Do not include explanations or markdown. Output raw SQL only.
6. Always include WHERE clauses for UPDATE and DELETE statements.
7. Only produce a statement of the requested target operation."#;

/// Builds the system prompt with the schema hint injected.
pub fn build_system_prompt(schema_hint: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{schema}", schema_hint.trim())
}

/// Builds the user message for one question.
pub fn build_user_message(question: &str, target: DeclaredIntent) -> String {
    format!(
        "Target operation: {}\nNatural language request: {}\nSQL:",
        target.as_str().to_uppercase(),
        question.trim()
    )
}

/// Builds the complete message list for a generator request.
pub fn build_messages(schema_hint: &str, question: &str, target: DeclaredIntent) -> Vec<Message> {
    vec![
        Message::system(build_system_prompt(schema_hint)),
        Message::user(build_user_message(question, target)),
    ]
}
