//! Oracle instructions for each extraction phase
//!
//! Page ranges, categories and counts are passed as hints. The oracle is
//! never told to stop at the expected count.

use vellum_domain::ExtractionChunk;

/// Heading of the structure analysis instruction
pub const STRUCTURE_HEADING: &str = "STRUCTURE ANALYSIS";
/// Heading of chunk extraction instructions
pub const CHUNK_HEADING: &str = "CONTROL EXTRACTION";
/// Heading of the metadata instruction
pub const METADATA_HEADING: &str = "REPORT METADATA";
/// Heading of the secondary entity / obligation instruction
pub const AUXILIARY_HEADING: &str = "THIRD PARTIES AND CUSTOMER OBLIGATIONS";
/// Heading of the verification instruction
pub const VERIFICATION_HEADING: &str = "COMPLETENESS CHECK";

const CATEGORY_GUIDE: &str = r#"Category codes:
- CC1 control environment, CC2 communication, CC3 risk assessment,
  CC4 monitoring, CC5 control activities, CC6 logical and physical access,
  CC7 system operations, CC8 change management, CC9 risk mitigation
- A availability, PI processing integrity, C confidentiality, P privacy"#;

const RECORD_FORMAT: &str = r#"Output one JSON object, no other text:
{
  "controls": [
    {
      "controlId": "control identifier exactly as printed",
      "controlArea": "area heading",
      "tscCategory": "CC1-CC9, A, PI, C or P",
      "description": "full control description, not truncated",
      "testResult": "operating_effectively | exception | not_tested",
      "testProcedure": "auditor's test procedure, if given",
      "pageRef": 0,
      "confidence": 0.0
    }
  ],
  "exceptions": [
    {
      "controlId": "control with the exception",
      "description": "what was found",
      "managementResponse": "management response, if given",
      "severity": "low | medium | high",
      "pageRef": 0
    }
  ]
}"#;

/// Instruction for the one-shot structure analysis
pub fn structure_instruction() -> String {
    format!(
        r#"{STRUCTURE_HEADING}
Read this audit report and describe its layout. Do not extract individual controls.

Report:
- totalPages, reportType (type1 or type2), auditFirm, serviceOrgName
- trustServicesCriteria in scope
- sections: map of section name to {{"startPage", "endPage"}} (null if present but not located);
  always include "controls" for the controls and tests-of-controls matrix
- extractionPlan: {{"totalExpectedControls", "pageRanges": [{{"startPage", "endPage", "expectedControls", "categories"}}]}}
  with ranges in page order, not overlapping, covering the controls matrix
- confidence: 0.0-1.0

{CATEGORY_GUIDE}

Output one JSON object, no other text."#
    )
}

/// Instruction for one chunk
pub fn chunk_instruction(chunk: &ExtractionChunk) -> String {
    let categories = if chunk.categories.is_empty() {
        "any".to_string()
    } else {
        chunk.categories.join(", ")
    };
    format!(
        r#"{CHUNK_HEADING}
Extract EVERY control that appears on pages {start}-{end} of this report, with its test result.
Expected categories (hint): {categories}
Expected number of controls (hint, may be wrong): about {expected}
Skip controls outside pages {start}-{end}; they are extracted separately.
Also list every exception noted on these pages.

{CATEGORY_GUIDE}

{RECORD_FORMAT}"#,
        start = chunk.start_page,
        end = chunk.end_page,
        expected = chunk.expected_records,
    )
}

/// Instruction for document metadata
pub fn metadata_instruction() -> String {
    format!(
        r#"{METADATA_HEADING}
Extract the report metadata only:
{{"metadata": {{"reportType", "auditFirm", "opinion" (unqualified | qualified | adverse | disclaimer),
  "periodStart", "periodEnd" (YYYY-MM-DD), "serviceOrgName", "trustServicesCriteria": [],
  "systemDescription"}}, "confidence": 0.0-1.0}}
Output one JSON object, no other text."#
    )
}

/// Instruction for secondary entities and derived obligations
pub fn auxiliary_instruction() -> String {
    format!(
        r#"{AUXILIARY_HEADING}
List every subservice organization and every complementary user entity control:
{{"subserviceOrgs": [{{"name", "serviceDescription", "carveOut", "pageRef"}}],
  "cuecs": [{{"id", "description", "customerResponsibility", "relatedControl", "pageRef"}}],
  "confidence": 0.0-1.0}}
Output one JSON object, no other text."#
    )
}

/// Instruction asking for records missing from `known_keys`
pub fn verification_instruction(known_keys: &[&str], expected_total: u32) -> String {
    format!(
        r#"{VERIFICATION_HEADING}
This report is expected to contain about {expected_total} controls. {found} have been extracted so far:
{keys}

Find every control in the report whose identifier is NOT in the list above.
Return only those missing controls.

{CATEGORY_GUIDE}

{RECORD_FORMAT}"#,
        found = known_keys.len(),
        keys = known_keys.join(", "),
    )
}
