//! Parse oracle output into typed entities
//!
//! The oracle answers in free text that should embed one JSON object. The
//! first balanced `{...}` span is parsed into a loose map, and that map is
//! converted into domain types right here; nothing loosely typed leaves this
//! module. Both camelCase and snake_case keys are accepted.

use crate::error::ExtractorError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;
use vellum_coverage::category_prefix_of;
use vellum_domain::{
    Criterion, DerivedObligation, DocumentMetadata, DocumentStructure, ExtractedRecord,
    ExtractionException, ExtractionPlan, Opinion, PageRange, PlannedRange, Provenance,
    ReportKind, ResultState, SecondaryEntity, Severity, CONTROLS_SECTION,
};

/// Loosely typed payload
pub type Object = Map<String, Value>;

/// Confidence assumed for records that do not state one
pub const DEFAULT_RECORD_CONFIDENCE: f64 = 0.9;

/// Confidence assumed for metadata that does not state one
pub const DEFAULT_METADATA_CONFIDENCE: f64 = 0.9;

/// Confidence assumed for auxiliary lists that do not state one
pub const DEFAULT_AUXILIARY_CONFIDENCE: f64 = 0.85;

/// Locate the first balanced `{...}` span
///
/// Braces inside JSON strings (including escaped quotes) are ignored.
/// Returns `None` if there is no `{` or the first one never closes.
pub fn find_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the embedded object out of raw oracle text
pub fn parse_object(text: &str) -> Result<Object, ExtractorError> {
    let span = find_object_span(text)
        .ok_or_else(|| ExtractorError::Payload("no balanced JSON object in response".to_string()))?;
    match serde_json::from_str::<Value>(span)? {
        Value::Object(map) => Ok(map),
        _ => Err(ExtractorError::Payload("expected a JSON object".to_string())),
    }
}

/// Typed accessors over a loose object, trying each key alias in turn
struct Fields<'a>(&'a Object);

impl<'a> Fields<'a> {
    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find(|v| !v.is_null())
    }

    fn str(&self, keys: &[&str]) -> Option<String> {
        match self.get(keys)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn f64(&self, keys: &[&str]) -> Option<f64> {
        let v = match self.get(keys)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        v.is_finite().then_some(v)
    }

    fn u32(&self, keys: &[&str]) -> Option<u32> {
        match self.get(keys)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => {
                // "p. 12", "12-13" → 12
                let digits: String = s
                    .trim_start_matches(|c: char| !c.is_ascii_digit())
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }

    fn bool(&self, keys: &[&str]) -> Option<bool> {
        match self.get(keys)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn array(&self, keys: &[&str]) -> &'a [Value] {
        match self.get(keys) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    fn object(&self, keys: &[&str]) -> Option<&'a Object> {
        self.get(keys)?.as_object()
    }

    fn strings(&self, keys: &[&str]) -> Vec<String> {
        self.array(keys)
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Clamp a stated confidence into [0, 1], falling back to `default`
pub fn confidence(stated: Option<f64>, default: f64) -> f64 {
    stated.unwrap_or(default).clamp(0.0, 1.0)
}

fn section_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len() + 4);
    for (i, ch) in raw.trim().chars().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 && !key.ends_with('_') {
            key.push('_');
        }
        match ch {
            ' ' | '-' => key.push('_'),
            _ => key.push(ch.to_ascii_lowercase()),
        }
    }
    match key.as_str() {
        "controls_matrix" | "tests_of_controls" | "control_testing" => CONTROLS_SECTION.to_string(),
        _ => key,
    }
}

fn page_range(value: &Value) -> Option<PageRange> {
    match value {
        Value::Object(obj) => {
            let f = Fields(obj);
            let start = f.u32(&["start", "startPage", "start_page"])?;
            let end = f.u32(&["end", "endPage", "end_page"]).unwrap_or(start);
            Some(PageRange::new(start, end))
        }
        Value::Array(items) if items.len() == 2 => {
            let start = u32::try_from(items[0].as_u64()?).ok()?;
            let end = u32::try_from(items[1].as_u64()?).ok()?;
            Some(PageRange::new(start, end))
        }
        _ => None,
    }
}

fn planned_range(value: &Value) -> Option<PlannedRange> {
    let f = Fields(value.as_object()?);
    let start_page = f.u32(&["startPage", "start_page", "start"])?;
    let end_page = f.u32(&["endPage", "end_page", "end"])?;
    if end_page < start_page {
        warn!(start_page, end_page, "Dropping inverted plan range");
        return None;
    }
    Some(PlannedRange {
        start_page,
        end_page,
        expected_records: f
            .u32(&["expectedRecords", "expected_records", "expectedControls", "expected_controls"])
            .unwrap_or(0),
        categories: f.strings(&["categories", "tscCategories", "tsc_categories"]),
    })
}

/// Convert a structure-analysis payload
///
/// The payload must state a page count or carry an extraction plan;
/// anything else is not a structure.
pub fn structure(obj: &Object, analysis_duration_ms: u64) -> Result<DocumentStructure, String> {
    let f = Fields(obj);
    let total_pages = f.u32(&["totalPages", "total_pages", "pageCount", "page_count"]);
    let plan_obj = f.object(&["extractionPlan", "extraction_plan", "plan"]);
    if total_pages.is_none() && plan_obj.is_none() {
        return Err("structure_unparsable".to_string());
    }

    let mut page_ranges: Vec<PlannedRange> = plan_obj
        .map(|p| Fields(p).array(&["pageRanges", "page_ranges", "ranges"]))
        .unwrap_or_default()
        .iter()
        .filter_map(planned_range)
        .collect();
    page_ranges.sort_by_key(|r| (r.start_page, r.end_page));

    let stated_total = plan_obj.and_then(|p| {
        Fields(p).u32(&[
            "totalExpectedRecords",
            "total_expected_records",
            "totalExpectedControls",
            "total_expected_controls",
        ])
    });
    let total_expected_records =
        stated_total.unwrap_or_else(|| page_ranges.iter().map(|r| r.expected_records).sum());

    let sections: BTreeMap<String, Option<PageRange>> = f
        .object(&["sections"])
        .map(|s| {
            s.iter()
                .map(|(name, value)| (section_key(name), page_range(value)))
                .collect()
        })
        .unwrap_or_default();

    let criteria_in_scope: BTreeSet<Criterion> = f
        .strings(&["criteriaInScope", "criteria_in_scope", "trustServicesCriteria", "criteria"])
        .iter()
        .filter_map(|c| Criterion::parse(c))
        .collect();

    Ok(DocumentStructure {
        total_pages: total_pages.unwrap_or(0),
        report_kind: f
            .str(&["reportKind", "report_kind", "reportType", "report_type"])
            .map(|s| ReportKind::parse(&s))
            .unwrap_or_default(),
        issuer: f.str(&["issuer", "auditFirm", "audit_firm"]),
        subject_org: f.str(&["subjectOrg", "subject_org", "serviceOrgName", "service_org_name"]),
        criteria_in_scope,
        sections,
        extraction_plan: ExtractionPlan {
            total_expected_records,
            page_ranges,
        },
        analysis_confidence: confidence(f.f64(&["confidence", "analysisConfidence"]), 0.0),
        analysis_duration_ms,
    })
}

/// Phrasings auditors use to report a clean test
const NEGATED_FINDINGS: &[&str] = &[
    "no exception",
    "no deviation",
    "without exception",
    "without deviation",
    "no relevant exception",
    "no material exception",
];

fn result_state(raw: Option<String>) -> ResultState {
    let Some(raw) = raw else {
        return ResultState::Effective;
    };
    ResultState::parse(&raw).unwrap_or_else(|| {
        // "No exceptions noted." must not count as an exception
        let lower = NEGATED_FINDINGS
            .iter()
            .fold(raw.to_lowercase(), |text, phrase| text.replace(phrase, " "));
        if lower.contains("exception") || lower.contains("deviation") {
            ResultState::Exception
        } else if ["not tested", "untested", "not applicable", "not performed"]
            .iter()
            .any(|p| lower.contains(p))
        {
            ResultState::Untested
        } else {
            ResultState::Effective
        }
    })
}

fn record(value: &Value, chunk_categories: &[String], provenance: &Provenance) -> Option<ExtractedRecord> {
    let f = Fields(value.as_object()?);
    let natural_key = f.str(&["naturalKey", "natural_key", "controlId", "control_id", "id"])?;
    let category = f
        .str(&["category", "tscCategory", "tsc_category"])
        .or_else(|| category_prefix_of("", &natural_key))
        .or_else(|| chunk_categories.first().cloned())
        .unwrap_or_default();

    Some(ExtractedRecord {
        area: f.str(&["area", "controlArea", "control_area"]).unwrap_or_default(),
        category,
        description: f.str(&["description"]).unwrap_or_default(),
        result_state: result_state(f.str(&["resultState", "result_state", "testResult", "test_result"])),
        procedure_note: f.str(&["procedureNote", "procedure_note", "testProcedure", "test_procedure"]),
        location: f.u32(&["location", "pageRef", "page_ref", "page"]),
        confidence: confidence(f.f64(&["confidence"]), DEFAULT_RECORD_CONFIDENCE),
        provenance: provenance.clone(),
        natural_key,
    })
}

/// Records from an extraction payload; items without a natural key are skipped
pub fn records(obj: &Object, chunk_categories: &[String], provenance: &Provenance) -> Vec<ExtractedRecord> {
    let items = Fields(obj).array(&["records", "controls"]);
    let parsed: Vec<ExtractedRecord> = items
        .iter()
        .filter_map(|item| record(item, chunk_categories, provenance))
        .collect();
    if parsed.len() < items.len() {
        warn!(skipped = items.len() - parsed.len(), "Skipped records without a natural key");
    }
    parsed
}

/// Exceptions from an extraction payload
pub fn exceptions(obj: &Object) -> Vec<ExtractionException> {
    Fields(obj)
        .array(&["exceptions"])
        .iter()
        .filter_map(|item| {
            let f = Fields(item.as_object()?);
            let description = f.str(&["description"])?;
            Some(ExtractionException {
                natural_key: f
                    .str(&["naturalKey", "natural_key", "controlId", "control_id"])
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                description,
                classification: f.str(&["classification", "exceptionType", "exception_type"]),
                remediation_note: f.str(&[
                    "remediationNote",
                    "remediation_note",
                    "managementResponse",
                    "management_response",
                ]),
                remediation_date: f.str(&["remediationDate", "remediation_date"]),
                remediation_verified: f.bool(&["remediationVerified", "remediation_verified"]),
                severity: f.str(&["severity"]).map(|s| Severity::parse(&s)).unwrap_or_default(),
                location: f.u32(&["location", "pageRef", "page_ref", "page"]),
            })
        })
        .collect()
}

/// Document metadata, from either a top-level or a nested `metadata` object
pub fn metadata(obj: &Object) -> DocumentMetadata {
    let inner = Fields(obj).object(&["metadata"]).unwrap_or(obj);
    let f = Fields(inner);
    let stated = Fields(obj).f64(&["confidence"]).or_else(|| f.f64(&["confidence"]));

    DocumentMetadata {
        issuer: f.str(&["issuer", "auditFirm", "audit_firm"]),
        subject_org: f.str(&["subjectOrg", "subject_org", "serviceOrgName", "service_org_name"]),
        report_kind: f
            .str(&["reportKind", "report_kind", "reportType", "report_type"])
            .map(|s| ReportKind::parse(&s))
            .unwrap_or_default(),
        opinion: f.str(&["opinion"]).map(|s| Opinion::parse(&s)).unwrap_or_default(),
        period_start: f.str(&["periodStart", "period_start"]),
        period_end: f.str(&["periodEnd", "period_end"]),
        criteria: f
            .strings(&["criteria", "trustServicesCriteria", "trust_services_criteria"])
            .iter()
            .filter_map(|c| Criterion::parse(c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        system_description: f.str(&["systemDescription", "system_description"]),
        confidence: confidence(stated, DEFAULT_METADATA_CONFIDENCE),
    }
}

/// Secondary entities and derived obligations, with the stated confidence
pub fn auxiliary(obj: &Object) -> (Vec<SecondaryEntity>, Vec<DerivedObligation>, f64) {
    let f = Fields(obj);

    let entities = f
        .array(&["secondaryEntities", "secondary_entities", "subserviceOrgs", "subservice_orgs"])
        .iter()
        .filter_map(|item| {
            let e = Fields(item.as_object()?);
            Some(SecondaryEntity {
                name: e.str(&["name"])?,
                service: e
                    .str(&["service", "serviceDescription", "service_description"])
                    .unwrap_or_default(),
                carved_out: e.bool(&["carvedOut", "carved_out", "carveOut", "carve_out"]).unwrap_or(false),
                location: e.u32(&["location", "pageRef", "page_ref"]),
            })
        })
        .collect();

    let obligations = f
        .array(&["derivedObligations", "derived_obligations", "cuecs"])
        .iter()
        .filter_map(|item| {
            let o = Fields(item.as_object()?);
            Some(DerivedObligation {
                id: o.str(&["id"]),
                description: o.str(&["description"])?,
                responsibility: o
                    .str(&["responsibility", "customerResponsibility", "customer_responsibility"])
                    .unwrap_or_default(),
                related_key: o.str(&["relatedKey", "related_key", "relatedControl", "related_control"]),
                location: o.u32(&["location", "pageRef", "page_ref"]),
            })
        })
        .collect();

    (
        entities,
        obligations,
        confidence(f.f64(&["confidence"]), DEFAULT_AUXILIARY_CONFIDENCE),
    )
}
