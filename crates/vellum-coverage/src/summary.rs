//! Requirement-level coverage and gap analysis

use crate::table::{find, Requirement};
use vellum_domain::{
    CoverageGap, CoverageLevel, CoverageMapping, CoverageSummary, RequirementCoverage,
};

/// Roll mappings up to one entry per requirement in `table`
///
/// Each requirement takes its best mapping strength and highest mapping
/// confidence. The overall score is the weight- and confidence-scaled mean of
/// level scores (full 1, partial 0.5, none 0), rounded to three decimals.
pub fn summarize(table: &[Requirement], mappings: &[CoverageMapping]) -> CoverageSummary {
    let mut requirements = Vec::with_capacity(table.len());
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    let mut covered = 0;

    for requirement in table {
        let mut level = CoverageLevel::None;
        let mut confidence: f64 = 0.0;
        let mut evidence: Vec<String> = Vec::new();

        for m in mappings.iter().filter(|m| m.target_requirement_id == requirement.id) {
            level = level.max(m.strength.into());
            confidence = confidence.max(m.confidence);
            if !evidence.contains(&m.source_natural_key) {
                evidence.push(m.source_natural_key.clone());
            }
        }

        weighted += level.score() * requirement.weight * confidence;
        total_weight += requirement.weight;
        if level != CoverageLevel::None {
            covered += 1;
        }

        requirements.push(RequirementCoverage {
            requirement_id: requirement.id.to_string(),
            requirement_name: requirement.title.to_string(),
            weight: requirement.weight,
            level,
            confidence,
            evidence,
        });
    }

    let overall_score = if total_weight > 0.0 {
        (weighted / total_weight * 1000.0).round() / 1000.0
    } else {
        0.0
    };

    CoverageSummary {
        overall_score,
        requirements_covered: covered,
        requirements_total: table.len(),
        requirements,
    }
}

/// Requirements with no or partial coverage, heaviest first
pub fn gaps(table: &[Requirement], summary: &CoverageSummary) -> Vec<CoverageGap> {
    let mut gaps: Vec<(f64, CoverageGap)> = summary
        .requirements
        .iter()
        .filter(|r| r.level != CoverageLevel::Full)
        .map(|r| {
            let entry = find(table, &r.requirement_id);
            let categories: Vec<String> = entry
                .map(|e| e.categories.iter().map(|c| c.to_string()).collect())
                .unwrap_or_default();
            let gap = CoverageGap {
                requirement_id: r.requirement_id.clone(),
                requirement_name: r.requirement_name.clone(),
                description: entry.map(|e| e.description.to_string()).unwrap_or_default(),
                level: r.level,
                remediation: format!(
                    "Implement controls addressing {} to meet {} requirements.",
                    categories.join(", "),
                    r.requirement_id
                ),
                required_categories: categories,
            };
            (r.weight, gap)
        })
        .collect();

    // Stable: equal weights keep table order
    gaps.sort_by(|a, b| b.0.total_cmp(&a.0));
    gaps.into_iter().map(|(_, gap)| gap).collect()
}
