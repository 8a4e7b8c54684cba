//! Static regulatory lookup table
//!
//! DORA articles and the trust-services categories that evidence them.
//! Changing this table is a deploy-time action; nothing here is read at
//! runtime from outside the binary.

use vellum_domain::CoverageStrength;

/// Weight at or above which a category fully evidences a requirement
pub const FULL_STRENGTH_WEIGHT: f64 = 0.9;

/// One regulatory requirement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Requirement {
    /// Identifier (e.g. "Article 8")
    pub id: &'static str,
    /// Title
    pub title: &'static str,
    /// Category prefixes that evidence the requirement
    pub categories: &'static [&'static str],
    /// Relative importance in the overall score
    pub weight: f64,
    /// What the requirement asks for
    pub description: &'static str,
}

impl Requirement {
    /// Strength with which any matching category evidences this requirement
    pub fn strength(&self) -> CoverageStrength {
        if self.weight >= FULL_STRENGTH_WEIGHT {
            CoverageStrength::Full
        } else {
            CoverageStrength::Partial
        }
    }

    /// Whether the category prefix evidences this requirement
    pub fn covers(&self, prefix: &str) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(prefix))
    }
}

macro_rules! requirement {
    ($id:literal, $title:literal, [$($cat:literal),+], $weight:literal, $desc:literal) => {
        Requirement {
            id: $id,
            title: $title,
            categories: &[$($cat),+],
            weight: $weight,
            description: $desc,
        }
    };
}

/// DORA articles in document order
pub static DORA_REQUIREMENTS: &[Requirement] = &[
    // Chapter II - ICT risk management
    requirement!("Article 5", "ICT risk management framework", ["CC1", "CC3", "CC4", "CC9"], 1.0,
        "Governance and accountability for ICT risk management"),
    requirement!("Article 6", "ICT systems, protocols and tools", ["CC6", "CC7", "CC8", "A"], 1.0,
        "ICT systems resilience and protection"),
    requirement!("Article 7", "Identification", ["CC3", "CC6"], 0.8,
        "Identification of ICT risks and business functions"),
    requirement!("Article 8", "Protection and prevention", ["CC5", "CC6", "CC7", "C"], 1.0,
        "ICT security policies and access controls"),
    requirement!("Article 9", "Detection", ["CC7", "CC4"], 0.8,
        "Detection of anomalous activities and incidents"),
    requirement!("Article 10", "Response and recovery", ["CC7", "CC9", "A"], 1.0,
        "Incident response and recovery procedures"),
    requirement!("Article 11", "Backup policies and procedures", ["A", "CC7", "CC9"], 0.9,
        "Data backup and restoration"),
    requirement!("Article 12", "Learning and evolving", ["CC4", "CC3"], 0.6,
        "Lessons learned and continuous improvement"),
    requirement!("Article 13", "Communication", ["CC2", "CC7"], 0.7,
        "Crisis communication procedures"),
    // Chapter III - ICT-related incident reporting
    requirement!("Article 17", "ICT-related incident management process", ["CC7", "CC2"], 1.0,
        "Incident classification and management"),
    requirement!("Article 18", "Classification of ICT-related incidents", ["CC7"], 0.8,
        "Incident classification criteria"),
    requirement!("Article 19", "Reporting of major ICT-related incidents", ["CC7", "CC2"], 1.0,
        "Regulatory incident reporting"),
    // Chapter IV - resilience testing
    requirement!("Article 24", "General requirements for testing", ["CC4", "CC7", "A"], 0.9,
        "Testing program requirements"),
    requirement!("Article 25", "Testing of ICT tools and systems", ["CC7", "CC8", "A"], 0.8,
        "Vulnerability assessments and testing"),
    // Chapter V - third-party risk
    requirement!("Article 28", "General principles for third-party risk", ["CC9"], 1.0,
        "Third-party ICT risk management strategy"),
    requirement!("Article 29", "Preliminary assessment of ICT concentration risk", ["CC3", "CC9"], 0.8,
        "Concentration risk assessment"),
    requirement!("Article 30", "Key contractual provisions", ["CC9"], 0.9,
        "Contract requirements for ICT services"),
    // Chapter VI - information sharing
    requirement!("Article 45", "Information sharing arrangements", ["CC2", "CC7"], 0.5,
        "Threat intelligence sharing"),
];

/// Requirements evidenced by a category prefix, in table order
pub fn requirements_for<'a>(
    table: &'a [Requirement],
    prefix: &'a str,
) -> impl Iterator<Item = &'a Requirement> + 'a {
    table.iter().filter(move |r| r.covers(prefix))
}

/// Look up a requirement by identifier
pub fn find(table: &[Requirement], id: &str) -> Option<Requirement> {
    table.iter().find(|r| r.id == id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ids_unique() {
        let mut ids: Vec<_> = DORA_REQUIREMENTS.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), DORA_REQUIREMENTS.len());
    }

    #[test]
    fn test_strength_from_weight() {
        assert_eq!(find(DORA_REQUIREMENTS, "Article 11").unwrap().strength(), CoverageStrength::Full);
        assert_eq!(find(DORA_REQUIREMENTS, "Article 9").unwrap().strength(), CoverageStrength::Partial);
    }

    #[test]
    fn test_requirements_for_prefix() {
        let ids: Vec<_> = requirements_for(DORA_REQUIREMENTS, "cc9").map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec!["Article 5", "Article 10", "Article 11", "Article 28", "Article 29", "Article 30"]
        );
        assert_eq!(requirements_for(DORA_REQUIREMENTS, "PI").count(), 0);
    }
}
