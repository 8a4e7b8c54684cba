//! Plan command implementation.

use crate::cli::PlanArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::fs;
use vellum_domain::DocumentStructure;
use vellum_extractor::{parser, planner};

/// Execute the plan command.
pub fn execute_plan(args: PlanArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let text = fs::read_to_string(&args.structure)?;
    let structure = load_structure(&text)?;

    let max_pages = args.max_pages.unwrap_or(config.extractor.max_pages_per_chunk);
    if max_pages == 0 {
        return Err(CliError::InvalidInput("--max-pages must be greater than 0".to_string()));
    }

    let chunks = planner::plan(&structure, max_pages, config.extractor.fallback_records_per_chunk);
    println!("{}", formatter.format_chunks(&chunks)?);
    Ok(())
}

/// Read a structure from a stored result field or a raw oracle answer.
pub fn load_structure(text: &str) -> Result<DocumentStructure> {
    if let Ok(structure) = serde_json::from_str::<DocumentStructure>(text) {
        return Ok(structure);
    }

    let object = parser::parse_object(text).map_err(|e| CliError::InvalidInput(e.to_string()))?;
    parser::structure(&object, 0).map_err(CliError::InvalidInput)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORACLE_ANSWER: &str = r#"Here is the analysis:
```json
{
  "total_pages": 60,
  "report_type": "SOC2_TYPE2",
  "sections": {"controls": {"start": 20, "end": 44}},
  "extraction_plan": {
    "total_expected_controls": 40,
    "page_ranges": [
      {"start": 20, "end": 31, "expected_controls": 24, "categories": ["CC1", "CC2"]},
      {"start": 32, "end": 44, "expected_controls": 16, "categories": ["CC6"]}
    ]
  },
  "confidence": 0.8
}
```"#;

    #[test]
    fn test_load_raw_oracle_answer() {
        let structure = load_structure(ORACLE_ANSWER).unwrap();
        assert_eq!(structure.total_pages, 60);
        assert_eq!(structure.extraction_plan.page_ranges.len(), 2);

        let chunks = planner::plan(&structure, 8, 15);
        assert!(chunks.iter().all(|c| c.width() <= 8));
        assert_eq!(chunks.first().map(|c| c.start_page), Some(20));
        assert_eq!(chunks.last().map(|c| c.end_page), Some(44));
    }

    #[test]
    fn test_load_serialized_structure() {
        let structure = load_structure(ORACLE_ANSWER).unwrap();
        let json = serde_json::to_string(&structure).unwrap();
        assert_eq!(load_structure(&json).unwrap(), structure);
    }

    #[test]
    fn test_load_garbage() {
        assert!(matches!(load_structure("no json here"), Err(CliError::InvalidInput(_))));
    }
}
