//! Chunk planner: turns an extraction plan into bounded page ranges

use vellum_domain::{DocumentStructure, ExtractionChunk, PageRange};

fn ceil_div(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator - 1) / denominator
}

/// Split `range` into strides of at most `max` pages
///
/// The last stride is clipped to the range end, and every stride to
/// `total_pages` when that is known.
fn strides(range: PageRange, max: u32, total_pages: u32) -> impl Iterator<Item = PageRange> {
    let end = if total_pages > 0 { range.end.min(total_pages) } else { range.end };
    let step = max as usize;
    (range.start..=end)
        .step_by(step)
        .map(move |s| PageRange::new(s, s.saturating_add(max - 1).min(end)))
}

/// Plan the chunks for a document
///
/// Each planned range no wider than `max_pages_per_chunk` becomes one chunk.
/// Wider ranges are walked in fixed strides, each assigned
/// `ceil(expected * stride_width / range_width)` records. With no planned
/// ranges, the controls section is strided at `fallback_records_per_chunk`
/// records per chunk; with neither, the plan is empty.
///
/// A `max_pages_per_chunk` of 0 is treated as 1.
///
/// # Examples
///
/// ```
/// use vellum_domain::{DocumentStructure, ExtractionPlan, PlannedRange, ReportKind};
/// use vellum_extractor::planner::plan;
///
/// let structure = DocumentStructure {
///     total_pages: 40,
///     report_kind: ReportKind::Type2,
///     issuer: None,
///     subject_org: None,
///     criteria_in_scope: Default::default(),
///     sections: Default::default(),
///     extraction_plan: ExtractionPlan {
///         total_expected_records: 96,
///         page_ranges: vec![PlannedRange {
///             start_page: 10,
///             end_page: 33,
///             expected_records: 96,
///             categories: vec![],
///         }],
///     },
///     analysis_confidence: 0.9,
///     analysis_duration_ms: 0,
/// };
///
/// let chunks = plan(&structure, 8, 15);
/// let widths: Vec<u32> = chunks.iter().map(|c| c.width()).collect();
/// assert_eq!(widths, vec![8, 8, 8]);
/// ```
pub fn plan(
    structure: &DocumentStructure,
    max_pages_per_chunk: u32,
    fallback_records_per_chunk: u32,
) -> Vec<ExtractionChunk> {
    let max = max_pages_per_chunk.max(1);
    let total_pages = structure.total_pages;
    let mut chunks = Vec::new();

    let mut ranges: Vec<_> = structure
        .extraction_plan
        .page_ranges
        .iter()
        .filter(|r| r.pages().width() > 0)
        .collect();
    ranges.sort_by_key(|r| (r.start_page, r.end_page));

    if ranges.is_empty() {
        if let Some(section) = structure.controls_section().filter(|s| s.width() > 0) {
            tracing::debug!(%section, "No planned ranges, striding controls section");
            for pages in strides(section, max, total_pages) {
                chunks.push(ExtractionChunk {
                    index: chunks.len(),
                    start_page: pages.start,
                    end_page: pages.end,
                    expected_records: fallback_records_per_chunk,
                    categories: Vec::new(),
                });
            }
        }
        return chunks;
    }

    for range in ranges {
        let width = range.pages().width() as u64;
        for pages in strides(range.pages(), max, total_pages) {
            let expected = if width <= max as u64 {
                range.expected_records
            } else {
                let share = range.expected_records as u64 * pages.width() as u64;
                ceil_div(share, width) as u32
            };
            chunks.push(ExtractionChunk {
                index: chunks.len(),
                start_page: pages.start,
                end_page: pages.end,
                expected_records: expected,
                categories: range.categories.clone(),
            });
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vellum_domain::{ExtractionPlan, PlannedRange, ReportKind, CONTROLS_SECTION};

    fn structure(total_pages: u32, ranges: Vec<PlannedRange>) -> DocumentStructure {
        DocumentStructure {
            total_pages,
            report_kind: ReportKind::Type2,
            issuer: None,
            subject_org: None,
            criteria_in_scope: Default::default(),
            sections: Default::default(),
            extraction_plan: ExtractionPlan {
                total_expected_records: ranges.iter().map(|r| r.expected_records).sum(),
                page_ranges: ranges,
            },
            analysis_confidence: 0.9,
            analysis_duration_ms: 0,
        }
    }

    fn range(start_page: u32, end_page: u32, expected_records: u32) -> PlannedRange {
        PlannedRange {
            start_page,
            end_page,
            expected_records,
            categories: vec!["CC1".to_string()],
        }
    }

    #[test]
    fn test_narrow_range_unchanged() {
        let chunks = plan(&structure(40, vec![range(3, 7, 12)]), 8, 15);
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_page, chunks[0].end_page), (3, 7));
        assert_eq!(chunks[0].expected_records, 12);
        assert_eq!(chunks[0].categories, vec!["CC1".to_string()]);
    }

    #[test]
    fn test_even_split() {
        let chunks = plan(&structure(40, vec![range(10, 33, 96)]), 8, 15);
        let pages: Vec<_> = chunks.iter().map(|c| (c.start_page, c.end_page)).collect();
        assert_eq!(pages, vec![(10, 17), (18, 25), (26, 33)]);
        assert!(chunks.iter().all(|c| c.expected_records == 32));
    }

    #[test]
    fn test_remainder_stride_clipped() {
        let chunks = plan(&structure(40, vec![range(10, 34, 96)]), 8, 15);
        let widths: Vec<_> = chunks.iter().map(|c| c.width()).collect();
        assert_eq!(widths, vec![8, 8, 8, 1]);
        let expected: Vec<_> = chunks.iter().map(|c| c.expected_records).collect();
        assert_eq!(expected, vec![31, 31, 31, 4]);
    }

    #[test]
    fn test_clipped_to_total_pages() {
        let chunks = plan(&structure(20, vec![range(15, 30, 16)]), 8, 15);
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_page, chunks[0].end_page), (15, 20));
    }

    #[test]
    fn test_ranges_sorted_and_indexed() {
        let chunks = plan(&structure(0, vec![range(20, 22, 3), range(1, 2, 2)]), 8, 15);
        assert_eq!(chunks[0].start_page, 1);
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_zero_max_treated_as_one() {
        let chunks = plan(&structure(0, vec![range(1, 3, 3)]), 0, 15);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.width() == 1 && c.expected_records == 1));
    }

    #[test]
    fn test_fallback_to_controls_section() {
        let mut s = structure(60, vec![]);
        s.sections
            .insert(CONTROLS_SECTION.to_string(), Some(PageRange::new(20, 39)));
        let chunks = plan(&s, 8, 15);
        let pages: Vec<_> = chunks.iter().map(|c| (c.start_page, c.end_page)).collect();
        assert_eq!(pages, vec![(20, 27), (28, 35), (36, 39)]);
        assert!(chunks.iter().all(|c| c.expected_records == 15));
    }

    #[test]
    fn test_empty_plan() {
        let mut s = structure(60, vec![]);
        s.sections.insert(CONTROLS_SECTION.to_string(), None);
        assert!(plan(&s, 8, 15).is_empty());
    }

    proptest! {
        #[test]
        fn chunk_width_never_exceeds_max(
            start in 1u32..500,
            len in 1u32..300,
            expected in 0u32..1000,
            max in 1u32..20,
        ) {
            let chunks = plan(&structure(0, vec![range(start, start + len - 1, expected)]), max, 15);
            prop_assert!(chunks.iter().all(|c| c.width() >= 1 && c.width() <= max));
            prop_assert_eq!(chunks.iter().map(|c| c.width()).sum::<u32>(), len);
        }

        #[test]
        fn expected_records_conserved_within_rounding(
            start in 1u32..500,
            len in 1u32..300,
            expected in 0u32..1000,
            max in 1u32..20,
        ) {
            let chunks = plan(&structure(0, vec![range(start, start + len - 1, expected)]), max, 15);
            let total: u32 = chunks.iter().map(|c| c.expected_records).sum();
            prop_assert!(total >= expected);
            prop_assert!(total < expected + chunks.len() as u32 + 1);
        }

        #[test]
        fn chunks_in_document_order(
            starts in proptest::collection::vec(1u32..1000, 1..6),
            max in 1u32..10,
        ) {
            let ranges: Vec<_> = starts.iter().map(|s| range(*s, s + 4, 5)).collect();
            let chunks = plan(&structure(0, ranges), max, 15);
            prop_assert!(chunks.windows(2).all(|w| w[0].start_page <= w[1].start_page));
        }
    }
}
