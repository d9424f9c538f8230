//! Property tests for ranking, merging, parsing and section extraction.

use std::path::PathBuf;

use faultline::core::analyze::merge_locations;
use faultline::core::keywords::KeywordExtractor;
use faultline::core::model::{CandidateLocation, Origin, rank_locations};
use faultline::core::sections::IssueTextExtractor;
use faultline::core::stack_trace::StackTraceParser;
use proptest::prelude::*;

fn location(
    file: u8,
    line: usize,
    score: u32,
    origin: Origin,
) -> CandidateLocation
{
    CandidateLocation {
        file_path: PathBuf::from(format!("f{file}.rs")),
        line_number: line,
        snippet: String::new(),
        relevance_score: score,
        context_before: Vec::new(),
        context_after: Vec::new(),
        origin,
    }
}

fn arb_locations(origin: Origin) -> impl Strategy<Value = Vec<CandidateLocation>>
{
    prop::collection::vec((0u8..6, 1usize..40, 0u32..12), 0..60).prop_map(move |v| {
        v.into_iter()
            .map(|(f, l, s)| location(f, l, s, origin))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_rank_sorted_capped_and_stable(locs in arb_locations(Origin::Keyword))
    {
        let ranked = rank_locations(locs.clone(), 20);

        prop_assert!(ranked.len() <= 20);
        prop_assert_eq!(ranked.len(), locs.len().min(20));
        prop_assert!(ranked.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));

        // ties keep their input order
        for w in ranked.windows(2)
        {
            if w[0].relevance_score == w[1].relevance_score
            {
                let a = locs.iter().position(|l| l == &w[0]).unwrap();
                let b = locs.iter().rposition(|l| l == &w[1]).unwrap();
                prop_assert!(a <= b);
            }
        }
    }

    #[test]
    fn prop_merge_has_unique_positions(
        stack in arb_locations(Origin::StackFrame),
        keyword in arb_locations(Origin::Keyword),
    )
    {
        let merged = merge_locations(stack, keyword, 20);

        prop_assert!(merged.len() <= 20);
        let mut seen = std::collections::HashSet::new();
        for l in &merged
        {
            prop_assert!(seen.insert((l.file_path.clone(), l.line_number)));
        }
        prop_assert!(merged.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    }

    #[test]
    fn prop_java_frames_keep_order_and_lines(lines in prop::collection::vec(1usize..100_000, 0..12))
    {
        let trace: String = lines
            .iter()
            .enumerate()
            .map(|(i, n)| format!("    at com.acme.C{i}.m{i}(C{i}.java:{n})\n"))
            .collect();

        let frames = StackTraceParser::default().parse(&trace);

        prop_assert_eq!(frames.len(), lines.len());
        for (i, (f, n)) in frames.iter().zip(&lines).enumerate()
        {
            prop_assert_eq!(f.line_number, *n);
            prop_assert!(f.line_number >= 1);
            prop_assert_eq!(&f.file_name, &format!("C{i}.java"));
        }
    }

    #[test]
    fn prop_parser_never_panics(text in ".{0,400}")
    {
        let frames = StackTraceParser::default().parse(&text);
        prop_assert!(frames.iter().all(|f| f.line_number >= 1));
    }

    #[test]
    fn prop_keywords_bounded_unique_lowercase(text in "[A-Za-z0-9 _.,:-]{0,300}")
    {
        let kws = KeywordExtractor::default().extract_from_text(&text);

        prop_assert!(kws.len() <= 10);
        let unique: std::collections::HashSet<_> = kws.iter().collect();
        prop_assert_eq!(unique.len(), kws.len());
        prop_assert!(kws.iter().all(|k| k.chars().count() >= 4 && *k == k.to_lowercase()));
    }

    #[test]
    fn prop_section_extraction_is_idempotent(text in "(?s).{0,300}")
    {
        prop_assert_eq!(IssueTextExtractor::extract(&text), IssueTextExtractor::extract(&text));
    }
}
