//! Plan documents and section extraction.
//!
//! The backend is asked for three markdown sections but nothing enforces it,
//! so extraction degrades instead of failing: a missing diet or workout header
//! falls back to the whole plan text together with a [`FormatWarning`].
//! Only the first occurrence of a header is honoured.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ASSESSMENT_HEADER: &str = "### Assessment";
pub const DIET_HEADER: &str = "### Diet Plan";
pub const WORKOUT_HEADER: &str = "### Workout Plan";
pub const SECTION_DELIMITER: &str = "###";

/// The raw text returned by the inference backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    text: String,
}

impl PlanDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sections(&self) -> ExtractedSections {
        parse_sections(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Assessment,
    Diet,
    Workout,
}

impl SectionKind {
    pub fn header(&self) -> &'static str {
        match self {
            SectionKind::Assessment => ASSESSMENT_HEADER,
            SectionKind::Diet => DIET_HEADER,
            SectionKind::Workout => WORKOUT_HEADER,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SectionKind::Assessment => "Assessment",
            SectionKind::Diet => "Diet plan",
            SectionKind::Workout => "Workout plan",
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        [SectionKind::Assessment, SectionKind::Diet, SectionKind::Workout]
            .into_iter()
            .find(|kind| kind.header() == header)
    }
}

/// Signalled when an expected header is absent. Not an error: the caller
/// shows the fallback text together with this notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatWarning {
    pub header: String,
}

impl FormatWarning {
    pub fn section(&self) -> Option<SectionKind> {
        SectionKind::from_header(&self.header)
    }
}

impl fmt::Display for FormatWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.section() {
            Some(kind) => write!(f, "{} format might be inconsistent", kind.display_name()),
            None => write!(f, "Section '{}' not found, showing the full plan", self.header),
        }
    }
}

/// Text of one section, plus a warning when it is the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub warning: Option<FormatWarning>,
}

impl Extracted {
    pub fn is_fallback(&self) -> bool {
        self.warning.is_some()
    }
}

/// Return the text after the first `header` up to the next delimiter, trimmed.
/// Falls back to `plan` unchanged when the header is missing.
pub fn extract(plan: &str, header: &str) -> Extracted {
    section_at(plan, header, plan.find(header))
}

fn section_at(plan: &str, header: &str, start: Option<usize>) -> Extracted {
    match start {
        Some(start) => Extracted {
            text: section_body(plan, start + header.len()).to_string(),
            warning: None,
        },
        None => {
            debug!(header, "section header missing, using full plan text");
            Extracted {
                text: plan.to_string(),
                warning: Some(FormatWarning {
                    header: header.to_string(),
                }),
            }
        }
    }
}

fn section_body(plan: &str, body_start: usize) -> &str {
    let rest = &plan[body_start..];
    let end = rest.find(SECTION_DELIMITER).unwrap_or(rest.len());
    rest[..end].trim()
}

/// The three sections of a plan, derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSections {
    pub assessment: Option<String>,
    pub diet: Extracted,
    pub workout: Extracted,
}

impl ExtractedSections {
    pub fn warnings(&self) -> Vec<&FormatWarning> {
        [&self.diet.warning, &self.workout.warning]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Locate all three headers in one scan and build the structured record.
pub fn parse_sections(plan: &str) -> ExtractedSections {
    let headers = [ASSESSMENT_HEADER, DIET_HEADER, WORKOUT_HEADER];
    let mut found: [Option<usize>; 3] = [None; 3];

    // Every header starts with '#', so checking each '#' finds first occurrences.
    for (idx, _) in plan.match_indices('#') {
        let rest = &plan[idx..];
        for (slot, header) in found.iter_mut().zip(headers) {
            if slot.is_none() && rest.starts_with(header) {
                *slot = Some(idx);
            }
        }
        if found.iter().all(Option::is_some) {
            break;
        }
    }

    ExtractedSections {
        assessment: found[0].map(|start| section_body(plan, start + ASSESSMENT_HEADER.len()).to_string()),
        diet: section_at(plan, DIET_HEADER, found[1]),
        workout: section_at(plan, WORKOUT_HEADER, found[2]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCENARIO_A: &str = "### Assessment\nX\n### Diet Plan\nEat Y\n### Workout Plan\nDo Z";

    #[test]
    fn test_extract_sections_in_order() {
        assert_eq!(extract(SCENARIO_A, DIET_HEADER).text, "Eat Y");
        assert_eq!(extract(SCENARIO_A, WORKOUT_HEADER).text, "Do Z");
        assert!(!extract(SCENARIO_A, DIET_HEADER).is_fallback());
    }

    #[test]
    fn test_parse_sections_scenario_a() {
        let sections = parse_sections(SCENARIO_A);
        assert_eq!(sections.assessment.as_deref(), Some("X"));
        assert_eq!(sections.diet.text, "Eat Y");
        assert_eq!(sections.workout.text, "Do Z");
        assert!(sections.warnings().is_empty());
    }

    #[test]
    fn test_no_headers_falls_back_for_both() {
        let plan = "no headers here";
        let sections = parse_sections(plan);
        assert_eq!(sections.diet.text, plan);
        assert_eq!(sections.workout.text, plan);
        assert_eq!(sections.assessment, None);
        assert_eq!(sections.warnings().len(), 2);
        assert_eq!(
            sections.diet.warning.as_ref().unwrap().to_string(),
            "Diet plan format might be inconsistent"
        );
        assert_eq!(
            sections.workout.warning.as_ref().unwrap().to_string(),
            "Workout plan format might be inconsistent"
        );
    }

    #[test]
    fn test_fallback_is_not_trimmed() {
        let plan = "\n  just prose  \n";
        assert_eq!(extract(plan, DIET_HEADER).text, plan);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let plan = "### Diet Plan\nfirst\n### Diet Plan\nsecond";
        assert_eq!(extract(plan, DIET_HEADER).text, "first");
        assert_eq!(parse_sections(plan).diet.text, "first");
    }

    #[test]
    fn test_last_section_runs_to_end() {
        let plan = "intro\n### Workout Plan\n  Mon: squats\nTue: rest\n\n";
        assert_eq!(extract(plan, WORKOUT_HEADER).text, "Mon: squats\nTue: rest");
    }

    #[test]
    fn test_deeper_heading_ends_section() {
        let plan = "### Diet Plan\nBreakfast\n#### Snacks\nnuts";
        assert_eq!(extract(plan, DIET_HEADER).text, "Breakfast");
    }

    #[test]
    fn test_header_inside_longer_hashes_is_found() {
        let plan = "#### Diet Plan\nOats\n### Workout Plan\nRun";
        assert_eq!(extract(plan, DIET_HEADER).text, "Oats");
        assert_eq!(parse_sections(plan).diet.text, "Oats");
    }

    #[test]
    fn test_workout_before_diet() {
        let plan = "### Workout Plan\nLift\n### Diet Plan\nEat";
        let sections = parse_sections(plan);
        assert_eq!(sections.workout.text, "Lift");
        assert_eq!(sections.diet.text, "Eat");
    }

    #[test]
    fn test_unknown_header_warning_message() {
        let warning = FormatWarning {
            header: "### Sleep".to_string(),
        };
        assert_eq!(warning.section(), None);
        assert!(warning.to_string().contains("### Sleep"));
    }

    proptest! {
        #[test]
        fn prop_text_between_headers(
            assessment in "[a-zA-Z0-9 .,\n]{0,40}",
            diet in "[a-zA-Z0-9 .,\n]{0,40}",
            workout in "[a-zA-Z0-9 .,\n]{0,40}",
        ) {
            let plan = format!("{ASSESSMENT_HEADER}\n{assessment}\n{DIET_HEADER}\n{diet}\n{WORKOUT_HEADER}\n{workout}");
            prop_assert_eq!(extract(&plan, DIET_HEADER).text, diet.trim());
            prop_assert_eq!(extract(&plan, WORKOUT_HEADER).text, workout.trim());
        }

        #[test]
        fn prop_missing_header_returns_plan_unchanged(plan in "[^#]{0,80}") {
            let result = extract(&plan, DIET_HEADER);
            prop_assert_eq!(&result.text, &plan);
            prop_assert!(result.is_fallback());
        }

        #[test]
        fn prop_extract_is_deterministic(plan in "(### [A-Za-z ]{0,12}\n[a-z \n]{0,20}){0,4}") {
            prop_assert_eq!(extract(&plan, DIET_HEADER), extract(&plan, DIET_HEADER));
            prop_assert_eq!(parse_sections(&plan), parse_sections(&plan));
        }

        #[test]
        fn prop_one_pass_parser_matches_extract(plan in "(#{2,4} (Diet Plan|Workout Plan|Assessment|Notes)\n[a-z #\n]{0,20}){0,5}") {
            let sections = parse_sections(&plan);
            prop_assert_eq!(sections.diet, extract(&plan, DIET_HEADER));
            prop_assert_eq!(sections.workout, extract(&plan, WORKOUT_HEADER));
        }
    }
}
