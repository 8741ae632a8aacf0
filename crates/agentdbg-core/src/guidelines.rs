//! Fixed guidance text used to rewrite agent prompts, and the keyword rules
//! that map a free-text diagnostic category onto it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidelineCategory {
    PromptClarity,
    StepwiseReasoning,
    ErrorHandling,
    ContextContinuity,
    OutputStructure,
    ToolUsage,
    Coordination,
}

/// Keyword rules, evaluated top to bottom. The first rule with a keyword
/// contained in the lowercased category wins.
pub const CATEGORY_RULES: &[(&[&str], GuidelineCategory)] = &[
    (&["prompt", "instruction"], GuidelineCategory::PromptClarity),
    (&["chain of thought", "reasoning"], GuidelineCategory::StepwiseReasoning),
    (&["error", "handling"], GuidelineCategory::ErrorHandling),
    (&["context", "memory"], GuidelineCategory::ContextContinuity),
    (&["output", "format"], GuidelineCategory::OutputStructure),
    (&["tool", "function"], GuidelineCategory::ToolUsage),
    (&["architecture", "flow"], GuidelineCategory::Coordination),
];

pub fn match_category(category: &str) -> Option<GuidelineCategory> {
    let category = category.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| category.contains(*k)))
        .map(|(_, snippet)| *snippet)
}

impl GuidelineCategory {
    pub fn label(&self) -> &'static str {
        match self {
            GuidelineCategory::PromptClarity => "Prompt clarity",
            GuidelineCategory::StepwiseReasoning => "Stepwise reasoning",
            GuidelineCategory::ErrorHandling => "Error handling",
            GuidelineCategory::ContextContinuity => "Context continuity",
            GuidelineCategory::OutputStructure => "Output structure",
            GuidelineCategory::ToolUsage => "Tool usage",
            GuidelineCategory::Coordination => "Agent coordination",
        }
    }

    pub fn snippet(&self) -> &'static str {
        match self {
            GuidelineCategory::PromptClarity => "\
- Be clear and specific in your responses\n\
- Follow a structured approach: analyze, plan, then execute\n\
- Provide detailed explanations for your decisions",
            GuidelineCategory::StepwiseReasoning => "\
- Show your reasoning step-by-step\n\
- Break down complex tasks into smaller steps\n\
- Explain your thought process before providing solutions",
            GuidelineCategory::ErrorHandling => "\
- Validate inputs before processing\n\
- Provide clear error messages when issues occur\n\
- Handle edge cases gracefully",
            GuidelineCategory::ContextContinuity => "\
- Maintain conversation context throughout interactions\n\
- Reference previous information when relevant\n\
- Build upon earlier decisions coherently",
            GuidelineCategory::OutputStructure => "\
- Structure your responses in a clear, consistent format\n\
- Use appropriate formatting (lists, sections, code blocks)\n\
- Ensure outputs are parseable and well-organized",
            GuidelineCategory::ToolUsage => "\
- Use available tools appropriately for each task\n\
- Verify tool outputs before proceeding\n\
- Choose the most efficient tool for each operation",
            GuidelineCategory::Coordination => "\
- Coordinate with other agents when needed\n\
- Follow the established workflow pattern\n\
- Communicate status and results clearly to downstream agents",
        }
    }
}

pub const MAJOR_RESPONSIBILITIES: &str = "\
- Coordinate sub-agents and manage the overall workflow\n\
- Make high-level decisions and delegate tasks appropriately\n\
- Ensure consistent communication between all system components";

pub const SUB_RESPONSIBILITIES: &str = "\
- Perform specialized tasks as directed by your parent agent\n\
- Report results clearly and concisely\n\
- Maintain focus on your specific domain of expertise";

pub const QUALITY_STANDARDS: &str = "\
- Accuracy: Ensure all outputs are correct and verified\n\
- Clarity: Communicate in clear, unambiguous language\n\
- Efficiency: Complete tasks using optimal approaches\n\
- Reliability: Handle errors gracefully and maintain system stability";

pub const CLOSING_REMINDER: &str =
    "Remember: Your role is critical to the system's success. Follow these guidelines consistently.";

/// Categories the diagnostic agent is asked to report on, in report order.
pub fn diagnostic_categories() -> &'static [&'static str] {
    &[
        "Prompt Engineering",
        "Chain of Thought Quality",
        "Error Handling",
        "Context Management",
        "Output Formatting",
        "Tool Usage",
        "Agent Architecture & Flow",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        // "prompt" is checked before "output"
        assert_eq!(
            match_category("Prompt Output Consistency"),
            Some(GuidelineCategory::PromptClarity)
        );
        assert_eq!(
            match_category("Tool Error Recovery"),
            Some(GuidelineCategory::ErrorHandling)
        );
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(
            match_category("CHAIN OF THOUGHT QUALITY"),
            Some(GuidelineCategory::StepwiseReasoning)
        );
        assert_eq!(
            match_category("memory drift"),
            Some(GuidelineCategory::ContextContinuity)
        );
    }

    #[test]
    fn unmapped_category_has_no_snippet() {
        assert_eq!(match_category("Latency"), None);
        assert_eq!(match_category(""), None);
    }

    #[test]
    fn every_reported_category_maps_to_a_snippet() {
        for category in diagnostic_categories() {
            assert!(match_category(category).is_some(), "{category}");
        }
    }

    #[test]
    fn snippets_are_three_bullets() {
        for (_, category) in CATEGORY_RULES {
            let lines: Vec<&str> = category.snippet().lines().collect();
            assert_eq!(lines.len(), 3);
            assert!(lines.iter().all(|l| l.starts_with("- ")));
        }
    }
}
