// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic operation classification.
//!
//! Maps request content to an operation category with ordered pattern rules
//! and estimates its token cost. No model call, no network, no latency.
//! Classification is a pure function of the content.

use std::str::FromStr;

use regex::Regex;
use tracing::warn;

use gearshift_config::model::ClassifierConfig;
use gearshift_core::{ClassificationResult, OperationCategory, RouteRequest};

/// Category assigned when no rule matches.
///
/// Unmatched content is treated as a completion rather than `unknown`, which
/// keeps legacy behavior. Content that is absent altogether is `unknown`.
pub const DEFAULT_CATEGORY: OperationCategory = OperationCategory::Completion;

/// Built-in rules, grouped by category in evaluation order.
const BUILTIN_RULES: &[(OperationCategory, &[&str])] = &[
    (
        OperationCategory::Completion,
        &[
            r"(?i)\b(?:auto-?complete|completion|complete (?:this|the|my)|finish (?:this|the|my)|fill in)\b",
            // Variable assignment.
            r"(?m)^\s*(?:let|const|var|mut)?\s*[A-Za-z_]\w*\s*=\s*[^=\s]",
            // Import statement.
            r"(?m)^\s*(?:import|use|from)\s+[\w{},.:*\s]+",
            // Logging statement.
            r"\.(?:log|info|debug)\s*\(",
            r"补全",
        ],
    ),
    (
        OperationCategory::Documentation,
        &[
            r"(?i)\b(?:docs?|docstrings?|documentation|document(?:ing)?|jsdoc|javadoc|rustdoc|readme|explain)\b",
            r"(?s)<summary>.*</summary>",
            // Doc-comment markers.
            r"(?m)^\s*(?:///|//!|/\*\*|\*\s*@(?:param|returns?))",
            r"注释|文档|解释",
        ],
    ),
    (
        OperationCategory::Syntax,
        &[
            r"(?i)\b(?:syntax|lint(?:er|ing)?|format(?:ting)?|indent(?:ation)?|typos?|semicolons?|brackets?|parenthes[ie]s)\b",
            r"格式化|语法",
        ],
    ),
    (
        OperationCategory::Rename,
        &[
            r"(?i)\brenam(?:e|es|ed|ing)\b",
            r"(?i)\b(?:change|update) the name\b",
            r"重命名|改名",
        ],
    ),
    (
        OperationCategory::Refactor,
        &[
            r"(?i)\brefactor(?:s|ed|ing)?\b",
            r"(?i)\b(?:extract (?:a |the )?(?:method|function|variable|module)|inline (?:the )?(?:function|variable)|restructure|simplify|deduplicate|clean ?up)\b",
            r"重构",
        ],
    ),
    (
        OperationCategory::Analysis,
        &[
            r"(?i)\b(?:analy[sz]e|analysis|review|audit|debug|diagnose|profil(?:e|ing)|complexity|vulnerabilit(?:y|ies))\b",
            r"分析|审查",
        ],
    ),
];

/// Something that can classify request content.
///
/// The router depends on this trait rather than on [`OperationClassifier`]
/// so tests can observe whether classification happened at all.
pub trait Classify: Send + Sync + 'static {
    /// Classify free-text or code content.
    fn classify(&self, content: &str) -> ClassificationResult;

    /// Classify a request, preferring its code snippet over its prompt.
    /// A request with neither is `unknown` with zero tokens.
    fn classify_request(&self, request: &RouteRequest) -> ClassificationResult {
        match request.content() {
            Some(content) => self.classify(content),
            None => ClassificationResult::UNKNOWN,
        }
    }
}

/// Ordered-rule operation classifier.
pub struct OperationClassifier {
    /// One entry per category, in evaluation order.
    rules: Vec<(OperationCategory, Vec<Regex>)>,
}

impl OperationClassifier {
    /// Create a classifier with the built-in rules only.
    pub fn new() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }

    /// Create a classifier with the built-in rules plus operator rules.
    ///
    /// Extra rules run after the built-ins of their category. A rule with an
    /// unknown category or an invalid pattern is skipped with a warning.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut rules: Vec<(OperationCategory, Vec<Regex>)> = OperationCategory::EVALUATION_ORDER
            .iter()
            .map(|category| (*category, Vec::new()))
            .collect();

        let builtin = BUILTIN_RULES
            .iter()
            .flat_map(|(category, patterns)| patterns.iter().map(move |p| (*category, *p)));
        let extra = config.extra_rules.iter().filter_map(|rule| {
            match OperationCategory::from_str(rule.category.trim()) {
                Ok(OperationCategory::Unknown) | Err(_) => {
                    warn!(
                        category = rule.category.as_str(),
                        "skipping classifier rule with unknown category"
                    );
                    None
                }
                Ok(category) => Some((category, rule.pattern.as_str())),
            }
        });

        for (category, pattern) in builtin.chain(extra) {
            match Regex::new(pattern) {
                Ok(regex) => {
                    if let Some((_, patterns)) = rules.iter_mut().find(|(c, _)| *c == category) {
                        patterns.push(regex);
                    }
                }
                Err(e) => warn!(
                    category = %category,
                    error = %e,
                    "skipping classifier rule with invalid pattern"
                ),
            }
        }

        Self { rules }
    }

    /// Total number of compiled rules.
    pub fn rule_count(&self) -> usize {
        self.rules.iter().map(|(_, patterns)| patterns.len()).sum()
    }
}

impl Default for OperationClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classify for OperationClassifier {
    fn classify(&self, content: &str) -> ClassificationResult {
        let token_count = estimate_tokens(content);
        if content.trim().is_empty() {
            return ClassificationResult {
                category: DEFAULT_CATEGORY,
                token_count,
            };
        }

        let category = self
            .rules
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(content)))
            .map(|(category, _)| *category)
            .unwrap_or(DEFAULT_CATEGORY);

        ClassificationResult {
            category,
            token_count,
        }
    }
}

/// Estimate the token cost of `content`.
///
/// Whitespace-delimited words plus one per character of a dense script,
/// since word splitting undercounts scripts written without spaces.
pub fn estimate_tokens(content: &str) -> u64 {
    let words = content.split_whitespace().count();
    let dense = content.chars().filter(|c| is_dense_script(*c)).count();
    (words + dense) as u64
}

fn is_dense_script(c: char) -> bool {
    matches!(
        c as u32,
        0x3040..=0x30FF     // Hiragana, Katakana
            | 0x3400..=0x4DBF // CJK Extension A
            | 0x4E00..=0x9FFF // CJK Unified Ideographs
            | 0xAC00..=0xD7AF // Hangul syllables
            | 0xF900..=0xFAFF // CJK Compatibility Ideographs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearshift_config::model::ClassifierRuleConfig;
    use proptest::prelude::*;

    fn category(content: &str) -> OperationCategory {
        OperationClassifier::new().classify(content).category
    }

    #[test]
    fn rename_comment_is_rename() {
        let result = OperationClassifier::new().classify("// simple rename of variable x to y");
        assert_eq!(result.category, OperationCategory::Rename);
        assert_eq!(result.token_count, 8);
    }

    #[test]
    fn categories_match_their_rules() {
        assert_eq!(category("x = compute(y)"), OperationCategory::Completion);
        assert_eq!(category("import { a, b } from 'lib'"), OperationCategory::Completion);
        assert_eq!(category("console.log(value)"), OperationCategory::Completion);
        assert_eq!(category("please explain this function"), OperationCategory::Documentation);
        assert_eq!(category("/// Returns the sum."), OperationCategory::Documentation);
        assert_eq!(category("fix the indentation here"), OperationCategory::Syntax);
        assert_eq!(category("refactor this module to use traits"), OperationCategory::Refactor);
        assert_eq!(category("review this for security issues"), OperationCategory::Analysis);
        assert_eq!(category("重构这个函数"), OperationCategory::Refactor);
    }

    #[test]
    fn earlier_category_wins() {
        // Matches both completion (assignment) and rename.
        assert_eq!(category("total = 0 // rename later"), OperationCategory::Completion);
        // Matches both syntax and analysis.
        assert_eq!(category("review the formatting"), OperationCategory::Syntax);
    }

    #[test]
    fn unmatched_content_defaults_to_completion() {
        let result = OperationClassifier::new().classify("hello world");
        assert_eq!(result.category, OperationCategory::Completion);
        assert_eq!(result.token_count, 2);
    }

    #[test]
    fn empty_content_is_default_with_zero_tokens() {
        let c = OperationClassifier::new();
        for content in ["", "   \n\t"] {
            let result = c.classify(content);
            assert_eq!(result.category, DEFAULT_CATEGORY);
            assert_eq!(result.token_count, 0);
        }
    }

    #[test]
    fn absent_content_is_unknown() {
        let c = OperationClassifier::new();
        assert_eq!(
            c.classify_request(&RouteRequest::new("m")),
            ClassificationResult::UNKNOWN
        );
    }

    #[test]
    fn request_prefers_code_snippet() {
        let c = OperationClassifier::new();
        let request = RouteRequest::new("m")
            .with_code_snippet("rename foo to bar")
            .with_prompt("review everything");
        assert_eq!(c.classify_request(&request).category, OperationCategory::Rename);

        let request = RouteRequest::new("m").with_prompt("review everything");
        assert_eq!(c.classify_request(&request).category, OperationCategory::Analysis);
    }

    #[test]
    fn dense_script_counts_per_character() {
        // One whitespace word plus six ideographs.
        assert_eq!(estimate_tokens("重构这个函数"), 7);
        assert_eq!(estimate_tokens("fix 補完 please"), 5);
        assert_eq!(estimate_tokens("plain ascii words only"), 4);
    }

    #[test]
    fn extra_rules_extend_their_category() {
        let config = ClassifierConfig {
            extra_rules: vec![ClassifierRuleConfig {
                category: "Rename".to_string(),
                pattern: r"(?i)\brebrand\b".to_string(),
            }],
        };
        let c = OperationClassifier::from_config(&config);
        assert_eq!(c.rule_count(), OperationClassifier::new().rule_count() + 1);
        assert_eq!(c.classify("rebrand the widget").category, OperationCategory::Rename);
    }

    #[test]
    fn invalid_extra_rules_are_skipped() {
        let config = ClassifierConfig {
            extra_rules: vec![
                ClassifierRuleConfig {
                    category: "poetry".to_string(),
                    pattern: "sonnet".to_string(),
                },
                ClassifierRuleConfig {
                    category: "unknown".to_string(),
                    pattern: "anything".to_string(),
                },
                ClassifierRuleConfig {
                    category: "analysis".to_string(),
                    pattern: "(unclosed".to_string(),
                },
            ],
        };
        let c = OperationClassifier::from_config(&config);
        assert_eq!(c.rule_count(), OperationClassifier::new().rule_count());
    }

    proptest! {
        #[test]
        fn classify_is_idempotent(content in "\\PC{0,200}") {
            let c = OperationClassifier::new();
            prop_assert_eq!(c.classify(&content), c.classify(&content));
        }

        #[test]
        fn ascii_token_count_is_word_count(content in "[a-z ]{0,200}") {
            let words = content.split_whitespace().count() as u64;
            prop_assert_eq!(OperationClassifier::new().classify(&content).token_count, words);
        }
    }
}
