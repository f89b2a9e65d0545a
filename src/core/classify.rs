/// Keyword classification of commit subjects.
///
/// An ordered table of case-insensitive patterns; a subject may fall into
/// several categories at once.
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitCategory {
    Fix,
    Feat,
    Refactor,
    Release,
    Merge,
}

impl CommitCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fix => "fix",
            Self::Feat => "feature",
            Self::Refactor => "refactor",
            Self::Release => "release",
            Self::Merge => "merge",
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            Self::Fix => r"(?i)fix|bug|patch|hotfix",
            Self::Feat => r"(?i)feat|add|new|implement",
            Self::Refactor => r"(?i)refactor|clean|improve|update",
            Self::Release => r"(?i)release|version|bump|\bv\d+\.\d+",
            Self::Merge => r"(?i)merge|pull request",
        }
    }
}

const RULE_ORDER: [CommitCategory; 5] = [
    CommitCategory::Fix,
    CommitCategory::Feat,
    CommitCategory::Refactor,
    CommitCategory::Release,
    CommitCategory::Merge,
];

/// Compiled category rules.
pub struct Classifier {
    rules: Vec<(CommitCategory, Regex)>,
}

impl Classifier {
    fn compile() -> Classifier {
        let rules = RULE_ORDER
            .iter()
            .map(|cat| {
                let re = Regex::new(cat.pattern()).expect("category patterns are valid regexes");
                (*cat, re)
            })
            .collect();
        Classifier { rules }
    }

    /// True if `text` matches the pattern for `category`.
    pub fn matches(&self, category: CommitCategory, text: &str) -> bool {
        self.rules
            .iter()
            .any(|(cat, re)| *cat == category && re.is_match(text))
    }

    /// All categories `text` falls into, in rule order.
    pub fn categories(&self, text: &str) -> Vec<CommitCategory> {
        self.rules
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(cat, _)| *cat)
            .collect()
    }
}

/// Shared classifier, compiled on first use.
pub fn classifier() -> &'static Classifier {
    static CLASSIFIER: OnceLock<Classifier> = OnceLock::new();
    CLASSIFIER.get_or_init(Classifier::compile)
}

/// Shorthand for `classifier().matches(category, text)`.
pub fn is(category: CommitCategory, text: &str) -> bool {
    classifier().matches(category, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_keywords_case_insensitive() {
        for s in ["Fix crash", "BUG in parser", "security patch", "HOTFIX"] {
            assert!(is(CommitCategory::Fix, s), "{s}");
        }
        assert!(!is(CommitCategory::Fix, "document the api"));
    }

    #[test]
    fn feat_keywords() {
        for s in ["feat: login", "Add button", "new parser", "Implement cache"] {
            assert!(is(CommitCategory::Feat, s), "{s}");
        }
    }

    #[test]
    fn refactor_keywords() {
        for s in ["Refactor store", "cleanup", "improve docs", "Update deps"] {
            assert!(is(CommitCategory::Refactor, s), "{s}");
        }
    }

    #[test]
    fn release_and_merge() {
        assert!(is(CommitCategory::Release, "Release v1.2.0"));
        assert!(is(CommitCategory::Release, "tag v2.10"));
        assert!(is(CommitCategory::Release, "Bump version"));
        assert!(is(CommitCategory::Merge, "Merge pull request #42 from x/y"));
        assert!(!is(CommitCategory::Merge, "split the module"));
    }

    #[test]
    fn categories_overlap_in_rule_order() {
        let cats = classifier().categories("fix: add missing update");
        assert_eq!(
            cats,
            vec![
                CommitCategory::Fix,
                CommitCategory::Feat,
                CommitCategory::Refactor
            ]
        );
    }
}
