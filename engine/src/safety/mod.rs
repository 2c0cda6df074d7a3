//! Safety rails - absolute KEEP rules evaluated independently of scoring.

pub mod keywords;
pub mod rails;

pub use keywords::{KeywordMatch, KeywordMatcher, DEFAULT_CRITICAL_KEYWORDS};
pub use rails::{SafetyRailEvaluator, SafetyRule, SafetyVerdict};
