// src/cbt/mod.rs
//
// Computer-based-test attempt lifecycle. Everything that decides whether a
// student may start, resume or submit a test lives here; handlers only
// translate HTTP to engine calls. All writes to attempts/answers go through
// this module.

pub mod engine;
pub mod error;
pub mod memory;
pub mod pg;
pub mod store;

pub use engine::{BeginOutcome, LifecycleEngine, StudentRef, SubmitOutcome, percentage};
pub use error::{CbtError, StoreError};
pub use store::{AttemptRecord, AttemptStatus, AttemptStore, CatalogStore, CbtQuestion, CbtTest, NewAnswer};

use serde::{Deserialize, Serialize};

/// One of the four answer options of a question. Raw client input is
/// normalized into this type exactly once, at the boundary; anything that
/// does not parse counts as unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    /// Lenient parse of client-supplied input: surrounding whitespace and
    /// letter case are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(OptionLabel::A),
            "B" => Some(OptionLabel::B),
            "C" => Some(OptionLabel::C),
            "D" => Some(OptionLabel::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_any_case_and_whitespace() {
        assert_eq!(OptionLabel::parse("a"), Some(OptionLabel::A));
        assert_eq!(OptionLabel::parse(" B "), Some(OptionLabel::B));
        assert_eq!(OptionLabel::parse("c"), Some(OptionLabel::C));
        assert_eq!(OptionLabel::parse("D"), Some(OptionLabel::D));
    }

    #[test]
    fn parse_rejects_anything_else() {
        assert_eq!(OptionLabel::parse(""), None);
        assert_eq!(OptionLabel::parse("X"), None);
        assert_eq!(OptionLabel::parse("AB"), None);
        assert_eq!(OptionLabel::parse("1"), None);
    }
}
