//! # Error Kinds
//!
//! Every fallible operation in this crate returns `eyre::Result`. Failures
//! that have index-level meaning carry an [`IndexError`] at the bottom of the
//! report chain so callers can branch on the kind without parsing messages:
//!
//! ```ignore
//! match index.insert(key, value) {
//!     Ok(()) => {}
//!     Err(e) if error_kind(&e) == Some(IndexError::Conflict) => { /* dup */ }
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! I/O failures from the block store are not tagged; they surface as plain
//! reports wrapping the underlying `std::io::Error`.

use std::fmt;

/// Tagged failure kinds of the index surface.
///
/// `NoError` has no variant; success is `Ok(())`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexError {
    /// Key not present; also returned when descending an empty tree.
    NonExistent,
    /// Insertion of a key that already exists.
    Conflict,
    /// Free list exhausted.
    NoSpace,
    /// Slot access past a node's declared key count.
    OutOfBounds,
    /// Node kind byte is not one of the five legal values.
    BadKind,
    /// A structural invariant does not hold.
    Insane,
    /// Operation intentionally unsupported.
    Unimplemented,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            IndexError::NonExistent => "key does not exist",
            IndexError::Conflict => "key already exists",
            IndexError::NoSpace => "no free blocks remain",
            IndexError::OutOfBounds => "slot index out of bounds",
            IndexError::BadKind => "invalid node kind",
            IndexError::Insane => "tree invariant violated",
            IndexError::Unimplemented => "operation not implemented",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for IndexError {}

/// Extracts the tagged kind from a report, if one is present anywhere in the
/// error chain.
pub fn error_kind(report: &eyre::Report) -> Option<IndexError> {
    report.downcast_ref::<IndexError>().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn error_kind_finds_tag_through_context() {
        let report: eyre::Report = Err::<(), _>(IndexError::Conflict)
            .wrap_err("inserting key AAAA")
            .unwrap_err();

        assert_eq!(error_kind(&report), Some(IndexError::Conflict));
    }

    #[test]
    fn error_kind_is_none_for_untagged_reports() {
        let report = eyre::eyre!("plain failure");

        assert_eq!(error_kind(&report), None);
    }

    #[test]
    fn display_messages_are_distinct() {
        let kinds = [
            IndexError::NonExistent,
            IndexError::Conflict,
            IndexError::NoSpace,
            IndexError::OutOfBounds,
            IndexError::BadKind,
            IndexError::Insane,
            IndexError::Unimplemented,
        ];

        for a in &kinds {
            for b in &kinds {
                if a != b {
                    assert_ne!(a.to_string(), b.to_string());
                }
            }
        }
    }
}
