//! Task-variant validation.
//!
//! Each student's variant is derived from the task id in the roster:
//! `(raw + shift) mod max`. The CI harness prints the variant it actually
//! ran; the two must agree.

use crate::domain::error::{GradeError, Result};
use crate::domain::lab::LabDefinition;

/// Variant a student with roster task id `raw` must solve. `max` must be
/// positive; the result is always in `0..max`.
///
/// The sum is taken in `i128`, so any `i64` task id and shift are valid.
pub fn expected_variant(raw: i64, shift: i64, max: u32) -> u32 {
    debug_assert!(max > 0);
    let variant = (i128::from(raw) + i128::from(shift)).rem_euclid(i128::from(max.max(1)));
    // 0 <= variant < max <= u32::MAX
    variant as u32
}

/// Outcome of comparing the roster against the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantCheck {
    Match { expected: u32 },
    Mismatch { expected: u32, reported: u32 },
}

/// Compare the reported variant with the one derived from the roster cell.
///
/// A missing or zero `taskid_max` is a configuration defect; an empty or
/// non-numeric roster cell is reported as a missing task id.
pub fn validate_variant(
    lab: &LabDefinition,
    raw_cell: Option<&str>,
    reported: u32,
) -> Result<VariantCheck> {
    let max = match lab.taskid_max {
        Some(max) if max > 0 => max,
        _ => {
            return Err(GradeError::Configuration(format!(
                "lab {} has no positive taskid-max",
                lab.short_name
            )))
        }
    };

    let raw_text = raw_cell.map(str::trim).unwrap_or_default();
    if raw_text.is_empty() {
        return Err(GradeError::MissingTaskId(
            "roster has no task id for this student".to_string(),
        ));
    }
    let raw: i64 = raw_text.parse().map_err(|_| {
        GradeError::MissingTaskId(format!("roster task id {raw_text:?} is not a number"))
    })?;

    let expected = expected_variant(raw, lab.taskid_shift, max);
    if expected == reported {
        Ok(VariantCheck::Match { expected })
    } else {
        Ok(VariantCheck::Mismatch { expected, reported })
    }
}
