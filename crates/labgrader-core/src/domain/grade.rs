//! Grade cell values and markers.

use serde::Serialize;

/// Value of a grade cell that has not been graded yet.
pub const UNGRADED_MARKER: &str = "?";

/// Value written when the reported task variant does not match the roster.
pub const POISON_MARKER: &str = "?! Wrong TASKID!";

/// Base value of a successful grade.
pub const PASSED_MARKER: &str = "v";

/// What an existing grade cell means for a new grading request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState {
    /// Empty or holding the ungraded marker
    Ungraded,
    /// Holding anything else, including the poison marker
    Graded(String),
}

impl CellState {
    pub fn classify(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some(UNGRADED_MARKER) => CellState::Ungraded,
            Some(_) => CellState::Graded(value.unwrap_or_default().to_string()),
        }
    }
}

/// A percentage held in hundredths, so `12.5%` is `Percent(1250)`.
///
/// CI prints reductions as decimals; integer storage keeps equality exact
/// when bundles are compared against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Percent(u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);

    pub fn from_hundredths(hundredths: u32) -> Self {
        Percent(hundredths)
    }

    /// Whole percent; `None` on overflow.
    pub fn from_whole(percent: u32) -> Option<Self> {
        percent.checked_mul(100).map(Percent)
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    /// Parse `25`, `12.5` or `33.333`. Digits past the second decimal
    /// place round half up. Signs, exponents and empty parts are rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (whole, frac) = match text.split_once('.') {
            Some((whole, frac)) => (whole, Some(frac)),
            None => (text, None),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let frac = match frac {
            Some(f) if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) => return None,
            Some(f) => f.as_bytes(),
            None => "".as_bytes(),
        };

        let digit = |i: usize| frac.get(i).map_or(0, |b| u32::from(b - b'0'));
        let mut hundredths = whole
            .parse::<u32>()
            .ok()?
            .checked_mul(100)?
            .checked_add(digit(0) * 10 + digit(1))?;
        if digit(2) >= 5 {
            hundredths = hundredths.checked_add(1)?;
        }
        Some(Percent(hundredths))
    }

    /// `self / 100` rounded to two decimal places, in hundredths. Exact
    /// halves round to even (`12.5% -> 0.12`, `13.5% -> 0.14`).
    pub fn coefficient_hundredths(self) -> u32 {
        let (quotient, remainder) = (self.0 / 100, self.0 % 100);
        match remainder {
            r if r > 50 => quotient + 1,
            50 if quotient % 2 == 1 => quotient + 1,
            _ => quotient,
        }
    }
}

impl std::fmt::Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (whole, frac) = (self.0 / 100, self.0 % 100);
        match frac {
            0 => write!(f, "{whole}"),
            n if n % 10 == 0 => write!(f, "{whole}.{}", n / 10),
            n => write!(f, "{whole}.{n:02}"),
        }
    }
}

/// Serialized as a JSON number (`12.5`).
impl Serialize for Percent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(f64::from(self.0) / 100.0)
    }
}

/// Final grade composed from the CI reduction and the lateness penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeValue {
    /// Percent reported by CI via `Grading reduced by N%`.
    pub reduction_percent: Percent,
    /// Penalty units to display (already zero when completion date is ignored).
    pub penalty: u32,
}

impl GradeValue {
    /// Render the cell text: `v`, then `*{coefficient}` if CI reported a
    /// reduction, then `-{penalty}` if penalized.
    pub fn render(&self) -> String {
        let mut value = PASSED_MARKER.to_string();
        if self.reduction_percent > Percent::ZERO {
            value.push('*');
            value.push_str(&format_coefficient(self.reduction_percent));
        }
        if self.penalty > 0 {
            value.push('-');
            value.push_str(&self.penalty.to_string());
        }
        value
    }
}

impl std::fmt::Display for GradeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// `round(percent / 100, 2)` printed with at least one fractional digit
/// and no trailing zeros beyond it (`50 -> 0.5`, `25 -> 0.25`,
/// `100 -> 1.0`, `12.5 -> 0.12`).
pub fn format_coefficient(percent: Percent) -> String {
    let coefficient = percent.coefficient_hundredths();
    let whole = coefficient / 100;
    let frac = coefficient % 100;
    if frac % 10 == 0 {
        format!("{}.{}", whole, frac / 10)
    } else {
        format!("{}.{:02}", whole, frac)
    }
}
