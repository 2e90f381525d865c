//! Row-range planning for claimed RSE filters.
//!
//! Claimed filters never change results: the host engine re-applies every
//! filter after the scan. The planner's job is purely to shrink the row
//! intervals the scan reads.

use h5db_expr::{CompareOp, FromLiteral, Literal};
use h5db_result::{Error, Result};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::column::{ColumnSpec, ElementKind, NumericElement, RseColumnState, TypedSlice};

/// Half-open interval `[start_row, end_row)` of dataset row indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub start_row: u64,
    pub end_row: u64,
}

/// A filter claimed during complex-filter pushdown: a normalized comparison
/// of one RSE column against a constant.
#[derive(Clone, Debug)]
pub struct ClaimedFilter {
    /// Index into the bind record's column list.
    pub column_index: usize,
    pub comparison: CompareOp,
    pub constant: Literal,
}

/// Intersect two sorted, disjoint range lists.
pub fn intersect_ranges(a: &[RowRange], b: &[RowRange]) -> Vec<RowRange> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let start = a[i].start_row.max(b[j].start_row);
        let end = a[i].end_row.min(b[j].end_row);
        if start < end {
            out.push(RowRange {
                start_row: start,
                end_row: end,
            });
        }
        if a[i].end_row < b[j].end_row {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Values an RSE run can be compared against: the ten numeric kinds plus
/// strings.
pub trait FilterValue: TypedSlice + Clone + PartialOrd {
    fn from_literal(lit: &Literal) -> Result<Self>;
}

impl<T: NumericElement + TypedSlice> FilterValue for T {
    fn from_literal(lit: &Literal) -> Result<Self> {
        <T as FromLiteral>::from_literal(lit)
    }
}

impl FilterValue for String {
    fn from_literal(lit: &Literal) -> Result<Self> {
        <String as FromLiteral>::from_literal(lit)
    }
}

/// Evaluate one claimable comparison. Operators outside the claimable set
/// never match, so a stray claim can only shrink nothing, not rows.
fn satisfies<T: PartialOrd>(value: &T, op: CompareOp, target: &T) -> bool {
    match op {
        CompareOp::Equal => value == target,
        CompareOp::GreaterThan => value > target,
        CompareOp::GreaterThanOrEqual => value >= target,
        CompareOp::LessThan => value < target,
        CompareOp::LessThanOrEqual => value <= target,
        _ => false,
    }
}

/// Walk the runs of one column and merge consecutive satisfying runs into
/// ranges. The final run extends to `num_rows`.
pub fn ranges_for_rse<T: PartialOrd>(
    run_starts: &[u64],
    values: &[T],
    filters: &[(CompareOp, T)],
    num_rows: u64,
) -> Vec<RowRange> {
    let mut out = Vec::new();
    let mut current_start = 0u64;
    let mut in_range = false;

    for (i, value) in values.iter().enumerate() {
        let run_start = run_starts[i];
        let ok = filters.iter().all(|(op, target)| satisfies(value, *op, target));
        if ok && !in_range {
            current_start = run_start;
            in_range = true;
        } else if !ok && in_range {
            out.push(RowRange {
                start_row: current_start,
                end_row: run_start,
            });
            in_range = false;
        }
    }
    if in_range {
        out.push(RowRange {
            start_row: current_start,
            end_row: num_rows,
        });
    }
    out
}

/// Validate the run-start invariants against the table's row count.
pub fn validate_rse(run_starts: &[u64], num_values: usize, num_rows: u64) -> Result<()> {
    if run_starts.len() != num_values {
        return Err(Error::InvariantViolation(format!(
            "RSE run_starts and values must have the same length, got {} and {}",
            run_starts.len(),
            num_values
        )));
    }
    if let Some(&first) = run_starts.first() {
        if first != 0 {
            return Err(Error::InvariantViolation(format!(
                "RSE run_starts must begin with 0, got {}",
                first
            )));
        }
    }
    for pair in run_starts.windows(2) {
        if pair[1] <= pair[0] {
            return Err(Error::InvariantViolation(
                "RSE run_starts must be strictly increasing".to_string(),
            ));
        }
    }
    if let Some(&last) = run_starts.last() {
        if last >= num_rows {
            return Err(Error::InvariantViolation(format!(
                "RSE run_starts contains index {} which exceeds dataset length {}",
                last, num_rows
            )));
        }
    }
    Ok(())
}

fn typed_ranges<T: FilterValue>(
    state: &RseColumnState,
    filters: &[(CompareOp, Literal)],
    num_rows: u64,
) -> Result<Vec<RowRange>> {
    let values = T::slice(&state.values)
        .ok_or_else(|| Error::Internal("RSE value buffer does not match the column type".into()))?;
    let typed: Vec<(CompareOp, T)> = filters
        .iter()
        .map(|(op, lit)| Ok((*op, T::from_literal(lit)?)))
        .collect::<Result<_>>()?;
    Ok(ranges_for_rse(&state.run_starts, values, &typed, num_rows))
}

/// Turn the claimed filter set into the final sorted, disjoint row-range
/// list, starting from the full `[0, num_rows)` interval.
pub fn plan_valid_ranges<'a>(
    columns: &[ColumnSpec],
    claimed: &[ClaimedFilter],
    num_rows: u64,
    state_for: impl Fn(usize) -> Result<&'a RseColumnState>,
) -> Result<Vec<RowRange>> {
    let full = vec![RowRange {
        start_row: 0,
        end_row: num_rows,
    }];
    if claimed.is_empty() {
        return Ok(full);
    }

    let mut by_column: FxHashMap<usize, Vec<(CompareOp, Literal)>> = FxHashMap::default();
    for filter in claimed {
        by_column
            .entry(filter.column_index)
            .or_default()
            .push((filter.comparison, filter.constant.clone()));
    }

    let mut ranges = full;
    for (&column_index, filters) in &by_column {
        let spec = match columns.get(column_index) {
            Some(ColumnSpec::Rse(spec)) => spec,
            _ => {
                return Err(Error::Internal(format!(
                    "claimed filter targets column {} which is not run-start encoded",
                    column_index
                )));
            }
        };
        let state = state_for(column_index)?;
        let column_ranges = match spec.element_kind {
            ElementKind::Utf8 => typed_ranges::<String>(state, filters, num_rows)?,
            kind => crate::dispatch_numeric!(kind, typed_ranges(state, filters, num_rows))?,
        };
        debug!(
            column = %spec.column_name,
            filters = filters.len(),
            ranges = column_ranges.len(),
            "claimed filters narrowed to row ranges"
        );
        ranges = intersect_ranges(&ranges, &column_ranges);
    }
    Ok(ranges)
}
