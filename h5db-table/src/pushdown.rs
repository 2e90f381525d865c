//! Complex-filter pushdown: claiming RSE comparisons for I/O pruning.
//!
//! Claiming is advisory. The host engine keeps every filter in its own list
//! and re-applies them after the scan; a claim only lets Init shrink the
//! row ranges the scan reads. Filtering is cheap, reading is expensive.

use h5db_expr::{CompareOp, ConjunctionOp, Expr};
use h5db_result::Result;
use h5db_scan::ClaimedFilter;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::read::ReadBindData;

/// Walk the optimizer's filter expressions and append every claimable RSE
/// comparison to the bind record. Returns how many expressions contributed
/// at least one claim.
pub fn pushdown_complex_filter(
    bind: &mut ReadBindData,
    table_index: usize,
    column_ids: &[usize],
    filters: &[Expr],
) -> Result<usize> {
    let rse_columns: FxHashSet<usize> = bind
        .columns
        .iter()
        .enumerate()
        .filter(|(_, col)| col.is_rse())
        .map(|(i, _)| i)
        .collect();

    // Plan column index -> bind-record column index. Structural, so it works
    // with projections and aliases.
    let plan_to_bind: FxHashMap<usize, usize> = column_ids
        .iter()
        .enumerate()
        .map(|(plan_idx, &bind_idx)| (plan_idx, bind_idx))
        .collect();

    let mut claimed_exprs = 0;
    for expr in filters {
        if try_claim_rse_filter(
            expr,
            table_index,
            &plan_to_bind,
            &rse_columns,
            &mut bind.claimed_filters,
        ) {
            claimed_exprs += 1;
        }
    }
    debug!(
        claimed_exprs,
        claimed_filters = bind.claimed_filters.len(),
        "complex filter pushdown"
    );
    Ok(claimed_exprs)
}

fn resolve_rse_column(
    expr: &Expr,
    table_index: usize,
    plan_to_bind: &FxHashMap<usize, usize>,
    rse_columns: &FxHashSet<usize>,
) -> Option<usize> {
    let Expr::ColumnRef(binding) = expr else {
        return None;
    };
    if binding.table_index != table_index {
        return None;
    }
    let bind_idx = *plan_to_bind.get(&binding.column_index)?;
    rse_columns.contains(&bind_idx).then_some(bind_idx)
}

fn try_claim_rse_filter(
    expr: &Expr,
    table_index: usize,
    plan_to_bind: &FxHashMap<usize, usize>,
    rse_columns: &FxHashSet<usize>,
    claimed: &mut Vec<ClaimedFilter>,
) -> bool {
    match expr {
        // col <op> const, or const <op> col (normalized by flipping).
        Expr::Comparison { op, left, right } => {
            let (column_expr, constant, op) = match (&**left, &**right) {
                (col @ Expr::ColumnRef(_), Expr::Constant(c)) => (col, c, *op),
                (Expr::Constant(c), col @ Expr::ColumnRef(_)) => (col, c, op.flip()),
                _ => return false,
            };
            let Some(column_index) =
                resolve_rse_column(column_expr, table_index, plan_to_bind, rse_columns)
            else {
                return false;
            };
            match op {
                CompareOp::Equal
                | CompareOp::GreaterThan
                | CompareOp::GreaterThanOrEqual
                | CompareOp::LessThan
                | CompareOp::LessThanOrEqual => {
                    claimed.push(ClaimedFilter {
                        column_index,
                        comparison: op,
                        constant: constant.clone(),
                    });
                    true
                }
                // <> and anything else stays with the host engine.
                _ => false,
            }
        }

        // col BETWEEN lo AND hi claims as col >= lo plus col <= hi.
        Expr::Between {
            input,
            lower,
            upper,
        } => {
            let (Expr::Constant(lo), Expr::Constant(hi)) = (&**lower, &**upper) else {
                return false;
            };
            let Some(column_index) =
                resolve_rse_column(input, table_index, plan_to_bind, rse_columns)
            else {
                return false;
            };
            claimed.push(ClaimedFilter {
                column_index,
                comparison: CompareOp::GreaterThanOrEqual,
                constant: lo.clone(),
            });
            claimed.push(ClaimedFilter {
                column_index,
                comparison: CompareOp::LessThanOrEqual,
                constant: hi.clone(),
            });
            true
        }

        // Recurse into two-child AND nodes; OR is never claimable.
        Expr::Conjunction {
            op: ConjunctionOp::And,
            left,
            right,
        } => {
            let mut partial = Vec::new();
            let claimed_left =
                try_claim_rse_filter(left, table_index, plan_to_bind, rse_columns, &mut partial);
            let claimed_right =
                try_claim_rse_filter(right, table_index, plan_to_bind, rse_columns, &mut partial);
            if claimed_left || claimed_right {
                claimed.append(&mut partial);
                true
            } else {
                false
            }
        }

        _ => false,
    }
}
