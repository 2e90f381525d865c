//! Per-scan global state shared by all workers.

use h5db_result::{Error, Result};
use h5db_storage::File;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

use crate::cache::load_chunks;
use crate::column::{ColumnSpec, ColumnState};
use crate::driver::ScanDriver;

/// Everything a scan shares across workers: the open file, the dense
/// per-column state array, the projection mapping, the slice driver, and the
/// single-loader gate of the prefetch cache.
///
/// `column_states` is dense: it holds one entry per *scanned* column, indexed
/// by local position. `columns_to_scan[local]` gives the bind-time (global)
/// column index, and `local_index` maps the other way.
pub struct TableScanState {
    file: File,
    column_states: Vec<ColumnState>,
    columns_to_scan: Vec<usize>,
    global_to_local: FxHashMap<usize, usize>,
    driver: ScanDriver,
    fetch_gate: AtomicBool,
}

impl std::fmt::Debug for TableScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableScanState")
            .field("file", &self.file)
            .field("columns_to_scan", &self.columns_to_scan)
            .field("driver", &self.driver)
            .finish()
    }
}

impl TableScanState {
    pub fn new(
        file: File,
        column_states: Vec<ColumnState>,
        columns_to_scan: Vec<usize>,
        driver: ScanDriver,
    ) -> TableScanState {
        let global_to_local = columns_to_scan
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();
        TableScanState {
            file,
            column_states,
            columns_to_scan,
            global_to_local,
            driver,
            fetch_gate: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn file(&self) -> &File {
        &self.file
    }

    #[inline]
    pub fn driver(&self) -> &ScanDriver {
        &self.driver
    }

    #[inline]
    pub fn columns_to_scan(&self) -> &[usize] {
        &self.columns_to_scan
    }

    #[inline]
    pub fn column_state(&self, local: usize) -> &ColumnState {
        &self.column_states[local]
    }

    /// Map a bind-time column index to its dense local position.
    pub fn local_index(&self, global: usize) -> Result<usize> {
        self.global_to_local.get(&global).copied().ok_or_else(|| {
            Error::Internal(format!(
                "column index {} not in projection - this is a bug",
                global
            ))
        })
    }

    #[inline]
    pub(crate) fn is_fetching(&self) -> bool {
        self.fetch_gate.load(Ordering::Acquire)
    }

    /// Try to become the loader and extend cache coverage for every scanned
    /// cacheable column. Losing the race is not an error: the winner is
    /// loading on our behalf and we can keep reading already-covered rows.
    pub(crate) fn try_refresh_cache(&self, specs: &[ColumnSpec], num_rows: u64) -> Result<()> {
        if self
            .fetch_gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        let result = self.refresh_all(specs, num_rows);
        self.fetch_gate.store(false, Ordering::Release);
        result
    }

    fn refresh_all(&self, specs: &[ColumnSpec], num_rows: u64) -> Result<()> {
        for (local, &global) in self.columns_to_scan.iter().enumerate() {
            let (ColumnSpec::Regular(spec), ColumnState::Regular(state)) =
                (&specs[global], &self.column_states[local])
            else {
                continue;
            };
            let Some(cache) = &state.cache else { continue };
            trace!(column = %spec.column_name, "extending prefetch coverage");
            crate::dispatch_numeric!(
                spec.element_kind,
                load_chunks(
                    cache,
                    &state.dataset,
                    &state.file_space,
                    self.driver.valid_ranges(),
                    self.driver.position_done(),
                    num_rows,
                )
            )?;
        }
        Ok(())
    }
}
