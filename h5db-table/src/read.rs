//! The `read` table function: bind, init, and chunked scanning.

use arrow::datatypes::{Field, Schema, SchemaRef};
use h5db_result::{Error, Result};
use h5db_scan::column::{
    ColumnSpec, ColumnState, ElementKind, LogicalType, NumericElement, RegularColumnSpec,
    RegularColumnState, RseColumnSpec, RseColumnState, TypedSlice, TypedValues,
};
use h5db_scan::{
    ChunkCache, ClaimedFilter, DataChunk, ScanDriver, ScanPhase, Slice, TableScanState,
    VECTOR_SIZE, materialize_slice, plan_valid_ranges, resolve_chunk_size, validate_rse,
};
use h5db_storage::{Dataset, File, TypeClass};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::rse::RSE_ENCODING;

/// One positional column argument of `read`: a dataset path, or the raw
/// 3-field struct produced by [`crate::rse::rse`].
#[derive(Clone, Debug)]
pub enum ColumnArg {
    Path(String),
    Struct(Vec<String>),
}

impl From<&str> for ColumnArg {
    fn from(path: &str) -> ColumnArg {
        ColumnArg::Path(path.to_string())
    }
}

impl From<String> for ColumnArg {
    fn from(path: String) -> ColumnArg {
        ColumnArg::Path(path)
    }
}

/// Bind record of one `read` invocation. Immutable after bind except for the
/// claimed-filter list appended during complex-filter pushdown.
#[derive(Debug)]
pub struct ReadBindData {
    pub filename: String,
    pub columns: Vec<ColumnSpec>,
    /// Minimum first dimension across the regular columns.
    pub num_rows: u64,
    pub claimed_filters: Vec<ClaimedFilter>,
}

/// Scan configuration. `vector_size` is the host engine's standard chunk
/// size; `workers` overrides the parallel helper's worker count.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    pub vector_size: usize,
    pub workers: Option<usize>,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            vector_size: VECTOR_SIZE,
            workers: None,
        }
    }
}

/// Derive the relation column name from a dataset path: the last
/// `/`-segment, or `"data"` when that is empty.
pub fn column_name_from_path(path: &str) -> String {
    let name = match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    };
    if name.is_empty() {
        "data".to_string()
    } else {
        name.to_string()
    }
}

fn open_dataset(file: &File, path: &str) -> Result<Dataset> {
    // Probe quietly; a missing dataset is surfaced as our own error.
    let _quiet = h5db_storage::suppressed();
    file.dataset(path)
}

/// Open the file, resolve every column argument, and infer the schema.
pub fn bind(filename: &str, args: &[ColumnArg]) -> Result<ReadBindData> {
    if args.is_empty() {
        return Err(Error::DomainError(
            "read requires at least one dataset path or rse() column spec".to_string(),
        ));
    }

    let _storage = h5db_storage::lock();
    let file = {
        let _quiet = h5db_storage::suppressed();
        File::open(filename)?
    };

    let mut columns = Vec::with_capacity(args.len());
    let mut min_rows = u64::MAX;
    let mut num_regular = 0usize;

    for arg in args {
        match arg {
            ColumnArg::Struct(fields) => {
                if fields.len() != 3 {
                    return Err(Error::DomainError(format!(
                        "rse() must produce a struct with 3 fields, got {}",
                        fields.len()
                    )));
                }
                if fields[0] != RSE_ENCODING {
                    return Err(Error::DomainError(format!(
                        "unknown encoding: {}",
                        fields[0]
                    )));
                }
                let run_starts_path = fields[1].clone();
                let values_path = fields[2].clone();

                let starts_ds = open_dataset(&file, &run_starts_path)?;
                let values_ds = open_dataset(&file, &values_path)?;
                let values_dtype = values_ds.dtype();
                let element_kind = ElementKind::from_datatype(&values_dtype)?;

                columns.push(ColumnSpec::Rse(RseColumnSpec {
                    column_name: column_name_from_path(&values_path),
                    run_starts_path,
                    values_path,
                    element_kind,
                    logical_type: LogicalType::Primitive(element_kind),
                    run_starts_dtype: starts_ds.dtype(),
                    values_dtype,
                }));
            }
            ColumnArg::Path(path) => {
                let dataset = open_dataset(&file, path)?;
                let dtype = dataset.dtype();
                let space = dataset.space();
                let rank = space.rank();
                if rank == 0 {
                    return Err(Error::UnsupportedType(format!(
                        "dataset {} has no dimensions",
                        path
                    )));
                }
                if rank > 4 {
                    return Err(Error::UnsupportedType(
                        "datasets with more than 4 dimensions are not supported".to_string(),
                    ));
                }
                let is_string = dtype.is_string();
                if is_string && rank > 1 {
                    return Err(Error::UnsupportedType(format!(
                        "string dataset {} must be one-dimensional",
                        path
                    )));
                }
                let dims = space.dims().to_vec();
                min_rows = min_rows.min(dims[0]);
                num_regular += 1;

                let element_kind = ElementKind::from_datatype(&dtype)?;
                let mut element_size = dtype.size().max(1);
                for &d in &dims[1..] {
                    element_size *= d as usize;
                }

                columns.push(ColumnSpec::Regular(RegularColumnSpec {
                    column_name: column_name_from_path(path),
                    path: path.clone(),
                    element_kind,
                    logical_type: LogicalType::from_dims(element_kind, &dims),
                    dtype,
                    rank,
                    dims,
                    element_size,
                    is_string,
                }));
            }
        }
    }

    if num_regular == 0 {
        return Err(Error::DomainError(
            "read requires at least one regular (non-RSE) dataset to determine row count"
                .to_string(),
        ));
    }

    let bind_data = ReadBindData {
        filename: filename.to_string(),
        columns,
        num_rows: min_rows,
        claimed_filters: Vec::new(),
    };
    debug!(
        filename,
        columns = bind_data.columns.len(),
        num_rows = bind_data.num_rows,
        "read bound"
    );
    Ok(bind_data)
}

/// Full (unprojected) output schema of the bound relation.
pub fn schema(bind: &ReadBindData) -> SchemaRef {
    Arc::new(Schema::new(
        bind.columns
            .iter()
            .map(|col| Field::new(col.name(), col.logical_type().to_arrow(), true))
            .collect::<Vec<_>>(),
    ))
}

/// Exact cardinality reported to the optimizer.
pub fn cardinality(bind: &ReadBindData) -> u64 {
    bind.num_rows
}

fn read_typed_values<T: NumericElement + TypedSlice>(dataset: &Dataset) -> Result<TypedValues> {
    Ok(T::from_vec(dataset.read_all::<T>()?))
}

/// Open per-scan handles, load RSE state, allocate prefetch buffers, and run
/// the range planner once.
///
/// `column_ids` is the projection: bind-time column indices in output order.
/// `None` scans every bound column.
pub fn init(
    bind: &ReadBindData,
    column_ids: Option<&[usize]>,
    options: &ReadOptions,
) -> Result<TableScanState> {
    let columns_to_scan: Vec<usize> = match column_ids {
        Some(ids) => ids.to_vec(),
        None => (0..bind.columns.len()).collect(),
    };

    let _storage = h5db_storage::lock();
    let file = {
        let _quiet = h5db_storage::suppressed();
        File::open(&bind.filename)?
    };

    let mut column_states = Vec::with_capacity(columns_to_scan.len());
    for &global in &columns_to_scan {
        let spec = bind.columns.get(global).ok_or_else(|| {
            Error::Internal(format!("projected column {} out of range", global))
        })?;
        match spec {
            ColumnSpec::Regular(spec) => {
                let dataset = open_dataset(&file, &spec.path)?;
                let file_space = dataset.space();
                let cacheable = spec.rank == 1 && !spec.is_string;
                let cache = if cacheable {
                    let chunk_size = resolve_chunk_size(
                        dataset.chunk_dims(),
                        spec.element_size,
                        options.vector_size as u64,
                    );
                    debug!(path = %spec.path, chunk_size, "prefetch cache enabled");
                    Some(ChunkCache::new(spec.element_kind, chunk_size))
                } else {
                    None
                };
                column_states.push(ColumnState::Regular(RegularColumnState {
                    dataset,
                    file_space: Mutex::new(file_space),
                    cache,
                }));
            }
            ColumnSpec::Rse(spec) => {
                let starts_ds = open_dataset(&file, &spec.run_starts_path)?;
                let values_ds = open_dataset(&file, &spec.values_path)?;
                if starts_ds.dtype().class() != TypeClass::Integer {
                    return Err(Error::UnsupportedType(format!(
                        "RSE run_starts {} must be an integer dataset",
                        spec.run_starts_path
                    )));
                }
                if starts_ds.space().rank() != 1 || values_ds.space().rank() != 1 {
                    return Err(Error::UnsupportedType(format!(
                        "RSE arrays {} and {} must be one-dimensional",
                        spec.run_starts_path, spec.values_path
                    )));
                }
                // Storage converts the stored integer kind to u64 on read.
                let run_starts: Vec<u64> = starts_ds.read_all()?;
                validate_rse(&run_starts, values_ds.num_points() as usize, bind.num_rows)?;
                let values = match spec.element_kind {
                    ElementKind::Utf8 => TypedValues::Utf8(values_ds.read_strings_all()?),
                    kind => h5db_scan::dispatch_numeric!(kind, read_typed_values(&values_ds))?,
                };
                column_states.push(ColumnState::Rse(RseColumnState { run_starts, values }));
            }
        }
    }

    let global_to_local: FxHashMap<usize, usize> = columns_to_scan
        .iter()
        .enumerate()
        .map(|(local, &global)| (global, local))
        .collect();
    let ranges = plan_valid_ranges(
        &bind.columns,
        &bind.claimed_filters,
        bind.num_rows,
        |global| {
            let local = *global_to_local.get(&global).ok_or_else(|| {
                Error::Internal(format!(
                    "column index {} not in projection - this is a bug",
                    global
                ))
            })?;
            match &column_states[local] {
                ColumnState::Rse(state) => Ok(state),
                ColumnState::Regular(_) => Err(Error::Internal(format!(
                    "claimed filter targets non-RSE column {}",
                    global
                ))),
            }
        },
    )?;
    debug!(ranges = ranges.len(), "valid row ranges planned");

    let driver = ScanDriver::new(ranges, bind.num_rows, options.vector_size as u64);
    Ok(TableScanState::new(file, column_states, columns_to_scan, driver))
}

/// Produce the next output chunk, or `None` once the scan is exhausted.
pub fn scan_chunk(bind: &ReadBindData, state: &TableScanState) -> Result<Option<DataChunk>> {
    Ok(scan_chunk_at(bind, state)?.map(|(_, chunk)| chunk))
}

pub(crate) fn scan_chunk_at(
    bind: &ReadBindData,
    state: &TableScanState,
) -> Result<Option<(Slice, DataChunk)>> {
    let Some(slice) = state.driver().next_slice() else {
        return Ok(None);
    };
    let chunk = materialize_slice(&bind.columns, bind.num_rows, state, slice)?;
    state.driver().complete(slice);
    Ok(Some((slice, chunk)))
}

/// A bound and initialized `read` invocation.
#[derive(Debug)]
pub struct ReadScan {
    bind: ReadBindData,
    state: TableScanState,
    workers: Option<usize>,
}

impl ReadScan {
    /// Bind and initialize in one step, scanning every column.
    pub fn open(filename: &str, args: &[ColumnArg]) -> Result<ReadScan> {
        let bind_data = bind(filename, args)?;
        ReadScan::new(bind_data, None, ReadOptions::default())
    }

    /// Initialize a previously bound (and possibly filter-claimed) scan.
    pub fn new(
        bind: ReadBindData,
        column_ids: Option<Vec<usize>>,
        options: ReadOptions,
    ) -> Result<ReadScan> {
        let state = init(&bind, column_ids.as_deref(), &options)?;
        Ok(ReadScan {
            bind,
            state,
            workers: options.workers,
        })
    }

    pub fn bind_data(&self) -> &ReadBindData {
        &self.bind
    }

    pub fn state(&self) -> &TableScanState {
        &self.state
    }

    pub fn phase(&self) -> ScanPhase {
        self.state.driver().phase()
    }

    /// Schema of the projected output.
    pub fn schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.state
                .columns_to_scan()
                .iter()
                .map(|&global| {
                    let col = &self.bind.columns[global];
                    Field::new(col.name(), col.logical_type().to_arrow(), true)
                })
                .collect::<Vec<_>>(),
        ))
    }

    /// Pull the next chunk. Callable from multiple workers concurrently.
    pub fn next_chunk(&self) -> Result<Option<DataChunk>> {
        scan_chunk(&self.bind, &self.state)
    }

    /// Drain the scan sequentially.
    pub fn collect_chunks(&self) -> Result<Vec<DataChunk>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Drain the scan with `workers` parallel pullers, returning chunks in
    /// slice order. Worker count defaults to the option override, then to
    /// rayon's thread count ("use all available threads").
    pub fn collect_parallel(&self, workers: Option<usize>) -> Result<Vec<DataChunk>> {
        let workers = workers
            .or(self.workers)
            .unwrap_or_else(rayon::current_num_threads)
            .max(1);

        let results: Mutex<Vec<(u64, DataChunk)>> = Mutex::new(Vec::new());
        let failure: Mutex<Option<Error>> = Mutex::new(None);
        rayon::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    loop {
                        if failure.lock().is_some() {
                            break;
                        }
                        match scan_chunk_at(&self.bind, &self.state) {
                            Ok(Some((slice, chunk))) => {
                                results.lock().push((slice.position, chunk));
                            }
                            Ok(None) => break,
                            Err(err) => {
                                *failure.lock() = Some(err);
                                break;
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = failure.into_inner() {
            return Err(err);
        }
        let mut chunks = results.into_inner();
        chunks.sort_by_key(|(position, _)| *position);
        Ok(chunks.into_iter().map(|(_, chunk)| chunk).collect())
    }
}
