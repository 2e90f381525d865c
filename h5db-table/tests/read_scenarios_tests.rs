use arrow::array::{Array, FixedSizeListArray, Int16Array, Int32Array, StringArray};
use arrow::datatypes::DataType;
use h5db_expr::{CompareOp, Expr};
use h5db_result::Error;
use h5db_scan::{RowRange, ScanPhase};
use h5db_storage::FileBuilder;
use h5db_table::{ReadOptions, ReadScan, bind, cardinality, pushdown_complex_filter, rse};
use h5db_test_utils::fixtures;
use tempfile::TempDir;

fn r(start: u64, end: u64) -> RowRange {
    RowRange {
        start_row: start,
        end_row: end,
    }
}

fn i32_rows(scan: &ReadScan, column: usize) -> Vec<i32> {
    let mut out = Vec::new();
    while let Some(chunk) = scan.next_chunk().unwrap() {
        let array = chunk.column(column).to_array().unwrap();
        let array = array.as_any().downcast_ref::<Int32Array>().unwrap();
        out.extend(array.values().iter().copied());
    }
    out
}

fn collect_i32_str(scan: &ReadScan) -> Vec<(i32, String)> {
    let mut out = Vec::new();
    while let Some(chunk) = scan.next_chunk().unwrap() {
        let xs = chunk.column(0).to_array().unwrap();
        let xs = xs.as_any().downcast_ref::<Int32Array>().unwrap();
        let vs = chunk.column(1).to_array().unwrap();
        let vs = vs.as_any().downcast_ref::<StringArray>().unwrap();
        for i in 0..chunk.num_rows {
            out.push((xs.value(i), vs.value(i).to_string()));
        }
    }
    out
}

#[test]
fn scenario_a_mixed_columns_no_filter() {
    h5db_test_utils::init_tracing_for_tests();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.h5db");
    fixtures::mixed_columns_file(&path).unwrap();

    let scan = ReadScan::open(
        path.to_str().unwrap(),
        &["/x".into(), rse("/rs", "/vs")],
    )
    .unwrap();

    let schema = scan.schema();
    assert_eq!(schema.field(0).name(), "x");
    assert_eq!(schema.field(1).name(), "vs");
    assert_eq!(cardinality(scan.bind_data()), 5);

    let rows = collect_i32_str(&scan);
    assert_eq!(
        rows,
        vec![
            (10, "a".to_string()),
            (20, "a".to_string()),
            (30, "b".to_string()),
            (40, "b".to_string()),
            (50, "b".to_string()),
        ]
    );
    assert_eq!(scan.phase(), ScanPhase::Done);
}

#[test]
fn scenario_b_equality_pushdown_on_rse() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.h5db");
    fixtures::mixed_columns_file(&path).unwrap();

    let mut bind_data = bind(
        path.to_str().unwrap(),
        &["/x".into(), rse("/rs", "/vs")],
    )
    .unwrap();

    // WHERE vs = 'b' over the projected plan columns [0, 1].
    let filter = Expr::compare(
        CompareOp::Equal,
        Expr::column(0, 1),
        Expr::constant("b"),
    );
    pushdown_complex_filter(&mut bind_data, 0, &[0, 1], &[filter]).unwrap();
    assert_eq!(bind_data.claimed_filters.len(), 1);

    let scan = ReadScan::new(bind_data, None, ReadOptions::default()).unwrap();
    assert_eq!(scan.state().driver().valid_ranges(), &[r(2, 5)]);

    let rows = collect_i32_str(&scan);
    assert_eq!(
        rows,
        vec![
            (30, "b".to_string()),
            (40, "b".to_string()),
            (50, "b".to_string()),
        ]
    );
}

#[test]
fn scenario_c_between_pushdown_on_rse() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("between.h5db");
    fixtures::between_pushdown_file(&path).unwrap();

    let mut bind_data = bind(
        path.to_str().unwrap(),
        &["/x".into(), rse("/rs", "/vs")],
    )
    .unwrap();

    // WHERE vs BETWEEN 2 AND 6.
    let filter = Expr::between(
        Expr::column(0, 1),
        Expr::constant(2i64),
        Expr::constant(6i64),
    );
    pushdown_complex_filter(&mut bind_data, 0, &[0, 1], &[filter]).unwrap();
    assert_eq!(bind_data.claimed_filters.len(), 2);

    let scan = ReadScan::new(bind_data, None, ReadOptions::default()).unwrap();
    // Adjacent satisfying runs coalesce.
    assert_eq!(scan.state().driver().valid_ranges(), &[r(3, 9)]);

    let xs = i32_rows(&scan, 0);
    assert_eq!(xs, vec![30, 40, 50, 60, 70, 80]);
}

#[test]
fn scenario_d_multidimensional_regular_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("multidim.h5db");
    fixtures::multidim_file(&path).unwrap();

    let scan = ReadScan::open(path.to_str().unwrap(), &["/img".into()]).unwrap();
    let schema = scan.schema();
    // ARRAY(ARRAY(INT16, 3), 2)
    match schema.field(0).data_type() {
        DataType::FixedSizeList(outer_field, 2) => match outer_field.data_type() {
            DataType::FixedSizeList(inner_field, 3) => {
                assert_eq!(inner_field.data_type(), &DataType::Int16);
            }
            other => panic!("unexpected inner type: {:?}", other),
        },
        other => panic!("unexpected column type: {:?}", other),
    }

    let chunks = scan.collect_chunks().unwrap();
    assert_eq!(chunks.len(), 1);
    let array = chunks[0].column(0).to_array().unwrap();
    let outer = array.as_any().downcast_ref::<FixedSizeListArray>().unwrap();
    assert_eq!(outer.len(), 4);
    assert_eq!(outer.value_length(), 2);
    let inner = outer
        .values()
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .unwrap();
    assert_eq!(inner.value_length(), 3);
    // The innermost child receives one contiguous read of 24 elements.
    let prims = inner.values().as_any().downcast_ref::<Int16Array>().unwrap();
    let expected: Vec<i16> = (0..24).collect();
    assert_eq!(prims.values().as_ref(), &expected[..]);
}

#[test]
fn scenario_f_invariant_violation_fails_at_init() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("invalid.h5db");
    fixtures::invalid_rse_file(&path).unwrap();

    let err = ReadScan::open(
        path.to_str().unwrap(),
        &["/x".into(), rse("/rs", "/vs")],
    )
    .unwrap_err();
    assert!(matches!(
        &err,
        Error::InvariantViolation(msg) if msg.contains("must begin with 0")
    ));
}

#[test]
fn zero_row_tables_yield_no_chunks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.h5db");
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/x", &[0], &[]).unwrap();
    b.write(&path).unwrap();

    let scan = ReadScan::open(path.to_str().unwrap(), &["/x".into()]).unwrap();
    assert_eq!(cardinality(scan.bind_data()), 0);
    let chunks = scan.collect_chunks().unwrap();
    assert!(chunks.is_empty());
    assert_eq!(scan.phase(), ScanPhase::Done);
}

#[test]
fn single_run_rse_emits_constant_vectors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("constant.h5db");
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/x", &[5], &[1, 2, 3, 4, 5])
        .unwrap()
        .dataset::<i32>("/rs", &[1], &[0])
        .unwrap()
        .string_dataset("/vs", &["z"])
        .unwrap()
        .dataset::<i64>("/nrs", &[1], &[0])
        .unwrap()
        .dataset::<f64>("/nvs", &[1], &[2.5])
        .unwrap();
    b.write(&path).unwrap();

    let scan = ReadScan::open(
        path.to_str().unwrap(),
        &["/x".into(), rse("/rs", "/vs"), rse("/nrs", "/nvs")],
    )
    .unwrap();
    let chunks = scan.collect_chunks().unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].column(1).is_constant());
    assert!(chunks[0].column(2).is_constant());

    let strings = chunks[0].column(1).to_array().unwrap();
    let strings = strings.as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(strings.len(), 5);
    for i in 0..5 {
        assert_eq!(strings.value(i), "z");
    }
}

#[test]
fn run_length_one_rse_still_produces_correct_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unit_runs.h5db");
    let rs: Vec<i32> = (0..6).collect();
    let vs: Vec<i32> = vec![4, 1, 4, 4, 2, 4];
    let x: Vec<i32> = (0..6).collect();
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/x", &[6], &x)
        .unwrap()
        .dataset::<i32>("/rs", &[6], &rs)
        .unwrap()
        .dataset::<i32>("/vs", &[6], &vs)
        .unwrap();
    b.write(&path).unwrap();

    let mut bind_data = bind(
        path.to_str().unwrap(),
        &["/x".into(), rse("/rs", "/vs")],
    )
    .unwrap();
    let filter = Expr::compare(CompareOp::Equal, Expr::column(0, 1), Expr::constant(4i32));
    pushdown_complex_filter(&mut bind_data, 0, &[0, 1], &[filter]).unwrap();

    let scan = ReadScan::new(bind_data, None, ReadOptions::default()).unwrap();
    // Planner degenerates to per-row checks.
    assert_eq!(
        scan.state().driver().valid_ranges(),
        &[r(0, 1), r(2, 4), r(5, 6)]
    );
    let xs = i32_rows(&scan, 0);
    assert_eq!(xs, vec![0, 2, 3, 5]);
}

#[test]
fn repeated_scans_return_identical_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.h5db");
    fixtures::mixed_columns_file(&path).unwrap();
    let args = ["/x".into(), rse("/rs", "/vs")];

    let first = collect_i32_str(&ReadScan::open(path.to_str().unwrap(), &args).unwrap());
    let second = collect_i32_str(&ReadScan::open(path.to_str().unwrap(), &args).unwrap());
    assert_eq!(first, second);
}

#[test]
fn always_true_filters_change_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.h5db");
    fixtures::mixed_columns_file(&path).unwrap();
    let args = ["/x".into(), rse("/rs", "/vs")];

    let unfiltered = collect_i32_str(&ReadScan::open(path.to_str().unwrap(), &args).unwrap());

    let mut bind_data = bind(path.to_str().unwrap(), &args).unwrap();
    // vs >= "" holds for every run.
    let filter = Expr::compare(
        CompareOp::GreaterThanOrEqual,
        Expr::column(0, 1),
        Expr::constant(""),
    );
    pushdown_complex_filter(&mut bind_data, 0, &[0, 1], &[filter]).unwrap();
    let scan = ReadScan::new(bind_data, None, ReadOptions::default()).unwrap();
    assert_eq!(scan.state().driver().valid_ranges(), &[r(0, 5)]);
    assert_eq!(collect_i32_str(&scan), unfiltered);
}

#[test]
fn projection_returns_the_same_column_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.h5db");
    fixtures::mixed_columns_file(&path).unwrap();
    let args = ["/x".into(), rse("/rs", "/vs")];

    let full = ReadScan::open(path.to_str().unwrap(), &args).unwrap();
    let full_rows = collect_i32_str(&full);

    let bind_data = bind(path.to_str().unwrap(), &args).unwrap();
    let projected =
        ReadScan::new(bind_data, Some(vec![1]), ReadOptions::default()).unwrap();
    assert_eq!(projected.schema().fields().len(), 1);
    assert_eq!(projected.schema().field(0).name(), "vs");

    let mut values = Vec::new();
    while let Some(chunk) = projected.next_chunk().unwrap() {
        assert_eq!(chunk.columns.len(), 1);
        let vs = chunk.column(0).to_array().unwrap();
        let vs = vs.as_any().downcast_ref::<StringArray>().unwrap();
        for i in 0..chunk.num_rows {
            values.push(vs.value(i).to_string());
        }
    }
    let expected: Vec<String> = full_rows.into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, expected);
}

#[test]
fn bind_rejects_malformed_arguments() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.h5db");
    fixtures::mixed_columns_file(&path).unwrap();
    let filename = path.to_str().unwrap();

    // No columns at all.
    assert!(matches!(bind(filename, &[]), Err(Error::DomainError(_))));

    // Unknown encoding tag.
    let arg = h5db_table::ColumnArg::Struct(vec![
        "rle".to_string(),
        "/rs".to_string(),
        "/vs".to_string(),
    ]);
    let err = bind(filename, &["/x".into(), arg]).unwrap_err();
    assert!(matches!(&err, Error::DomainError(msg) if msg.contains("unknown encoding")));

    // Wrong field count.
    let arg = h5db_table::ColumnArg::Struct(vec!["rse".to_string(), "/rs".to_string()]);
    let err = bind(filename, &["/x".into(), arg]).unwrap_err();
    assert!(matches!(&err, Error::DomainError(msg) if msg.contains("3 fields")));

    // RSE only: no regular column to define the row count.
    let err = bind(filename, &[rse("/rs", "/vs")]).unwrap_err();
    assert!(matches!(&err, Error::DomainError(msg) if msg.contains("at least one regular")));

    // Missing dataset.
    let err = bind(filename, &["/nope".into()]).unwrap_err();
    assert!(matches!(err, Error::OpenFailure(_)));
}

#[test]
fn rank_four_is_supported_and_rank_five_is_not() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ranks.h5db");
    let r4: Vec<i32> = (0..16).collect();
    let r5: Vec<i32> = (0..32).collect();
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/r4", &[2, 2, 2, 2], &r4)
        .unwrap()
        .dataset::<i32>("/r5", &[2, 2, 2, 2, 2], &r5)
        .unwrap();
    b.write(&path).unwrap();
    let filename = path.to_str().unwrap();

    let scan = ReadScan::open(filename, &["/r4".into()]).unwrap();
    // ARRAY(ARRAY(ARRAY(INT32, 2), 2), 2) over 2 rows.
    let mut ty = scan.schema().field(0).data_type().clone();
    for _ in 0..3 {
        match ty {
            arrow::datatypes::DataType::FixedSizeList(field, 2) => {
                ty = field.data_type().clone();
            }
            other => panic!("unexpected nesting: {:?}", other),
        }
    }
    assert_eq!(ty, arrow::datatypes::DataType::Int32);

    let chunks = scan.collect_chunks().unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].num_rows, 2);

    let err = ReadScan::open(filename, &["/r5".into()]).unwrap_err();
    assert!(matches!(
        &err,
        Error::UnsupportedType(msg) if msg.contains("more than 4 dimensions")
    ));
}

#[test]
fn num_rows_is_the_minimum_regular_first_dimension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("minrows.h5db");
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/long", &[8], &[0, 1, 2, 3, 4, 5, 6, 7])
        .unwrap()
        .dataset::<i32>("/short", &[3], &[10, 11, 12])
        .unwrap();
    b.write(&path).unwrap();

    let scan = ReadScan::open(path.to_str().unwrap(), &["/long".into(), "/short".into()])
        .unwrap();
    assert_eq!(cardinality(scan.bind_data()), 3);
    let chunks = scan.collect_chunks().unwrap();
    let total: usize = chunks.iter().map(|c| c.num_rows).sum();
    assert_eq!(total, 3);
}
