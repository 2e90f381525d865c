use arrow::array::{Float64Array, Int32Array, Int64Array, StringArray};
use h5db_expr::{CompareOp, Expr};
use h5db_scan::DataChunk;
use h5db_storage::FileBuilder;
use h5db_table::{ReadOptions, ReadScan, bind, pushdown_complex_filter, rse};
use h5db_test_utils::fixtures;
use rand::Rng;
use tempfile::TempDir;

fn rows_i32_str(chunks: &[DataChunk]) -> Vec<(i32, String)> {
    let mut out = Vec::new();
    for chunk in chunks {
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
fn scenario_e_parallel_scan_matches_sequential() {
    h5db_test_utils::init_tracing_for_tests();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.h5db");
    fixtures::mixed_columns_file(&path).unwrap();
    let args = ["/x".into(), rse("/rs", "/vs")];

    let sequential = ReadScan::open(path.to_str().unwrap(), &args).unwrap();
    let expected = rows_i32_str(&sequential.collect_chunks().unwrap());

    for workers in [1usize, 8] {
        let scan = ReadScan::open(path.to_str().unwrap(), &args).unwrap();
        let chunks = scan.collect_parallel(Some(workers)).unwrap();
        assert_eq!(rows_i32_str(&chunks), expected, "workers = {}", workers);
    }
}

#[test]
fn parallel_scan_through_the_prefetch_cache_is_exact() {
    const NUM_ROWS: usize = 50_000;
    const RUN: usize = 7;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.h5db");

    let a: Vec<i64> = (0..NUM_ROWS as i64).collect();
    let b_col: Vec<f64> = (0..NUM_ROWS).map(|i| i as f64 * 0.5).collect();
    let num_runs = NUM_ROWS.div_ceil(RUN);
    let rs: Vec<i64> = (0..num_runs).map(|i| (i * RUN) as i64).collect();
    let vs: Vec<i32> = (0..num_runs as i32).collect();

    let mut builder = FileBuilder::new();
    builder
        // A tiny declared chunk extent exercises the clamp to vector size.
        .chunked_dataset::<i64>("/a", &[NUM_ROWS as u64], 512, &a)
        .unwrap()
        .dataset::<f64>("/b", &[NUM_ROWS as u64], &b_col)
        .unwrap()
        .dataset::<i64>("/rs", &[num_runs as u64], &rs)
        .unwrap()
        .dataset::<i32>("/vs", &[num_runs as u64], &vs)
        .unwrap();
    builder.write(&path).unwrap();

    let args = ["/a".into(), "/b".into(), rse("/rs", "/vs")];
    let mut bind_data = bind(path.to_str().unwrap(), &args).unwrap();

    // WHERE vs BETWEEN 100 AND 5000 prunes to run range [700, 35007).
    let filter = Expr::between(
        Expr::column(0, 2),
        Expr::constant(100i32),
        Expr::constant(5000i32),
    );
    pushdown_complex_filter(&mut bind_data, 0, &[0, 1, 2], &[filter]).unwrap();

    let options = ReadOptions {
        vector_size: 256,
        workers: None,
    };
    let scan = ReadScan::new(bind_data, None, options).unwrap();
    let chunks = scan.collect_parallel(Some(8)).unwrap();

    let expected_rows: Vec<usize> = (0..NUM_ROWS)
        .filter(|&i| {
            let run = i / RUN;
            (100..=5000).contains(&run)
        })
        .collect();

    let mut produced = 0usize;
    let mut cursor = 0usize;
    for chunk in &chunks {
        let a_col = chunk.column(0).to_array().unwrap();
        let a_col = a_col.as_any().downcast_ref::<Int64Array>().unwrap();
        let b_out = chunk.column(1).to_array().unwrap();
        let b_out = b_out.as_any().downcast_ref::<Float64Array>().unwrap();
        let v_out = chunk.column(2).to_array().unwrap();
        let v_out = v_out.as_any().downcast_ref::<Int32Array>().unwrap();
        for i in 0..chunk.num_rows {
            let row = expected_rows[cursor];
            assert_eq!(a_col.value(i), row as i64);
            assert_eq!(b_out.value(i), row as f64 * 0.5);
            assert_eq!(v_out.value(i), (row / RUN) as i32);
            cursor += 1;
            produced += 1;
        }
    }
    assert_eq!(produced, expected_rows.len());
}

#[test]
fn randomized_rse_pushdown_matches_naive_expansion() {
    let mut rng = rand::rng();

    for _ in 0..10 {
        let num_rows: usize = rng.random_range(50..400);
        // Random ascending run starts beginning at 0.
        let mut rs: Vec<i64> = vec![0];
        while let Some(&last) = rs.last() {
            let next = last + rng.random_range(1..20);
            if next >= num_rows as i64 {
                break;
            }
            rs.push(next);
        }
        let vs: Vec<i32> = (0..rs.len()).map(|_| rng.random_range(0..5)).collect();
        let x: Vec<i32> = (0..num_rows as i32).collect();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("random.h5db");
        let mut builder = FileBuilder::new();
        builder
            .dataset::<i32>("/x", &[num_rows as u64], &x)
            .unwrap()
            .dataset::<i64>("/rs", &[rs.len() as u64], &rs)
            .unwrap()
            .dataset::<i32>("/vs", &[vs.len() as u64], &vs)
            .unwrap();
        builder.write(&path).unwrap();

        let target: i32 = rng.random_range(0..5);
        let args = ["/x".into(), rse("/rs", "/vs")];
        let mut bind_data = bind(path.to_str().unwrap(), &args).unwrap();
        let filter = Expr::compare(
            CompareOp::Equal,
            Expr::column(0, 1),
            Expr::constant(target),
        );
        pushdown_complex_filter(&mut bind_data, 0, &[0, 1], &[filter]).unwrap();

        let options = ReadOptions {
            vector_size: 32,
            workers: None,
        };
        let scan = ReadScan::new(bind_data, None, options).unwrap();
        let chunks = scan.collect_parallel(Some(4)).unwrap();

        // Naive expansion: row i belongs to run max{k : rs[k] <= i}.
        let expected: Vec<i32> = (0..num_rows as i64)
            .filter(|&i| {
                let run = rs.partition_point(|&s| s <= i) - 1;
                vs[run] == target
            })
            .map(|i| i as i32)
            .collect();

        let mut produced = Vec::new();
        for chunk in &chunks {
            let xs = chunk.column(0).to_array().unwrap();
            let xs = xs.as_any().downcast_ref::<Int32Array>().unwrap();
            for i in 0..chunk.num_rows {
                produced.push(xs.value(i));
            }
        }
        assert_eq!(produced, expected);
    }
}
