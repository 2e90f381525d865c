use arrow::array::{
    Array, FixedSizeListArray, Float64Array, Int32Array, Int64Array, ListArray, StringArray,
    UInt64Array,
};
use h5db_result::Error;
use h5db_table::{TreeScan, attributes, tree};
use h5db_test_utils::fixtures;
use tempfile::TempDir;

#[test]
fn tree_lists_every_object_in_path_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tree.h5db");
    fixtures::attributed_tree_file(&path).unwrap();

    let mut scan = tree(path.to_str().unwrap()).unwrap();
    assert_eq!(scan.num_objects(), 4);
    let chunk = scan.next_chunk().unwrap();
    assert!(scan.next_chunk().is_none());
    assert_eq!(chunk.num_rows, 4);

    let schema = TreeScan::schema();
    assert_eq!(schema.field(0).name(), "path");
    assert_eq!(schema.field(3).name(), "shape");

    let paths = chunk.column(0).to_array().unwrap();
    let paths = paths.as_any().downcast_ref::<StringArray>().unwrap();
    let kinds = chunk.column(1).to_array().unwrap();
    let kinds = kinds.as_any().downcast_ref::<StringArray>().unwrap();
    let dtypes = chunk.column(2).to_array().unwrap();
    let dtypes = dtypes.as_any().downcast_ref::<StringArray>().unwrap();
    let shapes = chunk.column(3).to_array().unwrap();
    let shapes = shapes.as_any().downcast_ref::<ListArray>().unwrap();

    let rows: Vec<(&str, &str, &str)> = (0..4)
        .map(|i| (paths.value(i), kinds.value(i), dtypes.value(i)))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("/empty", "group", ""),
            ("/sensors", "group", ""),
            ("/sensors/flags", "dataset", "uint8"),
            ("/sensors/temps", "dataset", "float64"),
        ]
    );

    // Groups carry NULL shapes; datasets list their extents.
    assert!(shapes.is_null(0));
    assert!(shapes.is_null(1));
    for row in [2, 3] {
        assert!(!shapes.is_null(row));
        let dims = shapes.value(row);
        let dims = dims.as_any().downcast_ref::<UInt64Array>().unwrap();
        assert_eq!(dims.len(), 1);
        assert_eq!(dims.value(0), 6);
    }
}

#[test]
fn tree_fails_on_missing_files() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.h5db");
    assert!(matches!(
        tree(missing.to_str().unwrap()),
        Err(Error::OpenFailure(_))
    ));
}

#[test]
fn attributes_return_one_row_in_name_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("attrs.h5db");
    fixtures::attributed_tree_file(&path).unwrap();

    let mut scan = attributes(path.to_str().unwrap(), "/sensors/temps").unwrap();
    let schema = scan.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["scale", "version", "window"]);

    let chunk = scan.next_chunk().unwrap();
    assert!(scan.next_chunk().is_none());
    assert_eq!(chunk.num_rows, 1);

    let scale = chunk.column(0).to_array().unwrap();
    let scale = scale.as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(scale.value(0), 0.5);

    let version = chunk.column(1).to_array().unwrap();
    let version = version.as_any().downcast_ref::<Int32Array>().unwrap();
    assert_eq!(version.value(0), 3);

    let window = chunk.column(2).to_array().unwrap();
    let window = window.as_any().downcast_ref::<FixedSizeListArray>().unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window.value_length(), 3);
    let values = window
        .values()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(values.values().as_ref(), &[5i64, 10, 20]);
}

#[test]
fn string_attributes_read_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("attrs.h5db");
    fixtures::attributed_tree_file(&path).unwrap();

    let mut scan = attributes(path.to_str().unwrap(), "/sensors").unwrap();
    let schema = scan.schema();
    assert_eq!(schema.field(0).name(), "site");
    let chunk = scan.next_chunk().unwrap();
    let site = chunk.column(0).to_array().unwrap();
    let site = site.as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(site.value(0), "north-ridge");
}

#[test]
fn attribute_errors_surface_cleanly() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("attrs.h5db");
    fixtures::attributed_tree_file(&path).unwrap();
    let filename = path.to_str().unwrap();

    // No attributes on this group.
    let err = attributes(filename, "/empty").unwrap_err();
    assert!(matches!(&err, Error::DomainError(msg) if msg.contains("no attributes")));

    // Missing object.
    let err = attributes(filename, "/nope").unwrap_err();
    assert!(matches!(err, Error::OpenFailure(_)));
}
