//! Canned container files mirroring the scenarios the scan is tested
//! against.

use h5db_result::Result;
use h5db_storage::FileBuilder;
use std::path::Path;

/// `/x = [10, 20, 30, 40, 50]` (int32) plus an RSE pair
/// `/rs = [0, 2]` (int32), `/vs = ["a", "b"]`.
pub fn mixed_columns_file(path: &Path) -> Result<()> {
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/x", &[5], &[10, 20, 30, 40, 50])?
        .dataset::<i32>("/rs", &[2], &[0, 2])?
        .string_dataset("/vs", &["a", "b"])?;
    b.write(path)
}

/// Twelve rows with an int32 RSE column: `/rs = [0, 3, 6, 9]`,
/// `/vs = [1, 5, 3, 7]`, and `/x = [0, 10, .., 110]`.
pub fn between_pushdown_file(path: &Path) -> Result<()> {
    let x: Vec<i32> = (0..12).map(|i| i * 10).collect();
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/x", &[12], &x)?
        .dataset::<i64>("/rs", &[4], &[0, 3, 6, 9])?
        .dataset::<i32>("/vs", &[4], &[1, 5, 3, 7])?;
    b.write(path)
}

/// `/img` of shape `(4, 2, 3)` int16 holding `0..24`.
pub fn multidim_file(path: &Path) -> Result<()> {
    let values: Vec<i16> = (0..24).collect();
    let mut b = FileBuilder::new();
    b.dataset::<i16>("/img", &[4, 2, 3], &values)?;
    b.write(path)
}

/// An RSE pair whose run starts violate the begins-with-zero invariant,
/// alongside a valid regular column of 10 rows.
pub fn invalid_rse_file(path: &Path) -> Result<()> {
    let x: Vec<i32> = (0..10).collect();
    let mut b = FileBuilder::new();
    b.dataset::<i32>("/x", &[10], &x)?
        .dataset::<i32>("/rs", &[2], &[1, 5])?
        .dataset::<i32>("/vs", &[2], &[7, 8])?;
    b.write(path)
}

/// A group and dataset tree with attributes, for `tree`/`attributes` tests.
pub fn attributed_tree_file(path: &Path) -> Result<()> {
    let mut b = FileBuilder::new();
    b.dataset::<f64>("/sensors/temps", &[6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?
        .dataset::<u8>("/sensors/flags", &[6], &[0, 1, 0, 1, 1, 0])?
        .group("/empty")?;
    b.attr_str("/sensors", "site", "north-ridge")?;
    b.attr::<i32>("/sensors/temps", "version", 3)?;
    b.attr::<f64>("/sensors/temps", "scale", 0.5)?;
    b.attr_array::<i64>("/sensors/temps", "window", &[5, 10, 20])?;
    b.write(path)
}
