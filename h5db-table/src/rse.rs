//! Helper constructing run-start-encoded column specs.

use crate::read::ColumnArg;

/// Encoding tag carried in the first struct field.
pub const RSE_ENCODING: &str = "rse";

/// Pure value constructor for the 3-field column-spec struct
/// `{encoding, run_starts, values}` accepted by `read`.
pub fn rse(run_starts_path: &str, values_path: &str) -> ColumnArg {
    ColumnArg::Struct(vec![
        RSE_ENCODING.to_string(),
        run_starts_path.to_string(),
        values_path.to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rse_packs_the_three_fields_in_order() {
        match rse("/rs", "/vs") {
            ColumnArg::Struct(fields) => {
                assert_eq!(fields, vec!["rse".to_string(), "/rs".into(), "/vs".into()]);
            }
            other => panic!("unexpected arg: {:?}", other),
        }
    }
}
