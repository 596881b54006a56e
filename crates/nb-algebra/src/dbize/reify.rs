//! Rebuild structured values from flattened result rows

use crate::error::{AlgebraError, AlgebraResult};
use crate::galaxy::db_type_data;
use crate::ir::schema::Schema;
use nb_core::{Type, Value};

/// Number of flattened columns one value of `ty` occupies
pub fn flat_width(ty: &Type) -> usize {
    if let Some(data) = db_type_data(ty) {
        return data.schema.len();
    }
    match ty.non_null() {
        Type::Product(components) => components.iter().map(flat_width).sum(),
        _ => 1,
    }
}

/// Convert a flat row into one value per logical column of `schema`
pub fn reify_row(row: &[Value], schema: &Schema) -> AlgebraResult<Vec<Value>> {
    let expected: usize = schema.columns.iter().map(|c| flat_width(&c.ty)).sum();
    if row.len() != expected {
        return Err(AlgebraError::RowShapeMismatch {
            expected,
            actual: row.len(),
        });
    }
    let mut rest = row;
    schema
        .columns
        .iter()
        .map(|c| take(&c.ty, &mut rest))
        .collect()
}

/// Like [`reify_row`], pairing each value with its column name
pub fn reify_record(row: &[Value], schema: &Schema) -> AlgebraResult<Vec<(String, Value)>> {
    let values = reify_row(row, schema)?;
    Ok(schema
        .columns
        .iter()
        .map(|c| c.name.clone())
        .zip(values)
        .collect())
}

fn take(ty: &Type, rest: &mut &[Value]) -> AlgebraResult<Value> {
    let width = flat_width(ty);
    let (head, tail) = rest.split_at(width);
    *rest = tail;

    if let Some(data) = db_type_data(ty) {
        // an absent nullable value comes back as all-NULL columns
        if matches!(ty, Type::Nullable(_)) && head.iter().all(Value::is_null) {
            return Ok(Value::Null);
        }
        return (data.reifier)(head);
    }
    match ty.non_null() {
        Type::Product(components) => {
            let mut inner = head;
            let items = components
                .iter()
                .map(|c| take(c, &mut inner))
                .collect::<AlgebraResult<Vec<_>>>()?;
            Ok(Value::Tuple(items))
        }
        _ => Ok(head[0].clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use nb_core::builtins;

    fn people() -> Schema {
        Schema::from_pairs([("id", builtins::integer()), ("p", person_type())])
    }

    #[test]
    fn test_reify_galaxy_column() {
        let row = vec![Value::Integer(7), Value::from("Ada"), Value::from("Lovelace")];
        let values = reify_row(&row, &people()).unwrap();
        assert_eq!(values[0], Value::Integer(7));
        assert_eq!(values[1], person("Ada", "Lovelace"));
    }

    #[test]
    fn test_reify_record_names() {
        let row = vec![Value::Integer(7), Value::from("Ada"), Value::from("Lovelace")];
        let record = reify_record(&row, &people()).unwrap();
        assert_eq!(record[0].0, "id");
        assert_eq!(record[1], ("p".to_string(), person("Ada", "Lovelace")));
    }

    #[test]
    fn test_reify_wrong_width() {
        let short = vec![Value::Integer(7), Value::from("Ada")];
        let err = reify_row(&short, &people()).unwrap_err();
        assert!(matches!(
            err,
            AlgebraError::RowShapeMismatch {
                expected: 3,
                actual: 2
            }
        ));

        let long = vec![Value::Null; 4];
        assert!(reify_row(&long, &people()).is_err());
    }

    #[test]
    fn test_reify_product_column() {
        let schema = Schema::single(
            "pair",
            Type::product(vec![builtins::integer(), builtins::string()]),
        );
        let values = reify_row(&[Value::Integer(1), Value::from("x")], &schema).unwrap();
        assert_eq!(
            values,
            vec![Value::Tuple(vec![Value::Integer(1), Value::from("x")])]
        );
    }

    #[test]
    fn test_reify_absent_nullable_galaxy_value() {
        let schema = Schema::single("p", Type::nullable(person_type()));
        let values = reify_row(&[Value::Null, Value::Null], &schema).unwrap();
        assert_eq!(values, vec![Value::Null]);
    }
}
