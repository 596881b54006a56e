use super::*;
use crate::builtins::{boolean, float, integer, string};
use serde_json::json;

fn roundtrip_type(ty: &Type) -> Type {
    datum_to_type(&type_to_datum(ty), &BuiltinTypes).unwrap()
}

#[test]
fn test_type_datum_roundtrip() {
    let types = vec![
        integer(),
        Type::nullable(string()),
        Type::product(vec![integer(), Type::nullable(float())]),
        Type::set(Type::product(vec![boolean(), Type::bounded_string(12)])),
        Type::nullable(Type::set(Type::set(integer()))),
        Type::product(vec![]),
    ];
    for ty in &types {
        assert_eq!(&roundtrip_type(ty), ty, "roundtrip of {ty}");
    }
}

#[test]
fn test_type_datum_form() {
    let ty = Type::product(vec![integer(), Type::nullable(string())]);
    assert_eq!(
        type_to_datum(&ty),
        json!(["product", ["integer", ["nullable", "string"]]])
    );
    assert_eq!(
        type_to_datum(&Type::bounded_string(5)),
        json!(["bounded-string", 5])
    );
}

#[test]
fn test_unknown_type_name() {
    let err = datum_to_type(&json!(["set", "money"]), &BuiltinTypes).unwrap_err();
    assert!(matches!(err, CoreError::UnknownType { ref name } if name == "money"));
}

#[test]
fn test_custom_resolver() {
    let mut types = HashMap::new();
    types.insert("num".to_string(), integer());
    let ty = datum_to_type(&json!(["nullable", "num"]), &types).unwrap();
    assert_eq!(ty, Type::nullable(integer()));
}

#[test]
fn test_malformed_type_datum() {
    assert!(matches!(
        datum_to_type(&json!(["nullable"]), &BuiltinTypes),
        Err(CoreError::MalformedDatum { .. })
    ));
    assert!(matches!(
        datum_to_type(&json!(42), &BuiltinTypes),
        Err(CoreError::MalformedDatum { .. })
    ));
    assert!(matches!(
        datum_to_type(&json!(["record", "integer"]), &BuiltinTypes),
        Err(CoreError::MalformedDatum { .. })
    ));
}

#[test]
fn test_const_datum_roundtrip() {
    let cases = vec![
        (integer(), Value::Integer(-4)),
        (float(), Value::Float(2.5)),
        (string(), Value::from("hello")),
        (boolean(), Value::Boolean(true)),
        (Type::nullable(integer()), Value::Null),
        (Type::nullable(integer()), Value::Integer(9)),
        (
            Type::product(vec![integer(), string()]),
            Value::Tuple(vec![Value::Integer(1), "x".into()]),
        ),
        (
            Type::set(Type::nullable(boolean())),
            Value::Set(vec![Value::Null, false.into()]),
        ),
        (Type::bounded_string(4), Value::from("abcd")),
    ];
    for (ty, value) in &cases {
        assert!(ty.is_member(value));
        let datum = const_to_datum(ty, value).unwrap();
        assert_eq!(&datum_to_const(ty, &datum).unwrap(), value, "roundtrip of {value}");
    }
}

#[test]
fn test_const_product_arity_mismatch() {
    let pair = Type::product(vec![integer(), string()]);
    let err = const_to_datum(&pair, &Value::Tuple(vec![Value::Integer(1)])).unwrap_err();
    assert!(matches!(err, CoreError::InvalidValueForType { .. }));

    let err = datum_to_const(&pair, &json!([1, "a", true])).unwrap_err();
    assert!(matches!(err, CoreError::InvalidValueForType { .. }));
}

#[test]
fn test_const_base_type_mismatch() {
    let err = const_to_datum(&integer(), &Value::from("nope")).unwrap_err();
    assert!(matches!(err, CoreError::InvalidValueForType { .. }));

    let err = datum_to_const(&integer(), &json!("nope")).unwrap_err();
    assert!(matches!(err, CoreError::MalformedDatum { .. }));
}

#[test]
fn test_bounded_string_too_long() {
    let err = datum_to_const(&Type::bounded_string(2), &json!("abc")).unwrap_err();
    assert!(matches!(err, CoreError::InvalidValueForType { .. }));
}
