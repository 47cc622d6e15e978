use bitemporal_encoders::error::EncoderError;
use bitemporal_encoders::opaque::to_opaque;
use bitemporal_encoders::registry::{self, Registry};
use bitemporal_encoders::value::{Mapping, OBJ, Object};
use bitemporal_encoders::{DateMode, Decoder, Value, decode, encode};

fn registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register_type("shapes.Point", Some(&["x", "y"]));
    registry.register_function("scale", &["x", "factor"], |_, _, keywords| {
        match (keywords.get("x"), keywords.get("factor")) {
            (Some(Value::Int(x)), Some(Value::Int(f))) => Ok(Value::Int(x * f)),
            _ => Ok(Value::Null),
        }
    });
    registry
}

fn tag(value: Value) -> Value {
    Value::Str(to_opaque(&value).expect("opaque form"))
}

#[test]
fn stale_fields_are_dropped_for_types() {
    let registry = registry();
    let stored = Value::map([
        ("x", Value::Int(1)),
        ("y", Value::Int(2)),
        ("colour", Value::from("red")),
        (OBJ, tag(Value::Type("shapes.Point".to_string()))),
    ]);
    let decoded = Decoder::new(&registry).decode(stored).expect("decodes");
    assert_eq!(
        decoded,
        Value::Object(Object::new("shapes.Point", [("x", Value::Int(1)), ("y", Value::Int(2))]))
    );
}

#[test]
fn stale_fields_are_dropped_for_functions() {
    let registry = registry();
    let stored = Value::map([
        (OBJ, tag(Value::Function("scale".to_string()))),
        ("x", Value::Int(2)),
        ("factor", Value::Int(21)),
        ("unit", Value::from("m")),
    ]);
    assert_eq!(Decoder::new(&registry).decode(stored).expect("decodes"), Value::Int(42));
}

#[test]
fn unexpected_keywords_are_reported() {
    let registry = registry();
    let mut keywords = Mapping::new();
    keywords.insert("x".to_string(), Value::Int(1));
    keywords.insert("unit".to_string(), Value::from("m"));
    let result = registry.call_function("scale", &[], keywords);
    assert!(matches!(result, Err(EncoderError::UnexpectedKeyword { keyword, .. }) if keyword == "unit"));
}

#[test]
fn positional_arguments_bind_in_order() {
    let registry = registry();
    let result = registry.call_function("scale", &[Value::Int(3), Value::Int(5)], Mapping::new());
    assert_eq!(result.expect("calls"), Value::Int(15));
    let too_many = registry.call_function("scale", &[Value::Int(1), Value::Int(2), Value::Int(3)], Mapping::new());
    assert!(matches!(too_many, Err(EncoderError::InvalidArgument { .. })));
}

#[test]
fn missing_arguments_are_reported() {
    let registry = registry();
    let stored = Value::map([(OBJ, tag(Value::Function("array_from_bytes".to_string()))), ("data", Value::Bytes(vec![0; 8]))]);
    let result = Decoder::new(&registry).decode(stored);
    assert!(matches!(result, Err(EncoderError::MissingArgument { argument, .. }) if argument == "dtype"));
}

#[test]
fn dotted_names_resolve_by_their_tail() {
    let registry = registry();
    for legacy in ["old.module.Point", r#"{"py/type": "old.module.Point"}"#] {
        let stored = Value::map([
            ("x", Value::Int(0)),
            ("y", Value::Int(1)),
            (OBJ, Value::from(legacy)),
        ]);
        let decoded = Decoder::new(&registry).decode(stored).expect("decodes");
        let Value::Object(point) = decoded else { panic!("object expected for {legacy}") };
        assert_eq!(point.type_name, "shapes.Point");
        assert_eq!(point.get("y"), Some(&Value::Int(1)));
    }
}

#[test]
fn tail_lookup_can_be_turned_off() {
    let mut registry = registry();
    registry.set_legacy_lookup(false);
    let stored = Value::map([("x", Value::Int(0)), (OBJ, Value::from("old.module.Point"))]);
    let error = Decoder::new(&registry).decode(stored).expect_err("does not resolve");
    assert!(matches!(&error, EncoderError::Unresolved { identifier } if identifier == "old.module.Point"));
    assert!(error.to_string().contains("old.module.Point"));
}

#[test]
fn shared_tails_do_not_resolve() {
    let mut registry = registry();
    registry.register_type("other.Point", Some(&["x", "y"]));
    let stored = Value::map([("x", Value::Int(0)), (OBJ, Value::from("old.module.Point"))]);
    let error = Decoder::new(&registry).decode(stored).expect_err("ambiguous");
    assert!(matches!(&error, EncoderError::Unresolved { identifier } if identifier == "old.module.Point"));

    // an exact name still wins
    let stored = Value::map([("x", Value::Int(0)), ("y", Value::Int(1)), (OBJ, Value::from("other.Point"))]);
    let Value::Object(point) = Decoder::new(&registry).decode(stored).expect("decodes") else {
        panic!("object expected")
    };
    assert_eq!(point.type_name, "other.Point");
}

#[test]
fn types_win_over_functions_on_a_shared_tail() {
    let mut registry = registry();
    registry.register_function("geometry.Point", &["x", "y"], |_, _, _| Ok(Value::Null));
    let stored = Value::map([("x", Value::Int(0)), ("y", Value::Int(1)), (OBJ, Value::from("old.module.Point"))]);
    let Value::Object(point) = Decoder::new(&registry).decode(stored).expect("decodes") else {
        panic!("object expected")
    };
    assert_eq!(point.type_name, "shapes.Point");
}

#[test]
fn unknown_tags_name_the_identifier() {
    let registry = registry();
    let stored = Value::map([(OBJ, tag(Value::Type("Nowhere".to_string())))]);
    let error = Decoder::new(&registry).decode(stored).expect_err("does not resolve");
    assert_eq!(error.to_string(), "Unable to map \"Nowhere\" into a valid object");
}

#[test]
fn unregistered_types_do_not_decode() {
    let registry = Registry::with_builtins();
    let value = Value::Object(Object::new("Unknown", [("a", Value::Int(1))]));
    let encoded = bitemporal_encoders::Encoder::new(&registry).encode(&value).expect("encodes");
    assert!(Decoder::new(&registry).decode(encoded).is_err());
}

#[test]
fn custom_constructors_build_any_value() {
    let mut registry = registry();
    registry.register_type_with("Celsius", registry::Params::named(&["degrees"]), |_, keywords| {
        match keywords.get("degrees") {
            Some(Value::Float(c)) => Ok(Value::Float(c * 9.0 / 5.0 + 32.0)),
            _ => Ok(Value::Null),
        }
    });
    let stored = Value::map([(OBJ, tag(Value::Type("Celsius".to_string()))), ("degrees", Value::Float(100.0))]);
    assert_eq!(Decoder::new(&registry).decode(stored).expect("decodes"), Value::Float(212.0));
}

#[test]
fn hooks_need_a_registered_type() {
    let mut registry = registry();
    assert!(registry.set_encode_hook("Nowhere", |_| Ok(Value::Null)).is_err());
}

#[test]
fn global_registry_backs_the_free_functions() {
    registry::configure_global(|r| r.register_type("tests.GlobalPoint", Some(&["x"]))).expect("registers");
    let value = Value::Object(Object::new("tests.GlobalPoint", [("x", Value::Int(7))]));
    let encoded = encode(&value).expect("encodes");
    assert_eq!(decode(encoded, DateMode::Off).expect("decodes"), value);
}
