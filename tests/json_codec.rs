use bitemporal_encoders::array::NdArray;
use bitemporal_encoders::{DateMode, Scalar, Table, Value, decode, dumps, loads};
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{ArrayD, IxDyn, arr0, arr1, arr2};

fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(h, m, s).unwrap()
}

#[test]
fn dates_are_tagged() {
    let value = Value::map([("when", Value::DateTime(at(1, 12, 30, 0)))]);
    let text = dumps(&value).expect("dumps");
    assert!(text.contains("datetime_from_iso"), "{text}");
    assert!(text.contains("2024-03-01T12:30:00"), "{text}");
    assert_eq!(loads(&text).expect("loads"), value);
}

#[test]
fn sub_second_precision_survives() {
    let t = at(2, 1, 2, 3) + chrono::Duration::nanoseconds(123_456_789);
    let value = Value::DateTime(t);
    assert_eq!(loads(&dumps(&value).expect("dumps")).expect("loads"), value);
}

#[test]
fn calendar_dates_come_back_as_midnight() {
    let value = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    let decoded = loads(&dumps(&value).expect("dumps")).expect("loads");
    assert_eq!(decoded, Value::DateTime(at(4, 0, 0, 0)));
}

#[test]
fn iso_text_is_read_as_a_date() {
    let decoded = loads(r#"{"a": "2024-03-05T06:07:08", "b": "not a date"}"#).expect("loads");
    assert_eq!(
        decoded,
        Value::map([("a", Value::DateTime(at(5, 6, 7, 8))), ("b", Value::from("not a date"))])
    );
}

#[test]
fn quoted_iso_text_is_read_as_a_date() {
    let decoded = decode(Value::from("\"2024-03-05T06:07:08\""), DateMode::Iso).expect("decodes");
    assert_eq!(decoded, Value::DateTime(at(5, 6, 7, 8)));
}

#[test]
fn custom_date_matcher() {
    let mode = DateMode::Matching(regex::Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
    let decoded = decode(Value::from("2024-03-06"), mode.clone()).expect("decodes");
    assert_eq!(decoded, Value::DateTime(at(6, 0, 0, 0)));
    let untouched = decode(Value::from("06/03/2024"), mode).expect("decodes");
    assert_eq!(untouched, Value::from("06/03/2024"));
    let off = decode(Value::from("2024-03-06T00:00:00"), DateMode::Off).expect("decodes");
    assert_eq!(off, Value::from("2024-03-06T00:00:00"));
}

#[test]
fn small_arrays_are_nested_lists() {
    let array = Value::Array(NdArray::Float64(arr2(&[[1.0, 2.0], [3.0, 4.5]]).into_dyn()));
    let text = dumps(&array).expect("dumps");
    assert!(text.contains("[[1.0,2.0],[3.0,4.5]]"), "{text}");
    assert!(text.contains("array_from_nested"), "{text}");
    assert_eq!(loads(&text).expect("loads"), array);
}

#[test]
fn element_type_survives_nesting() {
    let array = Value::Array(NdArray::Int32(arr1(&[1i32, 2, 3]).into_dyn()));
    assert_eq!(loads(&dumps(&array).expect("dumps")).expect("loads"), array);
    let floats = Value::Array(NdArray::Float64(arr1(&[1.0, 2.0]).into_dyn()));
    assert_eq!(loads(&dumps(&floats).expect("dumps")).expect("loads"), floats);
}

#[test]
fn rank_zero_arrays_are_bare_scalars() {
    let array = Value::Array(NdArray::Float64(arr0(2.5).into_dyn()));
    let text = dumps(&array).expect("dumps");
    assert_eq!(text, "2.5");
    assert_eq!(loads(&text).expect("loads"), Value::Float(2.5));
}

#[test]
fn rank_three_arrays_are_nested_lists() {
    let data: Vec<i64> = (0..24).collect();
    let array = Value::Array(NdArray::Int64(
        ArrayD::from_shape_vec(IxDyn(&[2, 3, 4]), data).unwrap(),
    ));
    let text = dumps(&array).expect("dumps");
    assert!(text.contains("array_from_nested"), "{text}");
    assert_eq!(loads(&text).expect("loads"), array);
}

#[test]
fn empty_dimensions_keep_the_shape() {
    let array = NdArray::Float64(ArrayD::from_shape_vec(IxDyn(&[0, 3]), Vec::new()).unwrap());
    let decoded = loads(&dumps(&Value::Array(array.clone())).expect("dumps")).expect("loads");
    let Value::Array(decoded) = decoded else { panic!("array expected") };
    assert_eq!(decoded.shape(), [0, 3]);
    assert_eq!(decoded, array);
}

#[test]
fn float32_nan_survives_as_nan() {
    let array = Value::Array(NdArray::Float32(arr1(&[1.0f32, f32::NAN]).into_dyn()));
    let decoded = loads(&dumps(&array).expect("dumps")).expect("loads");
    let Value::Array(NdArray::Float32(decoded)) = decoded else { panic!("float32 array expected") };
    let values: Vec<f32> = decoded.iter().copied().collect();
    assert_eq!(values[0], 1.0);
    assert!(values[1].is_nan());
}

#[test]
fn high_rank_arrays_go_opaque() {
    let data: Vec<i64> = (0..16).collect();
    let array = Value::Array(NdArray::Int64(
        ArrayD::from_shape_vec(IxDyn(&[2, 2, 2, 2]), data).unwrap(),
    ));
    let text = dumps(&array).expect("dumps");
    assert!(!text.contains("array_from_nested"), "{text}");
    assert_eq!(loads(&text).expect("loads"), array);
}

#[test]
fn tuples_become_lists() {
    let value = Value::Tuple(vec![Value::Int(1), Value::from("a")]);
    let decoded = loads(&dumps(&value).expect("dumps")).expect("loads");
    assert_eq!(decoded, Value::List(vec![Value::Int(1), Value::from("a")]));
}

#[test]
fn non_finite_floats_become_null() {
    let value = Value::List(vec![Value::Float(f64::NAN), Value::Float(1.5)]);
    assert_eq!(dumps(&value).expect("dumps"), "[null,1.5]");
}

#[test]
fn tables_and_bytes_survive() {
    let table = Table::from_columns(
        vec![Scalar::from("x"), Scalar::from("y")],
        vec![("n".to_string(), vec![Scalar::Int(1), Scalar::Float(f64::NAN)])],
    )
    .expect("valid table");
    let value = Value::map([("t", Value::Table(table)), ("b", Value::Bytes(b"raw".to_vec()))]);
    let decoded = loads(&dumps(&value).expect("dumps")).expect("loads");
    let fields = decoded.as_map().expect("mapping");
    assert_eq!(fields.get("b"), Some(&Value::Bytes(b"raw".to_vec())));
    let table = fields.get("t").and_then(Value::as_table).expect("a table");
    assert_eq!(table.get(0, "n"), Some(&Scalar::Int(1)));
    // NaN equals NaN as a scalar
    assert_eq!(table.get(1, "n"), Some(&Scalar::Float(f64::NAN)));
}

#[test]
fn malformed_opaque_text_stays_text() {
    let decoded = decode(Value::from("{not really json"), DateMode::Off).expect("decodes");
    assert_eq!(decoded, Value::from("{not really json"));
}
