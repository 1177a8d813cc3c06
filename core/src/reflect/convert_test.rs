use super::*;
use crate::error::Error;

#[test]
fn numeric_conversions_follow_as_casts() {
    let v = Value::float(3.9);
    assert_eq!(v.convert(&Type::int()).unwrap().as_i64(), Some(3));
    assert_eq!(Value::float(-3.9).convert(&Type::int()).unwrap().as_i64(), Some(-3));
    assert_eq!(Value::int(300).convert(&Type::uint8()).unwrap().as_u64(), Some(44));
    assert_eq!(Value::int(-1).convert(&Type::int8()).unwrap().as_i64(), Some(-1));
    assert_eq!(Value::int(-1).convert(&Type::uint16()).unwrap().as_u64(), Some(u16::MAX as u64));
    assert_eq!(Value::int(7).convert(&Type::float32()).unwrap().as_f64(), Some(7.0));

    let narrowed = Value::float(0.1).convert(&Type::float32()).unwrap();
    assert_eq!(narrowed.as_f64(), Some(0.1_f32 as f64));
}

#[test]
fn identical_type_is_unchanged() {
    let v = Value::string("same");
    assert_eq!(v.convert(&Type::string()).unwrap(), v);
}

#[test]
fn named_scalars_retag() {
    let celsius = TypeBuilder::new_named("Celsius", Kind::Float64).build();
    let c = Value::float(21.5).convert(&celsius).unwrap();
    assert_eq!(c.ty(), &celsius);
    assert_eq!(c.as_f64(), Some(21.5));

    let back = c.convert(&Type::float64()).unwrap();
    assert_eq!(back.ty(), &Type::float64());

    let label = TypeBuilder::new_named("Label", Kind::String).build();
    assert_eq!(Value::string("x").convert(&label).unwrap().as_str(), Some("x"));
}

#[test]
fn incompatible_conversions_fail() {
    let err = Value::string("1").convert(&Type::int()).unwrap_err();
    assert_eq!(
        err,
        Error::Conversion {
            from: "string".into(),
            to: "int".into()
        }
    );
    assert!(Value::bool(true).convert(&Type::float64()).is_err());
    assert!(Value::int(1).convert(&Type::bool()).is_err());

    let point = TypeBuilder::new_struct("Point").build();
    assert!(Value::int(1).convert(&point).is_err());
}

#[test]
fn interface_conversion_checks_method_set() {
    let speak = Signature::new([], [Type::string()]);
    let speaker = TypeBuilder::new_interface("Speaker").requires("Speak", speak.clone()).build();
    let dog = TypeBuilder::new_struct("Dog")
        .method("Speak", speak, |_, _| Ok(vec![Value::string("woof")]))
        .build();

    let boxed = dog.zero().convert(&speaker).unwrap();
    assert_eq!(boxed.kind(), Kind::Interface);
    assert_eq!(boxed.elem().map(|v| v.ty().clone()), Some(dog.clone()));

    let err = Value::int(1).convert(&speaker).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));

    let any = Value::int(5).convert(&Type::any()).unwrap();
    assert_eq!(any.elem().and_then(|v| v.as_i64()), Some(5));

    let again = any.convert(&Type::any()).unwrap();
    assert_eq!(again, any);
}

#[test]
fn zero_values() {
    let inner = TypeBuilder::new_struct("Inner").field("On", Type::bool()).build();
    let ty = TypeBuilder::new_struct("Outer")
        .field("N", Type::int())
        .field("S", Type::string())
        .field("In", inner)
        .field("P", Type::pointer_to(&Type::int()))
        .build();
    let zero = ty.zero();
    let fields = zero.fields().unwrap();
    assert_eq!(fields[0].as_i64(), Some(0));
    assert_eq!(fields[1].as_str(), Some(""));
    assert_eq!(fields[2].field("On").and_then(|v| v.as_bool()), Some(false));
    assert!(fields[3].is_nil());

    assert!(Type::slice_of(&Type::int()).zero().is_nil());
    assert_eq!(Type::array_of(&Type::int(), 3).zero().items().map(|i| i.len()), Some(3));
}

#[test]
fn new_pointer_points_at_zero() {
    let p = Type::int().new_pointer();
    assert_eq!(p.ty(), &Type::pointer_to(&Type::int()));
    assert_eq!(p.elem().and_then(|v| v.as_i64()), Some(0));
    assert_ne!(p, Type::int().new_pointer());
}

#[test]
fn rust_primitives_round_trip() {
    assert_eq!(i32::from_value(&(-5_i32).into_value()).unwrap(), -5);
    assert_eq!(u8::from_value(&200_u8.into_value()).unwrap(), 200);
    assert_eq!(f32::from_value(&1.5_f32.into_value()).unwrap(), 1.5);
    assert!(bool::from_value(&true.into_value()).unwrap());
    assert_eq!(String::from_value(&"hi".into_value()).unwrap(), "hi");
    assert_eq!(usize::host_type(), Type::uint());
    assert_eq!(isize::host_type(), Type::int());

    // numbers from the VM arrive as float64
    assert_eq!(i64::from_value(&Value::float(42.0)).unwrap(), 42);
    assert!(String::from_value(&Value::int(1)).is_err());
}

#[test]
fn from_fn_derives_signature() {
    let add = Value::from_fn(|a: i64, b: i64| a + b);
    assert_eq!(add.ty().to_string(), "func(int64, int64) int64");
    let out = add.call(&[Value::int(2).convert(&Type::int64()).unwrap(), 3_i64.into_value()]).unwrap();
    assert_eq!(out[0].as_i64(), Some(5));

    let unit = Value::from_fn(|| ());
    assert_eq!(unit.ty().to_string(), "func()");
    assert!(unit.call(&[]).unwrap().is_empty());
}
