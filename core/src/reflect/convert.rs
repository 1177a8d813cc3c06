use std::sync::Arc;

use super::{Kind, Repr, Signature, Type, Value, value::Ptr};
use crate::error::{Error, Result};

impl Type {
    /// Zero value: false, 0, "", zeroed struct fields, nil references.
    pub fn zero(&self) -> Value {
        let repr = match self.kind() {
            Kind::Bool => Repr::Bool(false),
            k if k.is_signed() => Repr::Int(0),
            k if k.is_unsigned() => Repr::Uint(0),
            k if k.is_float() => Repr::Float(0.0),
            k if k.is_complex() => Repr::Complex(0.0, 0.0),
            Kind::String => Repr::Str(Arc::from("")),
            Kind::Struct => Repr::Struct(self.fields().iter().map(|f| f.ty().zero()).collect()),
            Kind::Array => {
                let elem = self.elem().map(Type::zero);
                Repr::Array(elem.map(|e| vec![e; self.array_len()]).unwrap_or_default())
            }
            Kind::Pointer => Repr::Pointer(None),
            Kind::Func => Repr::Func(None),
            Kind::Interface => Repr::Interface(None),
            Kind::Slice => Repr::Slice(None),
            Kind::Map => Repr::Map(None),
            _ => Repr::Opaque(None),
        };
        Value::from_parts(self.clone(), repr)
    }

    /// Pointer to a freshly allocated zero value of this type.
    pub fn new_pointer(&self) -> Value {
        Value::from_parts(Type::pointer_to(self), Repr::Pointer(Some(Ptr::new(self.zero()))))
    }
}

enum Number {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

fn cast_number(number: Number, to: Kind) -> Option<Repr> {
    if to.is_signed() {
        let wide = match number {
            Number::Signed(i) => i,
            Number::Unsigned(u) => u as i64,
            Number::Float(f) => f as i64,
        };
        let narrowed = match to {
            Kind::Int8 => wide as i8 as i64,
            Kind::Int16 => wide as i16 as i64,
            Kind::Int32 => wide as i32 as i64,
            _ => wide,
        };
        return Some(Repr::Int(narrowed));
    }
    if to.is_unsigned() {
        let wide = match number {
            Number::Signed(i) => i as u64,
            Number::Unsigned(u) => u,
            Number::Float(f) => f as u64,
        };
        let narrowed = match to {
            Kind::Uint8 => wide as u8 as u64,
            Kind::Uint16 => wide as u16 as u64,
            Kind::Uint32 => wide as u32 as u64,
            _ => wide,
        };
        return Some(Repr::Uint(narrowed));
    }
    if to.is_float() {
        let wide = match number {
            Number::Signed(i) => i as f64,
            Number::Unsigned(u) => u as f64,
            Number::Float(f) => f,
        };
        let narrowed = if to == Kind::Float32 { wide as f32 as f64 } else { wide };
        return Some(Repr::Float(narrowed));
    }
    None
}

impl Value {
    /// Convert to `to` following the host conversion rules: numeric widths
    /// and signedness freely, named/unnamed retagging of scalars, and
    /// storing into an interface the value implements.
    pub fn convert(&self, to: &Type) -> Result<Value> {
        if self.ty() == to {
            return Ok(self.clone());
        }
        let fail = || Error::conversion(self.ty().name(), to.name());
        if to.kind() == Kind::Interface {
            return self.into_interface(to).ok_or_else(fail);
        }
        let repr = match self.repr() {
            Repr::Int(i) => cast_number(Number::Signed(*i), to.kind()),
            Repr::Uint(u) => cast_number(Number::Unsigned(*u), to.kind()),
            Repr::Float(f) => cast_number(Number::Float(*f), to.kind()),
            Repr::Bool(b) if to.kind() == Kind::Bool => Some(Repr::Bool(*b)),
            Repr::Str(s) if to.kind() == Kind::String => Some(Repr::Str(s.clone())),
            Repr::Complex(re, im) if to.kind().is_complex() => {
                if to.kind() == Kind::Complex64 {
                    Some(Repr::Complex(*re as f32 as f64, *im as f32 as f64))
                } else {
                    Some(Repr::Complex(*re, *im))
                }
            }
            _ => None,
        };
        repr.map(|repr| Value::from_parts(to.clone(), repr)).ok_or_else(fail)
    }

    fn into_interface(&self, iface: &Type) -> Option<Value> {
        let dynamic = match self.repr() {
            Repr::Interface(None) => return Some(iface.zero()),
            Repr::Interface(Some(inner)) => (**inner).clone(),
            _ => self.detached(),
        };
        if !dynamic.ty().implements(iface) {
            return None;
        }
        Some(Value::from_parts(iface.clone(), Repr::Interface(Some(Box::new(dynamic)))))
    }
}

/// Rust types with a fixed host type descriptor.
pub trait HostType {
    fn host_type() -> Type;
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

macro_rules! host_number {
    ($($t:ty => $ctor:ident, $repr:ident, $get:ident, $wide:ty);* $(;)?) => {
        $(
            impl HostType for $t {
                fn host_type() -> Type {
                    Type::$ctor()
                }
            }

            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::from_parts(Type::$ctor(), Repr::$repr(self as $wide))
                }
            }

            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self> {
                    value
                        .convert(&Type::$ctor())?
                        .$get()
                        .map(|v| v as $t)
                        .ok_or_else(|| Error::mismatch(stringify!($t), value.ty().name()))
                }
            }
        )*
    };
}

host_number! {
    i8 => int8, Int, as_i64, i64;
    i16 => int16, Int, as_i64, i64;
    i32 => int32, Int, as_i64, i64;
    i64 => int64, Int, as_i64, i64;
    isize => int, Int, as_i64, i64;
    u8 => uint8, Uint, as_u64, u64;
    u16 => uint16, Uint, as_u64, u64;
    u32 => uint32, Uint, as_u64, u64;
    u64 => uint64, Uint, as_u64, u64;
    usize => uint, Uint, as_u64, u64;
    f32 => float32, Float, as_f64, f64;
    f64 => float64, Float, as_f64, f64;
}

impl HostType for bool {
    fn host_type() -> Type {
        Type::bool()
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .convert(&Type::bool())?
            .as_bool()
            .ok_or_else(|| Error::mismatch("bool", value.ty().name()))
    }
}

impl HostType for String {
    fn host_type() -> Type {
        Type::string()
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .convert(&Type::string())?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::mismatch("string", value.ty().name()))
    }
}

/// Return values of closures wrapped by [`Value::from_fn`].
pub trait IntoResults {
    fn result_types() -> Vec<Type>;
    fn into_results(self) -> Vec<Value>;
}

impl IntoResults for () {
    fn result_types() -> Vec<Type> {
        Vec::new()
    }

    fn into_results(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! single_result {
    ($($t:ty),*) => {
        $(
            impl IntoResults for $t {
                fn result_types() -> Vec<Type> {
                    vec![<$t as HostType>::host_type()]
                }

                fn into_results(self) -> Vec<Value> {
                    vec![self.into_value()]
                }
            }
        )*
    };
}

single_result!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String);

/// Rust closures that can become host function values.
pub trait HostFunction<Args>: Send + Sync + 'static {
    fn signature() -> Signature;
    fn invoke(&self, args: &[Value]) -> anyhow::Result<Vec<Value>>;
}

fn next_arg<'a>(args: &mut impl Iterator<Item = &'a Value>) -> Result<&'a Value> {
    args.next()
        .ok_or_else(|| Error::Internal("missing argument for host function".to_string()))
}

macro_rules! host_function {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> HostFunction<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoResults,
            $($arg: FromValue + HostType,)*
        {
            fn signature() -> Signature {
                Signature::new(vec![$(<$arg as HostType>::host_type()),*], R::result_types())
            }

            #[allow(unused_mut, unused_variables)]
            fn invoke(&self, args: &[Value]) -> anyhow::Result<Vec<Value>> {
                let mut iter = args.iter();
                let out = (self)($(<$arg as FromValue>::from_value(next_arg(&mut iter)?)?),*);
                Ok(out.into_results())
            }
        }
    };
}

host_function!();
host_function!(A);
host_function!(A, B);
host_function!(A, B, C);
host_function!(A, B, C, D);

impl Value {
    /// Function value from a typed Rust closure; the signature is derived
    /// from the argument and return types.
    pub fn from_fn<Args, F: HostFunction<Args>>(f: F) -> Value {
        Value::func(F::signature(), move |args| f.invoke(args))
    }
}
