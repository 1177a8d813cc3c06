//! Runtime description of host values.
//!
//! Rust has no open reflection, so host types are declared once through
//! [`TypeBuilder`] (or the primitive [`HostType`] impls) and values carry
//! their [`Type`] alongside a tagged payload.

mod convert;
mod kind;
mod types;
mod value;

#[cfg(test)]
mod convert_test;
#[cfg(test)]
mod types_test;

pub use convert::{FromValue, HostFunction, HostType, IntoResults, IntoValue};
pub use kind::Kind;
pub use types::{Field, Method, MethodFn, MethodSpec, Signature, Type, TypeBuilder};
pub use value::{Cell, Func, HostFn, RawFn, Value};

pub(crate) use value::Repr;
