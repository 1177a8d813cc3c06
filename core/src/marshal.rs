//! Moving host values across the VM stack.
//!
//! Scalars become native VM values; structs, non-nil pointers, functions
//! and interfaces become handles tagged with their dispatch table. Nil
//! references become the VM's nil. Containers have no VM form yet.

use std::sync::Arc;

use crate::{
    error::{Error, Result},
    meta::{self, TableKind},
    reflect::{FromValue, HostType, IntoValue, Kind, Repr, Type, Value},
    state::{ScriptType, State},
};

/// Push `value` as exactly one stack slot. On error nothing is pushed.
pub fn push(state: &mut dyn State, value: &Value) -> Result<()> {
    match value.repr() {
        Repr::Bool(b) => state.push_boolean(*b),
        Repr::Int(i) => state.push_number(*i as f64),
        Repr::Uint(u) => state.push_number(*u as f64),
        Repr::Float(f) => state.push_number(*f),
        Repr::Str(s) => state.push_string(s),
        Repr::Struct(_) => push_handle(state, value, TableKind::Struct),
        Repr::Pointer(Some(_)) => push_handle(state, value, TableKind::Pointer),
        Repr::Func(Some(_)) => push_handle(state, value, TableKind::Func),
        Repr::Interface(Some(_)) => push_handle(state, value, TableKind::Interface),
        Repr::Pointer(None) | Repr::Func(None) | Repr::Interface(None) => state.push_nil(),
        _ => {
            return Err(Error::UnsupportedKind {
                kind: value.kind().name(),
                ty: value.ty().name().to_string(),
            });
        }
    }
    Ok(())
}

fn push_handle(state: &mut dyn State, value: &Value, kind: TableKind) {
    state.push_user_data(Arc::new(value.clone()));
    meta::push_table(state, kind);
    state.set_meta_table(-2);
}

/// Push `value`, or nil when there is none.
pub fn push_option(state: &mut dyn State, value: Option<&Value>) -> Result<()> {
    match value {
        Some(value) => push(state, value),
        None => {
            state.push_nil();
            Ok(())
        }
    }
}

/// Push any Rust primitive or [`Value`].
pub fn push_value(state: &mut dyn State, value: impl IntoValue) -> Result<()> {
    push(state, &value.into_value())
}

/// Push a type descriptor handle; scripts call it for a zero value and
/// use `.new()` for a fresh pointer.
pub fn push_type(state: &mut dyn State, ty: &Type) {
    tracing::debug!(ty = %ty, "pushing type descriptor");
    state.push_user_data(Arc::new(ty.clone()));
    meta::push_table(state, TableKind::Type);
    state.set_meta_table(-2);
}

/// Push the descriptor of `example`'s type.
pub fn push_type_of(state: &mut dyn State, example: &Value) {
    push_type(state, example.ty());
}

/// Read the slot at `index` as a host value.
///
/// Nil yields `None` unless `hint` asks for a nilable type, in which case
/// that type's nil is returned. With a hint, the produced value is
/// converted to it.
pub fn pull(state: &dyn State, index: i32, hint: Option<&Type>) -> Result<Option<Value>> {
    let produced = match state.type_of(index) {
        ScriptType::Nil | ScriptType::None => {
            return match hint {
                None => Ok(None),
                Some(hint) if hint.kind().is_nilable() => Ok(Some(hint.zero())),
                Some(hint) => Err(Error::conversion("nil", hint.name())),
            };
        }
        ScriptType::Boolean => Value::bool(state.to_boolean(index)),
        ScriptType::Number => {
            let n = state
                .to_number(index)
                .ok_or_else(|| Error::mismatch("number", state.type_of(index).name()))?;
            Value::float(n)
        }
        ScriptType::String => {
            let s = state
                .to_str(index)
                .ok_or_else(|| Error::mismatch("string", state.type_of(index).name()))?;
            Value::string(s)
        }
        ScriptType::UserData => handle_value(state, index)?,
        ScriptType::Table => {
            return Err(match hint {
                None => Error::MissingHint,
                Some(hint) if matches!(hint.kind(), Kind::Array | Kind::Slice | Kind::Map) => {
                    Error::NotImplemented(format!("table to {} conversion", hint.kind()))
                }
                Some(hint) => Error::conversion("table", hint.name()),
            });
        }
        other => return Err(Error::UnsupportedValue(other.name())),
    };
    match hint {
        Some(hint) => produced.convert(hint).map(Some),
        None => Ok(Some(produced)),
    }
}

/// Pull the slot at `index` straight into a Rust value.
pub fn pull_as<T: FromValue + HostType>(state: &dyn State, index: i32) -> Result<T> {
    let hint = T::host_type();
    match pull(state, index, Some(&hint))? {
        Some(value) => T::from_value(&value),
        None => Err(Error::conversion("nil", hint.name())),
    }
}

pub(crate) fn handle_value(state: &dyn State, index: i32) -> Result<Value> {
    let data = state
        .to_user_data(index)
        .ok_or_else(|| Error::mismatch("userdata", state.type_of(index).name()))?;
    if let Some(value) = data.downcast_ref::<Value>() {
        return Ok(value.reload());
    }
    if data.is::<Type>() {
        return Err(Error::mismatch("host value", "type descriptor"));
    }
    Err(Error::mismatch("host value", "foreign userdata"))
}
