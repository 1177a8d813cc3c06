//! Name resolution for `obj.name` and `obj.name = v`.
//!
//! Hidden and missing names fail with the same `FieldNotFound`, so scripts
//! cannot probe for unexported members.

use crate::{
    error::{Error, Result},
    marshal,
    options::options,
    reflect::{Field, Kind, Type, Value},
    state::{ScriptType, State},
};

fn field_name(state: &dyn State, index: i32) -> Result<String> {
    match state.type_of(index) {
        ScriptType::String | ScriptType::Number => state
            .to_str(index)
            .ok_or_else(|| Error::mismatch("string", state.type_of(index).name())),
        other => Err(Error::mismatch("string", other.name())),
    }
}

fn accessible(state: &dyn State, index: i32) -> Result<String> {
    let name = field_name(state, index)?;
    if !options(state).can_access(&name) {
        return Err(Error::FieldNotFound(name));
    }
    Ok(name)
}

/// Index path and declaration of the struct field `name` of `ty`.
fn resolve(ty: &Type, name: &str) -> Option<(Vec<usize>, Field)> {
    let path = ty.field_path(name)?;
    let mut current = ty.clone();
    let mut found = None;
    for idx in &path {
        let field = current.fields().get(*idx)?.clone();
        current = field.ty().clone();
        found = Some(field);
    }
    Some((path, found?))
}

/// Push the method or field `name` (read from `name_index`) of `receiver`.
pub fn get_field(state: &mut dyn State, receiver: &Value, name_index: i32) -> Result<usize> {
    let name = accessible(state, name_index)?;
    if let Some(method) = receiver.method(&name) {
        marshal::push(state, &method)?;
        return Ok(1);
    }
    let value = receiver.field(&name).ok_or(Error::FieldNotFound(name))?;
    marshal::push(state, &value)?;
    Ok(1)
}

/// Assign the slot at `value_index` to the struct field named at
/// `name_index`. Only fields reached through a pointer are settable: the
/// receiver is a pointer or a struct read through one.
pub fn set_field(state: &mut dyn State, receiver: &Value, name_index: i32, value_index: i32) -> Result<usize> {
    let name = accessible(state, name_index)?;
    if state.type_of(value_index) == ScriptType::None {
        return Err(Error::mismatch("value", ScriptType::None.name()));
    }
    let target = match receiver.kind() {
        Kind::Pointer => receiver.ty().elem().filter(|elem| elem.kind() == Kind::Struct),
        Kind::Struct => Some(receiver.ty()),
        _ => None,
    };
    let (path, field) = target
        .and_then(|ty| resolve(ty, &name))
        .ok_or_else(|| Error::FieldNotFound(name.clone()))?;
    let settable = receiver.kind() == Kind::Pointer || receiver.is_addressable();
    if !settable || field.is_read_only() {
        return Err(Error::FieldNotSettable(name));
    }
    let value = marshal::pull(state, value_index, Some(field.ty()))?.unwrap_or_else(|| field.ty().zero());
    receiver
        .with_target_mut(|target| target.field_at_mut(&path).map(|slot| *slot = value.detached()))
        .flatten()
        .ok_or_else(|| Error::Runtime(format!("nil pointer dereference of {}", receiver.ty())))?;
    Ok(0)
}
