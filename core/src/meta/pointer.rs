use super::{TableKind, check_value, equals, to_string};
use crate::{
    error::{Error, Result},
    field, guard, marshal,
    state::{NativeFunction, State},
};

fn index(state: &mut dyn State) -> Result<usize> {
    let value = check_value(state, 1, TableKind::Pointer)?;
    field::get_field(state, &value, 2)
}

fn new_index(state: &mut dyn State) -> Result<usize> {
    let value = check_value(state, 1, TableKind::Pointer)?;
    field::set_field(state, &value, 2, 3)
}

/// `-ptr`: push the pointee. A struct pointee stays addressable, so
/// `(-ptr).field = v` writes through.
fn deref(state: &mut dyn State) -> Result<usize> {
    let value = check_value(state, 1, TableKind::Pointer)?;
    let pointee = value
        .elem()
        .ok_or_else(|| Error::Runtime(format!("nil pointer dereference of {}", value.ty())))?;
    marshal::push(state, &pointee)?;
    Ok(1)
}

pub(super) fn handlers() -> Vec<(&'static str, NativeFunction)> {
    vec![
        ("__index", guard::boundary(index)),
        ("__newindex", guard::boundary(new_index)),
        ("__tostring", to_string(TableKind::Pointer)),
        ("__unm", guard::boundary(deref)),
        ("__eq", equals(TableKind::Pointer)),
    ]
}
