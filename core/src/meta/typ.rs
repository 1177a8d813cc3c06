//! Type descriptor handles: `T()` builds a zero value, `T.new()` a pointer
//! to a fresh zero value.

use super::check_type;
use crate::{
    error::{Error, Result},
    guard, marshal,
    reflect::{Kind, Type},
    state::{NativeFunction, State},
};

fn constructible(ty: &Type) -> Result<()> {
    match ty.kind() {
        Kind::Chan | Kind::Map | Kind::Slice => Err(Error::UnsupportedKind {
            kind: ty.kind().name(),
            ty: ty.name().to_string(),
        }),
        _ => Ok(()),
    }
}

fn zero(state: &mut dyn State) -> Result<usize> {
    let ty = check_type(state, 1)?;
    constructible(&ty)?;
    marshal::push(state, &ty.zero())?;
    Ok(1)
}

fn index(state: &mut dyn State) -> Result<usize> {
    let ty = check_type(state, 1)?;
    let key = state
        .to_str(2)
        .ok_or_else(|| Error::mismatch("string", state.type_of(2).name()))?;
    if key != "new" {
        state.push_nil();
        return Ok(1);
    }
    state.push_function(guard::boundary_with(move |state| {
        constructible(&ty)?;
        marshal::push(state, &ty.new_pointer())?;
        Ok(1)
    }));
    Ok(1)
}

fn to_string(state: &mut dyn State) -> Result<usize> {
    let ty = check_type(state, 1)?;
    state.push_string(&format!("host type: {}", ty));
    Ok(1)
}

fn equals(state: &mut dyn State) -> Result<usize> {
    let equal = match (check_type(state, 1), check_type(state, 2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    state.push_boolean(equal);
    Ok(1)
}

pub(super) fn handlers() -> Vec<(&'static str, NativeFunction)> {
    vec![
        ("__call", guard::boundary(zero)),
        ("__index", guard::boundary(index)),
        ("__tostring", guard::boundary(to_string)),
        ("__eq", guard::boundary(equals)),
    ]
}
