use super::{TableKind, check_value, equals, to_string};
use crate::{error::Result, field, guard, state::NativeFunction, state::State};

fn index(state: &mut dyn State) -> Result<usize> {
    let value = check_value(state, 1, TableKind::Struct)?;
    field::get_field(state, &value, 2)
}

fn new_index(state: &mut dyn State) -> Result<usize> {
    let value = check_value(state, 1, TableKind::Struct)?;
    field::set_field(state, &value, 2, 3)
}

pub(super) fn handlers() -> Vec<(&'static str, NativeFunction)> {
    vec![
        ("__index", guard::boundary(index)),
        ("__newindex", guard::boundary(new_index)),
        ("__tostring", to_string(TableKind::Struct)),
        ("__eq", equals(TableKind::Struct)),
    ]
}
