use super::{TableKind, check_value, equals, to_string};
use crate::{error::Result, field, guard, state::NativeFunction, state::State};

// Only the interface's own methods resolve; fields stay hidden behind it.
fn index(state: &mut dyn State) -> Result<usize> {
    let value = check_value(state, 1, TableKind::Interface)?;
    field::get_field(state, &value, 2)
}

pub(super) fn handlers() -> Vec<(&'static str, NativeFunction)> {
    vec![
        ("__index", guard::boundary(index)),
        ("__tostring", to_string(TableKind::Interface)),
        ("__eq", equals(TableKind::Interface)),
    ]
}
