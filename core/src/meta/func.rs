use super::{TableKind, check_value, equals, to_string};
use crate::{call, error::Result, guard, state::NativeFunction, state::State};

fn invoke(state: &mut dyn State) -> Result<usize> {
    let f = check_value(state, 1, TableKind::Func)?;
    call::call(state, &f)
}

pub(super) fn handlers() -> Vec<(&'static str, NativeFunction)> {
    vec![
        ("__call", guard::boundary(invoke)),
        ("__tostring", to_string(TableKind::Func)),
        ("__eq", equals(TableKind::Func)),
    ]
}
