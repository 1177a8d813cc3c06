//! Per-kind dispatch tables.
//!
//! Each [`TableKind`] maps to one named metatable. Handler sets are built
//! once per process and installed at most once per VM; later installs only
//! push the existing table.

mod func;
mod interface;
mod pointer;
mod structs;
mod typ;


use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::{
    error::{Error, Result},
    guard,
    reflect::{Type, Value},
    state::{NativeFunction, State},
};

pub type Handlers = Arc<[(&'static str, NativeFunction)]>;

static HANDLERS: Lazy<DashMap<TableKind, Handlers>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Struct,
    Pointer,
    Func,
    Interface,
    Type,
}

impl TableKind {
    /// Registry name of the metatable.
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Struct => "reflua.struct",
            TableKind::Pointer => "reflua.pointer",
            TableKind::Func => "reflua.func",
            TableKind::Interface => "reflua.interface",
            TableKind::Type => "reflua.type",
        }
    }

    fn label(self) -> &'static str {
        match self {
            TableKind::Struct => "struct",
            TableKind::Pointer => "pointer",
            TableKind::Func => "function",
            TableKind::Interface => "interface",
            TableKind::Type => "type",
        }
    }

    fn build(self) -> Vec<(&'static str, NativeFunction)> {
        match self {
            TableKind::Struct => structs::handlers(),
            TableKind::Pointer => pointer::handlers(),
            TableKind::Func => func::handlers(),
            TableKind::Interface => interface::handlers(),
            TableKind::Type => typ::handlers(),
        }
    }
}

/// Handler set for `kind`, built on first use.
pub fn handlers(kind: TableKind) -> Handlers {
    if let Some(found) = HANDLERS.get(&kind) {
        return found.clone();
    }
    HANDLERS.entry(kind).or_insert_with(|| Arc::from(kind.build())).clone()
}

/// Push the metatable for `kind`, installing its handlers on first use.
pub fn push_table(state: &mut dyn State, kind: TableKind) {
    if !state.new_meta_table(kind.name()) {
        return;
    }
    state.set_functions(&handlers(kind));
    tracing::debug!(table = kind.name(), "installed dispatch table");
}

/// The value held by the handle at `index`, which must carry `kind`'s table.
/// Addressable structs are re-read from their storage.
pub(crate) fn check_value(state: &dyn State, index: i32, kind: TableKind) -> Result<Value> {
    state
        .test_user_data(index, kind.name())
        .and_then(|data| data.downcast_ref::<Value>().map(Value::reload))
        .ok_or_else(|| Error::mismatch(kind.label(), state.type_of(index).name()))
}

pub(crate) fn check_type(state: &dyn State, index: i32) -> Result<Type> {
    state
        .test_user_data(index, TableKind::Type.name())
        .and_then(|data| data.downcast_ref::<Type>().cloned())
        .ok_or_else(|| Error::mismatch(TableKind::Type.label(), state.type_of(index).name()))
}

fn to_string(kind: TableKind) -> NativeFunction {
    guard::boundary_with(move |state| {
        let value = check_value(state, 1, kind)?;
        state.push_string(&format!("{:?}", value));
        Ok(1)
    })
}

// Operands that are not both handles of `kind` compare unequal.
fn equals(kind: TableKind) -> NativeFunction {
    guard::boundary_with(move |state| {
        let equal = match (check_value(state, 1, kind), check_value(state, 2, kind)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        state.push_boolean(equal);
        Ok(1)
    })
}
