use std::sync::Arc;

use serde::Deserialize;

use crate::state::State;

const OPTIONS_KEY: &str = "reflua.options";

/// Per-VM binding configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Options {
    /// Resolve lower-case (unexported) fields and methods too.
    pub allow_unexported_access: bool,
}

impl Options {
    /// Whether `name` may be resolved from scripts.
    pub fn can_access(&self, name: &str) -> bool {
        if self.allow_unexported_access {
            return true;
        }
        match name.chars().next() {
            None => true,
            Some(first) => first.is_uppercase(),
        }
    }
}

/// Store `opts` in the VM registry; affects every later access on `state`.
pub fn set_options(state: &mut dyn State, opts: Options) {
    state.registry_set(OPTIONS_KEY, Arc::new(opts));
}

/// Options stored on `state`, or the defaults when none were set.
pub fn options(state: &dyn State) -> Options {
    state
        .registry_get(OPTIONS_KEY)
        .and_then(|data| data.downcast_ref::<Options>().copied())
        .unwrap_or_default()
}
