pub mod call;
pub mod error;
pub mod field;
pub mod guard;
pub mod marshal;
pub mod meta;
pub mod options;
pub mod reflect;
pub mod state;

// In-memory VM used by embedders without a runtime at hand and by tests
pub mod vm;


pub use error::{Error, Result};
pub use marshal::{pull, pull_as, push, push_option, push_type, push_type_of, push_value};
pub use options::{Options, options, set_options};
pub use reflect::{Kind, Signature, Type, TypeBuilder, Value};
pub use state::State;
