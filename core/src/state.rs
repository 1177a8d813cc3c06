//! The stack-based interface consumed from the scripting VM.
//!
//! Everything the bindings need from a VM goes through [`State`]: pushing
//! primitives and handles, named metatables, stack introspection and a
//! per-instance registry. Indices follow the usual convention: positive
//! indices count from the bottom of the current frame (1-based), negative
//! ones from the top.

use std::{any::Any, fmt, sync::Arc};

use crate::error::Result;

/// Opaque payload of a VM handle.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Native-call boundary: reads its arguments from the frame, pushes its
/// results and returns how many it pushed. An `Err` aborts the current VM
/// call and surfaces the error message to the script.
pub type NativeFunction = Arc<dyn Fn(&mut dyn State) -> Result<usize> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    /// Index outside the current frame.
    None,
    Nil,
    Boolean,
    LightUserData,
    Number,
    String,
    Table,
    Function,
    UserData,
    Thread,
}

impl ScriptType {
    pub fn name(self) -> &'static str {
        match self {
            ScriptType::None => "no value",
            ScriptType::Nil => "nil",
            ScriptType::Boolean => "boolean",
            ScriptType::LightUserData => "light userdata",
            ScriptType::Number => "number",
            ScriptType::String => "string",
            ScriptType::Table => "table",
            ScriptType::Function => "function",
            ScriptType::UserData => "userdata",
            ScriptType::Thread => "thread",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait State {
    /// Number of slots in the current frame.
    fn top(&self) -> usize;

    /// Ensure room for `n` more slots; false when the stack cannot grow.
    fn check_stack(&mut self, n: usize) -> bool;

    fn pop(&mut self, n: usize);

    fn type_of(&self, index: i32) -> ScriptType;

    fn push_nil(&mut self);
    fn push_boolean(&mut self, b: bool);
    fn push_number(&mut self, n: f64);
    fn push_string(&mut self, s: &str);
    fn push_function(&mut self, f: NativeFunction);
    fn push_user_data(&mut self, data: UserData);

    fn to_boolean(&self, index: i32) -> bool;
    fn to_number(&self, index: i32) -> Option<f64>;
    /// String contents; numbers are rendered like the VM would.
    fn to_str(&self, index: i32) -> Option<String>;
    fn to_user_data(&self, index: i32) -> Option<UserData>;

    /// Push the metatable registered under `name`, creating it first if
    /// needed. Returns true only when it was created by this call.
    fn new_meta_table(&mut self, name: &str) -> bool;

    /// Install `functions` into the table at the top of the stack.
    fn set_functions(&mut self, functions: &[(&'static str, NativeFunction)]);

    /// Pop a table and make it the metatable of the value at `index`.
    fn set_meta_table(&mut self, index: i32);

    /// Attach the registered metatable `name` to the value at the top.
    fn set_meta_table_named(&mut self, name: &str);

    /// Payload of the user data at `index` if its metatable is `name`.
    fn test_user_data(&self, index: i32, name: &str) -> Option<UserData>;

    fn registry_get(&self, key: &str) -> Option<UserData>;
    fn registry_set(&mut self, key: &str, value: UserData);
}
