//! Minimal in-memory stack VM implementing [`State`].
//!
//! It has no compiler: script behaviour is driven through the
//! meta-operations ([`Vm::index`], [`Vm::set_index`], [`Vm::call`],
//! [`Vm::equals`], [`Vm::to_display`], [`Vm::negate`]) which follow the
//! metatable protocol a Lua-style VM uses for `obj.k`, `obj.k = v`,
//! `obj(...)`, `a == b`, `tostring(obj)` and `-obj`.

mod slot;


use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

pub use slot::{Handle, Slot, Table, TableRef};

use crate::{
    error::{Error, Result},
    state::{NativeFunction, ScriptType, State, UserData},
};

/// Lua's default `LUAI_MAXSTACK`.
pub const DEFAULT_STACK_LIMIT: usize = 1_000_000;

pub struct Vm {
    stack: Vec<Slot>,
    base: usize,
    limit: usize,
    meta_tables: HashMap<String, TableRef>,
    registry: HashMap<String, UserData>,
    globals: HashMap<String, Slot>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_stack_limit(DEFAULT_STACK_LIMIT)
    }

    pub fn with_stack_limit(limit: usize) -> Self {
        Self {
            stack: Vec::new(),
            base: 0,
            limit,
            meta_tables: HashMap::new(),
            registry: HashMap::new(),
            globals: HashMap::new(),
        }
    }

    fn abs_index(&self, index: i32) -> Option<usize> {
        if index > 0 {
            let pos = self.base + index as usize - 1;
            (pos < self.stack.len()).then_some(pos)
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            (back <= self.stack.len() - self.base).then(|| self.stack.len() - back)
        } else {
            None
        }
    }

    fn slot(&self, index: i32) -> Option<&Slot> {
        self.abs_index(index).map(|pos| &self.stack[pos])
    }

    /// Copy of the slot at `index` (nil when out of range).
    pub fn slot_at(&self, index: i32) -> Slot {
        self.slot(index).cloned().unwrap_or(Slot::Nil)
    }

    pub fn push_slot(&mut self, slot: Slot) {
        self.stack.push(slot);
    }

    /// Pop the top slot of the current frame (nil when the frame is empty).
    pub fn pop_slot(&mut self) -> Slot {
        if self.stack.len() > self.base {
            self.stack.pop().unwrap_or(Slot::Nil)
        } else {
            Slot::Nil
        }
    }

    pub fn set_global(&mut self, name: &str, slot: Slot) {
        self.globals.insert(name.to_string(), slot);
    }

    pub fn global(&self, name: &str) -> Slot {
        self.globals.get(name).cloned().unwrap_or(Slot::Nil)
    }

    /// Pop the top slot into the global `name`.
    pub fn pop_global(&mut self, name: &str) {
        let slot = self.pop_slot();
        self.set_global(name, slot);
    }

    pub fn new_table(&self) -> Slot {
        Slot::Table(Arc::new(RwLock::new(Table::default())))
    }

    pub fn meta_table(&self, name: &str) -> Option<TableRef> {
        self.meta_tables.get(name).cloned()
    }

    fn meta_field(&self, obj: &Slot, event: &str) -> Option<Slot> {
        let Slot::UserData(handle) = obj else {
            return None;
        };
        let meta = handle.meta()?;
        let field = meta.read().get(event);
        (!field.is_nil()).then_some(field)
    }

    fn invoke(&mut self, f: &NativeFunction, args: Vec<Slot>) -> Result<Vec<Slot>> {
        if !self.check_stack(args.len()) {
            return Err(Error::StackOverflow);
        }
        let saved = self.base;
        let base = self.stack.len();
        self.stack.extend(args);
        self.base = base;
        let outcome = f(self as &mut dyn State);
        let results = outcome.map(|n| {
            let n = n.min(self.stack.len() - base);
            self.stack.split_off(self.stack.len() - n)
        });
        self.stack.truncate(base);
        self.base = saved;
        results
    }

    /// `callee(args...)`, honouring `__call` on handles.
    pub fn call(&mut self, callee: &Slot, args: Vec<Slot>) -> Result<Vec<Slot>> {
        match callee {
            Slot::Function(f) => {
                let f = f.clone();
                self.invoke(&f, args)
            }
            other => match self.meta_field(other, "__call") {
                Some(Slot::Function(handler)) => {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(other.clone());
                    full.extend(args);
                    self.invoke(&handler, full)
                }
                _ => Err(Error::Runtime(format!("attempt to call a {} value", other.type_name()))),
            },
        }
    }

    /// `obj[key]`, honouring `__index` on handles.
    pub fn index(&mut self, obj: &Slot, key: impl Into<Slot>) -> Result<Slot> {
        let key = key.into();
        match obj {
            Slot::Table(table) => Ok(table.read().get(&key.to_key())),
            Slot::UserData(_) => match self.meta_field(obj, "__index") {
                Some(Slot::Function(handler)) => {
                    let results = self.invoke(&handler, vec![obj.clone(), key])?;
                    Ok(results.into_iter().next().unwrap_or(Slot::Nil))
                }
                Some(Slot::Table(table)) => Ok(table.read().get(&key.to_key())),
                _ => Err(Error::Runtime("attempt to index a userdata value".to_string())),
            },
            other => Err(Error::Runtime(format!("attempt to index a {} value", other.type_name()))),
        }
    }

    /// `obj[key] = value`, honouring `__newindex` on handles.
    pub fn set_index(&mut self, obj: &Slot, key: impl Into<Slot>, value: impl Into<Slot>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        match obj {
            Slot::Table(table) => {
                table.write().set(key.to_key(), value);
                Ok(())
            }
            Slot::UserData(_) => match self.meta_field(obj, "__newindex") {
                Some(Slot::Function(handler)) => self.invoke(&handler, vec![obj.clone(), key, value]).map(|_| ()),
                _ => Err(Error::Runtime("attempt to index a userdata value".to_string())),
            },
            other => Err(Error::Runtime(format!("attempt to index a {} value", other.type_name()))),
        }
    }

    /// `a == b`. Handles use `__eq` only when both share the same handler.
    pub fn equals(&mut self, a: &Slot, b: &Slot) -> Result<bool> {
        if let (Slot::UserData(x), Slot::UserData(y)) = (a, b) {
            if Arc::ptr_eq(x, y) {
                return Ok(true);
            }
            let (Some(Slot::Function(ha)), Some(Slot::Function(hb))) =
                (self.meta_field(a, "__eq"), self.meta_field(b, "__eq"))
            else {
                return Ok(false);
            };
            if !std::ptr::addr_eq(Arc::as_ptr(&ha), Arc::as_ptr(&hb)) {
                return Ok(false);
            }
            let results = self.invoke(&ha, vec![a.clone(), b.clone()])?;
            return Ok(results.first().is_some_and(Slot::is_truthy));
        }
        Ok(a.raw_equal(b))
    }

    /// `tostring(v)`, honouring `__tostring` on handles.
    pub fn to_display(&mut self, value: &Slot) -> Result<String> {
        match self.meta_field(value, "__tostring") {
            Some(Slot::Function(handler)) => {
                let results = self.invoke(&handler, vec![value.clone()])?;
                results
                    .first()
                    .and_then(Slot::as_text)
                    .ok_or_else(|| Error::Runtime("'__tostring' must return a string".to_string()))
            }
            _ => Ok(value.render()),
        }
    }

    /// `-v`, honouring `__unm` on handles.
    pub fn negate(&mut self, value: &Slot) -> Result<Slot> {
        if let Slot::Number(n) = value {
            return Ok(Slot::Number(-n));
        }
        match self.meta_field(value, "__unm") {
            Some(Slot::Function(handler)) => {
                let results = self.invoke(&handler, vec![value.clone(), value.clone()])?;
                Ok(results.into_iter().next().unwrap_or(Slot::Nil))
            }
            _ => Err(Error::Runtime(format!(
                "attempt to perform arithmetic on a {} value",
                value.type_name()
            ))),
        }
    }
}

impl State for Vm {
    fn top(&self) -> usize {
        self.stack.len() - self.base
    }

    fn check_stack(&mut self, n: usize) -> bool {
        self.stack.len().saturating_add(n) <= self.limit
    }

    fn pop(&mut self, n: usize) {
        let keep = self.stack.len().saturating_sub(n).max(self.base);
        self.stack.truncate(keep);
    }

    fn type_of(&self, index: i32) -> ScriptType {
        self.slot(index).map_or(ScriptType::None, Slot::script_type)
    }

    fn push_nil(&mut self) {
        self.stack.push(Slot::Nil);
    }

    fn push_boolean(&mut self, b: bool) {
        self.stack.push(Slot::Boolean(b));
    }

    fn push_number(&mut self, n: f64) {
        self.stack.push(Slot::Number(n));
    }

    fn push_string(&mut self, s: &str) {
        self.stack.push(Slot::String(Arc::from(s)));
    }

    fn push_function(&mut self, f: NativeFunction) {
        self.stack.push(Slot::Function(f));
    }

    fn push_user_data(&mut self, data: UserData) {
        self.stack.push(Slot::UserData(Arc::new(Handle::new(data))));
    }

    fn to_boolean(&self, index: i32) -> bool {
        self.slot(index).is_some_and(Slot::is_truthy)
    }

    fn to_number(&self, index: i32) -> Option<f64> {
        match self.slot(index)? {
            Slot::Number(n) => Some(*n),
            Slot::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn to_str(&self, index: i32) -> Option<String> {
        self.slot(index).and_then(Slot::as_text)
    }

    fn to_user_data(&self, index: i32) -> Option<UserData> {
        match self.slot(index)? {
            Slot::UserData(handle) => Some(handle.data()),
            _ => None,
        }
    }

    fn new_meta_table(&mut self, name: &str) -> bool {
        if let Some(existing) = self.meta_tables.get(name) {
            self.stack.push(Slot::Table(existing.clone()));
            return false;
        }
        let table: TableRef = Arc::new(RwLock::new(Table::default()));
        self.meta_tables.insert(name.to_string(), table.clone());
        self.stack.push(Slot::Table(table));
        true
    }

    fn set_functions(&mut self, functions: &[(&'static str, NativeFunction)]) {
        let Some(Slot::Table(table)) = self.stack.last() else {
            tracing::warn!("set_functions without a table on top of the stack");
            return;
        };
        let mut table = table.write();
        for (name, f) in functions {
            table.set(name.to_string(), Slot::Function(f.clone()));
        }
    }

    fn set_meta_table(&mut self, index: i32) {
        let Some(target) = self.abs_index(index) else {
            return;
        };
        let meta = match self.pop_slot() {
            Slot::Table(table) => Some(table),
            _ => None,
        };
        if let Some(Slot::UserData(handle)) = self.stack.get(target) {
            handle.set_meta(meta);
        }
    }

    fn set_meta_table_named(&mut self, name: &str) {
        let meta = self.meta_tables.get(name).cloned();
        if let Some(Slot::UserData(handle)) = self.stack.last() {
            handle.set_meta(meta);
        }
    }

    fn test_user_data(&self, index: i32, name: &str) -> Option<UserData> {
        let Slot::UserData(handle) = self.slot(index)? else {
            return None;
        };
        let expected = self.meta_tables.get(name)?;
        let actual = handle.meta()?;
        Arc::ptr_eq(expected, &actual).then(|| handle.data())
    }

    fn registry_get(&self, key: &str) -> Option<UserData> {
        self.registry.get(key).cloned()
    }

    fn registry_set(&mut self, key: &str, value: UserData) {
        self.registry.insert(key.to_string(), value);
    }
}
