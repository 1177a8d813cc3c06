use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::state::{NativeFunction, ScriptType, UserData};

pub type TableRef = Arc<RwLock<Table>>;

/// A VM stack slot.
#[derive(Clone)]
pub enum Slot {
    Nil,
    Boolean(bool),
    Number(f64),
    String(Arc<str>),
    Table(TableRef),
    Function(NativeFunction),
    UserData(Arc<Handle>),
}

/// String-keyed table; enough for metatables and plain script tables.
#[derive(Default)]
pub struct Table {
    entries: HashMap<String, Slot>,
}

impl Table {
    pub fn get(&self, key: &str) -> Slot {
        self.entries.get(key).cloned().unwrap_or(Slot::Nil)
    }

    /// Assigning nil removes the entry.
    pub fn set(&mut self, key: String, value: Slot) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Full user data: an opaque payload plus its metatable.
pub struct Handle {
    data: UserData,
    meta: RwLock<Option<TableRef>>,
}

impl Handle {
    pub fn new(data: UserData) -> Self {
        Self {
            data,
            meta: RwLock::new(None),
        }
    }

    pub fn data(&self) -> UserData {
        self.data.clone()
    }

    pub fn meta(&self) -> Option<TableRef> {
        self.meta.read().clone()
    }

    pub fn set_meta(&self, meta: Option<TableRef>) {
        *self.meta.write() = meta;
    }
}

impl Slot {
    pub fn script_type(&self) -> ScriptType {
        match self {
            Slot::Nil => ScriptType::Nil,
            Slot::Boolean(_) => ScriptType::Boolean,
            Slot::Number(_) => ScriptType::Number,
            Slot::String(_) => ScriptType::String,
            Slot::Table(_) => ScriptType::Table,
            Slot::Function(_) => ScriptType::Function,
            Slot::UserData(_) => ScriptType::UserData,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.script_type().name()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Slot::Nil)
    }

    /// Everything except nil and false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Slot::Nil | Slot::Boolean(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Slot::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Slot::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String contents, with numbers coerced the way the VM prints them.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Slot::String(s) => Some(s.to_string()),
            Slot::Number(n) => Some(format_number(*n)),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Arc<Handle>> {
        match self {
            Slot::UserData(handle) => Some(handle),
            _ => None,
        }
    }

    pub(crate) fn to_key(&self) -> String {
        self.as_text().unwrap_or_else(|| self.render())
    }

    /// Primitive equality: by value for scalars, by identity otherwise.
    pub fn raw_equal(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Nil, Slot::Nil) => true,
            (Slot::Boolean(a), Slot::Boolean(b)) => a == b,
            (Slot::Number(a), Slot::Number(b)) => a == b,
            (Slot::String(a), Slot::String(b)) => a == b,
            (Slot::Table(a), Slot::Table(b)) => Arc::ptr_eq(a, b),
            (Slot::Function(a), Slot::Function(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Slot::UserData(a), Slot::UserData(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `tostring` without metamethods.
    pub fn render(&self) -> String {
        match self {
            Slot::Nil => "nil".to_string(),
            Slot::Boolean(b) => b.to_string(),
            Slot::Number(n) => format_number(*n),
            Slot::String(s) => s.to_string(),
            Slot::Table(t) => format!("table: {:p}", Arc::as_ptr(t)),
            Slot::Function(f) => format!("function: {:p}", Arc::as_ptr(f) as *const ()),
            Slot::UserData(h) => format!("userdata: {:p}", Arc::as_ptr(h)),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::String(s) => write!(f, "{:?}", s),
            other => f.write_str(&other.render()),
        }
    }
}

impl From<bool> for Slot {
    fn from(b: bool) -> Self {
        Slot::Boolean(b)
    }
}

impl From<f64> for Slot {
    fn from(n: f64) -> Self {
        Slot::Number(n)
    }
}

impl From<i32> for Slot {
    fn from(n: i32) -> Self {
        Slot::Number(n as f64)
    }
}

impl From<&str> for Slot {
    fn from(s: &str) -> Self {
        Slot::String(Arc::from(s))
    }
}

impl From<String> for Slot {
    fn from(s: String) -> Self {
        Slot::String(Arc::from(s))
    }
}
