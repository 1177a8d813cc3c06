use std::{any::Any, fmt, sync::Arc};

use parking_lot::RwLock;

use super::{Kind, Signature, Type};
use crate::{
    error::{Error, Result},
    state::State,
};

/// Host function body: receives exactly the declared parameters (the
/// variadic tail already packed into a slice) and returns the declared
/// results.
pub type HostFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync>;

/// Function that drives the VM stack itself and returns its result count.
pub type RawFn = Arc<dyn Fn(&mut dyn State) -> Result<usize> + Send + Sync>;

/// Shared, mutable storage behind a pointer.
pub type Cell = Arc<RwLock<Value>>;

/// Pointer target: a cell plus a field path into the struct it holds, so
/// `&outer.inner` points into `outer`'s storage.
#[derive(Clone)]
pub(crate) struct Ptr {
    cell: Cell,
    path: Vec<usize>,
}

impl Ptr {
    pub(crate) fn new(value: Value) -> Self {
        Self {
            cell: Arc::new(RwLock::new(value.detached())),
            path: Vec::new(),
        }
    }

    fn join(&self, path: &[usize]) -> Ptr {
        let mut joined = self.path.clone();
        joined.extend_from_slice(path);
        Ptr {
            cell: self.cell.clone(),
            path: joined,
        }
    }

    fn load(&self) -> Option<Value> {
        self.cell.read().field_at(&self.path)
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let mut root = self.cell.write();
        root.field_at_mut(&self.path).map(f)
    }

    fn same(&self, other: &Ptr) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell) && self.path == other.path
    }
}

/// A host value together with its runtime type.
///
/// Pointers, functions, slices and maps share their payload between clones,
/// so identity survives repeated marshaling. Structs and arrays are copied,
/// except that a value read through a pointer remembers where it lives and
/// stays addressable: field writes on it land in the pointee.
#[derive(Clone)]
pub struct Value {
    ty: Type,
    repr: Repr,
    place: Option<Ptr>,
}

#[derive(Clone)]
pub(crate) enum Repr {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    Str(Arc<str>),
    Struct(Vec<Value>),
    Array(Vec<Value>),
    Pointer(Option<Ptr>),
    Func(Option<Func>),
    Interface(Option<Box<Value>>),
    Slice(Option<Arc<RwLock<Vec<Value>>>>),
    Map(Option<Arc<RwLock<Vec<(Value, Value)>>>>),
    Opaque(Option<Arc<dyn Any + Send + Sync>>),
}

#[derive(Clone)]
pub enum Func {
    Host(HostFn),
    Raw(RawFn),
}

impl Func {
    fn addr(&self) -> *const () {
        match self {
            Func::Host(f) => Arc::as_ptr(f) as *const (),
            Func::Raw(f) => Arc::as_ptr(f) as *const (),
        }
    }

    fn same(&self, other: &Func) -> bool {
        self.addr() == other.addr()
    }
}

impl Value {
    #[inline]
    pub(crate) fn from_parts(ty: Type, repr: Repr) -> Self {
        Self { ty, repr, place: None }
    }

    fn placed(mut self, place: Ptr) -> Self {
        self.place = Some(place);
        self
    }

    /// The same value without its storage location.
    pub fn detached(&self) -> Value {
        Value::from_parts(self.ty.clone(), self.repr.clone())
    }

    /// Whether this value was read through a pointer, so its fields can be
    /// assigned.
    pub fn is_addressable(&self) -> bool {
        self.place.is_some()
    }

    /// Pointer to the storage this value was read from.
    pub fn addr(&self) -> Option<Value> {
        let place = self.place.clone()?;
        Some(Value::from_parts(Type::pointer_to(&self.ty), Repr::Pointer(Some(place))))
    }

    /// Current contents of the storage behind an addressable value; other
    /// values are returned as they are.
    pub fn reload(&self) -> Value {
        match &self.place {
            Some(place) => place.load().map_or_else(|| self.clone(), |fresh| fresh.placed(place.clone())),
            None => self.clone(),
        }
    }

    #[inline]
    pub(crate) fn repr(&self) -> &Repr {
        &self.repr
    }

    pub fn bool(b: bool) -> Self {
        Self::from_parts(Type::bool(), Repr::Bool(b))
    }

    /// An `int` value.
    pub fn int(i: i64) -> Self {
        Self::from_parts(Type::int(), Repr::Int(i))
    }

    /// A `float64` value.
    pub fn float(f: f64) -> Self {
        Self::from_parts(Type::float64(), Repr::Float(f))
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Self::from_parts(Type::string(), Repr::Str(Arc::from(s.as_ref())))
    }

    pub fn complex(re: f64, im: f64) -> Self {
        Self::from_parts(Type::complex128(), Repr::Complex(re, im))
    }

    /// Struct value; each field is converted to its declared type.
    pub fn structure(ty: &Type, fields: Vec<Value>) -> Result<Self> {
        if ty.kind() != Kind::Struct {
            return Err(Error::mismatch("struct", ty.name()));
        }
        let declared = ty.fields();
        if declared.len() != fields.len() {
            return Err(Error::Internal(format!(
                "{} has {} fields, got {}",
                ty,
                declared.len(),
                fields.len()
            )));
        }
        let fields = fields
            .into_iter()
            .zip(declared)
            .map(|(value, field)| value.detached().convert(field.ty()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_parts(ty.clone(), Repr::Struct(fields)))
    }

    /// Fresh pointer to a copy of `value`.
    pub fn pointer_to(value: Value) -> Self {
        let ty = Type::pointer_to(&value.ty);
        Self::from_parts(ty, Repr::Pointer(Some(Ptr::new(value))))
    }

    /// Function value backed by a host closure.
    pub fn func(
        sig: Signature,
        f: impl Fn(&[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self::from_parts(Type::func(sig), Repr::Func(Some(Func::Host(Arc::new(f)))))
    }

    /// Function with the `func(*State) int` shape: it reads its arguments
    /// from the stack and returns how many results it pushed.
    pub fn raw_func(f: impl Fn(&mut dyn State) -> Result<usize> + Send + Sync + 'static) -> Self {
        let sig = Signature::new([Type::state()], [Type::int()]);
        Self::from_parts(Type::func(sig), Repr::Func(Some(Func::Raw(Arc::new(f)))))
    }

    /// Wrap `value` in the interface type `iface`.
    pub fn interface(iface: &Type, value: Value) -> Result<Self> {
        value.convert(iface)
    }

    pub fn slice(elem: &Type, items: Vec<Value>) -> Result<Self> {
        let items = items.into_iter().map(|v| v.convert(elem)).collect::<Result<Vec<_>>>()?;
        Ok(Self::from_parts(
            Type::slice_of(elem),
            Repr::Slice(Some(Arc::new(RwLock::new(items)))),
        ))
    }

    pub fn array(elem: &Type, items: Vec<Value>) -> Result<Self> {
        let ty = Type::array_of(elem, items.len());
        let items = items.into_iter().map(|v| v.convert(elem)).collect::<Result<Vec<_>>>()?;
        Ok(Self::from_parts(ty, Repr::Array(items)))
    }

    pub fn map(key: &Type, value: &Type, entries: Vec<(Value, Value)>) -> Result<Self> {
        let entries = entries
            .into_iter()
            .map(|(k, v)| Ok((k.convert(key)?, v.convert(value)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_parts(
            Type::map_of(key, value),
            Repr::Map(Some(Arc::new(RwLock::new(entries)))),
        ))
    }

    /// Channel handle; the payload is opaque to the bindings.
    pub fn chan(elem: &Type, handle: Arc<dyn Any + Send + Sync>) -> Self {
        Self::from_parts(Type::chan_of(elem), Repr::Opaque(Some(handle)))
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }

    /// True for nil pointers, functions, interfaces, slices, maps and channels.
    pub fn is_nil(&self) -> bool {
        match &self.repr {
            Repr::Pointer(p) => p.is_none(),
            Repr::Func(f) => f.is_none(),
            Repr::Interface(i) => i.is_none(),
            Repr::Slice(s) => s.is_none(),
            Repr::Map(m) => m.is_none(),
            Repr::Opaque(o) => o.is_none(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.repr {
            Repr::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.repr {
            Repr::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.repr {
            Repr::Uint(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.repr {
            Repr::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<(f64, f64)> {
        match self.repr {
            Repr::Complex(re, im) => Some((re, im)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.repr {
            Repr::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Func> {
        match &self.repr {
            Repr::Func(f) => f.as_ref(),
            _ => None,
        }
    }

    /// Struct fields in declaration order.
    pub fn fields(&self) -> Option<&[Value]> {
        match &self.repr {
            Repr::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Snapshot of the elements of a slice or array.
    pub fn items(&self) -> Option<Vec<Value>> {
        match &self.repr {
            Repr::Slice(Some(items)) => Some(items.read().clone()),
            Repr::Slice(None) => Some(Vec::new()),
            Repr::Array(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// Addressable pointee for pointers, dynamic value for interfaces.
    pub fn elem(&self) -> Option<Value> {
        match &self.repr {
            Repr::Pointer(Some(ptr)) => ptr.load().map(|pointee| pointee.placed(ptr.clone())),
            Repr::Interface(Some(inner)) => Some((**inner).clone()),
            _ => None,
        }
    }

    /// Mutate the pointee in place. `None` unless this is a non-nil pointer.
    pub fn with_elem_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        match &self.repr {
            Repr::Pointer(Some(ptr)) => ptr.with_mut(f),
            _ => None,
        }
    }

    /// Mutate the struct this value designates: the pointee of a pointer,
    /// or the storage an addressable struct was read from.
    pub(crate) fn with_target_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        match (&self.repr, &self.place) {
            (Repr::Pointer(Some(ptr)), _) => ptr.with_mut(f),
            (Repr::Struct(_), Some(place)) => place.with_mut(f),
            _ => None,
        }
    }

    pub(crate) fn fields_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.repr {
            Repr::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Struct field by name (embedded fields promoted). Reads through one
    /// pointer, never through an interface. Fields of addressable structs
    /// are read from their storage and stay addressable.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self.kind() {
            Kind::Struct => {
                let path = self.ty.field_path(name)?;
                self.sub_value(&path)
            }
            Kind::Pointer => self.elem().filter(|e| e.kind() == Kind::Struct)?.field(name),
            _ => None,
        }
    }

    fn sub_value(&self, path: &[usize]) -> Option<Value> {
        match &self.place {
            Some(place) => {
                let place = place.join(path);
                place.load().map(|value| value.placed(place))
            }
            None => self.field_at(path),
        }
    }

    pub(crate) fn field_at(&self, path: &[usize]) -> Option<Value> {
        let mut current = self;
        for idx in path {
            current = current.fields()?.get(*idx)?;
        }
        Some(current.clone())
    }

    pub(crate) fn field_at_mut(&mut self, path: &[usize]) -> Option<&mut Value> {
        let mut current = self;
        for idx in path {
            current = current.fields_mut()?.get_mut(*idx)?;
        }
        Some(current)
    }

    /// Bound method value resolved through this value's method set,
    /// including methods promoted from embedded structs.
    ///
    /// Interfaces expose only the methods their type requires, resolved on
    /// the dynamic value.
    pub fn method(&self, name: &str) -> Option<Value> {
        if self.kind() == Kind::Interface {
            if !self.ty.required_methods().iter().any(|m| m.name == name) {
                return None;
            }
            return self.elem()?.method(name);
        }
        let found = self.ty.resolve_method(name)?;
        if found.path.is_empty() && found.pointer_receiver {
            return Some(found.method.bind(self.clone()));
        }
        let receiver = match &self.repr {
            Repr::Pointer(Some(ptr)) => {
                let inner = ptr.join(&found.path);
                if found.pointer_receiver {
                    Value::from_parts(Type::pointer_to(&found.owner), Repr::Pointer(Some(inner)))
                } else {
                    inner.load()?.placed(inner)
                }
            }
            Repr::Pointer(None) => return None,
            _ => self.sub_value(&found.path)?,
        };
        Some(found.method.bind(receiver))
    }

    /// Invoke a host function value directly, without the VM.
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>> {
        match self.as_func() {
            Some(Func::Host(f)) => f(args).map_err(Error::from_host),
            Some(Func::Raw(_)) => Err(Error::mismatch("host function", "raw function")),
            None if self.kind() == Kind::Func => Err(Error::Runtime("call of nil function".to_string())),
            None => Err(Error::mismatch("func", self.ty.name())),
        }
    }
}

impl PartialEq for Value {
    /// Host equality: value equality for scalars, structs and arrays,
    /// identity for pointers, functions, slices, maps and channels, and
    /// dynamic-value equality for interfaces.
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (&self.repr, &other.repr) {
            (Repr::Bool(a), Repr::Bool(b)) => a == b,
            (Repr::Int(a), Repr::Int(b)) => a == b,
            (Repr::Uint(a), Repr::Uint(b)) => a == b,
            (Repr::Float(a), Repr::Float(b)) => a == b,
            (Repr::Complex(ar, ai), Repr::Complex(br, bi)) => ar == br && ai == bi,
            (Repr::Str(a), Repr::Str(b)) => a == b,
            (Repr::Struct(a), Repr::Struct(b)) | (Repr::Array(a), Repr::Array(b)) => a == b,
            (Repr::Pointer(a), Repr::Pointer(b)) => match (a, b) {
                (Some(a), Some(b)) => a.same(b),
                (None, None) => true,
                _ => false,
            },
            (Repr::Func(a), Repr::Func(b)) => match (a, b) {
                (Some(a), Some(b)) => a.same(b),
                (None, None) => true,
                _ => false,
            },
            (Repr::Interface(a), Repr::Interface(b)) => match (a, b) {
                (Some(a), Some(b)) => a == b,
                (None, None) => true,
                _ => false,
            },
            (Repr::Slice(a), Repr::Slice(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (Repr::Map(a), Repr::Map(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (Repr::Opaque(a), Repr::Opaque(b)) => match (a, b) {
                (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Value {
    // Go-syntax-like rendering. Nested pointers print as addresses so
    // self-referential structures terminate.
    fn write_debug(&self, f: &mut fmt::Formatter<'_>, top: bool) -> fmt::Result {
        match &self.repr {
            Repr::Bool(b) => write!(f, "{}", b),
            Repr::Int(i) => write!(f, "{}", i),
            Repr::Uint(u) => write!(f, "{}", u),
            Repr::Float(x) => write!(f, "{}", x),
            Repr::Complex(re, im) => write!(f, "({}{:+}i)", re, im),
            Repr::Str(s) => write!(f, "{:?}", s),
            Repr::Struct(values) => {
                write!(f, "{}{{", self.ty)?;
                for (i, (field, value)) in self.ty.fields().iter().zip(values).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}:", field.name())?;
                    value.write_debug(f, false)?;
                }
                f.write_str("}")
            }
            Repr::Array(items) => {
                write!(f, "{}{{", self.ty)?;
                write_items(f, items)?;
                f.write_str("}")
            }
            Repr::Pointer(None) | Repr::Func(None) | Repr::Slice(None) | Repr::Map(None) | Repr::Opaque(None) => {
                write!(f, "({})(nil)", self.ty)
            }
            Repr::Interface(None) => write!(f, "{}(nil)", self.ty),
            Repr::Pointer(Some(ptr)) => match ptr.load() {
                Some(pointee) if top && pointee.kind() == Kind::Struct => {
                    f.write_str("&")?;
                    pointee.write_debug(f, false)
                }
                _ => write!(f, "({})({:p})", self.ty, Arc::as_ptr(&ptr.cell)),
            },
            Repr::Func(Some(func)) => write!(f, "({})({:p})", self.ty, func.addr()),
            Repr::Interface(Some(inner)) => inner.write_debug(f, top),
            Repr::Slice(Some(items)) => {
                write!(f, "{}{{", self.ty)?;
                write_items(f, &items.read())?;
                f.write_str("}")
            }
            Repr::Map(Some(entries)) => {
                write!(f, "{}{{", self.ty)?;
                for (i, (k, v)) in entries.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    k.write_debug(f, false)?;
                    f.write_str(":")?;
                    v.write_debug(f, false)?;
                }
                f.write_str("}")
            }
            Repr::Opaque(Some(handle)) => write!(f, "({})({:p})", self.ty, Arc::as_ptr(handle)),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.write_debug(f, false)?;
    }
    Ok(())
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_debug(f, true)
    }
}
