use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};

use super::{Kind, Value};

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

// Canonical descriptors for primitives and unnamed composites, keyed by
// structure (element ids), so building the same composite twice yields the
// same descriptor.
static CANONICAL: Lazy<DashMap<String, Type>> = Lazy::new(DashMap::new);

/// Host method implementation: receiver first, then the declared parameters.
pub type MethodFn = Arc<dyn Fn(&Value, &[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync>;

/// Runtime descriptor of a host type.
///
/// Cloning is cheap; equality and hashing use the descriptor identity.
#[derive(Clone)]
pub struct Type(Arc<TypeInfo>);

struct TypeInfo {
    id: u64,
    name: String,
    kind: Kind,
    elem: Option<Type>,
    key: Option<Type>,
    len: usize,
    sig: Option<Signature>,
    fields: OnceCell<Vec<Field>>,
    methods: OnceCell<Vec<Method>>,
    requires: OnceCell<Vec<MethodSpec>>,
}

impl TypeInfo {
    fn new(name: String, kind: Kind) -> Self {
        Self {
            id: NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            kind,
            elem: None,
            key: None,
            len: 0,
            sig: None,
            fields: OnceCell::new(),
            methods: OnceCell::new(),
            requires: OnceCell::new(),
        }
    }
}

fn canonical(key: String, make: impl FnOnce() -> TypeInfo) -> Type {
    if let Some(found) = CANONICAL.get(&key) {
        return found.clone();
    }
    CANONICAL.entry(key).or_insert_with(|| Type(Arc::new(make()))).clone()
}

fn primitive(kind: Kind) -> Type {
    canonical(format!("prim:{}", kind.name()), || TypeInfo::new(kind.name().to_string(), kind))
}

impl Type {
    pub fn bool() -> Type {
        primitive(Kind::Bool)
    }
    pub fn int() -> Type {
        primitive(Kind::Int)
    }
    pub fn int8() -> Type {
        primitive(Kind::Int8)
    }
    pub fn int16() -> Type {
        primitive(Kind::Int16)
    }
    pub fn int32() -> Type {
        primitive(Kind::Int32)
    }
    pub fn int64() -> Type {
        primitive(Kind::Int64)
    }
    pub fn uint() -> Type {
        primitive(Kind::Uint)
    }
    pub fn uint8() -> Type {
        primitive(Kind::Uint8)
    }
    pub fn uint16() -> Type {
        primitive(Kind::Uint16)
    }
    pub fn uint32() -> Type {
        primitive(Kind::Uint32)
    }
    pub fn uint64() -> Type {
        primitive(Kind::Uint64)
    }
    pub fn uintptr() -> Type {
        primitive(Kind::Uintptr)
    }
    pub fn float32() -> Type {
        primitive(Kind::Float32)
    }
    pub fn float64() -> Type {
        primitive(Kind::Float64)
    }
    pub fn complex64() -> Type {
        primitive(Kind::Complex64)
    }
    pub fn complex128() -> Type {
        primitive(Kind::Complex128)
    }
    pub fn string() -> Type {
        primitive(Kind::String)
    }
    pub fn unsafe_pointer() -> Type {
        primitive(Kind::UnsafePointer)
    }

    /// The empty interface; every type implements it.
    pub fn any() -> Type {
        canonical("iface:any".to_string(), || {
            let info = TypeInfo::new("interface {}".to_string(), Kind::Interface);
            let _ = info.requires.set(Vec::new());
            info
        })
    }

    /// Pointer to the VM state, the single parameter of raw functions.
    pub fn state() -> Type {
        canonical("state".to_string(), || TypeInfo::new("*State".to_string(), Kind::UnsafePointer))
    }

    pub fn pointer_to(elem: &Type) -> Type {
        canonical(format!("ptr:{}", elem.id()), || {
            let mut info = TypeInfo::new(format!("*{}", elem.name()), Kind::Pointer);
            info.elem = Some(elem.clone());
            info
        })
    }

    pub fn slice_of(elem: &Type) -> Type {
        canonical(format!("slice:{}", elem.id()), || {
            let mut info = TypeInfo::new(format!("[]{}", elem.name()), Kind::Slice);
            info.elem = Some(elem.clone());
            info
        })
    }

    pub fn array_of(elem: &Type, len: usize) -> Type {
        canonical(format!("array:{}:{}", len, elem.id()), || {
            let mut info = TypeInfo::new(format!("[{}]{}", len, elem.name()), Kind::Array);
            info.elem = Some(elem.clone());
            info.len = len;
            info
        })
    }

    pub fn map_of(key: &Type, value: &Type) -> Type {
        canonical(format!("map:{}:{}", key.id(), value.id()), || {
            let mut info = TypeInfo::new(format!("map[{}]{}", key.name(), value.name()), Kind::Map);
            info.key = Some(key.clone());
            info.elem = Some(value.clone());
            info
        })
    }

    pub fn chan_of(elem: &Type) -> Type {
        canonical(format!("chan:{}", elem.id()), || {
            let mut info = TypeInfo::new(format!("chan {}", elem.name()), Kind::Chan);
            info.elem = Some(elem.clone());
            info
        })
    }

    pub fn func(sig: Signature) -> Type {
        canonical(format!("func:{}", sig.key()), || {
            let mut info = TypeInfo::new(sig.to_string(), Kind::Func);
            info.sig = Some(sig);
            info
        })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    /// Element type of pointers, slices, arrays, channels and maps.
    pub fn elem(&self) -> Option<&Type> {
        self.0.elem.as_ref()
    }

    pub fn key(&self) -> Option<&Type> {
        self.0.key.as_ref()
    }

    pub fn array_len(&self) -> usize {
        self.0.len
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.0.sig.as_ref()
    }

    pub fn fields(&self) -> &[Field] {
        self.0.fields.get().map_or(&[], Vec::as_slice)
    }

    /// Methods declared on this exact type (not including the pointee's).
    pub fn methods(&self) -> &[Method] {
        self.0.methods.get().map_or(&[], Vec::as_slice)
    }

    /// Methods an interface type requires.
    pub fn required_methods(&self) -> &[MethodSpec] {
        self.0.requires.get().map_or(&[], Vec::as_slice)
    }

    pub fn method_by_name(&self, name: &str) -> Option<&Method> {
        self.methods().iter().find(|m| m.name() == name)
    }

    /// Method set lookup: a pointer also exposes the pointee's methods, and
    /// methods of embedded structs are promoted.
    pub fn find_method(&self, name: &str) -> Option<Method> {
        self.resolve_method(name).map(|found| found.method)
    }

    /// Where `name` lives in this type's method set. Pointers see both
    /// receiver kinds of the pointee and of every embedded struct; values
    /// see value receivers only.
    pub(crate) fn resolve_method(&self, name: &str) -> Option<MethodRef> {
        let (root, via_pointer) = match self.kind() {
            Kind::Pointer => (self.elem()?, true),
            Kind::Interface => return None,
            _ => (self, false),
        };
        root.walk_embedded(|ty, path| {
            let on_pointer = if via_pointer {
                Type::pointer_to(ty).method_by_name(name).cloned()
            } else {
                None
            };
            let (method, pointer_receiver) = match on_pointer {
                Some(method) => (method, true),
                None => (ty.method_by_name(name)?.clone(), false),
            };
            Some(MethodRef {
                path: path.to_vec(),
                owner: ty.clone(),
                method,
                pointer_receiver,
            })
        })
    }

    /// Index path to a struct field, descending into embedded structs
    /// breadth-first when the name is not a direct field.
    pub fn field_path(&self, name: &str) -> Option<Vec<usize>> {
        if self.kind() != Kind::Struct {
            return None;
        }
        self.walk_embedded(|ty, prefix| {
            let idx = ty.fields().iter().position(|field| field.name() == name)?;
            let mut path = prefix.to_vec();
            path.push(idx);
            Some(path)
        })
    }

    // Breadth-first over this type and its embedded structs, shallowest
    // first; `visit` gets each type with its field path from `self`.
    fn walk_embedded<T>(&self, mut visit: impl FnMut(&Type, &[usize]) -> Option<T>) -> Option<T> {
        let mut level: Vec<(Type, Vec<usize>)> = vec![(self.clone(), Vec::new())];
        while !level.is_empty() {
            let mut next = Vec::new();
            for (ty, prefix) in &level {
                if let Some(found) = visit(ty, prefix) {
                    return Some(found);
                }
                for (idx, field) in ty.fields().iter().enumerate() {
                    if field.is_embedded() && field.ty().kind() == Kind::Struct {
                        let mut path = prefix.clone();
                        path.push(idx);
                        next.push((field.ty().clone(), path));
                    }
                }
            }
            level = next;
        }
        None
    }

    /// Whether values of this type can be stored in the interface type `iface`.
    pub fn implements(&self, iface: &Type) -> bool {
        if iface.kind() != Kind::Interface {
            return false;
        }
        iface.required_methods().iter().all(|want| {
            if self.kind() == Kind::Interface {
                return self
                    .required_methods()
                    .iter()
                    .any(|own| own.name == want.name && own.sig == want.sig);
            }
            self.find_method(&want.name).is_some_and(|m| m.sig == want.sig)
        })
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    ty: Type,
    embedded: bool,
    read_only: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: false,
            read_only: false,
        }
    }

    /// Anonymous field named after its type; its fields are promoted.
    pub fn embedded(ty: Type) -> Self {
        Self {
            name: ty.name().to_string(),
            ty,
            embedded: true,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Parameter and result types of a function.
///
/// For variadic signatures the last parameter is a slice whose element type
/// receives the trailing arguments.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<Type>,
    returns: Vec<Type>,
    variadic: bool,
}

impl Signature {
    pub fn new(params: impl IntoIterator<Item = Type>, returns: impl IntoIterator<Item = Type>) -> Self {
        Self {
            params: params.into_iter().collect(),
            returns: returns.into_iter().collect(),
            variadic: false,
        }
    }

    /// `fixed..., ...rest`: the trailing parameter becomes `[]rest`.
    pub fn variadic(
        fixed: impl IntoIterator<Item = Type>,
        rest: &Type,
        returns: impl IntoIterator<Item = Type>,
    ) -> Self {
        let mut params: Vec<Type> = fixed.into_iter().collect();
        params.push(Type::slice_of(rest));
        Self {
            params,
            returns: returns.into_iter().collect(),
            variadic: true,
        }
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn returns(&self) -> &[Type] {
        &self.returns
    }

    pub fn num_in(&self) -> usize {
        self.params.len()
    }

    pub fn num_out(&self) -> usize {
        self.returns.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Element type of the variadic tail.
    pub fn variadic_elem(&self) -> Option<&Type> {
        if !self.variadic {
            return None;
        }
        self.params.last().and_then(Type::elem)
    }

    /// `func(*State) int`: the shape invoked without argument marshaling.
    pub fn is_raw(&self) -> bool {
        !self.variadic
            && self.params.len() == 1
            && self.params[0] == Type::state()
            && self.returns.len() == 1
            && self.returns[0] == Type::int()
    }

    fn key(&self) -> String {
        let ids = |types: &[Type]| types.iter().map(|t| t.id().to_string()).collect::<Vec<_>>().join(",");
        format!("({}){}->({})", ids(&self.params), if self.variadic { "..." } else { "" }, ids(&self.returns))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("func(")?;
        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match param.elem() {
                Some(elem) if self.variadic && i == last => write!(f, "...{}", elem)?,
                _ => write!(f, "{}", param)?,
            }
        }
        f.write_str(")")?;
        match self.returns.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " {}", single),
            many => {
                let names: Vec<&str> = many.iter().map(Type::name).collect();
                write!(f, " ({})", names.join(", "))
            }
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A method declared on a named type.
#[derive(Clone)]
pub struct Method {
    name: String,
    sig: Signature,
    imp: MethodFn,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        sig: Signature,
        imp: impl Fn(&Value, &[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            sig,
            imp: Arc::new(imp),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    /// Method value with `receiver` bound, callable like a plain function.
    pub fn bind(&self, receiver: Value) -> Value {
        let imp = self.imp.clone();
        Value::func(self.sig.clone(), move |args| imp(&receiver, args))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("sig", &self.sig)
            .finish()
    }
}

/// A method found in a method set, possibly promoted from the embedded
/// struct at `path`.
pub(crate) struct MethodRef {
    pub path: Vec<usize>,
    pub owner: Type,
    pub method: Method,
    pub pointer_receiver: bool,
}

/// Method required by an interface type.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSpec {
    pub name: String,
    pub sig: Signature,
}

/// Declares named host types: structs, interfaces and named primitives.
///
/// The declared type exists from `new_*` on, so fields may refer to it
/// (e.g. a `*Node` field inside `Node`).
pub struct TypeBuilder {
    ty: Type,
    fields: Vec<Field>,
    methods: Vec<Method>,
    pointer_methods: Vec<Method>,
    requires: Vec<MethodSpec>,
}

impl TypeBuilder {
    fn declare(name: &str, kind: Kind) -> Self {
        Self {
            ty: Type(Arc::new(TypeInfo::new(name.to_string(), kind))),
            fields: Vec::new(),
            methods: Vec::new(),
            pointer_methods: Vec::new(),
            requires: Vec::new(),
        }
    }

    pub fn new_struct(name: &str) -> Self {
        Self::declare(name, Kind::Struct)
    }

    pub fn new_interface(name: &str) -> Self {
        Self::declare(name, Kind::Interface)
    }

    /// Named type over a primitive kind, e.g. `type Celsius float64`.
    pub fn new_named(name: &str, underlying: Kind) -> Self {
        Self::declare(name, underlying)
    }

    /// The type being declared.
    pub fn ty(&self) -> Type {
        self.ty.clone()
    }

    pub fn field(mut self, name: &str, ty: Type) -> Self {
        self.fields.push(Field::new(name, ty));
        self
    }

    pub fn read_only_field(mut self, name: &str, ty: Type) -> Self {
        self.fields.push(Field::new(name, ty).read_only());
        self
    }

    pub fn embed(mut self, ty: Type) -> Self {
        self.fields.push(Field::embedded(ty));
        self
    }

    /// Method with a value receiver; available on `T` and `*T`.
    pub fn method(
        mut self,
        name: &str,
        sig: Signature,
        imp: impl Fn(&Value, &[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(Method::new(name, sig, imp));
        self
    }

    /// Method with a pointer receiver; available on `*T` only.
    pub fn pointer_method(
        mut self,
        name: &str,
        sig: Signature,
        imp: impl Fn(&Value, &[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.pointer_methods.push(Method::new(name, sig, imp));
        self
    }

    /// Method an interface type requires.
    pub fn requires(mut self, name: &str, sig: Signature) -> Self {
        self.requires.push(MethodSpec {
            name: name.to_string(),
            sig,
        });
        self
    }

    pub fn build(self) -> Type {
        let info = &self.ty.0;
        match info.kind {
            Kind::Struct => {
                let _ = info.fields.set(self.fields);
            }
            Kind::Interface => {
                let _ = info.requires.set(self.requires);
            }
            _ => {}
        }
        if info.kind != Kind::Interface {
            let _ = info.methods.set(self.methods);
            if !self.pointer_methods.is_empty() {
                let ptr = Type::pointer_to(&self.ty);
                if ptr.0.methods.set(self.pointer_methods).is_err() {
                    tracing::warn!(ty = %self.ty, "pointer methods already declared; keeping the first set");
                }
            }
        }
        self.ty
    }
}
