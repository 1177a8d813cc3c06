use super::*;

fn noop(_: &Value, _: &[Value]) -> anyhow::Result<Vec<Value>> {
    Ok(Vec::new())
}

#[test]
fn composites_are_canonical() {
    assert_eq!(Type::pointer_to(&Type::int()), Type::pointer_to(&Type::int()));
    assert_eq!(Type::slice_of(&Type::string()), Type::slice_of(&Type::string()));
    assert_ne!(Type::slice_of(&Type::string()), Type::slice_of(&Type::int()));
    assert_ne!(Type::array_of(&Type::int(), 2), Type::array_of(&Type::int(), 3));

    let sig = || Signature::new([Type::int(), Type::int()], [Type::int()]);
    assert_eq!(Type::func(sig()), Type::func(sig()));
}

#[test]
fn named_types_are_distinct() {
    let a = TypeBuilder::new_struct("Point").field("X", Type::int()).build();
    let b = TypeBuilder::new_struct("Point").field("X", Type::int()).build();
    assert_ne!(a, b);
    assert_eq!(a.name(), "Point");
    assert_eq!(Type::pointer_to(&a).name(), "*Point");
}

#[test]
fn composite_names() {
    assert_eq!(Type::slice_of(&Type::int()).to_string(), "[]int");
    assert_eq!(Type::array_of(&Type::uint8(), 4).to_string(), "[4]uint8");
    assert_eq!(Type::map_of(&Type::string(), &Type::float64()).to_string(), "map[string]float64");
    assert_eq!(Type::chan_of(&Type::bool()).to_string(), "chan bool");
}

#[test]
fn signature_display_and_shape() {
    let sig = Signature::variadic([Type::int()], &Type::string(), [Type::int()]);
    assert_eq!(sig.to_string(), "func(int, ...string) int");
    assert!(sig.is_variadic());
    assert_eq!(sig.num_in(), 2);
    assert_eq!(sig.variadic_elem(), Some(&Type::string()));
    assert_eq!(sig.params()[1], Type::slice_of(&Type::string()));

    let multi = Signature::new([], [Type::int(), Type::string()]);
    assert_eq!(multi.to_string(), "func() (int, string)");
    assert_eq!(multi.variadic_elem(), None);
}

#[test]
fn raw_shape_is_detected() {
    assert!(Signature::new([Type::state()], [Type::int()]).is_raw());
    assert!(!Signature::new([Type::state()], [Type::int64()]).is_raw());
    assert!(!Signature::new([Type::int()], [Type::int()]).is_raw());
}

#[test]
fn field_path_promotes_embedded_fields() {
    let base = TypeBuilder::new_struct("Base")
        .field("ID", Type::int())
        .field("Shared", Type::string())
        .build();
    let outer = TypeBuilder::new_struct("Outer")
        .field("Name", Type::string())
        .embed(base.clone())
        .field("Shared", Type::bool())
        .build();

    assert_eq!(outer.field_path("Name"), Some(vec![0]));
    assert_eq!(outer.field_path("ID"), Some(vec![1, 0]));
    assert_eq!(outer.field_path("Base"), Some(vec![1]));
    // direct fields shadow promoted ones
    assert_eq!(outer.field_path("Shared"), Some(vec![2]));
    assert_eq!(outer.field_path("Missing"), None);
    assert_eq!(Type::int().field_path("ID"), None);
}

#[test]
fn self_referential_struct() {
    let builder = TypeBuilder::new_struct("Node");
    let node = builder.ty();
    let node = builder
        .field("Value", Type::int())
        .field("Next", Type::pointer_to(&node))
        .build();
    assert_eq!(node.fields()[1].ty().elem(), Some(&node));
}

#[test]
fn pointer_method_sets() {
    let sig = Signature::new([], []);
    let counter = TypeBuilder::new_struct("Counter")
        .field("N", Type::int())
        .method("Get", sig.clone(), noop)
        .pointer_method("Incr", sig, noop)
        .build();
    let ptr = Type::pointer_to(&counter);

    assert!(counter.find_method("Get").is_some());
    assert!(counter.find_method("Incr").is_none());
    assert!(ptr.find_method("Get").is_some());
    assert!(ptr.find_method("Incr").is_some());
    assert_eq!(ptr.methods().len(), 1);
}

#[test]
fn interface_satisfaction() {
    let speak = Signature::new([], [Type::string()]);
    let speaker = TypeBuilder::new_interface("Speaker").requires("Speak", speak.clone()).build();

    let dog = TypeBuilder::new_struct("Dog").method("Speak", speak.clone(), noop).build();
    let cat = TypeBuilder::new_struct("Cat").pointer_method("Speak", speak, noop).build();
    let rock = TypeBuilder::new_struct("Rock").build();
    let wrong = TypeBuilder::new_struct("Parrot")
        .method("Speak", Signature::new([Type::int()], [Type::string()]), noop)
        .build();

    assert!(dog.implements(&speaker));
    assert!(Type::pointer_to(&dog).implements(&speaker));
    assert!(!cat.implements(&speaker));
    assert!(Type::pointer_to(&cat).implements(&speaker));
    assert!(!rock.implements(&speaker));
    assert!(!wrong.implements(&speaker));
    assert!(speaker.implements(&speaker));
    assert!(rock.implements(&Type::any()));
    assert!(!rock.implements(&Type::int()));
}

#[test]
fn read_only_and_embedded_fields() {
    let inner = TypeBuilder::new_struct("Inner").build();
    let ty = TypeBuilder::new_struct("Config")
        .read_only_field("Version", Type::string())
        .embed(inner)
        .build();
    let fields = ty.fields();
    assert!(fields[0].is_read_only());
    assert!(!fields[0].is_embedded());
    assert!(fields[1].is_embedded());
    assert_eq!(fields[1].name(), "Inner");
}

#[test]
fn embedded_methods_are_promoted() {
    let hello = Signature::new([], [Type::string()]);
    let greeter = TypeBuilder::new_interface("Greeter").requires("Hello", hello.clone()).build();
    let bumper = TypeBuilder::new_interface("Bumper")
        .requires("Bump", Signature::new([], []))
        .build();
    let inner = TypeBuilder::new_struct("Inner")
        .method("Hello", hello, noop)
        .pointer_method("Bump", Signature::new([], []), noop)
        .build();
    let outer = TypeBuilder::new_struct("Outer")
        .field("Name", Type::string())
        .embed(inner)
        .build();
    let ptr = Type::pointer_to(&outer);

    assert!(outer.find_method("Hello").is_some());
    assert!(outer.find_method("Bump").is_none());
    assert!(ptr.find_method("Bump").is_some());

    let found = ptr.resolve_method("Bump").unwrap();
    assert_eq!(found.path, vec![1]);
    assert_eq!(found.owner.name(), "Inner");
    assert!(found.pointer_receiver);

    assert!(outer.implements(&greeter));
    assert!(!outer.implements(&bumper));
    assert!(ptr.implements(&bumper));
}

#[test]
fn shallower_methods_shadow_promoted_ones() {
    let hello = Signature::new([], [Type::string()]);
    let inner = TypeBuilder::new_struct("Inner").method("Hello", hello.clone(), noop).build();
    let outer = TypeBuilder::new_struct("Outer")
        .embed(inner)
        .method("Hello", hello, noop)
        .build();
    assert!(outer.resolve_method("Hello").unwrap().path.is_empty());
}
