//! End-to-end behaviour as seen from script code driving the VM.

use reflua_core::{
    Error, Kind, Options, Signature, State, Type, TypeBuilder, Value, pull, push, push_type, push_value,
    set_options,
    vm::{Slot, Vm},
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn global(vm: &mut Vm, name: &str, value: &Value) {
    push(vm, value).expect("push global");
    vm.pop_global(name);
}

#[test]
fn struct_fields_are_readable() {
    init_tracing();
    let mut vm = Vm::new();
    let point = TypeBuilder::new_struct("Point")
        .field("Name", Type::string())
        .field("X", Type::int())
        .build();
    let p = Value::structure(&point, vec![Value::string("a"), Value::int(1)]).unwrap();
    global(&mut vm, "p", &p);

    let handle = vm.global("p");
    let name = vm.index(&handle, "Name").unwrap();
    assert_eq!(name.as_text().as_deref(), Some("a"));
    assert_eq!(vm.index(&handle, "X").unwrap().as_number(), Some(1.0));
}

#[test]
fn unexported_field_write_through_pointer() {
    init_tracing();
    let mut vm = Vm::new();
    set_options(&mut vm, Options {
        allow_unexported_access: true,
    });
    let counter = TypeBuilder::new_struct("Counter").field("count", Type::int()).build();
    let ptr = Value::pointer_to(counter.zero());
    global(&mut vm, "obj", &ptr);

    let obj = vm.global("obj");
    vm.set_index(&obj, "count", 5.0).unwrap();
    assert_eq!(vm.index(&obj, "count").unwrap().as_number(), Some(5.0));
    // the host sees the write
    assert_eq!(ptr.field("count").and_then(|v| v.as_i64()), Some(5));
}

#[test]
fn unexported_field_is_hidden_by_default() {
    let mut vm = Vm::new();
    let counter = TypeBuilder::new_struct("Counter").field("count", Type::int()).build();
    global(&mut vm, "obj", &Value::pointer_to(counter.zero()));

    let obj = vm.global("obj");
    let read = vm.index(&obj, "count").unwrap_err();
    let write = vm.set_index(&obj, "count", 5.0).unwrap_err();
    assert_eq!(read, Error::FieldNotFound("count".into()));
    assert_eq!(write, Error::FieldNotFound("count".into()));
}

#[test]
fn fixed_arity_call() {
    let mut vm = Vm::new();
    global(&mut vm, "f", &Value::from_fn(|a: isize, b: isize| a + b));
    let f = vm.global("f");

    let out = vm.call(&f, vec![2.0.into(), 3.0.into()]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].as_number(), Some(5.0));

    let err = vm.call(&f, vec![2.0.into()]).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { got: 1, expected: 2, .. }));
}

#[test]
fn variadic_call() {
    let mut vm = Vm::new();
    let sig = Signature::variadic([Type::int()], &Type::string(), [Type::int()]);
    let f = Value::func(sig, |args| {
        let base = args[0].as_i64().unwrap_or_default();
        let rest = args[1].items().map(|items| items.len()).unwrap_or_default();
        Ok(vec![Value::int(base + rest as i64)])
    });
    global(&mut vm, "f", &f);
    let f = vm.global("f");

    let out = vm.call(&f, vec![1.0.into()]).unwrap();
    assert_eq!(out[0].as_number(), Some(1.0));
    let out = vm.call(&f, vec![1.0.into(), "x".into(), "y".into()]).unwrap();
    assert_eq!(out[0].as_number(), Some(3.0));
}

#[test]
fn nil_pointer_is_nil() {
    let mut vm = Vm::new();
    let point = TypeBuilder::new_struct("Point").build();
    push(&mut vm, &Type::pointer_to(&point).zero()).unwrap();
    assert_eq!(vm.top(), 1);
    assert!(vm.slot_at(-1).is_nil());
}

#[test]
fn slices_are_not_pushed() {
    let mut vm = Vm::new();
    let slice = Value::slice(&Type::int(), vec![Value::int(1), Value::int(2)]).unwrap();
    let err = push(&mut vm, &slice).unwrap_err();
    assert!(matches!(err, Error::UnsupportedKind { kind: "slice", .. }));
    assert_eq!(vm.top(), 0);
}

#[test]
fn handle_identity_and_equality() {
    let mut vm = Vm::new();
    let point = TypeBuilder::new_struct("Point").field("X", Type::int()).build();
    let a = Value::structure(&point, vec![Value::int(1)]).unwrap();
    let b = Value::structure(&point, vec![Value::int(1)]).unwrap();
    let p = Value::pointer_to(a.clone());
    let q = Value::pointer_to(b.clone());
    let f = Value::from_fn(|| 1_i32);

    let handles: Vec<Slot> = [&a, &b, &p, &p, &q, &f, &f]
        .into_iter()
        .map(|v| {
            push(&mut vm, v).unwrap();
            vm.pop_slot()
        })
        .collect();

    assert!(vm.equals(&handles[0], &handles[1]).unwrap());
    assert!(vm.equals(&handles[2], &handles[3]).unwrap());
    assert!(!vm.equals(&handles[2], &handles[4]).unwrap());
    assert!(vm.equals(&handles[5], &handles[6]).unwrap());
}

#[test]
fn methods_and_pointer_receivers() {
    let mut vm = Vm::new();
    let builder = TypeBuilder::new_struct("Account");
    let account = builder
        .field("Balance", Type::int())
        .method("Report", Signature::new([], [Type::string()]), |recv, _| {
            let balance = recv.field("Balance").and_then(|v| v.as_i64()).unwrap_or_default();
            Ok(vec![Value::string(format!("balance={}", balance))])
        })
        .pointer_method("Deposit", Signature::new([Type::int()], []), |recv, args| {
            let amount = args[0].as_i64().unwrap_or_default();
            recv.with_elem_mut(|acc| {
                let current = acc.field("Balance").and_then(|v| v.as_i64()).unwrap_or_default();
                *acc = Value::structure(acc.ty(), vec![Value::int(current + amount)])?;
                Ok::<_, Error>(())
            })
            .transpose()?;
            Ok(Vec::new())
        })
        .build();

    let ptr = account.new_pointer();
    global(&mut vm, "acc", &ptr);
    let acc = vm.global("acc");

    let deposit = vm.index(&acc, "Deposit").unwrap();
    vm.call(&deposit, vec![30.0.into()]).unwrap();
    vm.call(&deposit, vec![12.0.into()]).unwrap();

    let report = vm.index(&acc, "Report").unwrap();
    let out = vm.call(&report, Vec::new()).unwrap();
    assert_eq!(out[0].as_text().as_deref(), Some("balance=42"));

    // the pointee's method set has value receivers only
    let copy = vm.negate(&acc).unwrap();
    assert_eq!(
        vm.index(&copy, "Deposit").unwrap_err(),
        Error::FieldNotFound("Deposit".into())
    );
}

#[test]
fn interfaces_forward_their_methods() {
    let mut vm = Vm::new();
    let name = Signature::new([], [Type::string()]);
    let named = TypeBuilder::new_interface("Named").requires("Name", name.clone()).build();
    let user = TypeBuilder::new_struct("User")
        .field("Login", Type::string())
        .method("Name", name, |recv, _| {
            Ok(vec![recv.field("Login").unwrap_or_else(|| Value::string(""))])
        })
        .build();
    let u = Value::structure(&user, vec![Value::string("root")]).unwrap();
    let boxed = Value::interface(&named, u).unwrap();
    global(&mut vm, "u", &boxed);

    let handle = vm.global("u");
    let method = vm.index(&handle, "Name").unwrap();
    let out = vm.call(&method, Vec::new()).unwrap();
    assert_eq!(out[0].as_text().as_deref(), Some("root"));
    assert!(vm.index(&handle, "Login").is_err());
    assert_eq!(vm.to_display(&handle).unwrap(), "User{Login:\"root\"}");
}

#[test]
fn type_descriptors_construct_values() {
    let mut vm = Vm::new();
    let point = TypeBuilder::new_struct("Point").field("X", Type::int()).build();
    push_type(&mut vm, &point);
    vm.pop_global("Point");
    let t = vm.global("Point");

    let new = vm.index(&t, "new").unwrap();
    let p = vm.call(&new, Vec::new()).unwrap().remove(0);
    vm.set_index(&p, "X", 9.0).unwrap();
    let value = {
        vm.push_slot(p.clone());
        let value = pull(&vm, -1, None).unwrap().unwrap();
        vm.pop(1);
        value
    };
    assert_eq!(value.kind(), Kind::Pointer);
    assert_eq!(value.field("X").and_then(|v| v.as_i64()), Some(9));

    let zero = vm.call(&t, Vec::new()).unwrap().remove(0);
    assert_eq!(vm.index(&zero, "X").unwrap().as_number(), Some(0.0));
}

#[test]
fn host_panics_surface_as_errors() {
    init_tracing();
    let mut vm = Vm::new();
    let f = Value::func(Signature::new([Type::int()], [Type::int()]), |args| {
        let values = [1_i64, 2, 3];
        let idx = args[0].as_i64().unwrap_or_default() as usize;
        Ok(vec![Value::int(values[idx])])
    });
    global(&mut vm, "at", &f);
    let at = vm.global("at");
    assert_eq!(vm.call(&at, vec![1.0.into()]).unwrap()[0].as_number(), Some(2.0));

    let err = vm.call(&at, vec![7.0.into()]).unwrap_err();
    match err {
        Error::Internal(message) => assert!(message.starts_with("panic: index out of bounds"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
    // the VM stays usable
    push_value(&mut vm, 1_u8).unwrap();
    assert_eq!(vm.top(), 1);
}
