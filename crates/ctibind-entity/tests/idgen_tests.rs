use ctibind_entity::idgen::{
    self, get_id_namespace, get_id_namespace_alias, get_id_namespace_prefix, set_id_method,
    set_id_namespace,
};
use ctibind_entity::{EntityError, IdGenerator, IdMethod};
use ctibind_namespace::Namespace;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn test_ns() -> Namespace {
    Namespace::new("http://some.namespace.com", Some("something"), None)
}

#[test]
fn test_int_ids() {
    let mut ids = IdGenerator::new().with_method(IdMethod::Int);
    for n in 1..=3 {
        assert_eq!(ids.create_id(None), format!("example:guid-{n}"));
    }
}

#[test]
fn test_namespaced_ids() {
    let mut ids = IdGenerator::new()
        .with_namespace(test_ns())
        .with_method(IdMethod::Int);
    assert_eq!(ids.create_id(None), "something:guid-1");
}

#[test]
fn test_prefixed_ids() {
    let mut ids = IdGenerator::new().with_method(IdMethod::Int);
    assert_eq!(ids.create_id(Some("some_object")), "example:some_object-1");
}

#[test]
fn test_invalid_method() {
    let err = "sequential".parse::<IdMethod>().unwrap_err();
    assert!(matches!(err, EntityError::InvalidIdMethod(_)));
}

/// The only test in this binary touching the process-wide generator.
#[test]
fn test_global_generator() {
    set_id_method(IdMethod::Int);
    idgen::generator().reset();
    set_id_namespace(test_ns());

    assert_eq!(idgen::create_id(None), "something:guid-1");
    assert_eq!(idgen::create_id(Some("some_object")), "something:some_object-2");

    assert_eq!(get_id_namespace(), "http://some.namespace.com");
    assert_eq!(get_id_namespace_prefix().as_deref(), Some("something"));
    assert_eq!(get_id_namespace_alias(), get_id_namespace_prefix());
    assert_eq!(idgen::id_namespace(), test_ns());
}

proptest! {
    #[test]
    fn prop_int_ids_are_sequential(prefix in "[a-z_]{1,12}", count in 1usize..20) {
        let mut ids = IdGenerator::new().with_method(IdMethod::Int);
        for n in 1..=count {
            prop_assert_eq!(ids.create_id(Some(&prefix)), format!("example:{prefix}-{n}"));
        }
    }
}
