use ctibind_entity::{
    Entity, EntityClass, EntityError, NamespaceCollector, SerializeOptions, TypedField,
};
use ctibind_namespace::NS_XML_SCHEMA;
use ctibind_test_utils::{
    abc_classes, init_tracing, ordered_map, test_context, test_nsmap, test_schemalocs,
    RecordingWriter,
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

#[test]
fn test_collects_class_ancestry() {
    let (_, _, c) = abc_classes();
    let mut collector = NamespaceCollector::new();
    let _ = Entity::new(&c).to_obj_with(&mut collector);

    let names: Vec<&str> = collector.collected_classes().map(|class| class.name()).collect();
    assert_eq!(names, vec!["C", "B", "A"]);
}

#[test]
fn test_finalize_with_overrides() {
    init_tracing();
    let (_, _, c) = abc_classes();
    let mut collector = NamespaceCollector::new();
    collector.collect(&Entity::new(&c));

    collector
        .finalize(&test_context(), &test_nsmap(), &test_schemalocs())
        .unwrap();

    let binding = collector.binding_namespaces().unwrap();
    for (uri, prefix) in test_nsmap() {
        assert_eq!(binding.get(&uri), Some(&prefix));
    }
    assert_eq!(
        binding.get(NS_XML_SCHEMA.uri()).map(String::as_str),
        Some("xs")
    );

    let schemalocs = collector.finalized_schemalocs().unwrap();
    assert_eq!(schemalocs.get("test:b").map(String::as_str), Some("/dev/null"));

    let xmlns = collector.xmlns_string(" ").unwrap();
    assert!(xmlns.contains(r#"xmlns:a="test:a""#));
    assert!(xmlns.contains(r#"xmlns:example="http://example.com""#));
    assert!(collector
        .schema_location_string(" ")
        .starts_with(r#"xsi:schemaLocation="test:a /dev/null"#));
}

#[test]
fn test_input_namespaces_survive_finalize() {
    let (a, _, _) = abc_classes();
    let mut entity = Entity::new(&a);
    entity.add_input_namespace("ext", "urn:test:ext");
    entity.add_input_namespace("example", "urn:test:placeholder");
    entity.add_input_schemalocation("urn:test:ext", "ext.xsd");

    let mut collector = NamespaceCollector::new();
    collector.collect(&entity);
    collector
        .finalize(&test_context(), &IndexMap::new(), &IndexMap::new())
        .unwrap();

    let binding = collector.binding_namespaces().unwrap();
    assert_eq!(binding.get("urn:test:ext").map(String::as_str), Some("ext"));
    assert!(!binding.contains_key("urn:test:placeholder"));

    let schemalocs = collector.finalized_schemalocs().unwrap();
    assert_eq!(schemalocs.get("urn:test:ext").map(String::as_str), Some("ext.xsd"));
}

#[test]
fn test_schemaloc_override_beats_input() {
    let (a, _, _) = abc_classes();
    let mut entity = Entity::new(&a);
    entity.add_input_namespace("ext", "urn:test:ext");
    entity.add_input_schemalocation("urn:test:ext", "parsed.xsd");

    let mut collector = NamespaceCollector::new();
    collector.collect(&entity);
    collector
        .finalize(
            &test_context(),
            &IndexMap::new(),
            &ordered_map(&[("urn:test:ext", "override.xsd")]),
        )
        .unwrap();

    let schemalocs = collector.finalized_schemalocs().unwrap();
    assert_eq!(
        schemalocs.get("urn:test:ext").map(String::as_str),
        Some("override.xsd")
    );
}

#[test]
fn test_unregistered_class_namespace_fails() {
    let class = EntityClass::builder("Stray")
        .namespace("urn:test:never-registered")
        .field(TypedField::new("Name"))
        .build()
        .unwrap();

    let mut collector = NamespaceCollector::new();
    collector.collect(&Entity::new(&class));
    let err = collector
        .finalize(&test_context(), &IndexMap::new(), &IndexMap::new())
        .unwrap_err();

    assert!(matches!(err, EntityError::Namespace(_)));
    assert!(!collector.is_finalized());
    assert!(collector.binding_namespaces().is_none());
}

#[test]
fn test_update_merges_collectors() {
    let (a, b, c) = abc_classes();
    let mut first = NamespaceCollector::new();
    first.collect(&Entity::new(&a));

    let mut second = NamespaceCollector::new();
    let mut entity = Entity::new(&c);
    entity.add_input_namespace("ext", "urn:test:ext");
    second.collect(&entity);

    first.update(&second);
    let names: Vec<&str> = first.collected_classes().map(|class| class.name()).collect();
    assert_eq!(names, vec!["A", "C", "B"]);
    assert_eq!(
        first.input_namespaces().get("ext").map(String::as_str),
        Some("urn:test:ext")
    );
    assert!(first.collected_classes().any(|class| std::sync::Arc::ptr_eq(class, &b)));
}

#[test]
fn test_to_xml_hands_declarations_to_writer() {
    let (_, _, c) = abc_classes();
    let entity = Entity::new(&c);
    let writer = RecordingWriter::default();

    let options = SerializeOptions::new()
        .with_pretty(false)
        .with_namespace("test:a", "a")
        .with_schemaloc("test:a", "/dev/null");
    let xml = entity.to_xml_with(&writer, &options, &test_context()).unwrap();

    let namespace_def = writer.last_namespace_def().unwrap();
    assert!(namespace_def.contains(r#"xmlns:a="test:a""#));
    assert!(namespace_def.ends_with(r#"xsi:schemaLocation="test:a /dev/null""#));
    assert_eq!(xml, format!("<C {namespace_def}/>"));

    let calls = writer.calls.borrow();
    let (root, _, pretty) = calls.last().unwrap();
    assert_eq!(root.xsi_type(), Some("c:CType"));
    assert!(!pretty);
}

#[test]
fn test_to_xml_without_namespaces() {
    let (_, _, c) = abc_classes();
    let writer = RecordingWriter::default();
    let options = SerializeOptions::new().with_namespaces(false);

    Entity::new(&c)
        .to_xml_with(&writer, &options, &test_context())
        .unwrap();
    assert_eq!(writer.last_namespace_def().as_deref(), Some(""));
}
