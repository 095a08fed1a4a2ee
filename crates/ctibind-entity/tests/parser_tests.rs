use ctibind_entity::{
    BindingObject, CollectorContext, Entity, EntityClass, EntityError, EntityParser, ParseOptions,
    Result, SerializeOptions, TypedField, Value, XmlDocument, EXAMPLE_NAMESPACE,
};
use ctibind_namespace::{registry, Namespace};
use ctibind_test_utils::{init_tracing, MockDocument, RecordingWriter};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const NS_REPORT: &str = "urn:test:report";

struct ReportParser {
    report: Arc<EntityClass>,
}

impl ReportParser {
    fn new() -> Self {
        let report = EntityClass::builder("Report")
            .namespace(NS_REPORT)
            .xsi_ns("report")
            .field(TypedField::new("Title"))
            .build()
            .unwrap();
        Self { report }
    }
}

impl EntityParser for ReportParser {
    fn supported_tags(&self) -> Vec<String> {
        vec!["Report".to_string()]
    }

    fn get_version(&self, doc: &dyn XmlDocument) -> Option<String> {
        doc.attribute("version").map(str::to_string)
    }

    fn supported_versions(&self, _tag: &str) -> Vec<String> {
        vec!["1.2".to_string()]
    }

    fn entity_class(&self, tag: &str) -> Result<Arc<EntityClass>> {
        if tag == "Report" {
            Ok(Arc::clone(&self.report))
        } else {
            Err(EntityError::UnresolvedClass(tag.to_string()))
        }
    }
}

fn report_doc(version: &str) -> MockDocument {
    MockDocument::new("Report", BindingObject::new("Report").with("Title", "Weekly"))
        .with_attribute("version", version)
        .with_attribute("xsi:schemaLocation", "urn:test:report report.xsd")
        .with_namespace("report", NS_REPORT)
        .with_namespace("ext", "urn:test:ext")
}

#[test]
fn test_parse_document_keeps_namespaces() {
    init_tracing();
    let parser = ReportParser::new();
    let entity = parser
        .parse_document(&report_doc("1.2"), &ParseOptions::new())
        .unwrap();

    assert_eq!(entity.get("title"), Some(&Value::from("Weekly")));
    assert_eq!(
        entity.input_namespaces().get("ext").map(String::as_str),
        Some("urn:test:ext")
    );
    assert_eq!(
        entity.input_schemalocations().get(NS_REPORT).map(String::as_str),
        Some("report.xsd")
    );
}

#[test]
fn test_trailing_zero_version_accepted() {
    let parser = ReportParser::new();
    assert!(parser
        .parse_document(&report_doc("1.2.0"), &ParseOptions::new())
        .is_ok());
}

#[test]
fn test_unsupported_root_rejected() {
    let parser = ReportParser::new();
    let doc = MockDocument::new("Package", BindingObject::new("Package"))
        .with_attribute("version", "1.2");

    let err = parser.parse_document(&doc, &ParseOptions::new()).unwrap_err();
    assert!(err.is_document_rejection());
    assert_eq!(
        err.to_string(),
        r#"document root element (Package) not one of (["Report"])"#
    );
}

#[test]
fn test_missing_version_rejected() {
    let parser = ReportParser::new();
    let doc = MockDocument::new("Report", BindingObject::new("Report"));

    let err = parser.parse_document(&doc, &ParseOptions::new()).unwrap_err();
    assert!(matches!(err, EntityError::UnknownVersion));
}

#[test]
fn test_unsupported_version_rejected() {
    let parser = ReportParser::new();
    let err = parser
        .parse_document(&report_doc("1.1"), &ParseOptions::new())
        .unwrap_err();

    match err {
        EntityError::UnsupportedVersion { found, expected } => {
            assert_eq!(found, "1.1");
            assert_eq!(expected, vec!["1.2".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_checks_can_be_skipped() {
    let parser = ReportParser::new();
    let options = ParseOptions::new().with_version_check(false);
    assert!(parser.parse_document(&report_doc("9.9"), &options).is_ok());

    let err = parser
        .parse_document(
            &MockDocument::new("Package", BindingObject::new("Package")),
            &ParseOptions::new().with_version_check(false).with_root_check(false),
        )
        .unwrap_err();
    assert!(matches!(err, EntityError::UnresolvedClass(_)));
}

#[test]
fn test_empty_document_is_collaborator_error() {
    let parser = ReportParser::new();
    let doc = MockDocument {
        tag: "Report".to_string(),
        ..MockDocument::default()
    }
    .with_attribute("version", "1.2");

    let err = parser.parse_document(&doc, &ParseOptions::new()).unwrap_err();
    assert!(matches!(err, EntityError::Collaborator(_)));
}

#[test]
fn test_reserialization_restores_declarations() {
    let parser = ReportParser::new();
    let entity: Entity = parser
        .parse_document(&report_doc("1.2"), &ParseOptions::new())
        .unwrap();

    let mut namespaces = registry::snapshot();
    namespaces
        .add_namespace(&Namespace::new(NS_REPORT, None, None))
        .unwrap();
    let ctx = CollectorContext::new(namespaces, EXAMPLE_NAMESPACE.clone());

    let writer = RecordingWriter::default();
    entity
        .to_xml_with(&writer, &SerializeOptions::new().with_pretty(false), &ctx)
        .unwrap();

    let namespace_def = writer.last_namespace_def().unwrap();
    assert!(namespace_def.contains(r#"xmlns:report="urn:test:report""#));
    assert!(namespace_def.contains(r#"xmlns:ext="urn:test:ext""#));
    assert!(namespace_def.ends_with(r#"xsi:schemaLocation="urn:test:report report.xsd""#));
}
