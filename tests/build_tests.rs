//! End-to-end build tests
//!
//! Loads the package tree under `tests/fixtures` (a J5 package with an
//! entity plus a native `.proto` package) and checks the linked output.

use std::path::PathBuf;
use std::sync::Arc;

use j5build::config::{BuildConfig, SourceConfig};
use j5build::descriptor::FileDescriptorSet;
use j5build::protobuild::SourceContent;
use j5build::sourcewalk::walk_file;
use j5build::{BuildError, Diagnostics, DirectorySource, MemorySource, PackageSet, SchemaError};
use prost::Message;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_set() -> PackageSet {
    PackageSet::new(DirectorySource::new(fixtures_path()))
}

fn position(names: &[&str], name: &str) -> usize {
    names
        .iter()
        .position(|n| *n == name)
        .unwrap_or_else(|| panic!("{name} not in {names:?}"))
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_local_packages_from_config() {
    let config = BuildConfig {
        source: SourceConfig {
            root: fixtures_path(),
        },
        ..Default::default()
    };
    let set = PackageSet::from_config(&config);
    assert_eq!(set.local_packages().unwrap(), vec!["common.v1", "shop.v1"]);
}

#[test]
fn test_package_exports() {
    let mut set = fixture_set();
    let shop = set.load("shop.v1").unwrap();

    for name in ["Order", "Order.Shipping", "Invoice", "Invoice.Shipping", "FooState", "FooStatus"] {
        assert!(shop.exports.contains_key(name), "{name} not exported");
    }
    assert_eq!(shop.exports["Order"].defining_file, "shop/v1/order.p.j5s.proto");

    let common = set.package("common.v1").unwrap();
    assert_eq!(common.exports["Address"].defining_file, "common/v1/common.proto");
    let country = common.exports["Country"].as_enum().unwrap();
    assert_eq!(country.prefix, "COUNTRY_");
    assert_eq!(country.value("NZ"), Some(1));
}

#[test]
fn test_dependencies_are_memoised() {
    let mut set = fixture_set();
    let shop = set.load("shop.v1").unwrap();
    let common = set.load("common.v1").unwrap();
    assert!(Arc::ptr_eq(&shop.direct_dependencies["common.v1"], &common));
    assert!(Arc::ptr_eq(&set.load("shop.v1").unwrap(), &shop));
}

#[test]
fn test_cycle_reports_full_chain() {
    let source = MemorySource::new()
        .with_file(
            "a/v1/a.j5s",
            r#"{ "imports": [{ "path": "b.v1" }], "elements": [{ "object": { "name": "A",
                 "properties": [{ "name": "b", "schema": { "object": { "ref": { "package": "b", "schema": "B" } } } }]
               } }] }"#,
        )
        .with_file(
            "b/v1/b.j5s",
            r#"{ "imports": [{ "path": "a.v1" }], "elements": [{ "object": { "name": "B",
                 "properties": [{ "name": "a", "schema": { "object": { "ref": { "package": "a", "schema": "A" } } } }]
               } }] }"#,
        );
    let mut set = PackageSet::new(source);
    match set.load("a.v1") {
        Err(BuildError::CircularDependency { chain, dependency }) => {
            assert_eq!(chain, vec!["a.v1", "b.v1"]);
            assert_eq!(dependency, "a.v1");
        }
        other => panic!("Expected circular dependency, got {:?}", other.map(|p| p.name.clone())),
    }
}

#[test]
fn test_unimported_alias_is_package_not_found() {
    let source = MemorySource::new().with_file(
        "a/v1/a.j5s",
        r#"{ "elements": [{ "object": { "name": "A",
             "properties": [{ "name": "x", "schema": { "object": { "ref": { "package": "other", "schema": "X" } } } }]
           } }] }"#,
    );
    let mut set = PackageSet::new(source);
    let diagnostics = match set.build(&["a.v1"]) {
        Err(BuildError::Failed(diagnostics)) => diagnostics,
        other => panic!("Expected failed build, got {:?}", other.map(|o| o.files.len())),
    };
    assert_eq!(
        diagnostics.errors().collect::<Vec<_>>(),
        vec![&SchemaError::PackageNotFound {
            package: "other".into(),
            name: "X".into()
        }]
    );
}

// =============================================================================
// Conversion
// =============================================================================

#[test]
fn test_order_file_conversion() {
    let mut set = fixture_set();
    let shop = set.load("shop.v1").unwrap();
    assert!(!shop.diagnostics.has_errors(), "{}", shop.diagnostics);

    let file = &shop.files["shop/v1/order.p.j5s.proto"];
    assert_eq!(file.package(), "shop.v1");
    assert!(file.dependency.contains(&"common/v1/common.proto".to_string()));

    let order = file.find_message("Order").unwrap();
    assert!(order.find_field("order_id").unwrap().is_required());
    assert!(order.find_field("total").unwrap().is_required());
    assert!(!order.find_field("placed_at").unwrap().is_required());
    assert_eq!(order.find_field("address").unwrap().type_name(), ".common.v1.Address");

    let entry = order.nested_type.iter().find(|m| m.name() == "LabelsEntry").unwrap();
    assert!(entry.is_map_entry());

    // Same inline field name under two parents
    assert_eq!(order.find_field("shipping").unwrap().type_name(), ".shop.v1.Order.Shipping");
    let invoice = file.find_message("Invoice").unwrap();
    assert_eq!(invoice.find_field("shipping").unwrap().type_name(), ".shop.v1.Invoice.Shipping");
    assert!(file.find_message("Order.Shipping").unwrap().find_field("carrier").is_some());
    assert!(file.find_message("Invoice.Shipping").unwrap().find_field("cost").is_some());

    assert_eq!(invoice.find_field("order").unwrap().type_name(), ".shop.v1.Order");
    assert_eq!(invoice.find_field("country").unwrap().type_name(), ".common.v1.Country");

    let comments: Vec<&str> = file
        .source_code_info
        .as_ref()
        .unwrap()
        .location
        .iter()
        .filter_map(|l| l.leading_comments.as_deref())
        .collect();
    assert!(comments.iter().any(|c| c.contains("An order placed by a customer.")));
}

#[test]
fn test_entity_expansion() {
    let mut set = fixture_set();
    let shop = set.load("shop.v1").unwrap();

    let main = &shop.files["shop/v1/foo.p.j5s.proto"];
    let keys = main.find_message("FooKeys").unwrap();
    assert!(keys.find_field("foo_id").unwrap().is_required());
    assert_eq!(
        main.find_message("FooState").unwrap().find_field("metadata").unwrap().type_name(),
        ".j5.state.v1.StateMetadata"
    );

    let service_file = &shop.files["shop/v1/service/foo.p.j5s.proto"];
    let get = service_file.find_service("FooQuery").unwrap().find_method("FooGet").unwrap();
    let http = get.options.as_ref().unwrap().http.as_ref().unwrap();
    assert_eq!(http.path(), Some("/shop/v1/foo/q/{foo_id}"));

    // The normalised tree keeps the schema-style path parameter
    let source = shop
        .source_files
        .iter()
        .find(|f| f.filename == "shop/v1/foo.j5s")
        .unwrap();
    let SourceContent::Schema(tree) = &source.content else {
        panic!("Expected schema source");
    };
    let mut diagnostics = Diagnostics::new();
    let node = walk_file("shop.v1", &source.filename, tree, &mut diagnostics);
    let services = node.service_file.unwrap();
    let query = services.services.iter().find(|s| s.name == "FooQuery").unwrap();
    let method = query.methods.iter().find(|m| m.name == "FooGet").unwrap();
    assert_eq!(method.http_path, "/shop/v1/foo/q/:fooId");
}

// =============================================================================
// Linking
// =============================================================================

#[test]
fn test_build_orders_and_encodes_files() {
    let mut set = fixture_set();
    let output = set.build(&["shop.v1"]).unwrap();

    let names: Vec<&str> = output.files.iter().map(|f| f.name()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(
        sorted,
        vec![
            "common/v1/common.proto",
            "shop/v1/foo.p.j5s.proto",
            "shop/v1/order.p.j5s.proto",
            "shop/v1/service/foo.p.j5s.proto",
        ]
    );
    assert!(position(&names, "common/v1/common.proto") < position(&names, "shop/v1/order.p.j5s.proto"));
    assert!(
        position(&names, "shop/v1/foo.p.j5s.proto") < position(&names, "shop/v1/service/foo.p.j5s.proto")
    );

    let decoded = FileDescriptorSet::decode(output.encode_descriptor_set().as_slice()).unwrap();
    assert_eq!(decoded.file.len(), 4);
    assert!(output.file("shop/v1/order.p.j5s.proto").is_some());
}

#[test]
fn test_lint_and_graph() {
    let mut set = fixture_set();
    let diagnostics = set.lint(&["shop.v1"]).unwrap();
    assert!(!diagnostics.has_errors(), "{}", diagnostics);

    let dot = set.graph(&["shop.v1"]).to_dot();
    assert!(dot.contains("\"shop_v1\" -> \"common_v1\";"));
    assert!(dot.contains("\"shop_v1\" -> \"j5_state_v1\";"));
}
