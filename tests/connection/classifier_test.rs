//! Integration tests for connection classification.

use bimigrate::connection::{
    classify, split_table_name, unescape_query, ConnectionDescriptor, ConnectionInfo,
    NamedConnection, RelationDescriptor,
};

fn table(name: &str) -> RelationDescriptor {
    RelationDescriptor::Table(name.to_string())
}

// ============================================================================
// Federated connections
// ============================================================================

#[test]
fn test_federated_excel_with_table_relation() {
    let connection = ConnectionDescriptor::new("federated").with_named(
        "excel-direct.0",
        ConnectionDescriptor::new("excel-direct").with_attr("filename", "f.xlsx"),
    );

    let info = classify(&connection, Some(&table("Sheet1$")));

    assert_eq!(info.class_type, "excel");
    assert_eq!(info.file_path.as_deref(), Some("f.xlsx"));
    assert_eq!(info.table.as_deref(), Some("Sheet1$"));
    assert_eq!(info.raw_query, None);
}

#[test]
fn test_first_classed_sub_connection_wins() {
    let mut connection = ConnectionDescriptor::new("federated");
    connection.named_connections.push(NamedConnection {
        name: "empty".to_string(),
        caption: None,
        connection: None,
    });
    let connection = connection
        .with_named("unclassed", ConnectionDescriptor::new(""))
        .with_named(
            "sqlserver.1",
            ConnectionDescriptor::new("sqlserver")
                .with_attr("server", "db01")
                .with_attr("dbname", "Sales"),
        )
        .with_named(
            "postgres.2",
            ConnectionDescriptor::new("postgres").with_attr("server", "pg01"),
        );

    let info = classify(&connection, Some(&table("[dbo].[Orders]")));

    assert_eq!(info.class_type, "sqlserver");
    assert_eq!(info.server.as_deref(), Some("db01"));
    assert_eq!(info.database.as_deref(), Some("Sales"));
    assert_eq!(info.schema.as_deref(), Some("dbo"));
    assert_eq!(info.table.as_deref(), Some("Orders"));
}

#[test]
fn test_federated_without_sub_connections_keeps_outer_class() {
    let connection = ConnectionDescriptor::new("federated");
    let info = classify(&connection, None);

    assert_eq!(info.class_type, "federated");
    assert_eq!(info.table, None);
    assert_eq!(info.field("class"), Some("federated"));
}

// ============================================================================
// Concrete connections
// ============================================================================

#[test]
fn test_excel_variants_are_canonicalized() {
    for class in ["excel-direct", "excel", "Excel-Legacy"] {
        let connection = ConnectionDescriptor::new(class)
            .with_attr("filename", "Book.xlsx")
            .with_attr("directory", "C:/data");
        let info = classify(&connection, Some(&table("[Sheet1$]")));

        assert_eq!(info.class_type, "excel", "class {class}");
        // Excel keeps the filename as given.
        assert_eq!(info.file_path.as_deref(), Some("Book.xlsx"));
        assert_eq!(info.table.as_deref(), Some("Sheet1$"));
        assert_eq!(info.schema, None);
    }
}

#[test]
fn test_textscan_absolute_filename_not_joined() {
    let connection = ConnectionDescriptor::new("textscan")
        .with_attr("directory", "/srv/data")
        .with_attr("filename", "/tmp/orders.csv");
    let info = classify(&connection, None);
    assert_eq!(info.file_path.as_deref(), Some("/tmp/orders.csv"));
}

#[test]
fn test_blank_attributes_are_unset() {
    let connection = ConnectionDescriptor::new("postgres")
        .with_attr("server", "")
        .with_attr("dbname", "analytics")
        .with_attr("port", "5432");
    let info = classify(&connection, None);

    assert_eq!(info.server, None);
    assert_eq!(info.database.as_deref(), Some("analytics"));
    assert_eq!(info.field("port"), Some("5432"));
}

// ============================================================================
// Relations
// ============================================================================

#[test]
fn test_custom_sql_is_unescaped_and_clears_table() {
    let connection = ConnectionDescriptor::new("sqlserver").with_attr("server", "db01");
    let relation = RelationDescriptor::Query("SELECT 1&#13;&apos;x&apos;".to_string());

    let info = classify(&connection, Some(&relation));

    assert_eq!(info.raw_query.as_deref(), Some("SELECT 1\n'x'"));
    assert_eq!(info.table, None);
    assert!(info.is_query());
}

#[test]
fn test_unescape_query_escapes() {
    assert_eq!(
        unescape_query("  SELECT a&#13;&#10;FROM t&#10;WHERE a &lt;&gt; &quot;x&quot; &amp;&amp; 1  "),
        "SELECT a\nFROM t\nWHERE a <> \"x\" && 1"
    );
    // &amp; is decoded last, so an escaped entity stays an entity.
    assert_eq!(unescape_query("a &amp;lt; b"), "a &lt; b");
}

#[test]
fn test_split_table_name_variants() {
    assert_eq!(split_table_name("Orders"), (None, "Orders".to_string()));
    assert_eq!(split_table_name("[Orders]"), (None, "Orders".to_string()));
    assert_eq!(
        split_table_name("[Sales].[Order Lines]"),
        (Some("Sales".to_string()), "Order Lines".to_string())
    );
}

#[test]
fn test_connection_info_serializes() {
    let info = ConnectionInfo {
        class_type: "excel".to_string(),
        file_path: Some("f.xlsx".to_string()),
        ..ConnectionInfo::default()
    };
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["class_type"], "excel");
    assert_eq!(json["file_path"], "f.xlsx");
}
