//! Integration tests for the `.twb` loader.

use bimigrate::connection::{classify, RelationDescriptor};
use bimigrate::twb::{Workbook, WorkbookError};

const WORKBOOK: &str = r#"<?xml version='1.0' encoding='utf-8' ?>
<workbook source-build='2023.1.0' version='18.1'>
  <datasources>
    <datasource hasconnection='false' inline='true' name='Parameters' version='18.1'>
      <column caption='Target' datatype='real' name='[Parameter 1]' param-domain-type='any' role='measure' type='quantitative' value='0.2'>
        <calculation class='tableau' formula='0.2' />
      </column>
    </datasource>
    <datasource caption='Orders (Superstore)' inline='true' name='federated.0hgpf0j1fdpvv316shikk0mmdlec' version='18.1'>
      <connection class='federated'>
        <named-connections>
          <named-connection caption='Superstore' name='excel-direct.1nh2hl51ijs3ds1h2fqu20dqp9lw'>
            <connection class='excel-direct' cleaning='no' compat='no' dataRefreshTime='' filename='C:/data/Superstore.xlsx' interpretationMode='0' password='' server='' validate='no' />
          </named-connection>
        </named-connections>
        <relation connection='excel-direct.1nh2hl51ijs3ds1h2fqu20dqp9lw' name='Orders' table='[Orders$]' type='table'>
          <columns gridOrigin='A1:U9995:no:A1:U9995:0' header='yes' outcome='6'>
            <column datatype='integer' name='Row ID' ordinal='0' />
          </columns>
        </relation>
      </connection>
      <column caption='Profit Ratio' datatype='real' default-format='p0%' name='[Calculation_1368249927221915648]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])' />
      </column>
      <column caption='High Margin' datatype='boolean' name='[Calculation_5571209093911105]' role='dimension' type='nominal'>
        <calculation class='tableau' formula='[Calculation_1368249927221915648] &gt; 0.25 &amp;&amp; [Sales] &lt;&gt; 0' />
      </column>
      <column caption='Sales (bin)' datatype='integer' name='[Sales (bin)]' role='dimension' type='ordinal'>
        <calculation class='bin' decimals='0' formula='[Sales]' peg='0' size='10' />
      </column>
      <column caption='Region Group' datatype='string' name='[Region (group)]' role='dimension' type='nominal'>
        <calculation class='categorical-bin' column='[Region]' new-bin='true' />
      </column>
      <column datatype='string' name='[Calculation_42]' role='dimension' type='nominal'>
        <calculation class='tableau' formula='UPPER([Region])' />
      </column>
      <column datatype='real' name='[Sales]' role='measure' type='quantitative' />
    </datasource>
    <datasource caption='Returns' inline='true' name='federated.1b2c' version='18.1'>
      <connection class='federated'>
        <named-connections>
          <named-connection caption='db01' name='sqlserver.0a1'>
            <connection authentication='sspi' class='sqlserver' dbname='Sales' one-time-sql='' server='db01.corp' />
          </named-connection>
        </named-connections>
        <relation connection='sqlserver.0a1' name='Custom SQL Query' type='text'>SELECT r.[Order ID],&#13;&#10;  r.Returned&#13;&#10;FROM dbo.Returns r&#13;&#10;WHERE r.Region &lt;&gt; &apos;West&apos;</relation>
      </connection>
    </datasource>
  </datasources>
  <worksheets>
    <worksheet name='Sheet 1'>
      <table>
        <view>
          <datasources>
            <datasource caption='Orders (Superstore)' name='federated.0hgpf0j1fdpvv316shikk0mmdlec' />
          </datasources>
          <datasource-dependencies datasource='federated.0hgpf0j1fdpvv316shikk0mmdlec'>
            <column caption='Profit Ratio' datatype='real' name='[Calculation_1368249927221915648]' role='measure' type='quantitative'>
              <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])' />
            </column>
          </datasource-dependencies>
        </view>
      </table>
    </worksheet>
  </worksheets>
</workbook>
"#;

#[test]
fn test_datasources_are_loaded_in_order() {
    let wb = Workbook::parse(WORKBOOK).unwrap();

    let names: Vec<&str> = wb.datasources.iter().map(|ds| ds.table_name()).collect();
    assert_eq!(names, vec!["Orders (Superstore)", "Returns"]);
}

#[test]
fn test_federated_excel_datasource() {
    let wb = Workbook::parse(WORKBOOK).unwrap();
    let orders = wb.datasource("Orders (Superstore)").unwrap();

    assert_eq!(orders.connection.class, "federated");
    assert_eq!(orders.connection.named_connections.len(), 1);
    let named = &orders.connection.named_connections[0];
    assert_eq!(named.caption.as_deref(), Some("Superstore"));
    assert_eq!(
        orders.relation,
        Some(RelationDescriptor::Table("[Orders$]".to_string()))
    );

    let info = classify(&orders.connection, orders.relation.as_ref());
    assert_eq!(info.class_type, "excel");
    assert_eq!(info.file_path.as_deref(), Some("C:/data/Superstore.xlsx"));
    assert_eq!(info.table.as_deref(), Some("Orders$"));
}

#[test]
fn test_custom_sql_keeps_escapes_until_classified() {
    let wb = Workbook::parse(WORKBOOK).unwrap();
    let returns = wb.datasource("federated.1b2c").unwrap();

    match &returns.relation {
        Some(RelationDescriptor::Query(text)) => assert!(text.contains("&#13;&#10;")),
        other => panic!("expected a query relation, got {other:?}"),
    }

    let info = classify(&returns.connection, returns.relation.as_ref());
    assert_eq!(info.class_type, "sqlserver");
    assert_eq!(info.server.as_deref(), Some("db01.corp"));
    assert_eq!(info.database.as_deref(), Some("Sales"));
    assert_eq!(info.field("authentication"), Some("sspi"));
    assert_eq!(
        info.raw_query.as_deref(),
        Some("SELECT r.[Order ID],\n  r.Returned\nFROM dbo.Returns r\nWHERE r.Region <> 'West'")
    );
}

#[test]
fn test_calculations() {
    let wb = Workbook::parse(WORKBOOK).unwrap();

    let ids: Vec<&str> = wb.calculations.iter().map(|c| c.source_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "Calculation_1368249927221915648",
            "Calculation_5571209093911105",
            "Calculation_42",
        ]
    );

    let ratio = &wb.calculations[0];
    assert_eq!(ratio.caption, "Profit Ratio");
    assert_eq!(ratio.table_name, "Orders (Superstore)");
    assert_eq!(ratio.data_type, "real");
    assert!(ratio.is_measure);
    assert_eq!(ratio.formula, "SUM([Profit])/SUM([Sales])");

    let high = &wb.calculations[1];
    assert!(!high.is_measure);
    assert_eq!(
        high.formula,
        "[Calculation_1368249927221915648] > 0.25 && [Sales] <> 0"
    );

    // No caption: falls back to the id.
    assert_eq!(wb.calculations[2].caption, "Calculation_42");
}

#[test]
fn test_calculation_graph_links_references() {
    let wb = Workbook::parse(WORKBOOK).unwrap();
    let graph = wb.calculation_graph();

    assert_eq!(graph.len(), 3);
    let high = graph.get("Calculation_5571209093911105").unwrap();
    assert_eq!(high.dependencies, vec!["Calculation_1368249927221915648"]);
    assert!(graph.dangling_references().is_empty());
    assert!(graph.detect_cycles().is_empty());
}

#[test]
fn test_unnamed_calculated_column_is_an_error() {
    let xml = r#"<workbook><datasources>
  <datasource caption='Orders' name='ds1'>
    <connection class='sqlserver' server='db01'/>
    <column caption='Nameless' datatype='real' role='measure'>
      <calculation class='tableau' formula='1'/>
    </column>
  </datasource>
</datasources></workbook>"#;

    assert!(matches!(
        Workbook::parse(xml),
        Err(WorkbookError::MissingAttribute {
            element: "column",
            attribute: "name"
        })
    ));
}

#[test]
fn test_malformed_xml() {
    let err = Workbook::parse("<workbook><datasources></workbook>").unwrap_err();
    assert!(matches!(err, WorkbookError::Xml { .. }));
}

#[test]
fn test_from_file() {
    let path = std::env::temp_dir().join(format!("bimigrate-{}.twb", std::process::id()));
    std::fs::write(&path, WORKBOOK).unwrap();

    let wb = Workbook::from_file(&path).unwrap();
    assert_eq!(wb.calculations.len(), 3);
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(
        Workbook::from_file(&path),
        Err(WorkbookError::Io { .. })
    ));
}
