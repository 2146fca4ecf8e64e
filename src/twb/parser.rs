//! Streaming `.twb` reader.
//!
//! Only the top-level `<workbook><datasources>` section is read. Worksheets
//! repeat datasource and column elements as dependencies; those are ignored,
//! as is everything under `<extract>`.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::error::{WorkbookError, WorkbookResult};
use super::Workbook;
use crate::calc::CalculationRecord;
use crate::connection::{ConnectionDescriptor, DataSource, NamedConnection, RelationDescriptor};

/// Datasource holding workbook parameters rather than data.
const PARAMETERS_DATASOURCE: &str = "Parameters";

/// The only calculation class carrying a formula.
const FORMULA_CLASS: &str = "tableau";

pub(super) fn parse_workbook(xml: &str) -> WorkbookResult<Workbook> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut loader = Loader::default();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|source| WorkbookError::Xml {
            position: reader.buffer_position() as u64,
            source,
        })?;
        loader.position = reader.buffer_position() as u64;

        match event {
            Event::Start(e) => {
                loader.open(&e)?;
                loader.stack.push(element_name(&e));
            }
            Event::Empty(e) => {
                loader.open(&e)?;
                loader.close(&element_name(&e));
            }
            Event::End(_) => {
                if let Some(name) = loader.stack.pop() {
                    loader.close(&name);
                }
            }
            Event::Text(t) => loader.text(&String::from_utf8_lossy(&t)),
            Event::CData(t) => loader.text(&String::from_utf8_lossy(&t.into_inner())),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(loader.workbook)
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

#[derive(Default)]
struct Loader {
    stack: Vec<String>,
    position: u64,
    workbook: Workbook,
    source: Option<SourceState>,
}

/// A `<datasource>` being read.
struct SourceState {
    source: DataSource,
    has_connection: bool,
    named: Option<NamedConnection>,
    column: Option<ColumnState>,
    /// Text of an open `<relation type='text'>`, kept with its escapes.
    query: Option<String>,
    calculations: Vec<CalculationRecord>,
}

struct ColumnState {
    name: Option<String>,
    caption: Option<String>,
    data_type: String,
    is_measure: bool,
}

impl Loader {
    fn parent(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    fn in_extract(&self) -> bool {
        self.stack.iter().any(|name| name == "extract")
    }

    fn at_datasource_list(&self) -> bool {
        self.stack.len() == 2 && self.stack[1] == "datasources"
    }

    fn attributes(&self, e: &BytesStart) -> WorkbookResult<BTreeMap<String, String>> {
        let mut attrs = BTreeMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.xml_error(err.into()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|err| self.xml_error(err))?;
            attrs.insert(key, value.into_owned());
        }
        Ok(attrs)
    }

    fn xml_error(&self, source: quick_xml::Error) -> WorkbookError {
        WorkbookError::Xml {
            position: self.position,
            source,
        }
    }

    fn open(&mut self, e: &BytesStart) -> WorkbookResult<()> {
        let name = e.name();
        match name.as_ref() {
            b"datasource" if self.at_datasource_list() => {
                let attrs = self.attributes(e)?;
                self.source = start_datasource(attrs);
            }
            _ if self.source.is_none() || self.in_extract() => {}
            b"connection" => {
                let attrs = self.attributes(e)?;
                let parent_is_named = self.parent() == Some("named-connection");
                let parent_is_source = self.parent() == Some("datasource");
                if let Some(state) = self.source.as_mut() {
                    let descriptor = descriptor(attrs);
                    if parent_is_named {
                        if let Some(named) = state.named.as_mut() {
                            named.connection = Some(descriptor);
                        }
                    } else if parent_is_source && !state.has_connection {
                        state.source.connection = descriptor;
                        state.has_connection = true;
                    }
                }
            }
            b"named-connection" => {
                let mut attrs = self.attributes(e)?;
                if let Some(state) = self.source.as_mut() {
                    state.named = Some(NamedConnection {
                        name: attrs.remove("name").unwrap_or_default(),
                        caption: attrs.remove("caption"),
                        connection: None,
                    });
                }
            }
            b"relation" => {
                let mut attrs = self.attributes(e)?;
                if let Some(state) = self.source.as_mut() {
                    if state.source.relation.is_some() || state.query.is_some() {
                        return Ok(());
                    }
                    match attrs.get("type").map(String::as_str) {
                        Some("table") => {
                            let table = attrs
                                .remove("table")
                                .filter(|t| !t.is_empty())
                                .or_else(|| attrs.remove("name"))
                                .unwrap_or_default();
                            state.source.relation = Some(RelationDescriptor::Table(table));
                        }
                        Some("text") => state.query = Some(String::new()),
                        // joins and unions: take the first leaf relation inside
                        _ => {}
                    }
                }
            }
            b"column" if self.parent() == Some("datasource") => {
                let mut attrs = self.attributes(e)?;
                if let Some(state) = self.source.as_mut() {
                    state.column = Some(ColumnState {
                        name: attrs.remove("name"),
                        caption: attrs.remove("caption").filter(|c| !c.is_empty()),
                        data_type: attrs.remove("datatype").unwrap_or_default(),
                        is_measure: attrs.get("role").is_some_and(|r| r == "measure"),
                    });
                }
            }
            b"calculation" if self.parent() == Some("column") => {
                let attrs = self.attributes(e)?;
                if let Some(state) = self.source.as_mut() {
                    if let Some(column) = state.column.as_ref() {
                        if let Some(record) = calculation_record(column, &attrs, state.source.table_name())? {
                            state.calculations.push(record);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) {
        match name {
            "datasource" if self.at_datasource_list() => {
                if let Some(state) = self.source.take() {
                    debug!(
                        datasource = %state.source.table_name(),
                        calculations = state.calculations.len(),
                        "datasource loaded"
                    );
                    self.workbook.calculations.extend(state.calculations);
                    self.workbook.datasources.push(state.source);
                }
            }
            "named-connection" => {
                if let Some(state) = self.source.as_mut() {
                    if let Some(named) = state.named.take() {
                        state.source.connection.named_connections.push(named);
                    }
                }
            }
            "relation" => {
                if let Some(state) = self.source.as_mut() {
                    if let Some(query) = state.query.take() {
                        state.source.relation = Some(RelationDescriptor::Query(query));
                    }
                }
            }
            "column" => {
                if let Some(state) = self.source.as_mut() {
                    state.column = None;
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let in_relation = self.parent() == Some("relation");
        if let Some(query) = self.source.as_mut().and_then(|s| s.query.as_mut()) {
            if in_relation {
                query.push_str(text);
            }
        }
    }
}

fn start_datasource(mut attrs: BTreeMap<String, String>) -> Option<SourceState> {
    let name = attrs.remove("name").unwrap_or_default();
    let caption = attrs.remove("caption").unwrap_or_default();
    if name == PARAMETERS_DATASOURCE || (name.is_empty() && caption.is_empty()) {
        debug!(datasource = %name, "skipping datasource");
        return None;
    }
    Some(SourceState {
        source: DataSource {
            name,
            caption,
            connection: ConnectionDescriptor::default(),
            relation: None,
        },
        has_connection: false,
        named: None,
        column: None,
        query: None,
        calculations: Vec::new(),
    })
}

fn descriptor(attributes: BTreeMap<String, String>) -> ConnectionDescriptor {
    ConnectionDescriptor {
        class: attributes.get("class").cloned().unwrap_or_default(),
        attributes,
        named_connections: Vec::new(),
    }
}

fn calculation_record(
    column: &ColumnState,
    attrs: &BTreeMap<String, String>,
    table_name: &str,
) -> WorkbookResult<Option<CalculationRecord>> {
    if attrs.get("class").map(String::as_str) != Some(FORMULA_CLASS) {
        return Ok(None);
    }
    let Some(formula) = attrs.get("formula").filter(|f| !f.trim().is_empty()) else {
        return Ok(None);
    };
    let name = column
        .name
        .as_deref()
        .ok_or_else(|| WorkbookError::missing("column", "name"))?;
    let source_id = name.trim_start_matches('[').trim_end_matches(']').to_string();

    Ok(Some(CalculationRecord {
        caption: column.caption.clone().unwrap_or_else(|| source_id.clone()),
        source_id,
        table_name: table_name.to_string(),
        formula: formula.clone(),
        data_type: column.data_type.clone(),
        is_measure: column.is_measure,
    }))
}
