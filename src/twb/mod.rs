//! Tableau workbook (`.twb`) loading.
//!
//! A workbook yields two lists: the datasources (connection plus relation)
//! and the calculated fields defined on them.
//!
//! ```text
//! <workbook>
//!   <datasources>
//!     <datasource caption='Orders' name='federated.1'>
//!       <connection class='federated'>
//!         <named-connections>
//!           <named-connection name='sqlserver.1'>
//!             <connection class='sqlserver' server='db01' dbname='Sales'/>
//!           </named-connection>
//!         </named-connections>
//!         <relation type='table' table='[dbo].[Orders]'/>
//!       </connection>
//!       <column name='[Calculation_1]' caption='Margin' role='measure' datatype='real'>
//!         <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])'/>
//!       </column>
//!     </datasource>
//!   </datasources>
//! </workbook>
//! ```

mod error;
mod parser;

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::calc::{CalculationGraph, CalculationRecord};
use crate::connection::DataSource;

pub use error::{WorkbookError, WorkbookResult};

/// The parts of a workbook that get migrated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Workbook {
    /// Datasources in document order.
    pub datasources: Vec<DataSource>,
    /// Calculated fields in document order.
    pub calculations: Vec<CalculationRecord>,
}

impl Workbook {
    /// Parse workbook XML.
    pub fn parse(xml: &str) -> WorkbookResult<Self> {
        parser::parse_workbook(xml)
    }

    /// Read and parse a workbook file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> WorkbookResult<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|source| WorkbookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&xml)
    }

    /// Build a calculation graph from the workbook's calculated fields.
    pub fn calculation_graph(&self) -> CalculationGraph {
        CalculationGraph::from_records(self.calculations.iter().cloned())
    }

    pub fn datasource(&self, name: &str) -> Option<&DataSource> {
        self.datasources
            .iter()
            .find(|ds| ds.name == name || ds.caption == name)
    }
}
