//! Batch driver: reads a file, binds every data row to the schema and saves
//! the results.
//!
//! # Example
//!
//! ```rust,ignore
//! use csv_harvester::{Processor, SchemaConfig};
//! use std::sync::Arc;
//!
//! let (schema, _) = SchemaConfig::from_file("people.json")?.into_schema()?;
//! let mut processor = Processor::new(Arc::new(schema));
//! processor.parse_file("people.csv")?;
//! eprintln!("{}", processor.summary());
//! let saved = processor.save()?;
//! ```

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::InvalidRowPolicy;
use crate::error::{HarvestError, HarvestResult};
use crate::logs::{self, log_info, log_info_indent, log_success, HarvestWarning};
use crate::parser::{Row, RowReader};
use crate::record::{EntityBatch, Record, SharedEntities};
use crate::schema::Schema;

/// Row counts of a harvest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    /// Data rows read from the source
    pub read: usize,
    /// Data rows bound into records
    pub parsed: usize,
    /// Data rows dropped after failing validation
    pub skipped: usize,
}

impl fmt::Display for HarvestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows parsed of {} read", self.parsed, self.read)?;
        if self.skipped > 0 {
            write!(f, " ({} skipped)", self.skipped)?;
        }
        Ok(())
    }
}

/// Harvests rows into records of one schema.
pub struct Processor {
    schema: Arc<Schema>,
    entities: SharedEntities,
    records: Vec<Record>,
    labels: Option<Vec<String>>,
    warnings: Vec<HarvestWarning>,
    encoding: Option<String>,
    summary: HarvestSummary,
}

impl Processor {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            entities: EntityBatch::shared(),
            records: Vec::new(),
            labels: None,
            warnings: Vec::new(),
            encoding: None,
            summary: HarvestSummary::default(),
        }
    }

    /// Harvest a CSV file using the schema's options.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> HarvestResult<&[Record]> {
        let path = path.as_ref();
        log_info(format!("Reading {}", path.display()));
        let reader = RowReader::from_path(path, self.schema.options())?;
        self.parse_reader(reader)
    }

    /// Harvest CSV bytes using the schema's options.
    pub fn parse_bytes(&mut self, bytes: &[u8]) -> HarvestResult<&[Record]> {
        let reader = RowReader::from_bytes(bytes, self.schema.options())?;
        self.parse_reader(reader)
    }

    /// Harvest rows already split into cells. Row and column options apply
    /// as they would to a file.
    pub fn parse_rows<I>(&mut self, rows: I) -> HarvestResult<&[Record]>
    where
        I: IntoIterator<Item = Vec<String>>,
        I::IntoIter: 'static,
    {
        self.parse_reader(RowReader::from_rows(rows))
    }

    /// Harvest every data row of `reader`.
    ///
    /// Rows before the start row are skipped, except the label row, whose
    /// cells are kept as labels. Rows failing validation abort the harvest
    /// or are skipped, depending on the schema's invalid row policy.
    pub fn parse_reader(&mut self, mut reader: RowReader) -> HarvestResult<&[Record]> {
        let options = self.schema.options().clone();
        self.encoding = Some(reader.encoding().to_string());

        match options.label_row {
            Some(label_row) => {
                reader.skip_rows(label_row - 1)?;
                if let Some(row) = reader.next() {
                    self.labels = Some(self.trim_columns(row?.cells));
                }
                reader.skip_rows(options.start_row.saturating_sub(label_row + 1))?;
            }
            None => {
                reader.skip_rows(options.rows_to_skip())?;
            }
        }

        log_info(format!("Harvesting rows into '{}'", self.schema.name()));
        for row in reader {
            if options.max_rows.is_some_and(|max| self.summary.read >= max) {
                break;
            }
            let Row { number, cells } = row?;
            self.summary.read += 1;

            let cells = self.trim_columns(cells);
            let mut record =
                Record::load_with(&self.schema, cells, Some(number), self.entities.clone());
            match record.resolve_all() {
                Ok(()) => {
                    self.summary.parsed += 1;
                    self.records.push(record);
                }
                Err(err) => self.reject(number, err, options.on_invalid)?,
            }
        }

        log_success(self.summary.to_string());
        Ok(self.records.as_slice())
    }

    fn trim_columns(&self, mut cells: Vec<String>) -> Vec<String> {
        let skip = self.schema.options().columns_to_skip().min(cells.len());
        cells.drain(..skip);
        cells
    }

    fn reject(
        &mut self,
        line: usize,
        err: HarvestError,
        policy: InvalidRowPolicy,
    ) -> HarvestResult<()> {
        let source = match err.as_validation() {
            Some(source) => source.clone(),
            None => return Err(err),
        };

        match policy {
            InvalidRowPolicy::Raise => Err(HarvestError::InvalidRow { line, source }),
            InvalidRowPolicy::Skip => {
                let warning = HarvestWarning::SkippedRow {
                    line,
                    reason: source.to_string(),
                };
                logs::log_warning(&warning);
                self.warnings.push(warning);
                self.summary.skipped += 1;
                Ok(())
            }
        }
    }

    /// Save every harvested record to the schema's model. New related
    /// entities are saved first, once each.
    pub fn save(&mut self) -> HarvestResult<Vec<Value>> {
        let created = self.entities.borrow_mut().save_pending()?;
        if created > 0 {
            log_info_indent(format!("{} related entities created", created), 1);
        }

        let mut saved = Vec::with_capacity(self.records.len());
        for record in &mut self.records {
            saved.push(record.save()?);
        }
        log_success(format!("{} records saved", saved.len()));
        Ok(saved)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Cells of the label row, when the schema declares one.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Row-level warnings, e.g. skipped rows. Column-count warnings stay on
    /// their records.
    pub fn warnings(&self) -> &[HarvestWarning] {
        &self.warnings
    }

    /// Encoding label of the last source read.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn counts(&self) -> &HarvestSummary {
        &self.summary
    }

    pub fn rows_read(&self) -> usize {
        self.summary.read
    }

    pub fn rows_parsed(&self) -> usize {
        self.summary.parsed
    }

    /// `"{parsed} rows parsed of {read} read"`
    pub fn summary(&self) -> String {
        self.summary.to_string()
    }
}
