//! CSV result writer
//!
//! One record per result, flushed immediately so partial output survives an
//! abrupt exit. Field order: send timestamp (ns since epoch), status code,
//! latency (ns), error text, sequence number.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::error::{LoadTestError, Result};
use crate::result::RequestResult;

/// Destination name that selects standard output.
pub const STDOUT: &str = "stdout";

pub struct ResultWriter {
    name: String,
    inner: csv::Writer<Box<dyn Write + Send>>,
}

impl ResultWriter {
    /// Open `name`, which is either [`STDOUT`] or a file path to create.
    pub fn create(name: &str) -> Result<Self> {
        let sink: Box<dyn Write + Send> = match name {
            STDOUT => Box::new(io::stdout()),
            path => Box::new(File::create(path).map_err(|source| LoadTestError::Output {
                path: PathBuf::from(path),
                source,
            })?),
        };
        Ok(Self::from_writer(name, sink))
    }

    /// Wrap an arbitrary writer.
    pub fn from_writer(name: impl Into<String>, sink: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            inner: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
        }
    }

    pub fn write(&mut self, result: &RequestResult) -> Result<()> {
        self.inner.write_record([
            result.timestamp_nanos().to_string(),
            result.code.to_string(),
            result.latency.as_nanos().to_string(),
            result.error.clone(),
            result.seq.to_string(),
        ])?;

        self.inner.flush().map_err(|source| LoadTestError::Output {
            path: PathBuf::from(&self.name),
            source,
        })
    }
}
