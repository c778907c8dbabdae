//! Raw row archive: every payload row as received, one JSON document per line.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::source::Supplier;
use crate::timestamp::UtcDateTime;

#[derive(Debug)]
pub struct RowArchive {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: usize,
}

impl RowArchive {
    /// Create `<dir>/<supplier>_<endpoint>_<YYYYMMDDhhmmss>.jsonl`.
    pub fn create(dir: &Path, supplier: Supplier, endpoint: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "{supplier}_{endpoint}_{}.jsonl",
            UtcDateTime::now().file_stamp()
        ));
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        })
    }

    pub fn append(&mut self, rows: &[Value]) -> io::Result<()> {
        for row in rows {
            serde_json::to_writer(&mut self.writer, row)?;
            self.writer.write_all(b"\n")?;
        }
        self.rows += rows.len();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
