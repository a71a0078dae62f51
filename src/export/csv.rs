//! CSV writer.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use csv::Writer;
use tracing::debug;

use super::{ExportError, write_atomically};
use crate::frame::Frame;

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Writes `frame` as CSV with a header row.
///
/// Nulls are written as empty fields.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] or [`ExportError::Io`] on failure; `path` is
/// left untouched in that case.
pub fn write_csv(frame: &Frame, path: &Path) -> Result<(), ExportError> {
    write_atomically(path, |file, tmp| write_rows(frame, file, tmp))?;
    debug!(path = %path.display(), rows = frame.len(), "csv written");
    Ok(())
}

fn write_rows(frame: &Frame, file: File, tmp: &Path) -> Result<(), ExportError> {
    let csv_error = |source: csv::Error| ExportError::Csv {
        path: tmp.to_path_buf(),
        source,
    };

    let mut writer = Writer::from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file));
    writer.write_record(frame.columns()).map_err(csv_error)?;
    for row in frame.rows() {
        writer
            .write_record(row.iter().map(ToString::to_string))
            .map_err(csv_error)?;
    }

    writer.flush().map_err(|e| ExportError::io(tmp, e))?;
    let buffered = writer
        .into_inner()
        .map_err(|e| ExportError::io(tmp, std::io::Error::other(e.to_string())))?;
    let file = buffered
        .into_inner()
        .map_err(|e| ExportError::io(tmp, e.into_error()))?;
    file.sync_all().map_err(|e| ExportError::io(tmp, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::frame::Cell;

    #[test]
    fn test_write_csv_header_and_nulls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");

        let mut frame = Frame::new(vec!["area".into(), "year".into(), "value".into()]);
        frame.push_row(vec![Cell::Text("Chad, Republic".into()), Cell::Int(2020), Cell::Float(5.5)]);
        frame.push_row(vec![Cell::Text("France".into()), Cell::Null, Cell::Float(3.0)]);
        write_csv(&frame, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "area,year,value\n\"Chad, Republic\",2020,5.5\nFrance,,3.0\n"
        );
    }

    #[test]
    fn test_write_csv_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");

        let mut frame = Frame::new(vec!["a".into(), "b".into()]);
        frame.push_row(vec![Cell::Bool(true), Cell::Text("x\ny".into())]);
        write_csv(&frame, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap().iter().collect::<Vec<_>>(), vec!["a", "b"]);
        let records: Vec<_> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][0], "true");
        assert_eq!(&records[0][1], "x\ny");
    }
}
