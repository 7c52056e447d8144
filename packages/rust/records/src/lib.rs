//! Tab-delimited record streams.
//!
//! Every evalcorpus input is a line-oriented stream of `\t`-separated fields:
//! - the materialized document stream (`docid\ttitle\ttext`, header first)
//! - the query table (`queryId\ttext`)
//! - the relevance table (`queryId\tgroup\tdocId\tlabel`)
//!
//! Streams written by the materializer use [`Escaping::Backslash`] so that
//! document text can never contain a raw delimiter or line break. External
//! tables are read verbatim with [`Escaping::None`].

use std::io::{BufRead, Write};
use std::path::PathBuf;

use evalcorpus_shared::{EvalCorpusError, Result};

/// Field delimiter.
pub const DELIMITER: char = '\t';

/// Appended to escape errors: plain TSV writers leave backslashes unescaped.
const FOREIGN_STREAM_HINT: &str =
    "the stream was probably not written by `evalcorpus materialize`; re-fetch it with --refresh";

/// How field text is encoded on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escaping {
    /// Fields are taken verbatim.
    None,
    /// `\\`, `\t`, `\n`, `\r` stand for backslash, tab, newline, carriage return.
    Backslash,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number in the stream.
    pub row: usize,
    /// Decoded fields, in column order.
    pub fields: Vec<String>,
}

impl Record {
    /// Require exactly `n` fields.
    pub fn expect_fields(&self, input: &str, n: usize) -> Result<()> {
        if self.fields.len() != n {
            return Err(EvalCorpusError::malformed(
                input,
                self.row,
                format!("expected {n} fields, got {}", self.fields.len()),
            ));
        }
        Ok(())
    }

    /// Require at least `n` fields; extra trailing columns are allowed.
    pub fn expect_min_fields(&self, input: &str, n: usize) -> Result<()> {
        if self.fields.len() < n {
            return Err(EvalCorpusError::malformed(
                input,
                self.row,
                format!("expected at least {n} fields, got {}", self.fields.len()),
            ));
        }
        Ok(())
    }

    /// Take exactly `N` fields by value.
    pub fn into_fields<const N: usize>(self, input: &str) -> Result<[String; N]> {
        self.expect_fields(input, N)?;
        let row = self.row;
        self.fields.try_into().map_err(|rest: Vec<String>| {
            EvalCorpusError::malformed(input, row, format!("expected {N} fields, got {}", rest.len()))
        })
    }

    /// Take the first `N` fields by value, dropping any trailing columns.
    pub fn into_leading<const N: usize>(mut self, input: &str) -> Result<[String; N]> {
        self.expect_min_fields(input, N)?;
        self.fields.truncate(N);
        self.into_fields(input)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Iterator over the records of a delimited stream.
///
/// Blank lines are skipped (their line numbers still count) and a trailing
/// `\r` is stripped, so CRLF files read the same as LF files.
pub struct RecordReader<R> {
    inner: R,
    input: String,
    escaping: Escaping,
    line: usize,
    buf: String,
}

impl<R: BufRead> RecordReader<R> {
    /// Wrap `inner`; `input` names the stream in error messages.
    pub fn new(inner: R, input: impl Into<String>, escaping: Escaping) -> Self {
        Self {
            inner,
            input: input.into(),
            escaping,
            line: 0,
            buf: String::new(),
        }
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.buf.clear();
            let read = self
                .inner
                .read_line(&mut self.buf)
                .map_err(|e| EvalCorpusError::io(PathBuf::from(&self.input), e))?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            let line = self
                .buf
                .strip_suffix('\n')
                .unwrap_or(&self.buf)
                .trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }

            let fields = line
                .split(DELIMITER)
                .map(|raw| match self.escaping {
                    Escaping::None => Ok(raw.to_string()),
                    Escaping::Backslash => unescape_field(raw).map_err(|message| {
                        EvalCorpusError::malformed(
                            &self.input,
                            self.line,
                            format!("{message} ({FOREIGN_STREAM_HINT})"),
                        )
                    }),
                })
                .collect::<Result<Vec<_>>>()?;

            return Ok(Some(Record {
                row: self.line,
                fields,
            }));
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Writes one delimited line per record.
pub struct RecordWriter<W> {
    inner: W,
    escaping: Escaping,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W, escaping: Escaping) -> Self {
        Self {
            inner,
            escaping,
            written: 0,
        }
    }

    /// Write one record.
    ///
    /// In [`Escaping::None`] mode a field containing the delimiter or a
    /// line break cannot be represented and is rejected.
    pub fn write_record(&mut self, fields: &[&str]) -> std::io::Result<()> {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(DELIMITER);
            }
            match self.escaping {
                Escaping::Backslash => escape_into(field, &mut line),
                Escaping::None => {
                    if field.contains([DELIMITER, '\n', '\r']) {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            format!("field {i} contains a delimiter or line break"),
                        ));
                    }
                    line.push_str(field);
                }
            }
        }
        line.push('\n');
        self.inner.write_all(line.as_bytes())?;
        self.written += 1;
        Ok(())
    }

    /// Records written so far (header included).
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Encode `field` for a backslash-escaped stream.
fn escape_into(field: &str, out: &mut String) {
    for ch in field.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
}

/// Decode a backslash-escaped field.
pub fn unescape_field(raw: &str) -> std::result::Result<String, String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(format!("unknown escape sequence '\\{other}'")),
            None => return Err("dangling backslash at end of field".into()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(data: &str, escaping: Escaping) -> Result<Vec<Record>> {
        RecordReader::new(data.as_bytes(), "test.tsv", escaping).collect()
    }

    #[test]
    fn splits_on_tabs_and_numbers_rows() {
        let records = read_all("q1\tcat food\nq2\tdog toys\n", Escaping::None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 1);
        assert_eq!(records[0].fields, ["q1", "cat food"]);
        assert_eq!(records[1].row, 2);
    }

    #[test]
    fn skips_blank_lines_but_counts_them() {
        let records = read_all("a\tb\n\n\r\nc\td", Escaping::None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].row, 4);
        assert_eq!(records[1].fields, ["c", "d"]);
    }

    #[test]
    fn strips_crlf() {
        let records = read_all("a\tb\r\n", Escaping::None).unwrap();
        assert_eq!(records[0].fields, ["a", "b"]);
    }

    #[test]
    fn keeps_empty_fields() {
        let records = read_all("d1\t\tbody\n", Escaping::None).unwrap();
        assert_eq!(records[0].fields, ["d1", "", "body"]);
    }

    #[test]
    fn raw_mode_leaves_backslashes_alone() {
        let records = read_all("q1\tC:\\temp\n", Escaping::None).unwrap();
        assert_eq!(records[0].fields[1], "C:\\temp");
    }

    #[test]
    fn escaped_fields_survive_write_then_read() {
        let text = "line one\nline two\twith tab \\ and slash\r";
        let mut writer = RecordWriter::new(Vec::new(), Escaping::Backslash);
        writer.write_record(&["d1", "Title", text]).unwrap();
        let bytes = writer.into_inner().unwrap();

        let out = String::from_utf8(bytes).unwrap();
        assert_eq!(out.lines().count(), 1);

        let records = read_all(&out, Escaping::Backslash).unwrap();
        assert_eq!(records[0].fields, ["d1", "Title", text]);
    }

    #[test]
    fn bad_escape_is_malformed() {
        let err = read_all("d1\tbad \\q escape\tx\n", Escaping::Backslash).unwrap_err();
        match err {
            EvalCorpusError::MalformedRecord { input, row, message } => {
                assert_eq!(input, "test.tsv");
                assert_eq!(row, 1);
                assert!(message.contains("\\q"));
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn plain_tsv_backslash_hints_at_foreign_stream() {
        let err = read_all("d1\tPaths\tC:\\Users\\x\n", Escaping::Backslash).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown escape sequence '\\U'"));
        assert!(message.contains("evalcorpus materialize"));
    }

    #[test]
    fn dangling_backslash_is_rejected() {
        assert!(unescape_field("ends with \\").is_err());
    }

    #[test]
    fn raw_writer_rejects_embedded_delimiter() {
        let mut writer = RecordWriter::new(Vec::new(), Escaping::None);
        assert!(writer.write_record(&["a\tb"]).is_err());
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn field_count_checks() {
        let record = Record {
            row: 3,
            fields: vec!["q1".into(), "x".into(), "d1".into(), "1".into(), "extra".into()],
        };
        assert!(record.expect_min_fields("qrels.tsv", 3).is_ok());
        let err = record.expect_fields("qrels.tsv", 4).unwrap_err();
        assert!(err.to_string().contains("expected 4 fields, got 5"));
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn leading_fields_drop_extra_columns() {
        let record = Record {
            row: 1,
            fields: vec!["q1".into(), "Q0".into(), "d1".into(), "1".into()],
        };
        let [qid, _, did] = record.clone().into_leading::<3>("qrels.tsv").unwrap();
        assert_eq!((qid.as_str(), did.as_str()), ("q1", "d1"));
        assert!(record.into_fields::<3>("qrels.tsv").is_err());
    }
}
