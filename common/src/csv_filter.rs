use std::io::{BufRead, BufReader, Read, Write};

use csv::StringRecord;
use thiserror::Error;
use tracing::debug;

use crate::util::diag;

#[derive(Error, Debug)]
pub enum CsvFilterError {
    #[error(
        "malformed file, rows have a different number of columns \
         (line {line}: {found} fields, expected {expected})"
    )]
    ColumnCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A row is unique when every field differs from the previous kept row; a
/// single matching field is enough to drop it. This is intentionally looser
/// than the JSON filter's adjacent-pair policy.
fn unique_row(
    prev: &StringRecord,
    curr: &StringRecord,
    line: usize,
) -> Result<bool, CsvFilterError> {
    if prev.len() != curr.len() {
        return Err(CsvFilterError::ColumnCountMismatch {
            line,
            expected: prev.len(),
            found: curr.len(),
        });
    }
    Ok(prev.iter().zip(curr).all(|(a, b)| a != b))
}

/// Copies CSV data from `input` to `output`, dropping rows identical to the
/// previous kept row. Leading `#` comment lines (wherever they appear) are
/// re-emitted verbatim ahead of the data block; the header and the first
/// data row are always kept. Dropped rows are reported on stderr with their
/// original line number.
pub fn filter_csv<R: Read, W: Write>(input: R, output: W) -> Result<(), CsvFilterError> {
    let mut comments = Vec::new();
    let mut data = String::new();
    for line in BufReader::new(input).lines() {
        let line = line?;
        if line.trim().starts_with('#') {
            comments.push(line);
        } else {
            data.push_str(&line);
            data.push('\n');
        }
    }

    let mut output = output;
    for comment in &comments {
        writeln!(output, "{comment}")?;
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes());
    let mut writer = csv::Writer::from_writer(output);

    let mut prev: Option<StringRecord> = None;
    let mut data_line = 0usize;
    let mut dropped = 0usize;
    for result in reader.records() {
        let record = result?;
        data_line += 1;
        match &prev {
            // header and first data row are never dedup candidates
            None => {
                writer.write_record(&record)?;
                if data_line > 1 {
                    prev = Some(record);
                }
            }
            Some(p) => {
                if unique_row(p, &record, comments.len() + data_line)? {
                    writer.write_record(&record)?;
                    prev = Some(record);
                } else {
                    diag(format!("Filtered out line {}", comments.len() + data_line));
                    dropped += 1;
                }
            }
        }
    }
    writer.flush()?;
    debug!("dropped {dropped} of {data_line} rows");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> Result<String, CsvFilterError> {
        let mut out = Vec::new();
        filter_csv(input.as_bytes(), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn identical_rows_are_dropped() {
        let out = run("a,b,c\n1,2,3\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(out, "a,b,c\n1,2,3\n4,5,6\n");
    }

    #[test]
    fn one_matching_field_drops_the_row() {
        let out = run("a,b,c\n1,2,3\n1,9,9\n7,8,9\n").unwrap();
        // "1,9,9" shares field a with the baseline; "7,8,9" differs everywhere
        assert_eq!(out, "a,b,c\n1,2,3\n7,8,9\n");
    }

    #[test]
    fn dropped_rows_do_not_advance_the_baseline() {
        let out = run("a,b\n1,2\n1,3\n1,4\n5,6\n").unwrap();
        assert_eq!(out, "a,b\n1,2\n5,6\n");
    }

    #[test]
    fn header_and_first_data_row_always_kept() {
        let out = run("a,b\n1,1\n").unwrap();
        assert_eq!(out, "a,b\n1,1\n");
    }

    #[test]
    fn comments_are_reemitted_ahead_of_data() {
        let out = run("# run 1\na,b\n# midway\n1,2\n1,3\n").unwrap();
        assert_eq!(out, "# run 1\n# midway\na,b\n1,2\n");
    }

    #[test]
    fn column_count_mismatch_is_fatal() {
        let err = run("a,b,c\n1,2,3\n1,2\n").unwrap_err();
        assert!(matches!(
            err,
            CsvFilterError::ColumnCountMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn empty_input() {
        assert_eq!(run("").unwrap(), "");
    }

    #[test]
    fn header_only() {
        assert_eq!(run("a,b,c\n").unwrap(), "a,b,c\n");
    }
}
