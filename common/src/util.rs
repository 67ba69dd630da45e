use std::{
    collections::BTreeSet,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
    sync::LazyLock,
};

use eyre::{Context, Result};
use itertools::Itertools;

static PROG: LazyLock<String> = LazyLock::new(|| {
    std::env::args()
        .next()
        .unwrap_or_else(|| "telemetry-tools".to_owned())
});

/// Program name used to prefix diagnostic event lines.
pub fn prog_name() -> &'static str {
    &PROG
}

/// Writes a user-facing event line to stderr as `<prog>: <msg>`. These lines
/// are part of the CLI contract and are emitted regardless of the tracing
/// filter.
pub fn diag(msg: impl AsRef<str>) {
    eprintln!("{}: {}", prog_name(), msg.as_ref());
}

/// Opens the given path for reading, or stdin when no path is given.
pub fn read_from(path: Option<&Path>) -> Result<Box<dyn Read>> {
    Ok(match path {
        Some(p) => Box::new(BufReader::new(
            File::open(p).context(format!("Open input {}", p.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    })
}

/// Opens the given path for writing, or stdout when no path is given.
pub fn output_to(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).context(format!("Create output {}", p.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

/// Removes the given indices from `vec`, highest first so earlier indices
/// stay valid during removal.
pub fn remove_indices<T>(vec: &mut Vec<T>, indices: &BTreeSet<usize>) {
    for &index in indices.iter().rev() {
        if index < vec.len() {
            vec.remove(index);
        }
    }
}

/// Formats a removal set as `{1, 2, 3}`, or `{}` when empty.
pub fn fmt_index_set(indices: &BTreeSet<usize>) -> String {
    if indices.is_empty() {
        return "{}".to_owned();
    }
    format!("{{{}}}", indices.iter().join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_indices_descending() {
        let mut v = vec![10, 11, 12, 13, 14];
        remove_indices(&mut v, &BTreeSet::from([1, 3]));
        assert_eq!(v, vec![10, 12, 14]);
    }

    #[test]
    fn remove_indices_out_of_range_ignored() {
        let mut v = vec![1, 2];
        remove_indices(&mut v, &BTreeSet::from([0, 5]));
        assert_eq!(v, vec![2]);
    }

    #[test]
    fn index_set_formatting() {
        assert_eq!(fmt_index_set(&BTreeSet::new()), "{}");
        assert_eq!(fmt_index_set(&BTreeSet::from([2, 1, 5])), "{1, 2, 5}");
    }
}
