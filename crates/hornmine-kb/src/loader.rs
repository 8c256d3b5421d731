//! TSV fact files
//!
//! One fact per line as `subject<TAB>predicate<TAB>object`. Blank lines and
//! lines starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hornmine_core::limits::validate_name;
use hornmine_core::Fact;

use crate::error::{KbError, KbResult};

/// Parse facts from a reader
pub fn parse_facts(reader: impl BufRead) -> KbResult<Vec<Fact>> {
    let mut facts = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let [subject, predicate, object] = fields.as_slice() else {
            return Err(KbError::Parse {
                line: line_no,
                reason: format!("expected 3 tab-separated fields, found {}", fields.len()),
            });
        };
        for field in [subject, predicate, object] {
            validate_name(field).map_err(|e| KbError::Parse {
                line: line_no,
                reason: e.to_string(),
            })?;
        }
        facts.push(Fact::new(*subject, *predicate, *object));
    }
    Ok(facts)
}

/// Read facts from a TSV file
pub fn load_facts(path: impl AsRef<Path>) -> KbResult<Vec<Fact>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let facts = parse_facts(BufReader::new(file))?;
    tracing::debug!("Loaded {} facts from {}", facts.len(), path.display());
    Ok(facts)
}
