use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::{info, warn};

use crate::error::{CtxError, Result};
use crate::signatures::Signature;

#[derive(Debug, Clone, Copy)]
pub struct GmtOptions {
    pub field_separator: char,
    pub member_separator: char,
}

impl Default for GmtOptions {
    fn default() -> Self {
        Self {
            field_separator: '\t',
            member_separator: '\t',
        }
    }
}

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads `name <sep> description <sep> member...` lines.
pub fn load_gmt(path: &Path, options: GmtOptions) -> Result<Vec<Signature>> {
    let reader = open_maybe_gz(path)?;
    let signatures = parse_gmt(reader, options)?;
    info!(
        path = %path.display(),
        n_signatures = signatures.len(),
        "loaded signatures"
    );
    Ok(signatures)
}

pub fn parse_gmt<R: BufRead>(reader: R, options: GmtOptions) -> Result<Vec<Signature>> {
    let mut out = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.splitn(3, options.field_separator);
        let name = fields.next().unwrap_or_default().trim();
        let _description = fields.next().ok_or_else(|| {
            CtxError::Parse(format!(
                "line {}: expected name, description and members",
                line_no + 1
            ))
        })?;
        let members: Vec<&str> = fields
            .next()
            .unwrap_or_default()
            .split(options.member_separator)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect();
        if name.is_empty() {
            return Err(CtxError::Parse(format!(
                "line {}: empty signature name",
                line_no + 1
            )));
        }
        if members.is_empty() {
            warn!(signature = %name, line = line_no + 1, "skipping signature without members");
            continue;
        }
        out.push(Signature::new(name, members)?);
    }
    Ok(out)
}
