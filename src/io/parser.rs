use crate::core::structure::Structure;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A file holds either one document or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Documents {
    Many(Vec<Structure>),
    One(Box<Structure>),
}

/// Fills fields a document may legitimately omit.
fn complete(mut doc: Structure, path: &Path, index: usize, total: usize) -> Structure {
    if doc.id.is_empty() {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        doc.id = if total > 1 { format!("{}-{}", stem, index) } else { stem };
    }
    if doc.enthalpy_per_atom == 0.0 && doc.num_atoms > 0 {
        doc.enthalpy_per_atom = doc.enthalpy / doc.num_atoms as f64;
    }
    doc
}

/// Parses a JSON file holding one structure document or an array of them.
///
/// Documents without an `id` are named after the file.
pub fn from_json(path: &Path) -> Result<Vec<Structure>> {
    let contents = fs::read_to_string(path).with_context(|| format!("Could not read JSON file: {:?}", path))?;
    let parsed: Documents =
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse structure documents in {:?}", path))?;

    let docs = match parsed {
        Documents::Many(docs) => docs,
        Documents::One(doc) => vec![*doc],
    };
    let total = docs.len();
    let docs: Vec<Structure> = docs
        .into_iter()
        .enumerate()
        .map(|(i, doc)| complete(doc, path, i, total))
        .collect();

    for doc in &docs {
        if doc.stoichiometry.is_empty() {
            return Err(anyhow!("Document {} in {:?} has an empty stoichiometry", doc.id, path));
        }
    }
    log::debug!("Read {} document(s) from {:?}", docs.len(), path);
    Ok(docs)
}

/// Reads every JSON file matching `pattern`, in sorted path order.
pub fn from_glob(pattern: &str) -> Result<Vec<Structure>> {
    let mut paths: Vec<_> = glob::glob(pattern)
        .with_context(|| format!("Invalid glob pattern: {}", pattern))?
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Could not list files for {}", pattern))?;
    paths.sort();

    if paths.is_empty() {
        return Err(anyhow!("No files match {}", pattern));
    }

    let mut docs = Vec::new();
    for path in &paths {
        docs.extend(from_json(path)?);
    }
    log::info!("Loaded {} structures from {} file(s).", docs.len(), paths.len());
    Ok(docs)
}
