use crate::model::FaqEntry;
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub fn save_entries_jsonl(path: &Path, entries: &[FaqEntry]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for entry in entries {
        let line = serde_json::to_string(entry).context("serialize faq entry")?;
        writer
            .write_all(line.as_bytes())
            .context("write entry line")?;
        writer.write_all(b"\n").context("write newline")?;
    }

    writer.flush().context("flush output")
}

/// Loads FAQ entries, one JSON object per line. Entries keep file order,
/// which is the matcher's tie-break order.
pub fn load_entries_jsonl(path: &Path) -> Result<Vec<FaqEntry>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.context("read jsonl line")?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: FaqEntry = serde_json::from_str(&line)
            .with_context(|| format!("parse faq entry json at line {line_no}"))?;

        if entry.question.trim().is_empty() {
            bail!("faq entry {} at line {line_no} has an empty question", entry.id);
        }
        if !seen.insert(entry.id.clone()) {
            bail!("duplicate faq id {} at line {line_no}", entry.id);
        }
        entries.push(entry);
    }

    Ok(entries)
}
