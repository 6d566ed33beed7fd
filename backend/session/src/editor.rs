//! The hand-editable record: a working copy, explicit saves, and export.

use serde::Serialize;

use taxwise_core::{ExtractedRecord, TaxwiseError};

pub const DEFAULT_EXPORT_NAME: &str = "taxwise_ai_data.json";
pub const EXPORT_CONTENT_TYPE: &str = "application/json";

/// Result of a save that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The working copy was committed.
    Saved,
    /// Nothing to save; the working copy already equals the committed value.
    Unchanged,
}

/// A downloadable export of the committed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Holds the committed record and the user's uncommitted edits.
#[derive(Debug, Clone)]
pub struct RecordEditor {
    committed: ExtractedRecord,
    working: String,
}

impl RecordEditor {
    pub fn new(initial: ExtractedRecord) -> Self {
        let working = initial.as_str().to_string();
        Self {
            committed: initial,
            working,
        }
    }

    pub fn committed(&self) -> &ExtractedRecord {
        &self.committed
    }

    pub fn working(&self) -> &str {
        &self.working
    }

    /// Replace the working copy. Nothing is committed until [`save`](Self::save).
    pub fn edit(&mut self, text: impl Into<String>) {
        self.working = text.into();
    }

    pub fn is_dirty(&self) -> bool {
        self.working != self.committed.as_str()
    }

    /// Commit the working copy if it is valid JSON.
    ///
    /// On a parse failure the committed value is left untouched and the
    /// working copy is kept so the user can correct it.
    pub fn save(&mut self) -> Result<SaveOutcome, TaxwiseError> {
        if !self.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }
        self.committed = ExtractedRecord::parse(self.working.clone())?;
        Ok(SaveOutcome::Saved)
    }

    /// Export the committed record byte-for-byte, after checking it parses.
    pub fn export(&self, file_name: Option<&str>) -> Result<ExportFile, TaxwiseError> {
        let text = self.committed.as_str();
        if text.trim().is_empty() {
            return Err(TaxwiseError::InvalidJson("there is no data to export".into()));
        }
        serde_json::from_str::<serde_json::Value>(text)?;

        Ok(ExportFile {
            file_name: sanitize_file_name(file_name),
            content_type: EXPORT_CONTENT_TYPE,
            bytes: text.as_bytes().to_vec(),
        })
    }
}

/// Keep only the final path component and drop characters that would break a
/// `Content-Disposition` header.
fn sanitize_file_name(requested: Option<&str>) -> String {
    let name = requested
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect::<String>();
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." {
        DEFAULT_EXPORT_NAME.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(text: &str) -> RecordEditor {
        RecordEditor::new(ExtractedRecord::unchecked(text))
    }

    #[test]
    fn test_save_valid_json_commits_exact_text() {
        let mut ed = editor(r#"{"a":1}"#);
        ed.edit("{ \"a\": 2 }\n");
        assert_eq!(ed.save().unwrap(), SaveOutcome::Saved);
        assert_eq!(ed.committed().as_str(), "{ \"a\": 2 }\n");
        assert!(!ed.is_dirty());
    }

    #[test]
    fn test_save_invalid_json_leaves_committed_unchanged() {
        let mut ed = editor(r#"{"a":1}"#);
        ed.edit(r#"{"a":"#);
        let err = ed.save().unwrap_err();
        assert!(matches!(err, TaxwiseError::InvalidJson(_)));
        assert_eq!(ed.committed().as_str(), r#"{"a":1}"#);
        assert_eq!(ed.working(), r#"{"a":"#);
    }

    #[test]
    fn test_save_without_changes_is_noop() {
        let mut ed = editor(r#"{"a":1}"#);
        assert_eq!(ed.save().unwrap(), SaveOutcome::Unchanged);
        ed.edit(r#"{"a":1}"#);
        assert_eq!(ed.save().unwrap(), SaveOutcome::Unchanged);
    }

    #[test]
    fn test_export_round_trips() {
        let original = "{\n  \"a\": [1, 2, {\"b\": null}]\n}";
        let file = editor(original).export(None).unwrap();
        assert_eq!(file.file_name, DEFAULT_EXPORT_NAME);
        assert_eq!(file.content_type, "application/json");
        assert_eq!(file.bytes, original.as_bytes());

        let exported: serde_json::Value = serde_json::from_slice(&file.bytes).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(original).unwrap();
        assert_eq!(exported, parsed);
    }

    #[test]
    fn test_export_invalid_committed_value_fails() {
        assert!(editor("{oops").export(None).is_err());
        assert!(editor("   ").export(None).is_err());
    }

    #[test]
    fn test_export_file_name() {
        let ed = editor("{}");
        assert_eq!(ed.export(Some("mine.json")).unwrap().file_name, "mine.json");
        assert_eq!(ed.export(Some("../../etc/x.json")).unwrap().file_name, "x.json");
        assert_eq!(ed.export(Some("a\"b.json")).unwrap().file_name, "ab.json");
        assert_eq!(ed.export(Some("")).unwrap().file_name, DEFAULT_EXPORT_NAME);
    }
}
