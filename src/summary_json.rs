//! Purpose: JSON summary of an extracted document for `inspect` and `unpack`.
//! Exports: `DocumentSummary`, `PartSummary`, `document_summary`.
//! Role: Keep the summary envelope shape identical across CLI commands.
//! Invariants: Stable camelCase key names; absent optional fields serialize as `null`.
//! Invariants: `file` is only emitted for parts written to disk by `unpack`.

use std::path::Path;

use serde::Serialize;
use unmht::Document;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentSummary {
    pub base_reference: String,
    pub title: String,
    pub entry_index: usize,
    pub parts: Vec<PartSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PartSummary {
    pub index: usize,
    pub media_type: Option<String>,
    pub charset: Option<String>,
    pub content_id: Option<String>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

pub(crate) fn document_summary(document: &Document) -> DocumentSummary {
    DocumentSummary {
        base_reference: document.base_reference().to_string(),
        title: document.title().to_string(),
        entry_index: document.entry_index(),
        parts: document
            .parts()
            .iter()
            .enumerate()
            .map(|(index, part)| PartSummary {
                index,
                media_type: part.media_type().map(str::to_string),
                charset: part.charset().map(str::to_string),
                content_id: part.content_id().map(str::to_string),
                size: part.content().len(),
                file: None,
            })
            .collect(),
    }
}

/// File name used by `unpack` for the part at `index`.
pub(crate) fn part_file_name(index: usize) -> String {
    format!("part-{index:03}")
}

impl DocumentSummary {
    pub(crate) fn with_files(mut self, dir: &Path) -> Self {
        for part in &mut self.parts {
            part.file = Some(
                dir.join(part_file_name(part.index))
                    .display()
                    .to_string(),
            );
        }
        self
    }
}
