//! Purpose: Owned document model for an extracted archive and its teardown.
//! Exports: `Part`, `Document`, `PartialDocument`, `release_document`.
//! Role: Target of the result tree builder; handed to rendering/indexing consumers.
//! Invariants: A `Document` always has a valid entry part index into `parts`.
//! Invariants: `Document` values only come from `PartialDocument::finish`.
//! Invariants: `PartialDocument` tolerates unset fields so failed builds can be released.

use tracing::{trace, warn};

use crate::core::charset;
use crate::core::error::{Error, ErrorKind};

/// One body segment of the archive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Part {
    charset: Option<String>,
    media_type: Option<String>,
    content_id: Option<String>,
    content: Vec<u8>,
}

impl Part {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }

    pub fn with_charset(mut self, charset: Option<String>) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_media_type(mut self, media_type: Option<String>) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_content_id(mut self, content_id: Option<String>) -> Self {
        self.content_id = content_id;
        self
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// Decodes the content through the declared charset.
    pub fn decode_text(&self) -> Result<String, Error> {
        let Some(label) = self.charset.as_deref() else {
            return Err(Error::new(ErrorKind::Codec)
                .with_message("part has no declared charset"));
        };
        let units = charset::decode(&self.content, label)?;
        String::from_utf16(&units).map_err(|err| {
            Error::new(ErrorKind::Codec)
                .with_message("decoded text is not valid UTF-16")
                .with_source(err)
        })
    }

    fn matches_content_id(&self, cid: &str) -> bool {
        let Some(own) = self.content_id.as_deref() else {
            return false;
        };
        strip_angle_brackets(own) == strip_angle_brackets(cid)
    }
}

fn strip_angle_brackets(cid: &str) -> &str {
    let cid = cid.trim();
    cid.strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(cid)
}

/// The whole extracted archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    base_reference: String,
    title: String,
    parts: Vec<Part>,
    entry: usize,
}

impl Document {
    pub fn base_reference(&self) -> &str {
        &self.base_reference
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn entry_index(&self) -> usize {
        self.entry
    }

    /// The part designated as the rendering root.
    pub fn entry_part(&self) -> &Part {
        &self.parts[self.entry]
    }

    /// Finds a part by content id, ignoring surrounding `<...>` on either side.
    pub fn part_by_content_id(&self, cid: &str) -> Option<&Part> {
        self.parts.iter().find(|part| part.matches_content_id(cid))
    }
}

/// Tears down a document. Every owned buffer is released exactly once.
pub fn release_document(document: Document) {
    trace!(parts = document.parts.len(), "releasing document");
    drop(document);
}

/// A document under construction.
///
/// Every field starts unset. `parts` is sized up front with empty slots and filled in order.
#[derive(Debug, Default)]
pub struct PartialDocument {
    base_reference: Option<String>,
    title: Option<String>,
    parts: Vec<Option<Part>>,
    entry: Option<usize>,
}

impl PartialDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_base_reference(&mut self, base_reference: impl Into<String>) {
        self.base_reference = Some(base_reference.into());
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Allocates `len` unpopulated part slots, replacing any previous allocation.
    pub fn allocate_parts(&mut self, len: usize) {
        self.parts = Vec::with_capacity(len);
        self.parts.resize_with(len, || None);
        self.entry = None;
    }

    pub fn parts_len(&self) -> usize {
        self.parts.len()
    }

    pub fn populated_parts(&self) -> usize {
        self.parts.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn set_part(&mut self, index: usize, part: Part) -> Result<(), Error> {
        let Some(slot) = self.parts.get_mut(index) else {
            return Err(Error::new(ErrorKind::Internal)
                .with_message(format!(
                    "part index {index} outside {} allocated slots",
                    self.parts.len()
                )));
        };
        *slot = Some(part);
        Ok(())
    }

    /// Records `index` as the entry part. The first marked part wins; returns whether
    /// this call took effect.
    pub fn mark_entry(&mut self, index: usize) -> bool {
        match self.entry {
            Some(existing) => {
                warn!(existing, ignored = index, "multiple entry parts; keeping the first");
                false
            }
            None => {
                self.entry = Some(index);
                true
            }
        }
    }

    pub fn entry_index(&self) -> Option<usize> {
        self.entry
    }

    /// Converts into a `Document`, or releases everything and fails.
    pub fn finish(mut self) -> Result<Document, Error> {
        let Some(entry) = self.entry else {
            self.release();
            return Err(Error::new(ErrorKind::Integrity)
                .with_message("no part is marked as the entry part"));
        };
        let (Some(base_reference), Some(title)) = (self.base_reference.take(), self.title.take())
        else {
            self.release();
            return Err(Error::new(ErrorKind::Internal)
                .with_message("document finished before header fields were set"));
        };
        if entry >= self.parts.len() || self.parts.iter().any(Option::is_none) {
            self.release();
            return Err(Error::new(ErrorKind::Internal)
                .with_message("document finished with unpopulated parts"));
        }

        let parts = std::mem::take(&mut self.parts)
            .into_iter()
            .flatten()
            .collect();
        Ok(Document {
            base_reference,
            title,
            parts,
            entry,
        })
    }

    /// Tears down whatever has been populated so far; unset fields are skipped.
    pub fn release(self) {
        trace!(
            slots = self.parts.len(),
            populated = self.populated_parts(),
            has_base_reference = self.base_reference.is_some(),
            has_title = self.title.is_some(),
            "releasing partial document"
        );
        drop(self);
    }
}
