//! Purpose: Single entry point turning container text plus a parsing program into a `Document`.
//! Exports: `extract`, `ReferenceMode`.
//! Role: Orchestrates bridge -> builder -> teardown for one extraction call.
//! Invariants: The script context is closed exactly once, after the builder has copied its data.
//! Invariants: Any failure returns no document; partial state is released before returning.

use tracing::debug;

use crate::bridge::{ScriptContext, ScriptInputs};
use crate::core::builder::build_document;
use crate::core::document::Document;
use crate::core::error::Error;

/// How the parsing program should rewrite cross-part references.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReferenceMode {
    /// Resolve through each part's content id (`cid:` URLs).
    ContentId,
    /// Resolve through a synthesized placeholder locator.
    Placeholder,
}

impl ReferenceMode {
    pub fn is_content_id(self) -> bool {
        matches!(self, Self::ContentId)
    }
}

impl From<bool> for ReferenceMode {
    fn from(cid_mode: bool) -> Self {
        if cid_mode {
            Self::ContentId
        } else {
            Self::Placeholder
        }
    }
}

/// Extracts `text` using the jq `program`.
pub fn extract(text: &[u8], program: &str, mode: ReferenceMode) -> Result<Document, Error> {
    let mut context = ScriptContext::load(program)?;
    let tree = match context.evaluate(ScriptInputs {
        text,
        cid_mode: mode.is_content_id(),
    }) {
        Ok(tree) => tree,
        Err(err) => {
            context.close();
            return Err(err);
        }
    };

    let document = build_document(&tree);
    drop(tree);
    context.close();

    if let Ok(document) = &document {
        debug!(
            parts = document.parts().len(),
            title = document.title(),
            "extracted document"
        );
    }
    document
}
