// Result tree builder: validates the parsing program's property tree and copies it into an
// owned `Document`. The first inconsistency aborts the build and releases everything so far.
use tracing::{debug, trace};

use crate::core::document::{Document, Part, PartialDocument};
use crate::core::error::Error;
use crate::core::tree::{Binary, PropValue, Record};

pub const BASE_REFERENCE: &str = "baseReference";
pub const TITLE: &str = "title";
pub const PARTS: &str = "parts";
pub const CHARSET: &str = "charset";
pub const MEDIA_TYPE: &str = "mediaType";
pub const REF_PARAMS: &str = "refParams";
pub const CONTENT_ID: &str = "contentId";
pub const CONTENT: &str = "content";
pub const IS_ENTRY_PART: &str = "isEntryPart";

/// Builds a `Document` from `tree`. Parts keep the order of the tree's collection.
pub fn build_document(tree: &PropValue) -> Result<Document, Error> {
    let mut partial = PartialDocument::new();
    match populate(&mut partial, tree) {
        Ok(()) => {
            let document = partial.finish()?;
            debug!(
                parts = document.parts().len(),
                entry = document.entry_index(),
                "built document"
            );
            Ok(document)
        }
        Err(err) => {
            debug!(error = %err, "document build failed");
            partial.release();
            Err(err)
        }
    }
}

fn populate(partial: &mut PartialDocument, tree: &PropValue) -> Result<(), Error> {
    let root = Record::root(tree)?;
    partial.set_base_reference(root.required::<&str>(BASE_REFERENCE)?);
    partial.set_title(root.required::<&str>(TITLE)?);

    let parts = root.indexable(PARTS)?;
    let len = parts.len()?;
    partial.allocate_parts(len as usize);

    for index in 0..len {
        let record = parts.record_at(index)?;
        let (part, is_entry) = read_part(&record).map_err(|err| err.with_index(index))?;
        trace!(index, size = part.content().len(), is_entry, "read part");
        partial.set_part(index as usize, part)?;
        if is_entry {
            partial.mark_entry(index as usize);
        }
    }
    Ok(())
}

fn read_part(record: &Record<'_>) -> Result<(Part, bool), Error> {
    let charset = record.required::<Option<&str>>(CHARSET)?;
    let media_type = record.required::<Option<&str>>(MEDIA_TYPE)?;

    let params = record.record(REF_PARAMS)?;
    let content_id = params.required::<Option<&str>>(CONTENT_ID)?;
    let content = params.required::<Binary>(CONTENT)?;
    let is_entry = params.required::<bool>(IS_ENTRY_PART)?;

    let part = Part::new(content.to_vec())
        .with_charset(charset.map(str::to_string))
        .with_media_type(media_type.map(str::to_string))
        .with_content_id(content_id.map(str::to_string));
    Ok((part, is_entry))
}

#[cfg(test)]
mod tests {
    use super::build_document;
    use crate::core::error::ErrorKind;
    use crate::core::tree::PropValue;
    use serde_json::{Value, json};

    fn part(cid: &str, content: &str, entry: bool) -> Value {
        json!({
            "charset": "utf-8",
            "mediaType": "text/html",
            "refParams": {"contentId": cid, "content": content, "isEntryPart": entry}
        })
    }

    fn doc(parts: Vec<Value>) -> PropValue {
        PropValue::from_json(&json!({
            "baseReference": "cid:",
            "title": "Sample",
            "parts": parts,
        }))
    }

    #[test]
    fn single_entry_part_is_referenced() {
        let tree = doc(vec![part("<a>", "A", false), part("<b>", "B", true)]);
        let document = build_document(&tree).unwrap();
        assert_eq!(document.entry_index(), 1);
        assert_eq!(document.entry_part().content(), b"B");
        assert!(std::ptr::eq(document.entry_part(), &document.parts()[1]));
        assert_eq!(document.base_reference(), "cid:");
        assert_eq!(document.title(), "Sample");
    }

    #[test]
    fn parts_keep_collection_order() {
        let tree = doc(vec![
            part("<c>", "3", true),
            part("<a>", "1", false),
            part("<b>", "2", false),
        ]);
        let document = build_document(&tree).unwrap();
        let ids: Vec<_> = document
            .parts()
            .iter()
            .map(|p| p.content_id().unwrap())
            .collect();
        assert_eq!(ids, ["<c>", "<a>", "<b>"]);
    }

    #[test]
    fn zero_entry_parts_is_integrity_failure() {
        let tree = doc(vec![part("<a>", "A", false), part("<b>", "B", false)]);
        assert_eq!(build_document(&tree).unwrap_err().kind(), ErrorKind::Integrity);
    }

    #[test]
    fn empty_parts_is_integrity_failure() {
        let tree = doc(Vec::new());
        assert_eq!(build_document(&tree).unwrap_err().kind(), ErrorKind::Integrity);
    }

    #[test]
    fn multiple_entry_parts_first_wins() {
        let tree = doc(vec![
            part("<a>", "A", false),
            part("<b>", "B", true),
            part("<c>", "C", true),
        ]);
        assert_eq!(build_document(&tree).unwrap().entry_index(), 1);
    }

    #[test]
    fn missing_content_reports_field_and_index() {
        let mut second = part("<b>", "B", false);
        second["refParams"].as_object_mut().unwrap().remove("content");
        let tree = doc(vec![part("<a>", "A", true), second, part("<c>", "C", false)]);
        let err = build_document(&tree).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(err.field(), Some("parts[1].refParams.content"));
        assert_eq!(err.index(), Some(1));
    }

    #[test]
    fn header_fields_are_required() {
        let tree = PropValue::from_json(&json!({"title": "t", "parts": []}));
        let err = build_document(&tree).unwrap_err();
        assert_eq!(err.field(), Some("baseReference"));

        let tree = PropValue::from_json(&json!({"baseReference": "x", "parts": []}));
        assert_eq!(build_document(&tree).unwrap_err().field(), Some("title"));
    }

    #[test]
    fn null_parts_fails() {
        let tree = PropValue::from_json(&json!({"baseReference": "x", "title": "t", "parts": null}));
        assert_eq!(build_document(&tree).unwrap_err().kind(), ErrorKind::Shape);
    }

    #[test]
    fn part_level_fields_are_required_but_nullable() {
        let tree = doc(vec![json!({
            "charset": null,
            "mediaType": "image/png",
            "refParams": {"contentId": null, "content": "", "isEntryPart": true}
        })]);
        let document = build_document(&tree).unwrap();
        let only = document.entry_part();
        assert_eq!(only.charset(), None);
        assert_eq!(only.content_id(), None);
        assert!(only.content().is_empty());

        let tree = doc(vec![json!({
            "mediaType": "image/png",
            "refParams": {"contentId": null, "content": "", "isEntryPart": true}
        })]);
        assert_eq!(build_document(&tree).unwrap_err().field(), Some("parts[0].charset"));
    }

    #[test]
    fn missing_entry_flag_fails() {
        let tree = doc(vec![json!({
            "charset": null,
            "mediaType": null,
            "refParams": {"contentId": null, "content": ""}
        })]);
        let err = build_document(&tree).unwrap_err();
        assert_eq!(err.field(), Some("parts[0].refParams.isEntryPart"));
    }

    #[test]
    fn null_root_fails() {
        let err = build_document(&PropValue::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
    }

    #[test]
    fn array_like_parts_are_accepted() {
        let tree = PropValue::from_json(&json!({
            "baseReference": "x",
            "title": "t",
            "parts": {"length": 1, "0": part("<a>", "A", true)}
        }));
        assert_eq!(build_document(&tree).unwrap().parts().len(), 1);
    }
}
