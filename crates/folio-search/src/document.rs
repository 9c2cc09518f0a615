//! Mapping from text fragments to Tantivy documents.

use tantivy::doc;
use tantivy::TantivyDocument;

use folio_types::TextFragment;

use crate::schema::FragmentSchema;

/// Convert a persisted fragment to a Tantivy document.
///
/// Returns `None` for fragments without an id, which cannot be resolved
/// back through the store.
pub fn fragment_to_doc(
    schema: &FragmentSchema,
    fragment: &TextFragment,
    title: &str,
) -> Option<TantivyDocument> {
    let fragment_id = fragment.id.as_ref()?;
    Some(doc!(
        schema.fragment_id => fragment_id.clone(),
        schema.document_id => fragment.document_id.clone(),
        schema.title => title,
        schema.text => fragment.text.clone()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_fragment_schema;
    use folio_types::BoundingBox;
    use tantivy::schema::Value;

    #[test]
    fn test_fragment_to_doc() {
        let schema = build_fragment_schema();
        let fragment =
            TextFragment::new("d1", 0, "hello world", BoundingBox::default()).with_id("f1");

        let doc = fragment_to_doc(&schema, &fragment, "Doc One").unwrap();
        let id = doc
            .get_first(schema.fragment_id)
            .and_then(|v| v.as_str())
            .unwrap();
        assert_eq!(id, "f1");
    }

    #[test]
    fn test_unpersisted_fragment_skipped() {
        let schema = build_fragment_schema();
        let fragment = TextFragment::new("d1", 0, "hello", BoundingBox::default());
        assert!(fragment_to_doc(&schema, &fragment, "Doc One").is_none());
    }
}
