//! Tantivy schema for text fragments.
//!
//! Each indexed document is one fragment: its id and owning document id are
//! stored for resolution, its document title and text are searchable.

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

use crate::SearchError;

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct FragmentSchema {
    schema: Schema,
    /// Fragment id, the retrievable reference (STRING | STORED)
    pub fragment_id: Field,
    /// Owning document id (STRING | STORED)
    pub document_id: Field,
    /// Title of the owning document (TEXT)
    pub title: Field,
    /// Extracted line text (TEXT)
    pub text: Field,
}

impl FragmentSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create a FragmentSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {} field", name)))
        };
        let fragment_id = field("fragment_id")?;
        let document_id = field("document_id")?;
        let title = field("title")?;
        let text = field("text")?;

        Ok(Self {
            schema,
            fragment_id,
            document_id,
            title,
            text,
        })
    }
}

/// Build the fragment schema.
pub fn build_fragment_schema() -> FragmentSchema {
    let mut schema_builder = Schema::builder();

    let fragment_id = schema_builder.add_text_field("fragment_id", STRING | STORED);
    let document_id = schema_builder.add_text_field("document_id", STRING | STORED);
    let title = schema_builder.add_text_field("title", TEXT);
    let text = schema_builder.add_text_field("text", TEXT);

    let schema = schema_builder.build();

    FragmentSchema {
        schema,
        fragment_id,
        document_id,
        title,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_schema() {
        let schema = build_fragment_schema();
        assert!(schema.schema.get_field("fragment_id").is_ok());
        assert!(schema.schema.get_field("title").is_ok());
        assert!(schema.schema.get_field("text").is_ok());
    }

    #[test]
    fn test_from_schema() {
        let original = build_fragment_schema();
        let rebuilt = FragmentSchema::from_schema(original.schema().clone()).unwrap();
        assert_eq!(rebuilt.fragment_id, original.fragment_id);
        assert_eq!(rebuilt.text, original.text);
    }

    #[test]
    fn test_from_schema_missing_field() {
        let mut builder = Schema::builder();
        builder.add_text_field("text", TEXT);
        let err = FragmentSchema::from_schema(builder.build()).unwrap_err();
        assert!(matches!(err, SearchError::SchemaMismatch(_)));
    }
}
