//! Document and text fragment types.
//!
//! A [`DocumentRecord`] is created on seed/import and only its annotation
//! state is mutated afterwards. [`TextFragment`]s are produced by the
//! indexing pipeline, one per extracted text run per page.

use serde::{Deserialize, Serialize};

/// A stored PDF document with its annotation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Stable opaque key, unique and immutable once assigned
    pub id: String,

    /// Source filename (unique across the store)
    pub filename: String,

    /// Human-readable title
    pub title: String,

    /// Opaque annotation blob exported by the viewer
    pub annotation_state: Option<Vec<u8>>,

    /// PDF binary
    pub content: Vec<u8>,
}

impl DocumentRecord {
    /// Create a new record without annotation state.
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        title: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            title: title.into(),
            annotation_state: None,
            content,
        }
    }

    /// Attach an annotation blob.
    pub fn with_annotation_state(mut self, state: Vec<u8>) -> Self {
        self.annotation_state = Some(state);
        self
    }

    /// Full patch describing every field of this record.
    ///
    /// Used for `Create` change log entries and peer replication.
    pub fn to_patch(&self) -> DocumentPatch {
        DocumentPatch {
            filename: Some(self.filename.clone()),
            title: Some(self.title.clone()),
            annotation_state: self.annotation_state.clone(),
            content: Some(self.content.clone()),
        }
    }

    /// Merge a partial update into this record. Fields absent from the patch
    /// are left untouched.
    pub fn apply_patch(&mut self, patch: &DocumentPatch) {
        if let Some(ref filename) = patch.filename {
            self.filename = filename.clone();
        }
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref state) = patch.annotation_state {
            self.annotation_state = Some(state.clone());
        }
        if let Some(ref content) = patch.content {
            self.content = content.clone();
        }
    }

    /// Build a record from a patch carrying every required field.
    ///
    /// Returns None if filename, title or content is missing.
    pub fn from_patch(id: impl Into<String>, patch: &DocumentPatch) -> Option<Self> {
        Some(Self {
            id: id.into(),
            filename: patch.filename.clone()?,
            title: patch.title.clone()?,
            annotation_state: patch.annotation_state.clone(),
            content: patch.content.clone()?,
        })
    }
}

/// Named, individually replicated fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentField {
    Filename,
    Title,
    AnnotationState,
    Content,
}

impl DocumentField {
    pub const ALL: [DocumentField; 4] = [
        DocumentField::Filename,
        DocumentField::Title,
        DocumentField::AnnotationState,
        DocumentField::Content,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentField::Filename => "filename",
            DocumentField::Title => "title",
            DocumentField::AnnotationState => "annotation_state",
            DocumentField::Content => "content",
        }
    }
}

impl std::fmt::Display for DocumentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial update on named document fields.
///
/// `update` merges only the fields that are `Some`. Annotation state can be
/// set but not cleared through a patch; clearing happens only on reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_state: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn annotation_state(mut self, state: Vec<u8>) -> Self {
        self.annotation_state = Some(state);
        self
    }

    pub fn content(mut self, content: Vec<u8>) -> Self {
        self.content = Some(content);
        self
    }

    /// Fields carried by this patch.
    pub fn fields(&self) -> Vec<DocumentField> {
        let mut fields = Vec::new();
        if self.filename.is_some() {
            fields.push(DocumentField::Filename);
        }
        if self.title.is_some() {
            fields.push(DocumentField::Title);
        }
        if self.annotation_state.is_some() {
            fields.push(DocumentField::AnnotationState);
        }
        if self.content.is_some() {
            fields.push(DocumentField::Content);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Keep only the listed fields.
    pub fn retain_fields(&self, keep: &[DocumentField]) -> DocumentPatch {
        DocumentPatch {
            filename: self
                .filename
                .clone()
                .filter(|_| keep.contains(&DocumentField::Filename)),
            title: self
                .title
                .clone()
                .filter(|_| keep.contains(&DocumentField::Title)),
            annotation_state: self
                .annotation_state
                .clone()
                .filter(|_| keep.contains(&DocumentField::AnnotationState)),
            content: self
                .content
                .clone()
                .filter(|_| keep.contains(&DocumentField::Content)),
        }
    }

    /// Capture the current values of `record` for the fields this patch touches.
    pub fn previous_values(&self, record: &DocumentRecord) -> DocumentPatch {
        DocumentPatch {
            filename: self.filename.as_ref().map(|_| record.filename.clone()),
            title: self.title.as_ref().map(|_| record.title.clone()),
            annotation_state: self
                .annotation_state
                .as_ref()
                .and_then(|_| record.annotation_state.clone()),
            content: self.content.as_ref().map(|_| record.content.clone()),
        }
    }
}

/// Axis-aligned region on a page.
///
/// Persisted as the ordered sequence `[left, top, width, height]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.left, b.top, b.width, b.height]
    }
}

/// A unit of extracted text tied to one document page and region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Assigned when persisted
    #[serde(default)]
    pub id: Option<String>,

    /// Owning document
    pub document_id: String,

    /// 0-based page index
    pub page_index: u32,

    pub text: String,

    pub bounding_box: BoundingBox,
}

impl TextFragment {
    /// Create an unpersisted fragment candidate.
    pub fn new(
        document_id: impl Into<String>,
        page_index: u32,
        text: impl Into<String>,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            id: None,
            document_id: document_id.into(),
            page_index,
            text: text.into(),
            bounding_box,
        }
    }

    /// Placeholder recorded for a page without any text run, so that every
    /// page of an indexed document owns at least one fragment.
    pub fn empty_page(document_id: impl Into<String>, page_index: u32) -> Self {
        Self::new(document_id, page_index, "", BoundingBox::default())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
