//! Capabilities injected by callers
//!
//! Indexers and services never know the shape of the caller's types. They are
//! handed these traits instead:
//! - `IndexTransformer<E>` turns an entity into a `Document` to index
//! - `DocumentTransformer<R>` turns a stored `Document` back into a result
//! - `SortTypeResolver` says how a field's values compare when sorting
//!
//! Closures with the matching signature implement each trait.

use crate::document::Document;
use crate::error::TransformError;
use crate::field::Field;

/// Entity → document
pub trait IndexTransformer<E>: Send + Sync {
    /// Build the document to index for `entity`
    fn transform(&self, entity: &E) -> Result<Document, TransformError>;
}

impl<E, F> IndexTransformer<E> for F
where
    F: Fn(&E) -> Result<Document, TransformError> + Send + Sync,
{
    fn transform(&self, entity: &E) -> Result<Document, TransformError> {
        self(entity)
    }
}

/// Stored document → result value
pub trait DocumentTransformer<R>: Send + Sync {
    /// Build a result from the loaded fields
    fn transform(&self, document: &Document) -> Result<R, TransformError>;
}

impl<R, F> DocumentTransformer<R> for F
where
    F: Fn(&Document) -> Result<R, TransformError> + Send + Sync,
{
    fn transform(&self, document: &Document) -> Result<R, TransformError> {
        self(document)
    }
}

/// How a sort field's values are typed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortType {
    /// Lexicographic on the raw term
    Str,
    /// Signed integer (dates included)
    I64,
    /// Unsigned integer
    U64,
    /// Floating point
    F64,
}

/// Field → sort type lookup
pub trait SortTypeResolver: Send + Sync {
    /// Sort type of `field`
    fn sort_type(&self, field: &Field) -> SortType;
}

impl<F> SortTypeResolver for F
where
    F: Fn(&Field) -> SortType + Send + Sync,
{
    fn sort_type(&self, field: &Field) -> SortType {
        self(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_transformers() {
        let to_doc = |s: &String| -> Result<Document, TransformError> {
            Ok(Document::new().with("id", s.clone()))
        };
        let from_doc = |d: &Document| -> Result<String, TransformError> {
            d.get_str("id")
                .map(str::to_string)
                .ok_or_else(|| TransformError::missing_field("id"))
        };

        let doc = IndexTransformer::transform(&to_doc, &"7".to_string()).unwrap();
        let back: String = DocumentTransformer::transform(&from_doc, &doc).unwrap();
        assert_eq!(back, "7");
        assert!(DocumentTransformer::transform(&from_doc, &Document::new()).is_err());
    }

    #[test]
    fn test_closure_sort_resolver() {
        let resolver = |f: &Field| {
            if f.name() == "create_date" {
                SortType::I64
            } else {
                SortType::Str
            }
        };
        assert_eq!(resolver.sort_type(&Field::from("create_date")), SortType::I64);
        assert_eq!(resolver.sort_type(&Field::ID), SortType::Str);
    }
}
