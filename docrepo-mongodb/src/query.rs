//! Statement translation into MongoDB query syntax.
//!
//! This module walks a statement's predicate tree and produces the BSON filter document
//! MongoDB evaluates.

use bson::{Bson, Document, doc};

use docrepo_core::{
    error::RepositoryError,
    query::{Predicate, StatementVisitor},
};

/// Translates statements into MongoDB filter documents.
pub(crate) struct MongoStatementTranslator;

impl StatementVisitor for MongoStatementTranslator {
    type Output = Document;
    type Error = RepositoryError;

    fn visit_all(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(doc! {})
    }

    fn visit_nothing(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "_id": { "$in": [] } })
    }

    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$eq": value },
        })
    }

    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$in": values.to_vec() },
        })
    }

    fn visit_and(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": predicates
                .iter()
                .map(|predicate| self.visit_predicate(predicate))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}
