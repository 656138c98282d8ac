//! Statement evaluation for in-memory document filtering.
//!
//! This module walks a translated statement's predicate tree and decides whether a BSON
//! document matches it.

use bson::Bson;
use std::collections::HashMap;

use docrepo_core::{
    error::RepositoryError,
    query::{Predicate, Statement, StatementVisitor},
};

/// Comparable view of a BSON value.
///
/// `Int32` and `Int64` compare exactly as integers, and only fall back to `f64` against a
/// `Double`. Every other type compares with BSON's own equality, so values of different
/// types never match.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Integer(i64),
    Double(f64),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::Integer(a), Comparable::Double(b))
            | (Comparable::Double(b), Comparable::Integer(a)) => *a as f64 == *b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

/// Decides whether one document matches a predicate.
///
/// Missing fields never match.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Bson,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> Self {
        Self { document }
    }

    pub fn matches(document: &'a Bson, statement: &Statement) -> bool {
        DocumentEvaluator::new(document)
            .visit_statement(statement)
            .unwrap_or(false)
    }

    fn field(&self, field: &str) -> Option<&'a Bson> {
        self.document.as_document()?.get(field)
    }
}

impl<'a> StatementVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = RepositoryError;

    fn visit_all(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(true)
    }

    fn visit_nothing(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(false)
    }

    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(self
            .field(field)
            .is_some_and(|stored| Comparable::from(stored) == Comparable::from(value)))
    }

    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        let Some(stored) = self.field(field) else {
            return Ok(false);
        };
        let stored = Comparable::from(stored);

        Ok(values
            .iter()
            .any(|candidate| Comparable::from(candidate) == stored))
    }

    fn visit_and(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        for predicate in predicates {
            if !self.visit_predicate(predicate)? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use docrepo_core::query::{Query, QueryDescriptor, StatementTranslator};

    const FIELDS: &[&str] = &["id", "firstName", "lastName", "age"];

    fn statement(query: Query) -> Statement {
        StatementTranslator::new(FIELDS).translate(&query).unwrap()
    }

    fn user() -> Bson {
        Bson::Document(doc! { "id": "a", "firstName": "F", "lastName": "L1", "age": 30 })
    }

    #[test]
    fn equality_normalizes_numbers() {
        let doc = user();

        assert!(DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("age", 30i64).into())
        ));
        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("age", 31).into())
        ));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let doc = Bson::Document(doc! { "id": "a", "age": 9_007_199_254_740_993i64 });

        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("age", 9_007_199_254_740_992i64).into())
        ));
        assert!(DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("age", 9_007_199_254_740_993i64).into())
        ));
        assert!(DocumentEvaluator::matches(
            &user(),
            &statement(QueryDescriptor::equals("age", 30.0).into())
        ));
    }

    #[test]
    fn other_types_use_bson_equality() {
        let stored = ObjectId::new();
        let doc = Bson::Document(doc! { "id": "a", "age": stored });

        assert!(DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("age", stored).into())
        ));
        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("age", ObjectId::new()).into())
        ));
        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("age", Bson::Null).into())
        ));
        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::is_in("age", [Bson::Null, Bson::from(ObjectId::new())]).into())
        ));
    }

    #[test]
    fn membership_and_conjunction() {
        let doc = user();

        assert!(DocumentEvaluator::matches(
            &doc,
            &statement(
                Query::filter(QueryDescriptor::is_in("lastName", ["L1", "L2"]))
                    .and(QueryDescriptor::equals("id", "a"))
            )
        ));
        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(
                Query::filter(QueryDescriptor::is_in("lastName", ["L1", "L2"]))
                    .and(QueryDescriptor::equals("id", "b"))
            )
        ));
    }

    #[test]
    fn empty_membership_and_missing_fields_never_match() {
        let doc = Bson::Document(doc! { "id": "a" });

        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::is_in("lastName", Vec::<String>::new()).into())
        ));
        assert!(!DocumentEvaluator::matches(
            &doc,
            &statement(QueryDescriptor::equals("lastName", "L1").into())
        ));
        assert!(DocumentEvaluator::matches(&doc, &statement(Query::all())));
    }
}
