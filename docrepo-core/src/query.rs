//! Query descriptors and their translation into store statements.
//!
//! Callers describe what they want with a [`Query`]: either every entity in a container,
//! or a conjunction of [`QueryDescriptor`]s, each comparing one field with
//! [`Operator::Equals`] or [`Operator::In`]. The [`StatementTranslator`] validates field
//! names against the entity's declared attributes and renders a [`Statement`] with
//! positional parameters.
//!
//! # Query Building
//!
//! ```ignore
//! use docrepo::query::{Query, QueryDescriptor, QueryMethod};
//!
//! const FIND_BY_FIRST_NAME: QueryMethod = QueryMethod::equals("firstName");
//! const FIND_BY_LAST_NAMES: QueryMethod = QueryMethod::is_in("lastName");
//!
//! let query = Query::filter(FIND_BY_FIRST_NAME.bind_one("Alice"))
//!     .and(FIND_BY_LAST_NAMES.bind(["Smith", "Jones"]));
//! ```
//!
//! # Statements
//!
//! A translated [`Statement`] carries the rendered text (`SELECT * FROM c WHERE
//! c.firstName = @p0`), the bound parameters in order, and the [`Predicate`] tree the
//! text was rendered from. Backends that speak the text dialect send it as-is; structured
//! backends walk the predicate with a [`StatementVisitor`].

use bson::Bson;
use std::fmt;

use crate::{
    entity::Entity,
    error::{RepositoryError, RepositoryResult},
};

/// Comparison operators supported by query descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Field equals the single bound value.
    Equals,
    /// Field equals any of the bound values. An empty set matches nothing.
    In,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals => f.write_str("="),
            Operator::In => f.write_str("IN"),
        }
    }
}

/// A single field comparison: target field, operator and bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    field: String,
    operator: Operator,
    values: Vec<Bson>,
}

impl QueryDescriptor {
    pub fn new(field: impl Into<String>, operator: Operator, values: Vec<Bson>) -> Self {
        Self { field: field.into(), operator, values }
    }

    /// Matches entities whose `field` equals `value`.
    pub fn equals(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Equals, vec![value.into()])
    }

    /// Matches entities whose `field` equals any of `values`.
    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Self::new(
            field,
            Operator::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &[Bson] {
        &self.values
    }
}

/// A named query contract: which field a repository method filters on and how.
///
/// Declared once as a constant and bound to values at call time, in place of deriving
/// predicates from method names.
///
/// ```ignore
/// const FIND_BY_FIRST_NAME: QueryMethod = QueryMethod::equals("firstName");
///
/// let users = repository.collect_by(FIND_BY_FIRST_NAME.bind_one("Alice")).await?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMethod {
    field: &'static str,
    operator: Operator,
}

impl QueryMethod {
    pub const fn equals(field: &'static str) -> Self {
        Self { field, operator: Operator::Equals }
    }

    pub const fn is_in(field: &'static str) -> Self {
        Self { field, operator: Operator::In }
    }

    pub const fn field(&self) -> &'static str {
        self.field
    }

    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// Binds a single value.
    pub fn bind_one(&self, value: impl Into<Bson>) -> QueryDescriptor {
        QueryDescriptor::new(self.field, self.operator, vec![value.into()])
    }

    /// Binds a list of values. For [`Operator::Equals`] the list must hold exactly one
    /// value or translation fails.
    pub fn bind<I, V>(&self, values: I) -> QueryDescriptor
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        QueryDescriptor::new(
            self.field,
            self.operator,
            values.into_iter().map(Into::into).collect(),
        )
    }
}

/// What a query selects: the whole container, or entities matching every descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Query {
    /// Unconditional scan of the container.
    #[default]
    All,
    /// Conjunction of field comparisons.
    Where(Vec<QueryDescriptor>),
}

impl Query {
    pub fn all() -> Self {
        Query::All
    }

    pub fn filter(descriptor: QueryDescriptor) -> Self {
        Query::Where(vec![descriptor])
    }

    /// Adds another descriptor that must also match.
    pub fn and(self, descriptor: QueryDescriptor) -> Self {
        match self {
            Query::All => Query::filter(descriptor),
            Query::Where(mut list) => {
                list.push(descriptor);
                Query::Where(list)
            }
        }
    }
}

impl From<QueryDescriptor> for Query {
    fn from(descriptor: QueryDescriptor) -> Self {
        Query::filter(descriptor)
    }
}

/// A named statement parameter and its bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Bson,
}

/// The validated predicate tree a [`Statement`] was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every entity.
    All,
    /// Matches no entity.
    Nothing,
    /// Field equals value.
    Equals { field: String, value: Bson },
    /// Field equals any of a non-empty list of values.
    In { field: String, values: Vec<Bson> },
    /// Every child predicate matches.
    And(Vec<Predicate>),
}

/// A translated query ready to hand to a store connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    parameters: Vec<Parameter>,
    predicate: Predicate,
}

impl Statement {
    /// The statement selecting every entity in a container.
    pub fn select_all() -> Self {
        Self {
            text: StatementTranslator::SELECT.to_string(),
            parameters: Vec::new(),
            predicate: Predicate::All,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Looks up a bound parameter by name (including the `@` prefix).
    pub fn parameter(&self, name: &str) -> Option<&Bson> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Translates [`Query`] values into [`Statement`]s for one entity type.
///
/// Field names are checked against the declared attribute set. An unknown field fails
/// with [`RepositoryError::InvalidQuery`] before any request is issued.
#[derive(Debug)]
pub struct StatementTranslator<'a> {
    fields: &'a [&'a str],
    parameters: Vec<Parameter>,
}

impl<'a> StatementTranslator<'a> {
    const SELECT: &'static str = "SELECT * FROM c";
    const ALIAS: &'static str = "c";

    pub fn new(fields: &'a [&'a str]) -> Self {
        Self { fields, parameters: Vec::new() }
    }

    /// Creates a translator validating against `E`'s declared fields.
    pub fn for_entity<E: Entity>() -> StatementTranslator<'static> {
        StatementTranslator::new(E::fields())
    }

    pub fn translate(mut self, query: &Query) -> RepositoryResult<Statement> {
        let descriptors = match query {
            Query::All => return Ok(Statement::select_all()),
            Query::Where(descriptors) if descriptors.is_empty() => {
                return Ok(Statement::select_all());
            }
            Query::Where(descriptors) => descriptors,
        };

        let mut clauses = Vec::with_capacity(descriptors.len());
        let mut predicates = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let (clause, predicate) = self.translate_descriptor(descriptor)?;
            clauses.push(clause);
            predicates.push(predicate);
        }

        let predicate = if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Predicate::And(predicates)
        };

        Ok(Statement {
            text: format!("{} WHERE {}", Self::SELECT, clauses.join(" AND ")),
            parameters: self.parameters,
            predicate,
        })
    }

    fn translate_descriptor(
        &mut self,
        descriptor: &QueryDescriptor,
    ) -> RepositoryResult<(String, Predicate)> {
        let field = self.validate_field(descriptor.field())?;

        match descriptor.operator() {
            Operator::Equals => match descriptor.values() {
                [value] => {
                    let name = self.bind(value.clone());
                    Ok((
                        format!("{}.{} = {}", Self::ALIAS, field, name),
                        Predicate::Equals { field: field.to_string(), value: value.clone() },
                    ))
                }
                values => Err(RepositoryError::InvalidQuery(format!(
                    "equality on '{}' needs exactly one value, got {}",
                    field,
                    values.len(),
                ))),
            },
            // An empty candidate set is a valid query that selects nothing.
            Operator::In if descriptor.values().is_empty() => {
                Ok(("false".to_string(), Predicate::Nothing))
            }
            Operator::In => {
                let names = descriptor
                    .values()
                    .iter()
                    .map(|value| self.bind(value.clone()))
                    .collect::<Vec<_>>();

                Ok((
                    format!("{}.{} IN ({})", Self::ALIAS, field, names.join(", ")),
                    Predicate::In {
                        field: field.to_string(),
                        values: descriptor.values().to_vec(),
                    },
                ))
            }
        }
    }

    fn validate_field<'f>(&self, field: &'f str) -> RepositoryResult<&'f str> {
        if self.fields.contains(&field) {
            Ok(field)
        } else {
            Err(RepositoryError::InvalidQuery(format!(
                "unknown field '{}', expected one of [{}]",
                field,
                self.fields.join(", "),
            )))
        }
    }

    fn bind(&mut self, value: Bson) -> String {
        let name = format!("@p{}", self.parameters.len());
        self.parameters.push(Parameter { name: name.clone(), value });
        name
    }
}

/// Walks a [`Predicate`] tree, producing a backend-specific output.
///
/// The in-memory store implements this to evaluate predicates against documents;
/// the MongoDB store implements it to build filter documents.
pub trait StatementVisitor {
    type Output;
    type Error: Into<RepositoryError>;

    fn visit_all(&mut self) -> Result<Self::Output, Self::Error>;
    fn visit_nothing(&mut self) -> Result<Self::Output, Self::Error>;
    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error>;
    fn visit_and(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error>;

    fn visit_predicate(&mut self, predicate: &Predicate) -> Result<Self::Output, Self::Error> {
        match predicate {
            Predicate::All => self.visit_all(),
            Predicate::Nothing => self.visit_nothing(),
            Predicate::Equals { field, value } => self.visit_equals(field, value),
            Predicate::In { field, values } => self.visit_in(field, values),
            Predicate::And(predicates) => self.visit_and(predicates),
        }
    }

    fn visit_statement(&mut self, statement: &Statement) -> Result<Self::Output, Self::Error> {
        self.visit_predicate(statement.predicate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::User;

    const FIND_BY_FIRST_NAME: QueryMethod = QueryMethod::equals("firstName");
    const FIND_BY_LAST_NAMES: QueryMethod = QueryMethod::is_in("lastName");

    fn translate(query: &Query) -> RepositoryResult<Statement> {
        StatementTranslator::for_entity::<User>().translate(query)
    }

    #[test]
    fn all_renders_unconditional_select() {
        let statement = translate(&Query::all()).unwrap();

        assert_eq!(statement.text(), "SELECT * FROM c");
        assert!(statement.parameters().is_empty());
        assert_eq!(statement.predicate(), &Predicate::All);
    }

    #[test]
    fn equals_binds_one_parameter() {
        let statement = translate(&FIND_BY_FIRST_NAME.bind_one("F").into()).unwrap();

        assert_eq!(statement.text(), "SELECT * FROM c WHERE c.firstName = @p0");
        assert_eq!(statement.parameter("@p0"), Some(&Bson::from("F")));
        assert_eq!(
            statement.predicate(),
            &Predicate::Equals { field: "firstName".into(), value: "F".into() }
        );
    }

    #[test]
    fn in_binds_parameters_in_order() {
        let statement = translate(&FIND_BY_LAST_NAMES.bind(["L1", "L2"]).into()).unwrap();

        assert_eq!(
            statement.text(),
            "SELECT * FROM c WHERE c.lastName IN (@p0, @p1)"
        );
        let values = statement
            .parameters()
            .iter()
            .map(|p| p.value.as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(values, vec!["L1", "L2"]);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let statement =
            translate(&QueryDescriptor::is_in("lastName", Vec::<String>::new()).into()).unwrap();

        assert_eq!(statement.text(), "SELECT * FROM c WHERE false");
        assert_eq!(statement.predicate(), &Predicate::Nothing);
        assert!(statement.parameters().is_empty());
    }

    #[test]
    fn conjunction_numbers_parameters_across_clauses() {
        let query = Query::filter(QueryDescriptor::equals("id", "a"))
            .and(QueryDescriptor::equals("lastName", "L1"));
        let statement = translate(&query).unwrap();

        assert_eq!(
            statement.text(),
            "SELECT * FROM c WHERE c.id = @p0 AND c.lastName = @p1"
        );
        assert!(matches!(statement.predicate(), Predicate::And(list) if list.len() == 2));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = translate(&QueryDescriptor::equals("nickname", "x").into()).unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidQuery(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn equals_with_several_values_is_rejected() {
        let err = translate(&FIND_BY_FIRST_NAME.bind(["a", "b"]).into()).unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidQuery(_)));
    }
}
