//! User-facing diagnostics and fatal internal errors.

use thiserror::Error;

use crate::value::{Name, Value};

/// A problem found in the program being checked.
///
/// Diagnostics never abort a pass: they are accumulated and returned next to
/// the pass result, and the offending node is given a fresh type variable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    #[error(
        "expected {local_left} but found {local_right}, while converging \
         {entire_left} with {entire_right}"
    )]
    Mismatch {
        local_left: Value,
        local_right: Value,
        entire_left: Value,
        entire_right: Value,
    },
    #[error("cannot call a {kind}")]
    NotCallable { kind: &'static str, callee: Value },
    #[error("conflicting types inferred for {variable}: {existing} and {incoming}")]
    Conflict {
        variable: Name,
        existing: Value,
        incoming: Value,
    },
    #[error("{variable} would have to contain itself: {ty}")]
    Recursive { variable: Name, ty: Value },
    #[error("could not find a valid set of replacements for implicits in {ty}")]
    NoImplicitReplacements { ty: Value },
    #[error(
        "implicits were ambiguous, {sets} possible sets found for {implicits} implicits"
    )]
    AmbiguousImplicits { sets: usize, implicits: usize },
    #[error("the implicit {shape} cannot be determined from {core}")]
    UndeterminedImplicit { shape: Value, core: Value },
    #[error("implicit resolution went deeper than {limit} levels")]
    ImplicitDepthExceeded { limit: usize },
    #[error("{name} is already declared in this scope")]
    Redeclared { name: Name },
    #[error("the record {record} has no property {property}")]
    MissingRecordProperty { record: Value, property: Name },
    #[error("the data value {data} has no parameter at index {index}")]
    MissingDataProperty { data: Value, index: usize },
    #[error("cannot read property {property} of a {kind}")]
    NotReadable { kind: &'static str, property: String },
    #[error("could not evaluate the parameter pattern {pattern}")]
    UnevaluablePattern { pattern: String },
}

/// A tree shape the type passes were promised never to see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("encountered a pattern match that should have been desugared: {expression}")]
    PatternMatch { expression: String },
}
