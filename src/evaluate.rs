//! Partial evaluation of expressions into structural values.
//!
//! The type passes use an [`Evaluator`] to turn parameter patterns into the
//! shapes they describe, and to see through implicit candidates whose type
//! alone says nothing useful.

use std::collections::BTreeMap;

use log::trace;

use crate::{
    config::Limits,
    expr::{Expression, Node},
    scope::Scope,
    value::{Name, Substitution, Value},
};

pub trait Evaluator {
    /// Evaluates `node` in `scope`, or returns `None` if it has no structural
    /// value.
    fn evaluate(&self, scope: &Scope, node: &Node) -> Option<Value>;
}

/// An [`Evaluator`] that reduces as far as it can without running anything.
///
/// Identifiers bound to a defining expression are unfolded, at most
/// `depth` times along any path. Parameters evaluate to their type, and
/// unbound identifiers evaluate to a free variable of the same name.
#[derive(Debug, Clone, Copy)]
pub struct PartialEvaluator {
    depth: usize,
}

impl PartialEvaluator {
    pub fn new(limits: &Limits) -> Self {
        Self {
            depth: limits.evaluation_depth,
        }
    }
}

impl Default for PartialEvaluator {
    fn default() -> Self {
        Self::new(&Limits::default())
    }
}

impl Evaluator for PartialEvaluator {
    fn evaluate(&self, scope: &Scope, node: &Node) -> Option<Value> {
        let value = eval(scope, &BTreeMap::new(), node, self.depth);
        trace!("evaluated {node} to {value:?}");
        value
    }
}

type Locals = BTreeMap<Name, Value>;

fn eval(scope: &Scope, locals: &Locals, node: &Node, depth: usize) -> Option<Value> {
    let value = match &node.expression {
        Expression::Identifier(name) => match locals.get(name) {
            Some(value) => value.clone(),
            None => match scope.lookup(name) {
                Some(binding) => match &binding.node {
                    Some(_) if depth == 0 => return None,
                    Some(definition) => {
                        eval(scope, &Locals::new(), definition, depth - 1)?
                    }
                    None => binding.ty.clone(),
                },
                None => Value::FreeVariable(name.clone()),
            },
        },
        Expression::Boolean(value) => Value::Boolean(*value),
        Expression::Number(value) => Value::Number(*value),
        Expression::String(value) => Value::String(value.clone()),
        Expression::Symbol(name) => Value::Symbol(name.clone()),
        Expression::Record(properties) => Value::Record(
            properties
                .iter()
                .map(|(name, node)| Some((name.clone(), eval(scope, locals, node, depth)?)))
                .collect::<Option<_>>()?,
        ),
        Expression::DataInstantiation { name, parameters } => Value::Data {
            name: Box::new(Value::Symbol(name.clone())),
            parameters: parameters
                .iter()
                .map(|node| eval(scope, locals, node, depth))
                .collect::<Option<_>>()?,
        },
        Expression::Dual { left, right } => Value::dual(
            eval(scope, locals, left, depth)?,
            eval(scope, locals, right, depth)?,
        ),
        Expression::Function {
            parameter,
            body,
            implicit,
        } => {
            let pattern = eval(scope, locals, parameter, depth)?;
            let mut inner = locals.clone();
            for binder in pattern.free_variables() {
                inner.insert(binder.clone(), Value::FreeVariable(binder));
            }

            let body = eval(scope, &inner, body, depth)?;
            match implicit {
                true => Value::implicit_function(pattern, body),
                false => Value::function(pattern, body),
            }
        }
        Expression::Application { callee, parameter } => {
            let callee = eval(scope, locals, callee, depth)?;
            let argument = eval(scope, locals, parameter, depth)?;
            apply(callee, argument)
        }
        Expression::Binding { name, value, body } => {
            let value = eval(scope, locals, value, depth)?;
            let mut inner = locals.clone();
            inner.insert(name.clone(), value);
            eval(scope, &inner, body, depth)?
        }
        Expression::ReadRecordProperty { record, property } => {
            match eval(scope, locals, record, depth)? {
                Value::Record(properties) => properties.get(property)?.clone(),
                record => Value::read_record_property(record, property.clone()),
            }
        }
        Expression::ReadDataProperty { data, index } => {
            match eval(scope, locals, data, depth)? {
                Value::Data { parameters, .. } => parameters.get(*index)?.clone(),
                data => Value::read_data_property(data, *index),
            }
        }
        Expression::PatternMatch { .. } => return None,
    };

    Some(value)
}

/// Beta-reduces `callee` applied to `argument` when the callee is a function
/// of a single binder, and keeps the application symbolic otherwise.
fn apply(callee: Value, argument: Value) -> Value {
    match callee {
        Value::Function { parameter, body } => match *parameter {
            Value::FreeVariable(binder) => {
                Substitution::from_iter([(binder, argument)]).apply(&body)
            }
            parameter => Value::application(
                Value::Function {
                    parameter: Box::new(parameter),
                    body,
                },
                argument,
            ),
        },
        callee => Value::application(callee, argument),
    }
}

#[cfg(test)]
mod tests {
    use super::{Evaluator, PartialEvaluator};
    use crate::{
        config::Limits,
        scope::{Scope, ScopeBinding},
        syntax::parse,
        value::tests::v,
    };

    fn evaluate(source: &str) -> Option<crate::value::Value> {
        let node = parse(source).unwrap();
        PartialEvaluator::default().evaluate(&Scope::new(), &node)
    }

    #[test]
    fn literals_and_structures_evaluate_to_themselves() {
        assert_eq!(evaluate("1"), Some(v!(num 1)));
        assert_eq!(
            evaluate("{ x: Num<a>, y: :ok }"),
            Some(v!(record "x": v!(data "Num"; v!(var "a")), "y": v!(sym "ok")))
        );
        assert_eq!(
            evaluate("x @ Num<a>"),
            Some(v!(dual v!(var "x"), v!(data "Num"; v!(var "a"))))
        );
    }

    #[test]
    fn applications_of_single_binders_reduce() {
        assert_eq!(evaluate("(a -> Pair<a, a>)(1)"), Some(v!(data "Pair"; v!(num 1), v!(num 1))));
        assert_eq!(
            evaluate("f(1)"),
            Some(v!(app v!(var "f"), v!(num 1)))
        );
    }

    #[test]
    fn bindings_and_projections_reduce() {
        assert_eq!(evaluate("let r = { x: 2 }; r.x"), Some(v!(num 2)));
        assert_eq!(evaluate("Pair<1, 2>.1"), Some(v!(num 2)));
        assert_eq!(evaluate("{ x: 2 }.y"), None);
    }

    #[test]
    fn identifiers_see_through_scope() {
        let definition = std::sync::Arc::new(parse("Num<:number>").unwrap());
        let scope = Scope::new()
            .bind(ScopeBinding {
                name: "numNumber".into(),
                ty: v!(var "ignored"),
                generalize: true,
                node: Some(definition),
            })
            .bind(ScopeBinding {
                name: "p".into(),
                ty: v!(var "p#1"),
                generalize: false,
                node: None,
            });

        let evaluator = PartialEvaluator::default();
        let node = parse("Pair<numNumber, p>").unwrap();

        assert_eq!(
            evaluator.evaluate(&scope, &node),
            Some(v!(data "Pair"; v!(data "Num"; v!(sym "number")), v!(var "p#1")))
        );
    }

    #[test]
    fn unfolding_is_bounded() {
        let definition = std::sync::Arc::new(parse("loop").unwrap());
        let scope = Scope::new().bind(ScopeBinding {
            name: "loop".into(),
            ty: v!(var "loop#1"),
            generalize: true,
            node: Some(definition),
        });

        let evaluator = PartialEvaluator::new(&Limits {
            evaluation_depth: 4,
            ..Limits::default()
        });

        assert_eq!(evaluator.evaluate(&scope, &parse("loop").unwrap()), None);
    }
}
