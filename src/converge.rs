//! Structural unification of values.
//!
//! [`converge`] walks two values side by side. Wherever one side is a free
//! variable it records an [`InferredType`] fact; wherever the shapes disagree
//! it records a [`Diagnostic::Mismatch`] and carries on with the siblings, so
//! a single call reports every independent problem in a structure.

use std::sync::Arc;

use crate::{
    diagnostic::Diagnostic,
    value::{Name, Value},
};

/// Which sides of a convergence may be specialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Free variables on either side may be narrowed.
    Either,
    /// Only free variables on the right may be narrowed; a free variable on
    /// the left facing anything else is a mismatch.
    LeftSpecific,
}

/// The pair of values whose convergence produced a fact.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub originating: Value,
    pub inferring: Value,
}

/// A single fact found by convergence: the variable `from` may be
/// specialised to `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredType {
    pub from: Name,
    pub to: Value,
    pub provenance: Arc<Provenance>,
}

impl InferredType {
    pub fn new(from: Name, to: Value, originating: &Value, inferring: &Value) -> Self {
        Self {
            from,
            to,
            provenance: Arc::new(Provenance {
                originating: originating.clone(),
                inferring: inferring.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Converged {
    pub messages: Vec<Diagnostic>,
    pub inferred: Vec<InferredType>,
}

impl Converged {
    /// Returns `true` if the convergence found no mismatches.
    pub fn is_clean(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Converges `left` with `right`, returning every mismatch and every inferred
/// fact found along the way.
pub fn converge(left: &Value, right: &Value, direction: Direction) -> Converged {
    let mut converger = Converger {
        provenance: Arc::new(Provenance {
            originating: left.clone(),
            inferring: right.clone(),
        }),
        result: Converged::default(),
    };

    converger.converge(left, right, direction);
    converger.result
}

struct Converger {
    provenance: Arc<Provenance>,
    result: Converged,
}

impl Converger {
    fn infer(&mut self, from: &Name, to: &Value) {
        self.result.inferred.push(InferredType {
            from: from.clone(),
            to: to.clone(),
            provenance: self.provenance.clone(),
        });
    }

    fn mismatch(&mut self, left: &Value, right: &Value) {
        self.result.messages.push(Diagnostic::Mismatch {
            local_left: left.clone(),
            local_right: right.clone(),
            entire_left: self.provenance.originating.clone(),
            entire_right: self.provenance.inferring.clone(),
        });
    }

    fn converge(&mut self, left: &Value, right: &Value, direction: Direction) {
        match (left, right) {
            (_, Value::FreeVariable(name)) => self.infer(name, left),
            (Value::FreeVariable(name), _) => match direction {
                Direction::Either => self.infer(name, right),
                Direction::LeftSpecific => self.mismatch(left, right),
            },

            // DUALS
            (Value::Dual { left: first, right: second }, _) => {
                self.converge(first, right, direction);
                self.converge(second, right, direction);
            }
            (_, Value::Dual { left: first, right: second }) => {
                self.converge(left, first, direction);
                self.converge(left, second, direction);
            }

            // IMPLICITS
            (
                Value::ImplicitFunction {
                    parameter: left_parameter,
                    body: left_body,
                },
                Value::ImplicitFunction {
                    parameter: right_parameter,
                    body: right_body,
                },
            ) => {
                self.converge(left_parameter, right_parameter, Direction::LeftSpecific);
                self.converge(left_body, right_body, direction);
            }
            (Value::ImplicitFunction { .. }, _)
            | (_, Value::ImplicitFunction { .. }) => self.mismatch(left, right),

            // STRUCTURES
            (
                Value::Data {
                    name: left_name,
                    parameters: left_parameters,
                },
                Value::Data {
                    name: right_name,
                    parameters: right_parameters,
                },
            ) => {
                if left_parameters.len() != right_parameters.len() {
                    return self.mismatch(left, right);
                }

                self.converge(left_name, right_name, direction);
                for (left, right) in left_parameters.iter().zip(right_parameters) {
                    self.converge(left, right, direction);
                }
            }
            (Value::Record(left_properties), Value::Record(right_properties)) => {
                if !left_properties.keys().eq(right_properties.keys()) {
                    return self.mismatch(left, right);
                }

                for (left, right) in
                    left_properties.values().zip(right_properties.values())
                {
                    self.converge(left, right, direction);
                }
            }
            (
                Value::Application {
                    callee: left_callee,
                    parameter: left_parameter,
                },
                Value::Application {
                    callee: right_callee,
                    parameter: right_parameter,
                },
            ) => {
                self.converge(left_callee, right_callee, direction);
                self.converge(left_parameter, right_parameter, direction);
            }
            (Value::Application { .. }, Value::Data { .. }) => {
                self.application_with_data(left, right, Side::Left, direction)
            }
            (Value::Data { .. }, Value::Application { .. }) => {
                self.application_with_data(right, left, Side::Right, direction)
            }
            (
                Value::Function {
                    parameter: left_parameter,
                    body: left_body,
                },
                Value::Function {
                    parameter: right_parameter,
                    body: right_body,
                },
            ) => {
                self.converge(left_parameter, right_parameter, direction);
                self.converge(left_body, right_body, direction);
            }

            // LITERALS
            (Value::Symbol(a), Value::Symbol(b)) if a == b => (),
            (Value::Boolean(a), Value::Boolean(b)) if a == b => (),
            (Value::Number(a), Value::Number(b)) if a == b => (),
            (Value::String(a), Value::String(b)) if a == b => (),

            _ => self.mismatch(left, right),
        }
    }

    /// Converges a partially applied generic `application` with a concrete
    /// `data` value, matching trailing parameters first.
    fn application_with_data(
        &mut self,
        application: &Value,
        data: &Value,
        application_side: Side,
        direction: Direction,
    ) {
        let Value::Data { name, parameters } = data else {
            return self.mismatch_on(application_side, application, data);
        };

        let (root, arguments) = application.uncurry();
        if arguments.len() > parameters.len() {
            return self.mismatch_on(application_side, application, data);
        }

        let split = parameters.len() - arguments.len();
        for (argument, parameter) in arguments.iter().zip(&parameters[split..]).rev() {
            self.converge_on(application_side, argument, parameter, direction);
        }

        let remainder = Value::Data {
            name: name.clone(),
            parameters: parameters[..split].into(),
        };
        self.converge_on(application_side, root, &remainder, direction);
    }

    /// Converges `ours` with `theirs`, keeping `ours` on the given side.
    fn converge_on(
        &mut self,
        side: Side,
        ours: &Value,
        theirs: &Value,
        direction: Direction,
    ) {
        match side {
            Side::Left => self.converge(ours, theirs, direction),
            Side::Right => self.converge(theirs, ours, direction),
        }
    }

    fn mismatch_on(&mut self, side: Side, ours: &Value, theirs: &Value) {
        match side {
            Side::Left => self.mismatch(ours, theirs),
            Side::Right => self.mismatch(theirs, ours),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::{Direction, converge};
    use crate::{diagnostic::Diagnostic, value::tests::v};

    fn concrete_values() -> Vec<crate::value::Value> {
        vec![
            v!(num 7),
            v!(str "seven"),
            v!(sym "seven"),
            crate::value::Value::Boolean(true),
            v!(record "x": v!(num 1), "y": v!(data "Some"; v!(str "y"))),
            v!(data "Pair"; v!(num 1), v!(num 2)),
            v!(fn v!(data "Num"; v!(num 1)) => v!(record)),
        ]
    }

    #[test]
    fn convergence_is_reflexive() {
        for value in concrete_values() {
            let converged = converge(&value, &value, Direction::Either);
            assert!(converged.messages.is_empty(), "{value}: {converged:?}");
            assert!(converged.inferred.is_empty(), "{value}: {converged:?}");
        }
    }

    #[test]
    fn right_free_variables_always_narrow() {
        for value in concrete_values() {
            for direction in [Direction::Either, Direction::LeftSpecific] {
                let converged = converge(&value, &v!(var "x"), direction);
                assert!(converged.messages.is_empty());
                assert_eq!(converged.inferred.len(), 1);
                assert_eq!(&*converged.inferred[0].from, "x");
                assert_eq!(converged.inferred[0].to, value);
            }
        }
    }

    #[test]
    fn left_free_variables_respect_direction() {
        let strict = converge(&v!(var "x"), &v!(num 7), Direction::LeftSpecific);
        assert_eq!(strict.messages.len(), 1);
        assert!(strict.inferred.is_empty());

        let loose = converge(&v!(var "x"), &v!(num 7), Direction::Either);
        assert!(loose.messages.is_empty());
        assert_eq!(loose.inferred.len(), 1);
        assert_eq!(&*loose.inferred[0].from, "x");
        assert_eq!(loose.inferred[0].to, v!(num 7));
    }

    #[test]
    fn records_need_identical_keys() {
        let matching = converge(
            &v!(record "x": v!(var "a"), "y": v!(num 2)),
            &v!(record "x": v!(num 1), "y": v!(var "b")),
            Direction::Either,
        );
        assert!(matching.messages.is_empty());
        assert_eq!(matching.inferred.len(), 2);

        let different = converge(
            &v!(record "x": v!(var "a"), "y": v!(num 2)),
            &v!(record "x": v!(num 1), "z": v!(num 5), "y": v!(num 3)),
            Direction::Either,
        );
        assert_eq!(different.messages.len(), 1);
        assert!(different.inferred.is_empty());
    }

    #[test]
    fn duals_distribute_over_both_members() {
        let a = v!(data "Num"; v!(var "n"));
        let b = v!(var "m");
        let c = v!(data "Num"; v!(str "text"));

        let dual = converge(&v!(dual a.clone(), b.clone()), &c, Direction::Either);
        let first = converge(&a, &c, Direction::Either);
        let second = converge(&b, &c, Direction::Either);

        let from = |converged: &super::Converged| {
            converged
                .inferred
                .iter()
                .map(|fact| (fact.from.clone(), fact.to.clone()))
                .collect::<Vec<_>>()
        };

        let mut expected = from(&first);
        expected.extend(from(&second));
        assert_eq!(from(&dual), expected);
        assert_eq!(
            dual.messages.len(),
            first.messages.len() + second.messages.len()
        );
    }

    #[test]
    fn mismatches_do_not_stop_siblings() {
        let converged = converge(
            &v!(data "Triple"; v!(num 1), v!(var "a"), v!(str "x")),
            &v!(data "Triple"; v!(num 2), v!(num 3), v!(str "y")),
            Direction::Either,
        );

        assert_eq!(converged.messages.len(), 2);
        assert_eq!(converged.inferred.len(), 1);

        let Diagnostic::Mismatch {
            local_left,
            entire_left,
            ..
        } = &converged.messages[0]
        else {
            panic!("expected a mismatch, got {:?}", converged.messages[0]);
        };
        assert_eq!(local_left, &v!(num 1));
        assert!(matches!(entire_left, crate::value::Value::Data { .. }));
    }

    #[test]
    fn implicit_parameters_are_never_widened() {
        let expected = v!(implicit v!(data "Num"; v!(var "a")) => v!(var "a"));
        let actual = v!(implicit v!(data "Num"; v!(num 1)) => v!(num 1));

        let converged = converge(&expected, &actual, Direction::Either);
        assert_eq!(converged.messages.len(), 1);
        assert_eq!(converged.inferred.len(), 1);

        let explicit = converge(&expected, &v!(fn v!(num 1) => v!(num 1)), Direction::Either);
        assert_eq!(explicit.messages.len(), 1);
    }

    #[test]
    fn applications_match_data_from_the_end() {
        let application = v!(app v!(var "f"), v!(var "a"));
        let data = v!(data "Pair"; v!(str "k"), v!(num 2));

        let converged = converge(&application, &data, Direction::Either);
        assert!(converged.is_clean(), "{converged:?}");

        let facts: Vec<_> = converged
            .inferred
            .iter()
            .map(|fact| (fact.from.to_string(), fact.to.clone()))
            .collect();
        assert_eq!(
            facts,
            vec![
                ("a".to_owned(), v!(num 2)),
                ("f".to_owned(), v!(data "Pair"; v!(str "k"))),
            ]
        );

        let too_many = v!(app v!(app v!(app v!(var "f"), v!(num 1)), v!(num 2)), v!(num 3));
        assert_eq!(converge(&data, &too_many, Direction::Either).messages.len(), 1);
    }

    #[test]
    fn data_on_the_left_keeps_its_side() {
        let data = v!(data "Pair"; v!(str "k"), v!(num 2));
        let application = v!(app v!(var "f"), v!(var "a"));

        // the variables sit on the right, so even a left-specific convergence
        // may bind them
        let converged = converge(&data, &application, Direction::LeftSpecific);
        assert!(converged.is_clean(), "{converged:?}");

        let facts: Vec<_> = converged
            .inferred
            .iter()
            .map(|fact| (fact.from.to_string(), fact.to.clone()))
            .collect();
        assert_eq!(
            facts,
            vec![
                ("a".to_owned(), v!(num 2)),
                ("f".to_owned(), v!(data "Pair"; v!(str "k"))),
            ]
        );

        let converged = converge(&data, &v!(app v!(var "f"), v!(num 3)), Direction::Either);
        let [
            Diagnostic::Mismatch {
                local_left,
                local_right,
                ..
            },
        ] = converged.messages.as_slice()
        else {
            panic!("expected one mismatch, got {:?}", converged.messages);
        };
        assert_eq!(local_left, &v!(num 2));
        assert_eq!(local_right, &v!(num 3));
    }
}
