//! Collapsing inferred facts into one partial type per variable.
//!
//! Facts are processed from an explicit worklist. Merging two facts about the
//! same variable may reveal facts about other variables, which are queued
//! rather than reduced recursively.

use std::collections::{BTreeMap, VecDeque};

use log::trace;

use crate::{
    converge::InferredType,
    diagnostic::Diagnostic,
    value::{Name, Substitution, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// The variable is exactly the target.
    Equals,
    /// The variable becomes the target once its implicit parameters are
    /// supplied.
    EvaluatesTo,
    /// The variable is what the target becomes once the target's implicit
    /// parameters are supplied.
    EvaluatedFrom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollapsedInferredType {
    pub from: Name,
    pub operator: Operator,
    pub to: Value,
    pub sources: Vec<InferredType>,
}

impl CollapsedInferredType {
    pub fn new(operator: Operator, source: InferredType) -> Self {
        Self {
            from: source.from.clone(),
            operator,
            to: source.to.clone(),
            sources: vec![source],
        }
    }

    /// The value that should replace `from` once reduction is over.
    pub fn replacement(&self) -> Value {
        match self.operator {
            Operator::Equals | Operator::EvaluatesTo => self.to.clone(),
            Operator::EvaluatedFrom => self.to.strip_implicits().0.clone(),
        }
    }

    fn is_self_mirror(&self) -> bool {
        self.to.as_free_variable() == Some(&self.from)
    }
}

impl From<InferredType> for CollapsedInferredType {
    fn from(value: InferredType) -> Self {
        Self::new(Operator::Equals, value)
    }
}

/// An accumulator that reduces facts as soon as they are pushed.
#[derive(Debug, Clone, Default)]
pub struct Reducer {
    facts: BTreeMap<Name, CollapsedInferredType>,
    /// The replacement of every entry of `facts`, kept in step with it.
    replacements: Substitution,
    pending: VecDeque<CollapsedInferredType>,
    messages: Vec<Diagnostic>,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, inferred: InferredType) {
        self.push_collapsed(inferred.into());
    }

    pub fn push_collapsed(&mut self, fact: CollapsedInferredType) {
        self.pending.push_back(fact);

        while let Some(fact) = self.pending.pop_front() {
            self.reduce(fact);
        }
    }

    pub fn get(&self, name: &str) -> Option<&CollapsedInferredType> {
        self.facts.get(name)
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    /// The substitution replacing every reduced variable.
    pub fn substitution(&self) -> &Substitution {
        &self.replacements
    }

    pub fn finish(self) -> (BTreeMap<Name, CollapsedInferredType>, Vec<Diagnostic>) {
        (self.facts, self.messages)
    }

    fn reduce(&mut self, fact: CollapsedInferredType) {
        if fact.is_self_mirror() || self.leads_back(&fact) {
            return;
        }

        if !fact.to.is_free_variable() && fact.to.occurs(&fact.from) {
            self.messages.push(Diagnostic::Recursive {
                variable: fact.from.clone(),
                ty: fact.to.clone(),
            });
            return;
        }

        trace!("reducing {} {:?} {}", fact.from, fact.operator, fact.to);

        let merged = match self.facts.remove(&fact.from) {
            Some(existing) => self.merge(existing, fact),
            None => fact,
        };

        self.replacements
            .insert(merged.from.clone(), merged.replacement());
        self.facts.insert(merged.from.clone(), merged);
    }

    /// Returns `true` if `fact` equates its variable with a chain of variables
    /// that is already equated back to it.
    fn leads_back(&self, fact: &CollapsedInferredType) -> bool {
        if fact.operator != Operator::Equals {
            return false;
        }

        let mut current = fact.to.as_free_variable();
        let mut steps = 0;

        while let Some(name) = current {
            if name == &fact.from {
                return true;
            }

            if steps > self.facts.len() {
                break;
            }

            steps += 1;
            current = self
                .facts
                .get(name)
                .filter(|next| next.operator == Operator::Equals)
                .and_then(|next| next.to.as_free_variable());
        }

        false
    }

    fn merge(
        &mut self,
        existing: CollapsedInferredType,
        incoming: CollapsedInferredType,
    ) -> CollapsedInferredType {
        let from = existing.from.clone();
        let mut sources = existing.sources;
        sources.extend(incoming.sources);

        let (operator, to) = match (existing.operator, incoming.operator) {
            (Operator::Equals, Operator::EvaluatesTo) => {
                self.equals_with_evaluates_to(&from, existing.to, &incoming.to, &sources)
            }
            (Operator::EvaluatesTo, Operator::Equals) => {
                self.equals_with_evaluates_to(&from, incoming.to, &existing.to, &sources)
            }
            (Operator::EvaluatedFrom, other) if other != Operator::EvaluatedFrom => {
                self.evaluated_from_with(
                    &from,
                    &existing.to,
                    (other, incoming.to),
                    &sources,
                )
            }
            (other, Operator::EvaluatedFrom) if other != Operator::EvaluatedFrom => {
                self.evaluated_from_with(
                    &from,
                    &incoming.to,
                    (other, existing.to),
                    &sources,
                )
            }
            (operator, _) => {
                let to = self.merge_exact(&from, &existing.to, &incoming.to, &sources);
                (operator, to)
            }
        };

        CollapsedInferredType {
            from,
            operator,
            to,
            sources,
        }
    }

    /// Merges `Equals equal` with `EvaluatesTo evaluated`.
    fn equals_with_evaluates_to(
        &mut self,
        from: &Name,
        equal: Value,
        evaluated: &Value,
        sources: &[InferredType],
    ) -> (Operator, Value) {
        let (core, shapes) = equal.strip_implicits();

        if let Some(inner) = core.as_free_variable() {
            self.queue(inner.clone(), Operator::EvaluatesTo, evaluated.clone(), sources);
            return (Operator::Equals, equal);
        }

        let core = self.merge_exact(from, core, evaluated, sources);
        let shapes: Vec<_> = shapes.into_iter().cloned().collect();
        (Operator::Equals, Value::with_implicits(shapes, core))
    }

    /// Merges `EvaluatedFrom source` with `other`, which is either an
    /// `Equals` or an `EvaluatesTo` fact.
    fn evaluated_from_with(
        &mut self,
        from: &Name,
        source: &Value,
        (operator, target): (Operator, Value),
        sources: &[InferredType],
    ) -> (Operator, Value) {
        let (core, shapes) = source.strip_implicits();

        if let Some(inner) = core.as_free_variable() {
            self.queue(inner.clone(), Operator::EvaluatesTo, target.clone(), sources);
            return (operator, target);
        }

        let core = self.merge_exact(from, &target, core, sources);
        let shapes: Vec<_> = shapes.into_iter().cloned().collect();
        (Operator::EvaluatedFrom, Value::with_implicits(shapes, core))
    }

    fn queue(
        &mut self,
        from: Name,
        operator: Operator,
        to: Value,
        sources: &[InferredType],
    ) {
        self.pending.push_back(CollapsedInferredType {
            from,
            operator,
            to,
            sources: sources.to_vec(),
        });
    }

    /// Structurally merges two partial types of `variable`. Free variables
    /// facing anything else are queued as new facts and the more specific
    /// side is kept. On a mismatch the existing side `a` is kept.
    fn merge_exact(
        &mut self,
        variable: &Name,
        a: &Value,
        b: &Value,
        sources: &[InferredType],
    ) -> Value {
        match (a, b) {
            (Value::FreeVariable(x), Value::FreeVariable(y)) if x == y => a.clone(),
            (Value::FreeVariable(x), other) | (other, Value::FreeVariable(x)) => {
                self.queue(x.clone(), Operator::Equals, other.clone(), sources);
                other.clone()
            }
            (
                Value::Data {
                    name: a_name,
                    parameters: a_parameters,
                },
                Value::Data {
                    name: b_name,
                    parameters: b_parameters,
                },
            ) if a_parameters.len() == b_parameters.len() => Value::Data {
                name: Box::new(self.merge_exact(variable, a_name, b_name, sources)),
                parameters: a_parameters
                    .iter()
                    .zip(b_parameters)
                    .map(|(a, b)| self.merge_exact(variable, a, b, sources))
                    .collect(),
            },
            (Value::Record(a_properties), Value::Record(b_properties))
                if a_properties.keys().eq(b_properties.keys()) =>
            {
                Value::Record(
                    a_properties
                        .iter()
                        .zip(b_properties.values())
                        .map(|((name, a), b)| {
                            (name.clone(), self.merge_exact(variable, a, b, sources))
                        })
                        .collect(),
                )
            }
            (
                Value::Function {
                    parameter: a_parameter,
                    body: a_body,
                },
                Value::Function {
                    parameter: b_parameter,
                    body: b_body,
                },
            ) => Value::function(
                self.merge_exact(variable, a_parameter, b_parameter, sources),
                self.merge_exact(variable, a_body, b_body, sources),
            ),
            (
                Value::ImplicitFunction {
                    parameter: a_parameter,
                    body: a_body,
                },
                Value::ImplicitFunction {
                    parameter: b_parameter,
                    body: b_body,
                },
            ) => Value::implicit_function(
                self.merge_exact(variable, a_parameter, b_parameter, sources),
                self.merge_exact(variable, a_body, b_body, sources),
            ),
            (
                Value::Application {
                    callee: a_callee,
                    parameter: a_parameter,
                },
                Value::Application {
                    callee: b_callee,
                    parameter: b_parameter,
                },
            ) => Value::application(
                self.merge_exact(variable, a_callee, b_callee, sources),
                self.merge_exact(variable, a_parameter, b_parameter, sources),
            ),
            (
                Value::Dual {
                    left: a_left,
                    right: a_right,
                },
                Value::Dual {
                    left: b_left,
                    right: b_right,
                },
            ) => Value::dual(
                self.merge_exact(variable, a_left, b_left, sources),
                self.merge_exact(variable, a_right, b_right, sources),
            ),
            (
                Value::ReadRecordProperty {
                    record: a_record,
                    property: a_property,
                },
                Value::ReadRecordProperty {
                    record: b_record,
                    property: b_property,
                },
            ) if a_property == b_property => Value::read_record_property(
                self.merge_exact(variable, a_record, b_record, sources),
                a_property.clone(),
            ),
            (
                Value::ReadDataProperty {
                    data: a_data,
                    index: a_index,
                },
                Value::ReadDataProperty {
                    data: b_data,
                    index: b_index,
                },
            ) if a_index == b_index => Value::read_data_property(
                self.merge_exact(variable, a_data, b_data, sources),
                *a_index,
            ),
            (a, b) if a == b => a.clone(),
            (a, b) => {
                self.messages.push(Diagnostic::Conflict {
                    variable: variable.clone(),
                    existing: a.clone(),
                    incoming: b.clone(),
                });
                a.clone()
            }
        }
    }
}

/// Reduces `raw` facts to one collapsed fact per variable.
pub fn reduce_inferred_types(
    raw: impl IntoIterator<Item = InferredType>,
) -> (BTreeMap<Name, CollapsedInferredType>, Vec<Diagnostic>) {
    let mut reducer = Reducer::new();
    for inferred in raw {
        reducer.push(inferred);
    }
    reducer.finish()
}

#[cfg(test)]
mod tests {
    use super::{CollapsedInferredType, Operator, Reducer, reduce_inferred_types};
    use crate::{
        converge::InferredType,
        diagnostic::Diagnostic,
        value::{Value, tests::v},
    };

    fn fact(from: &str, to: Value) -> InferredType {
        InferredType::new(from.into(), to, &v!(var from), &v!(var "_"))
    }

    #[test]
    fn identical_facts_collapse_without_conflict() {
        let ty = v!(data "List"; v!(num 1));
        let (facts, messages) =
            reduce_inferred_types([fact("a", ty.clone()), fact("a", ty.clone())]);

        assert!(messages.is_empty());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts["a"].operator, Operator::Equals);
        assert_eq!(facts["a"].to, ty);
        assert_eq!(facts["a"].sources.len(), 2);
    }

    #[test]
    fn incompatible_facts_conflict() {
        let (facts, messages) = reduce_inferred_types([
            fact("a", v!(record "x": v!(num 1))),
            fact("a", v!(record "x": v!(num 2))),
        ]);

        assert!(!messages.is_empty());
        assert!(matches!(messages[0], Diagnostic::Conflict { .. }));
        assert_eq!(facts["a"].to, v!(record "x": v!(num 1)));
    }

    #[test]
    fn variables_inside_merges_become_new_facts() {
        let (facts, messages) = reduce_inferred_types([
            fact("a", v!(data "Pair"; v!(var "b"), v!(num 2))),
            fact("a", v!(data "Pair"; v!(str "s"), v!(var "c"))),
        ]);

        assert!(messages.is_empty());
        assert_eq!(facts["a"].to, v!(data "Pair"; v!(str "s"), v!(num 2)));
        assert_eq!(facts["b"].to, v!(str "s"));
        assert_eq!(facts["c"].to, v!(num 2));
    }

    #[test]
    fn self_mirrors_and_cycles_are_discarded() {
        let (facts, messages) = reduce_inferred_types([
            fact("a", v!(var "a")),
            fact("a", v!(var "b")),
            fact("b", v!(var "a")),
        ]);

        assert!(messages.is_empty());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts["a"].to, v!(var "b"));
    }

    #[test]
    fn occurs_check_reports_recursion() {
        let (facts, messages) =
            reduce_inferred_types([fact("a", v!(data "List"; v!(var "a")))]);

        assert!(facts.is_empty());
        assert!(matches!(messages[..], [Diagnostic::Recursive { .. }]));
    }

    #[test]
    fn equals_merges_under_its_implicit_prefix() {
        let mut reducer = Reducer::new();
        let shape = v!(data "Num"; v!(var "n"));

        reducer.push(fact("f", v!(implicit shape.clone() => v!(fn v!(var "n") => v!(var "n")))));
        reducer.push_collapsed(CollapsedInferredType::new(
            Operator::EvaluatesTo,
            fact("f", v!(fn v!(num 1) => v!(var "r"))),
        ));

        assert!(reducer.messages().is_empty());
        assert_eq!(reducer.get("f").map(|fact| fact.operator), Some(Operator::Equals));
        assert_eq!(
            reducer.substitution().apply(&v!(var "f")),
            v!(implicit v!(data "Num"; v!(num 1)) => v!(fn v!(num 1) => v!(num 1)))
        );
        assert_eq!(reducer.get("n").map(|fact| &fact.to), Some(&v!(num 1)));
    }

    #[test]
    fn variable_cores_defer_evaluation() {
        let mut reducer = Reducer::new();

        reducer.push(fact("f", v!(implicit v!(data "Num"; v!(var "n")) => v!(var "g"))));
        reducer.push_collapsed(CollapsedInferredType::new(
            Operator::EvaluatesTo,
            fact("f", v!(fn v!(num 1) => v!(num 1))),
        ));

        assert_eq!(reducer.get("f").map(|fact| fact.operator), Some(Operator::Equals));
        assert_eq!(
            reducer.get("g").map(|fact| (fact.operator, fact.to.clone())),
            Some((Operator::EvaluatesTo, v!(fn v!(num 1) => v!(num 1))))
        );
    }

    #[test]
    fn evaluated_from_keeps_the_implicit_source() {
        let mut reducer = Reducer::new();
        let source = v!(implicit v!(data "Show"; v!(var "a")) => v!(fn v!(var "a") => v!(str "")));

        reducer.push_collapsed(CollapsedInferredType::new(
            Operator::EvaluatedFrom,
            fact("p", source),
        ));
        reducer.push(fact("p", v!(fn v!(num 3) => v!(var "s"))));

        let collapsed = reducer.get("p").cloned();
        assert!(reducer.messages().is_empty());
        assert_eq!(
            collapsed.as_ref().map(|fact| fact.operator),
            Some(Operator::EvaluatedFrom)
        );
        assert_eq!(
            collapsed.map(|fact| fact.replacement()),
            Some(v!(fn v!(num 3) => v!(str "")))
        );
        assert_eq!(reducer.get("a").map(|fact| &fact.to), Some(&v!(num 3)));
        assert_eq!(reducer.get("s").map(|fact| &fact.to), Some(&v!(str "")));
    }

    #[test]
    fn substitution_follows_variable_chains() {
        let mut reducer = Reducer::new();
        reducer.push(fact("a", v!(var "b")));
        reducer.push(fact("b", v!(num 4)));

        assert_eq!(reducer.substitution().apply(&v!(var "a")), v!(num 4));
    }

    #[test]
    fn substitution_tracks_merged_facts() {
        let mut reducer = Reducer::new();
        reducer.push(fact("a", v!(var "b")));
        assert_eq!(reducer.substitution().get("a"), Some(&v!(var "b")));

        reducer.push(fact("a", v!(num 4)));
        assert_eq!(reducer.substitution().get("a"), Some(&v!(num 4)));
        assert_eq!(reducer.substitution().get("b"), Some(&v!(num 4)));
        assert_eq!(reducer.substitution().len(), 2);
    }
}
