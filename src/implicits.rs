//! Implicit parameter resolution.
//!
//! A node whose type starts with implicit functions needs a value for each of
//! them. The resolver searches the bindings visible from the node for
//! candidates whose types converge with each implicit shape, and rewrites the
//! node into an application of itself to the unique consistent choice.

use log::{debug, trace};

use crate::{
    Context,
    attach::Attachment,
    converge::{Direction, InferredType, converge},
    diagnostic::Diagnostic,
    expr::{Decoration, Expression, Node, TypedNode},
    reduce::Reducer,
    scope::{Scope, ScopeBinding},
    value::{Name, Substitution, Value},
};

/// Enumeration stops as soon as this many valid combinations are found.
const AMBIGUITY_THRESHOLD: usize = 2;

#[derive(Debug, Clone)]
pub struct Resolution {
    pub messages: Vec<Diagnostic>,
    pub node: TypedNode,
}

/// Fills the implicit parameters of every node in an attached tree.
///
/// Messages from the attachment are carried over in front of the resolver's
/// own.
pub fn resolve_implicit_parameters(
    attachment: Attachment,
    context: &Context<'_>,
) -> Resolution {
    let Attachment {
        mut messages,
        replacements,
        node,
    } = attachment;

    let mut resolver = Resolver {
        context,
        replacements,
        messages: Vec::new(),
    };

    let node = resolver.resolve(node, &Scope::new(), false);
    debug!("resolved implicits with {} messages", resolver.messages.len());

    messages.extend(resolver.messages);
    Resolution { messages, node }
}

/// Splits `shapes` into those that can be filled from `core` and those that
/// can't be determined by it: shapes with free variables, none of which occur
/// in `core`. Both lists keep the original order.
pub fn partition_unrelated<'v>(
    core: &Value,
    shapes: &[&'v Value],
) -> (Vec<&'v Value>, Vec<&'v Value>) {
    let core_variables = core.free_variables();

    shapes.iter().copied().partition(|shape| {
        let variables = shape.free_variables();
        variables.is_empty() || !variables.is_disjoint(&core_variables)
    })
}

/// A binding that might satisfy an implicit shape.
#[derive(Debug, Clone)]
struct Candidate {
    name: Name,
    /// The instantiated type of the binding, implicits included.
    ty: Value,
    /// The type the binding provides once its own implicits are filled.
    core: Value,
}

/// A way of satisfying one shape.
#[derive(Debug, Clone)]
struct Choice {
    candidate: usize,
    inferred: Vec<InferredType>,
}

struct Resolver<'a> {
    context: &'a Context<'a>,
    replacements: Substitution,
    messages: Vec<Diagnostic>,
}

impl Resolver<'_> {
    /// Resolves the children of `node` and then `node` itself, unless it is
    /// `exempt`. The `extension` holds the parameters of the enclosing
    /// implicit functions.
    fn resolve(&mut self, node: TypedNode, extension: &Scope, exempt: bool) -> TypedNode {
        let Node {
            expression,
            decoration,
        } = node;

        let (expression, decoration, exempt) = match expression {
            Expression::Function {
                parameter,
                body,
                implicit: true,
            } => {
                let inner = match &parameter.expression {
                    Expression::Identifier(name) => extension.bind(ScopeBinding {
                        name: name.clone(),
                        ty: parameter.ty().clone(),
                        generalize: false,
                        node: None,
                    }),
                    _ => extension.clone(),
                };

                let expression = Expression::Function {
                    parameter: Box::new(self.resolve(*parameter, extension, false)),
                    body: Box::new(self.resolve(*body, &inner, false)),
                    implicit: true,
                };

                (expression, decoration, true)
            }
            Expression::Binding { name, value, body } => {
                let value = self.resolve(*value, extension, true);
                let body = self.resolve(*body, extension, false);
                let decoration = Decoration {
                    ty: body.ty().clone(),
                    ..decoration
                };

                let expression = Expression::Binding {
                    name,
                    value: Box::new(value),
                    body: Box::new(body),
                };

                (expression, decoration, true)
            }
            expression => (self.resolve_children(expression, extension), decoration, exempt),
        };

        let node = Node::decorated(expression, decoration);
        match exempt {
            true => node,
            false => self.fill(node, extension, 0),
        }
    }

    fn resolve_children(
        &mut self,
        expression: Expression<Decoration>,
        extension: &Scope,
    ) -> Expression<Decoration> {
        let mut child = |node: Box<TypedNode>| Box::new(self.resolve(*node, extension, false));

        match expression {
            Expression::Record(properties) => Expression::Record(
                properties
                    .into_iter()
                    .map(|(name, node)| (name, *child(Box::new(node))))
                    .collect(),
            ),
            Expression::DataInstantiation { name, parameters } => {
                Expression::DataInstantiation {
                    name,
                    parameters: parameters
                        .into_vec()
                        .into_iter()
                        .map(|node| *child(Box::new(node)))
                        .collect(),
                }
            }
            Expression::Application { callee, parameter } => Expression::Application {
                callee: child(callee),
                parameter: child(parameter),
            },
            Expression::Function {
                parameter,
                body,
                implicit,
            } => Expression::Function {
                parameter: child(parameter),
                body: child(body),
                implicit,
            },
            Expression::Binding { name, value, body } => Expression::Binding {
                name,
                value: child(value),
                body: child(body),
            },
            Expression::Dual { left, right } => Expression::Dual {
                left: child(left),
                right: child(right),
            },
            Expression::ReadRecordProperty { record, property } => {
                Expression::ReadRecordProperty {
                    record: child(record),
                    property,
                }
            }
            Expression::ReadDataProperty { data, index } => Expression::ReadDataProperty {
                data: child(data),
                index,
            },
            Expression::PatternMatch { value, arms } => Expression::PatternMatch {
                value: child(value),
                arms: arms
                    .into_vec()
                    .into_iter()
                    .map(|(test, body)| (*child(Box::new(test)), *child(Box::new(body))))
                    .collect(),
            },
            leaf @ (Expression::Identifier(_)
            | Expression::Boolean(_)
            | Expression::Number(_)
            | Expression::String(_)
            | Expression::Symbol(_)) => leaf,
        }
    }

    /// Fills the implicit prefix of the type of `node`.
    fn fill(&mut self, node: TypedNode, extension: &Scope, depth: usize) -> TypedNode {
        let ty = node.ty().clone();
        let (core, shapes) = ty.strip_implicits();
        if shapes.is_empty() {
            return node;
        }

        let (to_fill, skipped) = partition_unrelated(core, &shapes);
        for &shape in &skipped {
            self.messages.push(Diagnostic::UndeterminedImplicit {
                shape: shape.clone(),
                core: core.clone(),
            });
        }

        if to_fill.is_empty() {
            return node;
        }

        if depth > self.context.limits.implicit_depth {
            self.messages.push(Diagnostic::ImplicitDepthExceeded {
                limit: self.context.limits.implicit_depth,
            });
            return node;
        }

        let candidates = self.candidates(node.scope(), extension);
        let options: Vec<Vec<Choice>> = to_fill
            .iter()
            .map(|&shape| {
                candidates
                    .iter()
                    .enumerate()
                    .filter_map(|(index, candidate)| {
                        let converged = converge(shape, &candidate.core, Direction::LeftSpecific);
                        converged.is_clean().then_some(Choice {
                            candidate: index,
                            inferred: converged.inferred,
                        })
                    })
                    .collect()
            })
            .collect();

        trace!(
            "filling {} implicits of {ty} from {} candidates",
            to_fill.len(),
            candidates.len()
        );

        let mut valid = search(&options);
        match valid.len() {
            0 => {
                self.messages
                    .push(Diagnostic::NoImplicitReplacements { ty: ty.clone() });
                node
            }
            1 => {
                let (selection, replacements) = valid.remove(0);
                let skipped: Vec<Value> = skipped.into_iter().cloned().collect();
                let remaining: Vec<Value> = to_fill.iter().map(|&shape| shape.clone()).collect();
                let core = core.clone();
                let scope = node.scope().clone();

                selection
                    .into_iter()
                    .enumerate()
                    .fold(node, |callee, (position, choice)| {
                        let candidate = &candidates[choice];
                        let argument = Node::decorated(
                            Expression::Identifier(candidate.name.clone()),
                            Decoration {
                                ty: replacements.apply(&candidate.ty),
                                scope: scope.clone(),
                            },
                        );
                        let argument = self.fill(argument, extension, depth + 1);

                        let shapes = remaining[position + 1..]
                            .iter()
                            .chain(&skipped)
                            .cloned()
                            .collect::<Vec<_>>();

                        Node::decorated(
                            Expression::Application {
                                callee: Box::new(callee),
                                parameter: Box::new(argument),
                            },
                            Decoration {
                                ty: Value::with_implicits(shapes, core.clone()),
                                scope: scope.clone(),
                            },
                        )
                    })
            }
            sets => {
                self.messages.push(Diagnostic::AmbiguousImplicits {
                    sets,
                    implicits: to_fill.len(),
                });
                node
            }
        }
    }

    /// The bindings visible from `scope` and `extension` that could fill an
    /// implicit, innermost first.
    fn candidates(&self, scope: &Scope, extension: &Scope) -> Vec<Candidate> {
        let mut seen = std::collections::BTreeSet::new();

        extension
            .bindings()
            .map(|binding| (extension, binding))
            .chain(scope.bindings().map(|binding| (scope, binding)))
            .filter(|(_, binding)| seen.insert(binding.name.clone()))
            .filter_map(|(owner, binding)| self.candidate(scope, owner, binding))
            .collect()
    }

    fn candidate(
        &self,
        scope: &Scope,
        owner: &Scope,
        binding: &ScopeBinding,
    ) -> Option<Candidate> {
        let ty = owner.instantiate(binding, &self.replacements);
        let (core, shapes) = ty.strip_implicits();

        if !core.is_free_variable() {
            let core = core.clone();
            return Some(Candidate {
                name: binding.name.clone(),
                ty,
                core,
            });
        }

        let definition = binding.node.as_ref()?;
        let evaluated = self.context.evaluator.evaluate(scope, definition)?;
        if evaluated.is_free_variable() {
            return None;
        }

        let shapes: Vec<Value> = shapes.into_iter().cloned().collect();
        Some(Candidate {
            name: binding.name.clone(),
            ty: Value::with_implicits(shapes, evaluated.clone()),
            core: evaluated,
        })
    }
}

/// Enumerates the cartesian product of `options`, returning the consistent
/// combinations found before the ambiguity threshold. Each combination is
/// the chosen candidate per shape, with the substitution its facts imply.
fn search(options: &[Vec<Choice>]) -> Vec<(Vec<usize>, Substitution)> {
    let mut valid = Vec::new();
    if options.iter().any(Vec::is_empty) {
        return valid;
    }

    let mut indices = vec![0; options.len()];
    loop {
        let mut reducer = Reducer::new();
        for (choices, &index) in options.iter().zip(&indices) {
            for inferred in &choices[index].inferred {
                reducer.push(inferred.clone());
            }
        }

        if reducer.messages().is_empty() {
            let selection = options
                .iter()
                .zip(&indices)
                .map(|(choices, &index)| choices[index].candidate)
                .collect();

            valid.push((selection, reducer.substitution().clone()));
            if valid.len() >= AMBIGUITY_THRESHOLD {
                return valid;
            }
        }

        // advance the odometer, rightmost position first
        let mut position = options.len();
        loop {
            if position == 0 {
                return valid;
            }

            position -= 1;
            indices[position] += 1;
            if indices[position] < options[position].len() {
                break;
            }

            indices[position] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Resolution, partition_unrelated, resolve_implicit_parameters};
    use crate::{
        Context,
        attach::attach_types,
        config::Limits,
        diagnostic::Diagnostic,
        evaluate::PartialEvaluator,
        expr::{Expression, TypedNode},
        scope::Scope,
        syntax::parse,
        value::tests::v,
    };

    const PRELUDE: &str = "\
        let numInt = Num<Int<n>>;\n\
        let add = implicit Num<a> -> x @ a -> x;\n";

    fn resolve(source: &str) -> Resolution {
        let evaluator = PartialEvaluator::default();
        let context = Context::new(&evaluator, Limits::default());
        let node = parse(source).unwrap();
        let attachment = attach_types(&Scope::new(), &node, &context).unwrap();
        resolve_implicit_parameters(attachment, &context)
    }

    /// Follows the bodies of nested bindings down to the final expression.
    fn innermost(node: &TypedNode) -> &TypedNode {
        match &node.expression {
            Expression::Binding { body, .. } => innermost(body),
            _ => node,
        }
    }

    #[test]
    fn unique_candidates_are_applied() {
        let resolution = resolve(&format!("{PRELUDE}add(Int<1>)"));

        assert!(resolution.messages.is_empty(), "{:?}", resolution.messages);
        let node = innermost(&resolution.node);
        assert_eq!(node.to_string(), "add(numInt)(Int<1>)");
        assert_eq!(node.ty(), &v!(data "Int"; v!(num 1)));
    }

    #[test]
    fn duplicate_candidates_are_ambiguous() {
        let resolution = resolve(&format!(
            "let numInteger = Num<Int<m>>;\n{PRELUDE}add(Int<1>)"
        ));

        assert!(matches!(
            resolution.messages.as_slice(),
            [Diagnostic::AmbiguousImplicits {
                sets: 2,
                implicits: 1
            }]
        ));
        assert_eq!(innermost(&resolution.node).to_string(), "add(Int<1>)");
    }

    #[test]
    fn missing_candidates_are_reported() {
        let resolution = resolve(&format!("{PRELUDE}add(:one)"));

        assert!(matches!(
            resolution.messages.as_slice(),
            [Diagnostic::NoImplicitReplacements { .. }]
        ));
    }

    #[test]
    fn unrelated_implicits_are_undetermined() {
        let resolution = resolve("let show = implicit Show<b> -> 1;\nshow");

        assert!(matches!(
            resolution.messages.as_slice(),
            [Diagnostic::UndeterminedImplicit { .. }]
        ));
    }

    #[test]
    fn candidates_with_implicits_are_resolved_recursively() {
        let resolution = resolve(&format!(
            "{PRELUDE}let numPair = implicit Num<a> -> Num<Pair<a>>;\nadd(Pair<Int<1>>)"
        ));

        assert!(resolution.messages.is_empty(), "{:?}", resolution.messages);
        assert_eq!(
            innermost(&resolution.node).to_string(),
            "add(numPair(numInt))(Pair<Int<1>>)"
        );
    }

    #[test]
    fn recursion_is_bounded() {
        let evaluator = PartialEvaluator::default();
        let context = Context::new(
            &evaluator,
            Limits {
                implicit_depth: 0,
                ..Limits::default()
            },
        );
        let node = parse(&format!(
            "{PRELUDE}let numPair = implicit Num<a> -> Num<Pair<a>>;\nadd(Pair<Int<1>>)"
        ))
        .unwrap();

        let attachment = attach_types(&Scope::new(), &node, &context).unwrap();
        let resolution = resolve_implicit_parameters(attachment, &context);

        assert!(matches!(
            resolution.messages.as_slice(),
            [Diagnostic::ImplicitDepthExceeded { limit: 0 }]
        ));
    }

    #[test]
    fn hoisted_implicits_are_passed_through() {
        let resolution = resolve(&format!(
            "{PRELUDE}let double = y -> add(y);\ndouble(Int<2>)"
        ));

        assert!(resolution.messages.is_empty(), "{:?}", resolution.messages);
        assert_eq!(
            innermost(&resolution.node).to_string(),
            "double(numInt)(Int<2>)"
        );

        let mut node = &resolution.node;
        while let Expression::Binding { name, value, body } = &node.expression {
            if &**name == "double" {
                assert_eq!(
                    value.to_string(),
                    "implicit $implicit0 -> y -> add($implicit0)(y)"
                );
            }
            node = body.as_ref();
        }
    }

    #[test]
    fn partitioning_keeps_shapes_tied_to_the_core() {
        let core = v!(fn v!(var "a") => v!(var "a"));
        let related = v!(data "Num"; v!(var "a"));
        let closed = v!(data "Num"; v!(num 1));
        let unrelated = v!(data "Show"; v!(var "b"));

        let (to_fill, skipped) = partition_unrelated(&core, &[&related, &unrelated, &closed]);

        assert_eq!(to_fill, vec![&related, &closed]);
        assert_eq!(skipped, vec![&unrelated]);
    }
}
