//! Type attachment.
//!
//! [`attach_types`] gives every node of an expression tree a structural type.
//! Facts found by convergence are pushed into a single [`Reducer`] owned by
//! the pass as soon as they are found, so later nodes always see the
//! replacements implied by earlier ones. Once the root has been typed, the
//! final substitution is applied to every decoration in the tree.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use log::{debug, trace};
use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::Bfs,
};

use crate::{
    Context,
    converge::{Converged, Direction, InferredType, converge},
    diagnostic::{Diagnostic, InvariantViolation},
    expr::{Decoration, Expression, Node, TypedNode},
    reduce::{CollapsedInferredType, Operator, Reducer},
    scope::{Scope, ScopeBinding},
    unique::fresh_name,
    value::{Name, Substitution, Value},
};

/// The prefix of the parameters synthesized when implicits are hoisted onto a
/// binding. It cannot be written in source, so these never collide with user
/// names.
pub const IMPLICIT_PARAMETER_PREFIX: &str = "$implicit";

#[derive(Debug, Clone)]
pub struct Attachment {
    pub messages: Vec<Diagnostic>,
    /// The replacement found for each reduced variable of the pass.
    pub replacements: Substitution,
    pub node: TypedNode,
}

/// Attaches a type to every node of `node`, which is typed in `scope`.
pub fn attach_types(
    scope: &Scope,
    node: &Node,
    context: &Context<'_>,
) -> Result<Attachment, InvariantViolation> {
    let mut attacher = Attacher {
        context,
        messages: Vec::new(),
        reducer: Reducer::new(),
        implicits: 0,
    };

    let mut node = attacher.attach(scope, node)?;
    let replacements = attacher.reducer.substitution().clone();
    node.for_each_decoration_mut(&mut |decoration| {
        decoration.ty = replacements.apply(&decoration.ty);
    });

    let (_, reduced) = attacher.reducer.finish();
    let mut messages = attacher.messages;
    messages.extend(reduced);

    debug!(
        "attached {} with {} replacements and {} messages",
        node.ty(),
        replacements.len(),
        messages.len()
    );

    Ok(Attachment {
        messages,
        replacements,
        node,
    })
}

fn fresh(base: &str) -> Value {
    Value::FreeVariable(fresh_name(base))
}

fn typed(expression: Expression<Decoration>, ty: Value, scope: &Scope) -> TypedNode {
    Node::decorated(
        expression,
        Decoration {
            ty,
            scope: scope.clone(),
        },
    )
}

struct Attacher<'a> {
    context: &'a Context<'a>,
    messages: Vec<Diagnostic>,
    reducer: Reducer,
    /// How many implicit parameters have been synthesized so far.
    implicits: usize,
}

impl Attacher<'_> {
    fn resolved(&self, ty: &Value) -> Value {
        self.reducer.substitution().apply(ty)
    }

    /// Records the result of a convergence, returning `true` if it was clean.
    fn record(&mut self, converged: Converged) -> bool {
        let clean = converged.is_clean();
        self.messages.extend(converged.messages);

        for inferred in converged.inferred {
            self.reducer.push(inferred);
        }

        clean
    }

    fn attach(
        &mut self,
        scope: &Scope,
        node: &Node,
    ) -> Result<TypedNode, InvariantViolation> {
        let (expression, ty) = match &node.expression {
            Expression::Identifier(name) => {
                let ty = match scope.lookup(name) {
                    Some(binding) => {
                        scope.instantiate(binding, self.reducer.substitution())
                    }
                    None => fresh(name),
                };

                (Expression::Identifier(name.clone()), ty)
            }
            Expression::Boolean(value) => {
                (Expression::Boolean(*value), Value::Boolean(*value))
            }
            Expression::Number(value) => {
                (Expression::Number(*value), Value::Number(*value))
            }
            Expression::String(value) => (
                Expression::String(value.clone()),
                Value::String(value.clone()),
            ),
            Expression::Symbol(name) => (
                Expression::Symbol(name.clone()),
                Value::Symbol(name.clone()),
            ),
            Expression::Record(properties) => {
                let properties = properties
                    .iter()
                    .map(|(name, node)| Ok((name.clone(), self.attach(scope, node)?)))
                    .collect::<Result<BTreeMap<_, _>, _>>()?;

                let ty = Value::Record(
                    properties
                        .iter()
                        .map(|(name, node)| (name.clone(), node.ty().clone()))
                        .collect(),
                );

                (Expression::Record(properties), ty)
            }
            Expression::DataInstantiation { name, parameters } => {
                let parameters = parameters
                    .iter()
                    .map(|node| self.attach(scope, node))
                    .collect::<Result<Box<[_]>, _>>()?;

                let ty = Value::data(
                    name.clone(),
                    parameters.iter().map(|node| node.ty().clone()),
                );

                let expression = Expression::DataInstantiation {
                    name: name.clone(),
                    parameters,
                };

                (expression, ty)
            }
            Expression::Function {
                parameter,
                body,
                implicit,
            } => return self.function(scope, parameter, body, *implicit),
            Expression::Application { callee, parameter } => {
                return self.application(scope, callee, parameter);
            }
            Expression::Binding { name, value, body } => {
                return self.binding(scope, name, value, body);
            }
            Expression::Dual { left, right } => {
                return self.dual(scope, left, right);
            }
            Expression::ReadRecordProperty { record, property } => {
                let record = self.attach(scope, record)?;
                let ty = self.read_record_property(record.ty(), property);
                let expression = Expression::ReadRecordProperty {
                    record: Box::new(record),
                    property: property.clone(),
                };

                (expression, ty)
            }
            Expression::ReadDataProperty { data, index } => {
                let data = self.attach(scope, data)?;
                let ty = self.read_data_property(data.ty(), *index);
                let expression = Expression::ReadDataProperty {
                    data: Box::new(data),
                    index: *index,
                };

                (expression, ty)
            }
            Expression::PatternMatch { .. } => {
                return Err(InvariantViolation::PatternMatch {
                    expression: node.to_string(),
                });
            }
        };

        trace!("typed {node} as {ty}");
        Ok(typed(expression, ty, scope))
    }

    fn function(
        &mut self,
        scope: &Scope,
        parameter: &Node,
        body: &Node,
        implicit: bool,
    ) -> Result<TypedNode, InvariantViolation> {
        let pattern = self.context.evaluator.evaluate(scope, parameter);
        let binders = match &pattern {
            Some(pattern) => binders(parameter, pattern),
            None => {
                self.messages.push(Diagnostic::UnevaluablePattern {
                    pattern: parameter.to_string(),
                });
                BTreeSet::new()
            }
        };

        let inner = binders
            .into_iter()
            .fold(scope.enter_frame(), |inner, name| {
                let ty = fresh(&name);
                inner.bind(ScopeBinding {
                    name,
                    ty,
                    generalize: false,
                    node: None,
                })
            });

        let parameter = self.attach(&inner, parameter)?;
        let body = self.attach(&inner, body)?;

        let parameter_ty = match pattern {
            Some(_) => self.resolved(parameter.ty()),
            None => fresh("p"),
        };
        let body_ty = self.resolved(body.ty());

        let ty = match implicit {
            true => Value::implicit_function(parameter_ty, body_ty),
            false => Value::function(parameter_ty, body_ty),
        };

        trace!("typed function as {ty}");
        let expression = Expression::Function {
            parameter: Box::new(parameter),
            body: Box::new(body),
            implicit,
        };

        Ok(typed(expression, ty, scope))
    }

    fn application(
        &mut self,
        scope: &Scope,
        callee: &Node,
        parameter: &Node,
    ) -> Result<TypedNode, InvariantViolation> {
        let callee = self.attach(scope, callee)?;
        let argument = self.attach(scope, parameter)?;
        let ty = self.apply(callee.ty(), argument.ty());

        trace!("typed application of {} as {ty}", callee.ty());
        let expression = Expression::Application {
            callee: Box::new(callee),
            parameter: Box::new(argument),
        };

        Ok(typed(expression, ty, scope))
    }

    /// Returns the type of a call of `callee` with `argument`. The implicit
    /// prefix of the callee is left for the resolver.
    fn apply(&mut self, callee: &Value, argument: &Value) -> Value {
        let callee = self.resolved(callee);
        let (core, _) = callee.strip_implicits();

        let (parameter, body) = match core.primary() {
            Value::Function { parameter, body } => {
                (parameter.as_ref().clone(), body.as_ref().clone())
            }
            Value::FreeVariable(name) => {
                let (parameter, body) = (fresh("p"), fresh("r"));
                let shape = Value::function(parameter.clone(), body.clone());
                let inferred = InferredType::new(name.clone(), shape.clone(), core, &shape);

                self.reducer.push_collapsed(CollapsedInferredType::new(
                    Operator::EvaluatesTo,
                    inferred,
                ));

                (parameter, body)
            }
            symbolic if is_symbolic(symbolic) => {
                let argument = self.resolved(argument);
                let (argument, _) = argument.strip_implicits();
                return Value::application(symbolic.clone(), argument.clone());
            }
            other => {
                self.messages.push(Diagnostic::NotCallable {
                    kind: other.kind(),
                    callee: other.clone(),
                });

                return fresh("t");
            }
        };

        let argument = self.resolved(argument);
        let (argument_core, shapes) = argument.strip_implicits();

        let clean = match parameter.as_free_variable() {
            Some(name) if !shapes.is_empty() => {
                let inferred =
                    InferredType::new(name.clone(), argument.clone(), &parameter, &argument);

                self.reducer.push_collapsed(CollapsedInferredType::new(
                    Operator::EvaluatedFrom,
                    inferred,
                ));

                true
            }
            _ => self.record(converge(&parameter, argument_core, Direction::Either)),
        };

        match clean {
            true => self.resolved(&body),
            false => fresh("t"),
        }
    }

    fn dual(
        &mut self,
        scope: &Scope,
        left: &Node,
        right: &Node,
    ) -> Result<TypedNode, InvariantViolation> {
        let left = self.attach(scope, left)?;
        let right = self.attach(scope, right)?;

        let (left_ty, right_ty) = (self.resolved(left.ty()), self.resolved(right.ty()));
        let ty = match self.record(converge(&left_ty, &right_ty, Direction::Either)) {
            true => {
                let replacements = self.reducer.substitution();
                Value::dual(replacements.apply(&left_ty), replacements.apply(&right_ty))
            }
            false => fresh("t"),
        };

        let expression = Expression::Dual {
            left: Box::new(left),
            right: Box::new(right),
        };

        Ok(typed(expression, ty, scope))
    }

    fn binding(
        &mut self,
        scope: &Scope,
        name: &Name,
        value: &Node,
        body: &Node,
    ) -> Result<TypedNode, InvariantViolation> {
        if scope.lookup_in_frame(name).is_some() {
            self.messages.push(Diagnostic::Redeclared { name: name.clone() });
        }

        let recursion_name = fresh_name(name);
        let recursion = Value::FreeVariable(recursion_name.clone());
        let value_scope = scope.bind(ScopeBinding {
            name: name.clone(),
            ty: recursion.clone(),
            generalize: false,
            node: None,
        });

        let typed_value = self.attach(&value_scope, value)?;
        let value_ty = self.resolved(typed_value.ty());
        self.reducer.push(InferredType::new(
            recursion_name,
            value_ty.clone(),
            &recursion,
            &value_ty,
        ));

        let nested = nested_implicits(&typed_value, self.reducer.substitution());
        let hoisted = implicits_for_binding(value_ty.strip_implicits().0, &nested);
        if !hoisted.is_empty() {
            debug!("hoisting {} implicits onto {name}", hoisted.len());
        }

        let typed_value = self.hoist(typed_value, &hoisted);
        let binding_ty = Value::with_implicits(hoisted, value_ty);

        let body_scope = scope.bind(ScopeBinding {
            name: name.clone(),
            ty: binding_ty,
            generalize: true,
            node: Some(Arc::new(value.clone())),
        });

        let typed_body = self.attach(&body_scope, body)?;
        let ty = typed_body.ty().clone();
        let expression = Expression::Binding {
            name: name.clone(),
            value: Box::new(typed_value),
            body: Box::new(typed_body),
        };

        Ok(typed(expression, ty, scope))
    }

    /// Wraps `value` in one implicit function per shape, outermost first.
    fn hoist(&mut self, value: TypedNode, shapes: &[Value]) -> TypedNode {
        let scope = value.scope().clone();
        let parameters: Vec<(Name, &Value)> = shapes
            .iter()
            .map(|shape| {
                let name = format!("{IMPLICIT_PARAMETER_PREFIX}{}", self.implicits);
                self.implicits += 1;
                (name.into(), shape)
            })
            .collect();

        parameters
            .into_iter()
            .rev()
            .fold(value, |body, (name, shape)| {
                let parameter = typed(Expression::Identifier(name), shape.clone(), &scope);
                let ty = Value::implicit_function(shape.clone(), body.ty().clone());
                let expression = Expression::Function {
                    parameter: Box::new(parameter),
                    body: Box::new(body),
                    implicit: true,
                };

                typed(expression, ty, &scope)
            })
    }

    fn read_record_property(&mut self, record: &Value, property: &Name) -> Value {
        let record = self.resolved(record);

        match record.primary() {
            Value::Record(properties) => match properties.get(property) {
                Some(ty) => ty.clone(),
                None => {
                    self.messages.push(Diagnostic::MissingRecordProperty {
                        record: record.clone(),
                        property: property.clone(),
                    });
                    fresh(property)
                }
            },
            base if base.is_free_variable() || is_symbolic(base) => {
                Value::read_record_property(base.clone(), property.clone())
            }
            other => {
                self.messages.push(Diagnostic::NotReadable {
                    kind: other.kind(),
                    property: property.to_string(),
                });
                fresh(property)
            }
        }
    }

    fn read_data_property(&mut self, data: &Value, index: usize) -> Value {
        let data = self.resolved(data);

        match data.primary() {
            Value::Data { parameters, .. } => match parameters.get(index) {
                Some(ty) => ty.clone(),
                None => {
                    self.messages.push(Diagnostic::MissingDataProperty {
                        data: data.clone(),
                        index,
                    });
                    fresh("t")
                }
            },
            base if base.is_free_variable() || is_symbolic(base) => {
                Value::read_data_property(base.clone(), index)
            }
            other => {
                self.messages.push(Diagnostic::NotReadable {
                    kind: other.kind(),
                    property: index.to_string(),
                });
                fresh("t")
            }
        }
    }
}

/// Whether `value` is a projection or application that cannot be reduced
/// until its free variables are known.
fn is_symbolic(value: &Value) -> bool {
    matches!(
        value,
        Value::Application { .. }
            | Value::ReadRecordProperty { .. }
            | Value::ReadDataProperty { .. }
    )
}

/// The names bound by the parameter pattern `parameter`, which evaluated to
/// `pattern`: identifiers written in the pattern that evaluated to a free
/// variable of their own name.
fn binders(parameter: &Node, pattern: &Value) -> BTreeSet<Name> {
    fn identifiers(node: &Node, names: &mut BTreeSet<Name>) {
        if let Expression::Identifier(name) = &node.expression {
            names.insert(name.clone());
        }

        for child in node.children() {
            identifiers(child, names);
        }
    }

    let mut names = BTreeSet::new();
    identifiers(parameter, &mut names);

    let free = pattern.free_variables();
    names.retain(|name| free.contains(name));
    names
}

/// Collects the implicit prefixes of the nodes nested in a binding value,
/// outside of implicit function definitions. The value root itself is not
/// included.
fn nested_implicits(value: &TypedNode, replacements: &Substitution) -> Vec<Value> {
    fn collect(
        node: &TypedNode,
        include_self: bool,
        replacements: &Substitution,
        shapes: &mut Vec<Value>,
    ) {
        match &node.expression {
            Expression::Function { implicit: true, .. } => return,
            Expression::Binding { value, body, .. } => {
                collect(value, false, replacements, shapes);
                collect(body, true, replacements, shapes);
                return;
            }
            _ => (),
        }

        if include_self {
            let ty = replacements.apply(node.ty());
            for shape in ty.strip_implicits().1 {
                if !shapes.contains(shape) {
                    shapes.push(shape.clone());
                }
            }
        }

        for child in node.children() {
            collect(child, true, replacements, shapes);
        }
    }

    let mut shapes = Vec::new();
    collect(value, false, replacements, &mut shapes);
    shapes
}

/// Returns the `shapes` connected to `core` through chains of shared free
/// variables, in their original order.
pub fn implicits_for_binding(core: &Value, shapes: &[Value]) -> Vec<Value> {
    let variables: Vec<BTreeSet<Name>> = std::iter::once(core)
        .chain(shapes)
        .map(Value::free_variables)
        .collect();

    let mut graph = UnGraph::<usize, ()>::new_undirected();
    let nodes: Vec<NodeIndex> = (0..variables.len())
        .map(|index| graph.add_node(index))
        .collect();

    for (i, left) in variables.iter().enumerate() {
        for (j, right) in variables.iter().enumerate().skip(i + 1) {
            if !left.is_disjoint(right) {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }

    let mut related = BTreeSet::new();
    let mut bfs = Bfs::new(&graph, nodes[0]);
    while let Some(index) = bfs.next(&graph) {
        related.insert(graph[index]);
    }

    shapes
        .iter()
        .enumerate()
        .filter(|(index, _)| related.contains(&(index + 1)))
        .map(|(_, shape)| shape.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Attachment, attach_types, implicits_for_binding};
    use crate::{
        Context,
        config::Limits,
        diagnostic::{Diagnostic, InvariantViolation},
        evaluate::PartialEvaluator,
        expr::{Expression, Node},
        scope::Scope,
        syntax::parse,
        unique::base_name,
        value::{Value, tests::v},
    };

    fn try_attach(node: &Node) -> Result<Attachment, InvariantViolation> {
        let evaluator = PartialEvaluator::default();
        let context = Context::new(&evaluator, Limits::default());
        attach_types(&Scope::new(), node, &context)
    }

    fn attach(source: &str) -> Attachment {
        try_attach(&parse(source).unwrap()).unwrap()
    }

    #[test]
    fn identity_application() {
        let attachment = attach("let f = a -> a;\nf(1)");

        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);
        assert_eq!(attachment.node.ty(), &v!(num 1));

        let Expression::Binding { body, .. } = &attachment.node.expression else {
            panic!("expected a binding");
        };
        let Expression::Application { callee, .. } = &body.expression else {
            panic!("expected an application");
        };
        assert_eq!(callee.ty(), &v!(fn v!(num 1) => v!(num 1)));
    }

    #[test]
    fn identity_function_shares_its_variable() {
        let attachment = attach("a -> a");

        let Value::Function { parameter, body } = attachment.node.ty() else {
            panic!("expected a function, got {}", attachment.node.ty());
        };
        assert_eq!(parameter, body);
        assert!(matches!(&**parameter, Value::FreeVariable(name) if base_name(name) == "a"));
    }

    #[test]
    fn dual_patterns_constrain_their_binders() {
        let attachment = attach("x @ Num<a> -> x");

        assert!(attachment.messages.is_empty());
        let Value::Function { parameter, body } = attachment.node.ty() else {
            panic!("expected a function, got {}", attachment.node.ty());
        };
        assert_eq!(parameter, body);
        assert!(matches!(&**parameter, Value::Data { parameters, .. } if parameters.len() == 1));
    }

    #[test]
    fn mismatched_arguments_are_reported() {
        let attachment = attach("let f = x @ Num<a> -> x;\nf(1)");

        assert_eq!(attachment.messages.len(), 1);
        assert!(matches!(attachment.messages[0], Diagnostic::Mismatch { .. }));
        assert!(attachment.node.ty().is_free_variable());
    }

    #[test]
    fn let_bound_pattern_identifiers_are_constants() {
        let attachment = attach("let x = 1;\nlet f = x -> x;\nf(:a)");

        assert!(!attachment.messages.is_empty());
        assert!(
            attachment
                .messages
                .iter()
                .all(|message| matches!(message, Diagnostic::Mismatch { .. })),
            "{:?}",
            attachment.messages
        );

        let attachment = attach("let x = 1;\nlet f = x -> x;\nf(1)");
        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);
        assert_eq!(attachment.node.ty(), &v!(num 1));
    }

    #[test]
    fn literals_are_not_callable() {
        let attachment = attach("1(2)");

        assert!(matches!(
            attachment.messages.as_slice(),
            [Diagnostic::NotCallable { kind: "number", .. }]
        ));
        assert!(attachment.node.ty().is_free_variable());
    }

    #[test]
    fn free_variable_callees_become_functions() {
        let attachment = attach("f -> f(1)");

        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);
        let Value::Function { parameter, body } = attachment.node.ty() else {
            panic!("expected a function, got {}", attachment.node.ty());
        };
        let Value::Function {
            parameter: argument,
            body: result,
        } = &**parameter
        else {
            panic!("expected a function parameter, got {parameter}");
        };

        assert_eq!(**argument, v!(num 1));
        assert_eq!(result, body);
        assert!(body.is_free_variable());
    }

    #[test]
    fn redeclarations_are_frame_local() {
        let attachment = attach("let x = 1;\nlet x = 2;\nx");
        assert!(matches!(
            attachment.messages.as_slice(),
            [Diagnostic::Redeclared { name }] if &**name == "x"
        ));

        let attachment = attach("let x = 1;\ny -> let x = 2;\nx");
        assert!(attachment.messages.is_empty());
    }

    #[test]
    fn property_reads() {
        assert_eq!(attach("{ x: 1 }.x").node.ty(), &v!(num 1));
        assert_eq!(attach("Pair<1, 2>.1").node.ty(), &v!(num 2));

        let missing = attach("{ x: 1 }.y");
        assert!(matches!(
            missing.messages.as_slice(),
            [Diagnostic::MissingRecordProperty { .. }]
        ));

        let missing = attach("Pair<1>.3");
        assert!(matches!(
            missing.messages.as_slice(),
            [Diagnostic::MissingDataProperty { index: 3, .. }]
        ));

        let unreadable = attach(":a.x");
        assert!(matches!(
            unreadable.messages.as_slice(),
            [Diagnostic::NotReadable { kind: "symbol", .. }]
        ));
    }

    #[test]
    fn reads_of_free_variables_stay_symbolic() {
        let attachment = attach("r -> r.x");

        let Value::Function { body, .. } = attachment.node.ty() else {
            panic!("expected a function, got {}", attachment.node.ty());
        };
        assert!(matches!(&**body, Value::ReadRecordProperty { property, .. } if &**property == "x"));
    }

    #[test]
    fn nested_reads_of_free_variables_stay_symbolic() {
        let attachment = attach("r -> r.a.b");
        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);

        let Value::Function { body, .. } = attachment.node.ty() else {
            panic!("expected a function, got {}", attachment.node.ty());
        };
        let Value::ReadRecordProperty { record, property } = &**body else {
            panic!("expected a record property read, got {body}");
        };
        assert_eq!(&**property, "b");
        assert!(matches!(&**record, Value::ReadRecordProperty { property, .. } if &**property == "a"));

        let attachment = attach("d -> d.0.1");
        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);

        let Value::Function { body, .. } = attachment.node.ty() else {
            panic!("expected a function, got {}", attachment.node.ty());
        };
        let Value::ReadDataProperty { data, index: 1 } = &**body else {
            panic!("expected a data property read, got {body}");
        };
        assert!(matches!(&**data, Value::ReadDataProperty { index: 0, .. }));
    }

    #[test]
    fn literal_reads_are_not_readable() {
        let attachment = attach("true.x");

        assert!(matches!(
            attachment.messages.as_slice(),
            [Diagnostic::NotReadable { kind: "boolean", .. }]
        ));
    }

    #[test]
    fn calls_of_symbolic_values_stay_symbolic() {
        let attachment = attach("r -> r.f(1)");
        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);

        let Value::Function { body, .. } = attachment.node.ty() else {
            panic!("expected a function, got {}", attachment.node.ty());
        };
        let Value::Application { callee, parameter } = &**body else {
            panic!("expected an application, got {body}");
        };
        assert!(matches!(&**callee, Value::ReadRecordProperty { property, .. } if &**property == "f"));
        assert_eq!(&**parameter, &v!(num 1));

        let attachment = attach("d -> d.0(1)");
        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);
    }

    #[test]
    fn pattern_matches_are_fatal() {
        let node = Node::new(Expression::PatternMatch {
            value: Box::new(Node::number(1.0)),
            arms: Vec::new().into_boxed_slice(),
        });

        assert!(matches!(
            try_attach(&node),
            Err(InvariantViolation::PatternMatch { .. })
        ));
    }

    #[test]
    fn related_implicits_are_hoisted_onto_bindings() {
        let attachment = attach(
            "let numInt = Num<Int<n>>;\n\
             let add = implicit Num<a> -> x @ a -> x;\n\
             let double = y -> add(y);\n\
             double",
        );

        assert!(attachment.messages.is_empty(), "{:?}", attachment.messages);

        let mut node = &attachment.node;
        while let Expression::Binding { name, value, body } = &node.expression {
            if &**name == "double" {
                let Expression::Function {
                    parameter,
                    implicit: true,
                    ..
                } = &value.expression
                else {
                    panic!("expected a hoisted implicit, got {value}");
                };
                assert!(matches!(
                    &parameter.expression,
                    Expression::Identifier(name) if &**name == "$implicit0"
                ));
            }
            node = body.as_ref();
        }

        let (core, shapes) = node.ty().strip_implicits();
        assert_eq!(shapes.len(), 1);
        assert!(matches!(core, Value::Function { .. }));
    }

    #[test]
    fn implicits_are_related_transitively() {
        let core = v!(fn v!(var "a") => v!(var "a"));
        let shapes = [
            v!(data "Num"; v!(var "a")),
            v!(data "Eq"; v!(var "b")),
            v!(data "Cast"; v!(var "a"), v!(var "b")),
            v!(data "Show"; v!(var "c")),
            v!(data "Num"; v!(num 1)),
        ];

        assert_eq!(implicits_for_binding(&core, &shapes), shapes[..3].to_vec());
    }
}
