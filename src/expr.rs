//! The expression tree consumed and produced by the type passes.
//!
//! Every [`Node`] pairs an [`Expression`] with a decoration. Trees read from
//! source are decorated with `()`, and type attachment produces trees
//! decorated with [`Decoration`], which records the type of the node and the
//! scope it was typed in.

use std::collections::BTreeMap;

use pretty::RcDoc;

use crate::{scope::Scope, value::{Name, Value}};

#[derive(Debug, Clone, PartialEq)]
pub struct Node<D = ()> {
    pub expression: Expression<D>,
    pub decoration: D,
}

pub type TypedNode = Node<Decoration>;

#[derive(Debug, Clone)]
pub struct Decoration {
    pub ty: Value,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression<D = ()> {
    Identifier(Name),
    Boolean(bool),
    Number(f64),
    String(Name),
    Symbol(Name),
    Record(BTreeMap<Name, Node<D>>),
    Application {
        callee: Box<Node<D>>,
        parameter: Box<Node<D>>,
    },
    /// A single-parameter function. The parameter is a pattern whose
    /// unbound identifiers are the names it binds.
    Function {
        parameter: Box<Node<D>>,
        body: Box<Node<D>>,
        implicit: bool,
    },
    DataInstantiation {
        name: Name,
        parameters: Box<[Node<D>]>,
    },
    /// An expression of the form `let <name> = <value>; <body>`.
    Binding {
        name: Name,
        value: Box<Node<D>>,
        body: Box<Node<D>>,
    },
    Dual {
        left: Box<Node<D>>,
        right: Box<Node<D>>,
    },
    ReadRecordProperty {
        record: Box<Node<D>>,
        property: Name,
    },
    ReadDataProperty {
        data: Box<Node<D>>,
        index: usize,
    },
    /// A pattern match. The reader never produces these, and the type
    /// passes refuse them.
    PatternMatch {
        value: Box<Node<D>>,
        arms: Box<[(Node<D>, Node<D>)]>,
    },
}

impl<D> Node<D> {
    pub fn decorated(expression: Expression<D>, decoration: D) -> Self {
        Self {
            expression,
            decoration,
        }
    }

    /// The direct children of `self`, in source order.
    pub fn children(&self) -> Vec<&Node<D>> {
        match &self.expression {
            Expression::Identifier(_)
            | Expression::Boolean(_)
            | Expression::Number(_)
            | Expression::String(_)
            | Expression::Symbol(_) => Vec::new(),
            Expression::Record(properties) => properties.values().collect(),
            Expression::DataInstantiation { parameters, .. } => {
                parameters.iter().collect()
            }
            Expression::Application {
                callee: left,
                parameter: right,
            }
            | Expression::Function {
                parameter: left,
                body: right,
                ..
            }
            | Expression::Binding {
                value: left,
                body: right,
                ..
            }
            | Expression::Dual { left, right } => vec![&**left, &**right],
            Expression::ReadRecordProperty { record: inner, .. }
            | Expression::ReadDataProperty { data: inner, .. } => vec![&**inner],
            Expression::PatternMatch { value, arms } => std::iter::once(&**value)
                .chain(arms.iter().flat_map(|(test, body)| [test, body]))
                .collect(),
        }
    }

    /// Calls `f` on the decoration of every node in `self`, parents before
    /// children.
    pub fn for_each_decoration_mut(&mut self, f: &mut impl FnMut(&mut D)) {
        f(&mut self.decoration);

        match &mut self.expression {
            Expression::Identifier(_)
            | Expression::Boolean(_)
            | Expression::Number(_)
            | Expression::String(_)
            | Expression::Symbol(_) => (),
            Expression::Record(properties) => properties
                .values_mut()
                .for_each(|node| node.for_each_decoration_mut(f)),
            Expression::DataInstantiation { parameters, .. } => parameters
                .iter_mut()
                .for_each(|node| node.for_each_decoration_mut(f)),
            Expression::Application {
                callee: left,
                parameter: right,
            }
            | Expression::Function {
                parameter: left,
                body: right,
                ..
            }
            | Expression::Binding {
                value: left,
                body: right,
                ..
            }
            | Expression::Dual { left, right } => {
                left.for_each_decoration_mut(f);
                right.for_each_decoration_mut(f);
            }
            Expression::ReadRecordProperty { record: inner, .. }
            | Expression::ReadDataProperty { data: inner, .. } => {
                inner.for_each_decoration_mut(f)
            }
            Expression::PatternMatch { value, arms } => {
                value.for_each_decoration_mut(f);
                for (test, body) in arms.iter_mut() {
                    test.for_each_decoration_mut(f);
                    body.for_each_decoration_mut(f);
                }
            }
        }
    }
}

impl Node {
    pub fn new(expression: Expression) -> Self {
        Self::decorated(expression, ())
    }

    pub fn identifier(name: impl Into<Name>) -> Self {
        Self::new(Expression::Identifier(name.into()))
    }

    pub fn number(value: f64) -> Self {
        Self::new(Expression::Number(value))
    }

    pub fn application(callee: Node, parameter: Node) -> Self {
        Self::new(Expression::Application {
            callee: Box::new(callee),
            parameter: Box::new(parameter),
        })
    }

    pub fn function(parameter: Node, body: Node, implicit: bool) -> Self {
        Self::new(Expression::Function {
            parameter: Box::new(parameter),
            body: Box::new(body),
            implicit,
        })
    }

    pub fn binding(name: impl Into<Name>, value: Node, body: Node) -> Self {
        Self::new(Expression::Binding {
            name: name.into(),
            value: Box::new(value),
            body: Box::new(body),
        })
    }
}

impl TypedNode {
    pub fn ty(&self) -> &Value {
        &self.decoration.ty
    }

    pub fn scope(&self) -> &Scope {
        &self.decoration.scope
    }
}

// RENDERING

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Binding,
    Function,
    Dual,
    Atom,
}

impl<D> Expression<D> {
    fn precedence(&self) -> Precedence {
        match self {
            Expression::Binding { .. } => Precedence::Binding,
            Expression::Function { .. } => Precedence::Function,
            Expression::Dual { .. } => Precedence::Dual,
            _ => Precedence::Atom,
        }
    }
}

impl<D> Node<D> {
    /// Renders `self` in the syntax accepted by [`crate::syntax::parse`].
    pub fn to_doc(&self) -> RcDoc<'static, ()> {
        match &self.expression {
            Expression::Identifier(name) => RcDoc::as_string(name),
            Expression::Boolean(value) => RcDoc::as_string(value),
            Expression::Number(value) => RcDoc::as_string(value),
            Expression::String(value) => {
                RcDoc::as_string(format!("{:?}", &**value))
            }
            Expression::Symbol(name) => {
                RcDoc::text(":").append(RcDoc::as_string(name))
            }
            Expression::Record(properties) if properties.is_empty() => {
                RcDoc::text("{}")
            }
            Expression::Record(properties) => RcDoc::text("{")
                .append(
                    RcDoc::line()
                        .append(comma_separated(properties.iter().map(
                            |(name, value)| {
                                RcDoc::as_string(name)
                                    .append(RcDoc::text(": "))
                                    .append(value.to_doc())
                            },
                        )))
                        .nest(2),
                )
                .append(RcDoc::line())
                .append(RcDoc::text("}"))
                .group(),
            Expression::Application { callee, parameter } => callee
                .at_least(Precedence::Atom)
                .append(RcDoc::text("("))
                .append(parameter.to_doc())
                .append(RcDoc::text(")")),
            Expression::Function {
                parameter,
                body,
                implicit,
            } => {
                let prefix = match implicit {
                    true => RcDoc::text("implicit "),
                    false => RcDoc::nil(),
                };

                prefix
                    .append(parameter.at_least(Precedence::Dual))
                    .append(RcDoc::text(" ->"))
                    .append(
                        RcDoc::line()
                            .append(body.at_least(Precedence::Binding))
                            .nest(2),
                    )
                    .group()
            }
            Expression::DataInstantiation { name, parameters } => {
                RcDoc::as_string(name)
                    .append(RcDoc::text("<"))
                    .append(comma_separated(
                        parameters.iter().map(Node::to_doc),
                    ))
                    .append(RcDoc::text(">"))
            }
            Expression::Binding { name, value, body } => RcDoc::text("let ")
                .append(RcDoc::as_string(name))
                .append(RcDoc::text(" ="))
                .append(RcDoc::line().append(value.to_doc()).nest(2).group())
                .append(RcDoc::text(";"))
                .append(RcDoc::hardline())
                .append(body.to_doc()),
            Expression::Dual { left, right } => left
                .at_least(Precedence::Atom)
                .append(RcDoc::text(" @ "))
                .append(right.at_least(Precedence::Atom)),
            Expression::ReadRecordProperty { record, property } => record
                .at_least(Precedence::Atom)
                .append(RcDoc::text("."))
                .append(RcDoc::as_string(property)),
            Expression::ReadDataProperty { data, index } => data
                .at_least(Precedence::Atom)
                .append(RcDoc::text("."))
                .append(RcDoc::as_string(index)),
            Expression::PatternMatch { value, arms } => RcDoc::text("match ")
                .append(value.at_least(Precedence::Atom))
                .append(RcDoc::text(" {"))
                .append(
                    RcDoc::line()
                        .append(comma_separated(arms.iter().map(
                            |(test, body)| {
                                test.to_doc()
                                    .append(RcDoc::text(" => "))
                                    .append(body.to_doc())
                            },
                        )))
                        .nest(2),
                )
                .append(RcDoc::line())
                .append(RcDoc::text("}"))
                .group(),
        }
    }

    fn at_least(&self, minimum: Precedence) -> RcDoc<'static, ()> {
        if self.expression.precedence() < minimum {
            RcDoc::text("(")
                .append(self.to_doc())
                .append(RcDoc::text(")"))
        } else {
            self.to_doc()
        }
    }
}

fn comma_separated(
    docs: impl IntoIterator<Item = RcDoc<'static, ()>>,
) -> RcDoc<'static, ()> {
    RcDoc::intersperse(docs, RcDoc::text(",").append(RcDoc::line())).group()
}

impl<D> std::fmt::Display for Node<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_doc().render_fmt(80, f)
    }
}
