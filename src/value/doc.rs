//! Rendering [`Value`]s as documents.

use pretty::RcDoc;
use recursion::CollapsibleExt;

use super::{MatchArm, Name, Value, ValueFrame};

/// The binding strength of a rendered value, used to decide where
/// parentheses are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Function,
    Dual,
    Atom,
}

#[derive(Debug, Clone)]
struct Rendered {
    doc: RcDoc<'static, ()>,
    precedence: Precedence,
    /// Set when the rendered value was a symbol, so data names can drop
    /// the leading colon.
    symbol: Option<Name>,
}

impl Rendered {
    fn atom(doc: RcDoc<'static, ()>) -> Self {
        Self {
            doc,
            precedence: Precedence::Atom,
            symbol: None,
        }
    }

    /// Returns the document, parenthesized if it binds looser than `minimum`.
    fn at_least(self, minimum: Precedence) -> RcDoc<'static, ()> {
        if self.precedence < minimum {
            RcDoc::text("(").append(self.doc).append(RcDoc::text(")"))
        } else {
            self.doc
        }
    }
}

fn comma_separated(
    docs: impl IntoIterator<Item = RcDoc<'static, ()>>,
) -> RcDoc<'static, ()> {
    RcDoc::intersperse(docs, RcDoc::text(",").append(RcDoc::line())).group()
}

impl ValueFrame<Rendered> {
    fn to_rendered(self) -> Rendered {
        match self {
            ValueFrame::FreeVariable(name) => {
                Rendered::atom(RcDoc::as_string(name))
            }
            ValueFrame::Symbol(name) => Rendered {
                symbol: Some(name.clone()),
                ..Rendered::atom(RcDoc::text(":").append(RcDoc::as_string(name)))
            },
            ValueFrame::Boolean(value) => Rendered::atom(RcDoc::as_string(value)),
            ValueFrame::Number(value) => Rendered::atom(RcDoc::as_string(value)),
            ValueFrame::String(value) => {
                Rendered::atom(RcDoc::as_string(format!("{:?}", &*value)))
            }
            ValueFrame::Data { name, parameters } => {
                let name = match name.symbol {
                    Some(symbol) => RcDoc::as_string(symbol),
                    None => name.at_least(Precedence::Atom),
                };

                Rendered::atom(
                    name.append(RcDoc::text("<"))
                        .append(comma_separated(
                            parameters.into_iter().map(|param| param.doc),
                        ))
                        .append(RcDoc::text(">")),
                )
            }
            ValueFrame::Record(properties) if properties.is_empty() => {
                Rendered::atom(RcDoc::text("{}"))
            }
            ValueFrame::Record(properties) => Rendered::atom(
                RcDoc::text("{")
                    .append(
                        RcDoc::line()
                            .append(comma_separated(properties.into_iter().map(
                                |(name, value)| {
                                    RcDoc::as_string(name)
                                        .append(RcDoc::text(": "))
                                        .append(value.doc)
                                },
                            )))
                            .nest(2),
                    )
                    .append(RcDoc::line())
                    .append(RcDoc::text("}"))
                    .group(),
            ),
            ValueFrame::Function { parameter, body } => Rendered {
                doc: function_doc(parameter, body),
                precedence: Precedence::Function,
                symbol: None,
            },
            ValueFrame::ImplicitFunction { parameter, body } => Rendered {
                doc: RcDoc::text("implicit ").append(function_doc(parameter, body)),
                precedence: Precedence::Function,
                symbol: None,
            },
            ValueFrame::Application { callee, parameter } => Rendered::atom(
                callee
                    .at_least(Precedence::Atom)
                    .append(RcDoc::text("("))
                    .append(parameter.doc)
                    .append(RcDoc::text(")")),
            ),
            ValueFrame::Dual { left, right } => Rendered {
                doc: left
                    .at_least(Precedence::Atom)
                    .append(RcDoc::text(" @ "))
                    .append(right.at_least(Precedence::Atom)),
                precedence: Precedence::Dual,
                symbol: None,
            },
            ValueFrame::ReadRecordProperty { record, property } => {
                Rendered::atom(
                    record
                        .at_least(Precedence::Atom)
                        .append(RcDoc::text("."))
                        .append(RcDoc::as_string(property)),
                )
            }
            ValueFrame::ReadDataProperty { data, index } => Rendered::atom(
                data.at_least(Precedence::Atom)
                    .append(RcDoc::text("."))
                    .append(RcDoc::as_string(index)),
            ),
            ValueFrame::PatternMatch { value, arms } => {
                let arms = arms.into_iter().map(|MatchArm { test, value }| {
                    test.doc.append(RcDoc::text(" => ")).append(value.doc)
                });

                Rendered::atom(
                    RcDoc::text("match ")
                        .append(value.at_least(Precedence::Atom))
                        .append(RcDoc::text(" {"))
                        .append(RcDoc::line().append(comma_separated(arms)).nest(2))
                        .append(RcDoc::line())
                        .append(RcDoc::text("}"))
                        .group(),
                )
            }
        }
    }
}

fn function_doc(parameter: Rendered, body: Rendered) -> RcDoc<'static, ()> {
    RcDoc::text("(")
        .append(parameter.doc)
        .append(RcDoc::text(") ->"))
        .append(RcDoc::line().append(body.doc).nest(2))
        .group()
}

impl Value {
    pub fn to_doc(&self) -> RcDoc<'static, ()> {
        self.collapse_frames(ValueFrame::to_rendered).doc
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_doc().render_fmt(80, f)
    }
}
