//! Code generation.
//!
//! A [`Backend`] turns a checked tree into target source text. Types have
//! already done their job by this point: implicit parameters are ordinary
//! arguments, and parameter patterns only contribute the name they bind.

use pretty::RcDoc;

use crate::{
    expr::{Expression, Node, TypedNode},
    value::Name,
};

pub trait Backend {
    fn emit(&self, node: &TypedNode) -> String;
}

/// Emits an ES module whose default export is the value of the program.
///
/// Top-level bindings become `const` declarations, nested bindings become
/// immediately-invoked arrow functions, and data values are objects carrying
/// their tag and positional values.
#[derive(Debug, Clone, Copy)]
pub struct JavaScript {
    pub width: usize,
}

impl Default for JavaScript {
    fn default() -> Self {
        Self { width: 80 }
    }
}

impl Backend for JavaScript {
    fn emit(&self, node: &TypedNode) -> String {
        program(node).pretty(self.width).to_string()
    }
}

fn program<D>(node: &Node<D>) -> RcDoc<'static, ()> {
    let (mut statements, result) = declarations(node);
    statements.push(
        RcDoc::text("export default ")
            .append(expression(result))
            .append(";"),
    );

    RcDoc::intersperse(statements, RcDoc::hardline()).append(RcDoc::hardline())
}

/// Splits the leading bindings of `node` into `const` declarations.
fn declarations<D>(node: &Node<D>) -> (Vec<RcDoc<'static, ()>>, &Node<D>) {
    let mut statements = Vec::new();
    let mut current = node;

    while let Expression::Binding { name, value, body } = &current.expression {
        statements.push(
            RcDoc::text("const ")
                .append(RcDoc::as_string(name))
                .append(" = ")
                .append(expression(value))
                .append(";"),
        );
        current = body.as_ref();
    }

    (statements, current)
}

fn expression<D>(node: &Node<D>) -> RcDoc<'static, ()> {
    match &node.expression {
        Expression::Identifier(name) => RcDoc::as_string(name),
        Expression::Boolean(value) => RcDoc::as_string(value),
        Expression::Number(value) => RcDoc::as_string(value),
        Expression::String(value) => string(value),
        Expression::Symbol(name) => RcDoc::text("Symbol.for(")
            .append(string(name))
            .append(")"),
        Expression::Record(properties) if properties.is_empty() => RcDoc::text("{}"),
        Expression::Record(properties) => object(
            properties
                .iter()
                .map(|(name, value)| (RcDoc::as_string(name), expression(value))),
        ),
        Expression::DataInstantiation { name, parameters } => object([
            (RcDoc::text("$tag"), string(name)),
            (
                RcDoc::text("$values"),
                RcDoc::text("[")
                    .append(comma_separated(parameters.iter().map(expression)))
                    .append("]"),
            ),
        ]),
        Expression::Application { callee, parameter } => callee_position(callee)
            .append("(")
            .append(expression(parameter))
            .append(")"),
        Expression::Function {
            parameter, body, ..
        } => {
            let binder = binder(parameter).map_or(RcDoc::text("_"), RcDoc::as_string);
            let body = match &body.expression {
                Expression::Record(_) | Expression::DataInstantiation { .. } => {
                    RcDoc::text("(").append(expression(body)).append(")")
                }
                _ => expression(body),
            };

            RcDoc::text("(")
                .append(binder)
                .append(") =>")
                .append(RcDoc::line().append(body).nest(2))
                .group()
        }
        Expression::Binding { .. } => {
            let (bindings, result) = declarations(node);
            let statements = bindings.into_iter().chain(std::iter::once(
                RcDoc::text("return ").append(expression(result)).append(";"),
            ));

            RcDoc::text("(() => {")
                .append(
                    RcDoc::hardline()
                        .append(RcDoc::intersperse(statements, RcDoc::hardline()))
                        .nest(2),
                )
                .append(RcDoc::hardline())
                .append("})()")
        }
        // only the left side of a dual exists at runtime
        Expression::Dual { left, .. } => expression(left),
        Expression::ReadRecordProperty { record, property } => callee_position(record)
            .append(".")
            .append(RcDoc::as_string(property)),
        Expression::ReadDataProperty { data, index } => callee_position(data)
            .append(".$values[")
            .append(RcDoc::as_string(index))
            .append("]"),
        Expression::PatternMatch { .. } => {
            RcDoc::text("(() => { throw new Error(\"unsupported pattern match\"); })()")
        }
    }
}

fn callee_position<D>(node: &Node<D>) -> RcDoc<'static, ()> {
    match &node.expression {
        Expression::Function { .. } | Expression::Record(_) => {
            RcDoc::text("(").append(expression(node)).append(")")
        }
        _ => expression(node),
    }
}

/// The name bound by a parameter pattern, if it binds one at runtime.
fn binder<D>(pattern: &Node<D>) -> Option<&Name> {
    match &pattern.expression {
        Expression::Identifier(name) => Some(name),
        Expression::Dual { left, right } => binder(left).or_else(|| binder(right)),
        _ => None,
    }
}

fn string(value: &str) -> RcDoc<'static, ()> {
    RcDoc::as_string(format!("{value:?}"))
}

fn object(
    properties: impl IntoIterator<Item = (RcDoc<'static, ()>, RcDoc<'static, ()>)>,
) -> RcDoc<'static, ()> {
    RcDoc::text("{")
        .append(
            RcDoc::line()
                .append(comma_separated(
                    properties
                        .into_iter()
                        .map(|(name, value)| name.append(": ").append(value)),
                ))
                .nest(2),
        )
        .append(RcDoc::line())
        .append("}")
        .group()
}

fn comma_separated(
    docs: impl IntoIterator<Item = RcDoc<'static, ()>>,
) -> RcDoc<'static, ()> {
    RcDoc::intersperse(docs, RcDoc::text(",").append(RcDoc::line())).group()
}

#[cfg(test)]
mod tests {
    use super::{Backend, JavaScript};
    use crate::{check, config::Config, syntax::parse};

    fn emit(source: &str) -> String {
        let checked = check(&parse(source).unwrap(), &Config::default()).unwrap();
        assert!(checked.messages.is_empty(), "{:?}", checked.messages);
        JavaScript::default().emit(&checked.node)
    }

    #[test]
    fn bindings_become_declarations() {
        assert_eq!(
            emit("let f = a -> a;\nf(1)"),
            "const f = (a) => a;\nexport default f(1);\n"
        );
    }

    #[test]
    fn data_and_records_become_objects() {
        assert_eq!(
            emit("{ x: P<1> }.x.0"),
            "export default ({ x: { $tag: \"P\", $values: [1] } }).x.$values[0];\n"
        );
        assert_eq!(emit(":a"), "export default Symbol.for(\"a\");\n");
    }

    #[test]
    fn nested_bindings_are_scoped() {
        assert_eq!(
            emit("x -> let y = x;\ny"),
            "export default (x) =>\n  (() => {\n    const y = x;\n    return y;\n  })();\n"
        );
    }

    #[test]
    fn resolved_implicits_are_passed_as_arguments() {
        let output = emit(
            "let numInt = Num<Int<n>>;\n\
             let add = implicit Num<a> -> x @ a -> x;\n\
             add(Int<1>)",
        );

        assert!(output.contains("const add = (_) => (x) => x;\n"), "{output}");
        assert!(
            output.ends_with(
                "export default add(numInt)({ $tag: \"Int\", $values: [1] });\n"
            ),
            "{output}"
        );
    }
}
