//! Structural type inference and implicit resolution for a small functional
//! language.
//!
//! The pipeline is [`attach::attach_types`] followed by
//! [`implicits::resolve_implicit_parameters`]; [`check`] runs both with the
//! defaults from a [`Config`].

use config::{Config, Limits};
use diagnostic::{Diagnostic, InvariantViolation};
use evaluate::{Evaluator, PartialEvaluator};
use expr::{Node, TypedNode};
use scope::Scope;

pub mod attach;
pub mod codegen;
pub mod config;
pub mod converge;
pub mod diagnostic;
pub mod evaluate;
pub mod expr;
pub mod implicits;
pub mod reduce;
pub mod scope;
pub mod syntax;
pub mod unique;
pub mod value;

/// The collaborators shared by the type passes.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub evaluator: &'a dyn Evaluator,
    pub limits: Limits,
}

impl<'a> Context<'a> {
    pub fn new(evaluator: &'a dyn Evaluator, limits: Limits) -> Self {
        Self { evaluator, limits }
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// A fully typed tree with every implicit that could be resolved filled in.
#[derive(Debug, Clone)]
pub struct Checked {
    pub messages: Vec<Diagnostic>,
    pub node: TypedNode,
}

/// Attaches types to `node` and resolves its implicit parameters.
pub fn check(node: &Node, config: &Config) -> Result<Checked, InvariantViolation> {
    let evaluator = PartialEvaluator::new(&config.limits);
    let context = Context::new(&evaluator, config.limits);

    let attachment = attach::attach_types(&Scope::new(), node, &context)?;
    let resolution = implicits::resolve_implicit_parameters(attachment, &context);

    Ok(Checked {
        messages: resolution.messages,
        node: resolution.node,
    })
}

#[cfg(test)]
mod tests {
    use super::check;
    use crate::{config::Config, expr::Expression, syntax::parse, value::tests::v};

    #[test]
    fn identity_is_checked_end_to_end() {
        let node = parse("let f = a -> a;\nf(1)").unwrap();
        let checked = check(&node, &Config::default()).unwrap();

        assert!(checked.messages.is_empty());
        assert_eq!(checked.node.ty(), &v!(num 1));

        let Expression::Binding { body, .. } = &checked.node.expression else {
            panic!("expected a binding");
        };
        let Expression::Application { callee, .. } = &body.expression else {
            panic!("expected an application");
        };
        assert_eq!(callee.ty(), &v!(fn v!(num 1) => v!(num 1)));
    }
}
