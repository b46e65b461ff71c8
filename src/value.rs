//! Structural values.
//!
//! The language is structurally typed, so types and evaluated data share a
//! single representation: the [`Value`]. A type is simply the most general
//! value shape an expression can take, and shapes may contain free variables
//! standing for parts that are not yet known.
//!
//! # Traversals
//! [`Value`] is a plain recursive enum. Most traversals are written against
//! [`ValueFrame`] through the [`recursion`] crate, so that deeply nested
//! values do not translate into deep native recursion.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use recursion::{
    Collapsible, CollapsibleExt, Expandable, MappableFrame, PartiallyApplied,
};

use crate::unique::fresh_name;

pub mod doc;
pub mod subst;

pub use subst::Substitution;

/// The name of a variable, symbol or property.
pub type Name = Arc<str>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An unresolved type variable, identified by name.
    FreeVariable(Name),
    Symbol(Name),
    Boolean(bool),
    Number(f64),
    String(Name),
    /// A tagged value with positional parameters. The name is normally a
    /// [`Value::Symbol`].
    Data {
        name: Box<Value>,
        parameters: Box<[Value]>,
    },
    /// A structural record. Properties are kept sorted by name.
    Record(BTreeMap<Name, Value>),
    Function {
        parameter: Box<Value>,
        body: Box<Value>,
    },
    /// A function whose parameter is found by searching the scope rather
    /// than by being passed explicitly.
    ImplicitFunction {
        parameter: Box<Value>,
        body: Box<Value>,
    },
    /// An application that could not be reduced any further.
    Application {
        callee: Box<Value>,
        parameter: Box<Value>,
    },
    /// A value that has to satisfy two shapes at once.
    Dual {
        left: Box<Value>,
        right: Box<Value>,
    },
    ReadRecordProperty {
        record: Box<Value>,
        property: Name,
    },
    ReadDataProperty {
        data: Box<Value>,
        index: usize,
    },
    PatternMatch {
        value: Box<Value>,
        arms: Box<[MatchArm]>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm<A = Value> {
    pub test: A,
    pub value: A,
}

impl Value {
    pub fn free(name: impl Into<Name>) -> Self {
        Value::FreeVariable(name.into())
    }

    pub fn symbol(name: impl Into<Name>) -> Self {
        Value::Symbol(name.into())
    }

    pub fn string(value: impl Into<Name>) -> Self {
        Value::String(value.into())
    }

    /// A [`Value::Data`] named by the symbol `name`.
    pub fn data(
        name: impl Into<Name>,
        parameters: impl IntoIterator<Item = Value>,
    ) -> Self {
        Value::Data {
            name: Box::new(Value::symbol(name)),
            parameters: parameters.into_iter().collect(),
        }
    }

    pub fn record<N: Into<Name>>(
        properties: impl IntoIterator<Item = (N, Value)>,
    ) -> Self {
        Value::Record(
            properties
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    pub fn function(parameter: Value, body: Value) -> Self {
        Value::Function {
            parameter: Box::new(parameter),
            body: Box::new(body),
        }
    }

    pub fn implicit_function(parameter: Value, body: Value) -> Self {
        Value::ImplicitFunction {
            parameter: Box::new(parameter),
            body: Box::new(body),
        }
    }

    pub fn application(callee: Value, parameter: Value) -> Self {
        Value::Application {
            callee: Box::new(callee),
            parameter: Box::new(parameter),
        }
    }

    /// Builds a [`Value::Dual`], collapsing it when both sides are identical.
    pub fn dual(left: Value, right: Value) -> Self {
        if left == right {
            left
        } else {
            Value::Dual {
                left: Box::new(left),
                right: Box::new(right),
            }
        }
    }

    /// Builds a record projection, reducing it when `record` is a literal
    /// record holding `property`.
    pub fn read_record_property(record: Value, property: Name) -> Self {
        match record {
            Value::Record(mut properties) if properties.contains_key(&property) => {
                match properties.remove(&property) {
                    Some(value) => value,
                    None => Value::Record(properties),
                }
            }
            record => Value::ReadRecordProperty {
                record: Box::new(record),
                property,
            },
        }
    }

    /// Builds a data projection, reducing it when `data` is a data value with
    /// a parameter at `index`.
    pub fn read_data_property(data: Value, index: usize) -> Self {
        match data {
            Value::Data { parameters, .. } if index < parameters.len() => {
                parameters.into_vec().swap_remove(index)
            }
            data => Value::ReadDataProperty {
                data: Box::new(data),
                index,
            },
        }
    }

    /// A short human-readable description of the kind of `self`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::FreeVariable(_) => "free variable",
            Value::Symbol(_) => "symbol",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Data { .. } => "data value",
            Value::Record(_) => "record",
            Value::Function { .. } => "function",
            Value::ImplicitFunction { .. } => "implicit function",
            Value::Application { .. } => "application",
            Value::Dual { .. } => "dual binding",
            Value::ReadRecordProperty { .. } => "record property read",
            Value::ReadDataProperty { .. } => "data property read",
            Value::PatternMatch { .. } => "pattern match",
        }
    }

    pub fn as_free_variable(&self) -> Option<&Name> {
        match self {
            Value::FreeVariable(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_free_variable(&self) -> bool {
        matches!(self, Value::FreeVariable(_))
    }

    /// The side of a [`Value::Dual`] that carries structure, i.e. the first
    /// side which is not a bare free variable. Other values are returned as
    /// they are.
    pub fn primary(&self) -> &Value {
        let mut current = self;

        while let Value::Dual { left, right } = current {
            current = if left.is_free_variable() { right } else { left };
        }

        current
    }

    /// Returns the set of free variables occurring in `self`.
    pub fn free_variables(&self) -> BTreeSet<Name> {
        self.collapse_frames(|frame| match frame {
            ValueFrame::FreeVariable(name) => BTreeSet::from([name]),
            frame => {
                let mut variables = BTreeSet::new();
                ValueFrame::<PartiallyApplied>::map_frame(frame, |child| variables.extend(child));
                variables
            }
        })
    }

    /// Returns `true` if and only if the variable `name` occurs in `self`.
    pub fn occurs(&self, name: &str) -> bool {
        self.collapse_frames(|frame| match frame {
            ValueFrame::FreeVariable(variable) => &*variable == name,
            frame => {
                let mut found = false;
                ValueFrame::<PartiallyApplied>::map_frame(frame, |child| found |= child);
                found
            }
        })
    }

    /// Returns `true` if `self` contains an implicit function anywhere.
    pub fn has_implicits(&self) -> bool {
        self.collapse_frames(|frame| match frame {
            ValueFrame::ImplicitFunction { .. } => true,
            frame => {
                let mut found = false;
                ValueFrame::<PartiallyApplied>::map_frame(frame, |child| found |= child);
                found
            }
        })
    }

    /// Splits the leading chain of implicit functions off `self`, returning
    /// the remaining core together with the implicit parameter shapes in
    /// their original order.
    pub fn strip_implicits(&self) -> (&Value, Vec<&Value>) {
        let mut shapes = Vec::new();
        let mut current = self;

        while let Value::ImplicitFunction { parameter, body } = current {
            shapes.push(parameter.as_ref());
            current = body;
        }

        (current, shapes)
    }

    /// The inverse of [`Value::strip_implicits`].
    pub fn with_implicits<I>(shapes: I, core: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        shapes
            .into_iter()
            .rev()
            .fold(core, |body, shape| Value::implicit_function(shape, body))
    }

    /// Un-curries an application chain into its root callee and its
    /// parameters, outermost callee first.
    pub fn uncurry(&self) -> (&Value, Vec<&Value>) {
        let mut parameters = Vec::new();
        let mut current = self;

        while let Value::Application { callee, parameter } = current {
            parameters.push(parameter.as_ref());
            current = callee;
        }

        parameters.reverse();
        (current, parameters)
    }

    /// Renames every free variable of `self` that is not in `fixed` to a
    /// fresh name. Occurrences of the same variable are renamed consistently.
    pub fn instantiate(&self, fixed: &BTreeSet<Name>) -> Value {
        let renaming: Substitution = self
            .free_variables()
            .into_iter()
            .filter(|name| !fixed.contains(name))
            .map(|name| {
                let fresh = Value::FreeVariable(fresh_name(&name));
                (name, fresh)
            })
            .collect();

        renaming.apply(self)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

// FRAMES

#[derive(Debug, Clone)]
pub enum ValueFrame<A> {
    FreeVariable(Name),
    Symbol(Name),
    Boolean(bool),
    Number(f64),
    String(Name),
    Data { name: A, parameters: Box<[A]> },
    Record(BTreeMap<Name, A>),
    Function { parameter: A, body: A },
    ImplicitFunction { parameter: A, body: A },
    Application { callee: A, parameter: A },
    Dual { left: A, right: A },
    ReadRecordProperty { record: A, property: Name },
    ReadDataProperty { data: A, index: usize },
    PatternMatch { value: A, arms: Box<[MatchArm<A>]> },
}

impl MappableFrame for ValueFrame<PartiallyApplied> {
    type Frame<X> = ValueFrame<X>;

    fn map_frame<A, B>(
        input: Self::Frame<A>,
        mut f: impl FnMut(A) -> B,
    ) -> Self::Frame<B> {
        match input {
            ValueFrame::FreeVariable(name) => ValueFrame::FreeVariable(name),
            ValueFrame::Symbol(name) => ValueFrame::Symbol(name),
            ValueFrame::Boolean(value) => ValueFrame::Boolean(value),
            ValueFrame::Number(value) => ValueFrame::Number(value),
            ValueFrame::String(value) => ValueFrame::String(value),
            ValueFrame::Data { name, parameters } => ValueFrame::Data {
                name: f(name),
                parameters: parameters.into_iter().map(&mut f).collect(),
            },
            ValueFrame::Record(properties) => ValueFrame::Record(
                properties
                    .into_iter()
                    .map(|(name, value)| (name, f(value)))
                    .collect(),
            ),
            ValueFrame::Function { parameter, body } => ValueFrame::Function {
                parameter: f(parameter),
                body: f(body),
            },
            ValueFrame::ImplicitFunction { parameter, body } => {
                ValueFrame::ImplicitFunction {
                    parameter: f(parameter),
                    body: f(body),
                }
            }
            ValueFrame::Application { callee, parameter } => {
                ValueFrame::Application {
                    callee: f(callee),
                    parameter: f(parameter),
                }
            }
            ValueFrame::Dual { left, right } => ValueFrame::Dual {
                left: f(left),
                right: f(right),
            },
            ValueFrame::ReadRecordProperty { record, property } => {
                ValueFrame::ReadRecordProperty {
                    record: f(record),
                    property,
                }
            }
            ValueFrame::ReadDataProperty { data, index } => {
                ValueFrame::ReadDataProperty {
                    data: f(data),
                    index,
                }
            }
            ValueFrame::PatternMatch { value, arms } => {
                ValueFrame::PatternMatch {
                    value: f(value),
                    arms: arms
                        .into_iter()
                        .map(|MatchArm { test, value }| MatchArm {
                            test: f(test),
                            value: f(value),
                        })
                        .collect(),
                }
            }
        }
    }
}

impl<'a> Collapsible for &'a Value {
    type FrameToken = ValueFrame<PartiallyApplied>;

    fn into_frame(self) -> <Self::FrameToken as MappableFrame>::Frame<Self> {
        match self {
            Value::FreeVariable(name) => ValueFrame::FreeVariable(name.clone()),
            Value::Symbol(name) => ValueFrame::Symbol(name.clone()),
            Value::Boolean(value) => ValueFrame::Boolean(*value),
            Value::Number(value) => ValueFrame::Number(*value),
            Value::String(value) => ValueFrame::String(value.clone()),
            Value::Data { name, parameters } => ValueFrame::Data {
                name,
                parameters: parameters.iter().collect(),
            },
            Value::Record(properties) => ValueFrame::Record(
                properties
                    .iter()
                    .map(|(name, value)| (name.clone(), value))
                    .collect(),
            ),
            Value::Function { parameter, body } => {
                ValueFrame::Function { parameter, body }
            }
            Value::ImplicitFunction { parameter, body } => {
                ValueFrame::ImplicitFunction { parameter, body }
            }
            Value::Application { callee, parameter } => {
                ValueFrame::Application { callee, parameter }
            }
            Value::Dual { left, right } => ValueFrame::Dual { left, right },
            Value::ReadRecordProperty { record, property } => {
                ValueFrame::ReadRecordProperty {
                    record,
                    property: property.clone(),
                }
            }
            Value::ReadDataProperty { data, index } => {
                ValueFrame::ReadDataProperty {
                    data,
                    index: *index,
                }
            }
            Value::PatternMatch { value, arms } => ValueFrame::PatternMatch {
                value,
                arms: arms
                    .iter()
                    .map(|MatchArm { test, value }| MatchArm { test, value })
                    .collect(),
            },
        }
    }
}

impl Expandable for Value {
    type FrameToken = ValueFrame<PartiallyApplied>;

    fn from_frame(
        value: <Self::FrameToken as MappableFrame>::Frame<Self>,
    ) -> Self {
        match value {
            ValueFrame::FreeVariable(name) => Value::FreeVariable(name),
            ValueFrame::Symbol(name) => Value::Symbol(name),
            ValueFrame::Boolean(value) => Value::Boolean(value),
            ValueFrame::Number(value) => Value::Number(value),
            ValueFrame::String(value) => Value::String(value),
            ValueFrame::Data { name, parameters } => Value::Data {
                name: Box::new(name),
                parameters,
            },
            ValueFrame::Record(properties) => Value::Record(properties),
            ValueFrame::Function { parameter, body } => {
                Value::function(parameter, body)
            }
            ValueFrame::ImplicitFunction { parameter, body } => {
                Value::implicit_function(parameter, body)
            }
            ValueFrame::Application { callee, parameter } => {
                Value::application(callee, parameter)
            }
            ValueFrame::Dual { left, right } => Value::Dual {
                left: Box::new(left),
                right: Box::new(right),
            },
            ValueFrame::ReadRecordProperty { record, property } => {
                Value::ReadRecordProperty {
                    record: Box::new(record),
                    property,
                }
            }
            ValueFrame::ReadDataProperty { data, index } => {
                Value::ReadDataProperty {
                    data: Box::new(data),
                    index,
                }
            }
            ValueFrame::PatternMatch { value, arms } => Value::PatternMatch {
                value: Box::new(value),
                arms,
            },
        }
    }
}
