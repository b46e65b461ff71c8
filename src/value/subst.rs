//! Substitutions of free variables.

use std::collections::BTreeMap;

use recursion::{CollapsibleExt, Expandable};

use super::{Name, Value, ValueFrame};

/// A mapping from free variable names to the values replacing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution(BTreeMap<Name, Value>);

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: Name, value: Value) -> Option<Value> {
        self.0.insert(name, value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.0.iter()
    }

    /// Applies `self` to `value` until no substituted variable remains.
    ///
    /// A variable that is met again while its own replacement is being
    /// expanded is left in place, so cyclic substitutions terminate.
    pub fn apply(&self, value: &Value) -> Value {
        if self.is_empty() {
            return value.clone();
        }

        self.apply_guarded(value, &mut Vec::new())
    }

    fn apply_guarded(&self, value: &Value, expanding: &mut Vec<Name>) -> Value {
        value.collapse_frames(|frame| match frame {
            ValueFrame::FreeVariable(name) => match self.0.get(&name) {
                Some(replacement) if !expanding.contains(&name) => {
                    expanding.push(name);
                    let value = self.apply_guarded(replacement, expanding);
                    expanding.pop();
                    value
                }
                _ => Value::FreeVariable(name),
            },
            frame => simplify(frame),
        })
    }
}

/// Rebuilds a value from `frame`, reducing duals and projections whose
/// children became concrete.
fn simplify(frame: ValueFrame<Value>) -> Value {
    match frame {
        ValueFrame::Dual { left, right } => Value::dual(left, right),
        ValueFrame::ReadRecordProperty { record, property } => {
            Value::read_record_property(record, property)
        }
        ValueFrame::ReadDataProperty { data, index } => {
            Value::read_data_property(data, index)
        }
        frame => Value::from_frame(frame),
    }
}

impl FromIterator<(Name, Value)> for Substitution {
    fn from_iter<T: IntoIterator<Item = (Name, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(Name, Value)> for Substitution {
    fn extend<T: IntoIterator<Item = (Name, Value)>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}
