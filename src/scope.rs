//! Persistent lexical scopes.
//!
//! A [`Scope`] is an immutable chain of entries shared through [`Arc`]s.
//! Extending a scope prepends an entry and never touches the parent, so a
//! scope captured by a typed node stays valid for as long as that node lives.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    expr::Node,
    value::{Name, Substitution, Value},
};

#[derive(Debug, Clone)]
pub struct ScopeBinding {
    pub name: Name,
    pub ty: Value,
    /// Whether the free variables of `ty` are instantiated afresh at each
    /// use. Parameters are never generalized.
    pub generalize: bool,
    /// The expression that defined this binding, if there is one.
    pub node: Option<Arc<Node>>,
}

#[derive(Debug)]
enum Entry {
    Binding(ScopeBinding),
    /// The boundary of a function body.
    Frame,
}

#[derive(Debug)]
struct Link {
    entry: Entry,
    parent: Scope,
    /// The nearest scope above this link that starts with a
    /// non-generalized binding.
    enclosing_parameter: Scope,
}

impl Link {
    fn is_parameter(&self) -> bool {
        matches!(&self.entry, Entry::Binding(binding) if !binding.generalize)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scope(Option<Arc<Link>>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: Entry) -> Self {
        let enclosing_parameter = match self.0.as_deref() {
            Some(link) if link.is_parameter() => self.clone(),
            Some(link) => link.enclosing_parameter.clone(),
            None => Scope::new(),
        };

        Self(Some(Arc::new(Link {
            entry,
            parent: self.clone(),
            enclosing_parameter,
        })))
    }

    /// Iterates over every non-generalized binding of the chain, shadowed or
    /// not, without visiting the generalized ones in between.
    fn parameters(&self) -> impl Iterator<Item = &ScopeBinding> {
        let first = match self.0.as_deref() {
            Some(link) if !link.is_parameter() => link.enclosing_parameter.0.as_deref(),
            head => head,
        };

        std::iter::successors(first, |link| link.enclosing_parameter.0.as_deref())
            .filter_map(|link| match &link.entry {
                Entry::Binding(binding) => Some(binding),
                Entry::Frame => None,
            })
    }

    /// Returns a child of `self` in which `binding` shadows any earlier
    /// binding of the same name.
    pub fn bind(&self, binding: ScopeBinding) -> Self {
        self.push(Entry::Binding(binding))
    }

    /// Returns a child of `self` that opens a new frame.
    pub fn enter_frame(&self) -> Self {
        self.push(Entry::Frame)
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        std::iter::successors(self.0.as_deref(), |link| link.parent.0.as_deref())
            .map(|link| &link.entry)
    }

    fn all_bindings(&self) -> impl Iterator<Item = &ScopeBinding> {
        self.entries().filter_map(|entry| match entry {
            Entry::Binding(binding) => Some(binding),
            Entry::Frame => None,
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&ScopeBinding> {
        self.all_bindings().find(|binding| &*binding.name == name)
    }

    /// Like [`Scope::lookup`], but only searches the innermost frame.
    pub fn lookup_in_frame(&self, name: &str) -> Option<&ScopeBinding> {
        self.entries()
            .map_while(|entry| match entry {
                Entry::Binding(binding) => Some(binding),
                Entry::Frame => None,
            })
            .find(|binding| &*binding.name == name)
    }

    /// Iterates over the bindings visible from `self`, innermost first.
    /// Shadowed bindings are skipped.
    pub fn bindings(&self) -> impl Iterator<Item = &ScopeBinding> {
        let mut seen = BTreeSet::new();
        self.all_bindings()
            .filter(move |binding| seen.insert(binding.name.clone()))
    }

    /// The free variables owned by the non-generalized bindings of the chain,
    /// after `replacements` are applied to their types. Shadowed parameters
    /// still count, since their variables may occur in visible types.
    pub fn fixed_variables(&self, replacements: &Substitution) -> BTreeSet<Name> {
        self.parameters()
            .flat_map(|binding| replacements.apply(&binding.ty).free_variables())
            .collect()
    }

    /// Returns the type of `binding` as seen from `self`: `replacements` are
    /// applied, and generalized bindings get fresh names for every variable
    /// not fixed by the scope.
    pub fn instantiate(
        &self,
        binding: &ScopeBinding,
        replacements: &Substitution,
    ) -> Value {
        let ty = replacements.apply(&binding.ty);

        match binding.generalize && !ty.free_variables().is_empty() {
            true => ty.instantiate(&self.fixed_variables(replacements)),
            false => ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Scope, ScopeBinding};
    use crate::value::{Substitution, Value, tests::v};

    fn binding(name: &str, ty: Value, generalize: bool) -> ScopeBinding {
        ScopeBinding {
            name: name.into(),
            ty,
            generalize,
            node: None,
        }
    }

    #[test]
    fn inner_bindings_shadow_outer_ones() {
        let scope = Scope::new()
            .bind(binding("x", v!(num 1), false))
            .enter_frame()
            .bind(binding("x", v!(num 2), false))
            .bind(binding("y", v!(num 3), false));

        assert_eq!(scope.lookup("x").map(|b| &b.ty), Some(&v!(num 2)));
        assert!(scope.lookup("z").is_none());

        let names: Vec<_> = scope.bindings().map(|b| b.name.clone()).collect();
        assert_eq!(names, vec!["y".into(), "x".into()]);
    }

    #[test]
    fn frame_lookup_stops_at_boundaries() {
        let outer = Scope::new().bind(binding("x", v!(num 1), false));
        let inner = outer.enter_frame();

        assert!(outer.lookup_in_frame("x").is_some());
        assert!(inner.lookup_in_frame("x").is_none());
        assert!(inner.lookup("x").is_some());
    }

    #[test]
    fn extending_leaves_the_parent_untouched() {
        let parent = Scope::new();
        let child = parent.bind(binding("x", v!(num 1), false));

        assert!(parent.lookup("x").is_none());
        assert!(child.lookup("x").is_some());
    }

    #[test]
    fn generalized_bindings_are_instantiated_around_fixed_variables() {
        let scope = Scope::new().bind(binding("p", v!(var "b"), false));
        let identity = binding(
            "pair",
            v!(fn v!(var "a") => v!(data "Pair"; v!(var "a"), v!(var "b"))),
            true,
        );

        let ty = scope.instantiate(&identity, &Substitution::new());
        let free = ty.free_variables();

        assert!(free.contains("b"));
        assert!(!free.contains("a"));
        assert_eq!(free.len(), 2);
    }

    #[test]
    fn fixed_variables_skip_generalized_bindings() {
        let scope = Scope::new()
            .bind(binding("p", v!(var "a"), false))
            .bind(binding("f", v!(var "g"), true))
            .enter_frame()
            .bind(binding("q", v!(var "b"), false))
            .bind(binding("h", v!(var "k"), true))
            .bind(binding("p", v!(num 1), false));

        let mut replacements = Substitution::new();
        replacements.insert("b".into(), v!(var "c"));

        let fixed: Vec<_> = scope
            .fixed_variables(&replacements)
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(fixed, vec!["a", "c"]);
    }
}
