// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::signals::SignalRef;
use crate::Timescale;
use std::num::NonZeroU32;
use std::ops::Index;

/// Uniquely identifies a variable in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct VarRef(NonZeroU32);

impl VarRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(VarRef)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Uniquely identifies a scope in the hierarchy.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct ScopeRef(NonZeroU32);

impl ScopeRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

pub const SCOPE_SEPARATOR: char = '.';

/// A leaf of the scope tree. Binds a local name to the signal that carries its values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Var {
    name: String,
    kind: String,
    width: u32,
    signal: SignalRef,
    parent: Option<ScopeRef>,
    next: Option<ScopeOrVarRef>,
}

impl Var {
    /// Local name of the variable.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full hierarchical name of the variable, i.e., the signal reference.
    pub fn full_name(&self, hierarchy: &Hierarchy) -> String {
        match self.parent {
            None => self.name.clone(),
            Some(parent) => {
                let mut out = hierarchy[parent].full_name(hierarchy);
                out.push(SCOPE_SEPARATOR);
                out.push_str(&self.name);
                out
            }
        }
    }

    /// Declared kind, e.g. `wire` or `reg`. Preserved, not interpreted.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Declared bit width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The signal in the store that carries this variable's changes. Aliases share one.
    pub fn signal_ref(&self) -> SignalRef {
        self.signal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum ScopeOrVarRef {
    Scope(ScopeRef),
    Var(VarRef),
}

#[derive(Debug, Clone, Copy)]
pub enum ScopeOrVar<'a> {
    Scope(&'a Scope),
    Var(&'a Var),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Scope {
    name: String,
    kind: String,
    child: Option<ScopeOrVarRef>,
    parent: Option<ScopeRef>,
    next: Option<ScopeOrVarRef>,
}

impl Scope {
    /// Local name of the scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared scope kind, e.g. `module` or `begin`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Full hierarchical name of the scope.
    pub fn full_name(&self, hierarchy: &Hierarchy) -> String {
        let mut parents = Vec::new();
        let mut parent = self.parent;
        while let Some(id) = parent {
            parents.push(id);
            parent = hierarchy[id].parent;
        }
        let mut out: String = String::with_capacity((parents.len() + 1) * 5);
        for parent_id in parents.iter().rev() {
            out.push_str(hierarchy[*parent_id].name());
            out.push(SCOPE_SEPARATOR)
        }
        out.push_str(self.name());
        out
    }

    pub fn items<'a>(
        &'a self,
        hierarchy: &'a Hierarchy,
    ) -> impl Iterator<Item = ScopeOrVarRef> + 'a {
        HierarchyItemIdIterator::new(hierarchy, self.child)
    }

    pub fn vars<'a>(&'a self, hierarchy: &'a Hierarchy) -> impl Iterator<Item = VarRef> + 'a {
        to_var_ref_iterator(HierarchyItemIdIterator::new(hierarchy, self.child))
    }

    pub fn scopes<'a>(&'a self, hierarchy: &'a Hierarchy) -> impl Iterator<Item = ScopeRef> + 'a {
        to_scope_ref_iterator(HierarchyItemIdIterator::new(hierarchy, self.child))
    }
}

struct HierarchyItemIdIterator<'a> {
    hierarchy: &'a Hierarchy,
    item: Option<ScopeOrVarRef>,
    is_first: bool,
}

impl<'a> HierarchyItemIdIterator<'a> {
    fn new(hierarchy: &'a Hierarchy, item: Option<ScopeOrVarRef>) -> Self {
        Self {
            hierarchy,
            item,
            is_first: true,
        }
    }

    fn get_next(&self, item: ScopeOrVarRef) -> Option<ScopeOrVarRef> {
        match self.hierarchy.get_item(item) {
            ScopeOrVar::Scope(scope) => scope.next,
            ScopeOrVar::Var(var) => var.next,
        }
    }
}

impl Iterator for HierarchyItemIdIterator<'_> {
    type Item = ScopeOrVarRef;

    fn next(&mut self) -> Option<Self::Item> {
        match self.item {
            None => None, // this iterator is done!
            Some(item) => {
                if self.is_first {
                    self.is_first = false;
                    Some(item)
                } else {
                    self.item = self.get_next(item);
                    self.item
                }
            }
        }
    }
}

fn to_var_ref_iterator(iter: impl Iterator<Item = ScopeOrVarRef>) -> impl Iterator<Item = VarRef> {
    iter.flat_map(|i| match i {
        ScopeOrVarRef::Scope(_) => None,
        ScopeOrVarRef::Var(v) => Some(v),
    })
}

fn to_scope_ref_iterator(
    iter: impl Iterator<Item = ScopeOrVarRef>,
) -> impl Iterator<Item = ScopeRef> {
    iter.flat_map(|i| match i {
        ScopeOrVarRef::Scope(s) => Some(s),
        ScopeOrVarRef::Var(_) => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
struct HierarchyMetaData {
    timescale: Option<Timescale>,
    date: String,
    version: String,
    comments: Vec<String>,
}

/// The scope tree of a decoded trace. Read-only once decoding finished.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Hierarchy {
    vars: Vec<Var>,
    scopes: Vec<Scope>,
    first_item: Option<ScopeOrVarRef>,
    meta: HierarchyMetaData,
}

// public implementation
impl Hierarchy {
    /// Returns an iterator over references to all top-level scopes and variables.
    pub fn items(&self) -> impl Iterator<Item = ScopeOrVarRef> + '_ {
        HierarchyItemIdIterator::new(self, self.first_item)
    }

    /// Returns an iterator over references to all top-level scopes.
    pub fn scopes(&self) -> impl Iterator<Item = ScopeRef> + '_ {
        to_scope_ref_iterator(HierarchyItemIdIterator::new(self, self.first_item))
    }

    /// Returns an iterator over references to all top-level variables.
    pub fn vars(&self) -> impl Iterator<Item = VarRef> + '_ {
        to_var_ref_iterator(HierarchyItemIdIterator::new(self, self.first_item))
    }

    /// Returns the first scope that was declared in the underlying file.
    pub fn first_scope(&self) -> Option<&Scope> {
        self.scopes.first()
    }

    pub fn date(&self) -> &str {
        &self.meta.date
    }
    pub fn version(&self) -> &str {
        &self.meta.version
    }
    pub fn comments(&self) -> &[String] {
        &self.meta.comments
    }
    pub fn timescale(&self) -> Option<Timescale> {
        self.meta.timescale
    }

    /// The instance paths (full names of the scopes that directly contain a variable) in
    /// depth-first tree order.
    pub fn instances(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut todo: Vec<ScopeOrVarRef> = self.items().collect();
        todo.reverse();
        while let Some(item) = todo.pop() {
            let ScopeOrVarRef::Scope(scope) = item else {
                continue;
            };
            let children: Vec<ScopeOrVarRef> = self[scope].items(self).collect();
            if children.iter().any(|c| matches!(c, ScopeOrVarRef::Var(_))) {
                out.push(self[scope].full_name(self));
            }
            todo.extend(children.into_iter().rev());
        }
        out
    }

    pub fn lookup_scope<N: AsRef<str>>(&self, names: &[N]) -> Option<ScopeRef> {
        let prefix = names.first()?.as_ref();
        let mut scope = self.scopes().find(|s| self[*s].name() == prefix)?;
        for name in names.iter().skip(1) {
            scope = self[scope]
                .scopes(self)
                .find(|s| self[*s].name() == name.as_ref())?;
        }
        Some(scope)
    }

    pub fn lookup_var<N: AsRef<str>>(&self, path: &[N], name: &N) -> Option<VarRef> {
        match path {
            [] => self.vars().find(|v| self[*v].name() == name.as_ref()),
            scopes => {
                let scope = &self[self.lookup_scope(scopes)?];
                scope
                    .vars(self)
                    .find(|v| self[*v].name() == name.as_ref())
            }
        }
    }
}

// private implementation
impl Hierarchy {
    fn get_item(&self, id: ScopeOrVarRef) -> ScopeOrVar<'_> {
        match id {
            ScopeOrVarRef::Scope(id) => ScopeOrVar::Scope(&self[id]),
            ScopeOrVarRef::Var(id) => ScopeOrVar::Var(&self[id]),
        }
    }
}

impl Index<VarRef> for Hierarchy {
    type Output = Var;

    fn index(&self, index: VarRef) -> &Self::Output {
        &self.vars[index.index()]
    }
}

impl Index<ScopeRef> for Hierarchy {
    type Output = Scope;

    fn index(&self, index: ScopeRef) -> &Self::Output {
        &self.scopes[index.index()]
    }
}

struct ScopeStackEntry {
    scope_id: usize,
    last_child: Option<ScopeOrVarRef>,
}

pub struct HierarchyBuilder {
    vars: Vec<Var>,
    scopes: Vec<Scope>,
    first_item: Option<ScopeOrVarRef>,
    scope_stack: Vec<ScopeStackEntry>,
    meta: HierarchyMetaData,
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        // we start with a fake entry in the scope stack to keep track of multiple items in the top scope
        let scope_stack = vec![ScopeStackEntry {
            scope_id: usize::MAX,
            last_child: None,
        }];
        HierarchyBuilder {
            vars: Vec::default(),
            scopes: Vec::default(),
            first_item: None,
            scope_stack,
            meta: HierarchyMetaData::default(),
        }
    }
}

impl HierarchyBuilder {
    pub fn finish(mut self) -> Hierarchy {
        self.vars.shrink_to_fit();
        self.scopes.shrink_to_fit();
        Hierarchy {
            vars: self.vars,
            scopes: self.scopes,
            first_item: self.first_item,
            meta: self.meta,
        }
    }

    /// Dot-joined names of all currently open scopes.
    pub fn current_path(&self) -> String {
        let mut out = String::new();
        for entry in self.scope_stack.iter().skip(1) {
            if !out.is_empty() {
                out.push(SCOPE_SEPARATOR);
            }
            out.push_str(&self.scopes[entry.scope_id].name);
        }
        out
    }

    /// adds a variable or scope to the hierarchy tree
    fn add_to_hierarchy_tree(&mut self, node_id: ScopeOrVarRef) -> Option<ScopeRef> {
        // the fake top entry is never popped
        let entry_pos = self.scope_stack.len() - 1;
        let entry = &mut self.scope_stack[entry_pos];
        let parent = entry.scope_id;
        let fake_top_scope_parent = parent == usize::MAX;
        match entry.last_child {
            Some(ScopeOrVarRef::Var(child)) => {
                // add pointer to new node from last child
                debug_assert!(self.vars[child.index()].next.is_none());
                self.vars[child.index()].next = Some(node_id);
            }
            Some(ScopeOrVarRef::Scope(child)) => {
                // add pointer to new node from last child
                debug_assert!(self.scopes[child.index()].next.is_none());
                self.scopes[child.index()].next = Some(node_id);
            }
            None => {
                if !fake_top_scope_parent {
                    // otherwise we need to add a pointer from the parent
                    debug_assert!(self.scopes[parent].child.is_none());
                    self.scopes[parent].child = Some(node_id);
                }
            }
        }
        // the new node is now the last child
        entry.last_child = Some(node_id);
        // return the parent id if we had a real parent and we aren't at the top scope
        if fake_top_scope_parent {
            None
        } else {
            ScopeRef::from_index(parent)
        }
    }

    /// Checks to see if a scope of the same name already exists.
    fn find_duplicate_scope(&self, name: &str) -> Option<ScopeRef> {
        let parent = self.scope_stack.last()?;
        let mut maybe_item = if parent.scope_id == usize::MAX {
            // we are on the top
            self.first_item
        } else {
            self.scopes[parent.scope_id].child
        };

        while let Some(item) = maybe_item {
            if let ScopeOrVarRef::Scope(other) = item {
                if self.scopes[other.index()].name == name {
                    return Some(other);
                }
            }
            maybe_item = self.get_next(item);
        }
        None
    }

    fn get_next(&self, item: ScopeOrVarRef) -> Option<ScopeOrVarRef> {
        match item {
            ScopeOrVarRef::Scope(scope_ref) => self.scopes[scope_ref.index()].next,
            ScopeOrVarRef::Var(var_ref) => self.vars[var_ref.index()].next,
        }
    }

    fn find_last_child(&self, scope: ScopeRef) -> Option<ScopeOrVarRef> {
        let mut child = self.scopes[scope.index()].child?;
        while let Some(next) = self.get_next(child) {
            child = next;
        }
        Some(child)
    }

    /// Opens a scope. A scope that re-opens an existing sibling of the same name is merged into it.
    pub fn add_scope(&mut self, name: String, kind: String) {
        if let Some(duplicate) = self.find_duplicate_scope(&name) {
            let last_child = self.find_last_child(duplicate);
            self.scope_stack.push(ScopeStackEntry {
                scope_id: duplicate.index(),
                last_child,
            });
            return;
        }
        let node_id = self.scopes.len();
        let Some(scope_ref) = ScopeRef::from_index(node_id) else {
            return;
        };
        let wrapped_id = ScopeOrVarRef::Scope(scope_ref);
        if self.first_item.is_none() {
            self.first_item = Some(wrapped_id);
        }
        let parent = self.add_to_hierarchy_tree(wrapped_id);

        // new active scope
        self.scope_stack.push(ScopeStackEntry {
            scope_id: node_id,
            last_child: None,
        });

        self.scopes.push(Scope {
            parent,
            child: None,
            next: None,
            name,
            kind,
        });
    }

    /// Adds a leaf under the currently open scope.
    pub fn add_var(&mut self, name: String, kind: String, width: u32, signal: SignalRef) {
        let node_id = self.vars.len();
        let Some(var_id) = VarRef::from_index(node_id) else {
            return;
        };
        let wrapped_id = ScopeOrVarRef::Var(var_id);
        if self.first_item.is_none() {
            self.first_item = Some(wrapped_id);
        }
        let parent = self.add_to_hierarchy_tree(wrapped_id);
        self.vars.push(Var {
            parent,
            name,
            kind,
            width,
            signal,
            next: None,
        });
    }

    /// Closes the innermost scope. Returns `false` if no scope was open.
    pub fn pop_scope(&mut self) -> bool {
        if self.scope_stack.len() > 1 {
            self.scope_stack.pop();
            true
        } else {
            false
        }
    }

    pub fn set_date(&mut self, value: String) {
        self.meta.date = value;
    }

    pub fn set_version(&mut self, value: String) {
        self.meta.version = value;
    }

    pub fn set_timescale(&mut self, value: Timescale) {
        self.meta.timescale = Some(value);
    }

    pub fn add_comment(&mut self, comment: String) {
        self.meta.comments.push(comment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(ii: usize) -> SignalRef {
        SignalRef::from_index(ii).unwrap()
    }

    #[test]
    fn test_sizes() {
        // NonZero fields allow for zero cost optioning
        assert_eq!(
            std::mem::size_of::<ScopeRef>(),
            std::mem::size_of::<Option<ScopeRef>>()
        );
        assert_eq!(std::mem::size_of::<ScopeOrVarRef>(), 8);
    }

    #[test]
    fn test_build_and_lookup() {
        let mut h = HierarchyBuilder::default();
        h.add_scope("top".to_string(), "module".to_string());
        h.add_var("clk".to_string(), "wire".to_string(), 1, sig(0));
        h.add_scope("cpu".to_string(), "module".to_string());
        assert_eq!(h.current_path(), "top.cpu");
        h.add_var("pc[7:0]".to_string(), "reg".to_string(), 8, sig(1));
        assert!(h.pop_scope());
        assert!(h.pop_scope());
        assert!(!h.pop_scope());
        let h = h.finish();

        let top = h.first_scope().unwrap();
        assert_eq!(top.name(), "top");
        let cpu = &h[top.scopes(&h).next().unwrap()];
        assert_eq!(cpu.full_name(&h), "top.cpu");
        let pc = &h[h.lookup_var(&["top", "cpu"], &"pc[7:0]").unwrap()];
        assert_eq!(pc.full_name(&h), "top.cpu.pc[7:0]");
        assert_eq!(pc.width(), 8);
        assert_eq!(pc.kind(), "reg");
        assert_eq!(h.instances(), ["top", "top.cpu"]);
    }

    #[test]
    fn test_scope_merging() {
        let mut h = HierarchyBuilder::default();
        h.add_scope("tb".to_string(), "module".to_string());
        h.add_var("a".to_string(), "wire".to_string(), 1, sig(0));
        h.pop_scope();
        h.add_scope("tb".to_string(), "module".to_string());
        h.add_var("b".to_string(), "wire".to_string(), 1, sig(1));
        h.pop_scope();
        let h = h.finish();
        let top_scopes = h.scopes().map(|s| h[s].full_name(&h)).collect::<Vec<_>>();
        assert_eq!(top_scopes, ["tb"]);
        let tb = &h[h.lookup_scope(&["tb"]).unwrap()];
        let names = tb.vars(&h).map(|v| h[v].name().to_string()).collect::<Vec<_>>();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_instances_in_tree_order() {
        let mut h = HierarchyBuilder::default();
        h.add_scope("top".to_string(), "module".to_string());
        h.add_scope("wrapper".to_string(), "module".to_string());
        h.add_scope("core".to_string(), "module".to_string());
        h.add_var("a".to_string(), "wire".to_string(), 1, sig(0));
        h.pop_scope();
        h.pop_scope();
        // declared after the nested scope
        h.add_var("clk".to_string(), "wire".to_string(), 1, sig(1));
        h.pop_scope();
        let h = h.finish();
        // `top.wrapper` holds no variable of its own
        assert_eq!(h.instances(), ["top", "top.wrapper.core"]);
        let top = h.items().collect::<Vec<_>>();
        assert_eq!(top.len(), 1);
        let clk = h.lookup_var(&["top"], &"clk").unwrap();
        assert_eq!(h[clk].signal_ref(), sig(1));
    }
}
