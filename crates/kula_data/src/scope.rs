//! Scope - the generic object tree
//!
//! Every scope of one object graph lives in a [`ScopeArena`]. A scope is an
//! insertion-ordered list of `(key, Datum)` pairs plus a key index, an
//! optional parent and an optional reflected object. Parent links and
//! table elements are [`ScopeId`]s; the arena owns all nodes.
//!
//! Ids are generational: once a scope is destroyed every id that still
//! refers to it fails with [`Error::StaleScope`] instead of reaching a
//! reused slot.

use core::fmt;
use core::ops::ControlFlow;
use std::collections::HashMap;
use std::sync::Arc;

use kula_core::{Error, Result};
use serde_json::{Map, Number, Value};

use crate::attributed::{Attributed, THIS_KEY};
use crate::datum::Datum;
use crate::signature::SignatureRegistry;
use crate::value::DatumType;

/// Generational handle of a scope
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

impl ScopeId {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// One scope of the tree
#[derive(Default)]
pub(crate) struct ScopeNode {
    pub(crate) entries: Vec<(String, Datum)>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) object: Option<Arc<dyn Attributed>>,
    pub(crate) prescribed: usize,
}

impl ScopeNode {
    pub(crate) fn with_object(object: Arc<dyn Attributed>) -> Self {
        Self {
            object: Some(object),
            ..Self::default()
        }
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Position of `key`, appending an `Unknown` datum if absent
    pub(crate) fn append(&mut self, key: &str) -> usize {
        if let Some(position) = self.position(key) {
            return position;
        }
        self.entries.push((key.to_string(), Datum::new()));
        let position = self.entries.len() - 1;
        self.index.insert(key.to_string(), position);
        position
    }

    /// Ids of owned child scopes, in entry order
    pub(crate) fn owned_children(&self) -> Vec<ScopeId> {
        self.entries
            .iter()
            .filter(|(_, datum)| datum.datum_type() == DatumType::InternalTable)
            .flat_map(|(_, datum)| datum.scope_ids().iter().copied())
            .collect()
    }
}

struct Slot {
    node: Option<ScopeNode>,
    generation: u32,
}

/// Owner of every scope in an object graph
pub struct ScopeArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
    pub(crate) registry: Arc<SignatureRegistry>,
}

impl ScopeArena {
    /// Create an arena without reflected types
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SignatureRegistry::new()))
    }

    /// Create an arena that can instantiate the registry's classes
    pub fn with_registry(registry: Arc<SignatureRegistry>) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            registry,
        }
    }

    /// Signature registry shared by this arena
    pub fn registry(&self) -> &Arc<SignatureRegistry> {
        &self.registry
    }

    /// Number of live scopes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no scope is alive
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `id` refers to a live scope
    pub fn contains(&self, id: ScopeId) -> bool {
        self.node(id).is_ok()
    }

    /// Create a new empty root scope
    pub fn create_scope(&mut self) -> ScopeId {
        self.insert(ScopeNode::default())
    }

    // === Slots ===

    pub(crate) fn insert(&mut self, node: ScopeNode) -> ScopeId {
        self.len += 1;
        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            ScopeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                node: Some(node),
                generation: 0,
            });
            ScopeId::new(index, 0)
        };
        log::trace!("Created scope {}", id);
        id
    }

    pub(crate) fn remove_node(&mut self, id: ScopeId) -> Option<ScopeNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation || slot.node.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.len -= 1;
        log::trace!("Freed scope {}", id);
        slot.node.take()
    }

    pub(crate) fn node(&self, id: ScopeId) -> Result<&ScopeNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(|| Error::StaleScope(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: ScopeId) -> Result<&mut ScopeNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| Error::StaleScope(id.to_string()))
    }

    // === Entries ===

    /// Find or create the datum at `key`
    pub fn append(&mut self, id: ScopeId, key: &str) -> Result<&mut Datum> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("scope keys cannot be empty".into()));
        }
        let node = self.node_mut(id)?;
        let position = node.append(key);
        Ok(&mut node.entries[position].1)
    }

    /// Append a new empty child scope at `key`
    pub fn append_scope(&mut self, id: ScopeId, key: &str) -> Result<ScopeId> {
        self.append_child_node(id, key, ScopeNode::default())
    }

    pub(crate) fn append_child_node(
        &mut self,
        id: ScopeId,
        key: &str,
        mut node: ScopeNode,
    ) -> Result<ScopeId> {
        let ty = self.append(id, key)?.datum_type();
        if ty != DatumType::Unknown && ty != DatumType::InternalTable {
            return Err(Error::type_mismatch(DatumType::InternalTable, ty));
        }
        node.parent = Some(id);
        let child = self.insert(node);
        self.append(id, key)?
            .push_scope_id(DatumType::InternalTable, child)?;
        Ok(child)
    }

    /// Datum at `key`, if present
    pub fn find(&self, id: ScopeId, key: &str) -> Option<&Datum> {
        let node = self.node(id).ok()?;
        node.position(key).map(|p| &node.entries[p].1)
    }

    /// Mutable datum at `key`, if present
    pub fn find_mut(&mut self, id: ScopeId, key: &str) -> Option<&mut Datum> {
        let node = self.node_mut(id).ok()?;
        node.position(key).map(move |p| &mut node.entries[p].1)
    }

    /// Datum at `key`; fails with `KeyNotFound`
    pub fn at(&self, id: ScopeId, key: &str) -> Result<&Datum> {
        let node = self.node(id)?;
        node.position(key)
            .map(|p| &node.entries[p].1)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Mutable datum at `key`; fails with `KeyNotFound`
    pub fn at_mut(&mut self, id: ScopeId, key: &str) -> Result<&mut Datum> {
        let node = self.node_mut(id)?;
        match node.position(key) {
            Some(p) => Ok(&mut node.entries[p].1),
            None => Err(Error::KeyNotFound(key.to_string())),
        }
    }

    /// Datum at insertion position `index`
    pub fn at_index(&self, id: ScopeId, index: usize) -> Result<&Datum> {
        let node = self.node(id)?;
        node.entries
            .get(index)
            .map(|(_, datum)| datum)
            .ok_or(Error::OutOfRange {
                index,
                size: node.entries.len(),
            })
    }

    /// Mutable datum at insertion position `index`
    pub fn at_index_mut(&mut self, id: ScopeId, index: usize) -> Result<&mut Datum> {
        let node = self.node_mut(id)?;
        let size = node.entries.len();
        node.entries
            .get_mut(index)
            .map(|(_, datum)| datum)
            .ok_or(Error::OutOfRange { index, size })
    }

    /// Key at insertion position `index`
    pub fn key_at(&self, id: ScopeId, index: usize) -> Result<&str> {
        let node = self.node(id)?;
        node.entries
            .get(index)
            .map(|(key, _)| key.as_str())
            .ok_or(Error::OutOfRange {
                index,
                size: node.entries.len(),
            })
    }

    /// Insertion position of `key`
    pub fn index_of(&self, id: ScopeId, key: &str) -> Option<usize> {
        self.node(id).ok()?.position(key)
    }

    /// Number of entries
    pub fn size(&self, id: ScopeId) -> Result<usize> {
        Ok(self.node(id)?.entries.len())
    }

    /// Keys in insertion order
    pub fn keys(&self, id: ScopeId) -> Result<impl Iterator<Item = &str> + '_> {
        Ok(self.node(id)?.entries.iter().map(|(key, _)| key.as_str()))
    }

    /// Entries in insertion order
    pub fn entries(&self, id: ScopeId) -> Result<impl Iterator<Item = (&str, &Datum)> + '_> {
        Ok(self
            .node(id)?
            .entries
            .iter()
            .map(|(key, datum)| (key.as_str(), datum)))
    }

    /// Find `key` in this scope or the nearest ancestor that has it
    pub fn search(&self, id: ScopeId, key: &str) -> Option<(ScopeId, &Datum)> {
        let mut current = Some(id);
        while let Some(scope) = current {
            let node = self.node(scope).ok()?;
            if let Some(position) = node.position(key) {
                return Some((scope, &node.entries[position].1));
            }
            current = node.parent;
        }
        None
    }

    // === Tree ===

    /// Parent scope, if attached
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.node(id).ok()?.parent
    }

    /// Locate `child` in its parent: `(parent, datum index, element index)`
    pub fn find_contained_scope(&self, child: ScopeId) -> Option<(ScopeId, usize, usize)> {
        let parent = self.parent(child)?;
        let node = self.node(parent).ok()?;
        node.entries
            .iter()
            .enumerate()
            .filter(|(_, (_, datum))| datum.datum_type() == DatumType::InternalTable)
            .find_map(|(datum_index, (_, datum))| {
                datum
                    .scope_ids()
                    .iter()
                    .position(|id| *id == child)
                    .map(|element| (parent, datum_index, element))
            })
    }

    /// Whether `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor_of(&self, ancestor: ScopeId, id: ScopeId) -> bool {
        let mut current = self.parent(id);
        while let Some(scope) = current {
            if scope == ancestor {
                return true;
            }
            current = self.parent(scope);
        }
        false
    }

    /// Whether `descendant` is a strict descendant of `id`
    pub fn is_descendant_of(&self, descendant: ScopeId, id: ScopeId) -> bool {
        self.is_ancestor_of(id, descendant)
    }

    /// Adopt `child` under `target[key]`, detaching it from any previous parent
    pub fn attach_as_child(&mut self, target: ScopeId, child: ScopeId, key: &str) -> Result<()> {
        self.node(child)?;
        if child == target || self.is_ancestor_of(child, target) {
            return Err(Error::CycleDetected {
                child: child.to_string(),
                target: target.to_string(),
            });
        }
        if let Some(ty) = self.find(target, key).map(Datum::datum_type) {
            if ty != DatumType::Unknown && ty != DatumType::InternalTable {
                return Err(Error::type_mismatch(DatumType::InternalTable, ty));
            }
        }
        self.node(target)?;
        if key.is_empty() {
            return Err(Error::InvalidArgument("scope keys cannot be empty".into()));
        }
        self.detach(child)?;
        self.append(target, key)?
            .push_scope_id(DatumType::InternalTable, child)?;
        self.node_mut(child)?.parent = Some(target);
        Ok(())
    }

    /// Remove `id` from its parent's table; the scope becomes a root
    pub fn detach(&mut self, id: ScopeId) -> Result<()> {
        self.node(id)?;
        if let Some((parent, datum_index, element)) = self.find_contained_scope(id) {
            self.node_mut(parent)?.entries[datum_index]
                .1
                .remove_scope_at(element)?;
        }
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Detach and free `id` together with every owned descendant
    pub fn destroy(&mut self, id: ScopeId) -> Result<()> {
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    fn free_subtree(&mut self, id: ScopeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.remove_node(current) {
                stack.extend(node.owned_children());
            }
        }
    }

    /// Free all children and remove every entry
    ///
    /// A reflected scope is repopulated, so its prescribed attributes
    /// survive with their current native values.
    pub fn clear(&mut self, id: ScopeId) -> Result<()> {
        let children = self.node(id)?.owned_children();
        for child in children {
            self.free_subtree(child);
        }
        let node = self.node_mut(id)?;
        node.entries.clear();
        node.index.clear();
        node.prescribed = 0;
        if node.object.is_some() {
            self.populate(id)?;
        }
        Ok(())
    }

    /// Visit every direct owned child scope
    pub fn for_each_nested_scope<F>(&self, id: ScopeId, mut f: F) -> Result<ControlFlow<()>>
    where
        F: FnMut(&str, ScopeId) -> ControlFlow<()>,
    {
        let node = self.node(id)?;
        for (key, datum) in &node.entries {
            if datum.datum_type() != DatumType::InternalTable {
                continue;
            }
            for child in datum.scope_ids() {
                if f(key, *child).is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Owned child scopes of `id`, in member order
    pub fn nested_scopes(&self, id: ScopeId) -> Result<Vec<ScopeId>> {
        Ok(self.node(id)?.owned_children())
    }

    /// Every owned descendant of `id` in pre-order (excluding `id`)
    pub fn descendants(&self, id: ScopeId) -> Result<Vec<ScopeId>> {
        let mut out = Vec::new();
        let mut stack = self.node(id)?.owned_children();
        stack.reverse();
        while let Some(current) = stack.pop() {
            out.push(current);
            let mut children = self.node(current)?.owned_children();
            children.reverse();
            stack.extend(children);
        }
        Ok(out)
    }

    // === Copies ===

    /// Deep clone `id` into a new root scope
    pub fn clone_scope(&mut self, id: ScopeId) -> Result<ScopeId> {
        let copy = self.clone_subtree(id, None)?;
        log::debug!("Cloned scope {} into {}", id, copy);
        Ok(copy)
    }

    fn clone_subtree(&mut self, id: ScopeId, parent: Option<ScopeId>) -> Result<ScopeId> {
        let node = self.node(id)?;
        let mut entries = Vec::with_capacity(node.entries.len());
        let mut owned = Vec::new();
        for (position, (key, datum)) in node.entries.iter().enumerate() {
            if datum.datum_type() == DatumType::InternalTable {
                entries.push((key.clone(), Datum::with_type(DatumType::InternalTable)));
                owned.push((position, datum.scope_ids().to_vec()));
            } else {
                entries.push((key.clone(), datum.try_clone()?));
            }
        }
        let copy = ScopeNode {
            entries,
            index: node.index.clone(),
            parent,
            object: node.object.as_ref().map(|o| Arc::from(o.clone_boxed())),
            prescribed: node.prescribed,
        };
        let reflected = copy.object.is_some();
        let copy_id = self.insert(copy);

        for (position, children) in owned {
            for child in children {
                let child_copy = self.clone_subtree(child, Some(copy_id))?;
                self.node_mut(copy_id)?.entries[position]
                    .1
                    .push_scope_id(DatumType::InternalTable, child_copy)?;
            }
        }
        if reflected {
            self.update_prescribed_attributes(copy_id)?;
        }
        Ok(copy_id)
    }

    /// Move the contents of `id` into a new scope
    ///
    /// Children are re-parented, the parent's table element is updated in
    /// place and `id` is left as an empty root.
    pub fn transfer(&mut self, id: ScopeId) -> Result<ScopeId> {
        let contained = self.find_contained_scope(id);
        let moved = std::mem::take(self.node_mut(id)?);
        let children = moved.owned_children();
        let reflected = moved.object.is_some();
        let new_id = self.insert(moved);

        for child in children {
            self.node_mut(child)?.parent = Some(new_id);
        }
        if let Some((parent, datum_index, element)) = contained {
            self.node_mut(parent)?.entries[datum_index]
                .1
                .replace_scope_at(element, new_id)?;
        }
        if reflected {
            self.update_prescribed_attributes(new_id)?;
        }
        log::debug!("Transferred scope {} to {}", id, new_id);
        Ok(new_id)
    }

    // === Comparison and rendering ===

    /// Structural equality, ignoring the `this` slot
    pub fn scopes_equal(&self, a: ScopeId, b: ScopeId) -> bool {
        let (Ok(left), Ok(right)) = (self.node(a), self.node(b)) else {
            return false;
        };
        let visible = |node: &ScopeNode| node.entries.iter().filter(|(k, _)| k != THIS_KEY).count();
        if visible(left) != visible(right) {
            return false;
        }
        left.entries
            .iter()
            .filter(|(key, _)| key != THIS_KEY)
            .all(|(key, datum)| {
                let Some(other) = right.position(key).map(|p| &right.entries[p].1) else {
                    return false;
                };
                if datum.datum_type() == DatumType::InternalTable
                    && other.datum_type() == DatumType::InternalTable
                {
                    let (x, y) = (datum.scope_ids(), other.scope_ids());
                    x.len() == y.len() && x.iter().zip(y).all(|(p, q)| self.scopes_equal(*p, *q))
                } else {
                    datum == other
                }
            })
    }

    /// Render a scope as ordered JSON
    pub fn to_json(&self, id: ScopeId) -> Result<Value> {
        let node = self.node(id)?;
        let mut map = Map::new();
        for (key, datum) in &node.entries {
            if key == THIS_KEY {
                continue;
            }
            let mut values = Vec::with_capacity(datum.size());
            for index in 0..datum.size() {
                values.push(self.element_to_json(datum, index)?);
            }
            let value = match values.len() {
                1 => values.remove(0),
                _ => Value::Array(values),
            };
            map.insert(key.clone(), value);
        }
        Ok(Value::Object(map))
    }

    fn element_to_json(&self, datum: &Datum, index: usize) -> Result<Value> {
        Ok(match datum.datum_type() {
            DatumType::Integer => Value::from(datum.get_int(index)?),
            DatumType::Float => datum
                .to_string_at(index)?
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DatumType::InternalTable => self.to_json(datum.get_scope(index)?)?,
            _ => Value::String(datum.to_string_at(index)?),
        })
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeArena")
            .field("scopes", &self.len)
            .field("classes", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_is_idempotent() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();

        arena.append(root, "Health").unwrap().push_back(10).unwrap();
        arena.append(root, "Health").unwrap();
        assert_eq!(arena.size(root).unwrap(), 1);
        assert_eq!(arena.at(root, "Health").unwrap().get_int(0).unwrap(), 10);
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        assert!(matches!(arena.append(root, ""), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_append_scope_requires_table() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        arena.append(root, "Name").unwrap().push_back("orc".to_string()).unwrap();
        assert!(matches!(
            arena.append_scope(root, "Name"),
            Err(Error::TypeMismatch { .. })
        ));

        let a = arena.append_scope(root, "Items").unwrap();
        let b = arena.append_scope(root, "Items").unwrap();
        assert_eq!(arena.at(root, "Items").unwrap().scope_ids(), &[a, b]);
        assert_eq!(arena.parent(b), Some(root));
    }

    #[test]
    fn test_lookup_failures() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        assert!(arena.find(root, "missing").is_none());
        assert!(matches!(arena.at(root, "missing"), Err(Error::KeyNotFound(_))));
        assert!(matches!(
            arena.at_index(root, 0),
            Err(Error::OutOfRange { index: 0, size: 0 })
        ));
    }

    #[test]
    fn test_search_walks_ancestors() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        arena.append(root, "Gravity").unwrap().push_back(9.8f32).unwrap();
        let child = arena.append_scope(root, "Level").unwrap();
        let grandchild = arena.append_scope(child, "Room").unwrap();

        let (owner, datum) = arena.search(grandchild, "Gravity").unwrap();
        assert_eq!(owner, root);
        assert_eq!(datum.get_float(0).unwrap(), 9.8);
        assert!(arena.search(grandchild, "Wind").is_none());
    }

    #[test]
    fn test_cycle_rejected() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        let child = arena.append_scope(root, "A").unwrap();
        let grandchild = arena.append_scope(child, "B").unwrap();

        assert!(matches!(
            arena.attach_as_child(grandchild, root, "Loop"),
            Err(Error::CycleDetected { .. })
        ));
        assert!(matches!(
            arena.attach_as_child(child, child, "Self"),
            Err(Error::CycleDetected { .. })
        ));
        assert_eq!(arena.parent(root), None);
    }

    #[test]
    fn test_attach_reparents() {
        let mut arena = ScopeArena::new();
        let first = arena.create_scope();
        let second = arena.create_scope();
        let child = arena.append_scope(first, "Items").unwrap();

        arena.attach_as_child(second, child, "Moved").unwrap();
        assert_eq!(arena.parent(child), Some(second));
        assert!(arena.at(first, "Items").unwrap().is_empty());
        assert_eq!(arena.find_contained_scope(child), Some((second, 0, 0)));
    }

    #[test]
    fn test_rejected_attach_changes_nothing() {
        let mut arena = ScopeArena::new();
        let first = arena.create_scope();
        let second = arena.create_scope();
        let child = arena.append_scope(first, "Items").unwrap();
        arena.append(second, "Score").unwrap().push_back(5).unwrap();

        assert!(matches!(
            arena.attach_as_child(second, child, "Score"),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            arena.attach_as_child(second, child, ""),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(arena.parent(child), Some(first));
        assert_eq!(arena.keys(second).unwrap().collect::<Vec<_>>(), vec!["Score"]);
        assert_eq!(arena.at(second, "Score").unwrap().get_int(0).unwrap(), 5);
    }

    #[test]
    fn test_detach_removes_one_element() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        let a = arena.append_scope(root, "Items").unwrap();
        let b = arena.append_scope(root, "Items").unwrap();
        let c = arena.append_scope(root, "Items").unwrap();

        arena.detach(b).unwrap();
        assert_eq!(arena.at(root, "Items").unwrap().scope_ids(), &[a, c]);
        assert_eq!(arena.parent(b), None);
        assert!(arena.contains(b));
    }

    #[test]
    fn test_destroy_frees_descendants() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        let child = arena.append_scope(root, "A").unwrap();
        let grandchild = arena.append_scope(child, "B").unwrap();
        assert_eq!(arena.len(), 3);

        arena.destroy(child).unwrap();
        assert_eq!(arena.len(), 1);
        assert!(!arena.contains(grandchild));
        assert!(matches!(arena.size(child), Err(Error::StaleScope(_))));

        let reused = arena.create_scope();
        assert_ne!(reused, child);
        assert!(!arena.contains(child));
    }

    #[test]
    fn test_clone_is_deep() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        arena.append(root, "Name").unwrap().push_back("hero".to_string()).unwrap();
        let bag = arena.append_scope(root, "Bag").unwrap();
        arena.append(bag, "Gold").unwrap().push_back(5).unwrap();

        let copy = arena.clone_scope(root).unwrap();
        assert!(arena.scopes_equal(root, copy));
        assert_eq!(arena.parent(copy), None);

        let bag_copy = arena.at(copy, "Bag").unwrap().get_scope(0).unwrap();
        assert_ne!(bag_copy, bag);
        assert_eq!(arena.parent(bag_copy), Some(copy));

        arena.at_mut(bag_copy, "Gold").unwrap().set(0, 6).unwrap();
        assert_eq!(arena.at(bag, "Gold").unwrap().get_int(0).unwrap(), 5);
        assert!(!arena.scopes_equal(root, copy));
    }

    #[test]
    fn test_transfer_moves_contents() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        let source = arena.append_scope(root, "Items").unwrap();
        arena.append(source, "Count").unwrap().push_back(3).unwrap();
        let nested = arena.append_scope(source, "Inner").unwrap();

        let moved = arena.transfer(source).unwrap();
        assert_eq!(arena.at(root, "Items").unwrap().scope_ids(), &[moved]);
        assert_eq!(arena.parent(moved), Some(root));
        assert_eq!(arena.parent(nested), Some(moved));
        assert_eq!(arena.at(moved, "Count").unwrap().get_int(0).unwrap(), 3);

        assert_eq!(arena.size(source).unwrap(), 0);
        assert_eq!(arena.parent(source), None);
    }

    #[test]
    fn test_nested_scope_visit_stops_early() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        for _ in 0..3 {
            arena.append_scope(root, "Items").unwrap();
        }
        let mut seen = 0;
        let flow = arena
            .for_each_nested_scope(root, |_, _| {
                seen += 1;
                if seen == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert!(flow.is_break());
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_nested_scopes_skip_aliases() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        let a = arena.append_scope(root, "Items").unwrap();
        let b = arena.append_scope(root, "Items").unwrap();
        let c = arena.append_scope(root, "Other").unwrap();
        arena.append(root, "Score").unwrap().push_back(1).unwrap();

        assert_eq!(arena.nested_scopes(root).unwrap(), vec![a, b, c]);
        assert!(arena.nested_scopes(a).unwrap().is_empty());
    }

    #[test]
    fn test_descendants_preorder() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        let a = arena.append_scope(root, "A").unwrap();
        let a1 = arena.append_scope(a, "A1").unwrap();
        let b = arena.append_scope(root, "B").unwrap();
        assert_eq!(arena.descendants(root).unwrap(), vec![a, a1, b]);
    }

    #[test]
    fn test_clear_frees_children() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        let child = arena.append_scope(root, "A").unwrap();
        arena.append(root, "B").unwrap().push_back(1).unwrap();

        arena.clear(root).unwrap();
        assert_eq!(arena.size(root).unwrap(), 0);
        assert!(!arena.contains(child));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_to_json_keeps_order() {
        let mut arena = ScopeArena::new();
        let root = arena.create_scope();
        arena.append(root, "Zeta").unwrap().push_back(1).unwrap();
        arena.append(root, "Alpha").unwrap().push_back(0.5f32).unwrap();
        let child = arena.append_scope(root, "Child").unwrap();
        arena.append(child, "Name").unwrap().push_back("x".to_string()).unwrap();

        let json = arena.to_json(root).unwrap();
        assert_eq!(
            json.to_string(),
            r#"{"Zeta":1,"Alpha":0.5,"Child":{"Name":"x"}}"#
        );
    }
}
