// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::expression::{Expr, Expression};

use log_derive::logfn_inputs;
use mirai_annotations::*;
use rpds::{HashTrieMap, HashTrieSet};
use std::rc::Rc;

/// Remembers, for the current path, the auxiliary symbol that holds the value of each
/// dereference that has already been resolved. Keys are dereferences whose pointer operand has
/// been renamed to level 2, so a pointer that has since been reassigned cannot produce a hit.
///
/// Every entry records the root objects (level 1 object keys) that its key and its value
/// mention. A write to any of those objects evicts the entry, as does the eviction of another
/// entry whose auxiliary symbol it mentions.
///
/// All maps are persistent, so cloning a path state gives each fork its own cache at the cost
/// of a few reference count increments.
#[derive(Clone, Debug, Default)]
pub struct SubexpressionCache {
    entries: HashTrieMap<Rc<Expr>, CacheEntry>,
    // object key -> keys of the entries that touch the object
    touched_by: HashTrieMap<Rc<str>, HashTrieSet<Rc<Expr>>>,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    symbol: Rc<Expr>,
    touched: HashTrieSet<Rc<str>>,
}

impl SubexpressionCache {
    pub fn lookup(&self, key: &Rc<Expr>) -> Option<Rc<Expr>> {
        self.entries.get(key).map(|entry| entry.symbol.clone())
    }

    /// Associates the auxiliary symbol with the dereference key. Touched is the set of object
    /// keys that the key and the value of the symbol depend on.
    #[logfn_inputs(TRACE)]
    pub fn add(&mut self, key: Rc<Expr>, symbol: Rc<Expr>, touched: Vec<Rc<str>>) {
        precondition!(matches!(key.expression, Expression::Dereference { .. }));
        precondition!(matches!(symbol.expression, Expression::Symbol(..)));
        if self.entries.contains_key(&key) {
            self.remove_entry(&key);
        }
        let mut touched_set = HashTrieSet::new();
        for object in touched {
            let mut keys = self
                .touched_by
                .get(&object)
                .cloned()
                .unwrap_or_default();
            keys.insert_mut(key.clone());
            self.touched_by.insert_mut(object.clone(), keys);
            touched_set.insert_mut(object);
        }
        self.entries.insert_mut(
            key,
            CacheEntry {
                symbol,
                touched: touched_set,
            },
        );
    }

    /// Evicts every entry that touches the given object, and then every entry that touches the
    /// auxiliary symbol of an evicted entry. Returns the number of evicted entries.
    #[logfn_inputs(TRACE)]
    pub fn invalidate(&mut self, object: &Rc<str>) -> usize {
        let mut evicted = 0;
        let mut worklist = vec![object.clone()];
        while let Some(object) = worklist.pop() {
            let keys = match self.touched_by.get(&object) {
                Some(keys) => keys.clone(),
                None => continue,
            };
            for key in keys.iter() {
                if let Some(symbol) = self.remove_entry(key) {
                    debug!("evicting {:?} = {:?} after a write to {}", symbol, key, object);
                    if let Expression::Symbol(aux) = &symbol.expression {
                        worklist.push(aux.object_key());
                    }
                    evicted += 1;
                }
            }
            self.touched_by.remove_mut(&object);
        }
        evicted
    }

    fn remove_entry(&mut self, key: &Rc<Expr>) -> Option<Rc<Expr>> {
        let entry = self.entries.get(key)?.clone();
        self.entries.remove_mut(key);
        for object in entry.touched.iter() {
            if let Some(keys) = self.touched_by.get(object) {
                let keys = keys.remove(key);
                if keys.is_empty() {
                    self.touched_by.remove_mut(object);
                } else {
                    self.touched_by.insert_mut(object.clone(), keys);
                }
            }
        }
        Some(entry.symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.size()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if some entry depends on the given object.
    pub fn touches(&self, object: &str) -> bool {
        self.touched_by.contains_key(object)
    }
}
