//! A tiny diffable document for exercising the stores.

use crate::{CloneError, Diff, DiffRecord, Diffable, PlainData};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item {
    pub id: u32,
    pub value: f64,
}

impl Item {
    pub fn new(id: u32, value: impl Into<f64>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

impl PlainData for Item {
    fn check_plain(&self) -> Result<(), CloneError> {
        CloneError::check_finite(format!("item {}", self.id), self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub items: Vec<Item>,
}

impl Board {
    pub fn with(&self, item: Item) -> Self {
        let mut next = self.clone();
        next.items.push(item);
        next
    }

    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn get(&self, id: u32) -> Option<Item> {
        self.items.iter().copied().find(|item| item.id == id)
    }

    /// Appends an item and returns the new board with its diff.
    pub fn add(&self, id: u32, value: impl Into<f64>) -> (Self, Diff<Self>) {
        let item = Item::new(id, value);
        (self.with(item), DiffRecord::add(id, item))
    }

    /// Overwrites an item's value and returns the new board with its diff.
    pub fn set(&self, id: u32, value: impl Into<f64>) -> (Self, Diff<Self>) {
        let before = self.get(id).unwrap();
        let after = Item::new(id, value);
        let mut next = self.clone();
        next.replace(after);
        (next, DiffRecord::update(id, before, after))
    }

    /// Removes an item and returns the new board with its diff.
    pub fn remove(&self, id: u32) -> (Self, Diff<Self>) {
        let index = self.index_of(id).unwrap();
        let mut next = self.clone();
        let before = next.items.remove(index);
        let diff = DiffRecord {
            position: Some(index),
            ..DiffRecord::delete(id, before)
        };
        (next, diff)
    }

    fn replace(&mut self, item: Item) {
        if let Some(slot) = self.items.iter_mut().find(|i| i.id == item.id) {
            *slot = item;
        }
    }

    fn insert_at(&mut self, index: Option<usize>, item: Item) {
        let index = index.unwrap_or(self.items.len()).min(self.items.len());
        self.items.insert(index, item);
    }

    fn move_to(&mut self, id: u32, index: Option<usize>) {
        if let (Some(from), Some(to)) = (self.index_of(id), index) {
            let item = self.items.remove(from);
            let to = to.min(self.items.len());
            self.items.insert(to, item);
        }
    }
}

impl PlainData for Board {
    fn check_plain(&self) -> Result<(), CloneError> {
        self.items.check_plain()
    }
}

impl Diffable for Board {
    type Key = u32;
    type Entity = Item;

    fn apply(&self, diff: &Diff<Self>) -> Self {
        let mut next = self.clone();
        match diff.kind {
            crate::DiffKind::Add => {
                if let Some(item) = diff.after {
                    next.insert_at(diff.position, item);
                }
            }
            crate::DiffKind::Update => {
                if let Some(item) = diff.after {
                    next.replace(item);
                }
            }
            crate::DiffKind::Delete => next.items.retain(|i| i.id != diff.entity_id),
            crate::DiffKind::Move => next.move_to(diff.entity_id, diff.position),
        }
        next
    }

    fn revert(&self, diff: &Diff<Self>) -> Self {
        let mut next = self.clone();
        match diff.kind {
            crate::DiffKind::Add => next.items.retain(|i| i.id != diff.entity_id),
            crate::DiffKind::Update => {
                if let Some(item) = diff.before {
                    next.replace(item);
                }
            }
            crate::DiffKind::Delete => {
                if let Some(item) = diff.before {
                    next.insert_at(diff.position, item);
                }
            }
            crate::DiffKind::Move => next.move_to(diff.entity_id, diff.prior_position),
        }
        next
    }
}
