use std::fmt;

use super::NodeKey;

/// Change notifications a layout node emits after re-resolving a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutEvent {
    SizeChanged,
    PositionChanged,
    WorldMatrixChanged,
}

/// Handle returned by [`LayoutTree::subscribe`](super::LayoutTree::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

pub(crate) enum Observer {
    /// A parent listening to one of its children.
    Parent(NodeKey),
    /// A child listening to its parent.
    Child(NodeKey),
    Callback {
        id: SubscriptionId,
        callback: Box<dyn FnMut(NodeKey)>,
    },
}

impl Observer {
    fn links(&self, key: NodeKey) -> bool {
        matches!(self, Observer::Parent(k) | Observer::Child(k) if *k == key)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observer::Parent(key) => f.debug_tuple("Parent").field(key).finish(),
            Observer::Child(key) => f.debug_tuple("Child").field(key).finish(),
            Observer::Callback { id, .. } => f.debug_tuple("Callback").field(id).finish(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ObserverLists {
    size: Vec<Observer>,
    position: Vec<Observer>,
    world: Vec<Observer>,
}

impl ObserverLists {
    pub(crate) fn list(&self, event: LayoutEvent) -> &Vec<Observer> {
        match event {
            LayoutEvent::SizeChanged => &self.size,
            LayoutEvent::PositionChanged => &self.position,
            LayoutEvent::WorldMatrixChanged => &self.world,
        }
    }

    pub(crate) fn list_mut(&mut self, event: LayoutEvent) -> &mut Vec<Observer> {
        match event {
            LayoutEvent::SizeChanged => &mut self.size,
            LayoutEvent::PositionChanged => &mut self.position,
            LayoutEvent::WorldMatrixChanged => &mut self.world,
        }
    }

    /// Drops every parent/child link pointing at `key`.
    pub(crate) fn remove_links(&mut self, key: NodeKey) {
        for list in [&mut self.size, &mut self.position, &mut self.world] {
            list.retain(|observer| !observer.links(key));
        }
    }

    pub(crate) fn remove_subscription(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for list in [&mut self.size, &mut self.position, &mut self.world] {
            let before = list.len();
            list.retain(|observer| !matches!(observer, Observer::Callback { id: other, .. } if *other == id));
            removed |= list.len() != before;
        }
        removed
    }

    pub(crate) fn link_count(&self) -> usize {
        [&self.size, &self.position, &self.world]
            .iter()
            .flat_map(|list| list.iter())
            .filter(|observer| !matches!(observer, Observer::Callback { .. }))
            .count()
    }
}
