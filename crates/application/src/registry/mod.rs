//! Authoritative in-memory table of node state.
//!
//! Every mutation goes through [`DeviceRegistry::apply`] or
//! [`DeviceRegistry::apply_by_address`]; later writes always win, whether they
//! come from an optimistic command or an inbound frame.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use domain::node::{Node, NodeId, NodeUpdate};
use domain::DomainError;

/// Registry handle shared by the dispatcher, inbound handler and engine
pub type SharedRegistry = Arc<Mutex<DeviceRegistry>>;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    nodes: HashMap<NodeId, Node>,
    by_address: BTreeMap<u8, Vec<NodeId>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from hydrated nodes, rejecting the first invalid one
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Result<Self, DomainError> {
        let mut registry = Self::new();
        for node in nodes {
            registry.insert(node)?;
        }
        Ok(registry)
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Provisions a node.
    ///
    /// Rejects duplicate ids and a `bit_index` already taken on the same address.
    pub fn insert(&mut self, node: Node) -> Result<(), DomainError> {
        node.validate()?;

        if self.nodes.contains_key(&node.id) {
            return Err(DomainError::InvalidConfiguration(format!(
                "Node {} already exists",
                node.id
            )));
        }

        if let Some(bit) = node.bit_index {
            let taken = self
                .get_by_address(node.address)
                .into_iter()
                .any(|sibling| sibling.bit_index == Some(bit));
            if taken {
                return Err(DomainError::InvalidConfiguration(format!(
                    "Bit {} on address {} is already assigned",
                    bit, node.address
                )));
            }
        }

        self.by_address
            .entry(node.address)
            .or_default()
            .push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        if let Some(ids) = self.by_address.get_mut(&node.address) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.by_address.remove(&node.address);
            }
        }
        Some(node)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All nodes mapped onto `address`, in provisioning order
    pub fn get_by_address(&self, address: u8) -> Vec<&Node> {
        self.by_address
            .get(&address)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Merges `update` into one node. Returns `false` when the id is unknown
    /// or the update does not fit the node's kind.
    pub fn apply(&mut self, id: &NodeId, update: &NodeUpdate) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            debug!(node_id = %id, "Update for unknown node ignored");
            return false;
        };

        match node.apply(update) {
            Ok(()) => true,
            Err(e) => {
                warn!(node_id = %id, error = %e, "Rejected node update");
                false
            }
        }
    }

    /// Fans `update` out to every node on `address` whose kind accepts it.
    /// Returns the ids that changed.
    pub fn apply_by_address(&mut self, address: u8, update: &NodeUpdate) -> Vec<NodeId> {
        self.apply_by_address_where(address, update, |_| true)
    }

    /// Like [`apply_by_address`](Self::apply_by_address), restricted to nodes
    /// matching `predicate`.
    pub fn apply_by_address_where<F>(
        &mut self,
        address: u8,
        update: &NodeUpdate,
        predicate: F,
    ) -> Vec<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        let Some(ids) = self.by_address.get(&address) else {
            return Vec::new();
        };

        let mut updated = Vec::new();
        for id in ids {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if !predicate(node) || update.validate_for(node.kind).is_err() {
                continue;
            }
            if node.apply(update).is_ok() {
                updated.push(id.clone());
            }
        }
        updated
    }

    /// Puts a previously captured node state back. Ignored if the node was
    /// removed in the meantime.
    pub fn restore(&mut self, snapshot: Node) {
        if let Some(node) = self.nodes.get_mut(&snapshot.id) {
            if node.address == snapshot.address {
                *node = snapshot;
            }
        }
    }

    /// Shift-register byte on `address`, bit `i` being the `on_state` of the
    /// node with `bit_index == i`.
    pub fn shift_register_byte(&self, address: u8) -> u8 {
        self.get_by_address(address)
            .into_iter()
            .filter(|node| node.on_state)
            .filter_map(|node| node.bit_index)
            .fold(0u8, |byte, bit| byte | (1 << bit))
    }

    /// Writes a full shift-register byte onto the bit nodes of `address`
    pub fn set_shift_register_byte(&mut self, address: u8, byte: u8) -> Vec<NodeId> {
        let Some(ids) = self.by_address.get(&address) else {
            return Vec::new();
        };

        let mut updated = Vec::new();
        for id in ids {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let Some(bit) = node.bit_index else {
                continue;
            };
            if node
                .apply(&NodeUpdate::switch(byte & (1 << bit) != 0))
                .is_ok()
            {
                updated.push(id.clone());
            }
        }
        updated
    }

    /// Nodes whose auto-off timer has expired at `now`
    pub fn due_timers(&self, now: DateTime<Utc>) -> Vec<NodeId> {
        let mut due: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.timer_expired(now))
            .map(|node| node.id.clone())
            .collect();
        due.sort();
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::node::NodeKind;

    fn id(raw: &str) -> NodeId {
        NodeId::new(raw).unwrap()
    }

    fn bank(address: u8) -> DeviceRegistry {
        let nodes = (0..8).map(|bit| {
            Node::new(id(&format!("bank_bit{bit}")), address, NodeKind::BinaryOutput)
                .with_bit_index(bit)
        });
        DeviceRegistry::from_nodes(nodes).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = DeviceRegistry::new();
        registry
            .insert(Node::new(id("relay"), 4, NodeKind::BinaryOutput))
            .unwrap();
        registry
            .insert(Node::new(id("button"), 4, NodeKind::BinaryInput))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&id("relay")).is_some());
        assert_eq!(registry.get_by_address(4).len(), 2);
        assert!(registry.get_by_address(5).is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = DeviceRegistry::new();
        registry
            .insert(Node::new(id("relay"), 4, NodeKind::BinaryOutput))
            .unwrap();
        assert!(
            registry
                .insert(Node::new(id("relay"), 9, NodeKind::BinaryOutput))
                .is_err()
        );
    }

    #[test]
    fn test_duplicate_bit_index_rejected() {
        let mut registry = bank(10);
        let clash = Node::new(id("extra"), 10, NodeKind::BinaryOutput).with_bit_index(3);
        assert!(registry.insert(clash).is_err());

        let elsewhere = Node::new(id("extra"), 11, NodeKind::BinaryOutput).with_bit_index(3);
        assert!(registry.insert(elsewhere).is_ok());
    }

    #[test]
    fn test_apply_unknown_is_noop() {
        let mut registry = DeviceRegistry::new();
        assert!(!registry.apply(&id("ghost"), &NodeUpdate::switch(true)));
    }

    #[test]
    fn test_apply_rejects_wrong_kind() {
        let mut registry = DeviceRegistry::new();
        registry
            .insert(Node::new(id("relay"), 4, NodeKind::BinaryOutput))
            .unwrap();
        assert!(!registry.apply(&id("relay"), &NodeUpdate::humidity(50.0)));
        assert!(registry.apply(&id("relay"), &NodeUpdate::switch(true)));
        assert!(registry.get(&id("relay")).unwrap().on_state);
    }

    #[test]
    fn test_apply_by_address_skips_other_kinds() {
        let mut registry = DeviceRegistry::new();
        registry
            .insert(Node::new(id("relay"), 4, NodeKind::BinaryOutput))
            .unwrap();
        registry
            .insert(Node::new(id("button"), 4, NodeKind::BinaryInput))
            .unwrap();

        let updated = registry.apply_by_address(4, &NodeUpdate::input(true));
        assert_eq!(updated, vec![id("button")]);
        assert!(registry.get(&id("button")).unwrap().input_level);
    }

    #[test]
    fn test_apply_by_address_where_excludes_shift_register_bits() {
        let mut registry = bank(10);
        registry
            .insert(Node::new(id("plain"), 10, NodeKind::BinaryOutput))
            .unwrap();

        let updated = registry.apply_by_address_where(10, &NodeUpdate::switch(true), |node| {
            !node.is_shift_register_bit()
        });

        assert_eq!(updated, vec![id("plain")]);
        assert_eq!(registry.shift_register_byte(10), 0);
    }

    #[test]
    fn test_shift_register_byte_roundtrip() {
        let mut registry = bank(10);
        let updated = registry.set_shift_register_byte(10, 0b1010_0101);
        assert_eq!(updated.len(), 8);
        assert!(registry.get(&id("bank_bit0")).unwrap().on_state);
        assert!(!registry.get(&id("bank_bit1")).unwrap().on_state);
        assert_eq!(registry.shift_register_byte(10), 0b1010_0101);
    }

    #[test]
    fn test_remove_cleans_address_index() {
        let mut registry = DeviceRegistry::new();
        registry
            .insert(Node::new(id("relay"), 4, NodeKind::BinaryOutput))
            .unwrap();
        assert!(registry.remove(&id("relay")).is_some());
        assert!(registry.get_by_address(4).is_empty());
        assert!(registry.remove(&id("relay")).is_none());
    }

    #[test]
    fn test_restore_snapshot() {
        let mut registry = DeviceRegistry::new();
        registry
            .insert(Node::new(id("dimmer"), 5, NodeKind::AnalogOutput))
            .unwrap();
        let snapshot = registry.get(&id("dimmer")).unwrap().clone();

        registry.apply(&id("dimmer"), &NodeUpdate::analog(99));
        registry.restore(snapshot);

        assert_eq!(registry.get(&id("dimmer")).unwrap().analog_value, 0);
    }

    #[test]
    fn test_due_timers() {
        let now = Utc::now();
        let mut registry = DeviceRegistry::new();
        registry
            .insert(Node::new(id("pump"), 6, NodeKind::BinaryOutput).with_auto_off(10))
            .unwrap();
        registry.apply(
            &id("pump"),
            &NodeUpdate::switch(true).with_pending_timer(Some(now)),
        );

        assert_eq!(registry.due_timers(now), vec![id("pump")]);
        assert!(registry.due_timers(now - chrono::Duration::seconds(1)).is_empty());
    }
}
