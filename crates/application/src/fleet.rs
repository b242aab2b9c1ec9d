use tracing::info;

use domain::automation::RuleId;
use domain::node::{Node, NodeId};
use domain::{DomainError, DomainEvent};

use crate::automation::SharedRuleBook;
use crate::event_bus::EventBus;
use crate::registry::SharedRegistry;

/// Node lifecycle across the registry and the rule book
#[derive(Clone)]
pub struct Fleet {
    registry: SharedRegistry,
    rules: SharedRuleBook,
    events: EventBus,
}

/// What a node removal took with it
#[derive(Debug)]
pub struct Removal {
    pub node: Node,
    pub removed_rules: Vec<RuleId>,
}

impl Fleet {
    pub fn new(registry: SharedRegistry, rules: SharedRuleBook, events: EventBus) -> Self {
        Self {
            registry,
            rules,
            events,
        }
    }

    pub fn provision(&self, node: Node) -> Result<(), DomainError> {
        let id = node.id.clone();
        info!(node_id = %id, address = node.address, kind = node.kind.as_str(), "➕ Provisioning node");
        self.registry.lock().insert(node)?;
        self.events.publish(DomainEvent::node_updated(id));
        Ok(())
    }

    /// Removes a node and every rule that depends on it. Input rules on the
    /// node's address go only when it was the last binary input there.
    pub fn remove_node(&self, id: &NodeId) -> Result<Removal, DomainError> {
        let mut rules = self.rules.lock();
        let mut registry = self.registry.lock();

        let node = registry
            .remove(id)
            .ok_or_else(|| DomainError::NodeNotFound(id.to_string()))?;

        let orphaned_input = node.kind.is_input()
            && !registry
                .get_by_address(node.address)
                .into_iter()
                .any(|other| other.kind.is_input());
        drop(registry);

        let removed_rules = rules.remove_referencing(id, orphaned_input.then_some(node.address));
        drop(rules);

        info!(node_id = %id, rules_removed = removed_rules.len(), "🗑️ Node removed");
        Ok(Removal {
            node,
            removed_rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::RuleBook;
    use crate::registry::DeviceRegistry;
    use domain::automation::{Action, Condition, Rule, TriggerKind};
    use domain::node::NodeKind;

    fn id(raw: &str) -> NodeId {
        NodeId::new(raw).unwrap()
    }

    fn button_rule() -> Rule {
        Rule::new(
            Condition::InputEdge {
                source_address: 6,
                trigger: TriggerKind::High,
            },
            Action::Toggle,
            id("lamp"),
        )
    }

    fn fleet(nodes: Vec<Node>, rules: Vec<Rule>) -> Fleet {
        Fleet::new(
            DeviceRegistry::from_nodes(nodes).unwrap().into_shared(),
            RuleBook::from_rules(rules).unwrap().into_shared(),
            EventBus::new(8),
        )
    }

    #[test]
    fn test_provision_rejects_duplicate_bit() {
        let fleet = fleet(vec![], vec![]);
        fleet
            .provision(Node::new(id("b0"), 9, NodeKind::BinaryOutput).with_bit_index(0))
            .unwrap();

        let result = fleet.provision(Node::new(id("b0-again"), 9, NodeKind::BinaryOutput).with_bit_index(0));
        assert!(matches!(result, Err(DomainError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_remove_target_cascades_rules() {
        let fleet = fleet(
            vec![
                Node::new(id("lamp"), 2, NodeKind::BinaryOutput),
                Node::new(id("button"), 6, NodeKind::BinaryInput),
            ],
            vec![button_rule()],
        );

        let removal = fleet.remove_node(&id("lamp")).unwrap();
        assert_eq!(removal.removed_rules.len(), 1);
        assert!(fleet.rules.lock().is_empty());
    }

    #[test]
    fn test_input_rules_survive_while_another_input_remains() {
        let fleet = fleet(
            vec![
                Node::new(id("lamp"), 2, NodeKind::BinaryOutput),
                Node::new(id("button"), 6, NodeKind::BinaryInput),
                Node::new(id("button-2"), 6, NodeKind::BinaryInput),
            ],
            vec![button_rule()],
        );

        assert!(fleet.remove_node(&id("button")).unwrap().removed_rules.is_empty());
        assert_eq!(fleet.remove_node(&id("button-2")).unwrap().removed_rules.len(), 1);
    }

    #[test]
    fn test_remove_unknown_node() {
        let fleet = fleet(vec![], vec![]);
        assert!(matches!(
            fleet.remove_node(&id("ghost")),
            Err(DomainError::NodeNotFound(_))
        ));
    }
}
