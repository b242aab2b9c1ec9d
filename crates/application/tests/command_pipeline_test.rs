mod common;

use chrono::{Duration, Utc};

use application::{AutoOffTimer, InboundHandler, IssueOutcome};
use common::{harness, id};
use domain::frame::{Command, Frame};
use domain::node::{Node, NodeKind};
use domain::DomainEvent;

fn bank() -> Vec<Node> {
    (0..8)
        .map(|bit| {
            Node::new(id(&format!("bank-{bit}")), 9, NodeKind::BinaryOutput).with_bit_index(bit)
        })
        .collect()
}

#[test]
fn test_analog_set_scenario() {
    let h = harness(vec![Node::new(id("A"), 5, NodeKind::AnalogOutput)]);

    let outcome = h
        .dispatcher
        .issue(Command::AnalogSet, 5, 200, &id("A"))
        .unwrap();

    assert_eq!(
        outcome,
        IssueOutcome::Delivered(Frame::new(Command::AnalogSet, 5, 200))
    );
    assert_eq!(h.transport.frames(), vec![vec![0x04, 5, 0x00, 0xC8]]);
    assert_eq!(h.registry.lock().get(&id("A")).unwrap().analog_value, 200);
}

#[test]
fn test_rollback_while_disconnected() {
    let h = harness(vec![Node::new(id("relay"), 3, NodeKind::BinaryOutput).with_auto_off(30)]);
    h.transport.set_down(true);
    let mut events = h.events.subscribe();

    let outcome = h
        .dispatcher
        .issue(Command::OutputOn, 3, 1, &id("relay"))
        .unwrap();

    assert_eq!(outcome, IssueOutcome::NotDelivered);
    let registry = h.registry.lock();
    let relay = registry.get(&id("relay")).unwrap();
    assert!(!relay.on_state);
    assert!(relay.pending_timer.is_none());
    assert!(matches!(
        events.try_recv(),
        Ok(DomainEvent::CommandRolledBack { .. })
    ));
}

#[test]
fn test_shift_register_byte_tracks_every_bit() {
    let h = harness(bank());

    let mut expected: u8 = 0;
    for bit in [0u8, 3, 7, 5, 1, 2, 4, 6] {
        h.dispatcher
            .issue(Command::OutputOn, 9, 1, &id(&format!("bank-{bit}")))
            .unwrap();
        expected |= 1 << bit;

        let last = h.transport.frames().pop().unwrap();
        assert_eq!(last, vec![Command::ShiftRegisterSet.code(), 9, 0x00, expected]);
    }

    h.dispatcher
        .issue(Command::OutputOff, 9, 0, &id("bank-3"))
        .unwrap();
    expected &= !(1 << 3);
    assert_eq!(
        h.transport.frames().pop().unwrap(),
        vec![Command::ShiftRegisterSet.code(), 9, 0x00, expected]
    );
    assert_eq!(h.registry.lock().shift_register_byte(9), expected);
}

#[test]
fn test_shift_register_rollback_restores_siblings() {
    let h = harness(bank());
    h.dispatcher
        .issue(Command::ShiftRegisterSet, 9, 0b1010_0101, &id("bank-0"))
        .unwrap();

    h.transport.set_down(true);
    let outcome = h
        .dispatcher
        .issue(Command::ShiftRegisterClear, 9, 0, &id("bank-0"))
        .unwrap();

    assert_eq!(outcome, IssueOutcome::NotDelivered);
    assert_eq!(h.registry.lock().shift_register_byte(9), 0b1010_0101);
}

#[test]
fn test_inbound_overwrites_optimistic_state() {
    let h = harness(vec![Node::new(id("relay"), 3, NodeKind::BinaryOutput)]);
    let inbound = InboundHandler::new(h.registry.clone(), h.events.clone());

    h.dispatcher
        .issue(Command::OutputOn, 3, 1, &id("relay"))
        .unwrap();
    assert!(h.registry.lock().get(&id("relay")).unwrap().on_state);

    inbound.handle(&Frame::new(Command::OutputOff, 3, 0).encode());
    assert!(!h.registry.lock().get(&id("relay")).unwrap().on_state);
}

#[test]
fn test_auto_off_round_trip() {
    let h = harness(vec![Node::new(id("pump"), 4, NodeKind::BinaryOutput).with_auto_off(10)]);
    let timer = AutoOffTimer::new(h.dispatcher.clone());
    let now = Utc::now();

    h.dispatcher
        .issue_at(Command::OutputOn, 4, 1, &id("pump"), now)
        .unwrap();
    assert_eq!(
        h.registry.lock().get(&id("pump")).unwrap().pending_timer,
        Some(now + Duration::seconds(10))
    );

    assert!(timer.sweep(now + Duration::seconds(9)).is_empty());
    let swept = timer.sweep(now + Duration::seconds(10));

    assert_eq!(swept.len(), 1);
    assert_eq!(
        h.transport.frames().last().unwrap(),
        &vec![Command::OutputOff.code(), 4, 0x00, 0x00]
    );
    let registry = h.registry.lock();
    let pump = registry.get(&id("pump")).unwrap();
    assert!(!pump.on_state);
    assert!(pump.pending_timer.is_none());
}
