use std::cell::RefCell;
use std::rc::Rc;

use rail_sim::simulation::{EventDispatcher, EventKind, SimEvent, SimId, Strategy, TrainId};

fn selected(train: usize) -> SimEvent {
    SimEvent::TrainSelected {
        train: TrainId(SimId(train)),
    }
}

#[test]
fn test_listeners_only_see_their_kind() {
    let mut dispatcher = EventDispatcher::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&seen);
    dispatcher.subscribe(EventKind::TrainSelected, move |event| {
        sink.borrow_mut().push(event.clone())
    });

    dispatcher.dispatch(&selected(3));
    dispatcher.dispatch(&SimEvent::StrategyChanged {
        train: TrainId(SimId(3)),
        strategy: Strategy::TurnLeft,
    });

    assert_eq!(*seen.borrow(), vec![selected(3)]);
}

#[test]
fn test_listeners_run_in_subscription_order() {
    let mut dispatcher = EventDispatcher::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for tag in ["first", "second"] {
        let sink = Rc::clone(&order);
        dispatcher.subscribe(EventKind::TrainSelected, move |_| sink.borrow_mut().push(tag));
    }
    dispatcher.dispatch(&selected(0));

    assert_eq!(*order.borrow(), vec!["first", "second"]);
    assert_eq!(dispatcher.listener_count(EventKind::TrainSelected), 2);
    assert_eq!(dispatcher.listener_count(EventKind::Collision), 0);
}

#[test]
fn test_unsubscribe() {
    let mut dispatcher = EventDispatcher::new();
    let count = Rc::new(RefCell::new(0));

    let sink = Rc::clone(&count);
    let id = dispatcher.subscribe(EventKind::TrainSelected, move |_| *sink.borrow_mut() += 1);
    dispatcher.dispatch(&selected(0));

    assert!(dispatcher.unsubscribe(id));
    assert!(!dispatcher.unsubscribe(id));
    dispatcher.dispatch(&selected(0));

    assert_eq!(*count.borrow(), 1);
    assert_eq!(dispatcher.listener_count(EventKind::TrainSelected), 0);
}
