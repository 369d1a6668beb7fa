//! Unit tests for handlers.rs

use crate::handlers::*;
use std::sync::{Arc, Mutex};

fn info(frame_index: u64) -> FrameInfo {
    FrameInfo { frame_index, image_index: 0 }
}

fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> ContextHandler {
    let log = Arc::clone(log);
    Box::new(move |info: &FrameInfo| {
        log.lock().unwrap().push(format!("{}:{}", tag, info.frame_index));
    })
}

// ============================================================================
// IDENTIFIERS
// ============================================================================

#[test]
fn test_ids_start_at_one_and_increase() {
    let mut registry = HandlerRegistry::new();
    let a = registry.register(HandlerType::PrePresent, Box::new(|_| {}));
    let b = registry.register(HandlerType::PostPresent, Box::new(|_| {}));

    assert_eq!(a, HandlerId(1));
    assert_eq!(b, HandlerId(2));
}

#[test]
fn test_ids_not_reused_after_unregister() {
    let mut registry = HandlerRegistry::new();
    let a = registry.register(HandlerType::PrePresent, Box::new(|_| {}));
    registry.unregister(a);
    let b = registry.register(HandlerType::PrePresent, Box::new(|_| {}));

    assert_eq!(b, HandlerId(2));
}

#[test]
fn test_reset_restarts_ids() {
    let mut registry = HandlerRegistry::new();
    registry.register(HandlerType::PrePresent, Box::new(|_| {}));
    registry.register(HandlerType::PrePresent, Box::new(|_| {}));

    registry.reset();

    assert!(registry.is_empty());
    let id = registry.register(HandlerType::PostPresent, Box::new(|_| {}));
    assert_eq!(id, HandlerId(1));
}

// ============================================================================
// INVOCATION
// ============================================================================

#[test]
fn test_invoke_filters_by_type_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    registry.register(HandlerType::PrePresent, recorder(&log, "pre-a"));
    registry.register(HandlerType::PostPresent, recorder(&log, "post"));
    registry.register(HandlerType::PrePresent, recorder(&log, "pre-b"));

    registry.invoke(HandlerType::PrePresent, &info(5));

    assert_eq!(*log.lock().unwrap(), vec!["pre-a:5", "pre-b:5"]);
}

#[test]
fn test_unregistered_handler_is_not_invoked() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    let id = registry.register(HandlerType::PostPresent, recorder(&log, "post"));

    assert!(registry.unregister(id));
    assert!(!registry.unregister(id));
    registry.invoke(HandlerType::PostPresent, &info(1));

    assert!(log.lock().unwrap().is_empty());
}
