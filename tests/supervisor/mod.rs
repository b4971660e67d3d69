//! Supervisor module tests.

mod runner_test;

/// Verify the public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use clipseek::supervisor::{
        CancellationRegistry, ExitState, InvocationState, InvocationStateMachine,
        ProcessSupervisor, SupervisorError,
    };

    let registry = CancellationRegistry::new();
    let guard = registry.begin();
    assert_eq!(registry.len(), 1);
    drop(guard);

    let _ = ProcessSupervisor::new();
    let _ = InvocationStateMachine::new();
    assert_eq!(InvocationState::from(ExitState::Killed), InvocationState::Killed);
    let err = SupervisorError::StillRunning { pid: Some(42) };
    assert!(err.to_string().contains("42"));
}
