//! Integration tests for `exit` and `join`.

#![allow(missing_docs)] // integration test

use std::sync::{Arc, Mutex};

use baton_core::id::Pid;
use baton_kernel::{JoinOutcome, Kernel, KernelConfig};

#[test]
fn join_delivers_exit_code() {
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        let kernel = k.clone();
        let child = k.spawn(
            "child",
            move |code: i32| {
                kernel.exit(code);
            },
            42,
        );
        assert_eq!(k.join(child.pid()), JoinOutcome::Exited(42));
        assert!(k.lookup(child.pid()).is_none());
    });
}

#[test]
fn joiner_sleeps_through_other_work() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        let kernel = k.clone();
        let child_log = log.clone();
        let child = k.spawn(
            "slow",
            move |()| {
                for step in 0..3 {
                    child_log.lock().unwrap().push(step);
                    kernel.yield_now();
                }
                kernel.exit(7);
            },
            (),
        );
        assert_eq!(k.join(child.pid()), JoinOutcome::Exited(7));
        log.lock().unwrap().push(99);
    });
    assert_eq!(*log.lock().unwrap(), [0, 1, 2, 99]);
}

#[test]
fn invalid_joins_are_rejected() {
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        let me = k.current_process().pid();
        assert_eq!(k.join(me), JoinOutcome::Rejected);
        assert_eq!(k.join(Pid::new(99)), JoinOutcome::Rejected);

        let child = k.spawn("gone", |()| {}, ());
        k.yield_now();
        assert_eq!(k.join(child.pid()), JoinOutcome::Rejected);
        assert_eq!(JoinOutcome::Rejected.as_register(), -1);
    });
}

#[test]
fn joining_the_boot_process_is_rejected() {
    let outcome = Arc::new(Mutex::new(None));
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        let kernel = k.clone();
        let outcome = outcome.clone();
        k.spawn(
            "orphan",
            move |()| {
                *outcome.lock().unwrap() = Some(kernel.join(Pid::BOOT));
            },
            (),
        );
        k.yield_now();
    });
    assert_eq!(*outcome.lock().unwrap(), Some(JoinOutcome::Rejected));
}

#[test]
fn later_joiner_replaces_earlier_one() {
    let woken = Arc::new(Mutex::new(Vec::new()));
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        let target = {
            let kernel = k.clone();
            k.spawn(
                "target",
                move |()| {
                    kernel.yield_now();
                    kernel.yield_now();
                    kernel.exit(3);
                },
                (),
            )
        };
        for name in ["first", "second"] {
            let kernel = k.clone();
            let woken = woken.clone();
            let target = target.pid();
            k.spawn(
                name,
                move |name: &'static str| {
                    let outcome = kernel.join(target);
                    woken.lock().unwrap().push((name, outcome));
                },
                name,
            );
        }
    });
    assert_eq!(
        *woken.lock().unwrap(),
        [("second", JoinOutcome::Exited(3))]
    );
}

#[test]
fn process_created_before_boot_is_joinable() {
    let kernel = Kernel::new(KernelConfig::default());
    let early = {
        let kernel = kernel.clone();
        kernel.clone().spawn(
            "early",
            move |code: i32| {
                kernel.exit(code);
            },
            8,
        )
    };
    assert_ne!(early.pid(), Pid::BOOT);

    let outcome = Arc::new(Mutex::new(None));
    kernel.run(|k| {
        assert_eq!(k.current_process().pid(), Pid::BOOT);
        *outcome.lock().unwrap() = Some(k.join(early.pid()));
    });
    assert_eq!(*outcome.lock().unwrap(), Some(JoinOutcome::Exited(8)));
}
