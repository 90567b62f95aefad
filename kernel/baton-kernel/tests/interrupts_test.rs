//! Integration tests for the clock/interrupt controller and the timer.

#![allow(missing_docs)] // integration test

use std::sync::{Arc, Mutex};

use baton_core::interrupt::{IntLevel, InterruptKind, MachineMode};
use baton_core::stats::{SYSTEM_TICK, USER_TICK};
use baton_kernel::config::TimerConfig;
use baton_kernel::{Kernel, KernelConfig};

type Fired = Arc<Mutex<Vec<(&'static str, u64)>>>;

fn record(kernel: &Kernel, (fired, tag): (Fired, &'static str)) {
    assert!(kernel.clock().in_handler());
    assert_eq!(kernel.clock().level(), IntLevel::Off);
    assert_eq!(kernel.clock().mode(), MachineMode::System);
    fired.lock().unwrap().push((tag, kernel.clock().total_ticks()));
}

#[test]
fn interrupts_fire_in_time_order_while_idle() {
    let fired: Fired = Arc::new(Mutex::new(Vec::new()));
    let kernel = Kernel::new(KernelConfig::default());

    let stats = kernel.run(|k| {
        let clock = k.clock();
        assert_eq!(clock.total_ticks(), SYSTEM_TICK);
        clock.schedule(record, (fired.clone(), "late"), 30, InterruptKind::Disk);
        clock.schedule(record, (fired.clone(), "first"), 10, InterruptKind::ConsoleWrite);
        clock.schedule(record, (fired.clone(), "middle"), 20, InterruptKind::NetworkRecv);
        clock.schedule(record, (fired.clone(), "tied"), 10, InterruptKind::ConsoleRead);
        assert_eq!(clock.pending_count(), 4);
    });

    assert_eq!(
        *fired.lock().unwrap(),
        [("first", 20), ("tied", 20), ("middle", 30), ("late", 40)]
    );
    assert_eq!(stats.total_ticks, 40);
    assert_eq!(stats.idle_ticks, 30);
    assert_eq!(stats.system_ticks, SYSTEM_TICK);
}

#[test]
fn reenabling_interrupts_delivers_due_events() {
    let fired: Fired = Arc::new(Mutex::new(Vec::new()));
    let kernel = Kernel::new(KernelConfig::default());

    kernel.run(|k| {
        let clock = k.clock();
        clock.schedule(record, (fired.clone(), "soon"), 15, InterruptKind::Disk);

        // Each off-to-on transition is one system tick.
        clock.set_level(IntLevel::Off);
        clock.set_level(IntLevel::On);
        assert!(fired.lock().unwrap().is_empty());
        clock.set_level(IntLevel::Off);
        clock.set_level(IntLevel::On);
        assert_eq!(*fired.lock().unwrap(), [("soon", 30)]);
        assert_eq!(clock.pending_count(), 0);
    });
}

#[test]
fn disabling_twice_does_not_tick() {
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        let clock = k.clock();
        let before = clock.total_ticks();
        assert_eq!(clock.set_level(IntLevel::Off), IntLevel::On);
        assert_eq!(clock.set_level(IntLevel::Off), IntLevel::Off);
        assert_eq!(clock.total_ticks(), before);
        clock.set_level(IntLevel::On);
        assert_eq!(clock.total_ticks(), before + SYSTEM_TICK);
    });
}

#[test]
fn user_mode_ticks_are_cheap() {
    let kernel = Kernel::new(KernelConfig::default());
    let stats = kernel.run(|k| {
        let clock = k.clock();
        clock.set_mode(MachineMode::User);
        for _ in 0..5 {
            clock.advance_tick();
        }
        clock.set_mode(MachineMode::System);
    });
    assert_eq!(stats.user_ticks, 5 * USER_TICK);
    assert_eq!(stats.system_ticks, SYSTEM_TICK);
}

#[test]
fn only_system_mode_pays_the_system_cost() {
    let kernel = Kernel::new(KernelConfig::default());
    let stats = kernel.run(|k| {
        let clock = k.clock();
        clock.set_mode(MachineMode::Idle);
        clock.advance_tick();
        clock.set_mode(MachineMode::System);
    });
    assert_eq!(stats.user_ticks, USER_TICK);
    assert_eq!(stats.system_ticks, SYSTEM_TICK);
    assert_eq!(stats.idle_ticks, 0);
}

#[test]
fn handler_can_wake_a_process() {
    use baton_kernel::sync::Semaphore;

    let kernel = Kernel::new(KernelConfig::default());
    let stats = kernel.run(|k| {
        let done = Arc::new(Semaphore::new(k, "io done", 0));
        let signal = done.clone();
        k.clock().schedule(
            move |_: &Kernel, ()| signal.v(),
            (),
            100,
            InterruptKind::Disk,
        );
        done.p();
        // Woken at 110, plus the tick for re-enabling interrupts.
        assert_eq!(k.clock().total_ticks(), 110 + SYSTEM_TICK);
    });
    assert_eq!(stats.idle_ticks, 100);
}

#[test]
fn periodic_timer_preempts_busy_processes() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let config = KernelConfig {
        timer: TimerConfig {
            enabled: true,
            ticks: 100,
            random_seed: None,
        },
        ..KernelConfig::default()
    };
    let kernel = Kernel::new(config);

    let stats = kernel.run(|k| {
        for name in ['a', 'b'] {
            let kernel = k.clone();
            let order = order.clone();
            k.spawn(
                name.to_string(),
                move |name: char| {
                    for _ in 0..30 {
                        order.lock().unwrap().push(name);
                        kernel.clock().advance_tick();
                    }
                },
                name,
            );
        }
    });

    let order = order.lock().unwrap();
    assert_eq!(order.len(), 60);
    let first_b = order.iter().position(|&c| c == 'b').unwrap();
    assert!(first_b < 30, "a was never preempted");
    assert!(order[first_b..].contains(&'a'), "a never resumed");
    assert!(stats.total_ticks >= 600);
}

#[test]
fn lone_timer_does_not_keep_the_machine_alive() {
    let config = KernelConfig {
        timer: TimerConfig {
            enabled: false,
            ticks: 50,
            random_seed: Some(7),
        },
        ..KernelConfig::default()
    };
    let kernel = Kernel::new(config);
    let stats = kernel.run(|k| assert_eq!(k.clock().pending_count(), 1));
    assert!(stats.total_ticks <= SYSTEM_TICK + 100);
}

#[test]
#[should_panic(expected = "zero delay")]
fn zero_delay_is_fatal() {
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        k.clock()
            .schedule(|_: &Kernel, ()| {}, (), 0, InterruptKind::Disk);
    });
}

#[test]
#[should_panic(expected = "interrupts enabled inside an interrupt handler")]
fn enabling_interrupts_in_a_handler_is_fatal() {
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| {
        k.clock().schedule(
            |kernel: &Kernel, ()| {
                kernel.clock().set_level(IntLevel::On);
            },
            (),
            5,
            InterruptKind::Timer,
        );
        k.clock().schedule(|_: &Kernel, ()| {}, (), 50, InterruptKind::Disk);
    });
}

#[test]
#[should_panic(expected = "yield_on_return outside an interrupt handler")]
fn yield_on_return_outside_handler_is_fatal() {
    let kernel = Kernel::new(KernelConfig::default());
    kernel.run(|k| k.clock().yield_on_return());
}
