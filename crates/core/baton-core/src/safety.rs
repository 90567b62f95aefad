//! Fatal kernel assertions.
//!
//! A broken scheduling invariant leaves the simulated machine in a state no
//! process can recover from, so [`kernel_assert!`] is checked in every
//! build profile and panics. The kernel turns that panic into a machine
//! stop: every other process is torn down and the panic resurfaces from
//! `Kernel::run`.

/// Checks a kernel invariant, panicking with a fatal message on failure.
///
/// # Examples
///
/// ```ignore
/// kernel_assert!(delay > 0, "interrupt scheduled with zero delay");
/// kernel_assert!(!in_handler);
/// ```
#[macro_export]
macro_rules! kernel_assert {
    ($cond:expr $(,)?) => {
        if !$cond {
            panic!("kernel invariant violated: {}", stringify!($cond));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!("kernel invariant violated: {}", format_args!($($arg)+));
        }
    };
}
