// src/macros.rs

//
// Crate-internal logging macros.
//
// With the `logging` feature every macro forwards to the matching `tracing`
// macro under the `eventcast` target. Without it, `log_error!` still writes
// to stderr and the others only type-check their arguments, so variables
// that exist purely for diagnostics never trigger unused warnings.
//
// Only the format-string form is supported (no `field = value` syntax).
//

#![allow(unused_macros)]

#[cfg(feature = "logging")]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "eventcast", $($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!("eventcast: {}", format_args!($($arg)*))
    };
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "eventcast", $($arg)*)
    };
}

#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "eventcast", $($arg)*)
    };
}

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "eventcast", $($arg)*)
    };
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "eventcast", $($arg)*)
    };
}

// Silent variants: evaluate nothing at runtime, but keep the arguments used.
#[cfg(not(feature = "logging"))]
macro_rules! silent_log {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::macros::silent_log!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::macros::silent_log!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::macros::silent_log!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::macros::silent_log!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
pub(crate) use silent_log;

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_trace;
pub(crate) use log_warn;
