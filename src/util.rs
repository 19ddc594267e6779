use std::io::Write;

// Failures that cannot be reported through an event or a return value end up on stderr.
#[derive(Copy, Clone, Debug)]
pub(crate) enum ErrorCode {
    Write,
    Timer,
    Thread,
    Listener,
}

pub(crate) fn eprint_err(error_code: ErrorCode, msg: &str, err: &dyn std::error::Error) {
    let s = format!("[syslane][ErrorCode::{error_code:?}] {msg}, caused by {err}\n");
    try_to_write(&s);
}

pub(crate) fn eprint_msg(error_code: ErrorCode, msg: &str) {
    let s = format!("[syslane][ErrorCode::{error_code:?}] {msg}\n");
    try_to_write(&s);
}

fn try_to_write(s: &str) {
    let mut w = std::io::stderr();
    w.write_all(s.as_bytes()).ok();
}
