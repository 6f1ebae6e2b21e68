//! Operator-facing one-liners (`ok:`, `info:`, `warn:`, `error:`), separate from the
//! tracing audit stream. Colors only when stdout is a TTY.

use owo_colors::OwoColorize;

fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

#[derive(Clone, Copy)]
enum Kind {
    Ok,
    Info,
    Warn,
    Error,
}

fn emit(kind: Kind, msg: &str) {
    let label = match kind {
        Kind::Ok => "ok:",
        Kind::Info => "info:",
        Kind::Warn => "warn:",
        Kind::Error => "error:",
    };
    let prefix = if is_tty() {
        match kind {
            Kind::Ok => label.green().bold().to_string(),
            Kind::Info => label.cyan().bold().to_string(),
            Kind::Warn => label.yellow().bold().to_string(),
            Kind::Error => label.red().bold().to_string(),
        }
    } else {
        label.to_string()
    };
    match kind {
        Kind::Ok | Kind::Info => println!("{prefix} {msg}"),
        Kind::Warn | Kind::Error => eprintln!("{prefix} {msg}"),
    }
}

pub fn print_info(msg: &str) {
    emit(Kind::Info, msg);
}

pub fn print_warn(msg: &str) {
    emit(Kind::Warn, msg);
}

pub fn print_error(msg: &str) {
    emit(Kind::Error, msg);
}

pub fn print_success(msg: &str) {
    emit(Kind::Ok, msg);
}

/// Plain line with no prefix, for output users may script against (e.g. the
/// unwanted-file list).
pub fn print_user(msg: &str) {
    println!("{msg}");
}
