// Log-facade wiring for the trios kernel core.
//
// The core logs through the `log` macros; the embedder decides where the
// text goes by handing `init` a sink (serial line, screen, host stdout in
// tests). Init is one-shot; later calls only adjust the level filter.
use core::fmt;

use conquer_once::spin::OnceCell;

/// Destination for formatted log lines.
pub type Sink = fn(log::Level, fmt::Arguments);

static SINK: OnceCell<Sink> = OnceCell::uninit();
static LOGGER: KernelLog = KernelLog;

struct KernelLog;

impl log::Log for KernelLog {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(sink) = SINK.try_get() {
            sink(record.level(), *record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the logger with the given sink and level filter.
pub fn init(level: log::LevelFilter, sink: Sink) {
    let _ = SINK.try_init_once(|| sink);
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
