use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Text output sink, e.g. a UART or a terminal.
pub trait Console {
    fn put_str(&mut self, s: &str);

    /// Writes `value` as `0x` followed by 16 upper-case hex digits.
    fn put_hex(&mut self, value: u64) {
        self.put_str(&format!("0x{:016X}", value));
    }
}

impl Console for String {
    fn put_str(&mut self, s: &str) {
        self.push_str(s);
    }
}

/// Adapts any [`std::io::Write`] into a console. Write errors are dropped;
/// there is nowhere left to report them.
pub struct WriteConsole<W>(pub W);

impl<W: std::io::Write> Console for WriteConsole<W> {
    fn put_str(&mut self, s: &str) {
        let _ = self.0.write_all(s.as_bytes());
    }
}

/// A `log` backend that narrates records onto a [`Console`].
pub struct ConsoleLogger<C> {
    console: Mutex<C>,
    level: LevelFilter,
}

impl<C: Console + Send + 'static> ConsoleLogger<C> {
    pub fn new(console: C, level: LevelFilter) -> Self {
        Self {
            console: Mutex::new(console),
            level,
        }
    }

    /// Installs this logger as the global `log` backend.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    pub fn into_inner(self) -> C {
        self.console.into_inner()
    }
}

impl<C: Console + Send> Log for ConsoleLogger<C> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}\n", record.level(), record.args());
        self.console.lock().put_str(&line);
    }

    fn flush(&self) {}
}
