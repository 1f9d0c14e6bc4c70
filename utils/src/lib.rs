use std::io::{BufWriter, Write};

/// Where a stream of the [`DiagnosticEmitter`] ends up.
enum Channel {
    /// Kept in memory, mostly for tests.
    Buffer(Vec<u8>),
    Stream(BufWriter<Box<dyn Write>>),
}

impl Channel {
    fn write_str(&mut self, msg: &str) -> std::io::Result<()> {
        match self {
            Channel::Buffer(buffer) => {
                buffer.extend_from_slice(msg.as_bytes());
                Ok(())
            }
            Channel::Stream(stream) => stream.write_all(msg.as_bytes()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Channel::Buffer(_) => Ok(()),
            Channel::Stream(stream) => stream.flush(),
        }
    }

    fn contents(&self) -> Option<String> {
        match self {
            Channel::Buffer(buffer) => Some(String::from_utf8_lossy(buffer).into_owned()),
            Channel::Stream(_) => None,
        }
    }
}

/// Sink for the regular output and the error messages of the tools. The
/// drivers write to stdout and stderr, the tests log to memory.
pub struct DiagnosticEmitter {
    out: Channel,
    err: Channel,
}

impl DiagnosticEmitter {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out: Channel::Stream(BufWriter::new(out)),
            err: Channel::Stream(BufWriter::new(err)),
        }
    }

    pub fn log_to_buffer() -> Self {
        Self {
            out: Channel::Buffer(Vec::new()),
            err: Channel::Buffer(Vec::new()),
        }
    }

    pub fn out(&mut self, msg: &str) {
        self.out
            .write_str(msg)
            .expect("Failed to write to the output stream.");
    }

    pub fn out_ln(&mut self, msg: &str) {
        self.out(msg);
        self.out("\n");
    }

    pub fn err(&mut self, msg: &str) {
        self.err
            .write_str(msg)
            .expect("Failed to write to the error stream.");
    }

    pub fn err_ln(&mut self, msg: &str) {
        self.err(msg);
        self.err("\n");
    }

    /// Everything written to the output so far, when logging to memory.
    pub fn out_buffer(&self) -> Option<String> {
        self.out.contents()
    }

    /// Everything written to the error stream so far, when logging to memory.
    pub fn err_buffer(&self) -> Option<String> {
        self.err.contents()
    }

    pub fn error(&mut self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    /// Reports an error at a source line. The `item` is the part of the
    /// source the error is about, e.g., `at 'push'`.
    pub fn report(&mut self, line: u32, item: &str, message: &str) {
        let separator = if item.is_empty() { "" } else { " " };
        self.err_ln(&format!("[line {line}] Error{separator}{item}: {message}"));
    }

    pub fn flush(&mut self) {
        self.out.flush().expect("Failed to flush the output stream.");
        self.err.flush().expect("Failed to flush the error stream.");
    }
}

impl Drop for DiagnosticEmitter {
    fn drop(&mut self) {
        self.flush();
    }
}
