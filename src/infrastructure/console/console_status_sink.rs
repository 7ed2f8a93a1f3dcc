// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Terminal status output and the confirmation prompt.

use crate::domain::entities::{Severity, StatusRecord};
use crate::ports::status_port::StatusSink;
use log::warn;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Mutex;

/// Writes one line per announcement and status record, and reads `y`/`yes`
/// answers from its input.
pub struct ConsoleStatusSink {
    out: Mutex<Box<dyn Write + Send>>,
    input: Mutex<Box<dyn BufRead + Send>>,
}

impl ConsoleStatusSink {
    /// Status to stderr, answers from stdin.
    pub fn stdio() -> Self {
        Self::with_io(Box::new(io::stderr()), Box::new(BufReader::new(io::stdin())))
    }

    pub fn with_io(out: Box<dyn Write + Send>, input: Box<dyn BufRead + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            input: Mutex::new(input),
        }
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
    }
}

fn tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "[SUCCESS]",
        Severity::Warning => "[WARNING]",
        Severity::Error => "[ERROR]  ",
    }
}

impl StatusSink for ConsoleStatusSink {
    fn announce(&self, message: &str) {
        self.write_line(&format!("  ... {}", message));
    }

    fn emit(&self, record: &StatusRecord) {
        self.write_line(&format!("{} {}: {}", tag(record.severity), record.title, record.message));
    }

    fn confirm(&self, prompt: &str) -> bool {
        self.write_line(&format!("{} [y/N]", prompt));
        let mut answer = String::new();
        let read = match self.input.lock() {
            Ok(mut input) => input.read_line(&mut answer),
            Err(_) => return false,
        };
        match read {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                warn!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sink(answer: &str) -> (ConsoleStatusSink, SharedBuf) {
        let buf = SharedBuf::default();
        let input = io::Cursor::new(answer.as_bytes().to_vec());
        (ConsoleStatusSink::with_io(Box::new(buf.clone()), Box::new(input)), buf)
    }

    #[test]
    fn test_emit_format() {
        let (sink, buf) = sink("");
        sink.emit(&StatusRecord::new(Severity::Warning, "Data load skipped", "deploy failed"));
        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "[WARNING] Data load skipped: deploy failed\n");
    }

    #[test]
    fn test_confirm_answers() {
        assert!(sink("yes\n").0.confirm("Load?"));
        assert!(sink("Y\n").0.confirm("Load?"));
        assert!(!sink("n\n").0.confirm("Load?"));
        assert!(!sink("").0.confirm("Load?"));
    }
}
