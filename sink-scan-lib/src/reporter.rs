//! Result reporting.
//!
//! Scan results are rendered as they complete, so blocks for different URLs
//! appear in completion order. Each block (header plus one line per
//! occurrence) is rendered to a single buffer first and then written under a
//! lock, so concurrent tasks never interleave lines within a sink.

use crate::error::ScanError;
use crate::types::ScanResult;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Render the report block for one URL.
///
/// Returns `None` for an empty result: a clean document produces no output.
///
/// # Example
///
/// ```rust
/// use sink_scan_lib::{format_block, scan_document, PatternRegistry};
///
/// let registry = PatternRegistry::from_preset("broad").unwrap();
/// let result = scan_document(b"eval(x)", &registry);
/// assert_eq!(
///     format_block("http://a.test/", &result).unwrap(),
///     "[*] http://a.test/\n    • eval at line 1:1\n"
/// );
/// ```
pub fn format_block(url: &str, result: &ScanResult) -> Option<String> {
    if result.is_empty() {
        return None;
    }

    let mut block = String::new();
    let _ = writeln!(block, "[*] {}", url);
    for occurrence in result {
        let _ = writeln!(
            block,
            "    • {} at line {}:{}",
            occurrence.keyword, occurrence.line, occurrence.column
        );
    }
    Some(block)
}

struct Sinks {
    primary: Box<dyn Write + Send>,
    file: Option<(String, File)>,
}

fn write_block<W: Write + ?Sized>(sink: &mut W, block: &str) -> io::Result<()> {
    sink.write_all(block.as_bytes())?;
    sink.flush()
}

/// Emits report blocks to a primary sink and an optional append-mode file.
pub struct Reporter {
    sinks: Mutex<Sinks>,
}

impl Reporter {
    /// Report to an arbitrary primary sink with no file mirror.
    pub fn new<W: Write + Send + 'static>(primary: W) -> Self {
        Self {
            sinks: Mutex::new(Sinks {
                primary: Box::new(primary),
                file: None,
            }),
        }
    }

    /// Report to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Mirror every block to `path`, opened in append mode and created if
    /// absent. Existing content is preserved.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::OutputFile` if the file cannot be opened. This is
    /// an initialization failure: callers must not start scanning.
    pub fn with_file_sink<P: AsRef<Path>>(self, path: P) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| ScanError::output_file(path.to_string_lossy(), e.to_string()))?;

        let mut sinks = self
            .sinks
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sinks.file = Some((path.to_string_lossy().into_owned(), file));

        Ok(Self {
            sinks: Mutex::new(sinks),
        })
    }

    pub fn has_file_sink(&self) -> bool {
        self.lock().file.is_some()
    }

    /// Emit the block for `url`. Empty results write nothing.
    ///
    /// Every sink is attempted even if an earlier one fails; the first failure
    /// is returned. Returns whether a block was produced.
    ///
    /// # Errors
    ///
    /// `ScanError::ReportWrite` if the primary sink rejects the block,
    /// otherwise `ScanError::OutputFile` if the file sink does.
    pub fn report(&self, url: &str, result: &ScanResult) -> Result<bool, ScanError> {
        let Some(block) = format_block(url, result) else {
            return Ok(false);
        };

        let mut guard = self.lock();
        let sinks = &mut *guard;

        let primary = write_block(sinks.primary.as_mut(), &block)
            .map_err(|e| ScanError::report_write("stdout", e.to_string()));

        let file = match sinks.file.as_mut() {
            Some((path, file)) => write_block(file, &block)
                .map_err(|e| ScanError::output_file(path.as_str(), e.to_string())),
            None => Ok(()),
        };

        primary.and(file).map(|()| true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sinks> {
        // A panic while writing leaves the sinks usable; keep reporting.
        self.sinks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("file_sink", &self.has_file_sink())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Occurrence;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn result_of(items: &[(&str, usize, usize)]) -> ScanResult {
        let mut result = ScanResult::new();
        for (keyword, line, column) in items {
            result.push(Occurrence::new(*keyword, *line, *column));
        }
        result
    }

    #[test]
    fn test_format_block_layout() {
        let result = result_of(&[("innerHTML", 2, 5), ("eval", 7, 1)]);
        assert_eq!(
            format_block("https://example.test/app.js", &result).unwrap(),
            "[*] https://example.test/app.js\n    • innerHTML at line 2:5\n    • eval at line 7:1\n"
        );
    }

    #[test]
    fn test_empty_result_writes_nothing() {
        let buffer = SharedBuffer::default();
        let reporter = Reporter::new(buffer.clone());
        assert!(!reporter.report("http://a.test/", &ScanResult::new()).unwrap());
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_file_sink_appends_identical_block() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "previous run\n").unwrap();

        let buffer = SharedBuffer::default();
        let reporter = Reporter::new(buffer.clone())
            .with_file_sink(temp_file.path())
            .unwrap();
        assert!(reporter.has_file_sink());

        let result = result_of(&[("eval", 1, 1)]);
        assert!(reporter.report("http://a.test/", &result).unwrap());

        let file_contents = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(
            file_contents,
            format!("previous run\n{}", buffer.contents())
        );
    }

    /// Primary sink whose reader has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_file_sink_written_when_primary_fails() {
        let temp_file = NamedTempFile::new().unwrap();
        let reporter = Reporter::new(ClosedPipe)
            .with_file_sink(temp_file.path())
            .unwrap();

        let first = result_of(&[("eval", 1, 1)]);
        let second = result_of(&[("innerHTML", 3, 2)]);
        for (url, result) in [("http://a.test/", &first), ("http://b.test/", &second)] {
            let err = reporter.report(url, result).unwrap_err();
            assert!(
                matches!(&err, ScanError::ReportWrite { sink, .. } if sink == "stdout"),
                "unexpected error: {:?}",
                err
            );
        }

        let file_contents = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(
            file_contents,
            format!(
                "{}{}",
                format_block("http://a.test/", &first).unwrap(),
                format_block("http://b.test/", &second).unwrap()
            )
        );
    }

    #[test]
    fn test_unopenable_file_sink_is_fatal() {
        let err = Reporter::new(io::sink())
            .with_file_sink("/nonexistent-dir/for/sure/out.txt")
            .unwrap_err();
        assert!(matches!(err, ScanError::OutputFile { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_concurrent_blocks_do_not_interleave() {
        let temp_file = NamedTempFile::new().unwrap();
        let buffer = SharedBuffer::default();
        let reporter = Arc::new(
            Reporter::new(buffer.clone())
                .with_file_sink(temp_file.path())
                .unwrap(),
        );

        let lines_per_block = 50;
        let handles: Vec<_> = (0..8)
            .map(|task| {
                let reporter = Arc::clone(&reporter);
                std::thread::spawn(move || {
                    let items: Vec<(String, usize, usize)> = (1..=lines_per_block)
                        .map(|line| (format!("k{}", task), line, 1))
                        .collect();
                    let mut result = ScanResult::new();
                    for (keyword, line, column) in &items {
                        result.push(Occurrence::new(keyword.clone(), *line, *column));
                    }
                    reporter
                        .report(&format!("http://host/{}", task), &result)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for output in [
            buffer.contents(),
            std::fs::read_to_string(temp_file.path()).unwrap(),
        ] {
            let lines: Vec<&str> = output.lines().collect();
            assert_eq!(lines.len(), 8 * (lines_per_block + 1));
            for block in lines.chunks(lines_per_block + 1) {
                let task = block[0].strip_prefix("[*] http://host/").unwrap();
                for body_line in &block[1..] {
                    assert!(
                        body_line.starts_with(&format!("    • k{} at line", task)),
                        "interleaved line {:?} in block for task {}",
                        body_line,
                        task
                    );
                }
            }
        }
    }
}
