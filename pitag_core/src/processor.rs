use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use pyo3::prelude::*;

use crate::ExecutionContext;
use crate::OutputCapture;
use crate::PitagResult;
use crate::ScanSummary;
use crate::Scanner;
use crate::SnippetOrigin;
use crate::TagPattern;
use crate::context::ensure_interpreter;
use crate::scanner::DEFAULT_TARGET;

/// Name used for snippets that do not come from a document.
pub const COMMAND_LINE_ORIGIN: &str = "<command-line>";

/// Name used for a document read from standard input.
pub const STDIN_ORIGIN: &str = "<stdin>";

/// Drives documents through the scanner into one output sink, sharing one
/// [`ExecutionContext`] between all of them.
///
/// The sink is owned by the processor. Pass `&mut W` to keep ownership of a
/// stream you opened yourself, or use [`Processor::create`] to have the
/// processor open (and, when dropped, close) a file.
pub struct Processor<W: Write> {
	output: W,
	pattern: TagPattern,
	context: ExecutionContext,
	capture: OutputCapture,
}

impl Processor<BufWriter<File>> {
	/// Create a processor writing to `path`, truncating the file.
	pub fn create(path: impl AsRef<Path>, target: &str) -> PitagResult<Self> {
		let file = File::create(path)?;
		Self::with_target(BufWriter::new(file), target)
	}
}

impl<W: Write> Processor<W> {
	/// Create a processor for `<?py ... ?>` instructions.
	pub fn new(output: W) -> PitagResult<Self> {
		Self::with_target(output, DEFAULT_TARGET)
	}

	/// Create a processor for `<?{target} ... ?>` instructions.
	pub fn with_target(output: W, target: &str) -> PitagResult<Self> {
		let pattern = TagPattern::new(target)?;
		ensure_interpreter();
		let capture = Python::with_gil(OutputCapture::new)?;

		Ok(Self {
			output,
			pattern,
			context: ExecutionContext::new(),
			capture,
		})
	}

	pub fn target(&self) -> &str {
		self.pattern.target()
	}

	pub fn context(&self) -> &ExecutionContext {
		&self.context
	}

	/// Run a snippet against the shared namespace before (or between)
	/// documents. Anything it prints is discarded.
	pub fn exec(&mut self, source: &str, origin: &str) -> PitagResult<()> {
		let origin = SnippetOrigin::new(origin, 1);
		let Self {
			context, capture, ..
		} = self;

		Python::with_gil(|py| capture.capture(py, || context.exec(py, source, &origin)))?;
		Ok(())
	}

	/// Run every statement in the python file at `path` as a pre-execution
	/// snippet.
	pub fn exec_file(&mut self, path: impl AsRef<Path>) -> PitagResult<()> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path)?;
		self.exec(&source, &path.display().to_string())
	}

	/// Process one document read from `input`. `name` is used in
	/// diagnostics and to re-read offending lines when it names a file.
	pub fn process<R: BufRead>(&mut self, input: R, name: &str) -> PitagResult<ScanSummary> {
		tracing::debug!(document = name, target = self.pattern.target(), "processing document");

		let Self {
			output,
			pattern,
			context,
			capture,
		} = self;

		let summary = Python::with_gil(|py| {
			Scanner::new(pattern, name).scan(input, output, |source, origin| {
				tracing::debug!(
					document = %origin.file,
					line = origin.line,
					"evaluating processing instruction"
				);
				capture.capture(py, || context.exec(py, source, origin))
			})
		})?;
		self.output.flush()?;

		tracing::debug!(
			document = name,
			lines = summary.lines,
			instructions = summary.instructions,
			"processed document"
		);

		Ok(summary)
	}

	/// Open `path` and process it. The file is closed when this returns,
	/// whether or not processing succeeded.
	pub fn process_path(&mut self, path: impl AsRef<Path>) -> PitagResult<ScanSummary> {
		let path = path.as_ref();
		let file = File::open(path)?;
		self.process(BufReader::new(file), &path.display().to_string())
	}

	/// Flush and hand back the sink.
	pub fn finish(mut self) -> PitagResult<W> {
		self.output.flush()?;
		Ok(self.output)
	}
}
