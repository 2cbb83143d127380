//! Line-oriented scanner that finds processing instructions and splices the
//! evaluated output back into the document.
//!
//! Only one line (plus the body of a still-open multi-line instruction) is
//! held in memory at a time, so documents of any size can be streamed.

use std::io::BufRead;
use std::io::Write;

use regex::Regex;

use crate::PitagError;
use crate::PitagResult;
use crate::SnippetOrigin;

/// Target used when none is configured, i.e. `<?py ... ?>`.
pub const DEFAULT_TARGET: &str = "py";

/// Marker that ends a processing instruction. The first occurrence after the
/// opening marker wins, even inside a string literal.
pub const CLOSING_MARKER: &str = "?>";

/// Recognizes the opening of a processing instruction for one target.
#[derive(Debug, Clone)]
pub struct TagPattern {
	target: String,
	opening: Regex,
}

/// Byte offsets of an opening marker within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Opening {
	/// Offset of `<?`.
	start: usize,
	/// Offset of the mandatory whitespace after the target.
	whitespace: usize,
	/// Offset just past that whitespace.
	body: usize,
}

impl TagPattern {
	pub fn new(target: &str) -> PitagResult<Self> {
		let is_valid = !target.is_empty()
			&& !target.chars().any(char::is_whitespace)
			&& !target.contains("<?")
			&& !target.contains(CLOSING_MARKER);

		if !is_valid {
			return Err(PitagError::InvalidTarget(target.to_string()));
		}

		let opening = Regex::new(&format!(r"<\?\s*{}(\s)", regex::escape(target)))
			.map_err(|_| PitagError::InvalidTarget(target.to_string()))?;

		Ok(Self {
			target: target.to_string(),
			opening,
		})
	}

	pub fn target(&self) -> &str {
		&self.target
	}

	fn find_opening(&self, line: &str, from: usize) -> Option<Opening> {
		let captures = self.opening.captures_at(line, from)?;
		let start = captures.get(0)?.start();
		let whitespace = captures.get(1)?;

		Some(Opening {
			start,
			whitespace: whitespace.start(),
			body: whitespace.end(),
		})
	}
}

/// Counters reported after a document has been scanned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
	/// Number of lines read.
	pub lines: usize,
	/// Number of processing instructions evaluated.
	pub instructions: usize,
}

/// A multi-line instruction whose closing marker has not been seen yet.
#[derive(Debug, Clone, Copy)]
struct OpenInstruction {
	line: usize,
	column: usize,
}

/// Streams one document from `input` to `output`, replacing every
/// processing instruction with the text `evaluate` returns for its body.
///
/// `evaluate` receives the body and where it starts in the document. Output
/// for a line is written once the line is complete, so a failing instruction
/// leaves nothing of its line behind. The output of a multi-line instruction
/// is written as soon as it closes.
pub struct Scanner<'a> {
	pattern: &'a TagPattern,
	file: &'a str,
	code_buffer: String,
	rendered: String,
	open: Option<OpenInstruction>,
	summary: ScanSummary,
}

impl<'a> Scanner<'a> {
	pub fn new(pattern: &'a TagPattern, file: &'a str) -> Self {
		Self {
			pattern,
			file,
			code_buffer: String::new(),
			rendered: String::new(),
			open: None,
			summary: ScanSummary::default(),
		}
	}

	pub fn scan<R, W, F>(
		mut self,
		mut input: R,
		output: &mut W,
		mut evaluate: F,
	) -> PitagResult<ScanSummary>
	where
		R: BufRead,
		W: Write + ?Sized,
		F: FnMut(&str, &SnippetOrigin) -> PitagResult<String>,
	{
		let mut line = String::new();

		loop {
			line.clear();
			if input.read_line(&mut line)? == 0 {
				break;
			}
			self.summary.lines += 1;

			let mut rest = line.as_str();

			if let Some(open) = self.open {
				let Some(end) = rest.find(CLOSING_MARKER) else {
					self.code_buffer.push_str(rest);
					continue;
				};

				self.code_buffer.push_str(&rest[..end]);
				let origin = SnippetOrigin::new(self.file, open.line).with_column(open.column);
				let text = evaluate(&self.code_buffer, &origin)?;
				output.write_all(text.as_bytes())?;

				self.summary.instructions += 1;
				self.open = None;
				rest = &rest[end + CLOSING_MARKER.len()..];
			}

			let base = line.len() - rest.len();
			self.scan_line(&line, base, &mut evaluate)?;
			output.write_all(self.rendered.as_bytes())?;
		}

		if let Some(open) = self.open {
			return Err(PitagError::UnclosedInstruction {
				file: self.file.to_string(),
				line: open.line,
			});
		}

		Ok(self.summary)
	}

	/// Render `line[base..]` into `self.rendered`, evaluating every
	/// single-line instruction and opening a multi-line one if a marker is
	/// left unterminated.
	fn scan_line<F>(&mut self, line: &str, base: usize, evaluate: &mut F) -> PitagResult<()>
	where
		F: FnMut(&str, &SnippetOrigin) -> PitagResult<String>,
	{
		let line_number = self.summary.lines;
		let mut cursor = base;
		self.rendered.clear();

		while let Some(opening) = self.pattern.find_opening(line, cursor) {
			self.rendered.push_str(&line[cursor..opening.start]);

			let Some(end) = line[opening.body..].find(CLOSING_MARKER) else {
				// The body keeps the whitespace so its first line lines up
				// with the opening line.
				self.code_buffer.clear();
				self.code_buffer.push_str(&line[opening.whitespace..]);
				self.open = Some(OpenInstruction {
					line: line_number,
					column: line[..opening.whitespace].chars().count(),
				});
				return Ok(());
			};

			let end = opening.body + end;
			let origin = SnippetOrigin::new(self.file, line_number)
				.with_column(line[..opening.body].chars().count());
			let text = evaluate(&line[opening.body..end], &origin)?;
			self.rendered.push_str(&text);
			self.summary.instructions += 1;
			cursor = end + CLOSING_MARKER.len();
		}

		self.rendered.push_str(&line[cursor..]);
		Ok(())
	}
}
