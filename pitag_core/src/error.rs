use std::fmt;
use std::fmt::Write as _;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum PitagError {
	#[error(transparent)]
	#[diagnostic(code(pitag::io_error))]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	#[diagnostic(transparent)]
	Script(#[from] ScriptError),

	#[error("processing instruction starting from line {line} was never closed")]
	#[diagnostic(
		code(pitag::unclosed_instruction),
		help("add `?>` to close the processing instruction opened in {file}")
	)]
	UnclosedInstruction { file: String, line: usize },

	#[error("invalid processing instruction target: `{0}`")]
	#[diagnostic(
		code(pitag::invalid_target),
		help("the target must be a non-empty name without whitespace, `<?` or `?>`")
	)]
	InvalidTarget(String),

	#[error("python interpreter failure: {0}")]
	#[diagnostic(code(pitag::interpreter))]
	Interpreter(String),

	/// A snippet raised `SystemExit`. The run stops with `status`; `message`
	/// holds a non-integer exit code, which python prints instead.
	#[error("snippet requested exit with status {status}")]
	#[diagnostic(code(pitag::exit))]
	Exit {
		status: i32,
		message: Option<String>,
	},

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(pitag::config_parse),
		help("check that pitag.toml is valid TOML with `target`, `exec` and `no_color` keys")
	)]
	ConfigParse(String),
}

impl PitagError {
	/// Returns true for the errors a document author can cause: script
	/// failures and unclosed processing instructions. Everything else is a
	/// failure of the surrounding environment.
	pub fn is_diagnostic(&self) -> bool {
		matches!(self, Self::Script(_) | Self::UnclosedInstruction { .. })
	}

	/// Human-readable rendering used by the command line.
	pub fn render(&self) -> String {
		match self {
			Self::Script(error) => error.render(),
			Self::UnclosedInstruction { .. } => format!("Bad XML syntax: {self}\n"),
			Self::Exit { message, .. } => {
				message
					.as_ref()
					.map(|message| format!("{message}\n"))
					.unwrap_or_default()
			}
			_ => format!("{self}\n"),
		}
	}
}

/// The phase in which a snippet failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
	/// The snippet could not be parsed or compiled. There is no stack.
	Compile,
	/// The snippet raised while running.
	Run,
}

/// A failure raised by an embedded python snippet.
///
/// Everything is copied out of the interpreter when the error is created so
/// the value can be rendered without holding the interpreter lock.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic)]
#[diagnostic(
	code(pitag::script_error),
	help("the snippet in {file} raised {exception}")
)]
pub struct ScriptError {
	pub phase: ScriptPhase,
	/// Exception type, qualified with its module unless it is a builtin.
	pub exception: String,
	pub message: String,
	/// Name of the document (or `<command-line>`) the snippet came from.
	pub file: String,
	/// 1-indexed line in `file`.
	pub line: Option<usize>,
	/// 1-indexed column in `file`, compile phase only.
	pub column: Option<usize>,
	/// The offending source line, compile phase only.
	pub source_line: Option<String>,
	/// Formatted stack entries, innermost last. Empty for the compile phase.
	pub frames: Vec<String>,
}

impl fmt::Display for ScriptError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.exception)?;
		if !self.message.is_empty() {
			write!(f, ": {}", self.message)?;
		}
		if let Some(line) = self.line {
			write!(f, " ({}, line {line})", self.file)?;
		}
		Ok(())
	}
}

impl std::error::Error for ScriptError {}

impl ScriptError {
	/// Render the error the way the python interpreter prints an uncaught
	/// exception.
	pub fn render(&self) -> String {
		let mut out = String::new();

		match self.phase {
			ScriptPhase::Compile => {
				let _ = write!(out, "  File \"{}\"", self.file);
				if let Some(line) = self.line {
					let _ = write!(out, ", line {line}");
				}
				out.push('\n');

				if let Some(text) = &self.source_line {
					let trimmed = text.trim_start();
					let indent = text.chars().count() - trimmed.chars().count();
					let _ = writeln!(out, "    {}", trimmed.trim_end());

					if let Some(column) = self.column {
						let caret = column.saturating_sub(1).saturating_sub(indent);
						let _ = writeln!(out, "    {}^", " ".repeat(caret));
					}
				}
			}
			ScriptPhase::Run => {
				if !self.frames.is_empty() {
					out.push_str("Traceback (most recent call last):\n");
					for frame in &self.frames {
						out.push_str(frame);
					}
				}
			}
		}

		out.push_str(&self.exception);
		if !self.message.is_empty() {
			let _ = write!(out, ": {}", self.message);
		}
		out.push('\n');

		out
	}
}

pub type PitagResult<T> = Result<T, PitagError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
