use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::sync::OnceLock;

use pyo3::exceptions::PyException;
use pyo3::exceptions::PySyntaxError;
use pyo3::exceptions::PySystemExit;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::types::PyModule;
use pyo3::types::PyTraceback;

use crate::PitagError;
use crate::PitagResult;
use crate::ScriptError;
use crate::ScriptPhase;

static PYTHON_INIT: OnceLock<()> = OnceLock::new();

/// Initialise the embedded interpreter. CPython can only be initialised once
/// per process, later calls are no-ops.
pub(crate) fn ensure_interpreter() {
	PYTHON_INIT.get_or_init(pyo3::prepare_freethreaded_python);
}

pub(crate) fn interpreter_error(error: PyErr) -> PitagError {
	PitagError::Interpreter(error.to_string())
}

/// Where a snippet came from: the document name and the position of the
/// snippet's first character in that document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetOrigin {
	pub file: String,
	/// 1-indexed line of the snippet's first line.
	pub line: usize,
	/// Number of characters preceding the snippet on its first line.
	pub column: usize,
}

impl SnippetOrigin {
	pub fn new(file: impl Into<String>, line: usize) -> Self {
		Self {
			file: file.into(),
			line,
			column: 0,
		}
	}

	#[must_use]
	pub fn with_column(mut self, column: usize) -> Self {
		self.column = column;
		self
	}

	fn line_offset(&self) -> usize {
		self.line.saturating_sub(1)
	}
}

/// The persistent python namespace shared by every snippet a processor runs.
///
/// Each context owns its own globals dictionary, so two contexts never see
/// each other's definitions.
pub struct ExecutionContext {
	globals: Py<PyDict>,
}

impl Default for ExecutionContext {
	fn default() -> Self {
		Self::new()
	}
}

impl ExecutionContext {
	pub fn new() -> Self {
		ensure_interpreter();
		Python::with_gil(|py| {
			Self {
				globals: PyDict::new_bound(py).unbind(),
			}
		})
	}

	/// The globals dictionary snippets are executed against.
	pub fn namespace<'py>(&self, py: Python<'py>) -> &Bound<'py, PyDict> {
		self.globals.bind(py)
	}

	/// Returns true if a previous snippet bound `name` at module level.
	pub fn contains(&self, name: &str) -> bool {
		Python::with_gil(|py| self.namespace(py).contains(name).unwrap_or(false))
	}

	/// Parse, compile and run `source` against the shared namespace.
	///
	/// Line numbers in the parsed tree are shifted so that the snippet's first
	/// line reports as `origin.line`. Failures are returned as
	/// [`PitagError::Script`] with the phase they happened in. `SystemExit`
	/// becomes [`PitagError::Exit`], and other exceptions that do not derive
	/// from `Exception` are reported as interpreter failures.
	pub fn exec(&self, py: Python<'_>, source: &str, origin: &SnippetOrigin) -> PitagResult<()> {
		tracing::debug!(file = %origin.file, line = origin.line, "executing snippet");

		let offset = origin.line_offset();
		let ast = py.import_bound("ast").map_err(interpreter_error)?;
		let builtins = py.import_bound("builtins").map_err(interpreter_error)?;

		let tree = ast
			.call_method1("parse", (source, origin.file.as_str()))
			.map_err(|error| compile_error(py, &error, origin, offset))?;

		if offset > 0 {
			shift_line_numbers(&ast, &tree, offset).map_err(interpreter_error)?;
		}

		// Errors raised by `compile` come from the already shifted tree.
		let code = builtins
			.call_method1("compile", (&tree, origin.file.as_str(), "exec"))
			.map_err(|error| compile_error(py, &error, origin, 0))?;

		builtins
			.call_method1("exec", (code, self.namespace(py)))
			.map_err(|error| run_failure(py, error, origin))?;

		Ok(())
	}
}

/// Add `offset` to the `lineno` and `end_lineno` of every node in `tree`.
fn shift_line_numbers(
	ast: &Bound<'_, PyModule>,
	tree: &Bound<'_, PyAny>,
	offset: usize,
) -> PyResult<()> {
	for node in ast.call_method1("walk", (tree,))?.iter()? {
		let node = node?;

		for attribute in ["lineno", "end_lineno"] {
			let Some(line) = usize_attr(&node, attribute) else {
				continue;
			};
			node.setattr(attribute, line + offset)?;
		}
	}

	Ok(())
}

fn compile_error(
	py: Python<'_>,
	error: &PyErr,
	origin: &SnippetOrigin,
	offset: usize,
) -> ScriptError {
	let value = error.value_bound(py).as_any();

	let message = if error.is_instance_of::<PySyntaxError>(py) {
		value
			.getattr("msg")
			.and_then(|msg| msg.extract::<String>())
			.unwrap_or_else(|_| exception_message(value))
	} else {
		exception_message(value)
	};

	let line = usize_attr(value, "lineno").map(|line| line + offset);
	let mut column = usize_attr(value, "offset");
	let mut source_line = value
		.getattr("text")
		.and_then(|text| text.extract::<String>())
		.ok()
		.map(|text| text.trim_end_matches(['\r', '\n']).to_string());

	// The snippet's own text only covers the tag body. When the document
	// can be re-read, show the whole document line instead. This also applies
	// to snippets on the first line, so the caret lines up with the document
	// text rather than the tag body.
	if let Some(line) = line {
		if let Some(text) = read_source_line(&origin.file, line) {
			if line == origin.line {
				column = column.map(|column| column + origin.column);
			}
			source_line = Some(text);
		}
	}

	ScriptError {
		phase: ScriptPhase::Compile,
		exception: exception_name(value),
		message,
		file: origin.file.clone(),
		line,
		column,
		source_line,
		frames: Vec::new(),
	}
}

fn run_failure(py: Python<'_>, error: PyErr, origin: &SnippetOrigin) -> PitagError {
	if error.is_instance_of::<PySystemExit>(py) {
		return exit_request(py, &error);
	}

	if !error.is_instance_of::<PyException>(py) {
		return interpreter_error(error);
	}

	run_error(py, &error, origin).into()
}

/// `SystemExit.code` follows `sys.exit`: `None` is success, an integer is the
/// status and anything else is printed and exits with 1.
fn exit_request(py: Python<'_>, error: &PyErr) -> PitagError {
	let code = error
		.value_bound(py)
		.getattr("code")
		.ok()
		.filter(|code| !code.is_none());

	let Some(code) = code else {
		return PitagError::Exit {
			status: 0,
			message: None,
		};
	};

	match code.extract::<i32>() {
		Ok(status) => PitagError::Exit { status, message: None },
		Err(_) => {
			PitagError::Exit {
				status: 1,
				message: Some(exception_message(&code)),
			}
		}
	}
}

fn run_error(py: Python<'_>, error: &PyErr, origin: &SnippetOrigin) -> ScriptError {
	let value = error.value_bound(py).as_any();
	let traceback = error.traceback_bound(py);

	let frames = traceback
		.as_ref()
		.map(|traceback| format_frames(py, traceback))
		.unwrap_or_default();
	let line = traceback
		.as_ref()
		.and_then(|traceback| innermost_line_in(traceback, &origin.file));

	ScriptError {
		phase: ScriptPhase::Run,
		exception: exception_name(value),
		message: exception_message(value),
		file: origin.file.clone(),
		line,
		column: None,
		source_line: None,
		frames,
	}
}

/// The stack starts at the snippet's module frame because `exec` is entered
/// from native code, so no processor frames need to be skipped.
fn format_frames(py: Python<'_>, traceback: &Bound<'_, PyTraceback>) -> Vec<String> {
	py.import_bound("traceback")
		.and_then(|module| module.call_method1("format_tb", (traceback,)))
		.and_then(|frames| frames.extract::<Vec<String>>())
		.unwrap_or_default()
}

/// Line of the innermost stack entry that belongs to `file`.
fn innermost_line_in(traceback: &Bound<'_, PyTraceback>, file: &str) -> Option<usize> {
	let mut line = None;
	let mut current = Some(traceback.clone().into_any());

	while let Some(entry) = current {
		let in_file = entry
			.getattr("tb_frame")
			.and_then(|frame| frame.getattr("f_code"))
			.and_then(|code| code.getattr("co_filename"))
			.and_then(|name| name.extract::<String>())
			.is_ok_and(|name| name == file);

		if in_file {
			line = usize_attr(&entry, "tb_lineno");
		}

		current = entry.getattr("tb_next").ok().filter(|next| !next.is_none());
	}

	line
}

fn exception_name(value: &Bound<'_, PyAny>) -> String {
	let kind = value.get_type();
	let name = kind
		.getattr("__qualname__")
		.and_then(|name| name.extract::<String>())
		.unwrap_or_else(|_| "Exception".to_string());

	match kind
		.getattr("__module__")
		.and_then(|module| module.extract::<String>())
	{
		Ok(module) if module != "builtins" && module != "__main__" => format!("{module}.{name}"),
		_ => name,
	}
}

fn exception_message(value: &Bound<'_, PyAny>) -> String {
	value
		.str()
		.and_then(|message| message.extract::<String>())
		.unwrap_or_default()
}

fn usize_attr(value: &Bound<'_, PyAny>, name: &str) -> Option<usize> {
	value.getattr(name).ok()?.extract::<usize>().ok()
}

fn read_source_line(file: &str, line: usize) -> Option<String> {
	let reader = BufReader::new(File::open(file).ok()?);
	reader.lines().nth(line.checked_sub(1)?)?.ok()
}
