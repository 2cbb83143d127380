//! Redirection of python's `sys.stdout` into an in-memory buffer.
//!
//! Snippets produce their substitution text by printing. [`OutputCapture`]
//! owns one `io.StringIO` per processor and swaps it in as `sys.stdout` for
//! exactly one evaluation at a time.

use pyo3::prelude::*;
use pyo3::types::PyModule;

use crate::PitagError;
use crate::PitagResult;

/// Swaps `sys.stdout` for the lifetime of the guard. The previous stream is
/// put back when the guard is dropped, including while unwinding from a
/// failed evaluation.
pub(crate) struct StdoutRedirect<'py> {
	sys: Bound<'py, PyModule>,
	previous: Bound<'py, PyAny>,
}

impl<'py> StdoutRedirect<'py> {
	pub(crate) fn install(py: Python<'py>, target: &Bound<'py, PyAny>) -> PyResult<Self> {
		let sys = py.import_bound("sys")?;
		let previous = sys.getattr("stdout")?;
		sys.setattr("stdout", target)?;

		Ok(Self { sys, previous })
	}
}

impl Drop for StdoutRedirect<'_> {
	fn drop(&mut self) {
		if let Err(error) = self.sys.setattr("stdout", &self.previous) {
			tracing::warn!(%error, "failed to restore sys.stdout");
		}
	}
}

/// A reusable capture buffer standing in for `sys.stdout`.
pub struct OutputCapture {
	buffer: Py<PyAny>,
}

impl OutputCapture {
	pub fn new(py: Python<'_>) -> PitagResult<Self> {
		let buffer = py
			.import_bound("io")
			.and_then(|io| io.getattr("StringIO"))
			.and_then(|string_io| string_io.call0())
			.map_err(|e| PitagError::Interpreter(e.to_string()))?;

		Ok(Self {
			buffer: buffer.unbind(),
		})
	}

	fn clear(buffer: &Bound<'_, PyAny>) -> PyResult<()> {
		buffer.call_method1("truncate", (0,))?;
		buffer.call_method1("seek", (0,))?;
		Ok(())
	}

	/// Run `evaluate` with `sys.stdout` pointing at the (emptied) buffer and
	/// return everything it printed. The redirection is undone before this
	/// returns, whether or not `evaluate` succeeded.
	pub fn capture<F>(&self, py: Python<'_>, evaluate: F) -> PitagResult<String>
	where
		F: FnOnce() -> PitagResult<()>,
	{
		let buffer = self.buffer.bind(py);
		Self::clear(buffer).map_err(|e| PitagError::Interpreter(e.to_string()))?;

		{
			let _redirect = StdoutRedirect::install(py, buffer)
				.map_err(|e| PitagError::Interpreter(e.to_string()))?;
			evaluate()?;
		}

		buffer
			.call_method0("getvalue")
			.and_then(|value| value.extract::<String>())
			.map_err(|e| PitagError::Interpreter(e.to_string()))
	}
}
