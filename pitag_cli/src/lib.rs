use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about = "Execute the python code in processing instruction tags and replace the tags with what it \
	         printed.",
	long_about = "pitag is a streaming preprocessor for XML-like documents.\n\nIt runs the python \
	              code found in processing instructions such as `<?py print(1 + 1) ?>` and \
	              replaces each instruction with whatever the code wrote to `sys.stdout`. All \
	              instructions in all input documents share one python namespace, so a function \
	              defined near the top of the first document can be called anywhere \
	              after it.\n\nExamples:\n  pitag page.xml.in -o page.xml\n  pitag -c \"import \
	              datetime\" header.in body.in > out.xml\n  cat page.in | pitag -t python"
)]
pub struct PitagCli {
	/// The processing instruction target for python code. The default target
	/// is `py`, i.e. tags like `<?py ... ?>`.
	#[arg(long, short = 't', value_name = "TARGET")]
	pub pi_target: Option<String>,

	/// Python code to execute before handling any document. May be given
	/// several times; snippets run in order and anything they print is
	/// discarded.
	#[arg(long = "exec", short = 'c', value_name = "COMMAND")]
	pub exec: Vec<String>,

	/// Do not use colors when printing error messages.
	#[arg(long, default_value_t = false)]
	pub no_color: bool,

	/// Path to the output file. Omitting it writes to stdout.
	#[arg(long, short, value_name = "FILE")]
	pub output: Option<PathBuf>,

	/// Path to a config file. Defaults to `pitag.toml` or `.pitag.toml` in the
	/// current directory when one exists.
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Enable verbose logging on stderr.
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,

	/// Source documents, processed in order. Omitting them (or passing `-`)
	/// reads from stdin.
	#[arg(value_name = "INPUT")]
	pub inputs: Vec<PathBuf>,
}
