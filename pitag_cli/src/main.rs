use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use pitag_cli::PitagCli;
use pitag_core::COMMAND_LINE_ORIGIN;
use pitag_core::PitagError;
use pitag_core::PitagResult;
use pitag_core::Processor;
use pitag_core::STDIN_ORIGIN;
use pitag_core::config::PitagConfig;
use pitag_core::scanner::DEFAULT_TARGET;
use tracing_subscriber::EnvFilter;

fn main() {
	let args = PitagCli::parse();
	init_tracing(args.verbose);

	let config = load_config(&args);
	let use_color = !args.no_color
		&& !config.as_ref().is_ok_and(|config| config.no_color)
		&& supports_color::on(supports_color::Stream::Stderr).is_some();

	// Install miette's fancy handler for everything that is not a document
	// diagnostic.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	if let Err(e) = config.and_then(|config| run(&args, &config)) {
		process::exit(report(e, use_color));
	}
}

fn init_tracing(verbose: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_env("PITAG_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.without_time()
		.init();
}

fn load_config(args: &PitagCli) -> PitagResult<PitagConfig> {
	if let Some(path) = &args.config {
		return PitagConfig::load_file(path);
	}

	let root = std::env::current_dir()?;
	Ok(PitagConfig::load(&root)?.unwrap_or_default())
}

fn run(args: &PitagCli, config: &PitagConfig) -> PitagResult<()> {
	let target = args
		.pi_target
		.as_deref()
		.or(config.target.as_deref())
		.unwrap_or(DEFAULT_TARGET);
	tracing::debug!(
		pi_target = target,
		config_root = %config.root.display(),
		exec = config.exec.len() + args.exec.len(),
		"resolved options"
	);

	let output: Box<dyn Write> = match &args.output {
		Some(path) => Box::new(BufWriter::new(File::create(path)?)),
		None => Box::new(BufWriter::new(io::stdout().lock())),
	};
	let mut processor = Processor::with_target(output, target)?;

	for snippet in &config.exec {
		processor.exec(snippet, COMMAND_LINE_ORIGIN)?;
	}
	for path in config.resolved_exec_files() {
		processor.exec_file(&path)?;
	}
	for snippet in &args.exec {
		processor.exec(snippet, COMMAND_LINE_ORIGIN)?;
	}

	if args.inputs.is_empty() {
		processor.process(io::stdin().lock(), STDIN_ORIGIN)?;
	}
	for input in &args.inputs {
		tracing::debug!(input = %input.display(), "processing input");
		if input == Path::new("-") {
			processor.process(io::stdin().lock(), STDIN_ORIGIN)?;
		} else {
			processor.process_path(input)?;
		}
	}

	processor.finish()?;
	Ok(())
}

/// Print a document diagnostic the way python prints an uncaught exception,
/// or fall back to miette for everything else. A snippet calling `sys.exit`
/// exits with its status. Returns the exit code.
fn report(error: PitagError, use_color: bool) -> i32 {
	if let PitagError::Exit { status, .. } = &error {
		eprint!("{}", error.render());
		return *status;
	}

	if !error.is_diagnostic() {
		let report: miette::Report = error.into();
		eprintln!("{report:?}");
		return 2;
	}

	let text = error.render();
	let mut stderr = io::stderr().lock();
	let _ = if use_color {
		write!(stderr, "{}", text.red().bold())
	} else {
		write!(stderr, "{text}")
	};

	1
}
