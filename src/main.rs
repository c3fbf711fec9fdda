// External Modules
extern crate exitcode;

use std::fs::File;
use std::io::stdin;
use std::path::PathBuf;

use clap::Parser;
use simple_error::{bail, SimpleError};

use minako::{read_source, run, RunError, DEFAULT_STACK_SIZE};

/// Command line interface for the C1/Minako interpreter (spec §6).
#[derive(Parser)]
#[clap(about = "Tree-walking interpreter for the C1/Minako language")]
struct CliOptions {
    /// Source file to interpret. Reads standard input when omitted.
    #[clap(parse(from_os_str))]
    source: Option<PathBuf>,

    /// Emit indented dispatch tracing to stderr (disabled by default).
    #[clap(long, action)]
    trace: bool,

    /// Overrides the evaluator's fixed-capacity value stack (default 1024 slots).
    #[clap(long, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: usize,

    /// Dumps the final symbol table to stderr after a successful run.
    #[clap(long, action)]
    dump_symbols: bool,
}

impl CliOptions {
    fn validate(&self) -> Result<(), SimpleError> {
        if self.stack_size == 0 {
            bail!("--stack-size must be greater than zero");
        }
        Ok(())
    }

    fn load_source(&self) -> Result<String, SimpleError> {
        match &self.source {
            Some(path) => {
                let mut file = File::open(path)
                    .map_err(|err| SimpleError::new(format!("{}: {}", path.display(), err)))?;
                read_source(&mut file).map_err(|err| SimpleError::new(err.to_string()))
            }
            None => read_source(&mut stdin()).map_err(|err| SimpleError::new(err.to_string())),
        }
    }
}

fn main() {
    let options = CliOptions::parse();

    if let Err(err) = options.validate() {
        eprintln!("{}", err);
        std::process::exit(exitcode::USAGE);
    }

    let source = match options.load_source() {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(exitcode::NOINPUT);
        }
    };

    match run(&source, options.stack_size, options.trace) {
        Ok(report) => {
            if options.dump_symbols {
                eprint!("{}", report.symbols);
            }
            std::process::exit(exitcode::OK);
        }
        Err(RunError::Compile(err)) => {
            eprintln!("{}", err);
            std::process::exit(exitcode::DATAERR);
        }
        Err(RunError::Fatal(err)) => {
            eprintln!("{}", err);
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}
