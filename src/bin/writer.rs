//! ReplayLog Writer Binary
//!
//! Creates or overwrites a file with a literal string.

use clap::Parser;
use replaylog::logging::{self, LogBackend};
use replaylog::tools::writer::write_string;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "replaylog-writer")]
#[command(about = "Write a string to a file, replacing its contents")]
#[command(version)]
struct Args {
    /// File to create or overwrite
    writefile: PathBuf,

    /// Text written verbatim
    writestr: String,
}

fn main() -> ExitCode {
    if let Err(e) = logging::init(false, LogBackend::Stderr) {
        eprintln!("{}", e);
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            eprintln!("Error: Missing parameters. Usage: replaylog-writer <writefile> <writestr>");
            error!("Invalid arguments: {}", e.kind());
            return ExitCode::from(1);
        }
        Err(e) => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    match write_string(&args.writefile, &args.writestr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: Could not write to file '{}': {}", args.writefile.display(), e);
            ExitCode::from(1)
        }
    }
}
