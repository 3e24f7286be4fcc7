//! the compiler binary. takes a BFS source file and writes the compiled
//! Brainfuck next to it (or wherever `-o` points). `--debug` additionally
//! dumps the intermediate instructions and marks each output line.
//!
//! run with `--help` for more info.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use bfs::back::CodeGen;
use bfs::front;
use bfs::Error;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    #[arg(default_value = "main.bfs")]
    file: PathBuf,
    /// the output file (default: input with `.bfs` replaced by `.bf`)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// dump the IR to instructions.bfi and mark each BF line with `#`
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn output_path(input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) if ext == "bfs" => input.with_extension("bf"),
        _ => {
            let mut name = input.as_os_str().to_owned();
            name.push(".bf");
            PathBuf::from(name)
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let source = std::fs::read_to_string(&args.file)?;
    let source = front::process_includes(&source, Some(&args.file))?;
    let ast = front::parse(&source)?;
    let ir = front::lower(&ast)?;

    if args.debug {
        std::fs::write("instructions.bfi", ir.to_string())?;
        eprintln!("Debug: intermediate instructions written to instructions.bfi");
    }

    let code = CodeGen::new(args.debug).generate(&ir);
    let output = args.output.clone().unwrap_or_else(|| output_path(&args.file));
    std::fs::write(&output, code)?;
    println!("Compilation complete. Output written to {}", output.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
