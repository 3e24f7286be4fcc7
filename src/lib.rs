//! This is the compiler as a library.  See `src/bin` directory for the
//! executable program using this library.
//!
//! The pipeline has three stages: the front-end preprocesses, parses and
//! lowers BFS source to a register-machine IR; the middle-end holds the IR
//! definition and the expression optimiser; the back-end emits Brainfuck.

pub mod common;
pub mod front;
pub mod middle;
pub mod back;

use std::io;
use std::path::Path;

use derive_more::{Display, From};

use front::lower::LowerError;
use front::parse::ParseError;
use front::preprocess::PreprocessError;

/// Anything that can abort a compilation.  The first failure terminates the
/// run; nothing is written to the output file.
#[derive(Debug, Display, From)]
pub enum Error {
    #[display("{_0}")]
    Preprocess(PreprocessError),
    #[display("{_0}")]
    Parse(ParseError),
    #[display("{_0}")]
    Lower(LowerError),
    #[display("{_0}")]
    Io(io::Error),
}

/// Compile a BFS source string to Brainfuck.
pub fn compile(source: &str, debug: bool) -> Result<String, Error> {
    let ast = front::parse(source)?;
    let ir = front::lower(&ast)?;
    Ok(back::CodeGen::new(debug).generate(&ir))
}

/// Compile a BFS file to Brainfuck, resolving `#include` directives relative
/// to the file's directory.
pub fn compile_file(path: &Path, debug: bool) -> Result<String, Error> {
    let source = std::fs::read_to_string(path)?;
    let source = front::preprocess::process_includes(&source, Some(path))?;
    compile(&source, debug)
}
