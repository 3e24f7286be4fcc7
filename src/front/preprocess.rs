//! The `#include` preprocessor.
//!
//! Resolves `#include "path"` directives by textual substitution before the
//! source ever reaches the lexer.  Substitution is recursive; the chain of
//! files currently being expanded travels along so cycles are detected.

use std::io;
use std::path::{Path, PathBuf};

use derive_more::Display;

use crate::common::Set;

#[derive(Debug, Display)]
pub enum PreprocessError {
    #[display("Invalid include directive: {line}")]
    InvalidInclude { line: String },
    #[display("Include file not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[display("Circular include detected: {}", path.display())]
    CircularInclude { path: PathBuf },
    #[display("{_0}")]
    Io(io::Error),
}

impl From<io::Error> for PreprocessError {
    fn from(err: io::Error) -> Self {
        PreprocessError::Io(err)
    }
}

/// Expand every `#include` directive in `source`.  Paths resolve relative to
/// `current_file`'s directory when given, else the working directory.
pub fn process_includes(
    source: &str,
    current_file: Option<&Path>,
) -> Result<String, PreprocessError> {
    let mut included = Set::new();
    if let Some(file) = current_file {
        included.insert(canonical(file));
    }
    expand(source, current_file, &included)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn expand(
    source: &str,
    current_file: Option<&Path>,
    included: &Set<PathBuf>,
) -> Result<String, PreprocessError> {
    let mut result = Vec::new();

    for line in source.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with("#include") {
            result.push(line.to_owned());
            continue;
        }

        let name = include_target(trimmed).ok_or_else(|| PreprocessError::InvalidInclude {
            line: trimmed.to_owned(),
        })?;
        let path = match current_file.and_then(Path::parent) {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        };
        let path = canonical(&path);

        if included.contains(&path) {
            return Err(PreprocessError::CircularInclude { path });
        }

        let content = std::fs::read_to_string(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                PreprocessError::FileNotFound { path: path.clone() }
            } else {
                PreprocessError::Io(err)
            }
        })?;

        // Each directive carries its own copy of the chain: diamond includes
        // are fine, only true cycles are rejected.
        let mut chain = included.clone();
        chain.insert(path.clone());
        let expanded = expand(&content, Some(&path), &chain)?;

        result.push(format!("// Begin included file: {name}"));
        result.push(expanded);
        result.push(format!("// End included file: {name}"));
    }

    Ok(result.join("\n"))
}

/// Pull the quoted path out of an `#include "path"` line.
fn include_target(line: &str) -> Option<&str> {
    let mut parts = line.splitn(3, '"');
    parts.next()?;
    parts.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bfs-preprocess-{}-{test}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn substitutes_file_contents() {
        let dir = scratch_dir("basic");
        std::fs::write(dir.join("lib.bfs"), "var shared = 1;\n").unwrap();
        let main = dir.join("main.bfs");
        std::fs::write(&main, "#include \"lib.bfs\"\noutput(shared);\n").unwrap();

        let out = process_includes("#include \"lib.bfs\"\noutput(shared);", Some(&main)).unwrap();
        assert!(out.contains("// Begin included file: lib.bfs"));
        assert!(out.contains("var shared = 1;"));
        assert!(out.contains("// End included file: lib.bfs"));
        assert!(out.contains("output(shared);"));
    }

    #[test]
    fn detects_circular_includes() {
        let dir = scratch_dir("circular");
        std::fs::write(dir.join("a.bfs"), "#include \"b.bfs\"\n").unwrap();
        std::fs::write(dir.join("b.bfs"), "#include \"a.bfs\"\n").unwrap();

        let err =
            process_includes("#include \"b.bfs\"", Some(&dir.join("a.bfs"))).unwrap_err();
        assert!(matches!(err, PreprocessError::CircularInclude { .. }), "{err}");
    }

    #[test]
    fn missing_file() {
        let dir = scratch_dir("missing");
        let err = process_includes("#include \"nowhere.bfs\"", Some(&dir.join("main.bfs")))
            .unwrap_err();
        assert!(matches!(err, PreprocessError::FileNotFound { .. }), "{err}");
    }

    #[test]
    fn malformed_directive() {
        let err = process_includes("#include noquotes", None).unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidInclude { .. }), "{err}");
    }

    #[test]
    fn plain_source_passes_through() {
        let source = "var x = 1;\noutput(x);";
        assert_eq!(process_includes(source, None).unwrap(), source);
    }
}
