//! This module provides the `ProgramLoader` struct, responsible for loading definitions
//! and run configuration from files and strings.
//!
//! Files ending in `.json` are decoded as serialized [`Program`]s; anything else is read
//! with the `.fl` text format.

use crate::analyzer::analyze;
use crate::parser::parse;
use crate::program::Program;
use crate::types::{Config, FormalLanguageError};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of the line-oriented text format.
pub const PROGRAM_EXTENSION: &str = "fl";

/// `ProgramLoader` is a utility struct for loading definitions.
/// It provides methods to load programs from individual files, from string content,
/// and to discover and load every definition within a specified directory.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Loads a single definition from the specified file path.
    ///
    /// # Arguments
    ///
    /// * `path` - A reference to the `Path` of a `.fl` or `.json` file.
    ///
    /// # Returns
    ///
    /// * `Ok(Program)` if the file is successfully read, decoded and validated.
    /// * `Err(FormalLanguageError::FileError)` if the file cannot be read.
    /// * `Err(FormalLanguageError::ParseError)` if a text definition is malformed.
    /// * `Err(FormalLanguageError::SerializationError)` if a JSON definition is malformed.
    pub fn load_program(path: &Path) -> Result<Program, FormalLanguageError> {
        let content = read(path)?;
        debug!("Loading definition from {}", path.display());

        if is_json(path) {
            Self::load_program_from_json(&content)
        } else {
            parse(&content)
        }
    }

    /// Loads a single definition from text content.
    ///
    /// This is useful for definitions that are not stored in files, e.g., from user input.
    pub fn load_program_from_string(content: &str) -> Result<Program, FormalLanguageError> {
        parse(content)
    }

    /// Decodes a JSON definition and validates it the same way parsed text is.
    pub fn load_program_from_json(content: &str) -> Result<Program, FormalLanguageError> {
        let program: Program = serde_json::from_str(content)?;
        analyze(&program)?;

        Ok(program)
    }

    /// Loads a run configuration. Keys that are left out keep their defaults.
    pub fn load_config(path: &Path) -> Result<Config, FormalLanguageError> {
        let content = read(path)?;
        let config = serde_json::from_str(&content)?;
        debug!("Loaded configuration {:?} from {}", config, path.display());

        Ok(config)
    }

    /// Loads every definition file (`.fl` or `.json`) from a given directory.
    ///
    /// Results are sorted by path. Directories and other files are skipped.
    ///
    /// # Returns
    ///
    /// * `Vec<Result<(PathBuf, Program), FormalLanguageError>>` - one entry per candidate
    ///   file, holding either its path and `Program` or the error that stopped it loading.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Program), FormalLanguageError>> {
        if !directory.exists() {
            return vec![Err(FormalLanguageError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(FormalLanguageError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(FormalLanguageError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }
        paths.sort();

        for path in paths {
            // Skip directories and files in other formats
            if path.is_dir() || !(is_json(&path) || has_extension(&path, PROGRAM_EXTENSION)) {
                continue;
            }

            match Self::load_program(&path) {
                Ok(program) => results.push(Ok((path, program))),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    results.push(Err(FormalLanguageError::FileError(format!(
                        "Failed to load program from {}: {}",
                        path.display(),
                        e
                    ))));
                }
            }
        }

        results
    }
}

fn read(path: &Path) -> Result<String, FormalLanguageError> {
    fs::read_to_string(path).map_err(|e| {
        FormalLanguageError::FileError(format!("Failed to read file {}: {}", path.display(), e))
    })
}

fn is_json(path: &Path) -> bool {
    has_extension(path, "json")
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}
