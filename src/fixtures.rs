//! Loader for the file-based test corpus under `tests/programs/`.
//!
//! Each case is a directory holding `program.monkey`, a `case.yaml` spec and
//! the expected output files the spec points at.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    /// Program runs to completion; `stdout_file` holds the expected output.
    RuntimeSuccess,
    /// Lexing or parsing fails; `error_contains_file` holds a fragment of
    /// the expected message.
    FrontendError,
    /// Both backends fail at runtime with the same message fragment.
    RuntimeError,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpectedOutcome {
    pub stdout_file: Option<String>,
    pub error_contains_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    pub expected: ExpectedOutcome,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    /// Reads an expectation file named by the case spec, relative to the
    /// case directory.
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path)).with_context(|| {
            format!(
                "case {}: missing expectation file {relative_path}",
                self.name
            )
        })
    }
}

/// Collects every case directory under `programs_dir`, sorted by name.
/// Directories without a `case.yaml` are skipped.
pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let entries = fs::read_dir(programs_dir).with_context(|| {
        format!(
            "case corpus directory {} is unreadable",
            programs_dir.display()
        )
    })?;

    let mut cases = Vec::new();
    for entry in entries {
        if let Some(case) = load_case(&entry?.path())? {
            cases.push(case);
        }
    }

    if cases.is_empty() {
        bail!("case corpus {} holds no cases", programs_dir.display());
    }
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}

fn load_case(dir: &Path) -> Result<Option<Case>> {
    let spec_path = dir.join("case.yaml");
    if !spec_path.is_file() {
        return Ok(None);
    }

    let name = match dir.file_name().and_then(|value| value.to_str()) {
        Some(name) => name.to_string(),
        None => bail!("case directory {} has a non-UTF-8 name", dir.display()),
    };

    let spec_raw = fs::read_to_string(&spec_path)
        .with_context(|| format!("case {name}: reading case.yaml"))?;
    let spec: CaseSpec = serde_yaml::from_str(&spec_raw)
        .with_context(|| format!("case {name}: case.yaml is not a valid spec"))?;

    let program_path = dir.join("program.monkey");
    if !program_path.is_file() {
        bail!("case {name} has no program.monkey");
    }

    Ok(Some(Case {
        name,
        dir: dir.to_path_buf(),
        program_path,
        spec,
    }))
}
