// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for dvc.yaml pipeline files.
//!
//! The surface syntax is forgiving: `cmd` may be a string or a list of
//! strings, and `deps`/`outs` may be a list, a mapping, or a bare scalar.
//! Everything is normalized here so the rest of the system only ever sees
//! canonical [`Stage`] records.

use indexmap::IndexMap;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};

use stagerun_core::Stage;
use thiserror::Error;

/// Errors that can occur while parsing a pipeline file
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("pipeline file not found at {0}")]
    SpecMissing(PathBuf),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("pipeline must contain a 'stages' section")]
    MissingStages,

    #[error("stage '{stage}' missing required 'cmd' field")]
    MissingCmd { stage: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a dvc.yaml file into stage records, in declaration order.
pub fn parse_pipeline(path: &Path) -> Result<Vec<Stage>, ParseError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ParseError::SpecMissing(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };
    parse_pipeline_str(&text)
}

/// Parse dvc.yaml content into stage records, in declaration order.
pub fn parse_pipeline_str(text: &str) -> Result<Vec<Stage>, ParseError> {
    // An empty document deserializes as null; treat it like a missing
    // stages section rather than a YAML type error.
    let file: Option<PipelineFile> = serde_yaml::from_str(text)?;
    let stages = file
        .and_then(|f| f.stages)
        .ok_or(ParseError::MissingStages)?;

    stages
        .into_iter()
        .map(|(name, config)| config.into_stage(name))
        .collect()
}

#[derive(Deserialize)]
struct PipelineFile {
    #[serde(default)]
    stages: Option<IndexMap<String, StageConfig>>,
}

#[derive(Deserialize)]
struct StageConfig {
    #[serde(default)]
    cmd: Option<CmdField>,
    #[serde(default)]
    deps: PathList,
    #[serde(default)]
    outs: PathList,
    #[serde(default)]
    desc: Option<String>,
}

impl StageConfig {
    fn into_stage(self, name: String) -> Result<Stage, ParseError> {
        let cmd = self
            .cmd
            .ok_or_else(|| ParseError::MissingCmd {
                stage: name.clone(),
            })?
            .joined();

        Ok(Stage {
            name,
            cmd,
            deps: self.deps.0,
            outs: self.outs.0,
            desc: self.desc,
        })
    }
}

/// A command that is either one shell string or an ordered list of them.
///
/// A list is flattened into a single command with `&&` so that later
/// commands only run if earlier ones succeed.
#[derive(Deserialize)]
#[serde(untagged)]
enum CmdField {
    Single(String),
    Sequence(Vec<String>),
}

impl CmdField {
    fn joined(self) -> String {
        match self {
            CmdField::Single(cmd) => cmd,
            CmdField::Sequence(cmds) => cmds.join(" && "),
        }
    }
}

/// Normalized list of path strings.
///
/// Accepts:
///   `deps: [a.txt, b.txt]`          — sequence (common case)
///   `deps: {params: [p.yaml]}`      — mapping; values are taken in order
///   `deps: a.txt`                   — bare scalar
#[derive(Debug, Default, PartialEq, Eq)]
struct PathList(Vec<String>);

impl<'de> Deserialize<'de> for PathList {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct PathListVisitor;

        impl<'de> Visitor<'de> for PathListVisitor {
            type Value = PathList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a path, a sequence of paths, or a mapping of path lists")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<PathList, E> {
                Ok(PathList(vec![value.to_string()]))
            }

            fn visit_seq<S>(self, mut seq: S) -> Result<PathList, S::Error>
            where
                S: SeqAccess<'de>,
            {
                let mut paths = Vec::new();
                while let Some(path) = seq.next_element::<String>()? {
                    paths.push(path);
                }
                Ok(PathList(paths))
            }

            fn visit_map<M>(self, mut map: M) -> Result<PathList, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut paths = Vec::new();
                while let Some((_, value)) = map.next_entry::<String, PathListValue>()? {
                    match value {
                        PathListValue::Single(path) => paths.push(path),
                        PathListValue::Sequence(list) => paths.extend(list),
                    }
                }
                Ok(PathList(paths))
            }
        }

        d.deserialize_any(PathListVisitor)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathListValue {
    Single(String),
    Sequence(Vec<String>),
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
