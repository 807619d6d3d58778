// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact kinds, local build outputs, and uploaded artifact references.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Named build output.
///
/// Serializes as a string:
/// - `"application-archive"`
/// - `"build-artifacts"`
/// - `"build-logs"`
/// - `"workflow:<name>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// The installable application (apk, aab, ipa)
    ApplicationArchive,
    /// Additional files the project asked to keep
    BuildArtifacts,
    /// Platform build-tool logs (gradle, xcodebuild)
    BuildLogs,
    /// Generic artifact produced by a workflow step
    Workflow(String),
}

impl ArtifactKind {
    const WORKFLOW_PREFIX: &'static str = "workflow:";

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "application-archive" => Some(ArtifactKind::ApplicationArchive),
            "build-artifacts" => Some(ArtifactKind::BuildArtifacts),
            "build-logs" => Some(ArtifactKind::BuildLogs),
            other => other
                .strip_prefix(Self::WORKFLOW_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| ArtifactKind::Workflow(name.to_string())),
        }
    }

    /// File-name stem used when several files are packed into one archive.
    pub fn archive_stem(&self) -> String {
        match self {
            ArtifactKind::Workflow(name) => format!("workflow-{}", name),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::ApplicationArchive => f.write_str("application-archive"),
            ArtifactKind::BuildArtifacts => f.write_str("build-artifacts"),
            ArtifactKind::BuildLogs => f.write_str("build-logs"),
            ArtifactKind::Workflow(name) => write!(f, "{}{}", Self::WORKFLOW_PREFIX, name),
        }
    }
}

impl serde::Serialize for ArtifactKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ArtifactKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ArtifactKind::parse(&s).ok_or_else(|| {
            serde::de::Error::unknown_variant(
                &s,
                &["application-archive", "build-artifacts", "build-logs", "workflow:<name>"],
            )
        })
    }
}

/// References to uploaded artifacts, keyed by kind.
///
/// A reference is either a registered bucket key or, after a fallback
/// upload, the plain file name the launcher stores itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Artifacts(BTreeMap<ArtifactKind, String>);

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ArtifactKind, reference: impl Into<String>) {
        self.0.insert(kind, reference.into());
    }

    pub fn get(&self, kind: &ArtifactKind) -> Option<&str> {
        self.0.get(kind).map(String::as_str)
    }

    pub fn application_archive(&self) -> Option<&str> {
        self.get(&ArtifactKind::ApplicationArchive)
    }

    pub fn build_artifacts(&self) -> Option<&str> {
        self.get(&ArtifactKind::BuildArtifacts)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactKind, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }
}

/// Local files the build runner produced, keyed by kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BuildOutputs(BTreeMap<ArtifactKind, Vec<PathBuf>>);

impl BuildOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ArtifactKind, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.0.entry(kind).or_default().extend(paths);
        self
    }

    pub fn get(&self, kind: &ArtifactKind) -> Option<&[PathBuf]> {
        self.0.get(kind).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Non-empty outputs in upload order: application archive first, then
    /// build artifacts, logs, and workflow artifacts by name.
    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactKind, &[PathBuf])> {
        self.0.iter().filter(|(_, paths)| !paths.is_empty()).map(|(k, v)| (k, v.as_slice()))
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
