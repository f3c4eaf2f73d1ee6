// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Builds the workspace artifacts the end-to-end tests need (the segvtrace
//! cdylib and the host fixture binary) by shelling out to cargo, and caches
//! the results so every test can ask for them without rebuilding.
//!
//! Assumes it runs from a cargo `#[test]`, which is how the path of the
//! current test binary leads back to the `target/` directory.

use anyhow::Context;
use once_cell::sync::OnceCell;
use std::{collections::HashMap, env, path::PathBuf, process, sync::Mutex};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ArtifactType {
    Bin,
    CDylib,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BuildProfile {
    Debug,
    Release,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ArtifactsBuild {
    pub name: String,
    pub artifact_type: ArtifactType,
    pub build_profile: BuildProfile,
    /// Set when the crate's `[lib] name` differs from the package name.
    pub lib_name_override: Option<String>,
}

/// The preloadable segvtrace shared library.
pub fn segvtrace_cdylib(profile: BuildProfile) -> ArtifactsBuild {
    ArtifactsBuild {
        name: "libdd-segvtrace".to_owned(),
        artifact_type: ArtifactType::CDylib,
        build_profile: profile,
        lib_name_override: Some("dd_segvtrace".to_owned()),
    }
}

/// The host-process fixture: optionally installs its own SIGSEGV handler,
/// announces itself, then faults (or waits).
pub fn fault_host(profile: BuildProfile) -> ArtifactsBuild {
    ArtifactsBuild {
        name: "fault_host".to_owned(),
        artifact_type: ArtifactType::Bin,
        build_profile: profile,
        lib_name_override: None,
    }
}

/// Builds (or reuses) every requested artifact and returns its path on disk.
pub fn build_artifacts<'b>(
    requested: &[&'b ArtifactsBuild],
) -> anyhow::Result<HashMap<&'b ArtifactsBuild, PathBuf>> {
    static CACHE: OnceCell<Mutex<HashMap<ArtifactsBuild, PathBuf>>> = OnceCell::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let mut paths = HashMap::new();
    for &artifact in requested {
        let mut cache = cache.lock().unwrap();
        if let Some(path) = cache.get(artifact) {
            paths.insert(artifact, path.clone());
            continue;
        }
        let path = cargo_build(artifact)?;
        cache.insert(artifact.clone(), path.clone());
        paths.insert(artifact, path);
    }
    Ok(paths)
}

fn cargo_build(artifact: &ArtifactsBuild) -> anyhow::Result<PathBuf> {
    let mut cmd = process::Command::new(env!("CARGO"));
    cmd.arg("build");
    if artifact.build_profile == BuildProfile::Release {
        cmd.arg("--release");
    }
    match artifact.artifact_type {
        ArtifactType::CDylib => cmd.arg("-p"),
        ArtifactType::Bin => cmd.arg("--bin"),
    };
    cmd.arg(&artifact.name);

    let output = cmd.output().context("running cargo build")?;
    anyhow::ensure!(
        output.status.success(),
        "cargo build of {} failed:\n{}",
        artifact.name,
        String::from_utf8_lossy(&output.stderr)
    );

    let mut path = target_dir()?.clone();
    path.push(match artifact.build_profile {
        BuildProfile::Debug => "debug",
        BuildProfile::Release => "release",
    });
    match artifact.artifact_type {
        ArtifactType::Bin => path.push(&artifact.name),
        ArtifactType::CDylib => {
            let stem = artifact
                .lib_name_override
                .as_deref()
                .unwrap_or(&artifact.name)
                .replace('-', "_");
            let ext = shared_lib_extension(current_platform::CURRENT_PLATFORM)?;
            path.push(format!("lib{stem}.{ext}"));
        }
    }
    Ok(path)
}

/// The `target/` directory, located by walking up from the path of the
/// running test binary (which cargo placed inside it).
fn target_dir() -> anyhow::Result<&'static PathBuf> {
    static TARGET_DIR: OnceCell<PathBuf> = OnceCell::new();
    TARGET_DIR.get_or_try_init(|| {
        let test_bin = PathBuf::from(env::args().next().context("argv[0] missing")?);
        let mut dir = test_bin.as_path();
        while let Some(parent) = dir.parent() {
            if dir.file_name().is_some_and(|name| name == "target") {
                return Ok(dir.to_path_buf());
            }
            dir = parent;
        }
        anyhow::bail!("test binary {test_bin:?} does not live under a target directory")
    })
}

fn shared_lib_extension(triple: &str) -> anyhow::Result<&'static str> {
    if triple.contains("linux") {
        Ok("so")
    } else if triple.contains("apple") {
        Ok("dylib")
    } else if triple.contains("windows") {
        Ok("dll")
    } else {
        anyhow::bail!("unknown shared library extension for target {triple}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_lib_extension_per_platform() {
        assert_eq!(
            shared_lib_extension("x86_64-unknown-linux-gnu").unwrap(),
            "so"
        );
        assert_eq!(
            shared_lib_extension("aarch64-apple-darwin").unwrap(),
            "dylib"
        );
        assert!(shared_lib_extension("wasm32-unknown-unknown").is_err());
    }

    #[test]
    fn test_cdylib_artifact_uses_lib_name() {
        let artifact = segvtrace_cdylib(BuildProfile::Debug);
        assert_eq!(artifact.lib_name_override.as_deref(), Some("dd_segvtrace"));
    }
}
