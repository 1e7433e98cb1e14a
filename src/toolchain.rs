//! Locates external programs needed for conversion

use crate::error::*;
use std::path::{Path, PathBuf};
use tracing::info;

pub const AVIFENC: &str = "avifenc";

/// External executables used by the converter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub avifenc: PathBuf,
}

impl Toolchain {
    /// Uses the given executable without checking it
    #[must_use]
    pub fn with_avifenc(avifenc: impl Into<PathBuf>) -> Self {
        Self { avifenc: avifenc.into() }
    }

    /// Uses the executable at `path`, which must be an existing file
    pub fn at_path(avifenc: impl Into<PathBuf>) -> ConvResult<Self> {
        let avifenc = avifenc.into();
        if !avifenc.is_file() {
            return Err(Error::ToolMissing(AVIFENC, avifenc));
        }
        info!("Using {AVIFENC}: {}", avifenc.display());
        Ok(Self { avifenc })
    }

    /// Looks next to the running executable first, then in `PATH`
    pub fn discover() -> ConvResult<Self> {
        let exe_dir = std::env::current_exe().ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::discover_in(exe_dir.as_deref())
    }

    /// Looks in `local_dir` first (if given), then in `PATH`
    pub fn discover_in(local_dir: Option<&Path>) -> ConvResult<Self> {
        let avifenc = find_tool(AVIFENC, local_dir).ok_or(Error::ToolNotFound(AVIFENC))?;
        Ok(Self { avifenc })
    }
}

fn find_tool(name: &str, local_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = local_dir {
        for file_name in [name.to_owned(), format!("{name}.exe")] {
            let local_path = dir.join(file_name);
            if local_path.is_file() {
                info!("Using local {name}: {}", local_path.display());
                return Some(local_path);
            }
        }
    }
    let path = which::which(name).ok()?;
    info!("Using system {name}: {}", path.display());
    Some(path)
}

#[test]
fn prefers_local() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join(AVIFENC);
    std::fs::write(&local, b"").unwrap();
    let t = Toolchain::discover_in(Some(dir.path())).unwrap();
    assert_eq!(t.avifenc, local);
}

#[test]
fn local_exe_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("avifenc.exe");
    std::fs::write(&local, b"").unwrap();
    assert_eq!(find_tool(AVIFENC, Some(dir.path())), Some(local));
}

#[test]
fn missing() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(find_tool("gif2avif-no-such-tool", Some(dir.path())), None);
}

#[test]
fn explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("my-avifenc");
    let err = Toolchain::at_path(&path).unwrap_err();
    assert!(matches!(&err, Error::ToolMissing(AVIFENC, p) if *p == path));
    assert!(err.to_string().starts_with("Can't find `avifenc` at "), "{err}");
    assert!(!err.to_string().contains("input file"));

    // A directory isn't an executable
    assert!(Toolchain::at_path(dir.path()).is_err());

    std::fs::write(&path, b"").unwrap();
    assert_eq!(Toolchain::at_path(&path).unwrap().avifenc, path);
}
