//! Extraction of assembly metadata from files on disk.
//!
//! The probe reads the line-oriented manifest at the start of an assembly
//! file and returns everything the resolver needs to know about it: its own
//! identity, the identities it references, scatter files, runtime version and
//! architecture. It is a pure function of the file content and is only ever
//! invoked through the [`ProbeCache`](crate::cache::ProbeCache).

use crate::identity::{AssemblyIdentity, AssemblyVersion, ProcessorArchitecture};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

/// The default runtime version assumed when a manifest carries none.
pub const DEFAULT_RUNTIME_VERSION: &str = "v2.0.50727";

/// Why a file could not be probed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The file exists but does not carry a readable assembly manifest.
    #[error("bad image: {0}")]
    BadImage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything extracted from one assembly file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// The identity stated by the file's own manifest.
    pub identity: AssemblyIdentity,
    /// Identities of the assemblies this file references, in manifest order.
    pub references: Vec<AssemblyIdentity>,
    /// File names of additional modules belonging to this assembly.
    pub scatter_files: Vec<String>,
    /// Runtime version string, e.g. `v4.0.30319`.
    pub runtime_version: String,
    pub architecture: ProcessorArchitecture,
    pub is_winmd: bool,
    /// Target framework moniker, if recorded.
    pub framework_name: Option<String>,
    /// Assembly-level file version, consulted as a conflict tie-break.
    pub file_version: Option<AssemblyVersion>,
}

/// Probes the assembly file at `path`.
///
/// Returns [`ProbeError::BadImage`] if the content is not a well-formed
/// assembly manifest and [`ProbeError::Io`] on filesystem errors.
pub fn probe_file(path: &Path) -> Result<ProbeResult, ProbeError> {
    let bytes = fs::read(path)?;
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ProbeError::BadImage("content is not valid UTF-8".to_string()))?;
    parse_manifest(content)
}

/// Parses the manifest text of an assembly file.
pub fn parse_manifest(content: &str) -> Result<ProbeResult, ProbeError> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = lines.next().ok_or_else(|| ProbeError::BadImage("empty file".to_string()))?;
    let Some(fusion_name) = header.strip_prefix("assembly ") else {
        return Err(ProbeError::BadImage("missing `assembly` header".to_string()));
    };
    let identity = AssemblyIdentity::parse(fusion_name)
        .map_err(|err| ProbeError::BadImage(err.to_string()))?;

    let mut result = ProbeResult {
        architecture: identity.architecture,
        identity,
        references: Vec::new(),
        scatter_files: Vec::new(),
        runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
        is_winmd: false,
        framework_name: None,
        file_version: None,
    };

    for line in lines {
        if let Some(name) = line.strip_prefix("reference ") {
            let reference = AssemblyIdentity::parse(name)
                .map_err(|err| ProbeError::BadImage(format!("bad reference: {err}")))?;
            result.references.push(reference);
        } else if let Some(file) = line.strip_prefix("file ") {
            result.scatter_files.push(file.trim().to_string());
        } else if let Some(runtime) = line.strip_prefix("runtime ") {
            result.runtime_version = runtime.trim().to_string();
        } else if let Some(version) = line.strip_prefix("fileversion ") {
            let version = version
                .parse()
                .map_err(|_| ProbeError::BadImage(format!("bad fileversion `{version}`")))?;
            result.file_version = Some(version);
        } else if let Some(tfm) = line.strip_prefix("tfm ") {
            result.framework_name = Some(tfm.trim().to_string());
        } else if line == "winmd" {
            result.is_winmd = true;
        }
        // unknown directives are ignored for forward compatibility
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_complete_manifest() {
        let manifest = "\
assembly Foo.Bar, Version=1.2.3.4, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a
runtime v4.0.30319
tfm .NETFramework,Version=v4.8
fileversion 4.8.9037.0
reference System.Runtime, Version=4.0.0.0, PublicKeyToken=b03f5f7f11d50a3a
reference Baz, Version=2.0.0.0
file Foo.Bar.part2.netmodule
";
        let result = parse_manifest(manifest).unwrap();
        assert_eq!(result.identity.simple_name, "Foo.Bar");
        assert_eq!(result.references.len(), 2);
        assert_eq!(result.references[1].simple_name, "Baz");
        assert_eq!(result.scatter_files, vec!["Foo.Bar.part2.netmodule".to_string()]);
        assert_eq!(result.runtime_version, "v4.0.30319");
        assert_eq!(result.file_version, Some(AssemblyVersion::new(4, 8, 9037, 0)));
        assert_eq!(result.framework_name.as_deref(), Some(".NETFramework,Version=v4.8"));
        assert!(!result.is_winmd);
    }

    #[test]
    fn defaults_runtime_version() {
        let result = parse_manifest("assembly Foo, Version=1.0.0.0").unwrap();
        assert_eq!(result.runtime_version, DEFAULT_RUNTIME_VERSION);
        assert!(result.references.is_empty());
    }

    #[test]
    fn winmd_flag() {
        let result =
            parse_manifest("assembly Windows.Foo, Version=255.255.255.255\nwinmd").unwrap();
        assert!(result.is_winmd);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_manifest(""), Err(ProbeError::BadImage(_))));
        assert!(matches!(parse_manifest("MZ binary junk"), Err(ProbeError::BadImage(_))));
        assert!(matches!(
            parse_manifest("assembly Foo\nreference ,bad"),
            Err(ProbeError::BadImage(_))
        ));
    }

    #[test]
    fn ignores_unknown_directives() {
        let result = parse_manifest("assembly Foo\nfancy directive\n").unwrap();
        assert_eq!(result.identity.simple_name, "Foo");
    }
}
