//! Binding redirects and version unification.
//!
//! A redirect remaps a version range of one partial identity onto a single
//! new version. Three sources feed the [`RedirectSet`], applied in priority
//! order: explicit redirects from the configuration file, framework-retarget
//! redirects derived from the redist list, and redirects synthesized by the
//! auto-unify pass of the conflict resolver.

use crate::{
    error::{ResolveError, Result},
    identity::{
        normalize_culture, parse_public_key_token, AssemblyIdentity, AssemblyVersion,
        SimpleIdentityKey,
    },
    redist::RedistList,
    report::UnificationReason,
};
use quick_xml::{events::Event, Reader as XmlReader};
use std::{fmt, fs, path::Path};

/// An inclusive version range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionRange {
    pub low: AssemblyVersion,
    pub high: AssemblyVersion,
}

impl VersionRange {
    pub const fn new(low: AssemblyVersion, high: AssemblyVersion) -> Self {
        Self { low, high }
    }

    /// The `0.0.0.0-<high>` range used by suggested redirects.
    pub const fn up_to(high: AssemblyVersion) -> Self {
        Self { low: AssemblyVersion::ZERO, high }
    }

    pub fn contains(&self, version: AssemblyVersion) -> bool {
        self.low <= version && version <= self.high
    }

    /// Parses `1.0.0.0-2.0.0.0` or a single version.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((low, high)) => Ok(Self { low: low.parse()?, high: high.parse()? }),
            None => {
                let version = s.parse()?;
                Ok(Self { low: version, high: version })
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

/// One `partial identity x version range -> new version` remapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingRedirect {
    pub identity: SimpleIdentityKey,
    pub old_versions: VersionRange,
    pub new_version: AssemblyVersion,
}

impl BindingRedirect {
    pub fn applies_to(&self, identity: &AssemblyIdentity) -> bool {
        self.identity == identity.simple_key()
            && self.old_versions.contains(identity.version_or_zero())
    }
}

/// The ordered collection of all active redirects.
#[derive(Clone, Debug, Default)]
pub struct RedirectSet {
    config: Vec<BindingRedirect>,
    retarget: Vec<BindingRedirect>,
    auto_unify: Vec<BindingRedirect>,
}

impl RedirectSet {
    pub fn new(config: Vec<BindingRedirect>) -> Self {
        Self { config, ..Default::default() }
    }

    /// Derives framework-retarget redirects: every versioned redist member
    /// pulls older requests up to the framework's version.
    pub fn add_framework_retargets(&mut self, redist: &RedistList) {
        for entry in redist.entries() {
            if let Some(version) = entry.identity.version {
                self.retarget.push(BindingRedirect {
                    identity: entry.identity.simple_key(),
                    old_versions: VersionRange::up_to(version),
                    new_version: version,
                });
            }
        }
    }

    /// Installs redirects synthesized by the auto-unify pass.
    pub fn add_auto_unify(&mut self, redirects: impl IntoIterator<Item = BindingRedirect>) {
        self.auto_unify.extend(redirects);
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty() && self.retarget.is_empty() && self.auto_unify.is_empty()
    }

    /// Returns the effective remap for `identity`: the highest new version
    /// among matching redirects of the highest-priority source, or `None`
    /// when no redirect changes the version.
    pub fn apply(&self, identity: &AssemblyIdentity) -> Option<(AssemblyVersion, UnificationReason)> {
        let sources: [(&[BindingRedirect], UnificationReason); 3] = [
            (self.config.as_slice(), UnificationReason::ConfigRedirect),
            (self.retarget.as_slice(), UnificationReason::FrameworkRetarget),
            (self.auto_unify.as_slice(), UnificationReason::AutoUnify),
        ];
        for (redirects, reason) in sources {
            let new_version = redirects
                .iter()
                .filter(|r| r.applies_to(identity))
                .map(|r| r.new_version)
                .max();
            if let Some(new_version) = new_version {
                if Some(new_version) != identity.version {
                    return Some((new_version, reason));
                }
                // the redirect is a no-op for this version; lower-priority
                // sources must not override it
                return None;
            }
        }
        None
    }
}

/// Reads the `assemblyBinding/dependentAssembly` redirects from an
/// application configuration file.
///
/// Unknown elements and attributes are ignored; a malformed file fails the
/// invocation with a line-qualified [`ResolveError::InvalidConfigFile`].
pub fn load_config_redirects(path: &Path) -> Result<Vec<BindingRedirect>> {
    let content = fs::read_to_string(path).map_err(|err| ResolveError::InvalidConfigFile {
        path: path.to_path_buf(),
        line: 0,
        reason: err.to_string(),
    })?;

    let invalid = |pos: usize, reason: String| ResolveError::InvalidConfigFile {
        path: path.to_path_buf(),
        line: line_of_offset(&content, pos),
        reason,
    };

    let mut reader = XmlReader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut redirects = Vec::new();
    let mut current_identity: Option<SimpleIdentityKey> = None;
    let mut in_dependent_assembly = false;

    let mut buf = Vec::new();
    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let tag = e.name().as_ref().to_ascii_lowercase();
                match tag.as_slice() {
                    b"dependentassembly" => {
                        in_dependent_assembly = true;
                        current_identity = None;
                    }
                    b"assemblyidentity" if in_dependent_assembly => {
                        let mut name = String::new();
                        let mut culture = None;
                        let mut token = None;
                        for attr in e.attributes().flatten() {
                            let value =
                                attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
                            match attr.key.as_ref().to_ascii_lowercase().as_slice() {
                                b"name" => name = value,
                                b"culture" => culture = normalize_culture(&value),
                                b"publickeytoken" => {
                                    token = parse_public_key_token(&value)
                                        .map_err(|err| invalid(pos, err.to_string()))?
                                }
                                _ => {}
                            }
                        }
                        if name.is_empty() {
                            return Err(invalid(
                                pos,
                                "assemblyIdentity requires a name attribute".to_string(),
                            ));
                        }
                        current_identity = Some(SimpleIdentityKey {
                            simple_name: name.to_ascii_lowercase(),
                            culture,
                            public_key_token: token,
                        });
                    }
                    b"bindingredirect" if in_dependent_assembly => {
                        let identity = current_identity.clone().ok_or_else(|| {
                            invalid(
                                pos,
                                "bindingRedirect without preceding assemblyIdentity".to_string(),
                            )
                        })?;
                        let mut old_versions = None;
                        let mut new_version = None;
                        for attr in e.attributes().flatten() {
                            let value =
                                attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
                            match attr.key.as_ref().to_ascii_lowercase().as_slice() {
                                b"oldversion" => {
                                    old_versions = Some(
                                        VersionRange::parse(&value)
                                            .map_err(|err| invalid(pos, err.to_string()))?,
                                    )
                                }
                                b"newversion" => {
                                    new_version = Some(
                                        value
                                            .parse::<AssemblyVersion>()
                                            .map_err(|err| invalid(pos, err.to_string()))?,
                                    )
                                }
                                _ => {}
                            }
                        }
                        match (old_versions, new_version) {
                            (Some(old_versions), Some(new_version)) => {
                                redirects.push(BindingRedirect {
                                    identity,
                                    old_versions,
                                    new_version,
                                })
                            }
                            _ => {
                                return Err(invalid(
                                    pos,
                                    "bindingRedirect requires oldVersion and newVersion"
                                        .to_string(),
                                ))
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref().eq_ignore_ascii_case(b"dependentAssembly") {
                    in_dependent_assembly = false;
                    current_identity = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(invalid(pos, err.to_string())),
        }
        buf.clear();
    }

    Ok(redirects)
}

fn line_of_offset(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const APP_CONFIG: &str = r#"<?xml version="1.0"?>
<configuration>
  <runtime>
    <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
      <dependentAssembly>
        <assemblyIdentity name="Lib" publicKeyToken="b77a5c561934e089" culture="neutral" />
        <bindingRedirect oldVersion="0.0.0.0-1.9.9.9" newVersion="2.0.0.0" />
      </dependentAssembly>
      <dependentAssembly>
        <assemblyIdentity name="Other" publicKeyToken="b03f5f7f11d50a3a" />
        <bindingRedirect oldVersion="1.0.0.0" newVersion="1.5.0.0" />
      </dependentAssembly>
    </assemblyBinding>
  </runtime>
</configuration>
"#;

    fn identity(name: &str) -> AssemblyIdentity {
        AssemblyIdentity::parse(name).unwrap()
    }

    #[test]
    fn loads_config_redirects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.config");
        fs::write(&path, APP_CONFIG).unwrap();

        let redirects = load_config_redirects(&path).unwrap();
        assert_eq!(redirects.len(), 2);
        assert_eq!(redirects[0].identity.simple_name, "lib");
        assert_eq!(redirects[0].new_version, AssemblyVersion::new(2, 0, 0, 0));
        assert_eq!(
            redirects[0].old_versions,
            VersionRange::new(AssemblyVersion::ZERO, AssemblyVersion::new(1, 9, 9, 9))
        );
    }

    #[test]
    fn malformed_config_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.config");
        fs::write(
            &path,
            "<configuration>\n<runtime>\n<assemblyBinding>\n<dependentAssembly>\n<bindingRedirect oldVersion=\"1.0\" newVersion=\"2.0\"/>\n",
        )
        .unwrap();

        match load_config_redirects(&path) {
            Err(ResolveError::InvalidConfigFile { line, reason, .. }) => {
                assert!(line >= 4, "line was {line}");
                assert!(reason.contains("assemblyIdentity"));
            }
            other => panic!("expected InvalidConfigFile, got {other:?}"),
        }
    }

    #[test]
    fn apply_prefers_config_over_retarget() {
        let lib = identity("Lib, Version=1.0.0.0, PublicKeyToken=b77a5c561934e089");

        let mut set = RedirectSet::new(vec![BindingRedirect {
            identity: lib.simple_key(),
            old_versions: VersionRange::up_to(AssemblyVersion::new(1, 9, 9, 9)),
            new_version: AssemblyVersion::new(2, 0, 0, 0),
        }]);
        set.add_auto_unify([BindingRedirect {
            identity: lib.simple_key(),
            old_versions: VersionRange::up_to(AssemblyVersion::new(9, 9, 9, 9)),
            new_version: AssemblyVersion::new(9, 0, 0, 0),
        }]);

        let (version, reason) = set.apply(&lib).unwrap();
        assert_eq!(version, AssemblyVersion::new(2, 0, 0, 0));
        assert_eq!(reason, UnificationReason::ConfigRedirect);
    }

    #[test]
    fn apply_picks_highest_matching_version() {
        let lib = identity("Lib, Version=1.0.0.0");
        let mut set = RedirectSet::default();
        set.add_auto_unify([
            BindingRedirect {
                identity: lib.simple_key(),
                old_versions: VersionRange::up_to(AssemblyVersion::new(5, 0, 0, 0)),
                new_version: AssemblyVersion::new(2, 0, 0, 0),
            },
            BindingRedirect {
                identity: lib.simple_key(),
                old_versions: VersionRange::up_to(AssemblyVersion::new(5, 0, 0, 0)),
                new_version: AssemblyVersion::new(3, 0, 0, 0),
            },
        ]);
        let (version, reason) = set.apply(&lib).unwrap();
        assert_eq!(version, AssemblyVersion::new(3, 0, 0, 0));
        assert_eq!(reason, UnificationReason::AutoUnify);
    }

    #[test]
    fn apply_ignores_out_of_range_and_noop() {
        let lib = identity("Lib, Version=3.0.0.0");
        let set = RedirectSet::new(vec![BindingRedirect {
            identity: lib.simple_key(),
            old_versions: VersionRange::up_to(AssemblyVersion::new(2, 0, 0, 0)),
            new_version: AssemblyVersion::new(2, 0, 0, 0),
        }]);
        assert_eq!(set.apply(&lib), None);

        let exact = identity("Lib, Version=2.0.0.0");
        // remapping 2.0.0.0 onto itself is a no-op
        assert_eq!(set.apply(&exact), None);
    }

    #[test]
    fn framework_retargets_pull_old_versions_up() {
        use crate::redist::FrameworkPolicy;

        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("FrameworkList.xml");
        fs::write(
            &list,
            r#"<FileList Redist="R" Name="F">
  <File AssemblyName="System" Version="4.0.0.0" PublicKeyToken="b77a5c561934e089" InGac="true"/>
</FileList>"#,
        )
        .unwrap();
        let policy = FrameworkPolicy::load(&[list], &[], &[], &[]);

        let mut set = RedirectSet::default();
        set.add_framework_retargets(policy.redist());

        let old = identity("System, Version=2.0.0.0, PublicKeyToken=b77a5c561934e089");
        let (version, reason) = set.apply(&old).unwrap();
        assert_eq!(version, AssemblyVersion::new(4, 0, 0, 0));
        assert_eq!(reason, UnificationReason::FrameworkRetarget);

        let newer = identity("System, Version=5.0.0.0, PublicKeyToken=b77a5c561934e089");
        assert_eq!(set.apply(&newer), None);
    }
}
