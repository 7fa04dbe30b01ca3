//! Framework membership policy.
//!
//! Redist lists are XML files enumerating the assemblies that ship with a
//! target framework. A subset list narrows a full framework to a profile;
//! when both are configured the difference becomes an exclusion list and the
//! graph builder prunes excluded references. Invalid list files are skipped
//! with an advisory rather than failing the invocation.

use crate::{
    error::{ResolveError, Result},
    identity::{
        normalize_culture, parse_public_key_token, AssemblyIdentity, AssemblyVersion,
        SimpleIdentityKey,
    },
};
use quick_xml::{events::Event, Reader as XmlReader};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

/// One `<File>` row of a redist list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedistEntry {
    pub identity: AssemblyIdentity,
    pub in_gac: bool,
    pub redist_name: String,
    pub retargetable: bool,
    /// The framework directory the list belongs to.
    pub framework_dir: PathBuf,
}

/// Merged view over all loaded redist lists, keyed by simple identity.
#[derive(Clone, Debug, Default)]
pub struct RedistList {
    entries: BTreeMap<SimpleIdentityKey, RedistEntry>,
}

impl RedistList {
    pub fn lookup(&self, identity: &AssemblyIdentity) -> Option<&RedistEntry> {
        self.entries.get(&identity.simple_key())
    }

    pub fn entries(&self) -> impl Iterator<Item = &RedistEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn merge(&mut self, parsed: ParsedList) {
        for entry in parsed.entries {
            // first list wins so the configured table order is a priority
            self.entries.entry(entry.identity.simple_key()).or_insert(entry);
        }
    }
}

/// How an identity relates to the targeted framework.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    InFramework { redist_name: String, in_gac: bool, retargetable: bool },
    /// Pruned from the closure by the subset exclusion list.
    Excluded { subset: String },
    Unknown,
}

/// The loaded framework policy: redist membership plus the optional subset
/// exclusion list.
#[derive(Clone, Debug, Default)]
pub struct FrameworkPolicy {
    redist: RedistList,
    exclusion: Option<ExclusionList>,
    /// Advisories produced while loading (skipped files, disabled subsets).
    pub advisories: Vec<String>,
}

/// Identities whose full-framework version is not part of the targeted
/// profile subset.
#[derive(Clone, Debug)]
pub struct ExclusionList {
    pub subset_name: String,
    members: BTreeSet<SimpleIdentityKey>,
}

impl FrameworkPolicy {
    /// Loads the policy from the configured list files.
    ///
    /// `full_tables` defaults to `installed_tables` when empty. A subset list
    /// whose name appears in `full_subset_names` disables the exclusion
    /// mechanism entirely.
    pub fn load(
        installed_tables: &[PathBuf],
        subset_tables: &[PathBuf],
        full_tables: &[PathBuf],
        full_subset_names: &[String],
    ) -> Self {
        let mut policy = Self::default();

        for path in installed_tables {
            match parse_redist_file(path) {
                Ok(parsed) => policy.redist.merge(parsed),
                Err(err) => policy
                    .advisories
                    .push(format!("skipping invalid redist list \"{}\": {err}", path.display())),
            }
        }

        if subset_tables.is_empty() {
            return policy;
        }

        let mut subset_members = BTreeSet::new();
        let mut subset_name = String::new();
        for path in subset_tables {
            match parse_redist_file(path) {
                Ok(parsed) => {
                    if full_subset_names.iter().any(|full| parsed.name.eq_ignore_ascii_case(full))
                    {
                        policy.advisories.push(format!(
                            "subset \"{}\" covers the full framework; exclusion disabled",
                            parsed.name
                        ));
                        return policy;
                    }
                    if subset_name.is_empty() {
                        subset_name = parsed.name.clone();
                    }
                    subset_members.extend(parsed.entries.iter().map(|e| e.identity.simple_key()));
                }
                Err(err) => policy
                    .advisories
                    .push(format!("skipping invalid subset list \"{}\": {err}", path.display())),
            }
        }

        let mut full_members = BTreeSet::new();
        if full_tables.is_empty() {
            full_members.extend(policy.redist.entries.keys().cloned());
        } else {
            for path in full_tables {
                match parse_redist_file(path) {
                    Ok(parsed) => {
                        full_members.extend(parsed.entries.iter().map(|e| e.identity.simple_key()))
                    }
                    Err(err) => policy.advisories.push(format!(
                        "skipping invalid full framework list \"{}\": {err}",
                        path.display()
                    )),
                }
            }
        }

        let members: BTreeSet<_> = full_members.difference(&subset_members).cloned().collect();
        if !members.is_empty() {
            policy.exclusion = Some(ExclusionList { subset_name, members });
        }
        policy
    }

    pub fn redist(&self) -> &RedistList {
        &self.redist
    }

    pub fn classify(&self, identity: &AssemblyIdentity) -> Classification {
        if let Some(exclusion) = &self.exclusion {
            if exclusion.members.contains(&identity.simple_key()) {
                return Classification::Excluded { subset: exclusion.subset_name.clone() };
            }
        }
        match self.redist.lookup(identity) {
            Some(entry) => Classification::InFramework {
                redist_name: entry.redist_name.clone(),
                in_gac: entry.in_gac,
                retargetable: entry.retargetable,
            },
            None => Classification::Unknown,
        }
    }

    /// Whether the identity is a framework prerequisite: in the framework and
    /// expected in the GAC.
    pub fn is_prerequisite(&self, identity: &AssemblyIdentity) -> bool {
        matches!(self.classify(identity), Classification::InFramework { in_gac: true, .. })
    }
}

struct ParsedList {
    /// The `Name` attribute of `<FileList>`, falling back to the file stem.
    name: String,
    entries: Vec<RedistEntry>,
}

/// Parses one redist/subset list file.
fn parse_redist_file(path: &Path) -> Result<ParsedList> {
    let content = fs::read_to_string(path).map_err(|err| ResolveError::io(err, path))?;
    let framework_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let file_stem =
        path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

    let mut reader = XmlReader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut list_name = String::new();
    let mut redist_name = String::new();
    let mut entries = Vec::new();
    let mut saw_file_list = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let tag = e.name().as_ref().to_ascii_lowercase();
                if tag == b"filelist" {
                    saw_file_list = true;
                    for attr in e.attributes().flatten() {
                        let value =
                            attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
                        match attr.key.as_ref().to_ascii_lowercase().as_slice() {
                            b"redist" => redist_name = value,
                            b"name" => list_name = value,
                            _ => {}
                        }
                    }
                } else if tag == b"file" {
                    if let Some(entry) =
                        parse_file_row(&e, &redist_name, &framework_dir)?
                    {
                        entries.push(entry);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ResolveError::msg(format!(
                    "xml error at offset {}: {err}",
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    if !saw_file_list {
        return Err(ResolveError::msg("missing <FileList> root element"));
    }

    let name = if list_name.is_empty() { file_stem } else { list_name };
    Ok(ParsedList { name, entries })
}

fn parse_file_row(
    element: &quick_xml::events::BytesStart<'_>,
    redist_name: &str,
    framework_dir: &Path,
) -> Result<Option<RedistEntry>> {
    let mut name = String::new();
    let mut version = None;
    let mut culture = None;
    let mut token = None;
    let mut in_gac = false;
    let mut retargetable = false;

    for attr in element.attributes().flatten() {
        let value = attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
        match attr.key.as_ref().to_ascii_lowercase().as_slice() {
            b"assemblyname" => name = value,
            b"version" => {
                version = Some(value.parse::<AssemblyVersion>().map_err(|err| {
                    ResolveError::msg(format!("bad Version attribute: {err}"))
                })?)
            }
            b"culture" => culture = normalize_culture(&value),
            b"publickeytoken" => {
                token = parse_public_key_token(&value)
                    .map_err(|err| ResolveError::msg(format!("bad PublicKeyToken: {err}")))?
            }
            b"ingac" => in_gac = parse_xml_bool(&value),
            b"retargetable" => retargetable = parse_xml_bool(&value),
            _ => {}
        }
    }

    if name.is_empty() {
        // rows without an assembly name carry no membership information
        return Ok(None);
    }

    let mut identity = AssemblyIdentity::new(name);
    identity.version = version;
    identity.culture = culture;
    identity.public_key_token = token;

    Ok(Some(RedistEntry {
        identity,
        in_gac,
        redist_name: redist_name.to_string(),
        retargetable,
        framework_dir: framework_dir.to_path_buf(),
    }))
}

fn parse_xml_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FRAMEWORK_LIST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FileList Redist="Microsoft-Windows-CLRCoreComp.4.8" Name=".NET Framework 4.8">
  <File AssemblyName="System" Version="4.0.0.0" PublicKeyToken="b77a5c561934e089" Culture="neutral" InGac="true" />
  <File AssemblyName="System.Xml" Version="4.0.0.0" PublicKeyToken="b77a5c561934e089" Culture="neutral" InGac="true" Retargetable="Yes" />
  <File AssemblyName="Extras" Version="4.0.0.0" PublicKeyToken="b77a5c561934e089" Culture="neutral" InGac="false" />
</FileList>
"#;

    const SUBSET_LIST: &str = r#"<FileList Redist="Microsoft-Windows-CLRCoreComp.4.8" Name="Client">
  <File AssemblyName="System" Version="4.0.0.0" PublicKeyToken="b77a5c561934e089" Culture="neutral" InGac="true" />
</FileList>
"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn classifies_framework_members() {
        let dir = tempfile::tempdir().unwrap();
        let list = write(dir.path(), "FrameworkList.xml", FRAMEWORK_LIST);
        let policy = FrameworkPolicy::load(&[list], &[], &[], &[]);
        assert!(policy.advisories.is_empty());

        let system =
            AssemblyIdentity::parse("System, Version=4.0.0.0, PublicKeyToken=b77a5c561934e089")
                .unwrap();
        match policy.classify(&system) {
            Classification::InFramework { redist_name, in_gac, retargetable } => {
                assert_eq!(redist_name, "Microsoft-Windows-CLRCoreComp.4.8");
                assert!(in_gac);
                assert!(!retargetable);
            }
            other => panic!("unexpected classification {other:?}"),
        }
        assert!(policy.is_prerequisite(&system));

        let extras =
            AssemblyIdentity::parse("Extras, Version=4.0.0.0, PublicKeyToken=b77a5c561934e089")
                .unwrap();
        assert!(!policy.is_prerequisite(&extras));

        let unknown = AssemblyIdentity::new("ThirdParty");
        assert_eq!(policy.classify(&unknown), Classification::Unknown);
    }

    #[test]
    fn subset_derives_exclusion_list() {
        let dir = tempfile::tempdir().unwrap();
        let full = write(dir.path(), "FrameworkList.xml", FRAMEWORK_LIST);
        let subset = write(dir.path(), "Client.xml", SUBSET_LIST);
        let policy = FrameworkPolicy::load(&[full], &[subset], &[], &[]);

        let xml = AssemblyIdentity::parse(
            "System.Xml, Version=4.0.0.0, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();
        assert_eq!(policy.classify(&xml), Classification::Excluded { subset: "Client".into() });

        let system =
            AssemblyIdentity::parse("System, Version=4.0.0.0, PublicKeyToken=b77a5c561934e089")
                .unwrap();
        assert!(matches!(policy.classify(&system), Classification::InFramework { .. }));
    }

    #[test]
    fn full_synonym_disables_exclusion() {
        let dir = tempfile::tempdir().unwrap();
        let full = write(dir.path(), "FrameworkList.xml", FRAMEWORK_LIST);
        let subset = write(
            dir.path(),
            "Full.xml",
            r#"<FileList Name="Full"><File AssemblyName="System" Version="4.0.0.0" PublicKeyToken="b77a5c561934e089" InGac="true"/></FileList>"#,
        );
        let policy =
            FrameworkPolicy::load(&[full], &[subset], &[], &["Full".to_string()]);

        let xml = AssemblyIdentity::parse(
            "System.Xml, Version=4.0.0.0, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();
        assert!(matches!(policy.classify(&xml), Classification::InFramework { .. }));
        assert!(policy.advisories.iter().any(|a| a.contains("exclusion disabled")));
    }

    #[test]
    fn invalid_list_is_skipped_with_advisory() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.xml", "<NotAFileList/>");
        let good = write(dir.path(), "FrameworkList.xml", FRAMEWORK_LIST);
        let policy = FrameworkPolicy::load(&[bad, good], &[], &[], &[]);
        assert_eq!(policy.advisories.len(), 1);
        assert_eq!(policy.redist().len(), 3);
    }
}
