//! Assembly identities and their textual (fusion name) form.
//!
//! An identity is a plain value: `{simple name, version, culture, public key
//! token, processor architecture}`. Two equality modes exist, [`MatchMode::Strict`]
//! comparing every field and [`MatchMode::Simple`] ignoring the version, which
//! is the bucket used for conflict detection.

use crate::error::{ResolveError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};

/// Matches one `Key=Value` attribute of a fusion name.
static RE_FUSION_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?P<key>[A-Za-z]+)\s*=\s*(?P<value>[^,]*?)\s*$").unwrap());

/// A four-part assembly version `major.minor.build.revision`.
///
/// Ordering is lexicographic over the four components; components missing in
/// the textual form parse as `0`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssemblyVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl AssemblyVersion {
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self { major, minor, build, revision }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

impl FromStr for AssemblyVersion {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('.');
        let mut next = |name| -> Result<u16> {
            match parts.next() {
                None | Some("") => Ok(0),
                Some(p) => p.parse().map_err(|_| {
                    ResolveError::FusionName(s.to_string(), format!("invalid {name} component"))
                }),
            }
        };
        let version = Self {
            major: next("major")?,
            minor: next("minor")?,
            build: next("build")?,
            revision: next("revision")?,
        };
        if parts.next().is_some() {
            return Err(ResolveError::FusionName(
                s.to_string(),
                "more than four version components".to_string(),
            ));
        }
        Ok(version)
    }
}

/// Processor architecture an assembly is built for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorArchitecture {
    /// No architecture recorded; matches anything.
    #[default]
    None,
    /// Architecture neutral (pure IL).
    Msil,
    X86,
    Amd64,
    Ia64,
    Arm,
}

impl ProcessorArchitecture {
    /// Returns `true` if an assembly of this architecture can be loaded into a
    /// process targeting `target`.
    pub fn is_compatible_with(self, target: Self) -> bool {
        matches!(self, Self::None | Self::Msil) || target == Self::None || self == target
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Msil => "msil",
            Self::X86 => "x86",
            Self::Amd64 => "amd64",
            Self::Ia64 => "ia64",
            Self::Arm => "arm",
        }
    }
}

impl fmt::Display for ProcessorArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessorArchitecture {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "msil" => Ok(Self::Msil),
            "x86" => Ok(Self::X86),
            "amd64" | "x64" => Ok(Self::Amd64),
            "ia64" => Ok(Self::Ia64),
            "arm" => Ok(Self::Arm),
            other => Err(ResolveError::FusionName(
                s.to_string(),
                format!("unknown processor architecture `{other}`"),
            )),
        }
    }
}

/// How two identities are compared, see [`AssemblyIdentity::matches()`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// All fields must agree.
    Strict,
    /// Simple name, culture and public key token; versions are ignored.
    Simple,
}

/// The identity of a versioned assembly build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssemblyIdentity {
    /// Case-insensitive simple name, kept in its original casing.
    pub simple_name: String,
    pub version: Option<AssemblyVersion>,
    /// Lowercased culture; `None` is the canonical form of the neutral
    /// culture (`""`, missing, or `"neutral"` in fusion names).
    pub culture: Option<String>,
    /// 8-byte public key token, absent for simple-named assemblies.
    pub public_key_token: Option<[u8; 8]>,
    pub architecture: ProcessorArchitecture,
}

impl AssemblyIdentity {
    pub fn new(simple_name: impl Into<String>) -> Self {
        Self { simple_name: simple_name.into(), ..Default::default() }
    }

    pub fn with_version(mut self, version: AssemblyVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = normalize_culture(&culture.into());
        self
    }

    pub fn with_public_key_token(mut self, token: [u8; 8]) -> Self {
        self.public_key_token = Some(token);
        self
    }

    pub fn with_architecture(mut self, architecture: ProcessorArchitecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Parses a textual fusion name, e.g.
    /// `Foo, Version=1.0.0.0, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a`.
    ///
    /// Missing attributes are tolerated; unknown attributes are ignored.
    pub fn parse(fusion_name: &str) -> Result<Self> {
        let mut parts = fusion_name.split(',');
        let simple_name = parts.next().unwrap_or_default().trim();
        if simple_name.is_empty() {
            return Err(ResolveError::FusionName(
                fusion_name.to_string(),
                "empty simple name".to_string(),
            ));
        }
        let mut identity = Self::new(simple_name);
        for part in parts {
            let Some(caps) = RE_FUSION_ATTR.captures(part) else {
                return Err(ResolveError::FusionName(
                    fusion_name.to_string(),
                    format!("malformed attribute `{}`", part.trim()),
                ));
            };
            let value = caps.name("value").unwrap().as_str();
            match caps.name("key").unwrap().as_str().to_ascii_lowercase().as_str() {
                "version" => identity.version = Some(value.parse()?),
                "culture" => identity.culture = normalize_culture(value),
                "publickeytoken" => identity.public_key_token = parse_public_key_token(value)?,
                "processorarchitecture" => identity.architecture = value.parse()?,
                // e.g. `Retargetable=Yes`, `ContentType=WindowsRuntime`
                _ => {}
            }
        }
        Ok(identity)
    }

    /// The textual fusion-name form of the identity.
    pub fn fusion_name(&self) -> String {
        self.to_string()
    }

    /// Returns `true` if a public key token is present.
    pub fn is_strong_named(&self) -> bool {
        self.public_key_token.is_some()
    }

    /// Compares two identities under the given mode.
    pub fn matches(&self, other: &Self, mode: MatchMode) -> bool {
        let simple = self.simple_name.eq_ignore_ascii_case(&other.simple_name)
            && self.culture == other.culture
            && self.public_key_token == other.public_key_token;
        match mode {
            MatchMode::Simple => simple,
            MatchMode::Strict => simple && self.version == other.version,
        }
    }

    /// The version, with an absent version comparing as `0.0.0.0`.
    pub fn version_or_zero(&self) -> AssemblyVersion {
        self.version.unwrap_or(AssemblyVersion::ZERO)
    }

    /// The normalized key identifying this identity's simple-equality bucket.
    pub fn simple_key(&self) -> SimpleIdentityKey {
        SimpleIdentityKey {
            simple_name: self.simple_name.to_ascii_lowercase(),
            culture: self.culture.clone(),
            public_key_token: self.public_key_token,
        }
    }

    /// The public key token rendered as 16 lowercase hex chars, if present.
    pub fn public_key_token_hex(&self) -> Option<String> {
        self.public_key_token.map(hex_token)
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name)?;
        if let Some(version) = &self.version {
            write!(f, ", Version={version}")?;
        }
        write!(f, ", Culture={}", self.culture.as_deref().unwrap_or("neutral"))?;
        if let Some(token) = self.public_key_token {
            write!(f, ", PublicKeyToken={}", hex_token(token))?;
        }
        if self.architecture != ProcessorArchitecture::None {
            write!(f, ", ProcessorArchitecture={}", self.architecture)?;
        }
        Ok(())
    }
}

impl FromStr for AssemblyIdentity {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The normalized simple-equality key of an identity: lowercased name plus
/// culture and public key token. This is the
/// [`ReferenceTable`](crate::reference::ReferenceTable) bucket and the unit of
/// conflict detection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimpleIdentityKey {
    pub simple_name: String,
    pub culture: Option<String>,
    pub public_key_token: Option<[u8; 8]>,
}

impl fmt::Display for SimpleIdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name)?;
        if let Some(culture) = &self.culture {
            write!(f, ", Culture={culture}")?;
        }
        if let Some(token) = self.public_key_token {
            write!(f, ", PublicKeyToken={}", hex_token(token))?;
        }
        Ok(())
    }
}

/// Normalizes `""`, `"neutral"` and `"null"` to the canonical neutral form.
pub(crate) fn normalize_culture(culture: &str) -> Option<String> {
    let culture = culture.trim();
    if culture.is_empty()
        || culture.eq_ignore_ascii_case("neutral")
        || culture.eq_ignore_ascii_case("null")
    {
        None
    } else {
        Some(culture.to_ascii_lowercase())
    }
}

/// Parses a 16-hex-char public key token; `null` means absent.
pub(crate) fn parse_public_key_token(value: &str) -> Result<Option<[u8; 8]>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    if value.len() != 16 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ResolveError::FusionName(
            value.to_string(),
            "public key token must be 16 hex characters".to_string(),
        ));
    }
    let mut token = [0u8; 8];
    for (i, byte) in token.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&value[i * 2..i * 2 + 2], 16).expect("validated hex");
    }
    Ok(Some(token))
}

fn hex_token(token: [u8; 8]) -> String {
    use fmt::Write;
    let mut s = String::with_capacity(16);
    for byte in token {
        write!(s, "{byte:02x}").expect("writing to string");
    }
    s
}

/// Orders identities for deterministic queueing: by simple key, then version.
pub fn identity_order(a: &AssemblyIdentity, b: &AssemblyIdentity) -> Ordering {
    a.simple_key()
        .cmp(&b.simple_key())
        .then_with(|| a.version_or_zero().cmp(&b.version_or_zero()))
}
