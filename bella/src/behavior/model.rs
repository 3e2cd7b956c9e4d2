use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PERSONA_ID: &str = "default";

const LEGACY_GUIDELINES: &str =
    "When someone disrespects you, act according to your persona's guidelines for conflict.";

/// (id, display name, prompt used when the legacy slot is missing)
const LEGACY_SLOTS: [(&str, &str, &str); 3] = [
    ("devoted", "Devoted (Owner)", "You are devoted and loving."),
    ("normal", "Normal Bella", "You are Bella, confident and bold."),
    ("savage", "Savage Mode", "You are Savage."),
];
const LEGACY_DEFAULT_PERSONA: &str = "normal";
const LEGACY_ROLE_ASSIGNMENTS: [(&str, &str); 2] = [("Owner", "devoted"), ("Admin", "devoted")];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    pub prompt: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assignments {
    /// Discord user ID (as a decimal string) to persona ID.
    pub users: BTreeMap<String, String>,
    /// Role name to persona ID.
    pub roles: BTreeMap<String, String>,
}

/// The full persona configuration. This is read and written as one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub personas: BTreeMap<String, Persona>,
    pub assignments: Assignments,
    pub default_persona: String,
    pub global_guidelines: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            personas: BTreeMap::new(),
            assignments: Assignments::default(),
            default_persona: DEFAULT_PERSONA_ID.to_owned(),
            global_guidelines: String::new(),
        }
    }
}

impl BehaviorConfig {
    /// Builds the current configuration out of the three prompt slots of the old format.
    pub fn from_legacy(behaviors: &[String]) -> Self {
        let personas = LEGACY_SLOTS
            .iter()
            .enumerate()
            .map(|(idx, (id, name, fallback))| {
                let prompt = behaviors.get(idx).map(String::as_str).unwrap_or(*fallback);
                (id.to_string(), Persona::new(*name, prompt))
            })
            .collect();
        let roles = LEGACY_ROLE_ASSIGNMENTS
            .iter()
            .map(|(role, persona)| (role.to_string(), persona.to_string()))
            .collect();

        Self {
            personas,
            assignments: Assignments {
                users: BTreeMap::new(),
                roles,
            },
            default_persona: LEGACY_DEFAULT_PERSONA.to_owned(),
            global_guidelines: LEGACY_GUIDELINES.to_owned(),
        }
    }
}

/// Every shape the persisted document has had. Decoding picks whichever matches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredDocument {
    Legacy { behaviors: Vec<String> },
    Current(BehaviorConfig),
}

impl StoredDocument {
    pub(crate) fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub(crate) fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy { .. })
    }

    pub(crate) fn into_config(self) -> BehaviorConfig {
        match self {
            Self::Legacy { behaviors } => BehaviorConfig::from_legacy(&behaviors),
            Self::Current(config) => config,
        }
    }
}

/// Serializes with a four space indent. Non-ASCII text is written as is.
pub(crate) fn to_document(config: &BehaviorConfig) -> serde_json::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    config.serialize(&mut serializer)?;
    Ok(buffer)
}
