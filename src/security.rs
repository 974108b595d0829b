use crate::errors::{ApiError, ConfigError};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const DEFAULT_KEY_PREFIX: &str = "mcp-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::Write => write!(f, "write"),
            Permission::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Development,
    Production,
    Environment,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub key_hash: String,
    pub name: String,
    pub tier: Tier,
    pub permissions: BTreeSet<Permission>,
    /// Per-key ceiling; the configured default applies when absent.
    #[serde(default)]
    pub rate_limit: Option<u32>,
    #[serde(default)]
    pub created: Option<NaiveDate>,
}

impl ApiKeyRecord {
    pub fn new(raw_key: &str, name: &str, tier: Tier, permissions: &[Permission]) -> Self {
        Self {
            key_hash: hash_api_key(raw_key),
            name: name.to_string(),
            tier,
            permissions: permissions.iter().copied().collect(),
            rate_limit: None,
            created: NaiveDate::from_ymd_opt(2024, 1, 1),
        }
    }

    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Identifier used for rate-limit counters and logs in place of the raw key.
    pub fn key_id(&self) -> &str {
        &self.key_hash[..16.min(self.key_hash.len())]
    }
}

/// One entry of the JSON key file. Either the raw `key` or its `key_hash` is given.
#[derive(Debug, Deserialize)]
struct KeyFileEntry {
    key: Option<String>,
    key_hash: Option<String>,
    name: String,
    tier: Option<Tier>,
    permissions: Vec<Permission>,
    rate_limit: Option<u32>,
    created: Option<NaiveDate>,
}

impl KeyFileEntry {
    fn into_record(self) -> Result<ApiKeyRecord, ConfigError> {
        let key_hash = match (self.key, self.key_hash) {
            (Some(key), _) => hash_api_key(&key),
            (None, Some(hash)) => hash.to_lowercase(),
            (None, None) => {
                return Err(ConfigError::Invalid(format!(
                    "key entry '{}' needs either 'key' or 'key_hash'",
                    self.name
                )))
            }
        };

        Ok(ApiKeyRecord {
            key_hash,
            name: self.name,
            tier: self.tier.unwrap_or(Tier::Custom),
            permissions: self.permissions.into_iter().collect(),
            rate_limit: self.rate_limit,
            created: self.created,
        })
    }
}

/// Immutable lookup table from key hash to record, built once at start.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    records: HashMap<String, ApiKeyRecord>,
}

impl ApiKeyStore {
    pub fn from_records(records: Vec<ApiKeyRecord>) -> Result<Self, ConfigError> {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            if map.contains_key(&record.key_hash) {
                return Err(ConfigError::DuplicateKey(record.name));
            }
            map.insert(record.key_hash.clone(), record);
        }
        Ok(Self { records: map })
    }

    pub fn builtin_records() -> Vec<ApiKeyRecord> {
        vec![
            ApiKeyRecord::new(
                "mcp-key-dev-123",
                "Development Key",
                Tier::Development,
                &[Permission::Read, Permission::Write],
            ),
            ApiKeyRecord::new(
                "mcp-key-prod-456",
                "Production Key",
                Tier::Production,
                &[Permission::Read, Permission::Write],
            ),
        ]
    }

    /// Built-in keys, plus the environment key and the key file when configured.
    pub fn load(env_key: Option<&str>, key_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut records = Self::builtin_records();

        if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
            records.push(ApiKeyRecord::new(
                key.trim(),
                "Environment Key",
                Tier::Environment,
                &[Permission::Read, Permission::Write],
            ));
        }

        if let Some(path) = key_file {
            records.extend(Self::read_key_file(path)?);
        }

        Self::from_records(records)
    }

    pub fn read_key_file(path: &Path) -> Result<Vec<ApiKeyRecord>, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<KeyFileEntry> = serde_json::from_str(&raw)?;
        entries.into_iter().map(KeyFileEntry::into_record).collect()
    }

    pub fn validate(&self, key: Option<&str>) -> Result<&ApiKeyRecord, ApiError> {
        let key = match key.map(str::trim) {
            Some(k) if !k.is_empty() => k,
            _ => return Err(ApiError::MissingApiKey),
        };

        self.records
            .get(&hash_api_key(key))
            .ok_or(ApiError::InvalidKey)
    }

    pub fn has_permission(record: &ApiKeyRecord, permission: Permission) -> bool {
        record.permissions.contains(&permission)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// (key id, name, tier) for every record, sorted by name.
    pub fn summaries(&self) -> Vec<(String, String, Tier)> {
        let mut out: Vec<_> = self
            .records
            .values()
            .map(|r| (format!("{}...", r.key_id()), r.name.clone(), r.tier))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }
}

pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

// 20 random bytes -> 32 base32 characters
pub fn generate_api_key(prefix: &str) -> String {
    let mut random_bytes = [0u8; 20];
    rand::thread_rng().fill(&mut random_bytes);

    let suffix = base32::encode(base32::Alphabet::RFC4648 { padding: false }, &random_bytes);
    format!("{}-{}", prefix, suffix.to_lowercase())
}

pub fn redact_key(key: &str) -> String {
    let visible: String = key.chars().take(10).collect();
    format!("{}...", visible)
}
