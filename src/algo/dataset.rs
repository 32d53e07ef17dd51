use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use siphasher::sip::SipHasher13;
use std::fmt;
use std::hash::Hasher;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Embedded fixture dataset, compiled from `fixtures/villages.json`.
/// Users override by pointing `$SCOUTSTATS_DATA` at a JSON file, placing one
/// at `$XDG_DATA_HOME/scoutstats/villages.json`, or passing `--data <path>`.
const EMBEDDED_FIXTURE: &str = include_str!("../../fixtures/villages.json");

/// Env var naming a JSON data file to use instead of the fixture.
pub const DATA_ENV_VAR: &str = "SCOUTSTATS_DATA";

/// Id and name of the village that wraps flat group listings.
pub const ALL_GROUPS_VILLAGE_ID: &str = "all";
pub const ALL_GROUPS_VILLAGE_NAME: &str = "Alla kårer";

pub type GroupId = i64;

/// Villages are keyed by number in fixtures and by string ("all") when the
/// dataset was assembled from a flat group listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VillageId {
    Int(i64),
    Text(String),
}

impl VillageId {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Parse a command-line token. Integers become `Int`, anything else `Text`.
    pub fn parse(token: &str) -> Self {
        token
            .parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Text(token.to_string()))
    }
}

impl fmt::Display for VillageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One selectable scout group with its raw, schema-less `stats` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoutGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(serialize_with = "serialize_opt_count")]
    pub num_participants: Option<f64>,
    pub stats: Map<String, Value>,
}

impl ScoutGroup {
    /// Participant count, 0 when missing or not a finite number.
    pub fn participants(&self) -> f64 {
        self.num_participants.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Village {
    pub id: VillageId,
    pub name: String,
    #[serde(serialize_with = "serialize_opt_count")]
    pub num_participants: Option<f64>,
    #[serde(rename = "scoutGroups")]
    pub scout_groups: Vec<ScoutGroup>,
}

impl Village {
    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.scout_groups.iter().map(|g| g.id)
    }
}

/// The resolved `{ villages: [...] }` structure the engine works on.
///
/// Datasets are read-only once built: the fingerprint is taken from the
/// villages on first use and kept for the dataset's lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dataset {
    pub villages: Vec<Village>,
    #[serde(skip)]
    fingerprint: OnceLock<u64>,
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.villages == other.villages
    }
}

/// Feeds serializer output straight into a hasher.
struct HashWriter<'a>(&'a mut SipHasher13);

impl io::Write for HashWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Dataset {
    pub fn new(villages: Vec<Village>) -> Self {
        Self {
            villages,
            fingerprint: OnceLock::new(),
        }
    }

    /// SipHash-1-3 of the dataset's canonical JSON, computed once. Key order
    /// inside `stats` is part of it since it drives encounter order in the
    /// results.
    pub fn fingerprint(&self) -> u64 {
        *self.fingerprint.get_or_init(|| {
            let mut hasher = SipHasher13::new();
            if let Err(e) = serde_json::to_writer(HashWriter(&mut hasher), &self.villages) {
                tracing::warn!(error = %e, "dataset fingerprint incomplete");
            }
            hasher.finish()
        })
    }

    /// Build a dataset from any of the payload shapes we receive:
    ///
    /// - `{ "villages": [...] }`
    /// - one paginated group page `{ items, total, page, size, pages }`
    /// - a list of such pages
    /// - a bare list of group objects
    ///
    /// Flat group listings are wrapped into a single "Alla kårer" village.
    /// Villages or groups that lack a usable `id` are dropped; anything else
    /// unrecognised yields an empty dataset.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(obj) if obj.contains_key("villages") => {
                let villages = obj
                    .get("villages")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(parse_village).collect())
                    .unwrap_or_default();
                Self::new(villages)
            }
            Value::Object(obj) if obj.contains_key("items") => {
                Self::from_groups(page_items(value).iter().filter_map(parse_group).collect())
            }
            Value::Array(arr) if !arr.is_empty() && arr.iter().all(is_page) => {
                let groups = arr
                    .iter()
                    .flat_map(page_items)
                    .filter_map(parse_group)
                    .collect();
                Self::from_groups(groups)
            }
            Value::Array(arr) => Self::from_groups(arr.iter().filter_map(parse_group).collect()),
            other => {
                tracing::warn!(kind = json_kind(other), "unrecognised dataset shape, using empty dataset");
                Self::default()
            }
        }
    }

    /// Wrap a flat list of groups into the single synthetic village.
    pub fn from_groups(groups: Vec<ScoutGroup>) -> Self {
        let total: f64 = groups.iter().map(ScoutGroup::participants).sum();
        Self::new(vec![Village {
            id: VillageId::Text(ALL_GROUPS_VILLAGE_ID.into()),
            name: ALL_GROUPS_VILLAGE_NAME.into(),
            num_participants: Some(total),
            scout_groups: groups,
        }])
    }

    pub fn groups(&self) -> impl Iterator<Item = &ScoutGroup> {
        self.villages.iter().flat_map(|v| v.scout_groups.iter())
    }

    pub fn find_village(&self, id: &VillageId) -> Option<&Village> {
        self.villages.iter().find(|v| &v.id == id)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn is_page(value: &Value) -> bool {
    value.get("items").map(Value::is_array).unwrap_or(false)
}

fn page_items(value: &Value) -> &[Value] {
    value
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_village(value: &Value) -> Option<Village> {
    let obj = value.as_object()?;
    let Some(id) = obj.get("id").and_then(VillageId::from_json) else {
        tracing::warn!("skipping village without a usable id");
        return None;
    };
    let scout_groups = obj
        .get("scoutGroups")
        .or_else(|| obj.get("ScoutGroups"))
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(parse_group).collect())
        .unwrap_or_default();
    Some(Village {
        id,
        name: text_field(obj, "name"),
        num_participants: number_field(obj, "num_participants"),
        scout_groups,
    })
}

fn parse_group(value: &Value) -> Option<ScoutGroup> {
    let obj = value.as_object()?;
    let Some(id) = obj.get("id").and_then(Value::as_i64) else {
        tracing::warn!("skipping scout group without an integer id");
        return None;
    };
    Some(ScoutGroup {
        id,
        name: text_field(obj, "name"),
        num_participants: number_field(obj, "num_participants"),
        stats: obj
            .get("stats")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Number output ───────────────────────────────────────────────────────────

/// Counts are summed as `f64` but are whole numbers in practice; emit those
/// as JSON integers so `5` does not come out as `5.0`.
pub fn count_to_json(n: f64) -> Value {
    if is_whole(n) {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn is_whole(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15
}

pub(crate) fn serialize_count<S: Serializer>(n: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
    if is_whole(*n) {
        s.serialize_i64(*n as i64)
    } else {
        s.serialize_f64(*n)
    }
}

fn serialize_opt_count<S: Serializer>(
    n: &Option<f64>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match n {
        Some(n) => serialize_count(n, s),
        None => s.serialize_none(),
    }
}

// ── Data source resolution ──────────────────────────────────────────────────

/// Parse a dataset from a JSON string.
pub fn parse_dataset(json: &str) -> Result<Dataset> {
    let value: Value = serde_json::from_str(json)?;
    Ok(Dataset::from_value(&value))
}

/// Load a dataset from a file path.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| Error::DataSource {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dataset(&json)
}

/// Resolve the dataset using this order:
///
/// 1. `$SCOUTSTATS_DATA` env var (path to JSON file)
/// 2. `$XDG_DATA_HOME/scoutstats/villages.json` (or `~/.local/share/...`)
/// 3. Embedded fixture from `fixtures/villages.json`
///
/// Any step that fails falls through to the next.
pub fn default_dataset() -> Dataset {
    if let Ok(path) = std::env::var(DATA_ENV_VAR) {
        match load_dataset(&path) {
            Ok(dataset) => return dataset,
            Err(e) => tracing::debug!(%path, error = %e, "env data source unusable"),
        }
    }

    if let Some(path) = xdg_data_path() {
        if path.exists() {
            match load_dataset(&path) {
                Ok(dataset) => return dataset,
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "xdg data source unusable"),
            }
        }
    }

    tracing::debug!("using embedded fixture dataset");
    embedded_fixture()
}

/// The compiled-in fixture dataset.
pub fn embedded_fixture() -> Dataset {
    parse_dataset(EMBEDDED_FIXTURE).unwrap_or_default()
}

/// The fixture as raw JSON, for exporting and seeding local copies.
pub fn embedded_fixture_json() -> &'static str {
    EMBEDDED_FIXTURE
}

fn xdg_data_path() -> Option<PathBuf> {
    let data_home = std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".local/share"))
        })?;
    Some(data_home.join("scoutstats/villages.json"))
}
