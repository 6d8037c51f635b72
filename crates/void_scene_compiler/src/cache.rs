//! Incremental build cache
//!
//! Records, per output artifact, the content fingerprint of every input that
//! went into it. Before compiling, [`CacheManager::evaluate`] compares the
//! recorded set with the current inputs; after a successful compile,
//! [`CacheManager::store`] replaces the set. Failed compiles never store, so
//! the previous record stays valid and the next build retries.
//!
//! # Database
//!
//! The record set is a bincode file written temp-then-rename on every store.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::output;

/// Version of the database file layout
pub const CACHE_DATABASE_VERSION: u32 = 1;

/// Errors from the build cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache database {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
}

/// SHA-256 content fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of in-memory content
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Fingerprint of a file's content
    pub fn of_file(path: impl AsRef<Path>) -> io::Result<Self> {
        fs::read(path).map(|data| Self::of_bytes(&data))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// One input that contributed to an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub rhi_target: String,
    pub virtual_source_path: String,
    pub fingerprint: Fingerprint,
    pub format_version: u32,
}

/// Output artifact a record belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(output: &Path) -> Self {
        Self(output.to_string_lossy().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why an artifact must be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecompileReason {
    NoCacheEntry,
    FormatVersionChanged { cached: u32, current: u32 },
    TargetChanged { cached: String, current: String },
    OutputMissing,
    InputMissing(String),
    InputSetChanged,
    InputModified(String),
}

impl fmt::Display for RecompileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCacheEntry => write!(f, "no cache entry"),
            Self::FormatVersionChanged { cached, current } => {
                write!(f, "format version changed from {} to {}", cached, current)
            }
            Self::TargetChanged { cached, current } => write!(f, "target changed from {} to {}", cached, current),
            Self::OutputMissing => write!(f, "output missing"),
            Self::InputMissing(path) => write!(f, "input {} missing", path),
            Self::InputSetChanged => write!(f, "input set changed"),
            Self::InputModified(path) => write!(f, "input {} modified", path),
        }
    }
}

/// Build gate state of one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    UpToDate,
    NeedsRecompile(RecompileReason),
}

impl GateState {
    pub fn needs_recompile(&self) -> bool {
        matches!(self, Self::NeedsRecompile(_))
    }
}

/// Current state of one declared input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputState {
    pub virtual_source_path: String,
    /// `None` when the file does not exist
    pub fingerprint: Option<Fingerprint>,
}

/// Decide whether an artifact must be rebuilt
///
/// Pure function of the recorded entries and the current inputs.
pub fn decide(
    format_version: u32,
    rhi_target: &str,
    cached: Option<&[CacheEntry]>,
    current: &[InputState],
    output_exists: bool,
) -> GateState {
    use RecompileReason::*;

    let cached = match cached {
        Some(entries) if !entries.is_empty() => entries,
        _ => return GateState::NeedsRecompile(NoCacheEntry),
    };

    if let Some(entry) = cached.iter().find(|e| e.format_version != format_version) {
        return GateState::NeedsRecompile(FormatVersionChanged {
            cached: entry.format_version,
            current: format_version,
        });
    }
    if let Some(entry) = cached.iter().find(|e| e.rhi_target != rhi_target) {
        return GateState::NeedsRecompile(TargetChanged {
            cached: entry.rhi_target.clone(),
            current: rhi_target.to_string(),
        });
    }
    if !output_exists {
        return GateState::NeedsRecompile(OutputMissing);
    }
    if let Some(input) = current.iter().find(|i| i.fingerprint.is_none()) {
        return GateState::NeedsRecompile(InputMissing(input.virtual_source_path.clone()));
    }

    let mut cached_paths: Vec<&str> = cached.iter().map(|e| e.virtual_source_path.as_str()).collect();
    let mut current_paths: Vec<&str> = current.iter().map(|i| i.virtual_source_path.as_str()).collect();
    cached_paths.sort_unstable();
    current_paths.sort_unstable();
    if cached_paths != current_paths {
        return GateState::NeedsRecompile(InputSetChanged);
    }

    for input in current {
        let unchanged = cached
            .iter()
            .any(|e| e.virtual_source_path == input.virtual_source_path && Some(e.fingerprint) == input.fingerprint);
        if !unchanged {
            return GateState::NeedsRecompile(InputModified(input.virtual_source_path.clone()));
        }
    }
    GateState::UpToDate
}

/// Everything the gate needs to judge one artifact
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub rhi_target: String,
    pub output: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub format_version: u32,
}

impl BuildRequest {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(&self.output)
    }
}

/// Gate verdict plus the entries to record if the compile succeeds
#[derive(Debug, Clone)]
pub struct BuildDecision {
    pub state: GateState,
    pub entries: Vec<CacheEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheDatabase {
    version: u32,
    artifacts: BTreeMap<ArtifactKey, Vec<CacheEntry>>,
}

/// Build cache shared by all compile workers of one build
pub struct CacheManager {
    path: Option<PathBuf>,
    database: RwLock<CacheDatabase>,
    /// Serializes read-modify-write of the database file
    store_lock: Mutex<()>,
    artifact_locks: Mutex<HashMap<ArtifactKey, Arc<Mutex<()>>>>,
}

impl CacheManager {
    /// Cache that lives only for this process
    pub fn in_memory() -> Self {
        Self::with_database(None, CacheDatabase::default())
    }

    /// Open or create a cache database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let database = match fs::read(&path) {
            Ok(data) => {
                let database: CacheDatabase = bincode::deserialize(&data).map_err(|e| CacheError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                if database.version == CACHE_DATABASE_VERSION {
                    log::debug!("Opened build cache {:?} ({} artifacts)", path, database.artifacts.len());
                    database
                } else {
                    log::warn!(
                        "Build cache {:?} has version {}, expected {}; starting empty",
                        path,
                        database.version,
                        CACHE_DATABASE_VERSION
                    );
                    CacheDatabase::default()
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => CacheDatabase::default(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        Ok(Self::with_database(Some(path), database))
    }

    fn with_database(path: Option<PathBuf>, mut database: CacheDatabase) -> Self {
        database.version = CACHE_DATABASE_VERSION;
        Self {
            path,
            database: RwLock::new(database),
            store_lock: Mutex::new(()),
            artifact_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Database file, if persistent
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of artifacts with a record
    pub fn len(&self) -> usize {
        self.database.read().artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded entries of an artifact
    pub fn entries(&self, key: &ArtifactKey) -> Option<Vec<CacheEntry>> {
        self.database.read().artifacts.get(key).cloned()
    }

    /// Lock serializing compiles of one artifact
    pub fn artifact_lock(&self, key: &ArtifactKey) -> Arc<Mutex<()>> {
        self.artifact_locks.lock().entry(key.clone()).or_default().clone()
    }

    /// Fingerprint the inputs of `request` and run the gate
    pub fn evaluate(&self, request: &BuildRequest) -> Result<BuildDecision, CacheError> {
        let mut current = Vec::with_capacity(request.inputs.len());
        let mut entries = Vec::with_capacity(request.inputs.len());
        for input in &request.inputs {
            let virtual_source_path = input.to_string_lossy().replace('\\', "/");
            let fingerprint = match Fingerprint::of_file(input) {
                Ok(fingerprint) => Some(fingerprint),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(source) => {
                    return Err(CacheError::Io {
                        path: input.clone(),
                        source,
                    })
                }
            };
            if let Some(fingerprint) = fingerprint {
                entries.push(CacheEntry {
                    rhi_target: request.rhi_target.clone(),
                    virtual_source_path: virtual_source_path.clone(),
                    fingerprint,
                    format_version: request.format_version,
                });
            }
            current.push(InputState {
                virtual_source_path,
                fingerprint,
            });
        }

        let key = request.key();
        let state = {
            let database = self.database.read();
            decide(
                request.format_version,
                &request.rhi_target,
                database.artifacts.get(&key).map(Vec::as_slice),
                &current,
                request.output.exists(),
            )
        };
        if let GateState::NeedsRecompile(reason) = &state {
            log::debug!("{} needs recompile: {}", key, reason);
        }
        Ok(BuildDecision { state, entries })
    }

    /// Replace the record of an artifact and persist the database
    ///
    /// The in-memory record only changes once the database file is written.
    pub fn store(&self, key: ArtifactKey, entries: Vec<CacheEntry>) -> Result<(), CacheError> {
        let _guard = self.store_lock.lock();

        let mut updated = self.database.read().clone();
        updated.artifacts.insert(key, entries);
        self.write_database(&updated)?;

        *self.database.write() = updated;
        Ok(())
    }

    /// Drop the record of an artifact
    pub fn invalidate(&self, key: &ArtifactKey) -> Result<(), CacheError> {
        let _guard = self.store_lock.lock();

        let mut updated = self.database.read().clone();
        if updated.artifacts.remove(key).is_none() {
            return Ok(());
        }
        self.write_database(&updated)?;

        *self.database.write() = updated;
        Ok(())
    }

    fn write_database(&self, database: &CacheDatabase) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = bincode::serialize(database).map_err(|e| CacheError::Corrupt {
            path: path.clone(),
            message: e.to_string(),
        })?;
        output::write_atomic(path, &data).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        log::trace!("Flushed build cache {:?} ({} bytes)", path, data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(path: &str, content: &[u8]) -> CacheEntry {
        CacheEntry {
            rhi_target: "Vulkan".into(),
            virtual_source_path: path.into(),
            fingerprint: Fingerprint::of_bytes(content),
            format_version: 1,
        }
    }

    fn input(path: &str, content: Option<&str>) -> InputState {
        InputState {
            virtual_source_path: path.into(),
            fingerprint: content.map(|c| Fingerprint::of_bytes(c.as_bytes())),
        }
    }

    #[test]
    fn test_decide() {
        let cached = vec![entry("a.json", b"a"), entry("catalog.json", b"c")];
        let current = vec![input("a.json", Some("a")), input("catalog.json", Some("c"))];

        assert_eq!(decide(1, "Vulkan", Some(cached.as_slice()), &current, true), GateState::UpToDate);
        assert_eq!(
            decide(1, "Vulkan", None, &current, true),
            GateState::NeedsRecompile(RecompileReason::NoCacheEntry)
        );
        assert_eq!(
            decide(2, "Vulkan", Some(cached.as_slice()), &current, true),
            GateState::NeedsRecompile(RecompileReason::FormatVersionChanged { cached: 1, current: 2 })
        );
        assert!(matches!(
            decide(1, "Direct3D12", Some(cached.as_slice()), &current, true),
            GateState::NeedsRecompile(RecompileReason::TargetChanged { .. })
        ));
        assert_eq!(
            decide(1, "Vulkan", Some(cached.as_slice()), &current, false),
            GateState::NeedsRecompile(RecompileReason::OutputMissing)
        );

        let missing = vec![input("a.json", None), input("catalog.json", Some("c"))];
        assert_eq!(
            decide(1, "Vulkan", Some(cached.as_slice()), &missing, true),
            GateState::NeedsRecompile(RecompileReason::InputMissing("a.json".into()))
        );

        let added = vec![input("a.json", Some("a"))];
        assert_eq!(
            decide(1, "Vulkan", Some(cached.as_slice()), &added, true),
            GateState::NeedsRecompile(RecompileReason::InputSetChanged)
        );

        let modified = vec![input("a.json", Some("a")), input("catalog.json", Some("changed"))];
        assert_eq!(
            decide(1, "Vulkan", Some(cached.as_slice()), &modified, true),
            GateState::NeedsRecompile(RecompileReason::InputModified("catalog.json".into()))
        );
    }

    #[test]
    fn test_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        let key = ArtifactKey::new(Path::new("out/level.scene"));

        let cache = CacheManager::open(&path).unwrap();
        assert!(cache.is_empty());
        cache.store(key.clone(), vec![entry("level.json", b"x")]).unwrap();

        let reopened = CacheManager::open(&path).unwrap();
        assert_eq!(reopened.entries(&key), Some(vec![entry("level.json", b"x")]));

        reopened.invalidate(&key).unwrap();
        assert!(CacheManager::open(&path).unwrap().entries(&key).is_none());
    }

    #[test]
    fn test_corrupt_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        fs::write(&path, b"\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        assert!(matches!(CacheManager::open(&path), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_failed_store_keeps_previous_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        let key = ArtifactKey::new(Path::new("level.scene"));
        let cache = CacheManager::open(&path).unwrap();
        cache.store(key.clone(), vec![entry("level.json", b"old")]).unwrap();

        // A directory at the database path makes the next write fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("blocker"), b"x").unwrap();

        assert!(matches!(
            cache.store(key.clone(), vec![entry("level.json", b"new")]),
            Err(CacheError::Io { .. })
        ));
        assert_eq!(cache.entries(&key), Some(vec![entry("level.json", b"old")]));
    }

    #[test]
    fn test_artifact_lock_is_shared_per_key() {
        let cache = CacheManager::in_memory();
        let a = ArtifactKey::new(Path::new("a.scene"));
        let b = ArtifactKey::new(Path::new("b.scene"));
        assert!(Arc::ptr_eq(&cache.artifact_lock(&a), &cache.artifact_lock(&a)));
        assert!(!Arc::ptr_eq(&cache.artifact_lock(&a), &cache.artifact_lock(&b)));
    }
}
