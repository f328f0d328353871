//! Filesystem key store.

use crate::cache::{CacheSize, KeyCache};
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::names::{
    client_private_filename, client_public_filename, validate_id, zone_private_filename,
    zone_public_filename, POISON_KEY_FILENAME,
};
use crate::provider::{KeyContext, KeyProvider};
use parking_lot::RwLock;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use veilgate_crypto::{fingerprint, ContentKey, KeyPair, PrivateKey, PublicKey, ZoneId};
use zeroize::Zeroizing;

#[cfg(unix)]
const PRIVATE_FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const PUBLIC_FILE_MODE: u32 = 0o644;
#[cfg(unix)]
const KEY_DIR_MODE: u32 = 0o700;

/// A key store that reads keys from key directories.
///
/// Layout, with `<priv>` and `<pub>` the private and public directories
/// (they may be the same):
///
/// - `<priv>/<client_id>_storage` and `<pub>/<client_id>_storage.pub`
/// - `<priv>/<zone_id>_zone` and `<pub>/<zone_id>_zone.pub`
/// - `<priv>/poison_key`
///
/// Keys are stored as raw bytes. Private key files are created with mode
/// 0600 and the private directory must not be accessible by other users.
///
/// # Thread Safety
///
/// Loaded private keys live in a cache behind a lock; the store can be
/// shared across threads.
///
/// # Example
///
/// ```no_run
/// use veilgate_keystore::{CacheSize, FilesystemKeyStore, KeyContext, KeyProvider};
///
/// let store = FilesystemKeyStore::builder()
///     .key_directory(".veilgate_keys")
///     .cache_size(CacheSize::Bounded(128))
///     .build()
///     .unwrap();
/// store.generate_client_keys(b"app").unwrap();
/// let key = store.private_key(&KeyContext::Client(b"app")).unwrap();
/// ```
#[derive(Debug)]
pub struct FilesystemKeyStore {
    private_dir: PathBuf,
    public_dir: PathBuf,
    cache: RwLock<KeyCache<PrivateKey>>,
    poison: RwLock<Option<ContentKey>>,
}

/// Builder for [`FilesystemKeyStore`].
#[derive(Debug, Clone, Default)]
pub struct FilesystemKeyStoreBuilder {
    private_dir: Option<PathBuf>,
    public_dir: Option<PathBuf>,
    cache_size: CacheSize,
}

impl FilesystemKeyStoreBuilder {
    /// Uses one directory for private and public keys.
    #[must_use]
    pub fn key_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.private_dir = Some(dir.clone());
        self.public_dir = Some(dir);
        self
    }

    /// Uses separate directories for private and public keys.
    #[must_use]
    pub fn key_directories(
        mut self,
        private_dir: impl Into<PathBuf>,
        public_dir: impl Into<PathBuf>,
    ) -> Self {
        self.private_dir = Some(private_dir.into());
        self.public_dir = Some(public_dir.into());
        self
    }

    /// Sets the private key cache policy.
    #[must_use]
    pub fn cache_size(mut self, cache_size: CacheSize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Opens the store, creating missing key directories.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory was set, a directory cannot be
    /// created, or the private directory is accessible by other users.
    pub fn build(self) -> KeyStoreResult<FilesystemKeyStore> {
        let private_dir = self
            .private_dir
            .ok_or_else(|| KeyStoreError::invalid_config("key directory not set"))?;
        let public_dir = self.public_dir.unwrap_or_else(|| private_dir.clone());

        create_key_dir(&private_dir)?;
        create_key_dir(&public_dir)?;
        check_private_dir(&private_dir)?;

        debug!(
            private_dir = %private_dir.display(),
            public_dir = %public_dir.display(),
            cache = ?self.cache_size,
            "opened filesystem key store"
        );

        Ok(FilesystemKeyStore {
            private_dir,
            public_dir,
            cache: RwLock::new(KeyCache::new(self.cache_size)),
            poison: RwLock::new(None),
        })
    }
}

impl FilesystemKeyStore {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> FilesystemKeyStoreBuilder {
        FilesystemKeyStoreBuilder::default()
    }

    /// Opens a store over a single key directory with an unlimited cache.
    ///
    /// # Errors
    ///
    /// See [`FilesystemKeyStoreBuilder::build`].
    pub fn open(dir: impl Into<PathBuf>) -> KeyStoreResult<Self> {
        Self::builder().key_directory(dir).build()
    }

    /// Directory holding private keys.
    #[must_use]
    pub fn private_dir(&self) -> &Path {
        &self.private_dir
    }

    /// Directory holding public keys.
    #[must_use]
    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Generates and writes a key pair for `client_id`, replacing any
    /// existing one.
    pub fn generate_client_keys(&self, client_id: &[u8]) -> KeyStoreResult<PublicKey> {
        let id = validate_id(client_id)?;
        let pair = KeyPair::generate();
        self.save_key_pair(&client_private_filename(id), &client_public_filename(id), &pair)?;
        info!(client_id = id, public_key = %pair.public.fingerprint(), "generated client keys");
        Ok(pair.public)
    }

    /// Generates a new zone and writes its key pair.
    pub fn generate_zone_key(&self) -> KeyStoreResult<(ZoneId, PublicKey)> {
        let zone = ZoneId::generate();
        let pair = KeyPair::generate();
        let id = zone.as_str();
        self.save_key_pair(&zone_private_filename(id), &zone_public_filename(id), &pair)?;
        info!(zone_id = id, public_key = %pair.public.fingerprint(), "generated zone key");
        Ok((zone, pair.public))
    }

    /// Number of private keys currently cached.
    #[must_use]
    pub fn cached_keys(&self) -> usize {
        self.cache.read().len()
    }

    fn save_key_pair(
        &self,
        private_name: &str,
        public_name: &str,
        pair: &KeyPair,
    ) -> KeyStoreResult<()> {
        write_key_file(&self.private_dir.join(private_name), pair.private.as_bytes(), true)?;
        write_key_file(&self.public_dir.join(public_name), pair.public.as_bytes(), false)?;
        self.cache
            .write()
            .insert(private_name.to_string(), pair.private.clone());
        Ok(())
    }

    fn filenames(context: &KeyContext<'_>) -> KeyStoreResult<(String, String)> {
        let id = validate_id(context.id())?;
        Ok(match context {
            KeyContext::Client(_) => (client_private_filename(id), client_public_filename(id)),
            KeyContext::Zone(_) => (zone_private_filename(id), zone_public_filename(id)),
        })
    }

    fn load_poison_key(&self) -> KeyStoreResult<ContentKey> {
        let path = self.private_dir.join(POISON_KEY_FILENAME);
        match read_private_file(&path) {
            Ok(bytes) => ContentKey::from_bytes(&bytes)
                .map_err(|e| KeyStoreError::invalid_key_material(format!("poison key: {e}"))),
            Err(KeyStoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                let key = ContentKey::generate();
                write_key_file(&path, key.as_bytes(), true)?;
                info!(path = %path.display(), "generated poison key");
                Ok(key)
            }
            Err(e) => Err(e),
        }
    }
}

impl KeyProvider for FilesystemKeyStore {
    fn private_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PrivateKey> {
        let (private_name, _) = Self::filenames(context)?;
        if let Some(key) = self.cache.write().get(&private_name) {
            return Ok(key);
        }

        let bytes = match read_private_file(&self.private_dir.join(&private_name)) {
            Err(KeyStoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(context.not_found())
            }
            other => other?,
        };
        let key = PrivateKey::from_bytes(&bytes)
            .map_err(|e| KeyStoreError::invalid_key_material(format!("{private_name}: {e}")))?;

        debug!(
            kind = context.kind(),
            public_key = %key.public_key().fingerprint(),
            "loaded private key"
        );
        self.cache.write().insert(private_name, key.clone());
        Ok(key)
    }

    fn public_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PublicKey> {
        let (_, public_name) = Self::filenames(context)?;
        let bytes = match fs::read(self.public_dir.join(&public_name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(context.not_found()),
            Err(e) => return Err(e.into()),
        };
        PublicKey::from_bytes(&bytes)
            .map_err(|e| KeyStoreError::invalid_key_material(format!("{public_name}: {e}")))
    }

    fn poison_key(&self) -> KeyStoreResult<ContentKey> {
        if let Some(key) = self.poison.read().as_ref() {
            return Ok(key.clone());
        }
        let mut slot = self.poison.write();
        if let Some(key) = slot.as_ref() {
            return Ok(key.clone());
        }
        let key = self.load_poison_key()?;
        debug!(fingerprint = %fingerprint(key.as_bytes()), "poison key ready");
        *slot = Some(key.clone());
        Ok(key)
    }

    fn has_zone_key(&self, id: &[u8]) -> bool {
        let Ok(id) = validate_id(id) else {
            return false;
        };
        let name = zone_private_filename(id);
        self.cache.read().contains(&name) || self.private_dir.join(name).is_file()
    }
}

fn create_key_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(KEY_DIR_MODE)
            .create(path)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)
    }
}

fn check_private_dir(path: &Path) -> KeyStoreResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)?.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            return Err(KeyStoreError::InsecurePermissions {
                path: path.to_path_buf(),
                mode,
            });
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn read_private_file(path: &Path) -> KeyStoreResult<Zeroizing<Vec<u8>>> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)?.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            return Err(KeyStoreError::InsecurePermissions {
                path: path.to_path_buf(),
                mode,
            });
        }
    }
    Ok(Zeroizing::new(fs::read(path)?))
}

fn write_key_file(path: &Path, data: &[u8], private: bool) -> KeyStoreResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let mode = if private { PRIVATE_FILE_MODE } else { PUBLIC_FILE_MODE };
        options.mode(mode);
        let mut file = options.open(path)?;
        // mode only applies on create
        file.set_permissions(fs::Permissions::from_mode(mode))?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = private;
        let mut file = options.open(path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generate_and_load_client_keys() {
        let dir = tempdir().unwrap();
        let store = FilesystemKeyStore::open(dir.path()).unwrap();
        let public = store.generate_client_keys(b"app").unwrap();

        assert!(dir.path().join("app_storage").is_file());
        assert!(dir.path().join("app_storage.pub").is_file());

        let reopened = FilesystemKeyStore::open(dir.path()).unwrap();
        let ctx = KeyContext::Client(b"app");
        assert_eq!(reopened.private_key(&ctx).unwrap().public_key(), public);
        assert_eq!(reopened.public_key(&ctx).unwrap(), public);
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FilesystemKeyStore::open(dir.path()).unwrap();
        let err = store.private_key(&KeyContext::Client(b"ghost")).unwrap_err();
        assert!(err.is_not_found());
        let err = store.public_key(&KeyContext::Zone(b"ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn rejects_escaping_ids() {
        let dir = tempdir().unwrap();
        let store = FilesystemKeyStore::open(dir.path()).unwrap();
        let err = store.private_key(&KeyContext::Client(b"../etc/passwd")).unwrap_err();
        assert!(matches!(err, KeyStoreError::InvalidId { .. }));
        assert!(!store.has_zone_key(b"../x"));
    }

    #[test]
    fn separate_directories() {
        let private = tempdir().unwrap();
        let public = tempdir().unwrap();
        let store = FilesystemKeyStore::builder()
            .key_directories(private.path().join("keys"), public.path().join("keys"))
            .build()
            .unwrap();
        let (zone, _) = store.generate_zone_key().unwrap();

        let name = zone_private_filename(zone.as_str());
        assert!(private.path().join("keys").join(&name).is_file());
        assert!(public.path().join("keys").join(format!("{name}.pub")).is_file());
        assert!(store.has_zone_key(zone.as_bytes()));
    }

    #[test]
    fn zone_lookup_without_cache() {
        let dir = tempdir().unwrap();
        let writer = FilesystemKeyStore::open(dir.path()).unwrap();
        let (zone, public) = writer.generate_zone_key().unwrap();

        let store = FilesystemKeyStore::builder()
            .key_directory(dir.path())
            .cache_size(CacheSize::Disabled)
            .build()
            .unwrap();
        assert!(store.has_zone_key(zone.as_bytes()));
        let key = store.private_key(&KeyContext::Zone(zone.as_bytes())).unwrap();
        assert_eq!(key.public_key(), public);
        assert_eq!(store.cached_keys(), 0);
    }

    #[test]
    fn bounded_cache() {
        let dir = tempdir().unwrap();
        let store = FilesystemKeyStore::builder()
            .key_directory(dir.path())
            .cache_size(CacheSize::Bounded(1))
            .build()
            .unwrap();
        store.generate_client_keys(b"a").unwrap();
        store.generate_client_keys(b"b").unwrap();
        assert_eq!(store.cached_keys(), 1);
        assert!(store.private_key(&KeyContext::Client(b"a")).is_ok());
    }

    #[test]
    fn poison_key_created_once() {
        let dir = tempdir().unwrap();
        let store = FilesystemKeyStore::open(dir.path()).unwrap();
        let key = store.poison_key().unwrap();
        assert!(dir.path().join(POISON_KEY_FILENAME).is_file());

        let reopened = FilesystemKeyStore::open(dir.path()).unwrap();
        assert!(reopened.poison_key().unwrap().ct_eq(&key));
    }

    #[test]
    fn corrupt_key_file() {
        let dir = tempdir().unwrap();
        let store = FilesystemKeyStore::open(dir.path()).unwrap();
        write_key_file(&dir.path().join("bad_storage"), b"short", true).unwrap();
        let err = store.private_key(&KeyContext::Client(b"bad")).unwrap_err();
        assert!(matches!(err, KeyStoreError::InvalidKeyMaterial { .. }));
    }

    #[test]
    fn missing_directory_in_builder() {
        let err = FilesystemKeyStore::builder().build().unwrap_err();
        assert!(matches!(err, KeyStoreError::InvalidConfig { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let keys = dir.path().join("keys");
        let store = FilesystemKeyStore::open(&keys).unwrap();
        store.generate_client_keys(b"app").unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&keys), 0o700);
        assert_eq!(mode(&keys.join("app_storage")), 0o600);
        assert_eq!(mode(&keys.join("app_storage.pub")), 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn rejects_open_private_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
        let err = FilesystemKeyStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, KeyStoreError::InsecurePermissions { .. }));
    }
}
