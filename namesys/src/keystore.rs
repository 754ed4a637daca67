//! Named signing keys.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use namesys_common::{crypto::Keypair, IdFormat, PeerId};

use crate::errors::KeystoreError;

/// Storage of signing keys under human readable aliases.
pub trait Keystore: Debug + Send + Sync {
    /// Whether a key is stored under `name`.
    fn has(&self, name: &str) -> Result<bool, KeystoreError>;

    /// Store `keypair` under `name`. Existing entries are never overwritten.
    fn put(&self, name: &str, keypair: &Keypair) -> Result<(), KeystoreError>;

    /// The key stored under `name`.
    fn get(&self, name: &str) -> Result<Keypair, KeystoreError>;

    /// All aliases, sorted.
    fn list(&self) -> Result<Vec<String>, KeystoreError>;
}

/// Checks an alias can be used as a key name.
///
/// Names must be non-empty, must not contain `/` and must not start with `.`.
pub fn validate_name(name: &str) -> Result<(), KeystoreError> {
    if name.is_empty() || name.contains('/') || name.starts_with('.') {
        return Err(KeystoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// In-memory [Keystore]. Clones share the same keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeystore {
    keys: Arc<RwLock<BTreeMap<String, Keypair>>>,
}

impl Keystore for MemoryKeystore {
    fn has(&self, name: &str) -> Result<bool, KeystoreError> {
        validate_name(name)?;
        let keys = self.keys.read().unwrap_or_else(|p| p.into_inner());
        Ok(keys.contains_key(name))
    }

    fn put(&self, name: &str, keypair: &Keypair) -> Result<(), KeystoreError> {
        validate_name(name)?;
        let mut keys = self.keys.write().unwrap_or_else(|p| p.into_inner());
        if keys.contains_key(name) {
            return Err(KeystoreError::AlreadyExists(name.to_string()));
        }
        keys.insert(name.to_string(), keypair.clone());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Keypair, KeystoreError> {
        validate_name(name)?;
        let keys = self.keys.read().unwrap_or_else(|p| p.into_inner());
        keys.get(name)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, KeystoreError> {
        let keys = self.keys.read().unwrap_or_else(|p| p.into_inner());
        Ok(keys.keys().cloned().collect())
    }
}

/// [Keystore] keeping one pkarr secret key file per alias in a directory.
#[derive(Debug, Clone)]
pub struct FsKeystore {
    directory: PathBuf,
}

impl FsKeystore {
    /// Open (and create if needed) a keystore in `directory`.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, KeystoreError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, KeystoreError> {
        validate_name(name)?;
        Ok(self.directory.join(name))
    }
}

impl Keystore for FsKeystore {
    fn has(&self, name: &str) -> Result<bool, KeystoreError> {
        Ok(self.path_for(name)?.try_exists()?)
    }

    fn put(&self, name: &str, keypair: &Keypair) -> Result<(), KeystoreError> {
        let path = self.path_for(name)?;
        if path.try_exists()? {
            return Err(KeystoreError::AlreadyExists(name.to_string()));
        }

        keypair.write_secret_key_file(&path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        };
        tracing::debug!("Stored key {name} in {}", path.display());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Keypair, KeystoreError> {
        let path = self.path_for(name)?;
        Keypair::from_secret_key_file(&path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => KeystoreError::NotFound(name.to_string()),
            _ => error.into(),
        })
    }

    fn list(&self) -> Result<Vec<String>, KeystoreError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if validate_name(&name).is_ok() => names.push(name),
                _ => tracing::debug!("Skipping foreign file {:?}", entry.path()),
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Find the key for `alias_or_id`: first by alias, then by the identity each stored key
/// has under `format`.
pub fn lookup_key(
    keystore: &dyn Keystore,
    alias_or_id: &str,
    format: IdFormat,
) -> Result<Keypair, KeystoreError> {
    if validate_name(alias_or_id).is_ok() {
        match keystore.get(alias_or_id) {
            Err(KeystoreError::NotFound(_)) => {}
            found => return found,
        }
    }

    for name in keystore.list()? {
        let keypair = keystore.get(&name)?;
        if PeerId::from_public_key(&keypair.public_key(), format).to_string() == alias_or_id {
            return Ok(keypair);
        }
    }

    Err(KeystoreError::NotFound(alias_or_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(keystore: &dyn Keystore) {
        let keypair = Keypair::random();

        assert!(!keystore.has("main").unwrap());
        keystore.put("main", &keypair).unwrap();
        assert!(keystore.has("main").unwrap());
        assert_eq!(
            keystore.get("main").unwrap().public_key(),
            keypair.public_key()
        );

        assert!(matches!(
            keystore.put("main", &Keypair::random()),
            Err(KeystoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            keystore.get("other"),
            Err(KeystoreError::NotFound(_))
        ));

        keystore.put("backup", &Keypair::random()).unwrap();
        assert_eq!(keystore.list().unwrap(), vec!["backup", "main"]);
    }

    #[test]
    fn memory() {
        exercise(&MemoryKeystore::default());
    }

    #[test]
    fn filesystem() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FsKeystore::open(dir.path()).unwrap());

        // Foreign files are ignored.
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        let reopened = FsKeystore::open(dir.path()).unwrap();
        assert_eq!(reopened.list().unwrap(), vec!["backup", "main"]);
    }

    #[test]
    fn invalid_names() {
        let keystore = MemoryKeystore::default();
        for name in ["", "a/b", ".hidden"] {
            assert!(matches!(
                keystore.put(name, &Keypair::random()),
                Err(KeystoreError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn lookup_by_alias_or_identity() {
        let keystore = MemoryKeystore::default();
        let keypair = Keypair::random();
        keystore.put("main", &keypair).unwrap();
        keystore.put("other", &Keypair::random()).unwrap();

        let by_alias = lookup_key(&keystore, "main", IdFormat::Inline).unwrap();
        assert_eq!(by_alias.public_key(), keypair.public_key());

        for format in [IdFormat::Inline, IdFormat::Hashed] {
            let id = PeerId::from_public_key(&keypair.public_key(), format).to_string();
            let by_id = lookup_key(&keystore, &id, format).unwrap();
            assert_eq!(by_id.public_key(), keypair.public_key());
        }

        assert!(matches!(
            lookup_key(&keystore, "missing", IdFormat::Inline),
            Err(KeystoreError::NotFound(_))
        ));
    }
}
