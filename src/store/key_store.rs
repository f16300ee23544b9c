// Key Store
// Persists one RSA key pair per user id as two small decimal text files

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::rsa::{
    generate_keypair, ErrorKind, RsaBigInt, RsaError, RsaKeyPair, RsaPrivateKey, RsaPublicKey,
};
use crate::util::file_ops::{read_lines, write_atomic, FileLock};

/// Errors that can occur while storing or loading keys
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("invalid user id {0:?}")]
    InvalidUserId(String),

    #[error("no key files found for user '{user_id}'")]
    NotFound { user_id: String },

    #[error("malformed key file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("public and private key modulus (n) do not match")]
    MismatchedModulus,

    #[error(transparent)]
    Rsa(#[from] RsaError),

    #[error("key store I/O error: {0}")]
    Io(#[from] io::Error),
}

impl KeyStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyStoreError::InvalidUserId(_)
            | KeyStoreError::Malformed { .. }
            | KeyStoreError::MismatchedModulus => ErrorKind::InvalidParameter,
            KeyStoreError::NotFound { .. } | KeyStoreError::Io(_) => ErrorKind::StorageFailure,
            KeyStoreError::Rsa(e) => e.kind(),
        }
    }
}

/// Result type for key store operations
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Configuration for the key store
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub directory: PathBuf,
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("keys"),
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

/// File-backed store: `{user_id}_public.bin` holds "n\ne\n",
/// `{user_id}_private.bin` holds "n\nd\n".
#[derive(Clone, Debug)]
pub struct KeyStore {
    config: StoreConfig,
}

impl KeyStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    pub fn public_key_path(&self, user_id: &str) -> KeyStoreResult<PathBuf> {
        self.artifact_path(user_id, "public.bin")
    }

    pub fn private_key_path(&self, user_id: &str) -> KeyStoreResult<PathBuf> {
        self.artifact_path(user_id, "private.bin")
    }

    fn lock_path(&self, user_id: &str) -> KeyStoreResult<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.config.directory.join(format!("{}.lock", user_id)))
    }

    fn artifact_path(&self, user_id: &str, suffix: &str) -> KeyStoreResult<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.config.directory.join(format!("{}_{}", user_id, suffix)))
    }

    /// True only when both the public and the private file are present
    pub fn exists(&self, user_id: &str) -> bool {
        match (self.public_key_path(user_id), self.private_key_path(user_id)) {
            (Ok(public), Ok(private)) => public.is_file() && private.is_file(),
            _ => false,
        }
    }

    /// Write both halves of a key pair. The moduli must agree.
    pub fn save(
        &self,
        user_id: &str,
        public_key: &RsaPublicKey,
        private_key: &RsaPrivateKey,
    ) -> KeyStoreResult<()> {
        let public_path = self.public_key_path(user_id)?;
        let private_path = self.private_key_path(user_id)?;

        // For RSA, n should be the same in both keys
        if public_key.n != private_key.n {
            return Err(KeyStoreError::MismatchedModulus);
        }

        fs::create_dir_all(&self.config.directory)?;

        write_atomic(&public_path, format!("{}\n{}\n", public_key.n, public_key.e).as_bytes())?;
        write_atomic(&private_path, format!("{}\n{}\n", private_key.n, private_key.d).as_bytes())?;

        info!(
            "saved key pair for user '{}' in {}",
            user_id,
            self.config.directory.display()
        );
        Ok(())
    }

    /// Read both halves of a stored key pair
    pub fn load(&self, user_id: &str) -> KeyStoreResult<RsaKeyPair> {
        let public_path = self.public_key_path(user_id)?;
        let private_path = self.private_key_path(user_id)?;

        if !public_path.is_file() || !private_path.is_file() {
            return Err(KeyStoreError::NotFound {
                user_id: user_id.to_string(),
            });
        }

        let public_key = read_public_key(&public_path)?;
        let private_key = read_private_key(&private_path)?;

        if public_key.n != private_key.n {
            return Err(KeyStoreError::MismatchedModulus);
        }

        debug!(
            "loaded key pair for user '{}', modulus {}",
            user_id,
            public_key.fingerprint()
        );

        Ok(RsaKeyPair {
            public_key,
            private_key,
        })
    }

    /// Load the user's key pair, or generate and save a new one.
    ///
    /// Runs under an exclusive per-user lock file so concurrent callers
    /// end up with the same pair.
    pub fn get_or_create(&self, user_id: &str, bits: u64) -> KeyStoreResult<RsaKeyPair> {
        let lock_path = self.lock_path(user_id)?;
        fs::create_dir_all(&self.config.directory)?;
        let _lock = FileLock::acquire(&lock_path, self.config.lock_timeout)?;

        if self.exists(user_id) {
            info!("using existing key pair for user '{}'", user_id);
            return self.load(user_id);
        }

        info!("no key pair for user '{}', generating {} bits", user_id, bits);
        let keypair = generate_keypair(bits)?;
        self.save(user_id, &keypair.public_key, &keypair.private_key)?;

        Ok(keypair)
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Read a single public key file ("n\ne\n")
pub fn read_public_key(path: &Path) -> KeyStoreResult<RsaPublicKey> {
    let (n, e) = read_pair(path)?;
    Ok(RsaPublicKey::new(n, e))
}

/// Read a single private key file ("n\nd\n")
pub fn read_private_key(path: &Path) -> KeyStoreResult<RsaPrivateKey> {
    let (n, d) = read_pair(path)?;
    Ok(RsaPrivateKey::new(n, d))
}

fn read_pair(path: &Path) -> KeyStoreResult<(RsaBigInt, RsaBigInt)> {
    let malformed = |reason: String| KeyStoreError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let lines = read_lines(path)?;
    if lines.len() < 2 {
        return Err(malformed(format!(
            "expected two numeric lines, found {}",
            lines.len()
        )));
    }

    let parse = |line: &str| {
        line.parse::<RsaBigInt>()
            .map_err(|e| malformed(format!("{:?} is not a decimal integer: {}", line, e)))
    };

    Ok((parse(&lines[0])?, parse(&lines[1])?))
}

// Ids become file names: no separators, no dot-only names
fn validate_user_id(user_id: &str) -> KeyStoreResult<()> {
    let valid = !user_id.is_empty()
        && user_id != "."
        && user_id != ".."
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(KeyStoreError::InvalidUserId(user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::bigint::from_u64;
    use crate::rsa::{decrypt, encrypt};
    use rstest::rstest;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn store() -> (TempDir, KeyStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(StoreConfig::default().with_directory(dir.path().join("keys")));
        (dir, store)
    }

    fn textbook_keypair() -> RsaKeyPair {
        RsaKeyPair::from_primes_with_exponent(&from_u64(61), &from_u64(53), &from_u64(17))
            .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, store) = store();
        let keypair = textbook_keypair();

        assert!(!store.exists("A"));
        store
            .save("A", &keypair.public_key, &keypair.private_key)
            .unwrap();
        assert!(store.exists("A"));

        let public = fs::read_to_string(store.public_key_path("A").unwrap()).unwrap();
        let private = fs::read_to_string(store.private_key_path("A").unwrap()).unwrap();
        assert_eq!(public, "3233\n17\n");
        assert_eq!(private, "3233\n2753\n");

        assert_eq!(store.load("A").unwrap(), keypair);
    }

    #[test]
    fn test_exists_needs_both_files() {
        let (_dir, store) = store();
        let keypair = textbook_keypair();
        store
            .save("A", &keypair.public_key, &keypair.private_key)
            .unwrap();

        fs::remove_file(store.private_key_path("A").unwrap()).unwrap();
        assert!(!store.exists("A"));

        let err = store.load("A").unwrap_err();
        assert!(matches!(err, KeyStoreError::NotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn test_save_rejects_mismatched_modulus() {
        let (_dir, store) = store();
        let keypair = textbook_keypair();
        let other = RsaPrivateKey::new(from_u64(3599), from_u64(17));

        let err = store.save("A", &keypair.public_key, &other).unwrap_err();
        assert!(matches!(err, KeyStoreError::MismatchedModulus));
        assert!(!store.exists("A"));
    }

    #[rstest(
        content,
        case(""),
        case("3233\n"),
        case("\n\n3233\n\n"),
        case("3233\nseventeen\n"),
        case("-3233\n17\n")
    )]
    fn test_load_rejects_malformed(content: &str) {
        let (_dir, store) = store();
        let keypair = textbook_keypair();
        store
            .save("A", &keypair.public_key, &keypair.private_key)
            .unwrap();
        fs::write(store.public_key_path("A").unwrap(), content).unwrap();

        let err = store.load("A").unwrap_err();
        assert!(matches!(err, KeyStoreError::Malformed { .. }), "{}", err);
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[rstest(
        content,
        case(""),
        case("3233
"),
        case("3233
2753.0
"),
        case("0x0ca1
2753
")
    )]
    fn test_load_rejects_malformed_private_key(content: &str) {
        let (_dir, store) = store();
        let keypair = textbook_keypair();
        store
            .save("A", &keypair.public_key, &keypair.private_key)
            .unwrap();
        let private_path = store.private_key_path("A").unwrap();
        fs::write(&private_path, content).unwrap();

        match store.load("A").unwrap_err() {
            KeyStoreError::Malformed { path, .. } => assert_eq!(path, private_path),
            err => panic!("unexpected error: {}", err),
        }
        assert!(matches!(
            read_private_key(&private_path),
            Err(KeyStoreError::Malformed { .. })
        ));
    }

    #[test]
    fn test_load_rejects_mismatched_files() {
        let (_dir, store) = store();
        let keypair = textbook_keypair();
        store
            .save("A", &keypair.public_key, &keypair.private_key)
            .unwrap();
        fs::write(store.private_key_path("A").unwrap(), "3599\n2753\n").unwrap();

        let err = store.load("A").unwrap_err();
        assert!(matches!(err, KeyStoreError::MismatchedModulus));
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let (dir, store) = store();

        let first = store.get_or_create("A", 64).unwrap();
        let second = store.get_or_create("A", 64).unwrap();
        assert_eq!(first, second);

        // a fresh store over the same directory, as after a restart
        let restarted =
            KeyStore::new(StoreConfig::default().with_directory(dir.path().join("keys")));
        assert_eq!(restarted.get_or_create("A", 64).unwrap(), first);

        // no lock file left behind
        assert!(!store.directory().join("A.lock").exists());

        let c = encrypt("hi", &first.public_key).unwrap();
        assert_eq!(decrypt(&c, &second.private_key).unwrap(), "hi");
    }

    #[test]
    fn test_get_or_create_separate_users() {
        let (_dir, store) = store();

        let a = store.get_or_create("A", 64).unwrap();
        let b = store.get_or_create("B", 64).unwrap();
        assert_ne!(a.public_key.n, b.public_key.n);
    }

    #[test]
    fn test_get_or_create_rejects_small_keys() {
        let (_dir, store) = store();

        let err = store.get_or_create("A", 4).unwrap_err();
        assert!(matches!(
            err,
            KeyStoreError::Rsa(RsaError::InvalidBitSize { bits: 4, .. })
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(!store.exists("A"));
    }

    #[test]
    fn test_get_or_create_concurrent() {
        let (_dir, store) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get_or_create("shared", 64).unwrap())
            })
            .collect();

        let keypairs: Vec<RsaKeyPair> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for keypair in &keypairs[1..] {
            assert_eq!(keypair, &keypairs[0]);
        }
        assert_eq!(store.load("shared").unwrap(), keypairs[0]);
    }

    #[rstest(user_id, case(""), case("."), case(".."), case("../A"), case("a/b"), case("a b"))]
    fn test_rejects_invalid_user_id(user_id: &str) {
        let (_dir, store) = store();

        assert!(!store.exists(user_id));
        assert!(matches!(
            store.get_or_create(user_id, 64),
            Err(KeyStoreError::InvalidUserId(_))
        ));
        assert!(matches!(
            store.load(user_id),
            Err(KeyStoreError::InvalidUserId(_))
        ));
    }

    #[test]
    fn test_read_single_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let public_path = dir.path().join("peer_public.bin");
        fs::write(&public_path, "3233\n17\n").unwrap();

        let key = read_public_key(&public_path).unwrap();
        assert_eq!(key, RsaPublicKey::new(from_u64(3233), from_u64(17)));

        let private_path = dir.path().join("peer_private.bin");
        fs::write(&private_path, "3233\n2753").unwrap();
        let key = read_private_key(&private_path).unwrap();
        assert_eq!(key.d, from_u64(2753));

        let err = read_public_key(&dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, KeyStoreError::Io(_)));
    }
}
