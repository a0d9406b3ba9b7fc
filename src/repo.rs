//! The repository facade.
//!
//! A `Repository` glues the lookup paths together: an object checksum
//! resolves through the loose store first and then through every pack; a
//! ref name resolves through its loose file first and then through
//! `packed-refs`. The facade distinguishes "not found in this store" from
//! "corrupt in this store" and only falls through on the former.
//!
//! The repository path points at the Git directory itself (the directory
//! holding `objects`, `refs`, `hooks`, and `info`), not at a worktree.
//! The facade owns no file handles; packs opened during a lookup are
//! released before it returns.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::ObjectError;
use crate::globs::{GlobTable, GlobsError};
use crate::loose::{LooseError, LooseStore};
use crate::object::Object;
use crate::object_id::Sha1;
use crate::pack::{Pack, PackError};
use crate::refs::{PackedRefs, Ref, RefError, Symref};
use crate::stream::Stream;

/// Entries every repository directory carries.
const REPO_DIR_ENTRIES: [&str; 4] = ["hooks", "info", "objects", "refs"];

/// Errors from repository operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum RepoError {
    /// I/O error during repository operations.
    Io(io::Error),
    /// The object is in neither the loose store nor any pack.
    ObjectNotFound { sha: Sha1 },
    /// The ref exists neither loose nor packed.
    RefNotFound { name: String },
    /// No ancestor of the searched path is a repository.
    NotARepository,
    /// An object decoded from a store is malformed.
    Object(ObjectError),
    /// A pack or its index failed.
    Pack(PackError),
    /// A ref file is malformed.
    Ref(RefError),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::ObjectNotFound { sha } => {
                write!(f, "object {sha} not found in repository")
            }
            Self::RefNotFound { name } => write!(f, "ref {name:?} not found in repository"),
            Self::NotARepository => write!(f, "not a git repository"),
            Self::Object(err) => write!(f, "{err}"),
            Self::Pack(err) => write!(f, "{err}"),
            Self::Ref(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RepoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Object(err) => Some(err),
            Self::Pack(err) => Some(err),
            Self::Ref(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RepoError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ObjectError> for RepoError {
    fn from(err: ObjectError) -> Self {
        Self::Object(err)
    }
}

impl From<PackError> for RepoError {
    fn from(err: PackError) -> Self {
        Self::Pack(err)
    }
}

impl From<RefError> for RepoError {
    fn from(err: RefError) -> Self {
        Self::Ref(err)
    }
}

impl From<LooseError> for RepoError {
    fn from(err: LooseError) -> Self {
        match err {
            LooseError::NotFound { sha } => Self::ObjectNotFound { sha },
            LooseError::Io(err) => Self::Io(err),
            LooseError::Object(err) => Self::Object(err),
        }
    }
}

/// A potential Git repository at a path.
#[derive(Clone, Debug)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Wraps a path. Nothing is validated until an operation runs;
    /// [`Repository::is_valid`] checks the layout explicitly.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the repository path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the path holds all four of the directory entries a
    /// repository carries: `hooks`, `info`, `objects`, `refs`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        has_repo_entries(&self.path)
    }

    /// Walks the ancestors of `start` looking for a repository directory.
    ///
    /// # Errors
    /// Returns `NotARepository` when the filesystem root is reached
    /// without a match.
    pub fn search(start: &Path) -> Result<Self, RepoError> {
        for dir in start.ancestors() {
            if has_repo_entries(dir) {
                debug!(root = %dir.display(), "found repository");
                return Ok(Self::new(dir));
            }
        }
        Err(RepoError::NotARepository)
    }

    /// Returns the loose object store.
    #[must_use]
    pub fn loose(&self) -> LooseStore {
        LooseStore::new(self.path.join("objects"))
    }

    /// Enumerates the pack files under `objects/pack`.
    ///
    /// A repository without a pack directory simply has no packs.
    pub fn pack_paths(&self) -> Result<Vec<PathBuf>, RepoError> {
        let pack_dir = self.path.join("objects").join("pack");
        let entries = match fs::read_dir(&pack_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "pack") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Resolves an object by checksum: loose first, then every pack.
    ///
    /// # Errors
    /// - `ObjectNotFound` if no store holds the object.
    /// - Any other error aborts the search immediately; a corrupt store
    ///   is never skipped.
    pub fn object_by_sha1(&self, sha: &Sha1) -> Result<Object, RepoError> {
        match self.loose_object_by_sha1(sha) {
            Ok(object) => return Ok(object),
            Err(RepoError::ObjectNotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        self.packed_object_by_sha1(sha)
    }

    /// Resolves an object from the loose store only.
    pub fn loose_object_by_sha1(&self, sha: &Sha1) -> Result<Object, RepoError> {
        let stream = self.loose().read(sha)?;
        Ok(stream.into_object())
    }

    /// Resolves an object from the packs only.
    pub fn packed_object_by_sha1(&self, sha: &Sha1) -> Result<Object, RepoError> {
        let pack_paths = self.pack_paths()?;
        debug!(%sha, packs = pack_paths.len(), "searching packs");

        for path in pack_paths {
            let pack = Pack::open(&path)?;
            if let Some(object) = pack.object_by_sha1(sha)? {
                return Ok(object);
            }
        }
        Err(RepoError::ObjectNotFound { sha: *sha })
    }

    /// Resolves a ref name to a checksum: the loose ref file wins over a
    /// packed-refs entry of the same name.
    ///
    /// # Errors
    /// - `RefNotFound` if the name exists neither loose nor packed.
    /// - `Ref` errors for malformed ref data; they are not skipped.
    pub fn sha1_by_ref(&self, name: &str) -> Result<Sha1, RepoError> {
        match self.sha1_from_loose_ref(name) {
            Ok(sha) => return Ok(sha),
            Err(RepoError::RefNotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        self.sha1_from_packed_refs(name)
    }

    /// Reads a loose ref file.
    pub fn sha1_from_loose_ref(&self, name: &str) -> Result<Sha1, RepoError> {
        let path = self.path.join(name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RepoError::RefNotFound {
                    name: name.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Ref::decode(&data)?)
    }

    /// Scans the packed-refs file for a name.
    pub fn sha1_from_packed_refs(&self, name: &str) -> Result<Sha1, RepoError> {
        let path = self.path.join("packed-refs");
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RepoError::RefNotFound {
                    name: name.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        PackedRefs::decode(&data)?
            .sha1_for_name(name)
            .ok_or(RepoError::RefNotFound {
                name: name.to_string(),
            })
    }

    /// Resolves a symbolic ref file one hop: the file at `<repo>/<name>`
    /// names a target ref, which is then resolved like any other ref.
    /// Chains of symrefs are not followed.
    pub fn sha1_by_symref(&self, name: &str) -> Result<Sha1, RepoError> {
        let path = self.path.join(name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RepoError::RefNotFound {
                    name: name.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let symref = Symref::decode(&data)?;
        self.sha1_by_ref(&symref.target)
    }

    /// Hashes a payload as an object of the named type, optionally
    /// writing it to the loose store.
    ///
    /// # Errors
    /// - `Object` errors if the payload does not decode as the type.
    /// - `Io` errors from the loose write.
    pub fn hash_object(
        &self,
        type_name: &str,
        payload: &[u8],
        write: bool,
    ) -> Result<Sha1, RepoError> {
        let object = Object::decode_payload(type_name, payload)?;
        let stream = Stream::new(object);
        if write {
            Ok(self.loose().write(&stream)?)
        } else {
            Ok(stream.hash())
        }
    }

    /// Loads the worktree's `.gitignore` glob table.
    ///
    /// The repository path is the Git directory, so the worktree root is
    /// its parent.
    pub fn ignores(&self) -> Result<GlobTable, GlobsError> {
        GlobTable::at_path(&self.path.join("..").join(".gitignore"))
    }

    /// Loads the repository's `info/exclude` glob table.
    pub fn excludes(&self) -> Result<GlobTable, GlobsError> {
        GlobTable::at_path(&self.path.join("info").join("exclude"))
    }
}

/// Checks a directory for the four entries every repository carries.
fn has_repo_entries(dir: &Path) -> bool {
    REPO_DIR_ENTRIES
        .iter()
        .all(|entry| dir.join(entry).exists())
}
