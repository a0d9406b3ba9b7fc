//! The loose object store.
//!
//! Each loose object is one zlib-compressed envelope stored at
//! `objects/<aa>/<rest-38>`, where `aa` is the first two hex characters of
//! the object's SHA-1 and `rest-38` the remaining thirty-eight.
//!
//! # Failure Modes
//! - A missing object file is `NotFound`, distinct from an I/O error, so
//!   the repository facade can fall through to pack lookup.
//! - Writes are not atomic; concurrent writers of the same checksum race
//!   harmlessly because the final file content is content-addressed. An
//!   object that already exists on disk is never rewritten.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;

use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::errors::ObjectError;
use crate::object_id::Sha1;
use crate::stream::Stream;

/// Zlib level for loose object files; matches Git's default.
const COMPRESSION_LEVEL: u32 = 6;

/// Mode bits for a finished loose object file.
#[cfg(unix)]
const OBJECT_FILE_MODE: u32 = 0o444;

/// Errors from the loose object store.
#[derive(Debug)]
#[non_exhaustive]
pub enum LooseError {
    /// No loose object file exists for the checksum.
    NotFound { sha: Sha1 },
    /// I/O error during file operations.
    Io(io::Error),
    /// The file inflated but its envelope is malformed.
    Object(ObjectError),
}

impl fmt::Display for LooseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { sha } => write!(f, "no loose object {sha}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Object(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LooseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Io(err) => Some(err),
            Self::Object(err) => Some(err),
        }
    }
}

impl From<io::Error> for LooseError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ObjectError> for LooseError {
    fn from(err: ObjectError) -> Self {
        Self::Object(err)
    }
}

/// A loose object store rooted at an `objects` directory.
#[derive(Clone, Debug)]
pub struct LooseStore {
    objects_dir: PathBuf,
}

impl LooseStore {
    /// Creates a store over the given `objects` directory.
    #[must_use]
    pub fn new(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects_dir: objects_dir.into(),
        }
    }

    /// Returns the path a loose object with this checksum would occupy.
    #[must_use]
    pub fn object_path(&self, sha: &Sha1) -> PathBuf {
        let (prefix, rest) = sha.split_hex(2);
        self.objects_dir.join(prefix).join(rest)
    }

    /// Returns true if a loose object file exists for the checksum.
    #[must_use]
    pub fn contains(&self, sha: &Sha1) -> bool {
        self.object_path(sha).is_file()
    }

    /// Reads and decodes the loose object with the given checksum.
    ///
    /// # Errors
    /// - `LooseError::NotFound` if no file exists for the checksum.
    /// - `LooseError::Io` for any other I/O or inflation failure.
    /// - `LooseError::Object` if the inflated envelope is malformed.
    pub fn read(&self, sha: &Sha1) -> Result<Stream, LooseError> {
        let path = self.object_path(sha);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(LooseError::NotFound { sha: *sha })
            }
            Err(err) => return Err(err.into()),
        };

        let mut data = Vec::new();
        ZlibDecoder::new(io::BufReader::new(file)).read_to_end(&mut data)?;

        Ok(Stream::decode(&data)?)
    }

    /// Writes a stream as a loose object and returns its checksum.
    ///
    /// If an object with this checksum already exists there is no need to
    /// write it again; the call succeeds without touching the file.
    ///
    /// # Errors
    /// Returns `LooseError::Io` if the directory or file cannot be created
    /// or written.
    pub fn write(&self, stream: &Stream) -> Result<Sha1, LooseError> {
        let sha = stream.hash();
        let path = self.object_path(&sha);
        if path.exists() {
            return Ok(sha);
        }

        let slot = path.parent().expect("object path always has a parent");
        fs::create_dir_all(slot)?;

        let file = File::create(&path)?;
        let mut encoder = ZlibEncoder::new(file, Compression::new(COMPRESSION_LEVEL));
        encoder.write_all(stream.bytes())?;
        let file = encoder.finish()?;
        set_object_permissions(&file)?;

        Ok(sha)
    }
}

#[cfg(unix)]
fn set_object_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(OBJECT_FILE_MODE))
}

#[cfg(not(unix))]
fn set_object_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use std::path::Path;

    fn store() -> (tempfile::TempDir, LooseStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::new(dir.path().join("objects"));
        (dir, store)
    }

    #[test]
    fn object_path_fans_out_on_first_byte() {
        let store = LooseStore::new("/repo/objects");
        let sha = Sha1::from_hex("bd9dbf5aae1a3862dd1526723246b20206e5fc37").unwrap();
        assert_eq!(
            store.object_path(&sha),
            Path::new("/repo/objects/bd/9dbf5aae1a3862dd1526723246b20206e5fc37")
        );
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, store) = store();
        let stream = Stream::new(Blob::new(&b"what is up, doc?"[..]).into());

        let sha = store.write(&stream).unwrap();
        assert_eq!(
            sha,
            Sha1::from_hex("bd9dbf5aae1a3862dd1526723246b20206e5fc37").unwrap()
        );
        assert!(store.contains(&sha));

        let read_back = store.read(&sha).unwrap();
        assert_eq!(read_back.object(), stream.object());
        assert_eq!(read_back.hash(), sha);
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_dir, store) = store();
        let sha = Sha1::from_hex("bd9dbf5aae1a3862dd1526723246b20206e5fc37").unwrap();
        assert!(matches!(
            store.read(&sha).unwrap_err(),
            LooseError::NotFound { .. }
        ));
        assert!(!store.contains(&sha));
    }

    #[test]
    fn rewrite_of_existing_object_succeeds() {
        let (_dir, store) = store();
        let stream = Stream::new(Blob::new(&b"same bytes"[..]).into());

        let first = store.write(&stream).unwrap();
        // The file is read-only now; a second write must not try to reopen it.
        let second = store.write(&stream).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    #[cfg(unix)]
    fn written_files_are_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        let stream = Stream::new(Blob::new(&b"perm check"[..]).into());
        let sha = store.write(&stream).unwrap();

        let mode = fs::metadata(store.object_path(&sha))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o444);
    }

    #[test]
    fn corrupt_file_is_an_object_error() {
        let (_dir, store) = store();
        let sha = Sha1::from_hex("bd9dbf5aae1a3862dd1526723246b20206e5fc37").unwrap();
        let path = store.object_path(&sha);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        // Valid zlib, invalid envelope.
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"not an envelope at all").unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert!(matches!(
            store.read(&sha).unwrap_err(),
            LooseError::Object(_)
        ));
    }
}
