//! Struct archiving functionality
//!
//! To add archiving functionality to a struct implement the `Archived` trait, holding one
//! `Archiver` per CSV file to be written.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::{File, OpenOptions};
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
///
/// Records must be flat (no nested structs or sequences) to be representable as a CSV row.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not create the archive file: {0}")]
    FileError(std::io::Error),

    #[error("Could not write the record: {0}")]
    CsvError(csv::Error),

    #[error("The archiver has not been initialised")]
    NotInitialised
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trait which enables a struct to be archived as a csv.
///
/// The archiver members shall be setup in the struct's `init` or `new` functions.
pub trait Archived {
    /// Write the archives for this struct
    fn write(&mut self) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    ///
    /// Parent directories are created if they don't exist.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        let session_path = session.arch_root.join(path);

        if let Some(parent) = session_path.parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::FileError)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(session_path)
            .map_err(ArchiveError::FileError)?;

        Ok(Self::from_file(file))
    }

    /// Create an archiver writing into an already opened file.
    pub fn from_file(file: File) -> Self {
        let w = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Self {
            writer: Some(w)
        }
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(
        &mut self, record: T
    ) -> Result<(), ArchiveError> {
        match self.writer {
            Some(ref mut w) => {
                w.serialize(record).map_err(ArchiveError::CsvError)?;
                w.flush().map_err(ArchiveError::FileError)?;
                Ok(())
            },
            None => Err(ArchiveError::NotInitialised)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        cycle: u64,
        area: Option<f64>,
    }

    #[test]
    fn test_uninitialised() {
        let mut arch = Archiver::default();
        match arch.serialise(Row { cycle: 0, area: None }) {
            Err(ArchiveError::NotInitialised) => (),
            r => panic!("Expected NotInitialised, got {:?}", r)
        }
    }

    #[test]
    fn test_write_rows() {
        let path = std::env::temp_dir()
            .join(format!("util_archive_test_{}.csv", std::process::id()));
        let file = File::create(&path).unwrap();

        let mut arch = Archiver::from_file(file);
        arch.serialise(Row { cycle: 0, area: None }).unwrap();
        arch.serialise(Row { cycle: 1, area: Some(400.0) }).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(contents, "cycle,area\n0,\n1,400.0\n");
    }
}
