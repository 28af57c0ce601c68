//! Traits shared by all format modules.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Cursor, Write},
    path::Path,
};

use crate::{
    error::Error,
    formats::{ExportedFile, FileProcessorContext},
    types::Resource,
};

/// Reads and writes the native model of one file format.
///
/// # Example
///
/// ```rust,no_run
/// use locflow::traits::Parser;
/// let format = locflow::formats::strings::Format::read_from("en.lproj/Localizable.strings")?;
/// format.write_to("Localizable_copy.strings")?;
/// Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser {
    /// Parse from any reader.
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error>
    where
        Self: Sized;

    /// Parse from file path.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let file = File::open(path).map_err(Error::Io)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Write to any writer (file, memory, etc.).
    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error>;

    /// Write to file path.
    fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        self.to_writer(writer)
    }

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(s))
    }

    /// Parse from bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Serialize into a byte vector.
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.to_writer(&mut out)?;
        Ok(out)
    }
}

/// Lifts one uploaded file into canonical entries.
///
/// Implementations report structural failures (the file cannot be read at
/// all) as `Err`; problems with single rows go to
/// [`FileProcessorContext::add_issue`].
pub trait FileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error>;
}

/// Writes the entries of one language into native files.
pub trait FileExporter {
    /// Returns files with paths relative to the namespace directory.
    ///
    /// `base` holds the base-language entries for formats that pair source
    /// and target text.
    fn export_resource(
        &self,
        resource: &Resource,
        base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error>;

    /// Whether [`FileExporter::export_resource`] uses the `base` resource.
    fn needs_base_language(&self) -> bool {
        false
    }
}
