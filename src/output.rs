use anyhow::anyhow;
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub trait Output: Debug {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write>;

    /// Where the output for the given key ends up, as reported back to the caller.
    fn location_for_key(&self, location_key: &str) -> anyhow::Result<String>;

    /// Remove whatever has been written for the given key, if anything.
    fn discard(&self, _location_key: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }

    fn path_for_key(&self, location_key: &str) -> anyhow::Result<PathBuf> {
        Ok(self
            .directory_path
            .join(formatx!(&self.file_template, location_key).map_err(|e| {
                anyhow!("could not apply file template '{}': {e:?}", self.file_template)
            })?))
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        std::fs::create_dir_all(&self.directory_path)?;
        Ok(BufWriter::new(File::create(
            self.path_for_key(location_key)?,
        )?))
    }

    fn location_for_key(&self, location_key: &str) -> anyhow::Result<String> {
        Ok(self.path_for_key(location_key)?.display().to_string())
    }

    fn discard(&self, location_key: &str) -> anyhow::Result<()> {
        let path = self.path_for_key(location_key)?;
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key)
    }

    fn location_for_key(&self, location_key: &str) -> anyhow::Result<String> {
        <FileOutput as Output>::location_for_key(self, location_key)
    }

    fn discard(&self, location_key: &str) -> anyhow::Result<()> {
        <FileOutput as Output>::discard(self, location_key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn location_for_key(&self, location_key: &str) -> anyhow::Result<String> {
        Ok(location_key.to_string())
    }

    fn is_noop(&self) -> bool {
        true
    }
}
