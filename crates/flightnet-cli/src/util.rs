use std::{
    fs::File,
    io::{self, BufReader, BufWriter, StdoutLock, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use flightnet_evolution::ControllerConfig;

/// Destination of a JSON document: a file when a path is given, stdout otherwise.
#[derive(Debug)]
pub enum Output {
    Stdout(StdoutLock<'static>),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = match output_path {
            Some(path) => {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                Output::File {
                    writer: BufWriter::new(file),
                    path,
                }
            }
            None => Output::Stdout(io::stdout().lock()),
        };
        output.write_json(value)
    }

    fn display_path(&self) -> String {
        match self {
            Output::Stdout(_) => "stdout".to_owned(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Output::Stdout(writer) => writer,
            Output::File { writer, .. } => writer,
        }
    }

    fn write_json<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let display_path = self.display_path();
        let writer = self.writer();
        serde_json::to_writer_pretty(&mut *writer, value)
            .with_context(|| format!("Failed to write JSON to {display_path}"))?;
        writeln!(writer)
            .and_then(|()| writer.flush())
            .with_context(|| format!("Failed to finish writing {display_path}"))?;
        Ok(())
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} JSON file: {}", path.display()))
}

/// Read controller settings from a JSON file
///
/// Settings missing from the file keep their defaults.
///
/// # Errors
///
/// Returns error if file cannot be opened or parsed
pub fn read_controller_config_file<P>(path: P) -> anyhow::Result<ControllerConfig>
where
    P: AsRef<Path>,
{
    read_json_file("controller config", path)
}
