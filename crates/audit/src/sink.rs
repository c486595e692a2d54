//! Audit sinks: where drained events are written.

use std::io::Write;
use std::path::PathBuf;

use konsul_domain::model::AuditEvent;

pub enum Sink {
    File {
        path: PathBuf,
        writer: Option<std::io::BufWriter<std::fs::File>>,
    },
    Stdout,
}

impl Sink {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Sink::File {
            path: path.into(),
            writer: None,
        }
    }

    pub fn stdout() -> Self {
        Sink::Stdout
    }

    pub fn write(&mut self, event: &AuditEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        match self {
            Sink::File { path, writer } => {
                if writer.is_none() {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)?;
                    *writer = Some(std::io::BufWriter::new(file));
                }
                let w = writer.as_mut().expect("writer initialized above");
                writeln!(w, "{line}")
            }
            Sink::Stdout => {
                println!("{line}");
                Ok(())
            }
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Sink::File { writer: Some(w), .. } = self {
            w.flush()?;
        }
        Ok(())
    }
}
