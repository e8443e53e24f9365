use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::core::Raster;
use crate::error::{WraplabError, WraplabResult};

pub fn encode_png(raster: &Raster) -> WraplabResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out)
        .write_image(
            raster.data(),
            raster.width(),
            raster.height(),
            ExtendedColorType::Rgba8,
        )
        .context("encode PNG")?;
    Ok(out.into_inner())
}

/// `{model}-{size}x{size}-{uid}.png` with a short time-derived uid.
pub fn suggested_name(model: Option<&str>, size: u32) -> String {
    let base = model.unwrap_or("wrap");
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    format!("{base}-{size}x{size}-{}.png", base36(millis))
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[derive(Debug)]
pub enum SinkDisposition {
    Saved(PathBuf),
    /// The user declined; stop the chain without trying later sinks.
    Cancelled,
    /// This sink cannot run here; fall through to the next one.
    Unsupported,
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved(PathBuf),
    Cancelled,
}

/// One destination for an exported PNG.
pub trait ExportSink {
    fn describe(&self) -> String;
    fn save(&mut self, name: &str, bytes: &[u8]) -> WraplabResult<SinkDisposition>;
}

/// Saves under a `Wraps` subfolder, falling back to the directory itself.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ExportSink for DirectorySink {
    fn describe(&self) -> String {
        format!("directory '{}'", self.root.display())
    }

    fn save(&mut self, name: &str, bytes: &[u8]) -> WraplabResult<SinkDisposition> {
        if !self.root.is_dir() {
            return Ok(SinkDisposition::Unsupported);
        }
        let subdir = self.root.join("Wraps");
        let dir = match fs::create_dir_all(&subdir) {
            Ok(()) => subdir,
            Err(e) => {
                tracing::debug!(error = %e, "Wraps subfolder unavailable, using root");
                self.root.clone()
            }
        };
        let path = dir.join(name);
        fs::write(&path, bytes)
            .with_context(|| format!("write '{}'", path.display()))?;
        Ok(SinkDisposition::Saved(path))
    }
}

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExportSink for FileSink {
    fn describe(&self) -> String {
        format!("file '{}'", self.path.display())
    }

    fn save(&mut self, _name: &str, bytes: &[u8]) -> WraplabResult<SinkDisposition> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create '{}'", parent.display()))?;
            }
        }
        fs::write(&self.path, bytes)
            .with_context(|| format!("write '{}'", self.path.display()))?;
        Ok(SinkDisposition::Saved(self.path.clone()))
    }
}

/// Last-resort sink that drops the file into the working directory.
pub struct DownloadSink {
    dir: PathBuf,
}

impl DownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for DownloadSink {
    fn default() -> Self {
        Self::new(Path::new("."))
    }
}

impl ExportSink for DownloadSink {
    fn describe(&self) -> String {
        format!("download to '{}'", self.dir.display())
    }

    fn save(&mut self, name: &str, bytes: &[u8]) -> WraplabResult<SinkDisposition> {
        let path = self.dir.join(name);
        fs::write(&path, bytes)
            .with_context(|| format!("write '{}'", path.display()))?;
        Ok(SinkDisposition::Saved(path))
    }
}

/// Run the sink chain in order. Unsupported sinks fall through; a cancelled
/// sink stops the chain without error; an exhausted chain is an error.
pub fn export_with_fallback(
    sinks: &mut [Box<dyn ExportSink>],
    name: &str,
    bytes: &[u8],
) -> WraplabResult<SaveOutcome> {
    for sink in sinks.iter_mut() {
        match sink.save(name, bytes)? {
            SinkDisposition::Saved(path) => {
                tracing::info!(sink = %sink.describe(), path = %path.display(), "export saved");
                return Ok(SaveOutcome::Saved(path));
            }
            SinkDisposition::Cancelled => {
                tracing::debug!(sink = %sink.describe(), "export cancelled");
                return Ok(SaveOutcome::Cancelled);
            }
            SinkDisposition::Unsupported => {
                tracing::debug!(sink = %sink.describe(), "sink unsupported, trying next");
            }
        }
    }
    Err(WraplabError::export("no export destination available"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::rc::Rc;

    struct ScriptedSink {
        disposition: Option<SinkDisposition>,
        calls: Rc<Cell<u32>>,
    }

    impl ScriptedSink {
        fn new(disposition: SinkDisposition) -> Self {
            Self {
                disposition: Some(disposition),
                calls: Rc::new(Cell::new(0)),
            }
        }

        fn counted(disposition: SinkDisposition, calls: Rc<Cell<u32>>) -> Self {
            Self {
                disposition: Some(disposition),
                calls,
            }
        }
    }

    impl ExportSink for ScriptedSink {
        fn describe(&self) -> String {
            "scripted".to_owned()
        }

        fn save(&mut self, _name: &str, _bytes: &[u8]) -> WraplabResult<SinkDisposition> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.disposition.take().unwrap())
        }
    }

    #[test]
    fn png_bytes_carry_the_signature() {
        let raster = Raster::new(3, 2).unwrap();
        let bytes = encode_png(&raster).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn suggested_name_shape() {
        let name = suggested_name(Some("van"), 1024);
        assert!(name.starts_with("van-1024x1024-"));
        assert!(name.ends_with(".png"));
        let generic = suggested_name(None, 512);
        assert!(generic.starts_with("wrap-512x512-"));
    }

    #[test]
    fn base36_round_values() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn unsupported_sinks_fall_through() {
        let mut sinks: Vec<Box<dyn ExportSink>> = vec![
            Box::new(ScriptedSink::new(SinkDisposition::Unsupported)),
            Box::new(ScriptedSink::new(SinkDisposition::Saved(PathBuf::from(
                "out.png",
            )))),
        ];
        match export_with_fallback(&mut sinks, "out.png", b"x").unwrap() {
            SaveOutcome::Saved(p) => assert_eq!(p, PathBuf::from("out.png")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn cancellation_stops_the_chain() {
        let later_calls = Rc::new(Cell::new(0));
        let mut sinks: Vec<Box<dyn ExportSink>> = vec![
            Box::new(ScriptedSink::new(SinkDisposition::Cancelled)),
            Box::new(ScriptedSink::counted(
                SinkDisposition::Saved(PathBuf::from("out.png")),
                Rc::clone(&later_calls),
            )),
        ];
        match export_with_fallback(&mut sinks, "out.png", b"x").unwrap() {
            SaveOutcome::Cancelled => {}
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(later_calls.get(), 0);
    }

    #[test]
    fn exhausted_chain_is_an_error() {
        let mut sinks: Vec<Box<dyn ExportSink>> =
            vec![Box::new(ScriptedSink::new(SinkDisposition::Unsupported))];
        assert!(export_with_fallback(&mut sinks, "out.png", b"x").is_err());
    }

    #[test]
    fn directory_sink_prefers_wraps_subfolder() {
        let root = std::env::temp_dir().join(format!("wraplab-test-{}", std::process::id()));
        fs::create_dir_all(&root).unwrap();
        let mut sink = DirectorySink::new(&root);
        let disp = sink.save("a.png", b"png").unwrap();
        match disp {
            SinkDisposition::Saved(path) => {
                assert_eq!(path, root.join("Wraps").join("a.png"));
                assert_eq!(fs::read(&path).unwrap(), b"png");
            }
            other => panic!("unexpected disposition {other:?}"),
        }
        fs::remove_dir_all(&root).unwrap();
    }
}
