//! SVG rasterization.
//!
//! Vector images are rendered at their intrinsic size and written as PNG
//! next to the source (`diagram.svg` → `diagram.png`). The PNG is a
//! temporary file owned by the caller once [`Rasterizer::rasterize`]
//! returns.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use resvg::usvg::{self, fontdb};
use tiny_skia::{Pixmap, Transform};

use crate::error::{Error, Result};
use crate::path::RelativePath;

/// A rendered PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rasterized {
    /// Package path of the PNG.
    pub output: RelativePath,
    /// Filesystem location of the PNG.
    pub path: PathBuf,
    /// Whether the PNG was written by this call. An identical PNG already on
    /// disk is reused instead.
    pub created: bool,
}

/// Package path of the PNG rendered from `svg`.
pub fn output_path(svg: &RelativePath) -> RelativePath {
    svg.replace_suffix(".svg", ".png")
}

/// SVG renderer. System fonts for text inside SVGs are loaded on first use
/// and shared by every image rendered through the same instance.
#[derive(Debug, Clone, Default)]
pub struct Rasterizer {
    fontdb: Option<Arc<fontdb::Database>>,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render with the given fonts instead of the system ones.
    pub fn with_fontdb(fontdb: Arc<fontdb::Database>) -> Self {
        Self { fontdb: Some(fontdb) }
    }

    fn fontdb(&mut self) -> Arc<fontdb::Database> {
        self.fontdb
            .get_or_insert_with(|| {
                let mut db = fontdb::Database::new();
                db.load_system_fonts();
                tracing::debug!("loaded {} font faces", db.len());
                Arc::new(db)
            })
            .clone()
    }

    /// Render the SVG at `svg` (below `root`) to PNG.
    ///
    /// A PNG already at the output path is left alone when it holds exactly
    /// the rendered image; any other file there is an
    /// [`Error::DuplicateEntry`].
    pub fn rasterize(&mut self, root: &Path, svg: &RelativePath) -> Result<Rasterized> {
        let source = svg.to_path(root);
        let output = output_path(svg);
        let path = output.to_path(root);

        let data = fs::read(&source).map_err(|e| Error::read(&source, e))?;
        let png = self.render_png(&data, &source)?;

        let created = match fs::read(&path) {
            Ok(existing) if existing == png => {
                tracing::debug!("{output} is up to date with {svg}");
                false
            }
            Ok(_) => {
                return Err(Error::DuplicateEntry(format!(
                    "{output} already exists and would be overwritten by rasterizing {svg}"
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::write(&path, png).map_err(|e| Error::read(&path, e))?;
                tracing::debug!("rasterized {svg} -> {output}");
                true
            }
            Err(e) => return Err(Error::read(&path, e)),
        };
        Ok(Rasterized { output, path, created })
    }

    /// Render SVG bytes read from `source` to PNG bytes. Relative image
    /// references inside the SVG resolve against the directory of `source`.
    pub fn render_png(&mut self, data: &[u8], source: &Path) -> Result<Vec<u8>> {
        let failed = |message: String| Error::Rasterize {
            path: source.to_path_buf(),
            message,
        };
        let opts = usvg::Options {
            resources_dir: source.parent().map(Path::to_path_buf),
            fontdb: self.fontdb(),
            ..Default::default()
        };

        let tree = usvg::Tree::from_data(data, &opts).map_err(|e| failed(format!("invalid SVG: {e}")))?;
        let size = tree.size().to_int_size();
        let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or_else(|| {
            failed(format!("cannot allocate {}x{} canvas", size.width(), size.height()))
        })?;

        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

        pixmap
            .encode_png()
            .map_err(|e| failed(format!("PNG encoding failed: {e}")))
    }
}
