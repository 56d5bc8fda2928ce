use image::RgbaImage;
use pdfium_render::prelude::*;
use slide_regions::{PageSource, RegionError, Result};
use std::path::{Path, PathBuf};

/// Initialize Pdfium, trying the vendored library first, then
/// `PDFIUM_DYNAMIC_LIB_PATH`, then the system library
pub fn init_pdfium() -> std::result::Result<Pdfium, PdfiumError> {
    // When running from cargo, the working directory is the workspace root
    let vendor_path = std::env::current_dir()
        .ok()
        .map(|p| p.join("vendor/pdfium/lib"));
    let env_path = std::env::var_os("PDFIUM_DYNAMIC_LIB_PATH").map(PathBuf::from);

    for dir in vendor_path.into_iter().chain(env_path).filter(|p| p.exists()) {
        if let Ok(binding) =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        {
            return Ok(Pdfium::new(binding));
        }
    }

    Pdfium::bind_to_system_library().map(Pdfium::new)
}

fn render_error(e: PdfiumError) -> RegionError {
    RegionError::Render(e.to_string())
}

/// Pages of a PDF on disk, rendered on demand with pdfium.
///
/// The document is reopened for every render so the value stays `Send` and
/// carries no borrowed pdfium state between pages.
pub struct PdfiumPages {
    path: PathBuf,
    page_count: usize,
}

impl PdfiumPages {
    pub fn open(path: &Path) -> Result<Self> {
        let pdfium = init_pdfium().map_err(render_error)?;
        let document = pdfium.load_pdf_from_file(path, None).map_err(render_error)?;
        let page_count = document.pages().len() as usize;
        if page_count == 0 {
            return Err(RegionError::NoPages);
        }

        log::info!("Opened {} ({} pages)", path.display(), page_count);
        Ok(Self {
            path: path.to_path_buf(),
            page_count,
        })
    }
}

impl PageSource for PdfiumPages {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render(&mut self, page_index: usize, dpi: f32) -> Result<RgbaImage> {
        if page_index >= self.page_count {
            return Err(RegionError::PageOutOfRange {
                index: page_index,
                count: self.page_count,
            });
        }

        let pdfium = init_pdfium().map_err(render_error)?;
        let document = pdfium
            .load_pdf_from_file(&self.path, None)
            .map_err(render_error)?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(render_error)?;

        // PDF user space is 72 units per inch
        let config = PdfRenderConfig::new().scale_page_by_factor(dpi / 72.0);
        let bitmap = page.render_with_config(&config).map_err(render_error)?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
            RegionError::Render(format!(
                "Bitmap for page {} does not match {}x{}",
                page_index + 1,
                width,
                height
            ))
        })
    }
}
