//! Paginated rendering through headless Chromium.

use std::path::Path;
use std::thread;
use std::time::Duration;

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;

use crate::error::{Error, Result};
use crate::util::file_uri;

/// Page geometry shared by the cover synthesizer and the renderer.
///
/// Defaults to a 5.5in x 8.5in trim at 150 DPI with print margins.
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    pub width_in: f64,
    pub height_in: f64,
    pub margin_top_in: f64,
    pub margin_bottom_in: f64,
    pub margin_left_in: f64,
    pub margin_right_in: f64,
    pub dpi: u32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            width_in: 5.5,
            height_in: 8.5,
            margin_top_in: 0.75,
            margin_bottom_in: 0.75,
            margin_left_in: 0.65,
            margin_right_in: 0.65,
            dpi: 150,
        }
    }
}

impl PageSpec {
    /// Full-bleed pixel width at the spec's DPI.
    pub fn pixel_width(&self) -> u32 {
        (self.width_in * self.dpi as f64).round() as u32
    }

    pub fn pixel_height(&self) -> u32 {
        (self.height_in * self.dpi as f64).round() as u32
    }

    /// Page width in PDF points (72/in).
    pub fn point_width(&self) -> f32 {
        (self.width_in * 72.0) as f32
    }

    pub fn point_height(&self) -> f32 {
        (self.height_in * 72.0) as f32
    }

    /// Browser viewport matching the page at CSS resolution (96/in), so
    /// small-screen `@media` queries stay inactive during print capture.
    pub fn viewport(&self) -> (u32, u32) {
        (
            (self.width_in * 96.0).round() as u32,
            (self.height_in * 96.0).round() as u32,
        )
    }
}

/// Render an HTML file to a paginated PDF.
///
/// Implementations must preserve internal anchor navigation as clickable
/// links and wait for sub-resource loading to quiesce before capturing.
pub trait PageRenderer {
    fn render(&self, html: &Path, page: &PageSpec) -> Result<Vec<u8>>;
}

/// Chromium-backed renderer using the DevTools `Page.printToPDF` command,
/// the same print engine Calibre's Qt WebEngine wraps.
pub struct ChromiumRenderer {
    /// Hard deadline for navigation and capture; expiry is fatal with no
    /// partial-render fallback.
    pub timeout: Duration,
    /// Fixed settle delay after load for font/image materialization.
    pub settle: Duration,
}

impl Default for ChromiumRenderer {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            settle: Duration::from_secs(2),
        }
    }
}

impl PageRenderer for ChromiumRenderer {
    fn render(&self, html: &Path, page: &PageSpec) -> Result<Vec<u8>> {
        let (vw, vh) = page.viewport();
        let launch = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((vw, vh)))
            .build()
            .map_err(|e| Error::Render(e.to_string()))?;

        let browser = Browser::new(launch).map_err(|e| Error::Render(e.to_string()))?;
        let tab = browser.new_tab().map_err(|e| Error::Render(e.to_string()))?;
        tab.set_default_timeout(self.timeout);

        let url = file_uri(html);
        debug!("loading {url}");
        tab.navigate_to(&url)
            .map_err(|e| Error::Render(e.to_string()))?
            .wait_until_navigated()
            .map_err(|_| Error::RenderTimeout(self.timeout.as_secs()))?;

        // Fonts and images keep materializing after the load event settles
        thread::sleep(self.settle);

        let pdf = tab
            .print_to_pdf(Some(PrintToPdfOptions {
                print_background: Some(true),
                paper_width: Some(page.width_in),
                paper_height: Some(page.height_in),
                margin_top: Some(page.margin_top_in),
                margin_bottom: Some(page.margin_bottom_in),
                margin_left: Some(page.margin_left_in),
                margin_right: Some(page.margin_right_in),
                prefer_css_page_size: Some(false),
                ..Default::default()
            }))
            .map_err(|e| Error::Render(e.to_string()))?;

        Ok(pdf)
    }
}
