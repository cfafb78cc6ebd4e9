//! Backdrop negotiation: the single image, document or screen share behind
//! the drawing layer, and the canvas extent both peers lay out against.

use kurbo::Size;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire tag for a backdrop variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackdropKind {
    #[default]
    None,
    Image,
    Document,
    ScreenShare,
}

/// The active backdrop. Exactly one variant is active at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Backdrop {
    #[default]
    None,
    Image {
        url: String,
        natural_size: Option<Size>,
    },
    Document {
        url: String,
        page_count: Option<u32>,
        page_size: Option<Size>,
    },
    ScreenShare {
        live_size: Option<Size>,
    },
}

impl Backdrop {
    pub fn image(url: impl Into<String>) -> Self {
        Backdrop::Image {
            url: url.into(),
            natural_size: None,
        }
    }

    pub fn document(url: impl Into<String>) -> Self {
        Backdrop::Document {
            url: url.into(),
            page_count: None,
            page_size: None,
        }
    }

    pub fn screen_share() -> Self {
        Backdrop::ScreenShare { live_size: None }
    }

    pub fn kind(&self) -> BackdropKind {
        match self {
            Backdrop::None => BackdropKind::None,
            Backdrop::Image { .. } => BackdropKind::Image,
            Backdrop::Document { .. } => BackdropKind::Document,
            Backdrop::ScreenShare { .. } => BackdropKind::ScreenShare,
        }
    }

    /// Storage URL for image and document backdrops.
    pub fn url(&self) -> Option<&str> {
        match self {
            Backdrop::Image { url, .. } | Backdrop::Document { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Rebuild a backdrop from its wire form.
    pub fn from_wire(kind: BackdropKind, url: Option<String>) -> Result<Self, BackdropError> {
        match kind {
            BackdropKind::None => Ok(Backdrop::None),
            BackdropKind::ScreenShare => Ok(Backdrop::screen_share()),
            BackdropKind::Image => url.map(Backdrop::image).ok_or(BackdropError::MissingUrl(kind)),
            BackdropKind::Document => url.map(Backdrop::document).ok_or(BackdropError::MissingUrl(kind)),
        }
    }
}

/// Measured size of one document page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub page: u32,
    pub width: f64,
    pub height: f64,
}

/// Measured extents of the active backdrop, shared so both peers compute the
/// same canvas size.
#[derive(Debug, Clone, PartialEq)]
pub struct BackdropLayout {
    pub kind: BackdropKind,
    pub width: f64,
    pub height: f64,
    pub page_dimensions: Vec<PageDimensions>,
}

impl BackdropLayout {
    /// Canvas extent for `page`: that page's size when known, the overall
    /// measured size otherwise.
    pub fn extent(&self, page: u32) -> Size {
        self.page_dimensions
            .iter()
            .find(|d| d.page == page)
            .map(|d| Size::new(d.width, d.height))
            .unwrap_or_else(|| Size::new(self.width, self.height))
    }
}

/// Backdrop negotiation failures. None of them are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum BackdropError {
    #[error("a live screen share is active")]
    ScreenShareActive,
    #[error("{0:?} backdrop without a url")]
    MissingUrl(BackdropKind),
    #[error("no backdrop is active")]
    NothingActive,
}

/// Tracks the active backdrop and its measured layout.
#[derive(Debug, Clone, Default)]
pub struct BackdropNegotiator {
    active: Backdrop,
    layout: Option<BackdropLayout>,
}

impl BackdropNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &Backdrop {
        &self.active
    }

    pub fn kind(&self) -> BackdropKind {
        self.active.kind()
    }

    pub fn layout(&self) -> Option<&BackdropLayout> {
        self.layout.as_ref()
    }

    /// Switch to `backdrop`, discarding any measured layout.
    ///
    /// A live screen share cannot be displaced by an image or a document; it
    /// has to be stopped first. Screen share itself always wins.
    pub fn activate(&mut self, backdrop: Backdrop) -> Result<(), BackdropError> {
        let incoming = backdrop.kind();
        if self.kind() == BackdropKind::ScreenShare
            && matches!(incoming, BackdropKind::Image | BackdropKind::Document)
        {
            return Err(BackdropError::ScreenShareActive);
        }
        log::debug!("backdrop {:?} -> {:?}", self.kind(), incoming);
        self.active = backdrop;
        self.layout = None;
        Ok(())
    }

    /// Record locally measured dimensions and derive the layout to share.
    ///
    /// For documents `pages` carries each page's size; the overall extent is
    /// the widest page by the tallest page.
    pub fn measured(
        &mut self,
        size: Size,
        pages: Vec<PageDimensions>,
    ) -> Result<BackdropLayout, BackdropError> {
        let (width, height) = if pages.is_empty() {
            (size.width, size.height)
        } else {
            pages.iter().fold((0.0_f64, 0.0_f64), |(w, h), p| (w.max(p.width), h.max(p.height)))
        };
        match &mut self.active {
            Backdrop::None => return Err(BackdropError::NothingActive),
            Backdrop::Image { natural_size, .. } => *natural_size = Some(size),
            Backdrop::Document {
                page_count,
                page_size,
                ..
            } => {
                if !pages.is_empty() {
                    *page_count = Some(pages.len() as u32);
                }
                *page_size = Some(pages.first().map(|p| Size::new(p.width, p.height)).unwrap_or(size));
            }
            Backdrop::ScreenShare { live_size } => *live_size = Some(size),
        }
        let layout = BackdropLayout {
            kind: self.kind(),
            width,
            height,
            page_dimensions: pages,
        };
        self.layout = Some(layout.clone());
        Ok(layout)
    }

    /// Adopt a peer's measured layout. Drawing state is never touched.
    pub fn apply_layout(&mut self, layout: BackdropLayout) {
        if layout.kind != self.kind() {
            log::debug!(
                "layout for {:?} received while {:?} is active",
                layout.kind,
                self.kind()
            );
        }
        if let Backdrop::Document { page_count, .. } = &mut self.active {
            if !layout.page_dimensions.is_empty() {
                *page_count = Some(layout.page_dimensions.len() as u32);
            }
        }
        self.layout = Some(layout);
    }
}
