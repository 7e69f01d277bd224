//! Loaded-library enumeration seam.

use std::borrow::Cow;

use crate::error::{ErrorSlot, SlError, SlErrorKind};
use crate::messages::Message;

/// One contiguous mapped region of a loaded file.
///
/// `path` holds the OS bytes unchanged and is only valid for the duration of
/// the visitor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryRegion<'a> {
    pub path: &'a [u8],
    pub low: usize,
    pub high: usize,
}

impl LibraryRegion<'_> {
    /// `path` for display, with invalid UTF-8 replaced.
    #[must_use]
    pub fn path_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.path)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.high.saturating_sub(self.low)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.high <= self.low
    }
}

/// Platform source of loaded-library regions.
///
/// Implementations report each region to `visitor` in the platform's native
/// order and stop at the first non-zero visitor result, which becomes the
/// return value. A completed walk returns `Ok(0)`. Recoverable problems are
/// written to `errors` without stopping the walk.
pub trait LibraryEnumerator {
    fn enumerate(
        &self,
        errors: &ErrorSlot,
        visitor: &mut dyn FnMut(&LibraryRegion<'_>) -> usize,
    ) -> Result<usize, SlError>;
}

/// Enumerator for platforms with no supported source.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl LibraryEnumerator for Unsupported {
    fn enumerate(
        &self,
        _errors: &ErrorSlot,
        _visitor: &mut dyn FnMut(&LibraryRegion<'_>) -> usize,
    ) -> Result<usize, SlError> {
        Err(SlError::new(
            SlErrorKind::NotSupportedOnThisPlatform,
            Message::EnumerationUnsupported.text(),
        ))
    }
}

/// In-memory enumerator over a fixed region list.
#[derive(Debug, Default, Clone)]
pub struct FixedRegions {
    regions: Vec<(Vec<u8>, usize, usize)>,
}

impl FixedRegions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<Vec<u8>>, low: usize, high: usize) -> Self {
        self.regions.push((path.into(), low, high));
        self
    }
}

impl LibraryEnumerator for FixedRegions {
    fn enumerate(
        &self,
        _errors: &ErrorSlot,
        visitor: &mut dyn FnMut(&LibraryRegion<'_>) -> usize,
    ) -> Result<usize, SlError> {
        for (path, low, high) in &self.regions {
            let result = visitor(&LibraryRegion {
                path,
                low: *low,
                high: *high,
            });
            if result != 0 {
                return Ok(result);
            }
        }
        Ok(0)
    }
}
