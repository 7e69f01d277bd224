//! Loaded-library inventory built from region enumeration.

use serde::{Deserialize, Serialize};

use portsl_core::{DynamicLinker, LibraryEnumerator, LibraryRegion, SharedLibraries, SlResult};

/// All regions reported for one library path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySummary {
    /// Display form of the path; invalid UTF-8 is replaced.
    pub path: String,
    /// Path bytes as the OS reported them.
    #[serde(skip)]
    pub raw_path: Vec<u8>,
    pub regions: usize,
    pub low: usize,
    pub high: usize,
    /// Sum of region sizes. Gaps between regions are not counted.
    pub mapped_bytes: usize,
}

/// Libraries in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryInventory {
    pub libraries: Vec<LibrarySummary>,
    pub total_regions: usize,
}

impl LibraryInventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one region into the inventory.
    pub fn add(&mut self, region: &LibraryRegion<'_>) {
        self.total_regions += 1;
        match self
            .libraries
            .iter_mut()
            .find(|lib| lib.raw_path == region.path)
        {
            Some(lib) => {
                lib.regions += 1;
                lib.low = lib.low.min(region.low);
                lib.high = lib.high.max(region.high);
                lib.mapped_bytes += region.len();
            }
            None => self.libraries.push(LibrarySummary {
                path: region.path_lossy().into_owned(),
                raw_path: region.path.to_vec(),
                regions: 1,
                low: region.low,
                high: region.high,
                mapped_bytes: region.len(),
            }),
        }
    }

    /// Library whose span covers `address`.
    #[must_use]
    pub fn containing(&self, address: usize) -> Option<&LibrarySummary> {
        self.libraries
            .iter()
            .find(|lib| lib.low <= address && address < lib.high)
    }
}

/// Enumerate every loaded library through `service`.
///
/// `limit` stops the walk after that many regions.
pub fn collect<L, E>(service: &SharedLibraries<L, E>, limit: Option<usize>) -> SlResult<LibraryInventory>
where
    L: DynamicLinker,
    E: LibraryEnumerator,
{
    let mut inventory = LibraryInventory::new();
    service.enumerate_libraries(Some(&mut |region: &LibraryRegion<'_>| {
        inventory.add(region);
        usize::from(limit.is_some_and(|max| inventory.total_regions >= max))
    }))?;
    Ok(inventory)
}
