// Radio band classification and per-band association counts

use serde::{Deserialize, Serialize};

/// Radio frequency band, derived heuristically from a channel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "2G")]
    Band2G,
    #[serde(rename = "5G")]
    Band5G,
}

/// Channels 1..=16 are 2.4GHz, everything else counts as 5GHz.
///
/// This is a coarse boundary, not the regulatory channel plan. Devices and dashboards already
/// depend on it, so 0 and channels above 16 (including 6GHz) all land in `Band5G`.
pub fn channel_to_band(channel: u64) -> Band {
    if (1..=16).contains(&channel) {
        Band::Band2G
    } else {
        Band::Band5G
    }
}

/// Client associations seen in one state report, split by band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Associations {
    pub band_2g: u64,
    pub band_5g: u64,
}

impl Associations {
    pub(crate) fn add(&mut self, band: Band, count: u64) {
        match band {
            Band::Band2G => self.band_2g += count,
            Band::Band5G => self.band_5g += count,
        }
    }
}
