//! Coordinate reference system identifiers
//!
//! landshift never transforms between CRSs; it only carries the identifier
//! through derived grids and refuses to combine grids whose CRSs differ.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CRS {
    epsg: Option<u32>,
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// Parse `"EPSG:<code>"`, falling back to treating the text as WKT
    pub fn parse(text: &str) -> Self {
        text.strip_prefix("EPSG:")
            .and_then(|code| code.trim().parse().ok())
            .map(Self::from_epsg)
            .unwrap_or_else(|| Self::from_wkt(text))
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Check if two CRS identifiers refer to the same system
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        // WKT comparison is textual and therefore conservative
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// String identifier for logs and error messages
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt.char_indices().nth(50).map_or(wkt.len(), |(i, _)| i);
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
