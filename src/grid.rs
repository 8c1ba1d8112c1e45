//! Grid cell identifiers and their geography.
//!
//! Identifiers look like `l_12_37`: a tag, the row (latitude index) and the
//! column (longitude index) counted from a region's origin in steps of the
//! region's cell size.

use glam::DVec2;
use thiserror::Error;

use crate::region::Region;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("invalid grid identifier {0:?}")]
    InvalidGridIdentifier(String),
}

/// A parsed grid cell. Positions are `DVec2 { x: lon, y: lat }`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub tag: String,
    pub row: i64,
    pub col: i64,
}

impl GridCell {
    pub fn parse(id: &str) -> Result<Self, GridError> {
        let invalid = || GridError::InvalidGridIdentifier(id.to_string());

        let mut tokens = id.split('_');
        let (Some(tag), Some(row), Some(col), None) =
            (tokens.next(), tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(invalid());
        };
        if tag.is_empty() {
            return Err(invalid());
        }

        let row = row.parse::<i64>().map_err(|_| invalid())?;
        let col = col.parse::<i64>().map_err(|_| invalid())?;

        Ok(Self {
            tag: tag.to_string(),
            row,
            col,
        })
    }

    /// Cell containing a point (floor division from the region origin)
    pub fn containing(region: &Region, lon: f64, lat: f64) -> Self {
        let row = ((lat - region.origin_lat) / region.cell_size).floor() as i64;
        let col = ((lon - region.origin_lon) / region.cell_size).floor() as i64;
        Self {
            tag: "l".to_string(),
            row,
            col,
        }
    }

    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.tag, self.row, self.col)
    }

    /// South-west corner
    #[inline]
    fn origin(&self, region: &Region) -> DVec2 {
        DVec2::new(
            region.origin_lon + self.col as f64 * region.cell_size,
            region.origin_lat + self.row as f64 * region.cell_size,
        )
    }

    pub fn center(&self, region: &Region) -> DVec2 {
        self.origin(region) + DVec2::splat(region.cell_size * 0.5)
    }

    /// Corners in SW, NW, NE, SE order
    pub fn bounds(&self, region: &Region) -> [DVec2; 4] {
        let sw = self.origin(region);
        let step = region.cell_size;
        [
            sw,
            DVec2::new(sw.x, sw.y + step),
            DVec2::new(sw.x + step, sw.y + step),
            DVec2::new(sw.x + step, sw.y),
        ]
    }
}

/// Center of the cell named by `id`
pub fn center(id: &str, region: &Region) -> Result<DVec2, GridError> {
    GridCell::parse(id).map(|cell| cell.center(region))
}
