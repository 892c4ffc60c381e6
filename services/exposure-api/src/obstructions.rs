//! Building footprints from a GeoJSON file.
//!
//! Each feature must be a `Polygon` or `MultiPolygon` in lon/lat with a
//! numeric `AGL` (height above ground, meters) property. Footprints are
//! projected once at load time; per-session requests only filter by extent.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use exposure_common::BoundingBox;
use geo::{LineString, Polygon};
use geojson::GeoJson;
use grid_scheduler::{Obstruction, ObstructionModel, ObstructionProvider};
use projection::Projection;
use tracing::{info, warn};

/// Height property on every building feature.
pub const HEIGHT_PROPERTY: &str = "AGL";

/// In-memory building set loaded from GeoJSON.
pub struct GeoJsonObstructionProvider {
    buildings: Vec<(BoundingBox, Obstruction)>,
}

impl GeoJsonObstructionProvider {
    /// Read and project every building in `path`.
    pub fn from_path(path: impl AsRef<Path>, projection: &dyn Projection) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading buildings from {}", path.display()))?;
        let provider = Self::parse(&content, projection)?;
        info!(
            path = %path.display(),
            buildings = provider.len(),
            "Loaded building footprints"
        );
        Ok(provider)
    }

    /// Parse a GeoJSON document. Features without a usable footprint or
    /// height are skipped.
    pub fn parse(content: &str, projection: &dyn Projection) -> Result<Self> {
        let geojson: GeoJson = content.parse().context("parsing buildings GeoJSON")?;
        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => anyhow::bail!("buildings file must contain features"),
        };

        let mut buildings = Vec::new();
        let mut skipped = 0usize;
        for feature in features {
            let height = feature
                .property(HEIGHT_PROPERTY)
                .and_then(|v| v.as_f64())
                .filter(|h| h.is_finite() && *h > 0.0);
            let (Some(height), Some(geometry)) = (height, feature.geometry) else {
                skipped += 1;
                continue;
            };
            let geometry: geo::Geometry<f64> = match geometry.try_into() {
                Ok(g) => g,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let polygons = match geometry {
                geo::Geometry::Polygon(p) => vec![p],
                geo::Geometry::MultiPolygon(mp) => mp.0,
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            for polygon in polygons {
                match project_footprint(&polygon, projection) {
                    Some(footprint) => {
                        let obstruction = Obstruction::new(footprint, height);
                        if let Some(bounds) = obstruction.bounds() {
                            buildings.push((bounds, obstruction));
                        }
                    }
                    None => skipped += 1,
                }
            }
        }

        if skipped > 0 {
            warn!(skipped = skipped, "Skipped building features without footprint or height");
        }
        Ok(Self { buildings })
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}

/// Exterior ring only; courtyards do not matter for ground-level rays.
fn project_footprint(polygon: &Polygon<f64>, projection: &dyn Projection) -> Option<Polygon<f64>> {
    let ring: Vec<[f64; 2]> = polygon.exterior().coords().map(|c| [c.x, c.y]).collect();
    let projected = projection.forward_ring(&ring).ok()?;
    if projected.len() < 4 {
        return None;
    }
    let exterior: LineString<f64> = projected.iter().map(|c| (c.x, c.y)).collect::<Vec<_>>().into();
    Some(Polygon::new(exterior, vec![]))
}

#[async_trait]
impl ObstructionProvider for GeoJsonObstructionProvider {
    async fn load(&self, extent: &BoundingBox) -> grid_scheduler::Result<ObstructionModel> {
        let buildings = self
            .buildings
            .iter()
            .filter(|(bounds, _)| bounds.intersects(extent))
            .map(|(_, b)| b.clone())
            .collect();
        Ok(ObstructionModel::new(*extent, buildings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::Planar;

    const BUILDINGS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"AGL": 30.0},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"AGL": 12},
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[100,100],[110,100],[110,110],[100,100]]],
                    [[[200,200],[210,200],[210,210],[200,200]]]
                ]}
            },
            {
                "type": "Feature",
                "properties": {"name": "no height"},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"AGL": 5},
                "geometry": {"type": "Point", "coordinates": [5, 5]}
            }
        ]
    }"#;

    #[test]
    fn test_parses_polygons_and_multipolygons() {
        let provider = GeoJsonObstructionProvider::parse(BUILDINGS, &Planar).unwrap();
        assert_eq!(provider.len(), 3);
    }

    #[test]
    fn test_rejects_bare_geometry() {
        let doc = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(GeoJsonObstructionProvider::parse(doc, &Planar).is_err());
    }

    #[tokio::test]
    async fn test_load_filters_by_extent() {
        let provider = GeoJsonObstructionProvider::parse(BUILDINGS, &Planar).unwrap();
        let model = provider
            .load(&BoundingBox::new(-5.0, -5.0, 105.0, 105.0))
            .await
            .unwrap();
        assert_eq!(model.len(), 2);
        let mut heights: Vec<f64> = model.buildings.iter().map(|b| b.height).collect();
        heights.sort_by(f64::total_cmp);
        assert_eq!(heights, vec![12.0, 30.0]);
    }
}
