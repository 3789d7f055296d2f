//! The study region, used to restrict the simulated population to the area covered by the survey.
use crate::input::input_err_msg;
use anyhow::{Context, Result, anyhow, bail, ensure};
use geo::{Geometry, Intersects, MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use log::{debug, warn};
use std::fs;
use std::path::Path;
use wkt::TryFromWkt;

/// The coordinate reference system of the simulation (ETRS89 / UTM zone 32N)
pub const DEFAULT_CRS: &str = "EPSG:25832";

/// Fragments of a WKT projection definition that identify [`DEFAULT_CRS`]
const DEFAULT_CRS_PRJ_NAMES: [&str; 2] = ["UTM_Zone_32N", "UTM zone 32N"];

/// A polygonal region in the simulation's coordinate reference system
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    geometry: MultiPolygon<f64>,
}

impl Region {
    /// Create a new region from a multipolygon
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self { geometry }
    }

    /// Read a region from a vector geometry file.
    ///
    /// Shapefiles (`.shp`), GeoJSON (`.geojson`, `.json`) and WKT (`.wkt`) files are supported.
    /// All polygons in the file are merged into one region. Geometries are not reprojected, so
    /// `crs` must be the simulation's CRS.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the geometry file
    /// * `crs` - The coordinate reference system the file is declared to be in
    pub fn from_path(file_path: &Path, crs: &str) -> Result<Self> {
        ensure!(
            crs.eq_ignore_ascii_case(DEFAULT_CRS),
            "Region is in {crs}, but reprojection is not supported. \
            Convert the region to {DEFAULT_CRS} first."
        );

        let extension = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let polygons = match extension.as_str() {
            "shp" => read_shapefile(file_path),
            "geojson" | "json" => read_geojson(file_path),
            "wkt" => read_wkt(file_path),
            _ => bail!("Unsupported region file format: {}", file_path.display()),
        }
        .with_context(|| input_err_msg(file_path))?;

        ensure!(
            !polygons.is_empty(),
            "{} does not contain any polygons",
            file_path.display()
        );
        debug!(
            "Read {} polygon(s) from {}",
            polygons.len(),
            file_path.display()
        );

        Ok(Self::new(MultiPolygon::new(polygons)))
    }

    /// The region's geometry
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Whether the point (`x`, `y`) intersects the region, including its boundary
    pub fn intersects(&self, x: f64, y: f64) -> bool {
        self.geometry.intersects(&Point::new(x, y))
    }
}

/// Collect the polygons from a geometry, failing on non-polygonal geometries
fn collect_polygons(geometry: Geometry<f64>, polygons: &mut Vec<Polygon<f64>>) -> Result<()> {
    match geometry {
        Geometry::Polygon(polygon) => polygons.push(polygon),
        Geometry::MultiPolygon(multi) => polygons.extend(multi),
        Geometry::Rect(rect) => polygons.push(rect.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for geometry in collection {
                collect_polygons(geometry, polygons)?;
            }
        }
        other => bail!("Unexpected geometry type {other:?}, must be polygonal"),
    }

    Ok(())
}

/// Read all polygons from a shapefile
fn read_shapefile(file_path: &Path) -> Result<Vec<Polygon<f64>>> {
    check_prj_file(&file_path.with_extension("prj"));

    let shapes = shapefile::read_shapes(file_path).map_err(|err| anyhow!("{err}"))?;
    let mut polygons = Vec::new();
    for (idx, shape) in shapes.into_iter().enumerate() {
        let multi: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|err| anyhow!("Failed to convert polygon at row {idx}: {err}"))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|err| anyhow!("Failed to convert polygon at row {idx}: {err}"))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|err| anyhow!("Failed to convert polygon at row {idx}: {err}"))?,
            other => bail!(
                "Unexpected shape type {} found at row {idx}, must be polygonal",
                other.shapetype()
            ),
        };
        polygons.extend(multi);
    }

    Ok(polygons)
}

/// Warn if a shapefile's projection file names a different projection.
///
/// The file is optional, so a missing one is not a problem.
fn check_prj_file(prj_path: &Path) {
    let Ok(prj) = fs::read_to_string(prj_path) else {
        return;
    };

    if !DEFAULT_CRS_PRJ_NAMES.iter().any(|name| prj.contains(name)) {
        warn!(
            "Projection in {} does not look like {DEFAULT_CRS}; coordinates are used as they are",
            prj_path.display()
        );
    }
}

/// Read all polygons from a GeoJSON file
fn read_geojson(file_path: &Path) -> Result<Vec<Polygon<f64>>> {
    let contents = fs::read_to_string(file_path)?;
    let geojson: GeoJson = contents.parse().map_err(|err| anyhow!("{err}"))?;
    let collection =
        geo::GeometryCollection::<f64>::try_from(&geojson).map_err(|err| anyhow!("{err}"))?;

    let mut polygons = Vec::new();
    collect_polygons(Geometry::GeometryCollection(collection), &mut polygons)?;
    Ok(polygons)
}

/// Read all polygons from a WKT file containing a single geometry
fn read_wkt(file_path: &Path) -> Result<Vec<Polygon<f64>>> {
    let contents = fs::read_to_string(file_path)?;
    let geometry =
        Geometry::<f64>::try_from_wkt_str(contents.trim()).map_err(|err| anyhow!("{err}"))?;

    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons)?;
    Ok(polygons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, square_region};
    use rstest::rstest;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const SQUARE_WKT: &str = "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))";

    const SQUARE_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "square"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
            }
        }]
    }"#;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let file_path = dir.join(name);
        fs::write(&file_path, contents).unwrap();
        file_path
    }

    #[rstest]
    #[case("region.wkt", SQUARE_WKT)]
    #[case("region.geojson", SQUARE_GEOJSON)]
    #[case("region.json", SQUARE_GEOJSON)]
    fn test_region_from_path(#[case] name: &str, #[case] contents: &str, square_region: Region) {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), name, contents);
        let region = Region::from_path(&file_path, DEFAULT_CRS).unwrap();
        assert_eq!(region.geometry().0.len(), 1);
        assert_eq!(region, square_region);
    }

    #[test]
    fn test_region_from_path_other_crs() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "region.wkt", SQUARE_WKT);
        assert_error!(
            Region::from_path(&file_path, "EPSG:4326"),
            "Region is in EPSG:4326, but reprojection is not supported. \
            Convert the region to EPSG:25832 first."
        );
    }

    #[test]
    fn test_region_from_path_bad_format() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "region.gpkg", "");
        assert!(Region::from_path(&file_path, DEFAULT_CRS).is_err());
    }

    #[test]
    fn test_region_from_path_not_polygonal() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "region.wkt", "POINT(1 1)");
        assert!(Region::from_path(&file_path, DEFAULT_CRS).is_err());
    }

    #[rstest]
    #[case(5.0, 5.0, true)] // inside
    #[case(10.0, 5.0, true)] // on the boundary
    #[case(15.0, 5.0, false)] // outside
    #[case(-0.1, -0.1, false)] // outside, near corner
    fn test_region_intersects(
        square_region: Region,
        #[case] x: f64,
        #[case] y: f64,
        #[case] expected: bool,
    ) {
        assert_eq!(square_region.intersects(x, y), expected);
    }
}
