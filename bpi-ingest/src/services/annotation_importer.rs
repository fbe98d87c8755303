//! Annotation import for a complementing dataset
//!
//! GeoJSON sidecars use image pixel coordinates (origin top-left); the catalog
//! expects origin bottom-left. Every geometry is flipped with
//! `y' = image_height - y` and sent as WKT. A feature's `path_class_name`
//! property links the annotation to the ontology term of that name.

use super::catalog_client::{CatalogError, CatalogGateway};
use super::descriptor::{AnnotationDescriptor, AnnotationEntry, DatasetDescriptor};
use crate::models::{ImageInstance, ImportResult, ImportSummary, Ontology, Term};
use geo::MapCoords;
use geo_types::{Coord, Geometry};
use geojson::{Feature, GeoJson};
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};
use wkt::ToWkt;

/// Feature property naming the ontology term of an annotation
pub const TERM_PROPERTY: &str = "path_class_name";

#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GeoJSON: {0}")]
    Format(#[from] geojson::Error),

    #[error("Feature has no geometry")]
    MissingGeometry,
}

/// One geometry in catalog coordinates with its feature properties
#[derive(Debug, Clone, PartialEq)]
pub struct WktAnnotation {
    pub wkt: String,
    pub properties: Map<String, Value>,
}

impl WktAnnotation {
    pub fn term_name(&self) -> Option<&str> {
        self.properties.get(TERM_PROPERTY).and_then(Value::as_str)
    }
}

/// Mirror a geometry vertically inside an image of the given height
pub fn flip_y(geometry: &Geometry<f64>, image_height: f64) -> Geometry<f64> {
    geometry.map_coords(|c| Coord {
        x: c.x,
        y: image_height - c.y,
    })
}

fn to_catalog_wkt(
    geometry: geojson::Geometry,
    image_height: f64,
) -> Result<String, GeoJsonError> {
    let geometry = Geometry::<f64>::try_from(geometry)?;
    Ok(flip_y(&geometry, image_height).wkt_string())
}

fn feature_to_wkt(feature: Feature, image_height: f64) -> Result<WktAnnotation, GeoJsonError> {
    let geometry = feature.geometry.ok_or(GeoJsonError::MissingGeometry)?;
    Ok(WktAnnotation {
        wkt: to_catalog_wkt(geometry, image_height)?,
        properties: feature.properties.unwrap_or_default(),
    })
}

/// Convert a GeoJSON document (FeatureCollection, Feature or bare geometry)
pub fn geojson_to_wkt(document: GeoJson, image_height: f64) -> Result<Vec<WktAnnotation>, GeoJsonError> {
    match document {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .map(|f| feature_to_wkt(f, image_height))
            .collect(),
        GeoJson::Feature(feature) => Ok(vec![feature_to_wkt(feature, image_height)?]),
        GeoJson::Geometry(geometry) => Ok(vec![WktAnnotation {
            wkt: to_catalog_wkt(geometry, image_height)?,
            properties: Map::new(),
        }]),
    }
}

/// Read and convert a GeoJSON file
pub fn load_annotations(path: &Path, image_height: f64) -> Result<Vec<WktAnnotation>, GeoJsonError> {
    let content = std::fs::read_to_string(path)?;
    geojson_to_wkt(GeoJson::from_str(&content)?, image_height)
}

/// Imports the `ANNOTATION_REF`s of one dataset onto already imported images
pub struct AnnotationImporter<'a> {
    gateway: &'a dyn CatalogGateway,
    dataset_dir: &'a Path,
    images: &'a [ImageInstance],
    ontologies: &'a [Ontology],
}

impl<'a> AnnotationImporter<'a> {
    pub fn new(
        gateway: &'a dyn CatalogGateway,
        dataset_dir: &'a Path,
        images: &'a [ImageInstance],
        ontologies: &'a [Ontology],
    ) -> Self {
        Self {
            gateway,
            dataset_dir,
            images,
            ontologies,
        }
    }

    /// One result per `ANNOTATION_REF`; only a rejected session is an error
    pub async fn run(&self) -> Result<ImportSummary, CatalogError> {
        info!("[START] Import annotations...");
        let mut summary = ImportSummary::new();

        let refs = match DatasetDescriptor::load(self.dataset_dir) {
            Ok(descriptor) => descriptor.annotation_refs,
            Err(e) => {
                warn!("Cannot read annotation refs of {}: {}", self.dataset_dir.display(), e);
                summary.push(ImportResult::failed(self.dataset_name(), e.to_string()));
                return Ok(summary);
            }
        };

        let descriptor = match AnnotationDescriptor::load(self.dataset_dir) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Cannot read annotations of {}: {}", self.dataset_dir.display(), e);
                for alias in refs {
                    summary.push(ImportResult::failed(alias, e.to_string()));
                }
                return Ok(summary);
            }
        };

        for alias in &refs {
            let result = match descriptor.entry(alias) {
                Some(entry) => self.import_annotation(entry).await?,
                None => ImportResult::failed(alias, format!("Annotation {} is not described", alias)),
            };
            summary.push(result);
        }

        info!("[END] Import annotations...");
        Ok(summary)
    }

    fn dataset_name(&self) -> String {
        self.dataset_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    async fn import_annotation(&self, entry: &AnnotationEntry) -> Result<ImportResult, CatalogError> {
        let alias = entry.alias.as_str();

        let image_name = entry.image_alias.as_deref().unwrap_or_default();
        let Some(image) = self.images.iter().find(|i| i.instance_filename == image_name) else {
            debug!("Image {} does not exist!", image_name);
            return Ok(ImportResult::failed(alias, format!("Image {} does not exist", image_name)));
        };

        let ontology_name = entry.ontology_alias.as_deref().unwrap_or_default();
        let Some(ontology) = self.ontologies.iter().find(|o| o.name == ontology_name) else {
            debug!("Ontology {} does not exist!", ontology_name);
            return Ok(ImportResult::failed(
                alias,
                format!("Ontology {} does not exist", ontology_name),
            ));
        };

        let terms = match self.gateway.fetch_terms(ontology.id).await {
            Ok(terms) => terms,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(ImportResult::failed(alias, e.to_string())),
        };

        let Some(file) = entry.file.as_deref() else {
            return Ok(ImportResult::failed(alias, "Annotation has no FILE"));
        };
        let path = self.dataset_dir.join(file);
        let annotations = match load_annotations(&path, image.height) {
            Ok(annotations) => annotations,
            Err(e) => {
                debug!("'{}' is not a valid geometry: {}", path.display(), e);
                return Ok(ImportResult::ok_with_message(
                    alias,
                    format!("No valid geometry in {}", file),
                ));
            }
        };

        for annotation in &annotations {
            let saved = match self.gateway.save_annotation(&annotation.wkt, image.id).await {
                Ok(saved) => saved,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => return Ok(ImportResult::failed(alias, e.to_string())),
            };

            if let Some(term) = find_term(&terms, annotation.term_name()) {
                match self.gateway.link_annotation_term(saved.id, term.id).await {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(annotation = saved.id, term = %term.name, "Term link failed: {}", e),
                }
            }
        }

        debug!(alias, count = annotations.len(), "Annotations saved");
        Ok(ImportResult::ok(alias))
    }
}

fn find_term<'t>(terms: &'t [Term], name: Option<&str>) -> Option<&'t Term> {
    let name = name?;
    terms.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Point, Polygon};
    use serde_json::json;

    fn parse_wkt(text: &str) -> Geometry<f64> {
        wkt::Wkt::<f64>::from_str(text).unwrap().try_into().unwrap()
    }

    fn convert(document: Value, image_height: f64) -> Result<Vec<WktAnnotation>, GeoJsonError> {
        geojson_to_wkt(GeoJson::from_json_value(document)?, image_height)
    }

    #[test]
    fn test_flip_is_involutive() {
        let geometry = Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 25.5), (0.0, 0.0)]),
            vec![],
        ));

        let twice = flip_y(&flip_y(&geometry, 1000.0), 1000.0);
        assert_eq!(twice, geometry);
    }

    #[test]
    fn test_feature_is_flipped() {
        let annotations = convert(
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [10, 30] },
                "properties": { "path_class_name": "tumor" }
            }),
            100.0,
        )
        .unwrap();

        assert_eq!(annotations.len(), 1);
        assert_eq!(parse_wkt(&annotations[0].wkt), Geometry::Point(Point::new(10.0, 70.0)));
        assert_eq!(annotations[0].term_name(), Some("tumor"));
    }

    #[test]
    fn test_feature_collection() {
        let annotations = convert(
            json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] }, "properties": {} },
                    { "type": "Feature", "geometry": { "type": "MultiPoint", "coordinates": [[2, 2]] } }
                ]
            }),
            10.0,
        )
        .unwrap();

        assert_eq!(annotations.len(), 2);
        assert!(matches!(parse_wkt(&annotations[0].wkt), Geometry::LineString(_)));
        assert!(annotations[1].properties.is_empty());
    }

    #[test]
    fn test_polygon_rings_are_flipped() {
        let annotations = convert(
            json!({
                "type": "Polygon",
                "coordinates": [[[0, 0], [4, 0], [4, 2], [0, 0]]]
            }),
            10.0,
        )
        .unwrap();

        let expected = Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 10.0), (4.0, 10.0), (4.0, 8.0), (0.0, 10.0)]),
            vec![],
        ));
        assert_eq!(parse_wkt(&annotations[0].wkt), expected);
    }

    #[test]
    fn test_bare_geometry_is_flipped() {
        let annotations = convert(json!({ "type": "Point", "coordinates": [1, 2] }), 5.0).unwrap();
        assert_eq!(parse_wkt(&annotations[0].wkt), Geometry::Point(Point::new(1.0, 3.0)));
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(convert(json!({ "type": "Circle", "coordinates": [1, 2] }), 5.0).is_err());
        assert!(matches!(
            convert(json!({ "type": "Feature", "geometry": null, "properties": {} }), 5.0),
            Err(GeoJsonError::MissingGeometry)
        ));
    }

    #[test]
    fn test_malformed_file_is_format_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("a1.geojson");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            load_annotations(&path, 10.0),
            Err(GeoJsonError::Format(_))
        ));
        assert!(matches!(
            load_annotations(&temp_dir.path().join("absent.geojson"), 10.0),
            Err(GeoJsonError::Io(_))
        ));
    }
}
