//! Dataset trees and schema files on disk

use bpi_ingest::models::MetadataStructure;
use std::fs;
use std::path::{Path, PathBuf};

/// Root element every generated metadata document uses, e.g. `DATASET_SET`
pub fn root_element(structure: MetadataStructure) -> String {
    format!("{}_SET", structure.as_str().to_uppercase())
}

/// One minimal schema per metadata structure
pub fn write_schemas(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    for structure in MetadataStructure::ALL {
        fs::write(
            dir.join(structure.schema_file_name()),
            format!(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:element name="{}"/></xs:schema>"#,
                root_element(structure)
            ),
        )
        .unwrap();
    }
}

pub fn write_file(path: &Path, content: impl AsRef<[u8]>) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// `METADATA` folder with `dataset.xml` plus the other required documents
fn write_metadata(dataset_dir: &Path, dataset_body: &str) {
    let metadata = dataset_dir.join("METADATA");
    write_file(
        &metadata.join("dataset.xml"),
        format!("<DATASET_SET>{}</DATASET_SET>", dataset_body),
    );
    for structure in MetadataStructure::ALL {
        if structure == MetadataStructure::Dataset {
            continue;
        }
        let root = root_element(structure);
        write_file(
            &metadata.join(structure.document_file_name()),
            format!("<{0}></{0}>", root),
        );
    }
}

/// Dataset carrying images, referenced by complementing datasets
pub fn write_parent_dataset(bucket: &Path, dir_name: &str, alias: &str, images: &[&str]) -> PathBuf {
    let dataset_dir = bucket.join(dir_name);
    let refs: String = images
        .iter()
        .map(|image| format!(r#"<IMAGE_REF alias="{}"/>"#, image))
        .collect();
    write_metadata(
        &dataset_dir,
        &format!(r#"<DATASET alias="{}">{}</DATASET>"#, alias, refs),
    );
    for image in images {
        write_file(&dataset_dir.join("IMAGES").join(image), format!("pixels of {}", image));
    }
    dataset_dir
}

/// Dataset complementing `parent` with one point annotation on `image`
///
/// The point sits at (10, 30) in image pixel coordinates and names the
/// `tumor` term of the `tissue` ontology.
pub fn write_child_dataset(
    bucket: &Path,
    dir_name: &str,
    alias: &str,
    parent: &str,
    image: &str,
) -> PathBuf {
    let dataset_dir = bucket.join(dir_name);
    write_metadata(
        &dataset_dir,
        &format!(
            r#"<DATASET alias="{}"><COMPLEMENTS_DATASET_REF alias="{}"/><ANNOTATION_REF alias="a1"/></DATASET>"#,
            alias, parent
        ),
    );

    let metadata = dataset_dir.join("METADATA");
    write_file(
        &metadata.join("ontology.xml"),
        r#"<ONTOLOGY_SET><ONTOLOGY alias="tissue"><FILE filename="terms.json"/></ONTOLOGY></ONTOLOGY_SET>"#,
    );
    write_file(
        &metadata.join("annotation.xml"),
        format!(
            r#"<ANNOTATION_SET>
                 <ANNOTATION alias="a1">
                   <FILE filename="a1.geojson"/>
                   <IMAGE_REF alias="{}"/>
                   <ONTOLOGY_REF alias="tissue"/>
                 </ANNOTATION>
               </ANNOTATION_SET>"#,
            image
        ),
    );
    write_file(
        &dataset_dir.join("terms.json"),
        r##"[{"type": "tumor", "color": "#ff0000"}, {"type": "stroma"}]"##,
    );
    write_file(
        &dataset_dir.join("a1.geojson"),
        r#"{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [10, 30] },
            "properties": { "path_class_name": "tumor" }
        }"#,
    );
    dataset_dir
}
