//! Merge captured page PDFs into one document, preserving fetch order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;

/// Error type for the merge step.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no input PDFs to merge")]
    NoInputs,

    #[error("failed to read {path}: {source}")]
    Input { path: String, source: lopdf::Error },

    #[error("failed to write merged PDF {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },

    #[error("input PDFs carry no document catalog")]
    MissingCatalog,

    #[error("input PDFs carry no page tree")]
    MissingPageTree,
}

/// Concatenate `inputs` into a single PDF at `output`.
///
/// Page order in the output equals input order, and within each input its
/// own page order. Returns the merged page count.
pub fn merge_into(inputs: &[PathBuf], output: &Path) -> Result<usize, MergeError> {
    if inputs.is_empty() {
        return Err(MergeError::NoInputs);
    }

    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    // Page ids in fetch order; a BTreeMap keyed by renumbered id would lose
    // intra-document ordering.
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut max_id = 1;

    for path in inputs {
        let mut doc = Document::load(path).map_err(|source| MergeError::Input {
            path: path.display().to_string(),
            source,
        })?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, page_id) in doc.get_pages() {
            let object = doc.get_object(page_id).map_err(|source| MergeError::Input {
                path: path.display().to_string(),
                source,
            })?;
            pages.push((page_id, object.to_owned()));
        }
        objects.extend(std::mem::take(&mut doc.objects));
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut page_root: Option<(ObjectId, Dictionary)> = None;

    for (object_id, object) in objects {
        match object_type(&object) {
            Some(b"Catalog") => {
                // The first catalog wins; later ones only point at page
                // trees that get folded in below.
                if catalog.is_none() {
                    catalog = Some((object_id, object));
                }
            }
            Some(b"Pages") => {
                if let Ok(dict) = object.as_dict() {
                    match &mut page_root {
                        Some((_, existing)) => existing.extend(dict),
                        None => page_root = Some((object_id, dict.clone())),
                    }
                }
            }
            // Pages are re-inserted below with a rewired parent; outlines
            // would dangle across documents, so they are dropped.
            Some(b"Page") | Some(b"Outlines") | Some(b"Outline") => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (catalog_id, catalog_object) = catalog.ok_or(MergeError::MissingCatalog)?;
    let (page_root_id, mut page_root_dict) = page_root.ok_or(MergeError::MissingPageTree)?;

    for (page_id, object) in &pages {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", page_root_id);
            merged.objects.insert(*page_id, Object::Dictionary(dict));
        }
    }

    page_root_dict.set("Count", pages.len() as i64);
    page_root_dict.set(
        "Kids",
        pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    merged
        .objects
        .insert(page_root_id, Object::Dictionary(page_root_dict));

    if let Ok(dict) = catalog_object.as_dict() {
        let mut dict = dict.clone();
        dict.set("Pages", page_root_id);
        dict.remove(b"Outlines");
        merged.objects.insert(catalog_id, Object::Dictionary(dict));
    }

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    merged.save(output).map_err(|source| MergeError::Output {
        path: output.display().to_string(),
        source,
    })?;

    Ok(pages.len())
}

fn object_type(object: &Object) -> Option<&[u8]> {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|value| value.as_name().ok())
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    use super::*;

    /// Minimal document with one page per (width, label) pair. Width makes
    /// page identity observable after a merge.
    fn doc_with_pages(pages: &[(i64, &str)]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut kids: Vec<Object> = Vec::new();
        for (width, label) in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![20.into(), 800.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*label)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
                "MediaBox" => vec![0.into(), 0.into(), (*width).into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn save(doc: &mut Document, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    fn page_widths(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .values()
            .map(|page_id| {
                let dict = doc.get_object(*page_id).unwrap().as_dict().unwrap();
                let media_box = dict.get(b"MediaBox").unwrap().as_array().unwrap();
                media_box[2].as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn merged_page_order_equals_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            save(&mut doc_with_pages(&[(100, "first")]), dir.path(), "a.pdf"),
            save(&mut doc_with_pages(&[(200, "second")]), dir.path(), "b.pdf"),
            save(&mut doc_with_pages(&[(300, "third")]), dir.path(), "c.pdf"),
        ];
        let out = dir.path().join("merged.pdf");

        let count = merge_into(&inputs, &out).unwrap();
        assert_eq!(count, 3);

        let merged = Document::load(&out).unwrap();
        assert_eq!(page_widths(&merged), vec![100, 200, 300]);
    }

    #[test]
    fn intra_document_page_order_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            save(
                &mut doc_with_pages(&[(110, "a1"), (120, "a2")]),
                dir.path(),
                "a.pdf",
            ),
            save(&mut doc_with_pages(&[(210, "b1")]), dir.path(), "b.pdf"),
        ];
        let out = dir.path().join("merged.pdf");

        let count = merge_into(&inputs, &out).unwrap();
        assert_eq!(count, 3);

        let merged = Document::load(&out).unwrap();
        assert_eq!(page_widths(&merged), vec![110, 120, 210]);
    }

    #[test]
    fn empty_input_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = merge_into(&[], &dir.path().join("merged.pdf")).unwrap_err();
        assert!(matches!(err, MergeError::NoInputs));
    }

    #[test]
    fn unwritable_output_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = save(&mut doc_with_pages(&[(100, "only")]), dir.path(), "a.pdf");
        let out = dir.path().join("no_such_dir").join("merged.pdf");

        let err = merge_into(&[input], &out).unwrap_err();
        assert!(matches!(err, MergeError::Output { .. }));
        assert!(err.to_string().contains("merged.pdf"));
    }

    #[test]
    fn unreadable_input_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");
        let err = merge_into(
            &[missing.clone()],
            &dir.path().join("merged.pdf"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing.pdf"));
    }
}
