mod assemble;
mod document;

pub use assemble::{ImportedSource, PageAssembler};
pub use document::SourceDocument;

/// Generated documents for unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, Stream};

    /// A PDF whose page `n` shows the text `{label}{n}`.
    ///
    /// `MediaBox` and `Resources` sit on the page tree, not on the pages.
    pub fn test_pdf(label: &str, num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));
        let resources = Dictionary::from_iter([(
            "Font",
            Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
        )]);

        let mut kids = Vec::new();
        for n in 1..=num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("{label}{n}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                content.encode().unwrap_or_default(),
            ));
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]));
            kids.push(Object::Reference(page_id));
        }

        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(i64::from(num_pages))),
            ("Kids", Object::Array(kids)),
            ("Resources", Object::Dictionary(resources)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        doc.save_to(&mut output).unwrap_or_default();
        output
    }

    /// The text shown on each page, in page order.
    pub fn page_labels(bytes: &[u8]) -> Vec<String> {
        let Ok(doc) = Document::load_mem(bytes) else {
            return Vec::new();
        };
        doc.get_pages()
            .into_values()
            .map(|page_id| {
                let content = doc.get_page_content(page_id).unwrap_or_default();
                Content::decode(&content)
                    .ok()
                    .and_then(|content| {
                        content.operations.into_iter().find_map(|op| match op.operator.as_str() {
                            "Tj" => match op.operands.first() {
                                Some(Object::String(text, _)) => {
                                    Some(String::from_utf8_lossy(text).into_owned())
                                }
                                _ => None,
                            },
                            _ => None,
                        })
                    })
                    .unwrap_or_default()
            })
            .collect()
    }
}
