//! Small PDFs built with lopdf for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// One page of a fixture document.
#[derive(Default)]
pub(crate) struct FixturePage {
    operations: Vec<Operation>,
}

impl FixturePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Show `text` in 12pt Helvetica at (x, y), PDF coordinates.
    pub(crate) fn text(mut self, x: f32, y: f32, text: &str) -> Self {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
        self
    }

    /// Stroke a straight line between two points, PDF coordinates.
    pub(crate) fn line(mut self, from: (f32, f32), to: (f32, f32)) -> Self {
        self.operations.extend([
            Operation::new("m", vec![from.0.into(), from.1.into()]),
            Operation::new("l", vec![to.0.into(), to.1.into()]),
            Operation::new("S", vec![]),
        ]);
        self
    }
}

/// Builder for a multi-page fixture document.
#[derive(Default)]
pub(crate) struct PdfFixture {
    pages: Vec<FixturePage>,
    info: Vec<(&'static str, String)>,
}

impl PdfFixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, page: FixturePage) -> Self {
        self.pages.push(page);
        self
    }

    pub(crate) fn info(mut self, key: &'static str, value: &str) -> Self {
        self.info.push((key, value.to_string()));
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for page in self.pages {
            let content = Content {
                operations: page.operations,
            };
            let encoded = content.encode().expect("fixture content encodes");
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if !self.info.is_empty() {
            let mut info = lopdf::Dictionary::new();
            for (key, value) in self.info {
                info.set(key, Object::string_literal(value));
            }
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("fixture document saves");
        buf
    }
}
