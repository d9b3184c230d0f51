/// An input document after the external decoding step. PDF statements arrive
/// as a page stream of plain text; CSV exports arrive as their raw content.
#[derive(Debug, Clone)]
pub enum Document {
    Pdf {
        filename: String,
        pages: Vec<String>,
    },
    Csv {
        filename: String,
        content: String,
    },
}

impl Document {
    /// Build a PDF document from a page stream where pages are separated by
    /// form feed characters.
    pub fn pdf(filename: impl Into<String>, text: &str) -> Self {
        let pages = text.split('\u{c}').map(|p| p.to_string()).collect();
        Document::Pdf {
            filename: filename.into(),
            pages,
        }
    }

    pub fn csv(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Document::Csv {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Document::Pdf { filename, .. } => filename,
            Document::Csv { filename, .. } => filename,
        }
    }

    pub fn pages(&self) -> Option<&[String]> {
        match self {
            Document::Pdf { pages, .. } => Some(pages),
            Document::Csv { .. } => None,
        }
    }

    pub fn csv_content(&self) -> Option<&str> {
        match self {
            Document::Pdf { .. } => None,
            Document::Csv { content, .. } => Some(content),
        }
    }

    /// First header line of a CSV document, if any.
    pub fn csv_header(&self) -> Option<&str> {
        self.csv_content().and_then(|c| c.lines().next())
    }
}
