//! PDF document wrapper

use crate::font::StandardFont;
use crate::geometry::Rect;
use crate::layout::{self, TextLayout, TextMatch};
use crate::redact::{self, Erasure, ErasureOutcome};
use crate::text::{
    encode_hex, generate_text_operators, layout_text, BoxFit, TextRenderContext, TextStyle,
    TextTarget,
};
use crate::{PdfError, Result};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of font resource names added by this crate
const FONT_RESOURCE_PREFIX: &str = "PF";

/// Options applied when writing a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Drop objects no longer reachable (e.g. replaced content streams)
    pub prune: bool,
    /// Compress streams that have no filter
    pub compress: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            prune: true,
            compress: true,
        }
    }
}

/// PDF Document wrapper providing high-level operations
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Standard fonts added to the document (font -> PDF object ID)
    font_objects: HashMap<StandardFont, ObjectId>,
    /// Page font resources (page number -> font -> resource name)
    page_font_resources: HashMap<usize, HashMap<StandardFont, String>>,
    /// Buffered content operators per page (page number -> operators)
    page_content_buffer: HashMap<usize, Vec<u8>>,
}

impl PdfDocument {
    fn from_document(inner: Document) -> Self {
        Self {
            inner,
            font_objects: HashMap::new(),
            page_font_resources: HashMap::new(),
            page_content_buffer: HashMap::new(),
        }
    }

    /// Open a PDF document from a file path
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::open("template.pdf")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = Document::load(path)
            .map_err(|e| PdfError::OpenError(format!("{}: {e}", path.display())))?;
        log::debug!("Opened {} ({} pages)", path.display(), inner.get_pages().len());
        Ok(Self::from_document(inner))
    }

    /// Open a PDF document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Get a mutable reference to the underlying lopdf document
    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    /// Resolve a 1-based page number
    fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        u32::try_from(page)
            .ok()
            .and_then(|p| pages.get(&p).copied())
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    /// Page area from the MediaBox, following inheritance
    ///
    /// A CropBox is only used at a level of the page tree that has no MediaBox.
    pub fn page_box(&self, page: usize) -> Result<Rect> {
        let page_id = self.page_id(page)?;
        let media_box = self.get_inherited_media_box(page_id)?;
        Self::rect_from_media_box(&media_box)
    }

    /// Get MediaBox, following parent inheritance chain if needed
    fn get_inherited_media_box(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let mut current_id = page_id;

        // Follow parent chain up to 10 levels (safety limit)
        for _ in 0..10 {
            let obj = self.inner.get_object(current_id)?;
            let dict = obj
                .as_dict()
                .map_err(|_| PdfError::ParseError("Object is not a dictionary".to_string()))?;

            if let Ok(media_box) = dict.get(b"MediaBox").or_else(|_| dict.get(b"CropBox")) {
                return match layout::resolve(&self.inner, media_box) {
                    Object::Array(arr) => Ok(arr.clone()),
                    _ => Err(PdfError::ParseError("MediaBox is not an array".to_string())),
                };
            }

            if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
                current_id = *parent_id;
                continue;
            }

            break;
        }

        // Fallback: assume A4 page size
        Ok(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(595.28),
            Object::Real(841.89),
        ])
    }

    fn rect_from_media_box(media_box_array: &[Object]) -> Result<Rect> {
        let values: Vec<f64> = media_box_array
            .iter()
            .take(4)
            .filter_map(|o| layout::number(o))
            .collect();
        match values.as_slice() {
            [x0, y0, x1, y1] => Ok(Rect::new(*x0, *y0, *x1, *y1)),
            _ => Err(PdfError::ParseError("Invalid MediaBox format".to_string())),
        }
    }

    /// Resources of a page, following inheritance, with the font dictionary
    /// resolved to a direct dictionary
    fn page_resources(&self, page_id: ObjectId) -> Result<Dictionary> {
        let mut current_id = page_id;
        let mut resources = Dictionary::new();

        for _ in 0..10 {
            let dict = self
                .inner
                .get_object(current_id)?
                .as_dict()
                .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;

            if let Ok(found) = dict.get(b"Resources") {
                if let Object::Dictionary(found) = layout::resolve(&self.inner, found) {
                    resources = found.clone();
                }
                break;
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        let fonts = match resources.get(b"Font") {
            Ok(font) => match layout::resolve(&self.inner, font) {
                Object::Dictionary(dict) => Some(dict.clone()),
                _ => None,
            },
            Err(_) => None,
        };
        if let Some(fonts) = fonts {
            resources.set("Font", Object::Dictionary(fonts));
        }

        Ok(resources)
    }

    /// Decoded content of a page, all content streams concatenated
    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self
            .inner
            .get_object(page_id)?
            .as_dict()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?;

        let stream_data = |obj: &Object| -> Option<Vec<u8>> {
            match layout::resolve(&self.inner, obj) {
                Object::Stream(stream) => Some(
                    stream
                        .decompressed_content()
                        .unwrap_or_else(|_| stream.content.clone()),
                ),
                _ => None,
            }
        };

        let content = match page_dict.get(b"Contents") {
            Ok(contents) => match layout::resolve(&self.inner, contents) {
                Object::Array(arr) => {
                    let mut combined = Vec::new();
                    for data in arr.iter().filter_map(|o| stream_data(o)) {
                        combined.extend_from_slice(&data);
                        combined.push(b'\n');
                    }
                    combined
                }
                other => stream_data(other).unwrap_or_default(),
            },
            Err(_) => Vec::new(),
        };

        Ok(content)
    }

    /// Replace a page's content with a single new stream
    fn set_page_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
        let mut page_dict = self
            .inner
            .get_object(page_id)?
            .as_dict()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?
            .clone();

        let stream_id = self.inner.add_object(Stream::new(Dictionary::new(), content));
        page_dict.set(b"Contents", Object::Reference(stream_id));
        self.inner.objects.insert(page_id, page_dict.into());

        Ok(())
    }

    /// Decode a page's content stream
    fn decode_page(&self, page_id: ObjectId) -> Result<(Content, Dictionary)> {
        let data = self.page_content(page_id)?;
        let content = Content::decode(&data).map_err(|e| PdfError::ParseError(e.to_string()))?;
        let resources = self.page_resources(page_id)?;
        Ok((content, resources))
    }

    /// Positioned text of a page
    pub fn text_layout(&self, page: usize) -> Result<TextLayout> {
        let page_id = self.page_id(page)?;
        let (content, resources) = self.decode_page(page_id)?;
        let fonts = layout::load_fonts(&self.inner, &resources);
        Ok(layout::interpret(&fonts, &content.operations))
    }

    /// Plain text of a page, lines top to bottom
    pub fn extract_text(&self, page: usize) -> Result<String> {
        Ok(self.text_layout(page)?.text().to_string())
    }

    /// All occurrences of `needle` on a page
    pub fn find_text(&self, page: usize, needle: &str) -> Result<Vec<TextMatch>> {
        Ok(self.text_layout(page)?.find(needle))
    }

    /// Remove the text glyphs covered by `erasures` from a page.
    ///
    /// Content already inserted on the page is written out first so it is
    /// subject to the same erasures.
    pub fn erase(&mut self, page: usize, erasures: &[Erasure]) -> Result<ErasureOutcome> {
        let page_id = self.page_id(page)?;
        if let Some(buffered) = self.page_content_buffer.remove(&page) {
            self.append_to_content_stream(page, &buffered)?;
        }

        let (mut content, resources) = self.decode_page(page_id)?;
        let fonts = layout::load_fonts(&self.inner, &resources);
        let text = layout::interpret(&fonts, &content.operations);
        let outcome = redact::apply_erasures(&mut content.operations, &text, erasures);

        if outcome.glyphs_removed > 0 {
            let encoded = content.encode()?;
            self.set_page_content(page_id, encoded)?;
        }

        Ok(outcome)
    }

    /// Insert text on a page using a standard font
    ///
    /// Characters the font cannot encode are dropped. Returns how the laid-out
    /// text relates to the target.
    pub fn insert_text(
        &mut self,
        page: usize,
        target: &TextTarget,
        text: &str,
        style: &TextStyle,
    ) -> Result<BoxFit> {
        self.page_id(page)?;
        let (lines, fit) = layout_text(text, target, style);
        if lines.iter().all(|l| l.text.is_empty()) {
            return Ok(fit);
        }

        let resource_name = self.get_or_create_font_ref(style.font, page)?;
        let ctx = TextRenderContext {
            font_name: resource_name,
            font_size: style.size,
            color: style.color,
        };

        for line in lines.iter().filter(|l| !l.text.is_empty()) {
            let (bytes, missing) = style.font.encode_text(&line.text);
            if missing > 0 {
                log::debug!(
                    "{missing} characters of {:?} not encodable in {}",
                    line.text,
                    style.font.base_font_name()
                );
            }
            let ops = generate_text_operators(&encode_hex(&bytes), line.x, line.baseline, &ctx);
            self.buffer_content(page, &ops);
        }

        Ok(fit)
    }

    /// Get or create a font resource for a specific page
    ///
    /// Returns the resource name for use in content streams. The name never
    /// collides with a font resource the page already has. Later insertions
    /// with the same font on the page reuse it.
    pub fn get_or_create_font_ref(&mut self, font: StandardFont, page: usize) -> Result<String> {
        if let Some(name) = self
            .page_font_resources
            .get(&page)
            .and_then(|fonts| fonts.get(&font))
        {
            return Ok(name.clone());
        }

        let font_id = match self.font_objects.get(&font) {
            Some(id) => *id,
            None => {
                let id = self.inner.add_object(font.to_pdf_dictionary());
                self.font_objects.insert(font, id);
                id
            }
        };

        let page_id = self.page_id(page)?;
        let resources = self.page_resources(page_id)?;
        let existing: Vec<Vec<u8>> = match resources.get(b"Font") {
            Ok(Object::Dictionary(fonts)) => fonts.iter().map(|(k, _)| k.clone()).collect(),
            _ => Vec::new(),
        };

        let base = format!("{FONT_RESOURCE_PREFIX}{}", font.resource_tag());
        let mut resource_name = base.clone();
        let mut n = 1;
        while existing.iter().any(|k| k.as_slice() == resource_name.as_bytes()) {
            resource_name = format!("{base}{n}");
            n += 1;
        }

        self.add_font_to_page_resources(page_id, resources, &resource_name, font_id);
        self.page_font_resources
            .entry(page)
            .or_default()
            .insert(font, resource_name.clone());

        Ok(resource_name)
    }

    /// Store a page's resources directly on the page with one more font
    fn add_font_to_page_resources(
        &mut self,
        page_id: ObjectId,
        mut resources: Dictionary,
        resource_name: &str,
        font_id: ObjectId,
    ) {
        let mut font_dict = match resources.get(b"Font") {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        font_dict.set(resource_name.as_bytes(), Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(font_dict));

        if let Some(Object::Dictionary(page_dict)) = self.inner.objects.get_mut(&page_id) {
            page_dict.set("Resources", Object::Dictionary(resources));
        }
    }

    /// Buffer content operators for a page (written at save time)
    ///
    /// Instead of immediately appending to content stream (which creates orphan objects),
    /// this buffers the operators and flushes them all at once during save.
    fn buffer_content(&mut self, page: usize, content: &[u8]) {
        self.page_content_buffer
            .entry(page)
            .or_default()
            .extend_from_slice(content);
    }

    /// Flush all buffered content to page streams
    fn flush_content_buffers(&mut self) -> Result<()> {
        let buffers: Vec<(usize, Vec<u8>)> = self.page_content_buffer.drain().collect();

        for (page, content) in buffers {
            if !content.is_empty() {
                self.append_to_content_stream(page, &content)?;
            }
        }

        Ok(())
    }

    /// Append content to a page, isolating the existing content's graphics state
    fn append_to_content_stream(&mut self, page: usize, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let existing = self.page_content(page_id)?;

        let mut new_content = Vec::with_capacity(existing.len() + content.len() + 8);
        new_content.extend_from_slice(b"q\n");
        new_content.extend_from_slice(&existing);
        new_content.extend_from_slice(b"\nQ\n");
        new_content.extend_from_slice(content);

        self.set_page_content(page_id, new_content)
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self, options: &SaveOptions) -> Result<Vec<u8>> {
        self.flush_content_buffers()?;

        if options.prune {
            self.inner.prune_objects();
            self.inner.renumber_objects();
            // Object ids changed
            self.font_objects.clear();
            self.page_font_resources.clear();
        }
        if options.compress {
            self.inner.compress();
        }

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;

        Ok(buffer)
    }

    /// Save the document to a file
    ///
    /// The file is written next to `path` under a temporary name and renamed
    /// into place, so a failed save never leaves a partial file at `path`.
    pub fn save<P: AsRef<Path>>(&mut self, path: P, options: &SaveOptions) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(options)?;
        let partial = partial_path(path);

        let written = fs::write(&partial, &bytes).and_then(|_| fs::rename(&partial, path));
        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            return Err(PdfError::SaveError(format!("{}: {e}", path.display())));
        }

        log::debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.pdf".to_string());
    path.with_file_name(format!(".{name}.{}.partial", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_sibling() {
        let partial = partial_path(Path::new("/tmp/out/result.pdf"));
        assert_eq!(partial.parent(), Some(Path::new("/tmp/out")));
        let name = partial.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".result.pdf."));
        assert!(name.ends_with(".partial"));
    }

    #[test]
    fn test_rect_from_media_box() {
        let rect = PdfDocument::rect_from_media_box(&[
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(595.0),
            Object::Integer(842),
        ])
        .unwrap();
        assert_eq!(rect, Rect::new(0.0, 0.0, 595.0, 842.0));
        assert!(PdfDocument::rect_from_media_box(&[Object::Integer(0)]).is_err());
    }

    #[test]
    fn test_save_options_default() {
        let options = SaveOptions::default();
        assert!(options.prune);
        assert!(options.compress);
    }
}
