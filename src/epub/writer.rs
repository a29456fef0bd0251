use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use quick_xml::escape::escape;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::builder::{Epub, Page};
use crate::classify::{is_absolute_reference, is_local_reference};
use crate::dom::parse_document;
use crate::error::{Error, Result};
use crate::path::RelativePath;

/// Characters escaped in manifest and navigation hrefs.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'[')
    .add(b']');

/// Write an [`Epub`] to a file on disk.
///
/// Creates an EPUB 2 file with OPF package document, NCX table of contents,
/// one XHTML document per page and every image and other file.
///
/// # Example
///
/// ```no_run
/// use bindery::epub::{Epub, write_epub};
/// use bindery::RelativePath;
///
/// let mut book = Epub::new("My Book").with_author("Me");
/// let dest = RelativePath::parse("intro.html").unwrap();
/// book.add_page(dest, "intro", "<p>Hello</p>", "intro.md")?;
/// write_epub(&book, "output.epub".as_ref())?;
/// # Ok::<(), bindery::Error>(())
/// ```
pub fn write_epub(book: &Epub, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::read(path, e))?;
    write_epub_to_writer(book, file)
}

/// Write an [`Epub`] to any [`Write`] + [`Seek`] destination.
pub fn write_epub_to_writer<W: Write + Seek>(book: &Epub, writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);

    // mimetype must be first and uncompressed
    let options_stored =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("mimetype", options_stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    let identifier = book.metadata.identifier();

    zip.start_file("OEBPS/content.opf", options_deflate)?;
    zip.write_all(generate_opf(book, &identifier).as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", options_deflate)?;
    zip.write_all(generate_ncx(book, &identifier).as_bytes())?;

    for page in book.cover().into_iter().chain(book.pages()) {
        zip.start_file(entry_name(&page.dest), options_deflate)?;
        zip.write_all(page_document(page).as_bytes())?;
    }

    let files = book
        .images()
        .iter()
        .map(|image| (&image.source, &image.dest))
        .chain(book.others().iter().map(|other| (&other.source, &other.dest)));
    for (source, dest) in files {
        let mut input = File::open(source).map_err(|e| Error::read(source, e))?;
        zip.start_file(entry_name(dest), options_deflate)?;
        io::copy(&mut input, &mut zip).map_err(|e| Error::read(source, e))?;
    }

    zip.finish()?;
    tracing::debug!(
        "wrote package with {} pages, {} images, {} other files",
        book.pages().len() + usize::from(book.cover().is_some()),
        book.images().len(),
        book.others().len()
    );
    Ok(())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

fn entry_name(dest: &RelativePath) -> String {
    format!("OEBPS/{dest}")
}

/// Percent-encode a package path for use as an href.
fn href(dest: &RelativePath) -> String {
    utf8_percent_encode(dest.as_str(), HREF).to_string()
}

/// Manifest ids of the pages in spine order.
fn page_ids(book: &Epub) -> Vec<(String, &Page)> {
    let cover = book.cover().map(|page| ("cover".to_string(), page));
    let pages = book
        .pages()
        .iter()
        .enumerate()
        .map(|(i, page)| (format!("page-{}", i + 1), page));
    cover.into_iter().chain(pages).collect()
}

fn generate_opf(book: &Epub, identifier: &str) -> String {
    let meta = &book.metadata;
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
    );

    opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape(&meta.title)));
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape(identifier)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape(&meta.language)
    ));
    if let Some(author) = &meta.author {
        opf.push_str(&format!(
            "    <dc:creator opf:role=\"aut\">{}</dc:creator>\n",
            escape(author)
        ));
    }
    if let Some(date) = &meta.date {
        opf.push_str(&format!("    <dc:date>{}</dc:date>\n", escape(date)));
    }

    opf.push_str("  </metadata>\n  <manifest>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );

    let pages = page_ids(book);
    for (id, page) in &pages {
        push_item(&mut opf, id, &page.dest, XHTML_MEDIA_TYPE);
    }
    for image in book.images() {
        push_item(&mut opf, &image.id, &image.dest, image.media_type);
    }
    for (i, other) in book.others().iter().enumerate() {
        push_item(&mut opf, &format!("other-{}", i + 1), &other.dest, other.media_type);
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    for (id, _) in &pages {
        opf.push_str(&format!("    <itemref idref=\"{id}\"/>\n"));
    }
    opf.push_str("  </spine>\n");

    if let Some(cover) = book.cover() {
        opf.push_str(&format!(
            "  <guide>\n    <reference type=\"cover\" title=\"{}\" href=\"{}\"/>\n  </guide>\n",
            escape(&cover.title),
            escape(&href(&cover.dest))
        ));
    }

    opf.push_str("</package>\n");
    opf
}

fn push_item(opf: &mut String, id: &str, dest: &RelativePath, media_type: &str) {
    opf.push_str(&format!(
        "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
        escape(id),
        escape(&href(dest)),
        media_type
    ));
}

fn generate_ncx(book: &Epub, identifier: &str) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content=""#,
    );
    ncx.push_str(&escape(identifier));
    ncx.push_str(
        r#""/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>"#,
    );
    ncx.push_str(&escape(&book.metadata.title));
    ncx.push_str("</text>\n  </docTitle>\n  <navMap>\n");

    for (order, (_, page)) in page_ids(book).into_iter().enumerate() {
        let order = order + 1;
        ncx.push_str(&format!(
            "    <navPoint id=\"navpoint-{order}\" playOrder=\"{order}\">\n      <navLabel>\n        <text>{}</text>\n      </navLabel>\n      <content src=\"{}\"/>\n    </navPoint>\n",
            escape(&page.title),
            escape(&href(&page.dest))
        ));
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

/// Stylesheet href as seen from `page`: package paths become relative to
/// the page's directory, anything else is kept.
fn stylesheet_href(page: &Page, stylesheet: &str) -> String {
    if !is_local_reference(stylesheet) || is_absolute_reference(stylesheet) {
        return stylesheet.to_string();
    }
    let base = page.dest.parent();
    match pathdiff::diff_paths(stylesheet, base.as_str()) {
        Some(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        None => stylesheet.to_string(),
    }
}

/// Wrap a page's HTML fragment into a standalone XHTML document.
fn page_document(page: &Page) -> String {
    let mut dom = parse_document(&page.html);
    for id in dom.elements_by_tag("title") {
        dom.detach(id);
    }

    let mut doc = String::with_capacity(page.html.len() + 512);
    doc.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
"#,
    );
    doc.push_str(&format!("<title>{}</title>\n", escape(&page.title)));
    for stylesheet in &page.stylesheets {
        doc.push_str(&format!(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\"/>\n",
            escape(&stylesheet_href(page, stylesheet))
        ));
    }
    if let Some(head) = dom.find_by_tag("head") {
        doc.push_str(&dom.inner_xhtml(head));
    }
    doc.push_str("</head>\n<body>\n");
    if let Some(body) = dom.find_by_tag("body") {
        doc.push_str(&dom.inner_xhtml(body));
    }
    doc.push_str("\n</body>\n</html>\n");
    doc
}
