//! End-to-end conversion of small source trees.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use bindery::dom::parse_fragment;
use bindery::{ConvertOptions, Error, convert};
use tempfile::TempDir;
use zip::ZipArchive;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

const DIAGRAM: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16">
<circle cx="8" cy="8" r="6" fill="#c33"/>
</svg>"##;

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    for (path, contents) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

fn package(conversion: &bindery::Conversion) -> ZipArchive<Cursor<Vec<u8>>> {
    let mut buf = Cursor::new(Vec::new());
    bindery::epub::write_epub_to_writer(&conversion.epub, &mut buf).expect("Failed to write EPUB");
    ZipArchive::new(Cursor::new(buf.into_inner())).expect("Invalid ZIP")
}

fn entry_text(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut s = String::new();
    archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing entry {name}"))
        .read_to_string(&mut s)
        .unwrap();
    s
}

fn hrefs(html: &str) -> Vec<String> {
    let dom = parse_fragment(html);
    dom.elements_by_tag("a")
        .into_iter()
        .filter_map(|id| dom.get_attr(id, "href").map(str::to_string))
        .collect()
}

/// Resolve `href` (path part only) against the directory of `page`.
fn resolve(page: &str, href: &str) -> String {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let mut segments: Vec<&str> = page.split('/').collect();
    segments.pop();
    for segment in path.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[test]
fn test_markdown_tree_with_vector_image() {
    let dir = tree(&[
        ("index.md", "# Home\n\nGo to [link](sub/page.md).\n"),
        ("sub/page.md", "A figure:\n\n<img src=\"diagram.svg\">\n"),
        ("sub/diagram.svg", DIAGRAM),
    ]);

    let options = ConvertOptions::default().with_return_temp_files(true);
    let mut conversion = convert(dir.path(), &options).unwrap();

    assert!(conversion.epub.cover().is_none());
    assert_eq!(conversion.temp_files, vec![dir.path().join("sub").join("diagram.png")]);

    let mut archive = package(&conversion);
    let index = entry_text(&mut archive, "OEBPS/index.html");
    assert!(index.contains("href=\"sub/page.html\""), "{index}");
    let page = entry_text(&mut archive, "OEBPS/sub/page.html");
    assert!(page.contains("src=\"diagram.png\""), "{page}");
    assert!(!page.contains("diagram.svg"));

    let mut png = Vec::new();
    archive
        .by_name("OEBPS/sub/diagram.png")
        .unwrap()
        .read_to_end(&mut png)
        .unwrap();
    assert!(png.starts_with(PNG_MAGIC));

    let opf = entry_text(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("id=\"sub_diagram_png\""));
    assert!(opf.contains("media-type=\"image/png\""));

    conversion.remove_temp_files().unwrap();
    assert!(!dir.path().join("sub/diagram.png").exists());
    assert!(dir.path().join("sub/diagram.svg").exists());
}

#[test]
fn test_markdown_links_resolve_to_pages() {
    let dir = tree(&[
        ("README.md", "[one](part/one.md) [two](part/two.md#end)"),
        ("part/one.md", "[back](../README.md) [two](two.md?v=2) [site](https://example.com/x.md)"),
        ("part/two.md", "[one](./one.md) [nested](deep/three.md)"),
        ("part/deep/three.md", "[top](../../README.md#top)"),
    ]);

    let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
    let epub = &conversion.epub;
    let pages: Vec<_> = epub.cover().into_iter().chain(epub.pages()).collect();
    let dests: Vec<&str> = pages.iter().map(|p| p.dest.as_str()).collect();
    assert_eq!(dests.len(), 4);

    for page in &pages {
        for href in hrefs(&page.html) {
            if href.starts_with("https:") {
                assert_eq!(href, "https://example.com/x.md");
                continue;
            }
            assert!(!href.contains(".md"), "unrewritten link {href} in {}", page.dest);
            let target = resolve(page.dest.as_str(), &href);
            assert!(dests.contains(&target.as_str()), "dangling {href} in {}", page.dest);
        }
    }

    let one = pages.iter().find(|p| p.dest.as_str() == "part/one.html").unwrap();
    assert!(one.html.contains("href=\"two.html?v=2\""));
    let readme = epub.cover().unwrap();
    assert!(readme.html.contains("href=\"part/two.html#end\""));
}

#[test]
fn test_cover_readme_preferred() {
    let dir = tree(&[
        ("index.html", "<p>index</p>"),
        ("README.md", "# Read me"),
        ("chapter.md", "text"),
    ]);

    let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
    let cover = conversion.epub.cover().unwrap();
    assert_eq!(cover.dest.as_str(), "README.html");
    assert_eq!(cover.title, "README");

    let mut pages: Vec<_> = conversion
        .epub
        .pages()
        .iter()
        .map(|p| p.dest.as_str())
        .collect();
    pages.sort_unstable();
    assert_eq!(pages, vec!["chapter.html", "index.html"]);
}

#[test]
fn test_cover_index_case_insensitive() {
    let dir = tree(&[("INDEX.HTM", "<h1>Start</h1>"), ("a.md", "a")]);

    let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
    let cover = conversion.epub.cover().unwrap();
    assert_eq!(cover.dest.as_str(), "INDEX.HTM");
    assert_eq!(cover.title, "INDEX");
    assert_eq!(conversion.epub.pages().len(), 1);

    let mut archive = package(&conversion);
    let opf = entry_text(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<itemref idref=\"cover\"/>"));
}

#[test]
fn test_no_cover_keeps_every_file() {
    let dir = tree(&[
        ("notes.md", "n"),
        ("sub/README.md", "nested readme"),
        ("sub/index.html", "<p>nested index</p>"),
    ]);

    let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
    assert!(conversion.epub.cover().is_none());
    assert_eq!(conversion.epub.pages().len(), 3);
}

#[test]
fn test_excluded_directories_skipped() {
    let dir = tree(&[
        ("a.md", "a"),
        (".git/HEAD", "ref: refs/heads/main"),
        ("book/.git/config", "[core]"),
        ("target/out.md", "generated"),
    ]);

    let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(conversion.epub.others().len(), 0);
    assert_eq!(conversion.epub.pages().len(), 2);

    let options = ConvertOptions::default().with_excluded_dirs([".git", "target"]);
    let conversion = convert(dir.path(), &options).unwrap();
    assert_eq!(conversion.epub.pages().len(), 1);
}

#[test]
fn test_stylesheet_on_markdown_pages_only() {
    let dir = tree(&[
        ("css/book.css", "body { font-family: serif }"),
        ("a.md", "a"),
        ("sub/b.md", "b"),
        ("c.html", "<p>c</p>"),
    ]);

    let options = ConvertOptions::default().with_stylesheet("css/book.css");
    let conversion = convert(dir.path(), &options).unwrap();
    let mut archive = package(&conversion);

    assert!(entry_text(&mut archive, "OEBPS/a.html").contains("href=\"css/book.css\""));
    assert!(entry_text(&mut archive, "OEBPS/sub/b.html").contains("href=\"../css/book.css\""));
    assert!(!entry_text(&mut archive, "OEBPS/c.html").contains("book.css"));
    assert_eq!(
        entry_text(&mut archive, "OEBPS/css/book.css"),
        "body { font-family: serif }"
    );
}

#[test]
fn test_extensionless_image_detected_by_content() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("logo"), b"GIF89a\x01\x00\x01\x00\x80\x00\x00").unwrap();
    fs::write(dir.path().join("fake.png"), b"plain text").unwrap();

    let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
    let images: Vec<_> = conversion.epub.images().iter().map(|i| i.dest.as_str()).collect();
    assert_eq!(images, vec!["logo"]);
    assert_eq!(conversion.epub.images()[0].media_type, "image/gif");
    let others: Vec<_> = conversion.epub.others().iter().map(|o| o.dest.as_str()).collect();
    assert_eq!(others, vec!["fake.png"]);
}

#[test]
fn test_images_with_colliding_ids_all_packaged() {
    let dir = tempfile::tempdir().unwrap();
    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    for name in ["a-b.png", "a_b.png", "cover", "ncx"] {
        fs::write(dir.path().join(name), png).unwrap();
    }
    fs::write(dir.path().join("README.md"), "# Cover page").unwrap();

    let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
    let mut ids: Vec<_> = conversion.epub.images().iter().map(|i| i.id.clone()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a_b_png", "a_b_png-2", "cover-2", "ncx-2"]);

    let mut archive = package(&conversion);
    let opf = entry_text(&mut archive, "OEBPS/content.opf");
    assert_eq!(opf.matches("id=\"cover\"").count(), 1);
    assert_eq!(opf.matches("id=\"ncx\"").count(), 1);
    for id in &ids {
        assert_eq!(opf.matches(&format!("id=\"{id}\"")).count(), 1, "{id}");
    }
    assert!(archive.by_name("OEBPS/cover").is_ok());
}

#[test]
fn test_malformed_svg_aborts_run() {
    let dir = tree(&[("a.md", "a"), ("bad.svg", "<svg><<<")]);

    let err = convert(dir.path(), &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Rasterize { .. }), "{err}");
}

#[test]
fn test_write_to_disk() {
    let dir = tree(&[("README.md", "# Hello"), ("ch1.md", "One")]);
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("book.epub");

    let options = ConvertOptions::default().with_title("Hello").with_author("Someone");
    let conversion = convert(dir.path(), &options).unwrap();
    conversion.write(&path).unwrap();

    let mut archive = ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
    let mut mimetype = String::new();
    archive.by_index(0).unwrap().read_to_string(&mut mimetype).unwrap();
    assert_eq!(mimetype, "application/epub+zip");
    assert!(Path::new(&path).metadata().unwrap().len() > 0);
}
