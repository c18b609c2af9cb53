//! Integration tests for the parser module.
//!
//! These tests read realistic reference-manager exports and check what the
//! rest of the pipeline sees: entries, their locators and local attachments.

use std::path::PathBuf;

use bibarchive_core::parser::parse_file_field;
use bibarchive_core::{locate_entry, parse_bibtex, render_bibtex};

const ZOTERO_EXPORT: &str = r#"
@comment{jabref-meta: databaseType:bibtex;}

@article{smith_deep_2020,
	title = {Deep {Learning} for {Archives}},
	author = {Smith, Jane and Doe, John},
	journal = {Journal of Digital Preservation},
	year = {2020},
	doi = {10.1234/jdp.2020.17},
	url = {https://journal.example/articles/17},
	file = {Full Text PDF:/home/jane/Zotero/storage/AB12/smith.pdf:application/pdf;Snapshot:/home/jane/Zotero/storage/AB12/page.html:text/html},
}

@book{doe_handbook_2018,
	title = "Handbook of Citation",
	publisher = {Example Press},
	year = 2018,
	url = {https://doi.org/10.5555/handbook}
}

@misc{nowhere_2001,
	title = {Lost Manuscript},
	note = {No online copy}
}
"#;

#[test]
fn test_parse_reference_manager_export() {
    let result = parse_bibtex(ZOTERO_EXPORT);
    assert!(result.skipped.is_empty(), "{:?}", result.skipped);

    let keys: Vec<&str> = result.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["smith_deep_2020", "doe_handbook_2018", "nowhere_2001"]);
    assert_eq!(result.entries[1].field("year"), Some("2018"));
    assert_eq!(result.entries[1].field("title"), Some("Handbook of Citation"));
}

#[test]
fn test_locators_for_exported_entries() {
    let entries = parse_bibtex(ZOTERO_EXPORT).entries;

    let article = locate_entry(&entries[0]).unwrap();
    assert_eq!(article.url.as_str(), "https://journal.example/articles/17");
    assert_eq!(article.doi.as_deref(), Some("10.1234/jdp.2020.17"));

    // A DOI URL in the url field doubles as the DOI.
    let book = locate_entry(&entries[1]).unwrap();
    assert_eq!(book.doi.as_deref(), Some("10.5555/handbook"));

    assert!(locate_entry(&entries[2]).is_none());
}

#[test]
fn test_file_field_lists_every_attachment() {
    let entries = parse_bibtex(ZOTERO_EXPORT).entries;
    let files = parse_file_field(entries[0].field("file").unwrap());

    assert_eq!(files.len(), 2);
    assert_eq!(
        files[0].path,
        PathBuf::from("/home/jane/Zotero/storage/AB12/smith.pdf")
    );
    assert_eq!(files[0].media_type, "application/pdf");
    assert_eq!(files[1].description, "Snapshot");
    assert_eq!(files[1].media_type, "text/html");
}

#[test]
fn test_malformed_entry_does_not_hide_its_neighbours() {
    let input = "@article{good1, title = {One}}\n\
                 @article{broken, title {missing equals}}\n\
                 @article{good2, title = {Two}}\n";
    let result = parse_bibtex(input);

    let keys: Vec<&str> = result.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["good1", "good2"]);
    assert_eq!(result.skipped.len(), 1);
}

#[test]
fn test_rendered_collection_reads_back_identically() {
    let entries = parse_bibtex(ZOTERO_EXPORT).entries;
    let reparsed = parse_bibtex(&render_bibtex(&entries));

    assert!(reparsed.skipped.is_empty());
    assert_eq!(reparsed.entries, entries);
}
