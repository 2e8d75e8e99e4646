use std::{
    fs,
    io::{Cursor, Read, Seek},
    path::Path,
};

use quick_xml::{Reader as XmlReader, events::Event};
use zip::ZipArchive;

use super::ExtractError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const MIN_WIDE_RUN_CHARS: usize = 4;
const MIN_NARROW_RUN_CHARS: usize = 8;

pub(super) fn extract_docx_text(path: &Path) -> Result<String, ExtractError> {
    let file = fs::File::open(path).map_err(|err| ExtractError::io(path, err))?;
    docx_text_from_reader(file)
}

/// Legacy `.doc` files. Renamed DOCX archives are handled as DOCX; real Word 97
/// binaries get a best-effort scan for text runs.
pub(super) fn extract_doc_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path).map_err(|err| ExtractError::io(path, err))?;

    if bytes.starts_with(ZIP_MAGIC) {
        return docx_text_from_reader(Cursor::new(bytes));
    }
    if !bytes.starts_with(OLE_MAGIC) {
        return Err(ExtractError::LegacyDoc("not a Word 97-2003 document"));
    }

    let wide = collect_runs(
        bytes
            .chunks_exact(2)
            .map(|pair| char::from_u32(u16::from_le_bytes([pair[0], pair[1]]) as u32)),
        MIN_WIDE_RUN_CHARS,
    );
    let narrow = collect_runs(
        bytes.iter().map(|byte| Some(*byte as char)).map(|c| c.filter(char::is_ascii)),
        MIN_NARROW_RUN_CHARS,
    );

    if wide.chars().count() >= narrow.chars().count() {
        Ok(wide)
    } else {
        Ok(narrow)
    }
}

fn docx_text_from_reader<R: Read + Seek>(reader: R) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut document = archive.by_name("word/document.xml")?;

    let mut xml = String::new();
    document
        .read_to_string(&mut xml)
        .map_err(|err| ExtractError::Xml(err.to_string()))?;

    let mut reader = XmlReader::from_str(&xml);
    let mut buf = Vec::new();
    let mut output = String::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:p" => push_paragraph_break(&mut output),
                b"w:tab" => output.push('\t'),
                b"w:br" => output.push('\n'),
                b"w:t" => in_text_node = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:p" => push_paragraph_break(&mut output),
                b"w:tab" => output.push('\t'),
                b"w:br" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_node {
                    let value = e
                        .unescape()
                        .map_err(|err| ExtractError::Xml(err.to_string()))?;
                    output.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_node = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ExtractError::Xml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(output.trim().to_string())
}

fn push_paragraph_break(output: &mut String) {
    if !output.is_empty() {
        output.push_str("\n\n");
    }
}

/// Joins every run of text-like characters at least `min_chars` long.
fn collect_runs(chars: impl Iterator<Item = Option<char>>, min_chars: usize) -> String {
    let mut output = String::new();
    let mut run = String::new();

    for c in chars {
        match c.and_then(normalize_doc_char) {
            Some(c) => run.push(c),
            None => flush_run(&mut run, &mut output, min_chars),
        }
    }
    flush_run(&mut run, &mut output, min_chars);

    output
}

fn flush_run(run: &mut String, output: &mut String, min_chars: usize) {
    let trimmed = run.trim();
    if trimmed.chars().filter(|c| c.is_alphanumeric()).count() >= min_chars {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(trimmed);
    }
    run.clear();
}

/// Maps Word's in-band control marks to whitespace and rejects anything that
/// is unlikely to be document text.
fn normalize_doc_char(c: char) -> Option<char> {
    match c {
        '\t' | '\u{07}' => Some('\t'),
        '\r' | '\n' | '\u{0B}' | '\u{0C}' => Some('\n'),
        c if c.is_control() => None,
        c if (c as u32) < 0x0250 || ('\u{2000}'..='\u{206F}').contains(&c) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Photosynthesis</w:t><w:tab/><w:t>&amp; light</w:t></w:r></w:p>
    <w:p><w:r><w:t>Chlorophyll absorbs red</w:t><w:br/><w:t>and blue light.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn write_docx(path: &Path) {
        let file = fs::File::create(path).expect("create docx");
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .expect("zip start file");
        zip.write_all(DOCUMENT_XML.as_bytes()).expect("write xml");
        zip.finish().expect("finish zip");
    }

    #[test]
    fn docx_text_keeps_paragraphs_tabs_and_breaks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        write_docx(&path);

        let text = extract_docx_text(&path).unwrap();
        assert_eq!(
            text,
            "Photosynthesis\t& light\n\nChlorophyll absorbs red\nand blue light."
        );
    }

    #[test]
    fn docx_without_document_part_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        let mut zip = zip::ZipWriter::new(fs::File::create(&path).unwrap());
        zip.start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<w:styles/>").unwrap();
        zip.finish().unwrap();

        let err = extract_docx_text(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
    }

    #[test]
    fn renamed_docx_is_read_as_docx() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.doc");
        write_docx(&path);

        let text = extract_doc_text(&path).unwrap();
        assert!(text.starts_with("Photosynthesis"));
    }

    #[test]
    fn legacy_doc_recovers_utf16_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.doc");

        let mut bytes = OLE_MAGIC.to_vec();
        bytes.resize(512, 0);
        for unit in "The mitochondria is the powerhouse of the cell.\r".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.resize(1024, 0);
        fs::write(&path, &bytes).unwrap();

        let text = extract_doc_text(&path).unwrap();
        assert_eq!(text, "The mitochondria is the powerhouse of the cell.");
    }

    #[test]
    fn non_word_binary_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.doc");
        fs::write(&path, b"just some text pretending to be a doc").unwrap();

        let err = extract_doc_text(&path).unwrap_err();
        assert!(matches!(err, ExtractError::LegacyDoc(_)));
    }

    #[test]
    fn short_runs_are_dropped() {
        let chars = "ab\0cdefgh\0".chars().map(Some);
        assert_eq!(collect_runs(chars, 4), "cdefgh");
    }
}
