use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/**
 * \brief 讀取來源文件並抽出純文字，供大綱生成使用。
 * \details 依副檔名分派：txt/md 直接讀、pdf 逐頁抽字、docx 走
 *          word/document.xml；其餘副檔名拒絕。
 */
pub fn extract_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    extract_from_bytes(&name, &bytes)
}

/**
 * \brief 與 `extract_text` 相同，但以檔名加位元組操作（供上傳端點使用）。
 */
pub fn extract_from_bytes(file_name: &str, bytes: &[u8]) -> Result<String> {
    let lower = file_name.to_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or("");
    match ext {
        "txt" | "md" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "pdf" => extract_pdf(bytes),
        "docx" | "doc" => extract_docx(bytes),
        other => Err(Error::UnsupportedFile(format!(
            ".{} (expected .txt, .md, .pdf, or .docx)",
            other
        ))),
    }
}

/**
 * \brief PDF 抽字：逐頁收集文字，頁與頁之間以換行分隔。
 */
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::FileParse(format!("pdf: {}", e)))?;
    let mut text = String::new();
    let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();
    for page_no in page_numbers {
        let page_text = doc
            .extract_text(&[page_no])
            .map_err(|e| Error::FileParse(format!("pdf page {}: {}", page_no, e)))?;
        text.push_str(&page_text);
        text.push('\n');
    }
    Ok(text)
}

/**
 * \brief DOCX 抽字：串接 `w:t` 文字片段，段落結尾補換行。
 */
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::FileParse(format!("docx: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::FileParse(format!("docx: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::FileParse(format!("docx: {}", e)))?;

    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text_run => {
                let piece = e
                    .unescape()
                    .map_err(|err| Error::FileParse(format!("docx: {}", err)))?;
                text.push_str(&piece);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(Error::FileParse(format!("docx: {}", err))),
        }
        buf.clear();
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    #[test]
    fn test_plain_text_and_markdown_pass_through() {
        let got = extract_from_bytes("notes.txt", "hello\nworld".as_bytes()).expect("txt");
        assert_eq!(got, "hello\nworld");
        let got = extract_from_bytes("README.MD", "# Title".as_bytes()).expect("md");
        assert_eq!(got, "# Title");
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let err = extract_from_bytes("deck.pptx", b"whatever").expect_err("rejected");
        assert!(matches!(err, Error::UnsupportedFile(_)));
        let err = extract_from_bytes("noext", b"whatever").expect_err("rejected");
        assert!(matches!(err, Error::UnsupportedFile(_)));
    }

    #[test]
    fn test_corrupt_pdf_reports_parse_failure() {
        let err = extract_from_bytes("broken.pdf", b"not a pdf at all").expect_err("rejected");
        assert!(matches!(err, Error::FileParse(_)));
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let document = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">",
            "<w:body>",
            "<w:p><w:r><w:t>First paragraph</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>Second </w:t></w:r><w:r><w:t>half</w:t></w:r></w:p>",
            "</w:body></w:document>"
        );
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", FileOptions::default())
                .expect("start entry");
            writer.write_all(document.as_bytes()).expect("write xml");
            writer.finish().expect("finish archive");
        }
        let got = extract_from_bytes("report.docx", cursor.get_ref()).expect("docx");
        assert_eq!(got, "First paragraph\nSecond half\n");
    }

    #[test]
    fn test_docx_without_document_part_fails() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("unrelated.xml", FileOptions::default())
                .expect("start entry");
            writer.write_all(b"<x/>").expect("write xml");
            writer.finish().expect("finish archive");
        }
        let err = extract_from_bytes("report.docx", cursor.get_ref()).expect_err("rejected");
        assert!(matches!(err, Error::FileParse(_)));
    }
}
