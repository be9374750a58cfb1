//! Package-level orchestration: the ZIP container, the workbook part and
//! its relationships, and the end-to-end open/save paths.
//!
//! Opening sniffs the leading bytes: `PK` means a plain ZIP package, the
//! compound-file magic means Agile encryption wraps the package. Saving
//! always builds the plain package in memory first, encrypts it when asked,
//! and lands the result through a temp file in the destination directory so
//! the final path appears atomically and survives failed saves untouched.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{shared_strings, styles, worksheet};
use crate::cfb::{CfbReader, CfbWriter};
use crate::crypto::{ContainerFormat, EncryptionOptions, agile, detect_container_format};
use crate::error::{Error, Result};
use crate::sheet::Workbook;
use crate::xml::{XmlEvent, XmlReader, XmlWriter};

/// CFB stream holding the encryption parameters.
const STREAM_ENCRYPTION_INFO: &str = "EncryptionInfo";

/// CFB stream holding the encrypted package.
const STREAM_ENCRYPTED_PACKAGE: &str = "EncryptedPackage";

/// Open a workbook file, decrypting when it is a compound file.
pub fn load_workbook(path: &Path, password: Option<&str>) -> Result<Workbook> {
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;

    match detect_container_format(&data)? {
        ContainerFormat::Zip => parse_package(&data),
        ContainerFormat::Cfb => {
            let Some(password) = password else {
                return Err(Error::InvalidPassword);
            };

            let mut cfb = CfbReader::open(data)?;
            let info_bytes = cfb.read_stream(STREAM_ENCRYPTION_INFO)?.ok_or_else(|| {
                Error::Corrupt("compound file has no EncryptionInfo stream".to_string())
            })?;
            let package = cfb.read_stream(STREAM_ENCRYPTED_PACKAGE)?.ok_or_else(|| {
                Error::Corrupt("compound file has no EncryptedPackage stream".to_string())
            })?;

            let info = agile::parse_encryption_info(&info_bytes)?;
            let plain = agile::decrypt_package(&info, &package, password)?;
            parse_package(&plain)
        },
    }
}

/// Save a workbook, optionally wrapping it with Agile encryption.
pub fn save_workbook(
    workbook: &Workbook,
    path: &Path,
    encryption: Option<&EncryptionOptions>,
) -> Result<()> {
    let package = build_package(workbook)?;

    let output = match encryption {
        None => package,
        Some(options) => {
            let (info, encrypted) = agile::encrypt_package(&package, options)?;
            let mut cfb = CfbWriter::new();
            cfb.add_stream(STREAM_ENCRYPTION_INFO, &info)?;
            cfb.add_stream(STREAM_ENCRYPTED_PACKAGE, &encrypted)?;
            cfb.into_bytes()?
        },
    };

    // temp file in the destination directory, renamed into place on success
    // and unlinked on every failure path
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&output)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(())
}

fn zip_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Serialize the workbook into plain `.xlsx` package bytes.
pub fn build_package(workbook: &Workbook) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let mut add_part = |zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, body: &str| -> Result<()> {
        zip.start_file(name, zip_options())
            .map_err(|e| Error::Zip(format!("failed to start entry {name}: {e}")))?;
        zip.write_all(body.as_bytes())?;
        Ok(())
    };

    add_part(&mut zip, super::PART_CONTENT_TYPES, &write_content_types(workbook)?)?;
    add_part(&mut zip, super::PART_ROOT_RELS, &write_root_rels()?)?;
    add_part(&mut zip, super::PART_WORKBOOK_RELS, &write_workbook_rels(workbook)?)?;
    add_part(&mut zip, super::PART_WORKBOOK, &write_workbook_part(workbook)?)?;
    add_part(&mut zip, super::PART_STYLES, &styles::write_styles(workbook.styles())?)?;
    for sheet in workbook.sheets() {
        add_part(
            &mut zip,
            &super::worksheet_part_name(sheet.sheet_id()),
            &worksheet::write_worksheet(sheet)?,
        )?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| Error::Zip(format!("failed to finish package: {e}")))?;
    Ok(cursor.into_inner())
}

fn write_content_types(workbook: &Workbook) -> Result<String> {
    let mut w = XmlWriter::new();
    w.start_document();
    w.start_element("Types");
    w.attribute("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types");

    w.start_element("Default");
    w.attribute("Extension", "rels");
    w.attribute("ContentType", super::CT_RELATIONSHIPS);
    w.end_element()?;
    w.start_element("Default");
    w.attribute("Extension", "xml");
    w.attribute("ContentType", super::CT_XML);
    w.end_element()?;

    let mut add_override = |w: &mut XmlWriter, part: &str, content_type: &str| -> Result<()> {
        w.start_element("Override");
        w.attribute("PartName", &format!("/{part}"));
        w.attribute("ContentType", content_type);
        w.end_element()
    };

    add_override(&mut w, super::PART_WORKBOOK, super::CT_WORKBOOK)?;
    add_override(&mut w, super::PART_STYLES, super::CT_STYLES)?;
    for sheet in workbook.sheets() {
        add_override(
            &mut w,
            &super::worksheet_part_name(sheet.sheet_id()),
            super::CT_WORKSHEET,
        )?;
    }

    w.end_element()?;
    w.end_document()
}

fn write_root_rels() -> Result<String> {
    let mut w = XmlWriter::new();
    w.start_document();
    w.start_element("Relationships");
    w.attribute("xmlns", super::NS_PACKAGE_RELATIONSHIPS);
    w.start_element("Relationship");
    w.attribute("Id", "rId1");
    w.attribute("Type", super::REL_TYPE_OFFICE_DOCUMENT);
    w.attribute("Target", super::PART_WORKBOOK);
    w.end_element()?;
    w.end_element()?;
    w.end_document()
}

/// One relationship per worksheet in sheet order, then the styles part.
fn write_workbook_rels(workbook: &Workbook) -> Result<String> {
    let mut w = XmlWriter::new();
    w.start_document();
    w.start_element("Relationships");
    w.attribute("xmlns", super::NS_PACKAGE_RELATIONSHIPS);

    for (index, sheet) in workbook.sheets().iter().enumerate() {
        w.start_element("Relationship");
        w.attribute("Id", &format!("rId{}", index + 1));
        w.attribute("Type", super::REL_TYPE_WORKSHEET);
        w.attribute("Target", &format!("worksheets/sheet{}.xml", sheet.sheet_id()));
        w.end_element()?;
    }

    w.start_element("Relationship");
    w.attribute("Id", &format!("rId{}", workbook.sheet_count() + 1));
    w.attribute("Type", super::REL_TYPE_STYLES);
    w.attribute("Target", "styles.xml");
    w.end_element()?;

    w.end_element()?;
    w.end_document()
}

fn write_workbook_part(workbook: &Workbook) -> Result<String> {
    let mut w = XmlWriter::new();
    w.start_document();
    w.start_element("workbook");
    w.attribute("xmlns", super::NS_SPREADSHEETML);
    w.attribute("xmlns:r", super::NS_RELATIONSHIPS);

    w.start_element("sheets");
    for (index, sheet) in workbook.sheets().iter().enumerate() {
        w.start_element("sheet");
        w.attribute("name", sheet.name());
        w.attribute("sheetId", &sheet.sheet_id().to_string());
        if sheet.hidden() {
            w.attribute("state", "hidden");
        }
        w.attribute("r:id", &format!("rId{}", index + 1));
        w.end_element()?;
    }
    w.end_element()?;

    w.end_element()?;
    w.end_document()
}

struct SheetRef {
    name: String,
    rel_id: String,
    hidden: bool,
}

fn read_zip_entry(zip: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    match zip.by_name(name) {
        Ok(mut file) => {
            let mut content = String::with_capacity(file.size() as usize);
            file.read_to_string(&mut content)
                .map_err(|e| Error::Corrupt(format!("entry {name} is not UTF-8 text: {e}")))?;
            Ok(Some(content))
        },
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(Error::Zip(format!("failed to read entry {name}: {e}"))),
    }
}

/// Parse plain package bytes into a workbook.
pub fn parse_package(data: &[u8]) -> Result<Workbook> {
    let mut zip = ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::Corrupt(format!("not a readable ZIP archive: {e}")))?;

    let workbook_xml = read_zip_entry(&mut zip, super::PART_WORKBOOK)?
        .ok_or_else(|| Error::Corrupt("package has no xl/workbook.xml part".to_string()))?;
    let sheet_refs = parse_workbook_part(&workbook_xml)?;

    let rels = match read_zip_entry(&mut zip, super::PART_WORKBOOK_RELS)? {
        Some(xml) => parse_relationships(&xml)?,
        None => Vec::new(),
    };
    let target_for = |rel_id: &str| {
        rels.iter()
            .find(|(id, _)| id == rel_id)
            .map(|(_, target)| target.clone())
    };

    let mut workbook = Workbook::new();

    if let Some(styles_xml) = read_zip_entry(&mut zip, super::PART_STYLES)? {
        workbook.set_styles(styles::parse_styles(&styles_xml)?);
    }

    let shared = match read_zip_entry(&mut zip, super::PART_SHARED_STRINGS)? {
        Some(xml) => shared_strings::parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    for (index, sheet_ref) in sheet_refs.iter().enumerate() {
        // resolve the worksheet part through the relationship when present,
        // falling back to the conventional name
        let part_name = target_for(&sheet_ref.rel_id)
            .map(|target| resolve_target(&target))
            .unwrap_or_else(|| super::worksheet_part_name(index as u32 + 1));

        let sheet_xml = read_zip_entry(&mut zip, &part_name)?.ok_or_else(|| {
            Error::Corrupt(format!("package has no {part_name} part for {}", sheet_ref.name))
        })?;

        let sheet = workbook
            .add_sheet(&sheet_ref.name)
            .map_err(|e| Error::Corrupt(format!("bad sheet table: {e}")))?;
        sheet.set_hidden(sheet_ref.hidden);
        worksheet::parse_worksheet(&sheet_xml, &shared, sheet)?;
    }

    Ok(workbook)
}

/// Resolve a workbook-relative relationship target to a package entry name.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("xl/{target}")
    }
}

fn parse_workbook_part(xml: &str) -> Result<Vec<SheetRef>> {
    let mut sheets = Vec::new();
    let mut reader = XmlReader::new(xml);

    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) if tag.name == "sheet" => {
                let name = tag
                    .attr("name")
                    .ok_or_else(|| Error::Corrupt("sheet entry without name".to_string()))?
                    .to_string();
                let rel_id = tag.attr("id").unwrap_or_default().to_string();
                let hidden = matches!(tag.attr("state"), Some("hidden") | Some("veryHidden"));
                sheets.push(SheetRef {
                    name,
                    rel_id,
                    hidden,
                });
            },
            XmlEvent::EndDocument => break,
            _ => {},
        }
    }

    Ok(sheets)
}

/// Parse a relationships part into (id, target) pairs.
fn parse_relationships(xml: &str) -> Result<Vec<(String, String)>> {
    let mut rels = Vec::new();
    let mut reader = XmlReader::new(xml);

    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) if tag.name == "Relationship" => {
                if let (Some(id), Some(target)) = (tag.attr("Id"), tag.attr("Target")) {
                    rels.push((id.to_string(), target.to_string()));
                }
            },
            XmlEvent::EndDocument => break,
            _ => {},
        }
    }

    Ok(rels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

    fn sample_workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Data").unwrap();
        sheet.set_value(0, 0, "Name").unwrap();
        sheet.set_value(0, 1, "Age").unwrap();
        sheet.set_value(1, 0, "Alice").unwrap();
        sheet.set_value(1, 1, 30.0).unwrap();
        sheet.set_value(2, 0, "Bob").unwrap();
        sheet.set_value(2, 1, 25.0).unwrap();
        wb
    }

    #[test]
    fn test_package_parts_present() {
        let bytes = build_package(&sample_workbook()).unwrap();
        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();

        for name in [
            super::super::PART_CONTENT_TYPES,
            super::super::PART_ROOT_RELS,
            super::super::PART_WORKBOOK_RELS,
            super::super::PART_WORKBOOK,
            super::super::PART_STYLES,
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(zip.by_name(name).is_ok(), "missing part {name}");
        }
    }

    #[test]
    fn test_package_roundtrip_in_memory() {
        let bytes = build_package(&sample_workbook()).unwrap();
        let parsed = parse_package(&bytes).unwrap();

        assert_eq!(parsed.sheet_count(), 1);
        let sheet = parsed.sheet_by_name("Data").unwrap();
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.value(1, 1), Some(&CellValue::Number(30.0)));
        assert_eq!(sheet.value(2, 0), Some(&CellValue::Text("Bob".into())));
        assert!(sheet.value(3, 0).is_none());
    }

    #[test]
    fn test_empty_workbook_roundtrip() {
        let bytes = build_package(&Workbook::new()).unwrap();
        let parsed = parse_package(&bytes).unwrap();
        assert_eq!(parsed.sheet_count(), 0);
        assert_eq!(parsed.styles().len(), 1);
    }

    #[test]
    fn test_hidden_sheet_state_roundtrip() {
        let mut wb = sample_workbook();
        wb.add_sheet("Secrets").unwrap();
        wb.sheet_by_name_mut("Secrets").unwrap().set_hidden(true);

        let bytes = build_package(&wb).unwrap();
        let parsed = parse_package(&bytes).unwrap();
        assert!(!parsed.sheet_by_name("Data").unwrap().hidden());
        assert!(parsed.sheet_by_name("Secrets").unwrap().hidden());
    }

    #[test]
    fn test_missing_workbook_part_is_corrupt() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("hello.txt", zip_options()).unwrap();
        zip.write_all(b"hi").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(parse_package(&bytes), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_rels_resolution() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet9.xml"), "xl/worksheets/sheet9.xml");
    }

    #[test]
    fn test_save_and_reopen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xlsx");

        sample_workbook().save(&path).unwrap();
        let reopened = Workbook::open(&path).unwrap();

        let sheet = reopened.sheet_by_name("Data").unwrap();
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.value(1, 1), Some(&CellValue::Number(30.0)));
        assert_ne!(sheet.value(2, 0), Some(&CellValue::Text("Alice".into())));
        assert_eq!(sheet.value(2, 0), Some(&CellValue::Text("Bob".into())));
        assert!(sheet.value(3, 0).is_none());
    }

    #[test]
    fn test_formula_with_cached_value_survives_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formula.xlsx");

        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.set_value(0, 0, 10.0).unwrap();
        sheet.set_value(0, 1, 20.0).unwrap();
        sheet.set_value(0, 2, CellValue::formula("A1+B1")).unwrap();
        wb.save(&path).unwrap();

        let reopened = Workbook::open(&path).unwrap();
        match reopened.sheet(0).unwrap().value(0, 2).unwrap() {
            CellValue::Formula { expression, cached } => {
                assert_eq!(expression, "A1+B1");
                assert!(cached.is_empty());
            },
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.xlsx");

        let mut wb = Workbook::new();
        wb.add_sheet("S").unwrap().set_value(0, 0, "classified").unwrap();

        let mut options = EncryptionOptions::aes_256("testPassword123");
        options.spin_count = 2_000; // keep the test quick
        wb.save_with_encryption(&path, &options).unwrap();

        // the file on disk is a compound file, not a ZIP
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw[0], 0xD0);

        let reopened = Workbook::open_with_password(&path, "testPassword123").unwrap();
        assert_eq!(
            reopened.sheet(0).unwrap().value(0, 0),
            Some(&CellValue::Text("classified".into()))
        );

        assert!(matches!(
            Workbook::open_with_password(&path, "wrongpassword"),
            Err(Error::InvalidPassword)
        ));
        assert!(matches!(Workbook::open(&path), Err(Error::InvalidPassword)));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            Workbook::open("/definitely/not/here.xlsx"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_open_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.xlsx");
        std::fs::write(&path, b"this is not a workbook at all").unwrap();
        assert!(matches!(Workbook::open(&path), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_failed_save_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"existing").unwrap();

        // encryption with a zero spin count is rejected before any write
        let wb = sample_workbook();
        let mut options = EncryptionOptions::aes_256("pw");
        options.spin_count = 0;
        assert!(wb.save_with_encryption(&path, &options).is_err());

        assert_eq!(std::fs::read(&path).unwrap(), b"existing");
        // no leftover temp files
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path() != path)
            .collect();
        assert!(leftovers.is_empty(), "stray files: {leftovers:?}");
    }

    #[test]
    fn test_styles_survive_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styled.xlsx");

        let mut wb = Workbook::new();
        let mut style = crate::sheet::Style::default();
        style.font.bold = true;
        style.number_format = Some("0.00%".to_string());
        let style_id = wb.add_style(&style);
        let sheet = wb.add_sheet("S").unwrap();
        sheet.set_styled_value(0, 0, 0.42, style_id).unwrap();
        wb.save(&path).unwrap();

        let reopened = Workbook::open(&path).unwrap();
        let cell = reopened.sheet(0).unwrap().cell(0, 0).unwrap();
        let restored = reopened.style(cell.style).unwrap();
        assert!(restored.font.bold);
        assert_eq!(restored.number_format.as_deref(), Some("0.00%"));
    }
}
