use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::{Error, Result};
use crate::export::{layout_text_boxes, TextBox};
use crate::models::Presentation;

/** \brief 頁面尺寸：10 × 5.625 吋（16:9），EMU 計。 */
const SLIDE_CX: i64 = 9_144_000;
const SLIDE_CY: i64 = 5_143_500;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

fn emu(inches: f64) -> i64 {
    (inches * 914_400.0).round() as i64
}

/**
 * \brief 把簡報快照組成 PPTX 封裝（OPC zip），一張投影片一個 part。
 */
pub fn render_pptx(presentation: &Presentation) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        let options = FileOptions::default();
        let n = presentation.slides.len();

        let mut put = |name: &str, body: String| -> Result<()> {
            zip.start_file(name, options)
                .map_err(|e| Error::Export(format!("pptx {}: {}", name, e)))?;
            zip.write_all(body.as_bytes())
                .map_err(|e| Error::Export(format!("pptx {}: {}", name, e)))?;
            Ok(())
        };

        put("[Content_Types].xml", content_types_xml(n))?;
        put("_rels/.rels", root_rels_xml())?;
        put("ppt/presentation.xml", presentation_xml(n))?;
        put("ppt/_rels/presentation.xml.rels", presentation_rels_xml(n))?;
        put("ppt/slideMasters/slideMaster1.xml", slide_master_xml())?;
        put(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            slide_master_rels_xml(),
        )?;
        put("ppt/slideLayouts/slideLayout1.xml", slide_layout_xml())?;
        put(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            slide_layout_rels_xml(),
        )?;
        put("ppt/theme/theme1.xml", theme_xml())?;
        for (i, slide) in presentation.slides.iter().enumerate() {
            put(
                &format!("ppt/slides/slide{}.xml", i + 1),
                slide_xml(slide),
            )?;
            put(
                &format!("ppt/slides/_rels/slide{}.xml.rels", i + 1),
                slide_rels_xml(),
            )?;
        }

        zip.finish()
            .map_err(|e| Error::Export(format!("pptx finish: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

fn content_types_xml(slide_count: usize) -> String {
    let mut overrides = String::new();
    for i in 1..=slide_count {
        overrides.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>",
            i
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
        <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
        <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
        <Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
        <Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
        <Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
        <Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>\
        {}\
        </Types>",
        overrides
    )
}

fn root_rels_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <Relationships xmlns=\"{}\">\
        <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"ppt/presentation.xml\"/>\
        </Relationships>",
        NS_REL
    )
}

fn presentation_xml(slide_count: usize) -> String {
    let mut slide_ids = String::new();
    for i in 0..slide_count {
        slide_ids.push_str(&format!(
            "<p:sldId id=\"{}\" r:id=\"rId{}\"/>",
            256 + i,
            i + 2
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <p:presentation xmlns:a=\"{a}\" xmlns:r=\"{r}\" xmlns:p=\"{p}\">\
        <p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
        <p:sldIdLst>{ids}</p:sldIdLst>\
        <p:sldSz cx=\"{cx}\" cy=\"{cy}\"/>\
        <p:notesSz cx=\"6858000\" cy=\"9144000\"/>\
        </p:presentation>",
        a = NS_A,
        r = NS_R,
        p = NS_P,
        ids = slide_ids,
        cx = SLIDE_CX,
        cy = SLIDE_CY
    )
}

fn presentation_rels_xml(slide_count: usize) -> String {
    let mut rels = String::from(
        "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>",
    );
    for i in 0..slide_count {
        rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{}.xml\"/>",
            i + 2,
            i + 1
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <Relationships xmlns=\"{}\">{}</Relationships>",
        NS_REL, rels
    )
}

fn empty_sp_tree() -> &'static str {
    "<p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree>"
}

fn slide_master_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <p:sldMaster xmlns:a=\"{a}\" xmlns:r=\"{r}\" xmlns:p=\"{p}\">\
        <p:cSld>{tree}</p:cSld>\
        <p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
        <p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/></p:sldLayoutIdLst>\
        </p:sldMaster>",
        a = NS_A,
        r = NS_R,
        p = NS_P,
        tree = empty_sp_tree()
    )
}

fn slide_master_rels_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <Relationships xmlns=\"{}\">\
        <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
        <Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme\" Target=\"../theme/theme1.xml\"/>\
        </Relationships>",
        NS_REL
    )
}

fn slide_layout_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <p:sldLayout xmlns:a=\"{a}\" xmlns:r=\"{r}\" xmlns:p=\"{p}\" type=\"blank\" preserve=\"1\">\
        <p:cSld name=\"Blank\">{tree}</p:cSld>\
        <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>\
        </p:sldLayout>",
        a = NS_A,
        r = NS_R,
        p = NS_P,
        tree = empty_sp_tree()
    )
}

fn slide_layout_rels_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <Relationships xmlns=\"{}\">\
        <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" Target=\"../slideMasters/slideMaster1.xml\"/>\
        </Relationships>",
        NS_REL
    )
}

fn theme_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <a:theme xmlns:a=\"{a}\" name=\"Office\">\
        <a:themeElements>\
        <a:clrScheme name=\"Office\">\
        <a:dk1><a:sysClr val=\"windowText\" lastClr=\"000000\"/></a:dk1>\
        <a:lt1><a:sysClr val=\"window\" lastClr=\"FFFFFF\"/></a:lt1>\
        <a:dk2><a:srgbClr val=\"44546A\"/></a:dk2>\
        <a:lt2><a:srgbClr val=\"E7E6E6\"/></a:lt2>\
        <a:accent1><a:srgbClr val=\"4472C4\"/></a:accent1>\
        <a:accent2><a:srgbClr val=\"ED7D31\"/></a:accent2>\
        <a:accent3><a:srgbClr val=\"A5A5A5\"/></a:accent3>\
        <a:accent4><a:srgbClr val=\"FFC000\"/></a:accent4>\
        <a:accent5><a:srgbClr val=\"5B9BD5\"/></a:accent5>\
        <a:accent6><a:srgbClr val=\"70AD47\"/></a:accent6>\
        <a:hlink><a:srgbClr val=\"0563C1\"/></a:hlink>\
        <a:folHlink><a:srgbClr val=\"954F72\"/></a:folHlink>\
        </a:clrScheme>\
        <a:fontScheme name=\"Office\">\
        <a:majorFont><a:latin typeface=\"Calibri Light\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:majorFont>\
        <a:minorFont><a:latin typeface=\"Calibri\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:minorFont>\
        </a:fontScheme>\
        <a:fmtScheme name=\"Office\">\
        <a:fillStyleLst>\
        <a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>\
        <a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>\
        <a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>\
        </a:fillStyleLst>\
        <a:lnStyleLst>\
        <a:ln w=\"6350\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>\
        <a:ln w=\"12700\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>\
        <a:ln w=\"19050\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>\
        </a:lnStyleLst>\
        <a:effectStyleLst>\
        <a:effectStyle><a:effectLst/></a:effectStyle>\
        <a:effectStyle><a:effectLst/></a:effectStyle>\
        <a:effectStyle><a:effectLst/></a:effectStyle>\
        </a:effectStyleLst>\
        <a:bgFillStyleLst>\
        <a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>\
        <a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>\
        <a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>\
        </a:bgFillStyleLst>\
        </a:fmtScheme>\
        </a:themeElements>\
        </a:theme>",
        a = NS_A
    )
}

fn slide_rels_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <Relationships xmlns=\"{}\">\
        <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
        </Relationships>",
        NS_REL
    )
}

fn slide_xml(slide: &crate::models::Slide) -> String {
    let mut shapes = String::new();
    for (i, text_box) in layout_text_boxes(slide).iter().enumerate() {
        shapes.push_str(&shape_xml(i as u32 + 2, text_box));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
        <p:sld xmlns:a=\"{a}\" xmlns:r=\"{r}\" xmlns:p=\"{p}\">\
        <p:cSld><p:spTree>\
        <p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
        <p:grpSpPr/>\
        {shapes}\
        </p:spTree></p:cSld>\
        <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>\
        </p:sld>",
        a = NS_A,
        r = NS_R,
        p = NS_P,
        shapes = shapes
    )
}

fn shape_xml(id: u32, text_box: &TextBox) -> String {
    let mut paragraphs = String::new();
    let align = if text_box.centered {
        " algn=\"ctr\""
    } else {
        ""
    };
    let bullet_markup = if text_box.bullet {
        "<a:buFont typeface=\"Arial\"/><a:buChar char=\"\u{2022}\"/>"
    } else {
        "<a:buNone/>"
    };
    let bold = if text_box.bold { " b=\"1\"" } else { "" };
    let fill = match text_box.color {
        Some(hex) => format!("<a:solidFill><a:srgbClr val=\"{}\"/></a:solidFill>", hex),
        None => String::new(),
    };
    for line in &text_box.lines {
        paragraphs.push_str(&format!(
            "<a:p><a:pPr{align}>{bullet}</a:pPr>\
            <a:r><a:rPr lang=\"en-US\" sz=\"{sz}\"{bold} dirty=\"0\">{fill}</a:rPr>\
            <a:t>{text}</a:t></a:r></a:p>",
            align = align,
            bullet = bullet_markup,
            sz = text_box.font_size * 100,
            bold = bold,
            fill = fill,
            text = escape(line)
        ));
    }
    format!(
        "<p:sp>\
        <p:nvSpPr><p:cNvPr id=\"{id}\" name=\"TextBox {id}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
        <p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>\
        <a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr>\
        <p:txBody><a:bodyPr wrap=\"square\"/><a:lstStyle/>{paragraphs}</p:txBody>\
        </p:sp>",
        id = id,
        x = emu(text_box.x),
        y = emu(text_box.y),
        cx = emu(text_box.w),
        cy = emu(text_box.h),
        paragraphs = paragraphs
    )
}
