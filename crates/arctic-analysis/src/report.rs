//! PDF export of assistant replies and analysis reports.
//!
//! Text is set in the built-in Helvetica face on A4 pages, wrapped to a fixed
//! column count. Chart images follow the text, one per page, each under its
//! title.

use std::io::{BufWriter, Write};

use printpdf::{
    image_crate, BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};

use arctic_core::config::ExportConfig;
use arctic_core::types::ExportedDocument;

use crate::charts::ChartArtifact;
use crate::error::AnalysisError;

pub const RESPONSE_PDF: &str = "response.pdf";
pub const RESULTS_PDF: &str = "results.pdf";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT: f32 = 10.0;
const TEXT_TOP: f32 = 282.0;
const TEXT_BOTTOM: f32 = 15.0;
const CHART_TITLE_Y: f32 = 285.0;
const CHART_TOP: f32 = 275.0;
const CHART_MAX_HEIGHT: f32 = 255.0;
const CHART_TITLE_SIZE: f32 = 14.0;

pub struct ReportExporter {
    wrap_columns: usize,
    font_size: f32,
    line_height_mm: f32,
    image_width_mm: f32,
}

impl ReportExporter {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            wrap_columns: config.wrap_columns.max(1),
            font_size: config.font_size,
            line_height_mm: config.line_height_mm,
            image_width_mm: config.image_width_mm,
        }
    }

    /// The latest assistant reply as `response.pdf`.
    pub fn response_pdf(&self, text: &str) -> Result<ExportedDocument, AnalysisError> {
        Ok(ExportedDocument {
            filename: RESPONSE_PDF.to_string(),
            bytes: self.render("Response", text, &[])?,
        })
    }

    /// An analysis narrative followed by its charts as `results.pdf`.
    pub fn results_pdf(
        &self,
        text: &str,
        charts: &[ChartArtifact],
    ) -> Result<ExportedDocument, AnalysisError> {
        Ok(ExportedDocument {
            filename: RESULTS_PDF.to_string(),
            bytes: self.render("Analysis Results", text, charts)?,
        })
    }

    pub fn render(
        &self,
        title: &str,
        text: &str,
        charts: &[ChartArtifact],
    ) -> Result<Vec<u8>, AnalysisError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

        let mut current = doc.get_page(page).get_layer(layer);
        let mut y = TEXT_TOP;
        for line in wrap_text(&to_latin1(text), self.wrap_columns) {
            if y < TEXT_BOTTOM {
                current = new_page(&doc);
                y = TEXT_TOP;
            }
            current.use_text(line, self.font_size, Mm(LEFT), Mm(y), &font);
            y -= self.line_height_mm;
        }

        for chart in charts {
            self.add_chart_page(&doc, chart, &bold)?;
        }

        let mut bytes = Vec::new();
        {
            let mut writer = BufWriter::new(&mut bytes);
            doc.save(&mut writer)?;
            writer.flush()?;
        }
        tracing::debug!(
            title,
            charts = charts.len(),
            size = bytes.len(),
            "PDF rendered"
        );
        Ok(bytes)
    }

    fn add_chart_page(
        &self,
        doc: &PdfDocumentReference,
        chart: &ChartArtifact,
        font: &IndirectFontRef,
    ) -> Result<(), AnalysisError> {
        let picture = image_crate::open(&chart.path).map_err(|e| {
            AnalysisError::Export(format!("cannot read chart {}: {}", chart.path.display(), e))
        })?;
        let rgb = picture.to_rgb8();
        let (width_px, height_px) = (rgb.width() as f32, rgb.height() as f32);
        let picture = image_crate::DynamicImage::ImageRgb8(rgb);

        let mut dpi = width_px * 25.4 / self.image_width_mm;
        let mut height_mm = height_px * 25.4 / dpi;
        if height_mm > CHART_MAX_HEIGHT {
            dpi = height_px * 25.4 / CHART_MAX_HEIGHT;
            height_mm = CHART_MAX_HEIGHT;
        }

        let layer = new_page(doc);
        layer.use_text(
            to_latin1(&chart.title),
            CHART_TITLE_SIZE,
            Mm(LEFT),
            Mm(CHART_TITLE_Y),
            font,
        );
        Image::from_dynamic_image(&picture).add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(LEFT)),
                translate_y: Some(Mm(CHART_TOP - height_mm)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        Ok(())
    }
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    doc.get_page(page).get_layer(layer)
}

/// Replace characters the built-in fonts cannot encode with `?`. Carriage
/// returns are dropped so CRLF text breaks lines like LF text.
pub fn to_latin1(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\r' => None,
            '\t' => Some(' '),
            c if (c as u32) < 0x20 && c != '\n' => Some('?'),
            c if (c as u32) <= 0xFF => Some(c),
            _ => Some('?'),
        })
        .collect()
}

/// Greedy word wrap at `max_chars`. Line breaks in the input are kept and
/// words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut len = 0;
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if len > 0 {
                    lines.push(std::mem::take(&mut line));
                    len = 0;
                }
                lines.push(word.drain(..max_chars).collect());
            }
            if word.is_empty() {
                continue;
            }
            if len > 0 && len + 1 + word.len() > max_chars {
                lines.push(std::mem::take(&mut line));
                len = 0;
            }
            if len > 0 {
                line.push(' ');
                len += 1;
            }
            len += word.len();
            line.extend(word);
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartKind, ChartRenderer};
    use crate::table::UploadedTable;
    use arctic_core::config::AnalysisConfig;

    fn exporter() -> ReportExporter {
        ReportExporter::from_config(&ExportConfig::default())
    }

    fn page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(
            wrap_text("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("xy abcdefgh", 4), vec!["xy", "abcd", "efgh"]);
        assert!(wrap_text("", 10).is_empty());
    }

    #[test]
    fn test_wrapped_lines_fit() {
        let text = "Snowflake separates storage from compute ".repeat(20);
        for line in wrap_text(&text, 90) {
            assert!(line.chars().count() <= 90);
        }
    }

    #[test]
    fn test_to_latin1() {
        assert_eq!(to_latin1("café naïve"), "café naïve");
        assert_eq!(to_latin1("snow ❄ flake"), "snow ? flake");
        assert_eq!(to_latin1("a\tb\nc"), "a b\nc");
        assert_eq!(to_latin1("a\u{7}b"), "a?b");
    }

    #[test]
    fn test_crlf_text_wraps_without_stray_marks() {
        let lines = wrap_text(&to_latin1("first line\r\nsecond line\r\n"), 90);
        assert_eq!(lines, vec!["first line", "second line"]);
    }

    #[test]
    fn test_response_pdf_single_page() {
        let doc = exporter().response_pdf("A short answer.").unwrap();
        assert_eq!(doc.filename, "response.pdf");
        assert!(doc.bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&doc.bytes), 1);
    }

    #[test]
    fn test_long_text_spills_onto_new_pages() {
        let text = (0..100)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let doc = exporter().response_pdf(&text).unwrap();
        assert_eq!(page_count(&doc.bytes), 3);
    }

    #[test]
    fn test_results_pdf_has_one_page_per_chart() {
        let dir = tempfile::tempdir().unwrap();
        let table = UploadedTable::from_csv(b"age,city\n30,Paris\n41,Rome\n").unwrap();
        let renderer = ChartRenderer::new(&AnalysisConfig {
            chart_width: 200,
            chart_height: 150,
            ..AnalysisConfig::default()
        });
        let charts = renderer.render_all(&table, dir.path()).unwrap();

        let doc = exporter().results_pdf("Ages vary.", &charts).unwrap();
        assert_eq!(doc.filename, "results.pdf");
        assert_eq!(page_count(&doc.bytes), 3);
    }

    #[test]
    fn test_missing_chart_is_export_error() {
        let chart = ChartArtifact {
            kind: ChartKind::Pie,
            title: "Pie Chart of x".into(),
            path: std::path::PathBuf::from("/nonexistent/pie_chart_x.png"),
        };
        let err = exporter().results_pdf("text", &[chart]).unwrap_err();
        assert!(matches!(err, AnalysisError::Export(_)));
    }
}
