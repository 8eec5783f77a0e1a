//! Minimal text-only PDF 1.4 writer: US Letter pages, the three built-in
//! Helvetica faces, top-down line layout with automatic page breaks.
//! Output depends only on the calls made, never on the clock.

use std::fmt::Write;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN_LEFT: f32 = 54.0;
const MARGIN_TOP: f32 = 36.0;
const MARGIN_BOTTOM: f32 = 54.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }
}

pub struct PdfWriter {
    title: String,
    pages: Vec<String>,
    current: String,
    y: f32,
}

/// WinAnsiEncoding code for `ch`, if the standard fonts can show it.
fn win_ansi(ch: char) -> Option<u8> {
    let code = match ch {
        ' '..='~' | '\u{a0}'..='\u{ff}' => ch as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// Escapes a PDF string literal. Bytes above ASCII are written as octal
/// escapes; characters WinAnsi cannot show become `?`.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match (ch, win_ansi(ch)) {
            ('\\', _) => out.push_str("\\\\"),
            ('(', _) => out.push_str("\\("),
            (')', _) => out.push_str("\\)"),
            (_, Some(code)) if code.is_ascii() => out.push(ch),
            (_, Some(code)) => {
                let _ = write!(out, "\\{code:03o}");
            }
            (_, None) => out.push('?'),
        }
    }
    out
}

impl PdfWriter {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pages: Vec::new(),
            current: String::new(),
            y: PAGE_HEIGHT - MARGIN_TOP,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + usize::from(!self.current.is_empty())
    }

    fn break_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.y = PAGE_HEIGHT - MARGIN_TOP;
    }

    /// Moves down one line of `size` points, starting a new page if needed.
    fn advance(&mut self, size: f32) -> f32 {
        let leading = size * 1.4;
        if self.y - leading < MARGIN_BOTTOM && !self.current.is_empty() {
            self.break_page();
        }
        self.y -= leading;
        self.y
    }

    fn place(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        let _ = writeln!(
            self.current,
            "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            size,
            x,
            y,
            escape(text)
        );
    }

    pub fn line(&mut self, font: Font, size: f32, text: &str) {
        let y = self.advance(size);
        self.place(font, size, MARGIN_LEFT, y, text);
    }

    /// Horizontally centred line, width estimated from an average glyph width.
    pub fn centered(&mut self, font: Font, size: f32, text: &str) {
        let y = self.advance(size);
        let estimated = text.chars().count() as f32 * size * 0.5;
        let x = ((PAGE_WIDTH - estimated) / 2.0).max(MARGIN_LEFT);
        self.place(font, size, x, y, text);
    }

    /// One table row; cell `i` starts at the sum of the preceding widths.
    pub fn row(&mut self, font: Font, size: f32, cells: &[String], widths: &[f32]) {
        let y = self.advance(size);
        let mut x = MARGIN_LEFT;
        for (cell, width) in cells.iter().zip(widths) {
            self.place(font, size, x, y, cell);
            x += width;
        }
    }

    pub fn gap(&mut self, points: f32) {
        self.y -= points;
        if self.y < MARGIN_BOTTOM {
            if self.current.is_empty() {
                self.y = PAGE_HEIGHT - MARGIN_TOP;
            } else {
                self.break_page();
            }
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.break_page();
        }

        let page_count = self.pages.len();
        let first_page_id = 7;
        let mut objects: Vec<String> = Vec::with_capacity(6 + page_count * 2);

        let kids = (0..page_count)
            .map(|i| format!("{} 0 R", first_page_id + i * 2))
            .collect::<Vec<_>>()
            .join(" ");

        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        objects.push(format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"));
        for base in ["Helvetica", "Helvetica-Bold", "Helvetica-Oblique"] {
            objects.push(format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{base} /Encoding /WinAnsiEncoding >>"
            ));
        }
        objects.push(format!(
            "<< /Title ({}) /Producer (academy-tracker) >>",
            escape(&self.title)
        ));

        for (i, content) in self.pages.iter().enumerate() {
            let content_id = first_page_id + i * 2 + 1;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH:.0} {PAGE_HEIGHT:.0}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R /F3 5 0 R >> >> \
                 /Contents {content_id} 0 R >>"
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
        }

        let xref_offset = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(out, "{offset:010} 00000 n ");
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R /Info 6 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            objects.len() + 1
        );
        out.into_bytes()
    }
}
