//! Minimal PDF writer for leader reports: one built-in font, word-wrapped
//! paragraphs, automatic page breaks.

use std::fmt::Write as _;

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: u32 = 56;
const FONT_SIZE: u32 = 10;
const LEADING: u32 = 14;
const WRAP_COLUMNS: usize = 95;

/// A text-only document.
#[derive(Debug, Clone, Default)]
pub struct PdfDocument {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl PdfDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            paragraphs: Vec::new(),
        }
    }

    pub fn push_paragraph(&mut self, text: impl Into<String>) {
        self.paragraphs.push(text.into());
    }

    /// Lay out lines: title, blank line, then each paragraph wrapped and
    /// followed by a blank line.
    fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.title.clone(), String::new()];
        for paragraph in &self.paragraphs {
            lines.extend(wrap(paragraph, WRAP_COLUMNS));
            lines.push(String::new());
        }
        lines
    }

    pub fn render(&self) -> Vec<u8> {
        let lines_per_page = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;
        let lines = self.lines();
        let pages: Vec<&[String]> = lines.chunks(lines_per_page.max(1)).collect();

        // Object numbering: 1 catalog, 2 page tree, 3 font, then a
        // (page, content) pair per page.
        let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
        let mut objects: Vec<String> = Vec::with_capacity(3 + 2 * pages.len());
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ));
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

        for (i, page_lines) in pages.iter().enumerate() {
            let content = page_stream(page_lines);
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                page_ids[i] + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
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
        let xref_at = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = write!(out, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        );
        out.into_bytes()
    }
}

fn page_stream(lines: &[String]) -> String {
    let mut stream = format!(
        "BT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
        FONT_SIZE,
        LEADING,
        MARGIN,
        PAGE_HEIGHT - MARGIN
    );
    for line in lines {
        let _ = writeln!(stream, "({}) Tj T*", escape(line));
    }
    stream.push_str("ET");
    stream
}

/// Escape PDF string delimiters and drop anything outside printable ASCII,
/// which the standard Helvetica encoding cannot show.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Greedy word wrap at `width` characters; overlong words are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let split: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            lines.push(split);
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_structure() {
        let mut doc = PdfDocument::new("Team report (October)");
        doc.push_paragraph("Ana: 75% of tasks completed");
        let bytes = doc.render();
        let text = String::from_utf8(bytes).expect("ascii output");
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("(Team report \\(October\\)) Tj"));
        assert!(text.contains("/Count 1"));

        // The startxref offset points at the xref table.
        let start = text.rfind("startxref\n").expect("startxref") + "startxref\n".len();
        let offset: usize = text[start..].lines().next().expect("offset").parse().expect("number");
        assert!(text[offset..].starts_with("xref"));
    }

    #[test]
    fn test_many_paragraphs_paginate() {
        let mut doc = PdfDocument::new("Long");
        for i in 0..120 {
            doc.push_paragraph(format!("Paragraph {}", i));
        }
        let text = String::from_utf8(doc.render()).expect("ascii output");
        assert!(!text.contains("/Count 1 "));
        assert!(text.matches("/Type /Page ").count() > 1);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("a bb ccc", 4), vec!["a bb", "ccc"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("", 10), vec![String::new()]);
    }
}
