//! Hand-assembled PDFs for unit tests.
//!
//! One Helvetica font, one content stream per page, each input line drawn
//! in its own text object. Cross-reference offsets and stream lengths are
//! computed from the bytes written.

struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        Self {
            out: b"%PDF-1.4\n".to_vec(),
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, body: &str) {
        let number = self.offsets.len() + 1;
        self.offsets.push(self.out.len());
        self.out
            .extend_from_slice(format!("{} 0 obj {} endobj\n", number, body).as_bytes());
    }

    fn stream(&mut self, content: &str) {
        self.object(&format!(
            "<< /Length {} >> stream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    fn finish(mut self, extra_trailer: &str) -> Vec<u8> {
        let xref_start = self.out.len();
        let count = self.offsets.len() + 1;
        self.out
            .extend_from_slice(format!("xref\n0 {}\n", count).as_bytes());
        self.out
            .extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in &self.offsets {
            self.out
                .extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        self.out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R {}>>\nstartxref\n{}\n%%EOF\n",
                count, extra_trailer, xref_start
            )
            .as_bytes(),
        );
        self.out
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

fn page_content(text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "BT /F1 12 Tf 72 {} Td ({}) Tj ET",
                720 - 14 * i as i64,
                escape(line)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build(pages: &[&str], extra_trailer: &str, encrypt_dict: bool) -> Vec<u8> {
    let mut w = PdfWriter::new();
    let n = pages.len();
    // 1 catalog, 2 pages, 3 font, then (page, contents) pairs.
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    w.object("<< /Type /Catalog /Pages 2 0 R >>");
    w.object(&format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    w.object("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>");
    for (i, text) in pages.iter().enumerate() {
        w.object(&format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
            5 + 2 * i
        ));
        w.stream(&page_content(text));
    }
    if encrypt_dict {
        w.object("<< /Filter /Standard /V 1 /R 2 /O (0123456789abcdef0123456789abcdef) /U (fedcba9876543210fedcba9876543210) /P -44 >>");
    }
    w.finish(extra_trailer)
}

/// A PDF with one page per entry; lines within an entry become separate text lines.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    build(pages, "", false)
}

/// A PDF whose trailer declares standard-security-handler encryption.
pub fn encrypted_pdf(text: &str) -> Vec<u8> {
    let encrypt_obj = 4 + 2;
    build(
        &[text],
        &format!(
            "/Encrypt {} 0 R /ID [<0123456789abcdef0123456789abcdef> <0123456789abcdef0123456789abcdef>] ",
            encrypt_obj
        ),
        true,
    )
}

/// A structurally valid PDF with an empty page tree.
pub fn pdf_without_pages() -> Vec<u8> {
    build(&[], "", false)
}
