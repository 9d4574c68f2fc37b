use crate::services::commerce::order_materializer::MaterializedLine;
use rust_decimal::Decimal;
use std::fmt::Write as _;

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MAX_PDF_LINES: usize = 48;

/// A rendered purchase receipt.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub subject: String,
    pub text: String,
    pub pdf: Vec<u8>,
}

impl Receipt {
    pub fn attachment_name(&self, order_id: i32) -> String {
        format!("receipt-{}.pdf", order_id)
    }
}

/// Renders the plain-text body and a one-page PDF copy of it.
pub fn render_receipt(
    order_id: i32,
    customer_name: &str,
    total: Decimal,
    lines: &[MaterializedLine],
) -> Receipt {
    let body = receipt_lines(order_id, customer_name, total, lines);
    Receipt {
        subject: format!("Your order #{}", order_id),
        text: body.join("\n"),
        pdf: render_pdf(&body),
    }
}

fn receipt_lines(
    order_id: i32,
    customer_name: &str,
    total: Decimal,
    lines: &[MaterializedLine],
) -> Vec<String> {
    let mut out = vec![
        format!("Hello {},", customer_name),
        String::new(),
        format!("Thank you for your purchase. Order #{} has been paid.", order_id),
        String::new(),
    ];
    for line in lines {
        out.push(format!(
            "{} x {} @ {:.2} = {:.2}",
            line.quantity, line.name, line.unit_price, line.subtotal
        ));
    }
    out.push(String::new());
    out.push(format!("Total: {:.2}", total));
    out
}

/// Minimal PDF 1.4 writer: one page, Helvetica, ASCII text.
fn render_pdf(text_lines: &[String]) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 11 Tf\n14 TL\n50 750 Td\n");
    for (i, line) in text_lines.iter().enumerate() {
        if i == MAX_PDF_LINES {
            content.push_str("(...) Tj T*\n");
            break;
        }
        let _ = writeln!(content, "({}) Tj T*", pdf_escape(line));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        let _ = write!(pdf, "{} 0 obj\n{}\nendobj\n", i + 1, object);
    }

    let xref_at = pdf.len();
    let _ = write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(pdf, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );
    pdf.into_bytes()
}

fn pdf_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
