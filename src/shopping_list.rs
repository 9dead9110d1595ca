use std::{collections::BTreeMap, str::FromStr};

use printpdf::{Mm, PdfDocument};

use crate::error::{AppError, AppResult};

pub const TITLE: &str = "Shopping list";
const EMPTY_LIST: &str = "Nothing to buy yet.";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 7.0;
const TITLE_SIZE: f32 = 16.0;
const FONT_SIZE: f32 = 12.0;
pub const LINES_PER_PAGE: usize = 35;

// Builtin PDF fonts only cover WinAnsi, ingredient names are mostly Cyrillic.
static FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// One ingredient row of one recipe in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl From<(String, String, i64)> for CartLine {
    fn from((name, measurement_unit, amount): (String, String, i64)) -> Self {
        Self {
            name,
            measurement_unit,
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

impl ShoppingItem {
    fn line(&self, position: usize) -> String {
        format!(
            "{position}. {} ({}) - {}",
            self.name, self.measurement_unit, self.total
        )
    }
}

/// Sums amounts per `(name, unit)` across all cart recipes, ordered by name then unit.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = CartLine>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals.entry((line.name, line.measurement_unit)).or_default() += line.amount;
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingItem {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShoppingListFormat {
    #[default]
    Text,
    Pdf,
}

impl FromStr for ShoppingListFormat {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ShoppingListFormat::Text),
            "pdf" => Ok(ShoppingListFormat::Pdf),
            other => Err(AppError::bad_request(format!(
                "Unsupported format '{other}', expected txt or pdf"
            ))),
        }
    }
}

impl ShoppingListFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ShoppingListFormat::Text => "text/plain; charset=utf-8",
            ShoppingListFormat::Pdf => "application/pdf",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ShoppingListFormat::Text => "shopping_list.txt",
            ShoppingListFormat::Pdf => "shopping_list.pdf",
        }
    }

    pub fn render(self, items: &[ShoppingItem]) -> AppResult<Vec<u8>> {
        match self {
            ShoppingListFormat::Text => Ok(render_text(items).into_bytes()),
            ShoppingListFormat::Pdf => render_pdf(items),
        }
    }
}

fn body_lines(items: &[ShoppingItem]) -> Vec<String> {
    if items.is_empty() {
        return vec![EMPTY_LIST.to_string()];
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| item.line(index + 1))
        .collect()
}

pub fn render_text(items: &[ShoppingItem]) -> String {
    let mut text = format!("{TITLE}\n\n");
    for line in body_lines(items) {
        text.push_str(&line);
        text.push('\n');
    }
    text
}

/// Splits `lines` into pages of at most `per_page` lines; always yields at least one page.
pub fn paginate<T>(lines: &[T], per_page: usize) -> Vec<&[T]> {
    if lines.is_empty() {
        return vec![lines];
    }
    lines.chunks(per_page.max(1)).collect()
}

pub fn render_pdf(items: &[ShoppingItem]) -> AppResult<Vec<u8>> {
    let lines = body_lines(items);
    let pages = paginate(&lines, LINES_PER_PAGE);

    let (doc, first_page, first_layer) =
        PdfDocument::new(TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
    let font = doc.add_external_font(FONT)?;

    for (number, page_lines) in pages.iter().enumerate() {
        let layer = if number == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Page {}", number + 1),
            );
            doc.get_page(page).get_layer(layer)
        };

        let mut y = PAGE_HEIGHT - MARGIN;
        layer.use_text(TITLE, TITLE_SIZE, Mm(MARGIN), Mm(y), &font);
        y -= LINE_HEIGHT * 2.0;

        for line in page_lines.iter() {
            layer.use_text(line.as_str(), FONT_SIZE, Mm(MARGIN), Mm(y), &font);
            y -= LINE_HEIGHT;
        }
    }

    Ok(doc.save_to_bytes()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, unit: &str, amount: i64) -> CartLine {
        CartLine {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    fn item(name: &str, unit: &str, total: i64) -> ShoppingItem {
        ShoppingItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total,
        }
    }

    #[test]
    fn sums_same_ingredient_across_recipes() {
        let items = aggregate(vec![
            line("flour", "g", 200),
            line("eggs", "pcs", 2),
            line("flour", "g", 100),
            line("eggs", "pcs", 3),
        ]);

        assert_eq!(items, vec![item("eggs", "pcs", 5), item("flour", "g", 300)]);
    }

    #[test]
    fn different_units_stay_apart() {
        let items = aggregate(vec![line("milk", "ml", 200), line("milk", "cup", 1)]);
        assert_eq!(items, vec![item("milk", "cup", 1), item("milk", "ml", 200)]);
    }

    #[test]
    fn text_has_title_and_numbered_lines() {
        let text = render_text(&[item("eggs", "pcs", 5), item("flour", "g", 300)]);
        assert_eq!(
            text,
            "Shopping list\n\n1. eggs (pcs) - 5\n2. flour (g) - 300\n"
        );
    }

    #[test]
    fn empty_cart_says_so() {
        assert_eq!(render_text(&[]), "Shopping list\n\nNothing to buy yet.\n");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("pdf".parse::<ShoppingListFormat>().unwrap(), ShoppingListFormat::Pdf);
        assert_eq!("TXT".parse::<ShoppingListFormat>().unwrap(), ShoppingListFormat::Text);
        assert!("docx".parse::<ShoppingListFormat>().is_err());
    }

    #[test]
    fn long_lists_span_several_pages() {
        let lines: Vec<usize> = (0..80).collect();
        let pages = paginate(&lines, LINES_PER_PAGE);

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), LINES_PER_PAGE);
        assert_eq!(pages[2].len(), 80 - 2 * LINES_PER_PAGE);
        assert_eq!(paginate::<usize>(&[], LINES_PER_PAGE).len(), 1);
    }

    #[test]
    fn pdf_output_is_a_pdf() {
        let items: Vec<ShoppingItem> = (0..50).map(|i| item(&format!("item {i}"), "g", i)).collect();
        let bytes = render_pdf(&items).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    // Glyph id the embedded font's ToUnicode map assigns to `ch`, as written in content streams.
    fn glyph_hex(pdf: &str, ch: char) -> String {
        let entry = format!("> <{:04x}>", ch as u32);
        let at = pdf.find(&entry).expect("character missing from the font map");
        pdf[at - 4..at].to_ascii_uppercase()
    }

    #[test]
    fn cyrillic_names_keep_their_glyphs() {
        let bytes = render_pdf(&[item("Мука", "г", 500)]).unwrap();
        let pdf = String::from_utf8_lossy(&bytes);

        assert!(!pdf.contains("/Helvetica"));
        let word: String = "Мука".chars().map(|ch| glyph_hex(&pdf, ch)).collect();
        assert!(pdf.contains(&word), "glyphs for 'Мука' not found in page content");
    }
}
