use crate::error::IngestError;
use crate::models::{PageContent, Table};
use lopdf::Document;
use regex::Regex;
use std::path::Path;

/// Cells inside a plain-text table row are separated by tabs or runs of
/// two or more spaces.
const CELL_SEPARATOR: &str = r"\t+| {2,}";

pub trait PdfExtractor: Send + Sync {
    /// Every page of the document, 1-indexed and in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, IngestError>;
}

/// Text extraction through `lopdf`, with tables recovered from the text
/// layout of each page.
#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;
        let separator = Regex::new(CELL_SEPARATOR)?;

        let mut pages = Vec::new();
        for page_no in document.get_pages().into_keys() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;
            let tables = detect_tables(&text, &separator);

            pages.push(PageContent {
                number: page_no,
                text,
                tables,
            });
        }

        Ok(pages)
    }
}

/// Groups runs of two or more consecutive multi-cell lines into tables.
pub fn detect_tables(text: &str, separator: &Regex) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<Option<String>>> = Vec::new();

    for line in text.lines() {
        match split_cells(line, separator) {
            Some(cells) if is_rule_row(&cells) => {}
            Some(cells) => current.push(cells),
            None => flush_table(&mut current, &mut tables),
        }
    }
    flush_table(&mut current, &mut tables);

    tables
}

fn flush_table(current: &mut Vec<Vec<Option<String>>>, tables: &mut Vec<Table>) {
    if current.len() >= 2 {
        tables.push(Table {
            rows: std::mem::take(current),
        });
    } else {
        current.clear();
    }
}

fn split_cells(line: &str, separator: &Regex) -> Option<Vec<Option<String>>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cells: Vec<Option<String>> =
        if trimmed.len() > 1 && trimmed.starts_with('|') && trimmed.ends_with('|') {
            trimmed[1..trimmed.len() - 1]
                .split('|')
                .map(|cell| {
                    let cell = cell.trim();
                    (!cell.is_empty()).then(|| cell.to_string())
                })
                .collect()
        } else {
            separator
                .split(trimmed)
                .map(|cell| Some(cell.trim().to_string()))
                .collect()
        };

    (cells.len() >= 2).then_some(cells)
}

/// Markdown-style `|---|:--:|` separators carry no data.
fn is_rule_row(cells: &[Option<String>]) -> bool {
    cells.iter().all(|cell| {
        cell.as_deref()
            .is_some_and(|value| value.chars().all(|ch| matches!(ch, '-' | ':' | '=')))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_text_pdf;

    fn separator() -> Regex {
        Regex::new(CELL_SEPARATOR).expect("separator regex compiles")
    }

    #[test]
    fn prose_has_no_tables() {
        let tables = detect_tables("Alpha Beta Gamma\nand a second line", &separator());
        assert!(tables.is_empty());
    }

    #[test]
    fn aligned_columns_become_a_table() {
        let text = "Intro line\nPart   Qty\tPrice\nBolt   4\t0.10\nNut    10\t0.05\nClosing words";
        let tables = detect_tables(text, &separator());

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].to_csv(), "Part,Qty,Price\nBolt,4,0.10\nNut,10,0.05");
    }

    #[test]
    fn pipe_tables_keep_empty_cells_as_null() {
        let text = "| a | b | c |\n|---|---|---|\n| 1 |   | 3 |";
        let tables = detect_tables(text, &separator());

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[1], vec![Some("1".to_string()), None, Some("3".to_string())]);
        assert_eq!(tables[0].to_csv(), "a,b,c\n1,,3");
    }

    #[test]
    fn single_multi_cell_line_is_not_a_table() {
        let tables = detect_tables("Name   Value\nplain prose follows", &separator());
        assert!(tables.is_empty());
    }

    #[test]
    fn lopdf_reads_generated_pages_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("two-pages.pdf");
        write_text_pdf(&path, &["First page words", "Second page words"])?;

        let pages = LopdfExtractor.extract_pages(&path)?;
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[1].number, 2);
        assert!(pages[0].text.contains("First page words"));
        assert!(pages[1].text.contains("Second page words"));
        Ok(())
    }

    #[test]
    fn garbage_bytes_fail_to_parse() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf")?;

        let result = LopdfExtractor.extract_pages(&path);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        Ok(())
    }
}
