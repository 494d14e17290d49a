//! Top-down flow layout on US Letter pages: paragraphs, spacers and simple tables,
//! continuing on a fresh page when the content runs past the bottom margin.

use super::metrics::{text_width, wrap, Font};

pub const INCH: f32 = 72.0;
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const MARGIN_X: f32 = 0.7 * INCH;
pub const MARGIN_Y: f32 = 0.5 * INCH;
pub const FRAME_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN_X;
const FRAME_TOP: f32 = PAGE_HEIGHT - MARGIN_Y;
const FRAME_HEIGHT: f32 = FRAME_TOP - MARGIN_Y;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub font: Font,
    pub size: f32,
    pub leading: f32,
    pub align: Align,
    pub space_before: f32,
    pub space_after: f32,
}

impl TextStyle {
    pub const fn new(font: Font, size: f32, leading: f32, align: Align) -> Self {
        TextStyle {
            font,
            size,
            leading,
            align,
            space_before: 0.0,
            space_after: 0.0,
        }
    }

    pub const fn spacing(self, before: f32, after: f32) -> Self {
        TextStyle {
            space_before: before,
            space_after: after,
            ..self
        }
    }
}

/// Something drawn on a page, in PDF user space (origin bottom-left).
#[derive(Clone, Debug, PartialEq)]
pub enum Mark {
    Text {
        x: f32,
        y: f32,
        font: Font,
        size: f32,
        text: String,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        /// 0 is black, 1 white.
        gray: f32,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub marks: Vec<Mark>,
}

impl Page {
    /// All text on the page, one entry per drawn line.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.marks.iter().filter_map(|m| match m {
            Mark::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Empty,
    /// Wrapped to the column width; `\n` forces a break.
    Text(String, TextStyle),
    Image { width: f32, height: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Padding {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for Padding {
    fn default() -> Self {
        Padding {
            left: 6.0,
            right: 6.0,
            top: 3.0,
            bottom: 3.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub col_widths: Vec<f32>,
    pub rows: Vec<Vec<Cell>>,
    pub padding: Padding,
    /// Inner grid line width and gray level.
    pub grid: Option<(f32, f32)>,
    /// Black outer border width.
    pub border: Option<f32>,
}

impl Table {
    pub fn new(col_widths: Vec<f32>, rows: Vec<Vec<Cell>>) -> Self {
        Table {
            col_widths,
            rows,
            padding: Padding::default(),
            grid: None,
            border: None,
        }
    }

    pub fn width(&self) -> f32 {
        self.col_widths.iter().sum()
    }

    fn cell_lines(&self, cell: &Cell, col: usize) -> Vec<String> {
        match cell {
            Cell::Text(text, style) => {
                let inner = self.col_widths[col] - self.padding.left - self.padding.right;
                wrap(style.font, style.size, text, inner)
            }
            _ => Vec::new(),
        }
    }

    fn cell_height(&self, cell: &Cell, col: usize) -> f32 {
        match cell {
            Cell::Empty => 0.0,
            Cell::Text(_, style) => self.cell_lines(cell, col).len() as f32 * style.leading,
            Cell::Image { height, .. } => *height,
        }
    }

    fn row_height(&self, row: &[Cell]) -> f32 {
        let content = row
            .iter()
            .enumerate()
            .map(|(col, cell)| self.cell_height(cell, col))
            .fold(0.0, f32::max);
        self.padding.top + content + self.padding.bottom
    }
}

/// Baseline sits one font size below the top of the line box.
fn baseline(top: f32, size: f32) -> f32 {
    top - size
}

fn aligned_x(left: f32, width: f32, line_width: f32, align: Align) -> f32 {
    match align {
        Align::Left => left,
        Align::Center => left + (width - line_width) / 2.0,
        Align::Right => left + width - line_width,
    }
}

pub struct Layout {
    pages: Vec<Page>,
    y: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Layout {
            pages: vec![Page::default()],
            y: FRAME_TOP,
        }
    }

    pub fn cursor(&self) -> f32 {
        self.y
    }

    fn at_top(&self) -> bool {
        self.y >= FRAME_TOP
    }

    fn available(&self) -> f32 {
        self.y - MARGIN_Y
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = FRAME_TOP;
    }

    /// Start a new page unless `height` still fits (or the page is already empty).
    fn ensure(&mut self, height: f32) {
        if height > self.available() && !self.at_top() {
            self.new_page();
        }
    }

    fn mark(&mut self, mark: Mark) {
        if let Some(page) = self.pages.last_mut() {
            page.marks.push(mark);
        }
    }

    fn text_line(&mut self, left: f32, width: f32, top: f32, line: &str, style: &TextStyle) {
        if line.is_empty() {
            return;
        }
        let line_width = text_width(style.font, style.size, line);
        self.mark(Mark::Text {
            x: aligned_x(left, width, line_width, style.align),
            y: baseline(top, style.size),
            font: style.font,
            size: style.size,
            text: line.to_string(),
        });
    }

    pub fn spacer(&mut self, height: f32) {
        if height > self.available() {
            self.new_page();
        } else {
            self.y -= height;
        }
    }

    /// Full-width paragraph; splits across pages line by line.
    pub fn paragraph(&mut self, text: &str, style: &TextStyle) {
        if !self.at_top() {
            self.spacer(style.space_before);
        }
        for line in wrap(style.font, style.size, text, FRAME_WIDTH) {
            self.ensure(style.leading);
            let top = self.y;
            self.text_line(MARGIN_X, FRAME_WIDTH, top, &line, style);
            self.y -= style.leading;
        }
        if style.space_after > 0.0 {
            self.spacer(style.space_after);
        }
    }

    /// Table centred in the frame. It breaks between rows; a row taller than a whole page
    /// is cut at a line boundary and continued on the next one.
    pub fn table(&mut self, table: &Table) {
        let x0 = MARGIN_X + (FRAME_WIDTH - table.width()) / 2.0;
        let mut segment_top = self.y;
        for row in &table.rows {
            let height = table.row_height(row);
            if height > self.available() && !self.at_top() && height <= FRAME_HEIGHT {
                self.border(table, x0, segment_top);
                self.new_page();
                segment_top = self.y;
            }
            let lines: Vec<Vec<String>> = row
                .iter()
                .enumerate()
                .map(|(col, cell)| table.cell_lines(cell, col))
                .collect();
            if height <= self.available() {
                self.row_slice(table, x0, row, &lines, true, height);
            } else {
                self.split_row(table, x0, row, lines, &mut segment_top);
            }
        }
        self.border(table, x0, segment_top);
    }

    fn split_row(&mut self, table: &Table, x0: f32, row: &[Cell], mut remaining: Vec<Vec<String>>, segment_top: &mut f32) {
        let padding = table.padding.top + table.padding.bottom;
        let mut first = true;
        loop {
            let room = self.available() - padding;
            let slice: Vec<Vec<String>> = row
                .iter()
                .zip(remaining.iter_mut())
                .map(|(cell, left)| match cell {
                    Cell::Text(_, style) => {
                        let fits = (room / style.leading).floor().max(0.0) as usize;
                        left.drain(..fits.min(left.len())).collect()
                    }
                    _ => Vec::new(),
                })
                .collect();
            let drawn = slice.iter().any(|l| !l.is_empty());
            if drawn || self.at_top() {
                let content = row
                    .iter()
                    .zip(&slice)
                    .map(|(cell, part)| match cell {
                        Cell::Text(_, style) => part.len() as f32 * style.leading,
                        Cell::Image { height, .. } if first => *height,
                        _ => 0.0,
                    })
                    .fold(0.0, f32::max);
                self.row_slice(table, x0, row, &slice, first, padding + content);
                first = false;
            }
            if remaining.iter().all(Vec::is_empty) {
                return;
            }
            self.border(table, x0, *segment_top);
            self.new_page();
            *segment_top = self.y;
        }
    }

    /// Draw `lines` of each cell (and images when `images` is set) in a box `height` tall.
    fn row_slice(&mut self, table: &Table, x0: f32, row: &[Cell], lines: &[Vec<String>], images: bool, height: f32) {
        let top = self.y;
        let mut x = x0;
        for (col, cell) in row.iter().enumerate() {
            let width = table.col_widths[col];
            let left = x + table.padding.left;
            let inner = width - table.padding.left - table.padding.right;
            match cell {
                Cell::Empty => {}
                Cell::Text(_, style) => {
                    let mut line_top = top - table.padding.top;
                    for line in &lines[col] {
                        self.text_line(left, inner, line_top, line, style);
                        line_top -= style.leading;
                    }
                }
                Cell::Image { width: w, height: h } => {
                    if images {
                        self.mark(Mark::Image {
                            x: left,
                            y: top - table.padding.top - h,
                            width: *w,
                            height: *h,
                        });
                    }
                }
            }
            if let Some((line_width, gray)) = table.grid {
                let bottom = top - height;
                for (from, to) in [
                    ((x, top), (x + width, top)),
                    ((x, bottom), (x + width, bottom)),
                    ((x, top), (x, bottom)),
                    ((x + width, top), (x + width, bottom)),
                ] {
                    self.mark(Mark::Line { from, to, width: line_width, gray });
                }
            }
            x += width;
        }
        self.y -= height;
    }

    fn border(&mut self, table: &Table, x0: f32, top: f32) {
        let Some(width) = table.border else { return };
        let (x1, bottom) = (x0 + table.width(), self.y);
        if bottom >= top {
            return;
        }
        for (from, to) in [
            ((x0, top), (x1, top)),
            ((x0, bottom), (x1, bottom)),
            ((x0, top), (x0, bottom)),
            ((x1, top), (x1, bottom)),
        ] {
            self.mark(Mark::Line { from, to, width, gray: 0.0 });
        }
    }

    pub fn finish(self) -> Vec<Page> {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: TextStyle = TextStyle::new(Font::Regular, 10.0, 12.0, Align::Left);

    #[test]
    fn frame_matches_letter_margins() {
        assert!((MARGIN_X - 50.4).abs() < 1e-4);
        assert!((FRAME_WIDTH - 511.2).abs() < 1e-3);
        assert_eq!(Layout::new().cursor(), 756.0);
    }

    #[test]
    fn paragraphs_flow_onto_new_pages() {
        let mut layout = Layout::new();
        for i in 0..80 {
            layout.paragraph(&format!("linea {}", i), &BODY);
        }
        let pages = layout.finish();
        assert_eq!(pages.len(), 2);
        let first_y = pages[1].marks.iter().find_map(|m| match m {
            Mark::Text { y, .. } => Some(*y),
            _ => None,
        });
        assert_eq!(first_y, Some(746.0));
        let all: Vec<_> = pages.iter().flat_map(|p| p.texts()).collect();
        assert_eq!(all.len(), 80);
        assert_eq!(all[79], "linea 79");
    }

    #[test]
    fn centred_and_right_aligned_text() {
        let mut layout = Layout::new();
        let centred = TextStyle::new(Font::Bold, 18.0, 22.0, Align::Center);
        layout.paragraph("Titulo", &centred);
        let pages = layout.finish();
        match &pages[0].marks[0] {
            Mark::Text { x, .. } => {
                let w = text_width(Font::Bold, 18.0, "Titulo");
                assert!((x - (MARGIN_X + (FRAME_WIDTH - w) / 2.0)).abs() < 1e-3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!((aligned_x(10.0, 100.0, 30.0, Align::Right) - 80.0).abs() < 1e-4);
    }

    #[test]
    fn table_rows_grow_with_wrapped_cells() {
        let long = "palabra ".repeat(20);
        let table = Table::new(
            vec![100.0, 100.0],
            vec![vec![Cell::Text("corto".into(), BODY), Cell::Text(long, BODY)]],
        );
        let row_height = table.row_height(&table.rows[0]);
        assert!(row_height > 3.0 + 12.0 * 3.0);

        let mut layout = Layout::new();
        layout.table(&table);
        assert!((layout.cursor() - (756.0 - row_height)).abs() < 1e-3);
    }

    #[test]
    fn oversized_rows_continue_on_the_next_page() {
        let long = "dolor ".repeat(3000);
        let mut table = Table::new(
            vec![100.0, 300.0],
            vec![
                vec![Cell::Text("Diagnóstico:".into(), BODY), Cell::Text(long, BODY)],
                vec![Cell::Text("Fin".into(), BODY), Cell::Empty],
            ],
        );
        table.border = Some(1.0);
        let mut layout = Layout::new();
        layout.paragraph("Encabezado", &BODY);
        layout.table(&table);
        let pages = layout.finish();
        assert!(pages.len() > 2);

        for page in &pages {
            for mark in &page.marks {
                if let Mark::Text { y, .. } = mark {
                    assert!(*y >= MARGIN_Y, "text drawn below the margin at {}", y);
                }
            }
        }
        let words: usize = pages
            .iter()
            .flat_map(|p| p.texts())
            .map(|t| t.matches("dolor").count())
            .sum();
        assert_eq!(words, 3000);
        // the label is drawn once, at the start of the row
        let labels = pages.iter().flat_map(|p| p.texts()).filter(|t| *t == "Diagnóstico:").count();
        assert_eq!(labels, 1);
        assert!(pages.last().unwrap().texts().any(|t| t == "Fin"));
    }

    #[test]
    fn grid_and_border_are_drawn() {
        let mut table = Table::new(vec![50.0, 50.0], vec![vec![Cell::Empty, Cell::Empty]]);
        table.grid = Some((0.5, 0.5));
        table.border = Some(1.0);
        let mut layout = Layout::new();
        layout.table(&table);
        let pages = layout.finish();
        let lines = pages[0].marks.iter().filter(|m| matches!(m, Mark::Line { .. })).count();
        assert_eq!(lines, 8 + 4);
    }
}
