//! Rasterizes a laid-out tree into terminal lines.
//!
//! Lines are never soft-wrapped: anything wider than its clip rect is cut
//! and marked with an ellipsis. Styles nest, and SGR sequences are emitted
//! only where the effective style changes.

use crate::ansi::{grapheme_width, strip_ansi, truncate_to_width, TAB_WIDTH};
use crate::layout::{LaidOutNode, LayoutContent, Rect};
use crate::style::{apply_style, Style};
use unicode_segmentation::UnicodeSegmentation;

pub fn render_lines(root: &LaidOutNode) -> Vec<String> {
    let mut canvas = Canvas::new(root.rect.width, root.rect.height);
    draw(&mut canvas, root, root.rect, Style::default());
    canvas.into_lines()
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Blank,
    Glyph { symbol: String, style: Style },
    Continuation,
}

struct Canvas {
    rows: Vec<Vec<Cell>>,
}

impl Canvas {
    fn new(width: u16, height: u16) -> Self {
        Self {
            rows: vec![vec![Cell::Blank; usize::from(width)]; usize::from(height)],
        }
    }

    fn put(&mut self, x: u16, y: u16, symbol: &str, width: u16, style: Style) {
        let Some(row) = self.rows.get_mut(usize::from(y)) else {
            return;
        };
        let xi = usize::from(x);
        if xi >= row.len() {
            return;
        }

        // Overwriting half of a wide glyph blanks the other half.
        if row[xi] == Cell::Continuation && xi > 0 {
            row[xi - 1] = blank_glyph();
        }
        if width == 1 && row.get(xi + 1) == Some(&Cell::Continuation) {
            row[xi + 1] = blank_glyph();
        }

        row[xi] = Cell::Glyph {
            symbol: symbol.to_string(),
            style,
        };
        if width == 2 && xi + 1 < row.len() {
            row[xi + 1] = Cell::Continuation;
        }
    }

    /// Attaches a zero-width grapheme (combining mark) to the cell before `x`.
    fn attach(&mut self, x: u16, y: u16, grapheme: &str) {
        let Some(row) = self.rows.get_mut(usize::from(y)) else {
            return;
        };
        let mut idx = usize::from(x);
        while idx > 0 {
            idx -= 1;
            if let Cell::Glyph { symbol, .. } = &mut row[idx] {
                symbol.push_str(grapheme);
                return;
            }
            if row[idx] == Cell::Blank {
                return;
            }
        }
    }

    fn fill(&mut self, area: Rect, style: Style) {
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.put(x, y, " ", 1, style);
            }
        }
    }

    fn into_lines(self) -> Vec<String> {
        self.rows.iter().map(|row| row_to_line(row)).collect()
    }
}

fn blank_glyph() -> Cell {
    Cell::Glyph {
        symbol: " ".to_string(),
        style: Style::default(),
    }
}

fn row_to_line(row: &[Cell]) -> String {
    let Some(last) = row.iter().rposition(|c| *c != Cell::Blank) else {
        return String::new();
    };

    let mut line = String::new();
    let mut run = String::new();
    let mut run_style = Style::default();

    for cell in &row[..=last] {
        let (symbol, style) = match cell {
            Cell::Blank => (" ", Style::default()),
            Cell::Glyph { symbol, style } => (symbol.as_str(), style.normalized()),
            Cell::Continuation => continue,
        };
        if style != run_style {
            flush_run(&mut line, &mut run, &run_style);
            run_style = style;
        }
        run.push_str(symbol);
    }
    flush_run(&mut line, &mut run, &run_style);
    line
}

fn flush_run(line: &mut String, run: &mut String, style: &Style) {
    if !run.is_empty() {
        line.push_str(&apply_style(run, style));
        run.clear();
    }
}

fn draw(canvas: &mut Canvas, node: &LaidOutNode, clip: Rect, inherited: Style) {
    let visible = node.rect.intersect(&clip);

    match &node.content {
        LayoutContent::Empty | LayoutContent::Static { .. } => {}
        LayoutContent::Fragment => {
            for child in &node.children {
                draw(canvas, child, visible, inherited);
            }
        }
        LayoutContent::Box { style } => {
            let effective = style.inherit(inherited);
            if effective.bg.is_some() && !visible.is_empty() {
                canvas.fill(visible, effective);
            }
            for child in &node.children {
                draw(canvas, child, visible, effective);
            }
        }
        LayoutContent::Text { content, style } => {
            let effective = style.inherit(inherited);
            draw_text(canvas, node.rect, visible, content, effective);
        }
    }
}

fn draw_text(canvas: &mut Canvas, rect: Rect, visible: Rect, content: &str, style: Style) {
    if visible.is_empty() {
        return;
    }
    let limit = usize::from(visible.right().saturating_sub(rect.x));

    for (i, raw) in content.lines().enumerate() {
        let Ok(offset) = u16::try_from(i) else {
            break;
        };
        let y = rect.y.saturating_add(offset);
        if y < visible.y || y >= visible.bottom() {
            continue;
        }

        let line = sanitize(raw);
        let line = truncate_to_width(&line, limit);

        let mut x = rect.x;
        for grapheme in line.graphemes(true) {
            let w = grapheme_width(grapheme) as u16;
            if w == 0 {
                canvas.attach(x, y, grapheme);
                continue;
            }
            if x.saturating_add(w) > visible.right() {
                break;
            }
            if x >= visible.x {
                canvas.put(x, y, grapheme, w, style);
            }
            x = x.saturating_add(w);
        }
    }
}

/// Drops escape sequences and control characters, expands tabs.
fn sanitize(line: &str) -> String {
    strip_ansi(line)
        .chars()
        .flat_map(|c| {
            let (ch, n) = match c {
                '\t' => (' ', TAB_WIDTH),
                c if c.is_control() => (' ', 0),
                c => (c, 1),
            };
            std::iter::repeat(ch).take(n)
        })
        .collect()
}
