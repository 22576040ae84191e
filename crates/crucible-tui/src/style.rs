use crossterm::style::{Attribute, ContentStyle, StyledContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Gray,
    Ansi(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub fn to_crossterm(self) -> crossterm::style::Color {
        use crossterm::style::Color as Ct;
        match self {
            Color::Black => Ct::Black,
            Color::Red => Ct::DarkRed,
            Color::Green => Ct::DarkGreen,
            Color::Yellow => Ct::DarkYellow,
            Color::Blue => Ct::DarkBlue,
            Color::Magenta => Ct::DarkMagenta,
            Color::Cyan => Ct::DarkCyan,
            Color::White => Ct::Grey,
            Color::Gray => Ct::DarkGrey,
            Color::Ansi(n) => Ct::AnsiValue(n),
            Color::Rgb(r, g, b) => Ct::Rgb { r, g, b },
        }
    }
}

/// Text attributes. `None` means "inherit from the enclosing element".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: Option<bool>,
    pub dim: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = Some(true);
        self
    }

    pub fn dim(mut self) -> Self {
        self.dim = Some(true);
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = Some(true);
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = Some(true);
        self
    }

    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = Some(true);
        self
    }

    /// Explicitly clears `bold` so an ancestor's value does not leak in.
    pub fn not_bold(mut self) -> Self {
        self.bold = Some(false);
        self
    }

    /// Resolves unset attributes against `parent`, attribute by attribute.
    pub fn inherit(self, parent: Style) -> Style {
        Style {
            fg: self.fg.or(parent.fg),
            bg: self.bg.or(parent.bg),
            bold: self.bold.or(parent.bold),
            dim: self.dim.or(parent.dim),
            italic: self.italic.or(parent.italic),
            underline: self.underline.or(parent.underline),
            strikethrough: self.strikethrough.or(parent.strikethrough),
        }
    }

    /// Canonical form for comparing effective styles: `Some(false)` is the
    /// same as unset once inheritance has been resolved.
    pub fn normalized(self) -> Style {
        fn flag(v: Option<bool>) -> Option<bool> {
            v.filter(|on| *on)
        }
        Style {
            fg: self.fg,
            bg: self.bg,
            bold: flag(self.bold),
            dim: flag(self.dim),
            italic: flag(self.italic),
            underline: flag(self.underline),
            strikethrough: flag(self.strikethrough),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.normalized() == Style::default()
    }

    pub fn to_crossterm(&self) -> ContentStyle {
        let resolved = self.normalized();
        let mut style = ContentStyle::new();
        style.foreground_color = resolved.fg.map(Color::to_crossterm);
        style.background_color = resolved.bg.map(Color::to_crossterm);
        if resolved.bold.is_some() {
            style.attributes.set(Attribute::Bold);
        }
        if resolved.dim.is_some() {
            style.attributes.set(Attribute::Dim);
        }
        if resolved.italic.is_some() {
            style.attributes.set(Attribute::Italic);
        }
        if resolved.underline.is_some() {
            style.attributes.set(Attribute::Underlined);
        }
        if resolved.strikethrough.is_some() {
            style.attributes.set(Attribute::CrossedOut);
        }
        style
    }
}

/// Wraps `content` in the SGR sequences for `style`, closed by a reset.
/// Plain styles produce the content unchanged.
pub fn apply_style(content: &str, style: &Style) -> String {
    if style.is_plain() {
        return content.to_string();
    }
    format!("{}", StyledContent::new(style.to_crossterm(), content))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
    pub left: u16,
}

impl Padding {
    pub fn all(n: u16) -> Self {
        Self {
            top: n,
            right: n,
            bottom: n,
            left: n,
        }
    }

    pub fn xy(x: u16, y: u16) -> Self {
        Self {
            top: y,
            right: x,
            bottom: y,
            left: x,
        }
    }

    pub fn horizontal(&self) -> u16 {
        self.left.saturating_add(self.right)
    }

    pub fn vertical(&self) -> u16 {
        self.top.saturating_add(self.bottom)
    }
}
