use crate::style::{Color, Padding, Style};

/// Declarative description of one frame of output. Rebuilt from state on
/// every change; carries no terminal resources.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    #[default]
    Empty,
    Text(TextNode),
    Box(BoxNode),
    Static(StaticNode),
    Fragment(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextNode {
    pub content: String,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxNode {
    pub children: Vec<Node>,
    pub direction: Direction,
    pub padding: Padding,
    pub margin: Padding,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub style: Style,
}

/// Append-only list. Items are identified by `(key, index)` and are written
/// to scrollback exactly once; an item must never move to another index.
///
/// `offset` is the absolute index of `items[0]`. A list backed by a bounded
/// buffer raises it as old entries are evicted so later items keep their
/// identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticNode {
    pub key: String,
    pub offset: usize,
    pub items: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Column,
    Row,
}

pub fn text(content: impl Into<String>) -> Node {
    Node::Text(TextNode {
        content: content.into(),
        style: Style::default(),
    })
}

pub fn styled(content: impl Into<String>, style: Style) -> Node {
    Node::Text(TextNode {
        content: content.into(),
        style,
    })
}

pub fn col(children: impl IntoIterator<Item = Node>) -> Node {
    Node::Box(BoxNode {
        children: children.into_iter().collect(),
        direction: Direction::Column,
        ..Default::default()
    })
}

pub fn row(children: impl IntoIterator<Item = Node>) -> Node {
    Node::Box(BoxNode {
        children: children.into_iter().collect(),
        direction: Direction::Row,
        ..Default::default()
    })
}

pub fn fragment(children: impl IntoIterator<Item = Node>) -> Node {
    Node::Fragment(children.into_iter().collect())
}

/// Builds a static list by rendering each item with its index.
pub fn static_list<I, T, F>(key: impl Into<String>, items: I, render: F) -> Node
where
    I: IntoIterator<Item = T>,
    F: FnMut(T, usize) -> Node,
{
    static_list_from(key, 0, items, render)
}

/// Like [`static_list`], for a window whose first item sits at absolute
/// index `offset`. `render` receives absolute indices.
pub fn static_list_from<I, T, F>(key: impl Into<String>, offset: usize, items: I, mut render: F) -> Node
where
    I: IntoIterator<Item = T>,
    F: FnMut(T, usize) -> Node,
{
    Node::Static(StaticNode {
        key: key.into(),
        offset,
        items: items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| render(item, offset + idx))
            .collect(),
    })
}

impl Node {
    pub fn with_style(self, style: Style) -> Self {
        match self {
            Node::Text(mut t) => {
                t.style = style;
                Node::Text(t)
            }
            Node::Box(mut b) => {
                b.style = style;
                Node::Box(b)
            }
            other => Node::Box(BoxNode {
                children: vec![other],
                style,
                ..Default::default()
            }),
        }
    }

    pub fn with_padding(self, padding: Padding) -> Self {
        match self {
            Node::Box(mut b) => {
                b.padding = padding;
                Node::Box(b)
            }
            other => Node::Box(BoxNode {
                children: vec![other],
                padding,
                ..Default::default()
            }),
        }
    }

    pub fn with_margin(self, margin: Padding) -> Self {
        match self {
            Node::Box(mut b) => {
                b.margin = margin;
                Node::Box(b)
            }
            other => Node::Box(BoxNode {
                children: vec![other],
                margin,
                ..Default::default()
            }),
        }
    }

    pub fn width(self, width: u16) -> Self {
        self.into_box(|b| b.width = Some(width))
    }

    pub fn height(self, height: u16) -> Self {
        self.into_box(|b| b.height = Some(height))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Node::Empty => true,
            Node::Fragment(children) => children.iter().all(Node::is_empty),
            _ => false,
        }
    }

    fn into_box(self, apply: impl FnOnce(&mut BoxNode)) -> Self {
        let mut b = match self {
            Node::Box(b) => b,
            other => BoxNode {
                children: vec![other],
                ..Default::default()
            },
        };
        apply(&mut b);
        Node::Box(b)
    }
}

impl TextNode {
    pub fn fg(mut self, color: Color) -> Self {
        self.style = self.style.fg(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.style = self.style.bold();
        self
    }

    pub fn dim(mut self) -> Self {
        self.style = self.style.dim();
        self
    }
}

impl From<TextNode> for Node {
    fn from(t: TextNode) -> Self {
        Node::Text(t)
    }
}

impl From<BoxNode> for Node {
    fn from(b: BoxNode) -> Self {
        Node::Box(b)
    }
}
