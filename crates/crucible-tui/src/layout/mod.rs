//! Converts element trees into positioned [`LaidOutNode`] trees.
//!
//! Box arithmetic is delegated to a [`LayoutService`]; this module only maps
//! between cell semantics and the service's box model. One row is one text
//! line and one column is one display cell.

mod stack;
mod taffy_layout;

pub use self::stack::StackLayout;
pub use self::taffy_layout::TaffyLayout;

use crate::ansi::visible_width;
use crate::node::{Direction, Node};
use crate::style::{Padding, Style};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout service failed: {0}")]
    Service(String),
    #[error("layout service returned {got} children where {expected} were expected")]
    ShapeMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Space offered to the root. `height: None` lets content decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraints {
    pub width: u16,
    pub height: Option<u16>,
}

impl Constraints {
    pub fn width(width: u16) -> Self {
        Self {
            width,
            height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutContent {
    Empty,
    Text { content: String, style: Style },
    Box { style: Style },
    Fragment,
    Static { key: String },
}

/// A node with its absolute position in cells. Built fresh by every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutNode {
    pub rect: Rect,
    pub content: LayoutContent,
    pub children: Vec<LaidOutNode>,
}

/// Input to a [`LayoutService`]: a box tree with leaf intrinsic sizes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxSpec {
    pub direction: Direction,
    pub padding: Padding,
    pub margin: Padding,
    pub width: Option<u16>,
    pub height: Option<u16>,
    /// Fixed `(width, height)` of a leaf, e.g. measured text.
    pub intrinsic: Option<(u16, u16)>,
    /// Occupies no space and is not measured.
    pub hidden: bool,
    pub children: Vec<BoxSpec>,
}

/// Output of a [`LayoutService`]: rects in cell units (possibly fractional,
/// possibly garbage), positioned relative to the parent's origin.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub children: Vec<BoxGeometry>,
}

pub trait LayoutService {
    fn layout(&mut self, root: &BoxSpec, available: Constraints)
        -> Result<BoxGeometry, LayoutError>;
}

pub struct LayoutEngine<S: LayoutService = TaffyLayout> {
    service: S,
}

impl Default for LayoutEngine<TaffyLayout> {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutEngine<TaffyLayout> {
    pub fn new() -> Self {
        Self {
            service: TaffyLayout::new(),
        }
    }
}

impl<S: LayoutService> LayoutEngine<S> {
    pub fn with_service(service: S) -> Self {
        Self { service }
    }

    /// Lays out `node` inside a column root of exactly `constraints.width`
    /// cells. The returned root is a [`LayoutContent::Fragment`] whose rect
    /// spans the whole output.
    pub fn measure(
        &mut self,
        node: &Node,
        constraints: Constraints,
    ) -> Result<LaidOutNode, LayoutError> {
        let root = BoxSpec {
            direction: Direction::Column,
            width: Some(constraints.width),
            height: constraints.height,
            children: vec![box_spec(node)],
            ..Default::default()
        };
        let geometry = self.service.layout(&root, constraints)?;

        let origin = Rect::new(0, 0, constraints.width, to_cells(geometry.height));
        let origin = match constraints.height {
            Some(h) => Rect { height: h, ..origin },
            None => origin,
        };
        let children = zip_children(std::slice::from_ref(node), &geometry.children, 0, 0)?;

        Ok(LaidOutNode {
            rect: origin,
            content: LayoutContent::Fragment,
            children,
        })
    }
}

fn box_spec(node: &Node) -> BoxSpec {
    match node {
        Node::Empty | Node::Static(_) => BoxSpec {
            hidden: true,
            ..Default::default()
        },
        Node::Text(t) => BoxSpec {
            intrinsic: Some(text_size(&t.content)),
            ..Default::default()
        },
        Node::Box(b) => BoxSpec {
            direction: b.direction,
            padding: b.padding,
            margin: b.margin,
            width: b.width,
            height: b.height,
            children: b.children.iter().map(box_spec).collect(),
            ..Default::default()
        },
        Node::Fragment(children) => BoxSpec {
            direction: Direction::Column,
            children: children.iter().map(box_spec).collect(),
            ..Default::default()
        },
    }
}

/// Intrinsic size of text: widest line by display width, one row per line.
pub fn text_size(content: &str) -> (u16, u16) {
    let mut width = 0usize;
    let mut height = 0usize;
    for line in content.lines() {
        width = width.max(visible_width(line));
        height += 1;
    }
    (clamp_u16(width), clamp_u16(height))
}

fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Converts a service-reported length to whole cells. Negative, NaN and
/// infinite values become zero.
pub(crate) fn to_cells(v: f32) -> u16 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    let rounded = v.round();
    if rounded >= f32::from(u16::MAX) {
        u16::MAX
    } else {
        rounded as u16
    }
}

fn zip_children(
    nodes: &[Node],
    geometry: &[BoxGeometry],
    origin_x: u16,
    origin_y: u16,
) -> Result<Vec<LaidOutNode>, LayoutError> {
    if nodes.len() != geometry.len() {
        return Err(LayoutError::ShapeMismatch {
            expected: nodes.len(),
            got: geometry.len(),
        });
    }
    nodes
        .iter()
        .zip(geometry)
        .map(|(node, geo)| zip_node(node, geo, origin_x, origin_y))
        .collect()
}

fn zip_node(
    node: &Node,
    geo: &BoxGeometry,
    origin_x: u16,
    origin_y: u16,
) -> Result<LaidOutNode, LayoutError> {
    let rect = Rect {
        x: origin_x.saturating_add(to_cells(geo.x)),
        y: origin_y.saturating_add(to_cells(geo.y)),
        width: to_cells(geo.width),
        height: to_cells(geo.height),
    };

    let (content, children) = match node {
        Node::Empty => (LayoutContent::Empty, Vec::new()),
        Node::Static(s) => (
            LayoutContent::Static { key: s.key.clone() },
            Vec::new(),
        ),
        Node::Text(t) => (
            LayoutContent::Text {
                content: t.content.clone(),
                style: t.style,
            },
            Vec::new(),
        ),
        Node::Box(b) => (
            LayoutContent::Box { style: b.style },
            zip_children(&b.children, &geo.children, rect.x, rect.y)?,
        ),
        Node::Fragment(children) => (
            LayoutContent::Fragment,
            zip_children(children, &geo.children, rect.x, rect.y)?,
        ),
    };

    let rect = match content {
        LayoutContent::Empty | LayoutContent::Static { .. } => Rect {
            width: 0,
            height: 0,
            ..rect
        },
        _ => rect,
    };

    Ok(LaidOutNode {
        rect,
        content,
        children,
    })
}
