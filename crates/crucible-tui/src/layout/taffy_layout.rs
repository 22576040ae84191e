use super::{BoxGeometry, BoxSpec, Constraints, LayoutError, LayoutService};
use crate::node::Direction;
use crate::style::Padding;
use taffy::prelude::*;

/// Flexbox layout backed by `taffy`. A fresh tree is built for every pass.
pub struct TaffyLayout {
    tree: TaffyTree<()>,
}

impl Default for TaffyLayout {
    fn default() -> Self {
        Self::new()
    }
}

struct Built {
    id: NodeId,
    children: Vec<Built>,
}

impl TaffyLayout {
    pub fn new() -> Self {
        Self {
            tree: TaffyTree::new(),
        }
    }

    fn build(&mut self, spec: &BoxSpec) -> Result<Built, LayoutError> {
        if spec.hidden {
            let id = self
                .tree
                .new_leaf(Style {
                    display: Display::None,
                    ..Default::default()
                })
                .map_err(service_error)?;
            return Ok(Built {
                id,
                children: Vec::new(),
            });
        }

        if let Some((w, h)) = spec.intrinsic {
            let id = self
                .tree
                .new_leaf(Style {
                    size: Size {
                        width: length(f32::from(w)),
                        height: length(f32::from(h)),
                    },
                    min_size: Size {
                        width: length(0.0),
                        height: auto(),
                    },
                    flex_shrink: 1.0,
                    ..Default::default()
                })
                .map_err(service_error)?;
            return Ok(Built {
                id,
                children: Vec::new(),
            });
        }

        let children = spec
            .children
            .iter()
            .map(|c| self.build(c))
            .collect::<Result<Vec<_>, _>>()?;
        let child_ids: Vec<NodeId> = children.iter().map(|c| c.id).collect();

        let flex_direction = match spec.direction {
            Direction::Column => FlexDirection::Column,
            Direction::Row => FlexDirection::Row,
        };

        let id = self
            .tree
            .new_with_children(
                Style {
                    display: Display::Flex,
                    flex_direction,
                    flex_shrink: 1.0,
                    size: Size {
                        width: spec.width.map_or(auto(), |w| length(f32::from(w))),
                        height: spec.height.map_or(auto(), |h| length(f32::from(h))),
                    },
                    min_size: Size {
                        width: length(0.0),
                        height: auto(),
                    },
                    padding: edges(&spec.padding),
                    margin: edges(&spec.margin),
                    ..Default::default()
                },
                &child_ids,
            )
            .map_err(service_error)?;

        Ok(Built { id, children })
    }

    fn collect(&self, built: &Built) -> Result<BoxGeometry, LayoutError> {
        let layout = self.tree.layout(built.id).map_err(service_error)?;
        let children = built
            .children
            .iter()
            .map(|c| self.collect(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BoxGeometry {
            x: layout.location.x,
            y: layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
            children,
        })
    }
}

impl LayoutService for TaffyLayout {
    fn layout(
        &mut self,
        root: &BoxSpec,
        available: Constraints,
    ) -> Result<BoxGeometry, LayoutError> {
        self.tree = TaffyTree::new();
        let built = self.build(root)?;

        let space = Size {
            width: AvailableSpace::Definite(f32::from(available.width)),
            height: available
                .height
                .map_or(AvailableSpace::MaxContent, |h| {
                    AvailableSpace::Definite(f32::from(h))
                }),
        };
        self.tree
            .compute_layout(built.id, space)
            .map_err(service_error)?;

        self.collect(&built)
    }
}

fn edges<T: taffy::style_helpers::FromLength>(p: &Padding) -> taffy::geometry::Rect<T> {
    taffy::geometry::Rect {
        top: length(f32::from(p.top)),
        right: length(f32::from(p.right)),
        bottom: length(f32::from(p.bottom)),
        left: length(f32::from(p.left)),
    }
}

fn service_error(err: taffy::TaffyError) -> LayoutError {
    LayoutError::Service(err.to_string())
}
