use super::{BoxGeometry, BoxSpec, Constraints, LayoutError, LayoutService};
use crate::node::Direction;

/// Minimal stacking layout: columns stretch to the available width, rows
/// hand each child whatever width is left. No flex growth or shrinking.
#[derive(Debug, Default, Clone, Copy)]
pub struct StackLayout;

impl StackLayout {
    pub fn new() -> Self {
        Self
    }
}

impl LayoutService for StackLayout {
    fn layout(
        &mut self,
        root: &BoxSpec,
        available: Constraints,
    ) -> Result<BoxGeometry, LayoutError> {
        let mut geo = place(root, available.width);
        if let Some(h) = available.height {
            geo.height = geo.height.min(f32::from(h));
        }
        Ok(geo)
    }
}

fn place(spec: &BoxSpec, available_width: u16) -> BoxGeometry {
    if spec.hidden {
        return BoxGeometry::default();
    }

    if let Some((w, h)) = spec.intrinsic {
        return BoxGeometry {
            width: f32::from(w.min(available_width)),
            height: f32::from(h),
            ..Default::default()
        };
    }

    let width = spec.width.unwrap_or(available_width);
    let inner = width.saturating_sub(spec.padding.horizontal());

    let mut children = Vec::with_capacity(spec.children.len());
    let mut main_cursor: u16 = 0;
    let mut cross_extent: u16 = 0;

    for child in &spec.children {
        let margin = child.margin;
        let offered = match spec.direction {
            Direction::Column => inner,
            Direction::Row => inner.saturating_sub(main_cursor),
        }
        .saturating_sub(margin.horizontal());

        let mut geo = place(child, offered);
        let w = geo.width as u16;
        let h = geo.height as u16;

        match spec.direction {
            Direction::Column => {
                geo.x = f32::from(spec.padding.left.saturating_add(margin.left));
                geo.y = f32::from(
                    spec.padding
                        .top
                        .saturating_add(main_cursor)
                        .saturating_add(margin.top),
                );
                if !child.hidden {
                    main_cursor = main_cursor
                        .saturating_add(h)
                        .saturating_add(margin.vertical());
                    cross_extent = cross_extent.max(w.saturating_add(margin.horizontal()));
                }
            }
            Direction::Row => {
                geo.x = f32::from(
                    spec.padding
                        .left
                        .saturating_add(main_cursor)
                        .saturating_add(margin.left),
                );
                geo.y = f32::from(spec.padding.top.saturating_add(margin.top));
                if !child.hidden {
                    main_cursor = main_cursor
                        .saturating_add(w)
                        .saturating_add(margin.horizontal());
                    cross_extent = cross_extent.max(h.saturating_add(margin.vertical()));
                }
            }
        }
        children.push(geo);
    }

    let content_height = match spec.direction {
        Direction::Column => main_cursor,
        Direction::Row => cross_extent,
    };
    let height = spec
        .height
        .unwrap_or_else(|| content_height.saturating_add(spec.padding.vertical()));

    BoxGeometry {
        x: 0.0,
        y: 0.0,
        width: f32::from(width),
        height: f32::from(height),
        children,
    }
}
