use crate::graduation::GraduationState;
use crate::layout::{Constraints, LayoutEngine, LayoutError, LayoutService, TaffyLayout};
use crate::node::{BoxNode, Node};
use crate::render::render_lines;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTrace {
    pub frame_no: u64,
    /// `key#index` of every static item flushed by this frame.
    pub flushed: Vec<String>,
    pub dynamic_rows: usize,
}

/// Output of one planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Lines for static items not yet written, in tree order.
    pub new_static_lines: Vec<String>,
    /// The whole live region, top to bottom.
    pub dynamic_lines: Vec<String>,
    pub trace: FrameTrace,
}

/// Splits a tree into newly appended static lines and the live region.
///
/// # Ordering
///
/// 1. plan graduation (read-only)
/// 2. render each pending static item standalone at full width, under the
///    style of the boxes that enclose its list
/// 3. render the live region, where static lists take no space
/// 4. commit graduation
///
/// Nothing is committed unless every step succeeded, so a failed frame
/// cannot lose static items.
pub struct FramePlanner<S: LayoutService = TaffyLayout> {
    width: u16,
    frame_no: u64,
    graduation: GraduationState,
    engine: LayoutEngine<S>,
}

impl FramePlanner<TaffyLayout> {
    pub fn new(width: u16) -> Self {
        Self::with_engine(width, LayoutEngine::new())
    }
}

impl<S: LayoutService> FramePlanner<S> {
    pub fn with_engine(width: u16, engine: LayoutEngine<S>) -> Self {
        Self {
            width,
            frame_no: 0,
            graduation: GraduationState::new(),
            engine,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    /// Takes effect on the next [`FramePlanner::plan`].
    pub fn set_width(&mut self, width: u16) {
        self.width = width;
    }

    pub fn graduation(&self) -> &GraduationState {
        &self.graduation
    }

    pub fn frame_no(&self) -> u64 {
        self.frame_no
    }

    pub fn plan(&mut self, tree: &Node) -> Result<Frame, LayoutError> {
        let constraints = Constraints::width(self.width);
        let graduation = self.graduation.plan(tree);

        let mut new_static_lines = Vec::new();
        for item in &graduation.pending {
            let laid = if item.style.is_plain() {
                self.engine.measure(&item.node, constraints)?
            } else {
                let wrapped = Node::Box(BoxNode {
                    children: vec![item.node.clone()],
                    style: item.style,
                    ..Default::default()
                });
                self.engine.measure(&wrapped, constraints)?
            };
            new_static_lines.extend(render_lines(&laid));
        }

        let laid = self.engine.measure(tree, constraints)?;
        let dynamic_lines = render_lines(&laid);

        self.graduation.commit(&graduation);
        self.frame_no += 1;

        let trace = FrameTrace {
            frame_no: self.frame_no,
            flushed: graduation.pending.iter().map(|p| p.id()).collect(),
            dynamic_rows: dynamic_lines.len(),
        };
        debug!(
            frame = trace.frame_no,
            flushed = trace.flushed.len(),
            static_lines = new_static_lines.len(),
            dynamic_rows = trace.dynamic_rows,
            "planned frame"
        );

        Ok(Frame {
            new_static_lines,
            dynamic_lines,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BoxGeometry, BoxSpec, StackLayout};
    use crate::node::{col, static_list, text};
    use crate::style::{Color, Style};

    fn tree(items: &[&str], status: &str) -> Node {
        col([
            static_list("log", items.to_vec(), |s, _| text(s)),
            text(status),
        ])
    }

    #[test]
    fn static_items_flush_once() {
        let mut planner = FramePlanner::new(20);

        let first = planner.plan(&tree(&["a", "b"], "working")).unwrap();
        assert_eq!(first.new_static_lines, vec!["a", "b"]);
        assert_eq!(first.dynamic_lines, vec!["working"]);
        assert_eq!(first.trace.flushed, vec!["log#0", "log#1"]);

        let second = planner.plan(&tree(&["a", "b"], "still working")).unwrap();
        assert!(second.new_static_lines.is_empty());
        assert_eq!(second.dynamic_lines, vec!["still working"]);

        let third = planner.plan(&tree(&["a", "b", "c"], "done")).unwrap();
        assert_eq!(third.new_static_lines, vec!["c"]);
        assert_eq!(third.trace.frame_no, 3);
    }

    #[test]
    fn multi_line_static_item_keeps_all_lines() {
        let mut planner = FramePlanner::new(20);
        let frame = planner.plan(&tree(&["one\ntwo"], "")).unwrap();
        assert_eq!(frame.new_static_lines, vec!["one", "two"]);
    }

    #[test]
    fn static_lines_are_truncated_to_width() {
        let mut planner = FramePlanner::new(4);
        let frame = planner.plan(&tree(&["abcdef"], "")).unwrap();
        assert_eq!(frame.new_static_lines, vec!["abc…"]);
    }

    #[test]
    fn width_change_applies_to_next_frame() {
        let mut planner = FramePlanner::with_engine(10, LayoutEngine::with_service(StackLayout));
        assert_eq!(planner.plan(&text("abcdefgh")).unwrap().dynamic_lines, vec!["abcdefgh"]);
        planner.set_width(5);
        assert_eq!(planner.plan(&text("abcdefgh")).unwrap().dynamic_lines, vec!["abcd…"]);
    }

    #[test]
    fn static_items_keep_enclosing_style() {
        let mut planner = FramePlanner::new(20);
        let styled_tree = col([static_list("log", vec!["warned"], |s, _| text(s)), text("live")])
            .with_style(Style::new().fg(Color::Red).bold());
        let frame = planner.plan(&styled_tree).unwrap();

        assert_eq!(frame.new_static_lines.len(), 1);
        let line = &frame.new_static_lines[0];
        assert!(line.contains("warned"));
        assert!(line.starts_with('\x1b'), "{line:?}");
        let sgr = |l: &str, word: &str| l[..l.find(word).unwrap()].to_string();
        assert_eq!(sgr(line, "warned"), sgr(&frame.dynamic_lines[0], "live"));
    }

    struct Failing;

    impl LayoutService for Failing {
        fn layout(
            &mut self,
            _root: &BoxSpec,
            _available: Constraints,
        ) -> Result<BoxGeometry, LayoutError> {
            Err(LayoutError::Service("boom".into()))
        }
    }

    #[test]
    fn failed_frame_commits_nothing() {
        let mut planner = FramePlanner::with_engine(10, LayoutEngine::with_service(Failing));
        assert!(planner.plan(&tree(&["a"], "x")).is_err());
        assert_eq!(planner.graduation().total_flushed(), 0);
        assert_eq!(planner.frame_no(), 0);
    }
}
