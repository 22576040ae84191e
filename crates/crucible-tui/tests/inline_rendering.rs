//! Inline rendering against a terminal emulator.

use crucible_tui::ansi::{truncate_to_width, visible_width, ELLIPSIS};
use crucible_tui::testing::TestRuntime;
use crucible_tui::{col, row, static_list, text, Node};
use proptest::prelude::*;

fn numbered(prefix: &str, n: usize) -> Node {
    col((0..n).map(|i| text(format!("{prefix} {i}"))))
}

fn expected(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix} {i}")).collect()
}

#[test]
fn cursor_moves_up_by_previous_line_count() {
    let mut rt = TestRuntime::new(40, 20);
    let sizes = [5usize, 1, 8, 0];
    let mut previous = 0usize;

    for (frame, &n) in sizes.iter().enumerate() {
        let prefix = format!("frame{frame}");
        rt.render(&numbered(&prefix, n)).unwrap();

        let out = rt.last_output_str();
        if previous == 0 {
            assert!(!out.contains("A"), "frame {frame} must not move up: {out:?}");
        } else {
            assert!(
                out.starts_with(&format!("\x1b[{previous}A")),
                "frame {frame} should move up {previous}: {out:?}"
            );
        }

        assert_eq!(rt.writer().last_dynamic_line_count(), n);
        assert_eq!(rt.live_rows(), expected(&prefix, n));
        previous = n;
    }

    // Nothing from the taller frames survives below the cursor.
    assert!(rt.screen_rows().iter().all(|row| row.is_empty()));
}

#[test]
fn static_items_are_written_exactly_once() {
    let mut rt = TestRuntime::new(30, 12);
    let view = |done: &[&'static str], spinner: &str| {
        col([
            static_list("done", done.to_vec(), |item, _| text(format!("done {item}"))),
            text(format!("spinner {spinner}")),
        ])
    };

    let mut transcript = String::new();
    let steps = vec![
        (vec!["alpha"], "1"),
        (vec!["alpha"], "2"),
        (vec!["alpha", "beta"], "3"),
        (vec!["alpha", "beta"], "4"),
        (vec!["alpha", "beta", "gamma"], "5"),
    ];
    for (done, spinner) in steps {
        rt.render(&view(&done, spinner)).unwrap();
        transcript.push_str(&rt.last_output_str());
    }

    for item in ["alpha", "beta", "gamma"] {
        assert_eq!(transcript.matches(&format!("done {item}")).count(), 1, "{item}");
    }
    assert_eq!(
        &rt.screen_rows()[..4],
        &["done alpha", "done beta", "done gamma", "spinner 5"]
    );
    assert_eq!(rt.planner().graduation().flushed_count("done"), 3);
}

#[test]
fn unchanged_frame_writes_nothing() {
    let mut rt = TestRuntime::new(20, 5);
    let tree = col([text("steady"), text("state")]);
    rt.render(&tree).unwrap();
    rt.render(&tree).unwrap();
    assert!(rt.last_output().is_empty());
}

#[test]
fn only_changed_rows_are_rewritten() {
    let mut rt = TestRuntime::new(20, 5);
    rt.render(&col([text("header"), text("50%")])).unwrap();
    rt.render(&col([text("header"), text("75%")])).unwrap();
    let out = rt.last_output_str();
    assert!(!out.contains("header"));
    assert!(out.contains("75%"));
    assert_eq!(rt.live_rows(), vec!["header", "75%"]);
}

#[test]
fn overlong_lines_are_cut_with_ellipsis() {
    let mut rt = TestRuntime::new(10, 4);
    rt.render(&text("a line that is far too long")).unwrap();
    let rows = rt.live_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(visible_width(&rows[0]), 10);
    assert!(rows[0].ends_with(ELLIPSIS));
}

#[test]
fn row_children_share_the_line() {
    let mut rt = TestRuntime::new(20, 4);
    rt.render(&row([text("[ok]"), text(" "), text("build")])).unwrap();
    assert_eq!(rt.live_rows(), vec!["[ok] build"]);
}

#[test]
fn finish_shows_cursor_and_keeps_output() {
    let mut rt = TestRuntime::new(20, 4);
    rt.render(&text("final")).unwrap();
    rt.finish();
    assert_eq!(rt.screen_rows()[0], "final");
}

proptest! {
    #[test]
    fn truncation_never_exceeds_width(s in "[a-z 0-9漢字😀é]{0,60}", width in 0usize..40) {
        let cut = truncate_to_width(&s, width);
        prop_assert!(visible_width(&cut) <= width);
        if visible_width(&s) <= width {
            prop_assert_eq!(&cut, &s);
        } else if width > 0 {
            prop_assert!(cut.ends_with(ELLIPSIS));
        }
    }

    #[test]
    fn live_region_matches_tree(lines in proptest::collection::vec("[a-z]{1,12}", 0..8)) {
        let mut rt = TestRuntime::new(20, 12);
        rt.render(&col(lines.iter().map(|l| text(l.clone())))).unwrap();
        prop_assert_eq!(rt.live_rows(), lines);
    }
}
