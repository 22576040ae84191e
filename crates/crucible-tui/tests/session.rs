//! Session lifecycle: batch output, coalesced rendering and interrupts.

use crucible_tui::testing::SharedBuffer;
use crucible_tui::{
    col, static_list, text, Interrupt, OutputMode, Phase, SessionOutcome, SizeSource, TuiApp,
    ViewContext,
};
use serde::Serialize;
use std::io::{self, Write};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_tag")]
enum Job {
    Running { count: u32 },
    Stopping { count: u32 },
    Cancelled { count: u32 },
    Complete { count: u32 },
}

#[derive(Debug)]
enum Msg {
    Tick,
    Finish,
    Interrupt,
}

impl Interrupt for Msg {
    fn interrupt() -> Self {
        Msg::Interrupt
    }
}

fn reduce(state: &Job, msg: Msg) -> Job {
    match (state, msg) {
        (Job::Running { count }, Msg::Tick) => Job::Running { count: count + 1 },
        (Job::Running { count }, Msg::Finish) => Job::Complete { count: *count },
        (Job::Running { count }, Msg::Interrupt) => Job::Stopping { count: *count },
        (Job::Stopping { count }, Msg::Finish) => Job::Cancelled { count: *count },
        (other, _) => other.clone(),
    }
}

fn is_terminal(state: &Job) -> bool {
    matches!(state, Job::Cancelled { .. } | Job::Complete { .. })
}

fn exit_code(state: &Job) -> i32 {
    match state {
        Job::Complete { .. } => 0,
        Job::Cancelled { .. } => 130,
        _ => 2,
    }
}

fn view(state: &Job, _ctx: &ViewContext<'_>) -> crucible_tui::Node {
    match state {
        Job::Running { count } => text(format!("running {count}")),
        Job::Stopping { count } => text(format!("stopping after {count}")),
        Job::Cancelled { count } => col([text("cancelled"), text(format!("processed {count}"))]),
        Job::Complete { count } => text(format!("complete {count}")),
    }
}

fn app() -> TuiApp<Job, Msg> {
    TuiApp::builder(Job::Running { count: 0 }, reduce)
        .view(view)
        .is_terminal(is_terminal)
        .exit_code(exit_code)
        .handle_signals(false)
        .build()
}

const SIZE: SizeSource = SizeSource::Fixed(40, 12);

#[tokio::test]
async fn json_prints_only_the_final_state() {
    let out = SharedBuffer::new();
    let session = app().run_with(OutputMode::JSON, out.clone(), SIZE).unwrap();
    for _ in 0..3 {
        assert!(session.dispatch(Msg::Tick));
    }
    assert!(out.contents().is_empty());

    let outcome = session.unmount().unwrap();
    assert_eq!(out.contents(), "{\"_tag\":\"Running\",\"count\":3}\n");
    assert_eq!(outcome, SessionOutcome { exit_code: 2, forced: false });
}

#[tokio::test]
async fn ndjson_prints_initial_state_and_every_dispatch() {
    let out = SharedBuffer::new();
    let session = app().run_with(OutputMode::NDJSON, out.clone(), SIZE).unwrap();
    for _ in 0..3 {
        session.dispatch(Msg::Tick);
    }
    session.unmount().unwrap();

    let lines: Vec<serde_json::Value> = out
        .contents()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["_tag"], "Running");
        assert_eq!(line["count"], i as u64);
    }
}

#[tokio::test]
async fn reaching_a_terminal_state_ends_the_session() {
    let out = SharedBuffer::new();
    let session = app().run_with(OutputMode::JSON, out.clone(), SIZE).unwrap();
    session.dispatch(Msg::Tick);
    session.dispatch(Msg::Finish);
    assert_eq!(session.phase(), Phase::Terminated);
    assert!(!session.dispatch(Msg::Tick));

    let outcome = session.wait().await.unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(out.contents(), "{\"_tag\":\"Complete\",\"count\":1}\n");
}

#[tokio::test]
async fn renders_are_coalesced() {
    let out = SharedBuffer::new();
    let session = app().run_with(OutputMode::INLINE, out.clone(), SIZE).unwrap();
    assert_eq!(session.frame_count(), 1);

    for _ in 0..100 {
        session.dispatch(Msg::Tick);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.frame_count(), 2);
    assert!(out.contents().contains("running 100"));
    assert!(!out.contents().contains("running 50"));

    session.unmount().unwrap();
}

#[tokio::test]
async fn interrupt_within_grace_takes_the_clean_path() {
    let (forced_tx, forced_rx) = flume::unbounded::<i32>();
    let grace = Duration::from_millis(400);
    let out = SharedBuffer::new();
    let session = TuiApp::builder(Job::Running { count: 4 }, reduce)
        .view(view)
        .is_terminal(is_terminal)
        .exit_code(exit_code)
        .interrupt_grace(grace)
        .on_forced_exit(move |code| {
            let _ = forced_tx.send(code);
        })
        .handle_signals(false)
        .build()
        .run_with(OutputMode::INLINE, out.clone(), SIZE)
        .unwrap();

    session.interrupt();
    assert_eq!(session.phase(), Phase::Interrupting);
    assert_eq!(session.state(), Job::Stopping { count: 4 });

    tokio::time::sleep(grace / 2).await;
    session.dispatch(Msg::Finish);

    let outcome = session.wait().await.unwrap();
    assert_eq!(outcome, SessionOutcome { exit_code: 130, forced: false });

    let screen = out.contents();
    assert!(screen.contains("cancelled"));
    assert!(screen.contains("processed 4"));

    // The watchdog was disarmed and never fires.
    std::thread::sleep(grace);
    assert!(forced_rx.try_recv().is_err());
}

#[tokio::test]
async fn interrupt_past_grace_forces_exit() {
    let (forced_tx, forced_rx) = flume::unbounded::<i32>();
    let grace = Duration::from_millis(150);
    let out = SharedBuffer::new();
    let session = TuiApp::builder(Job::Running { count: 1 }, |state: &Job, _: Msg| state.clone())
        .view(view)
        .is_terminal(is_terminal)
        .exit_code(exit_code)
        .interrupt_grace(grace)
        .on_forced_exit(move |code| {
            let _ = forced_tx.send(code);
        })
        .handle_signals(false)
        .build()
        .run_with(OutputMode::JSON, out.clone(), SIZE)
        .unwrap();

    let started = Instant::now();
    session.interrupt();

    let code = tokio::time::timeout(Duration::from_secs(5), forced_rx.recv_async())
        .await
        .expect("watchdog fired")
        .unwrap();
    assert!(started.elapsed() >= grace);
    assert_eq!(code, 2);

    let outcome = session.wait().await.unwrap();
    assert!(outcome.forced);
    assert_eq!(session.phase(), Phase::Terminated);
    // Best-effort final output still happened.
    assert_eq!(out.contents(), "{\"_tag\":\"Running\",\"count\":1}\n");
}

#[tokio::test]
async fn second_interrupt_does_not_rearm() {
    let (forced_tx, forced_rx) = flume::unbounded::<i32>();
    let session = TuiApp::builder(Job::Running { count: 0 }, reduce)
        .is_terminal(is_terminal)
        .interrupt_grace(Duration::from_secs(30))
        .on_forced_exit(move |code| {
            let _ = forced_tx.send(code);
        })
        .handle_signals(false)
        .build()
        .run_with(OutputMode::JSON, SharedBuffer::new(), SIZE)
        .unwrap();

    session.interrupt();
    session.interrupt();
    assert_eq!(session.state(), Job::Stopping { count: 0 });

    session.dispatch(Msg::Finish);
    assert_eq!(session.phase(), Phase::Terminated);
    session.interrupt();
    assert!(forced_rx.try_recv().is_err());
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn broken_pipe_degrades_without_failing() {
    for mode in [OutputMode::INLINE, OutputMode::NDJSON, OutputMode::JSON] {
        let session = app().run_with(mode, BrokenPipe, SIZE).unwrap();
        assert!(session.dispatch(Msg::Tick));
        assert!(session.dispatch(Msg::Finish));
        let outcome = session.wait().await.unwrap();
        assert_eq!(outcome.exit_code, 0, "{mode:?}");
    }
}

#[tokio::test]
async fn final_frame_mode_prints_once_at_the_end() {
    let out = SharedBuffer::new();
    let session = app()
        .run_with(OutputMode::FINAL_FRAME, out.clone(), SIZE)
        .unwrap();
    session.dispatch(Msg::Tick);
    assert!(out.contents().is_empty());
    session.dispatch(Msg::Interrupt);
    session.dispatch(Msg::Finish);
    session.wait().await.unwrap();
    assert_eq!(out.contents(), "cancelled\nprocessed 1\n");
}

#[tokio::test]
async fn alternate_screen_is_left_and_final_frame_reprinted() {
    let out = SharedBuffer::new();
    let session = app()
        .run_with(OutputMode::FULLSCREEN, out.clone(), SIZE)
        .unwrap();
    session.dispatch(Msg::Finish);
    session.wait().await.unwrap();

    let bytes = out.contents();
    assert!(bytes.starts_with("\x1b[?1049h"));
    let left = bytes.find("\x1b[?1049l").expect("left alternate screen");
    assert!(bytes[left..].contains("complete 0"));
}

#[tokio::test]
async fn alternate_screen_replays_static_items_on_exit() {
    let out = SharedBuffer::new();
    let session = TuiApp::builder(Job::Running { count: 0 }, reduce)
        .view(|state: &Job, ctx: &ViewContext<'_>| {
            let count = match state {
                Job::Running { count }
                | Job::Stopping { count }
                | Job::Cancelled { count }
                | Job::Complete { count } => *count,
            };
            col([
                static_list("steps", 0..count, |i, _| text(format!("step {i} ok"))),
                view(state, ctx),
            ])
        })
        .is_terminal(is_terminal)
        .exit_code(exit_code)
        .handle_signals(false)
        .build()
        .run_with(OutputMode::FULLSCREEN, out.clone(), SIZE)
        .unwrap();
    session.dispatch(Msg::Tick);
    session.dispatch(Msg::Tick);
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.dispatch(Msg::Finish);
    session.wait().await.unwrap();

    let bytes = out.contents();
    let left = bytes.find("\x1b[?1049l").expect("left alternate screen");
    let normal = &bytes[left..];
    let first = normal.find("step 0 ok").expect("step 0 replayed");
    let second = normal.find("step 1 ok").expect("step 1 replayed");
    let last = normal.find("complete 2").expect("final frame reprinted");
    assert!(first < second && second < last, "{normal:?}");
}

fn panicking_reducer(state: &Job, msg: Msg) -> Job {
    match msg {
        Msg::Finish => panic!("reducer bug"),
        other => reduce(state, other),
    }
}

#[tokio::test]
async fn reducer_panic_restores_terminal_and_resurfaces_from_wait() {
    let out = SharedBuffer::new();
    let session = TuiApp::builder(Job::Running { count: 0 }, panicking_reducer)
        .view(view)
        .is_terminal(is_terminal)
        .exit_code(exit_code)
        .handle_signals(false)
        .build()
        .run_with(OutputMode::INLINE, out.clone(), SIZE)
        .unwrap();

    assert!(session.dispatch(Msg::Tick));
    assert!(!session.dispatch(Msg::Finish));
    assert_eq!(session.phase(), Phase::Terminated);
    assert!(!session.dispatch(Msg::Tick));
    assert!(out.contents().ends_with("\x1b[?25h"), "{:?}", out.contents());

    let waiter = session.clone();
    let joined = tokio::spawn(async move { waiter.wait().await }).await;
    assert!(joined.unwrap_err().is_panic());
}

#[tokio::test]
async fn view_panic_restores_terminal_and_resurfaces_from_wait() {
    let out = SharedBuffer::new();
    let session = TuiApp::builder(Job::Running { count: 0 }, reduce)
        .view(|state: &Job, ctx: &ViewContext<'_>| match state {
            Job::Running { count } if *count >= 2 => panic!("view bug"),
            _ => view(state, ctx),
        })
        .is_terminal(is_terminal)
        .exit_code(exit_code)
        .handle_signals(false)
        .build()
        .run_with(OutputMode::INLINE, out.clone(), SIZE)
        .unwrap();

    session.dispatch(Msg::Tick);
    session.dispatch(Msg::Tick);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.phase(), Phase::Terminated);
    assert!(out.contents().contains("\x1b[?25h"));
    assert!(!session.dispatch(Msg::Tick));

    let waiter = session.clone();
    let joined = tokio::spawn(async move { waiter.wait().await }).await;
    assert!(joined.unwrap_err().is_panic());
}
