//! Progress UI for batch runs, fed by the orchestrator's event channel.

use std::time::Duration;

use audiobook_core::{Phase, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

/// Counts of terminal events seen by the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RenderedTotals {
    pub(crate) finished: usize,
    pub(crate) succeeded: usize,
}

/// Spawns the consumer side of the event channel.
///
/// With `use_bar` the events drive an indicatif bar over `total` records;
/// otherwise they are only counted. The task ends when the orchestrator
/// drops its sender.
pub(crate) fn spawn_progress_ui(
    use_bar: bool,
    total: usize,
    mut events: UnboundedReceiver<ProgressEvent>,
) -> JoinHandle<RenderedTotals> {
    tokio::spawn(async move {
        let bar = use_bar.then(|| new_bar(total));
        let mut totals = RenderedTotals::default();

        while let Some(event) = events.recv().await {
            debug!(record_id = event.record_id, phase = %event.phase, "progress event");
            if let Some(bar) = &bar {
                render(bar, &event);
            }
            if event.phase.is_terminal() {
                totals.finished += 1;
                if event.phase == Phase::Succeeded {
                    totals.succeeded += 1;
                }
            }
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        totals
    })
}

fn new_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn render(bar: &ProgressBar, event: &ProgressEvent) {
    match event.phase {
        Phase::Succeeded => {
            bar.println(format!("ok   {}", event.message));
            bar.inc(1);
        }
        Phase::NoCandidates | Phase::Exhausted | Phase::StoreFailed => {
            bar.println(format!("fail {}", event.message));
            bar.inc(1);
        }
        Phase::Cancelled => {
            bar.println(format!("stop {}", event.message));
            bar.inc(1);
        }
        _ => bar.set_message(format!("#{} {}", event.record_id, event.message)),
    }
}
