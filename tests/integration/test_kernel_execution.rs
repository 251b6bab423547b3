//! Integration Tests for Cell Execution
//!
//! Runs `TopazKernel` end to end against bash: rejection, raw blocks,
//! images, interrupts, restarts after the child dies, exit code probing.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use test_utils::{bash_config, RecordingSink, PNG_BYTES};
use topaz_kernel::config::KernelConfig;
use topaz_kernel::kernel::{CommandExitCodeProbe, ExitCodeProbe, TopazKernel};
use topaz_kernel::messages::IopubMessage;
use topaz_kernel::models::ExecutionStatus;
use topaz_kernel::repl::ReplWrapper;

const MARKER: &str = "topaz_kernel: saved image data to: ";

async fn start_with(config: KernelConfig) -> (TopazKernel, RecordingSink) {
    let sink = RecordingSink::new();
    let kernel = TopazKernel::start(config, Arc::new(sink.clone()))
        .await
        .expect("kernel should start against bash");
    (kernel, sink)
}

async fn start() -> (TopazKernel, RecordingSink) {
    start_with(bash_config()).await
}

#[tokio::test]
async fn test_direct_command_streams_output_without_echo() {
    let (mut kernel, sink) = start().await;

    let result = kernel.execute("echo hello", false, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.execution_count, 1);

    assert_eq!(sink.take(), vec![IopubMessage::stdout("hello")]);
}

#[tokio::test]
async fn test_multiline_direct_cell_stays_in_step() {
    let (mut kernel, sink) = start().await;

    let result = kernel
        .execute("echo a\nsleep 0.5; echo b", false, true)
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(sink.take(), vec![IopubMessage::stdout("a\nb")]);

    kernel.execute("echo c", false, true).await.unwrap();
    assert_eq!(sink.take(), vec![IopubMessage::stdout("c")]);
}

#[tokio::test]
async fn test_empty_cell_is_ok_without_output() {
    let (mut kernel, sink) = start().await;
    let written = kernel.session().wrapper().stats().bytes_written;

    let result = kernel.execute("   \n ", false, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(sink.len(), 0);
    assert_eq!(kernel.session().wrapper().stats().bytes_written, written);
}

#[tokio::test]
async fn test_rejected_command_never_reaches_child() {
    let (mut kernel, sink) = start().await;
    let written = kernel.session().wrapper().stats().bytes_written;

    for cell in ["quit", "EXIT", "logout", "spool on", "shell ls"] {
        let result = kernel.execute(cell, false, true).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Abort, "{}", cell);
    }

    assert_eq!(kernel.session().wrapper().stats().bytes_written, written);
    assert_eq!(sink.stream_text(), "Unauthorized command!".repeat(5));
}

#[tokio::test]
async fn test_raw_block_waits_on_sentinel() {
    let (mut kernel, sink) = start().await;

    // Makes `run` open a block that `%` closes, the way Topaz treats it
    kernel.execute("alias run='cat <<%'", false, true).await.unwrap();
    sink.take();

    let result = kernel
        .execute("run\n3 + 4\nhello\n%", false, true)
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(sink.take(), vec![IopubMessage::stdout("3 + 4\nhello")]);

    let after = kernel.execute("echo synced", false, true).await.unwrap();
    assert_eq!(after.status, ExecutionStatus::Ok);
    assert_eq!(sink.stream_text(), "synced");
}

#[tokio::test]
async fn test_silent_cell_publishes_nothing_and_keeps_count() {
    let (mut kernel, sink) = start().await;

    let result = kernel.execute("echo quiet", true, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.execution_count, 0);
    assert_eq!(sink.len(), 0);

    kernel.execute("echo loud", false, false).await.unwrap();
    assert_eq!(kernel.execution_count(), 0);
    kernel.execute("echo loud", false, true).await.unwrap();
    assert_eq!(kernel.execution_count(), 1);
}

#[tokio::test]
async fn test_image_marker_becomes_display_data() {
    let (mut kernel, sink) = start().await;
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("plot.png");
    std::fs::write(&image, PNG_BYTES).unwrap();
    let listing = dir.path().join("out.txt");
    std::fs::write(
        &listing,
        format!("before\n{}{}\nafter\n", MARKER, image.display()),
    )
    .unwrap();

    let cell = format!("cat {}", listing.display());
    let result = kernel.execute(&cell, false, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);

    let messages = sink.take();
    assert_eq!(messages.len(), 2, "{:?}", messages);
    assert_eq!(messages[0], IopubMessage::stdout("before\nafter"));
    match &messages[1] {
        IopubMessage::DisplayData(data) => assert_eq!(data.mime_type(), Some("image/png")),
        other => panic!("expected display data, got {:?}", other),
    }
    assert!(!image.exists(), "image file should be removed after display");
}

#[tokio::test]
async fn test_invalid_image_is_a_note_not_a_failure() {
    let (mut kernel, sink) = start().await;
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.png");
    std::fs::write(&bogus, "not an image").unwrap();
    let listing = dir.path().join("out.txt");
    std::fs::write(&listing, format!("{}{}\n", MARKER, bogus.display())).unwrap();

    let cell = format!("cat {}", listing.display());
    let result = kernel.execute(&cell, false, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert!(sink
        .stream_text()
        .contains(&format!("Not a valid image: {}", bogus.display())));
}

#[tokio::test]
async fn test_interrupt_aborts_and_keeps_session() {
    let (mut kernel, sink) = start().await;
    let session = kernel.session().id();

    let handle = kernel.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.interrupt();
    });

    let result = kernel.execute("sleep 30", false, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Abort);
    assert_eq!(sink.len(), 0);

    let next = kernel.execute("echo next", false, true).await.unwrap();
    assert_eq!(next.status, ExecutionStatus::Ok);
    assert_eq!(sink.stream_text(), "next");
    assert_eq!(kernel.session().id(), session);
}

#[tokio::test]
async fn test_execution_timeout_aborts_with_note() {
    let mut config = bash_config();
    config.execution.timeout_ms = Some(300);
    let (mut kernel, sink) = start_with(config).await;

    let result = kernel.execute("sleep 30", false, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Abort);
    assert!(sink.stream_text().starts_with("Execution timed out"));
    sink.take();

    kernel.execute("echo recovered", false, true).await.unwrap();
    assert_eq!(sink.stream_text(), "recovered");
}

#[tokio::test]
async fn test_child_death_restarts_session() {
    let (mut kernel, sink) = start().await;
    let session = kernel.session().id();

    let result = kernel.execute("kill -9 $$", false, true).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert!(sink.stream_text().contains("Restarting Topaz"));
    assert_ne!(kernel.session().id(), session);
    sink.take();

    let next = kernel.execute("echo reborn", false, true).await.unwrap();
    assert_eq!(next.status, ExecutionStatus::Ok);
    assert_eq!(next.execution_count, 2);
    assert_eq!(sink.stream_text(), "reborn");
}

#[tokio::test]
async fn test_nonzero_exit_code_is_error() {
    let (kernel, sink) = start().await;
    let mut kernel = kernel.with_exit_code_probe(Box::new(CommandExitCodeProbe::new(
        "echo $?",
        Duration::from_secs(10),
    )));

    let failed = kernel.execute("false", false, true).await.unwrap();
    assert_eq!(failed.status, ExecutionStatus::Error);
    assert_eq!(failed.error_value.as_deref(), Some("1"));
    assert!(sink
        .take()
        .iter()
        .any(|m| matches!(m, IopubMessage::Error(e) if e.evalue == "1")));

    let passed = kernel.execute("true", false, true).await.unwrap();
    assert_eq!(passed.status, ExecutionStatus::Ok);
}

/// Times out on its first call, answers 0 afterwards
struct SlowFirstAnswer {
    calls: AtomicUsize,
    slow: CommandExitCodeProbe,
    fast: CommandExitCodeProbe,
}

#[async_trait]
impl ExitCodeProbe for SlowFirstAnswer {
    async fn exit_code(&self, wrapper: &mut ReplWrapper) -> topaz_kernel::Result<i32> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.slow.exit_code(wrapper).await
        } else {
            self.fast.exit_code(wrapper).await
        }
    }
}

#[tokio::test]
async fn test_exit_code_timeout_resynchronises_session() {
    let (kernel, sink) = start().await;
    let mut kernel = kernel.with_exit_code_probe(Box::new(SlowFirstAnswer {
        calls: AtomicUsize::new(0),
        slow: CommandExitCodeProbe::new("sleep 2; echo 0", Duration::from_millis(300)),
        fast: CommandExitCodeProbe::new("echo $?", Duration::from_secs(10)),
    }));

    let first = kernel.execute("echo first", false, true).await.unwrap();
    assert_eq!(first.status, ExecutionStatus::Abort);
    assert!(sink.stream_text().starts_with("first"));
    sink.take();

    // Long enough for an unread answer to the first query to have arrived
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let second = kernel.execute("echo second", false, true).await.unwrap();
    assert_eq!(second.status, ExecutionStatus::Ok);
    assert_eq!(sink.take(), vec![IopubMessage::stdout("second")]);
}

#[tokio::test]
async fn test_shutdown_with_restart() {
    let (mut kernel, sink) = start().await;
    let session = kernel.session().id();

    kernel.shutdown(true).await.unwrap();
    assert_ne!(kernel.session().id(), session);

    kernel.execute("echo alive", false, true).await.unwrap();
    assert_eq!(sink.stream_text(), "alive");
}

#[tokio::test]
async fn test_kernel_info_parses_version() {
    let (kernel, _sink) = start().await;
    let info = kernel.kernel_info().await;

    assert_eq!(info.implementation, "topaz_kernel");
    assert!(info.banner.contains("bash"));
    assert!(!info.language_version.is_empty());
}
