//! Integration Tests for Tab Completion
//!
//! Completion queries go through the child, so these run against bash with a
//! synthetic command directory on its PATH.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;

use test_utils::{bash_config, write_executable, RecordingSink};
use topaz_kernel::kernel::TopazKernel;
use topaz_kernel::CompletionReply;

async fn start_in(dir: &std::path::Path) -> TopazKernel {
    let mut config = bash_config();
    let path = format!(
        "{}:{}",
        dir.display(),
        std::env::var("PATH").unwrap_or_default()
    );
    config.topaz.environment.insert("PATH".to_string(), path);
    config.topaz.working_directory = Some(dir.to_path_buf());

    TopazKernel::start(config, Arc::new(RecordingSink::new()))
        .await
        .expect("kernel should start against bash")
}

#[tokio::test]
async fn test_command_completion_from_search_path() {
    let dir = tempfile::tempdir().unwrap();
    write_executable(dir.path(), "listx");
    write_executable(dir.path(), "list");
    let mut kernel = start_in(dir.path()).await;

    let reply = kernel.complete("lis", 3).await;
    assert!(reply.matches.contains(&"list".to_string()), "{:?}", reply);
    assert!(reply.matches.contains(&"listx".to_string()));
    assert!(reply.matches.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(reply.matches.iter().all(|m| m.starts_with("lis")));
    assert_eq!(reply.cursor_start, 0);
    assert_eq!(reply.cursor_end, 3);
}

#[tokio::test]
async fn test_variable_completion_keeps_sigil() {
    let dir = tempfile::tempdir().unwrap();
    let mut kernel = start_in(dir.path()).await;
    kernel.execute("export myvar=1", false, true).await.unwrap();

    let reply = kernel.complete("echo $my", 8).await;
    assert!(reply.matches.contains(&"$myvar".to_string()), "{:?}", reply);
    assert_eq!(reply.cursor_start, 5);
    assert_eq!(reply.cursor_end, 8);
}

#[tokio::test]
async fn test_completion_after_semicolon() {
    let dir = tempfile::tempdir().unwrap();
    write_executable(dir.path(), "listx");
    let mut kernel = start_in(dir.path()).await;

    let reply = kernel.complete("true;listx", 10).await;
    assert_eq!(reply.matches, vec!["listx".to_string()]);
    assert_eq!(reply.cursor_start, 5);
}

#[tokio::test]
async fn test_nothing_to_complete() {
    let dir = tempfile::tempdir().unwrap();
    let mut kernel = start_in(dir.path()).await;

    assert_eq!(kernel.complete("echo ", 5).await, CompletionReply::empty(5));
    assert_eq!(kernel.complete("", 0).await, CompletionReply::empty(0));
    assert_eq!(
        kernel.complete("zzqqxx_no_such", 14).await,
        CompletionReply::empty(14)
    );
}

#[tokio::test]
async fn test_session_usable_after_completion() {
    let dir = tempfile::tempdir().unwrap();
    let sink = RecordingSink::new();
    let mut config = bash_config();
    config.topaz.working_directory = Some(dir.path().to_path_buf());
    let mut kernel = TopazKernel::start(config, Arc::new(sink.clone()))
        .await
        .unwrap();

    kernel.complete("ec", 2).await;
    kernel.execute("echo after", false, true).await.unwrap();
    assert_eq!(sink.stream_text(), "after");
}
