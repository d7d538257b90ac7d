mod common;

use common::MockFtpServer;
use ferry_file::{close_all, AcceptAll, FileConnector, FileErrorKind, FileMatcher, ListCommand, ReadCommand};
use ferry_ftp::{FtpConnector, FtpListCommand, FtpReadCommand, PoolConfig};
use std::sync::Arc;
use std::time::Duration;

fn connector(server: &MockFtpServer) -> FtpConnector {
    FtpConnector::new("test-ftp", server.pool())
}

// ─── List ────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_recursive_list_includes_subdirectory_entry() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let messages = ftp.list("/data", false, &AcceptAll).await.unwrap();
    assert_eq!(messages.len(), 6);

    let dirs: Vec<_> = messages.iter().filter(|m| m.attributes.is_directory()).collect();
    assert_eq!(dirs.len(), 1);
    assert_eq!(dirs[0].path(), "/data/subDirectory");
    assert!(dirs[0].content.is_none());
    assert!(messages.iter().all(|m| m.attributes.name != "." && m.attributes.name != ".."));
    close_all(&messages).await.unwrap();
}

#[tokio::test]
async fn recursive_list_descends_and_streams_content() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let messages = ftp.list("/data", true, &AcceptAll).await.unwrap();
    assert_eq!(messages.len(), 8);
    assert!(messages
        .iter()
        .any(|m| m.path() == "/data/subDirectory/test-file-7.html"));

    for m in messages.iter().filter(|m| m.attributes.is_regular_file()) {
        assert_eq!(m.data_type.mime_type, "text/html");
        let content = m.content.as_ref().unwrap();
        assert_eq!(content.read_to_string().await.unwrap(), "foo");
    }
    assert_eq!(ftp.stats().checked_out, 0);
}

#[tokio::test]
async fn rejected_directory_is_not_descended_into() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let only_files = FileMatcher::new().directories(false);
    let messages = ftp.list("/data", true, &only_files).await.unwrap();
    assert_eq!(messages.len(), 5);
    close_all(&messages).await.unwrap();
}

#[tokio::test]
async fn list_restores_working_directory() {
    let server = MockFtpServer::with_listing_fixture().await;
    let pool = server.pool();
    let mut handle = pool.get_connection().await.unwrap();

    let messages = FtpListCommand::new(handle.connection(), &pool)
        .list("/data", true, &AcceptAll)
        .await
        .unwrap();
    assert_eq!(messages.len(), 8);
    assert_eq!(handle.connection().client_mut().pwd().await.unwrap(), "/");

    close_all(&messages).await.unwrap();
    handle.release();
}

#[tokio::test]
async fn failed_recursion_restores_working_directory() {
    let server = MockFtpServer::with_listing_fixture().await;
    server.deny_cwd("/data/subDirectory");
    let pool = server.pool();
    let mut handle = pool.get_connection().await.unwrap();

    let err = FtpListCommand::new(handle.connection(), &pool)
        .list("/data", true, &AcceptAll)
        .await
        .unwrap_err();
    assert!(err.is(FileErrorKind::OperationFailed));
    assert!(err.message.contains("while performing recursion"));
    assert_eq!(handle.connection().client_mut().pwd().await.unwrap(), "/");

    handle.release();
    // Streams opened for entries before the failure were closed.
    assert_eq!(pool.stats().checked_out, 0);
}

#[tokio::test]
async fn listing_a_file_or_missing_path_fails() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let err = ftp.list("/data/test-file-1.html", false, &AcceptAll).await.unwrap_err();
    assert!(err.is(FileErrorKind::IllegalOperation));

    let err = ftp.list("/nope", false, &AcceptAll).await.unwrap_err();
    assert!(err.is(FileErrorKind::InvalidPath));
}

#[tokio::test]
async fn listing_fails_while_a_file_is_locked() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let held = ftp.read("/data/test-file-3.html", true).await.unwrap();
    let err = ftp.list("/data", false, &AcceptAll).await.unwrap_err();
    assert!(err.is(FileErrorKind::FileLocked));

    held.close().await.unwrap();
    let messages = ftp.list("/data", false, &AcceptAll).await.unwrap();
    close_all(&messages).await.unwrap();
}

#[tokio::test]
async fn listing_spans_pages_in_server_order() {
    let paths: Vec<String> = (0..60).map(|i| format!("/many/f-{:02}.txt", i)).collect();
    let files: Vec<(&str, &str)> = paths.iter().map(|p| (p.as_str(), "x")).collect();
    let server = MockFtpServer::start(&files).await;
    let ftp = connector(&server);

    let messages = ftp.list("/many", false, &AcceptAll).await.unwrap();
    let listed: Vec<&str> = messages.iter().map(|m| m.path()).collect();
    assert_eq!(listed, paths.iter().map(String::as_str).collect::<Vec<_>>());
    close_all(&messages).await.unwrap();
    assert_eq!(ftp.stats().checked_out, 0);
}

#[tokio::test]
async fn unsuccessful_list_completion_fails() {
    let server = MockFtpServer::with_listing_fixture().await;
    server.finish_list_with("/data", "451 Transfer aborted");
    let ftp = connector(&server);

    let err = ftp.list("/data", false, &AcceptAll).await.unwrap_err();
    assert!(err.is(FileErrorKind::OperationFailed));
    assert!(err.message.contains("Failed to list files on directory '/data'"));
    assert_eq!(ftp.stats().checked_out, 0);
}

#[tokio::test]
async fn unsuccessful_completion_in_subdirectory_fails() {
    let server = MockFtpServer::with_listing_fixture().await;
    server.finish_list_with("/data/subDirectory", "451 Transfer aborted");
    let pool = server.pool();
    let mut handle = pool.get_connection().await.unwrap();

    let err = FtpListCommand::new(handle.connection(), &pool)
        .list("/data", true, &AcceptAll)
        .await
        .unwrap_err();
    assert!(err.message.contains("'/data/subDirectory'"));
    assert_eq!(handle.connection().client_mut().pwd().await.unwrap(), "/");
    handle.release();
}

#[tokio::test]
async fn bounded_pool_too_small_for_listing_fails_fast() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = FtpConnector::new(
        "bounded",
        server.pool_with(PoolConfig {
            max_connections: 3,
            ..Default::default()
        }),
    );

    let err = tokio::time::timeout(Duration::from_secs(5), ftp.list("/data", false, &AcceptAll))
        .await
        .expect("listing must not wait on the pool")
        .unwrap_err();
    assert!(err.is(FileErrorKind::ConnectionUnavailable));
    assert!(err.message.contains("all 3 connections are in use"));
    assert_eq!(ftp.stats().checked_out, 0);
}

#[tokio::test]
async fn bounded_pool_large_enough_for_listing_succeeds() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = FtpConnector::new(
        "bounded",
        server.pool_with(PoolConfig {
            max_connections: 6,
            ..Default::default()
        }),
    );

    let messages = ftp.list("/data", false, &AcceptAll).await.unwrap();
    assert_eq!(messages.len(), 6);
    close_all(&messages).await.unwrap();
    assert_eq!(ftp.stats().checked_out, 0);
}

// ─── Read ────────────────────────────────────────────────────────────

#[tokio::test]
async fn read_is_lazy_and_releases_on_exhaustion() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let message = ftp.read("/data/test-file-1.html", false).await.unwrap();
    assert_eq!(message.attributes.size, 3);
    assert_eq!(message.attributes.name, "test-file-1.html");
    assert_eq!(server.count_commands("RETR"), 0);
    assert_eq!(ftp.stats().checked_out, 1);

    let content = message.content.as_ref().unwrap();
    assert_eq!(content.read_to_string().await.unwrap(), "foo");
    assert_eq!(server.count_commands("RETR"), 1);
    assert!(content.is_closed().await);
    assert_eq!(ftp.stats().checked_out, 0);
}

#[tokio::test]
async fn repeated_close_releases_connection_once() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let message = ftp.read("/data/test-file-2.html", true).await.unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(message.content.as_ref().unwrap().read(&mut buf).await.unwrap(), 1);

    let before = ftp.stats().releases;
    let (a, b) = tokio::join!(message.close(), message.close());
    a.unwrap();
    b.unwrap();
    message.close().await.unwrap();

    let stats = ftp.stats();
    assert_eq!(stats.releases, before + 1);
    assert_eq!(stats.checked_out, 0);
    assert!(!message.attributes.is_locked());
}

#[tokio::test]
async fn closing_unread_content_sends_no_transfer() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let message = ftp.read("/data/test-file-4.html", false).await.unwrap();
    message.close().await.unwrap();
    assert_eq!(server.count_commands("RETR"), 0);
    assert_eq!(ftp.stats().checked_out, 0);
}

#[tokio::test]
async fn lock_flag_is_asymmetric() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let held = ftp.read("/data/test-file-5.html", true).await.unwrap();
    assert!(held.attributes.is_locked());

    let err = ftp.read("/data/test-file-5.html", false).await.unwrap_err();
    assert!(err.is(FileErrorKind::FileLocked));

    held.close().await.unwrap();
    let message = ftp.read("/data/test-file-5.html", false).await.unwrap();
    message.close().await.unwrap();
}

#[tokio::test]
async fn locked_read_waits_for_holder() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = Arc::new(connector(&server));

    let first = ftp.read("/data/test-file-1.html", true).await.unwrap();
    let waiter = tokio::spawn({
        let ftp = ftp.clone();
        async move { ftp.read("/data/test-file-1.html", true).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiter.is_finished());

    first.close().await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(second.attributes.is_locked());
    second.close().await.unwrap();
}

#[tokio::test]
async fn read_rejects_directories_and_missing_files() {
    let server = MockFtpServer::with_listing_fixture().await;
    let ftp = connector(&server);

    let err = ftp.read("/data/subDirectory", false).await.unwrap_err();
    assert!(err.is(FileErrorKind::IllegalOperation));

    let err = ftp.read("/data/missing.html", false).await.unwrap_err();
    assert!(err.is(FileErrorKind::InvalidPath));
    assert_eq!(ftp.stats().checked_out, 0);
}

#[tokio::test]
async fn relative_paths_resolve_against_working_directory() {
    let server = MockFtpServer::with_listing_fixture().await;
    let pool = server.pool();
    let mut handle = pool.get_connection().await.unwrap();
    assert!(handle
        .connection()
        .client_mut()
        .change_working_directory("/data")
        .await
        .unwrap());

    let message = FtpReadCommand::new(handle.connection(), &pool)
        .read("subDirectory/test-file-6.html", false)
        .await
        .unwrap();
    assert_eq!(message.path(), "/data/subDirectory/test-file-6.html");
    message.close().await.unwrap();
    handle.release();
}

#[tokio::test]
async fn unreachable_server_is_connection_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ferry_ftp::FtpConnectionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_timeout_sec: 2,
        ..Default::default()
    };
    let ftp = FtpConnector::new(
        "down",
        ferry_ftp::FtpConnectionPool::new(config, Default::default()),
    );
    let err = ftp.read("/x", false).await.unwrap_err();
    assert!(err.is(FileErrorKind::ConnectionUnavailable));
    assert!(std::error::Error::source(&err).is_some());
}
