/// Chunked transfer tests - PUSH sequences between two nodes over an in-memory pipe
///
/// Tests verify:
/// 1. Files of any size survive any chunk size byte-for-byte, with their mtime
/// 2. Empty files and exact chunk multiples end with an empty final chunk
/// 3. A dead connection mid-transfer leaves no temporary file behind
/// 4. An ERR from the sender aborts the file but not the connection
use filetime::FileTime;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, DuplexStream};

use unisync::config::ModeConfig;
use unisync::protocol::{Command, CommandKind, LocalTree, Node, ProtocolError, Push};

/// Helper to connect two nodes back to back
fn node_pair() -> (Node, Node) {
	let (a, b) = tokio::io::duplex(1 << 16);
	let (ar, aw) = tokio::io::split(a);
	let (br, bw) = tokio::io::split(b);
	let (sender, _) = Node::new(Box::new(ar), Box::new(aw));
	let (receiver, _) = Node::new(Box::new(br), Box::new(bw));
	(sender, receiver)
}

/// Helper for a node whose peer is driven by hand
fn raw_node() -> (Node, DuplexStream) {
	let (ours, theirs) = tokio::io::duplex(1 << 16);
	let (r, w) = tokio::io::split(ours);
	let (node, _) = Node::new(Box::new(r), Box::new(w));
	(node, theirs)
}

fn tree(dir: &Path, chunk_size: usize) -> LocalTree {
	LocalTree::new(dir, ModeConfig::default(), false).with_chunk_size(chunk_size)
}

/// Helper to create a file with deterministic content and mtime
fn create_file(dir: &Path, name: &str, len: usize, mtime: i64) -> Vec<u8> {
	let content: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
	let path = dir.join(name);
	fs::write(&path, &content).unwrap();
	filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
	content
}

fn dir_entries(dir: &Path) -> Vec<String> {
	let mut names: Vec<String> =
		fs::read_dir(dir).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect();
	names.sort();
	names
}

/// Send `name` from `src` and receive it into `dst`
async fn transfer(sender: &Node, receiver: &Node, src: &LocalTree, dst: &LocalTree, name: &str) {
	let send = sender.send_file(src, name, None);
	let receive = async {
		let mut packet = receiver.wait_for(CommandKind::Push).await?;
		let first = match packet.command {
			Command::Push(p) => p,
			other => panic!("unexpected {:?}", other),
		};
		receiver.receive_file(dst, first, packet.body.take()).await
	};
	let (sent, received) = tokio::join!(send, receive);
	sent.unwrap();
	received.unwrap();
}

// ===================================================================
// ROUND TRIP
// ===================================================================

#[tokio::test]
async fn test_round_trip_across_chunk_sizes() {
	let cases: [(usize, usize); 4] = [(10_000, 3_000), (4_096, 1_024), (0, 1_000), (1, 7)];
	for (len, chunk) in cases {
		let src_dir = TempDir::new().unwrap();
		let dst_dir = TempDir::new().unwrap();
		let content = create_file(src_dir.path(), "data.bin", len, 1_700_000_123);

		let (sender, receiver) = node_pair();
		transfer(&sender, &receiver, &tree(src_dir.path(), chunk), &tree(dst_dir.path(), chunk), "data.bin")
			.await;

		let target = dst_dir.path().join("data.bin");
		assert_eq!(fs::read(&target).unwrap(), content, "len {} chunk {}", len, chunk);
		let meta = fs::metadata(&target).unwrap();
		assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_700_000_123);
		assert_eq!(dir_entries(dst_dir.path()), vec!["data.bin"], "temp file left behind");
	}
}

#[tokio::test]
async fn test_overwrites_existing_file() {
	let src_dir = TempDir::new().unwrap();
	let dst_dir = TempDir::new().unwrap();
	let content = create_file(src_dir.path(), "f", 100, 1_600_000_000);
	fs::write(dst_dir.path().join("f"), b"a much longer previous version of the file .......").unwrap();

	let (sender, receiver) = node_pair();
	transfer(&sender, &receiver, &tree(src_dir.path(), 64), &tree(dst_dir.path(), 64), "f").await;
	assert_eq!(fs::read(dst_dir.path().join("f")).unwrap(), content);
}

#[tokio::test]
async fn test_exact_multiple_ends_with_empty_chunk() {
	let src_dir = TempDir::new().unwrap();
	create_file(src_dir.path(), "f", 8, 1);
	let (sender, mut peer) = raw_node();

	let src_tree = tree(src_dir.path(), 4);
	let send = sender.send_file(&src_tree, "f", None);
	let read = async {
		use tokio::io::AsyncReadExt;
		let mut wire = Vec::new();
		// Three frames: 4 + 4 + 0 bytes
		let mut buf = [0u8; 1024];
		while wire.iter().filter(|&&b| b == b'\n').count() < 3 {
			let n = peer.read(&mut buf).await.unwrap();
			assert!(n > 0);
			wire.extend_from_slice(&buf[..n]);
		}
		wire
	};
	let (sent, wire) = tokio::join!(send, read);
	sent.unwrap();
	let text = String::from_utf8_lossy(&wire);
	assert_eq!(text.matches("\"more\":true").count(), 2);
	assert!(text.trim_end().ends_with("\"length\":0,\"more\":false}"));
}

// ===================================================================
// FAILURES
// ===================================================================

#[tokio::test]
async fn test_connection_drop_removes_temp_file() {
	let dst_dir = TempDir::new().unwrap();
	let (receiver, mut peer) = raw_node();

	peer.write_all(b"PUSH {\"path\":\"big.bin\",\"modified_at\":1700000000,\"mode\":420,\"length\":4,\"more\":true}\nabcd")
		.await
		.unwrap();
	let mut packet = receiver.wait_for(CommandKind::Push).await.unwrap();
	drop(peer);

	let first = match packet.command {
		Command::Push(p) => p,
		other => panic!("unexpected {:?}", other),
	};
	let err = receiver.receive_file(&tree(dst_dir.path(), 4), first, packet.body.take()).await.unwrap_err();
	assert!(err.is_fatal(), "{:?}", err);
	assert!(dir_entries(dst_dir.path()).is_empty());
	assert!(receiver.error().is_some());
}

#[tokio::test]
async fn test_sender_error_aborts_file_only() {
	let dst_dir = TempDir::new().unwrap();
	let (receiver, mut peer) = raw_node();

	peer.write_all(b"PUSH {\"path\":\"big.bin\",\"modified_at\":1700000000,\"mode\":420,\"length\":4,\"more\":true}\nabcd")
		.await
		.unwrap();
	peer.write_all(b"ERR {\"err\":\"read failed\",\"path\":\"big.bin\"}\n").await.unwrap();

	let mut packet = receiver.wait_for(CommandKind::Push).await.unwrap();
	let first = match packet.command {
		Command::Push(p) => p,
		other => panic!("unexpected {:?}", other),
	};
	let err = receiver.receive_file(&tree(dst_dir.path(), 4), first, packet.body.take()).await.unwrap_err();
	assert_eq!(err, ProtocolError::Remote { err: "read failed".into(), path: "big.bin".into() });
	assert!(!err.is_fatal());
	assert!(dir_entries(dst_dir.path()).is_empty());
	assert!(receiver.error().is_none());
}

#[tokio::test]
async fn test_missing_source_reports_err() {
	let src_dir = TempDir::new().unwrap();
	let (sender, receiver) = node_pair();

	let err = sender.send_file(&tree(src_dir.path(), 16), "missing.txt", None).await.unwrap_err();
	assert!(!err.is_fatal());

	let packet = receiver.recv().await.unwrap();
	match packet.command {
		Command::Err(e) => assert_eq!(e.path, "missing.txt"),
		other => panic!("unexpected {:?}", other),
	}
	assert!(sender.error().is_none());
}

#[tokio::test]
async fn test_unsafe_path_is_skipped() {
	let dst_dir = TempDir::new().unwrap();
	let (receiver, mut peer) = raw_node();
	peer.write_all(b"PUSH {\"path\":\"../escape\",\"modified_at\":1,\"mode\":420,\"length\":2,\"more\":false}\nhi")
		.await
		.unwrap();
	peer.write_all(b"OK {}\n").await.unwrap();

	let mut packet = receiver.wait_for(CommandKind::Push).await.unwrap();
	let first: Push = match packet.command {
		Command::Push(p) => p,
		other => panic!("unexpected {:?}", other),
	};
	let err = receiver.receive_file(&tree(dst_dir.path(), 4), first, packet.body.take()).await.unwrap_err();
	assert!(!err.is_fatal());
	assert!(!dst_dir.path().parent().unwrap().join("escape").exists());
	// The stream is still in step
	assert_eq!(receiver.wait_for(CommandKind::Ok).await.unwrap().command, Command::ok());
}

// vim: ts=4
