//! Wire protocol
//!
//! Line-framed commands with optional raw bodies, multiplexed over one duplex stream.
//!
//! ```text
//! HELLO {"remote":"/srv/project","ignore":[".git/"]}
//! WHATSUP {"basepath":"/srv/project"}
//! REQLIST {"path":""}
//! RESLIST {"filelist":[{"path":"a.txt","size":12,"modified_at":1700000000,"mode":420}]}
//! PUSH {"path":"a.txt","modified_at":1700000001,"mode":420,"length":12,"more":false}
//! <12 raw bytes>
//! OK {}
//! ```

pub mod commands;
pub mod error;
pub mod file_operations;
pub mod node;
pub mod transfer;

pub use commands::{
	Ack, Chmod, Command, CommandKind, Del, ErrorReply, FsEvent, Hello, LinkItem, Mkdir, ModeItem,
	Progress, Pull, Push, ReqList, ResList, Symlink, Whatsup, SIDE_KINDS,
};
pub use error::ProtocolError;
pub use file_operations::LocalTree;
pub use node::{Body, BoxedReader, BoxedWriter, Node, Packet};

// vim: ts=4
