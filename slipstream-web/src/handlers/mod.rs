//! Request handlers.

pub mod range;
pub mod stream;
pub mod torrents;

pub use stream::{serve_stream, start_stream, stop_stream, stream_status};
pub use torrents::{list_torrent_files, search_torrents, search_tv_torrents};
