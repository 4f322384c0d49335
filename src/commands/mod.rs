pub mod path;
pub mod replay;
pub mod serve;

pub use path::handle_path;
pub use replay::handle_replay;
pub use serve::handle_serve;
