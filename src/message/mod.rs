mod parse;
mod serialize;
pub mod tags;
mod types;

pub use self::parse::next_token;
pub use self::tags::Tags;
pub use self::types::Message;
