pub mod events;
pub mod intent;
pub mod messages;
pub mod session;
pub mod status;

pub use events::*;
pub use intent::*;
pub use messages::*;
pub use session::*;
pub use status::*;
