pub mod error;
pub mod fanout;
pub mod session;
pub mod state;

pub use error::*;
pub use fanout::*;
pub use session::*;
pub use state::*;
