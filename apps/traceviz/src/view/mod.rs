pub mod draw;
pub mod live;
pub mod model;

pub use draw::UiOpts;
pub use live::LivePrinter;
