pub mod browser;
pub mod editor;
pub mod error;
pub mod events;
pub mod layout;
pub mod render;
pub mod review;
pub mod surface;
pub mod widgets;

pub use browser::{Browser, Mode};
pub use error::TuiError;
pub use events::{run_browser, KeyConfirm};
pub use layout::Layout;
pub use surface::Surface;
