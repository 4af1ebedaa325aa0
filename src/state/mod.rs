pub mod window;

pub use window::RecentWindow;
