pub mod dialog;
pub mod poll_card;
pub mod poll_list;
pub mod status_bar;
pub mod theme;

pub use dialog::{render_dialog, DialogRenderState};
pub use poll_card::{render_poll_card, PollCardState};
pub use poll_list::{render_poll_list, PollListState};
pub use status_bar::{render_status_bar, StatusBarState};
pub use theme::Theme;
