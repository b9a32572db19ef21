pub mod card_list;
pub mod card_view;
pub mod color;
pub mod help;
pub mod status_bar;
pub mod tags;
