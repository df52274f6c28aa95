mod api;
mod event;
mod message;

pub use api::*;
pub use event::{CallbackQuery, Chat, Event, EventError, Message, Update, User};
pub use message::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile};
